//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zingest.
//! The Zingest project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Template Module
//!
//! String templates with field substitutions, used for `set` values and
//! `fail` messages.
//!
//! ```text
//! {{user.name}}                      field value, "" when missing
//! {{{user.name}}}                    same, triple braces accepted
//! {{tags.0}}                         list element
//! {{_ingest.on_failure_message}}     failure context while a handler runs
//! {{#toJson}}user{{/toJson}}         canonical compact JSON of a subtree
//! ```
//!
//! Lookups are null-safe on every hop: rendering never faults.

use regex::Regex;
use serde_json::Value;

use crate::document::ZiDocument;
use crate::errors::{Result, ZiError};
use crate::path::{ZiFieldPath, ZiPathRoot};
use crate::pipeline::ZiFailureContext;

const SUBSTITUTION: &str =
    r"\{\{#toJson\}\}(.*?)\{\{/toJson\}\}|\{\{\{(.*?)\}\}\}|\{\{(.*?)\}\}";

#[derive(Clone, Debug)]
enum Part {
    Text(String),
    Field { path: ZiFieldPath, json: bool },
}

/// Compiled template.
#[derive(Clone, Debug)]
pub struct ZiTemplate {
    source: String,
    parts: Vec<Part>,
}

impl ZiTemplate {
    /// Whether `text` contains substitution markers at all.
    pub fn is_template(text: &str) -> bool {
        text.contains("{{")
    }

    /// Compiles template text, validating every referenced path.
    pub fn compile(source: &str) -> Result<Self> {
        let pattern = Regex::new(SUBSTITUTION)
            .map_err(|err| ZiError::internal(format!("template pattern: {err}")))?;

        let mut parts = Vec::new();
        let mut last = 0;
        for captures in pattern.captures_iter(source) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            push_text(&mut parts, &source[last..whole.start()], source)?;
            last = whole.end();

            let (inner, json) = match (captures.get(1), captures.get(2), captures.get(3)) {
                (Some(inner), _, _) => (inner.as_str(), true),
                (_, Some(inner), _) => (inner.as_str(), false),
                (_, _, Some(inner)) => (inner.as_str(), false),
                _ => continue,
            };
            if !json && inner.trim_start().starts_with(['#', '/']) {
                return Err(ZiError::validation(format!(
                    "unbalanced section '{{{{{inner}}}}}' in template '{source}'"
                )));
            }
            let path = ZiFieldPath::parse(inner).map_err(|err| {
                ZiError::validation(format!("invalid template '{source}': {err}"))
            })?;
            parts.push(Part::Field {
                path: path.null_safe(),
                json,
            });
        }
        push_text(&mut parts, &source[last..], source)?;

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders against a document. `failure` supplies the
    /// `_ingest.on_failure_*` variables when present.
    pub fn render(&self, document: &ZiDocument, failure: Option<&ZiFailureContext>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Field { path, json } => {
                    let value = lookup(path, document, failure);
                    if *json {
                        out.push_str(&to_canonical_json(&value));
                    } else {
                        out.push_str(&render_value(&value));
                    }
                }
            }
        }
        out
    }
}

/// One-shot compile and render.
pub fn render(template: &str, document: &ZiDocument, failure: Option<&ZiFailureContext>) -> Result<String> {
    Ok(ZiTemplate::compile(template)?.render(document, failure))
}

fn push_text(parts: &mut Vec<Part>, text: &str, source: &str) -> Result<()> {
    if text.contains("{{") {
        return Err(ZiError::validation(format!(
            "unterminated substitution in template '{source}'"
        )));
    }
    if !text.is_empty() {
        parts.push(Part::Text(text.to_string()));
    }
    Ok(())
}

fn lookup(path: &ZiFieldPath, document: &ZiDocument, failure: Option<&ZiFailureContext>) -> Value {
    if let (ZiPathRoot::Ingest, Some(failure), [segment]) = (path.root(), failure, path.segments()) {
        if let Some(value) = failure.variable(&segment.key) {
            return value;
        }
    }
    path.resolve(document)
        .map(|lookup| lookup.to_value())
        .unwrap_or(Value::Null)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => to_canonical_json(value),
        other => other.to_string(),
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
