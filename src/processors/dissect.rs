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

//! # Dissect Processor Module
//!
//! Splits a string field on the literal delimiters of a pattern and writes
//! the captured pieces to fields.
//!
//! ## Pattern Syntax
//!
//! ```text
//! %{clientip} [%{@timestamp}] "%{verb} %{url}"
//! %{}            anonymous skip key
//! %{?name}       named skip key
//! %{+name}       append to `name`, joined with append_separator
//! %{+name/2}     append with explicit order
//! %{name->}      consume repeated delimiters after the value (padding)
//! %{user.name}   dotted keys write nested fields
//! ```
//!
//! The whole pattern must match before any field is written.

use regex::Regex;
use serde_json::Value;

use crate::condition::ZiValueKind;
use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiError, ZiFault};
use crate::path::ZiFieldPath;
use crate::processor::{ZiBoxedProcessor, ZiProcessor};
use crate::processors::{
    atomically, optional_bool, optional_str, options, read_field, required_field, required_str,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum KeyMode {
    Normal,
    Skip,
    Append(u32),
}

#[derive(Clone, Debug)]
struct DissectKey {
    name: String,
    mode: KeyMode,
    right_padding: bool,
    /// Literal text that follows this key; empty only for the last key.
    delimiter: String,
}

/// Compiled dissect pattern.
#[derive(Clone, Debug)]
pub struct ZiDissectPattern {
    source: String,
    prefix: String,
    keys: Vec<DissectKey>,
}

impl ZiDissectPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let marker = Regex::new(r"%\{([^}]*)\}")
            .map_err(|err| ZiError::internal(format!("dissect marker pattern: {err}")))?;

        let mut prefix = String::new();
        let mut keys: Vec<DissectKey> = Vec::new();
        let mut last = 0;
        for captures in marker.captures_iter(pattern) {
            let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let literal = &pattern[last..whole.start()];
            match keys.last_mut() {
                Some(previous) => {
                    if literal.is_empty() {
                        return Err(ZiError::validation(format!(
                            "dissect pattern '{pattern}' has keys without a delimiter between them"
                        )));
                    }
                    previous.delimiter = literal.to_string();
                }
                None => prefix = literal.to_string(),
            }
            keys.push(Self::parse_key(body.as_str(), pattern)?);
            last = whole.end();
        }

        let Some(final_key) = keys.last_mut() else {
            return Err(ZiError::validation(format!(
                "dissect pattern '{pattern}' contains no keys"
            )));
        };
        final_key.delimiter = pattern[last..].to_string();

        Ok(Self {
            source: pattern.to_string(),
            prefix,
            keys,
        })
    }

    fn parse_key(body: &str, pattern: &str) -> Result<DissectKey> {
        let mut name = body.trim();
        let right_padding = match name.strip_suffix("->") {
            Some(stripped) => {
                name = stripped;
                true
            }
            None => false,
        };

        let mode = if let Some(rest) = name.strip_prefix('+') {
            let (base, order) = match rest.split_once('/') {
                Some((base, order)) => {
                    let order = order.parse::<u32>().map_err(|_| {
                        ZiError::validation(format!(
                            "dissect pattern '{pattern}' has invalid append order in '{body}'"
                        ))
                    })?;
                    (base, order)
                }
                None => (rest, 0),
            };
            name = base;
            KeyMode::Append(order)
        } else if let Some(rest) = name.strip_prefix('?') {
            name = rest;
            KeyMode::Skip
        } else if name.starts_with('*') || name.starts_with('&') {
            return Err(ZiError::validation(format!(
                "dissect reference keys are not supported: '{body}'"
            )));
        } else if name.is_empty() {
            KeyMode::Skip
        } else {
            KeyMode::Normal
        };

        if mode != KeyMode::Skip && name.is_empty() {
            return Err(ZiError::validation(format!(
                "dissect pattern '{pattern}' has an empty key name"
            )));
        }

        Ok(DissectKey {
            name: name.to_string(),
            mode,
            right_padding,
            delimiter: String::new(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Matches `input` and returns `(key, value)` pairs in write order.
    pub fn matches(&self, input: &str, append_separator: &str) -> FaultResult<Vec<(String, String)>> {
        let mismatch = || ZiFault::PatternMismatch {
            pattern: self.source.clone(),
            input: input.to_string(),
        };

        let mut rest = input.strip_prefix(self.prefix.as_str()).ok_or_else(mismatch)?;
        let mut captured: Vec<(&DissectKey, &str)> = Vec::with_capacity(self.keys.len());
        let last = self.keys.len().saturating_sub(1);

        for (idx, key) in self.keys.iter().enumerate() {
            let value = if key.delimiter.is_empty() {
                std::mem::take(&mut rest)
            } else if idx == last {
                let value = rest.strip_suffix(key.delimiter.as_str()).ok_or_else(mismatch)?;
                rest = "";
                value
            } else {
                let position = rest.find(key.delimiter.as_str()).ok_or_else(mismatch)?;
                let value = &rest[..position];
                rest = &rest[position + key.delimiter.len()..];
                if key.right_padding {
                    while let Some(stripped) = rest.strip_prefix(key.delimiter.as_str()) {
                        rest = stripped;
                    }
                }
                value
            };
            captured.push((key, value));
        }

        if !rest.is_empty() {
            return Err(mismatch());
        }

        let mut fields: Vec<(String, String)> = Vec::new();
        let mut appended: Vec<(String, u32, usize, String)> = Vec::new();
        for (position, (key, value)) in captured.into_iter().enumerate() {
            match key.mode {
                KeyMode::Skip => {}
                KeyMode::Normal => fields.push((key.name.clone(), value.to_string())),
                KeyMode::Append(order) => {
                    appended.push((key.name.clone(), order, position, value.to_string()))
                }
            }
        }

        appended.sort_by_key(|(_, order, position, _)| (*order, *position));
        let mut names: Vec<String> = Vec::new();
        for (name, ..) in &appended {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        for name in names {
            let joined = appended
                .iter()
                .filter(|(candidate, ..)| *candidate == name)
                .map(|(.., value)| value.as_str())
                .collect::<Vec<_>>()
                .join(append_separator);
            fields.push((name, joined));
        }

        Ok(fields)
    }
}

#[derive(Debug)]
pub struct ZiDissect {
    field: ZiFieldPath,
    pattern: ZiDissectPattern,
    targets: Vec<(String, ZiFieldPath)>,
    append_separator: String,
    ignore_missing: bool,
}

impl ZiDissect {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath, pattern: ZiDissectPattern) -> Result<Self> {
        let mut targets = Vec::new();
        for key in &pattern.keys {
            if key.mode == KeyMode::Skip || targets.iter().any(|(name, _)| *name == key.name) {
                continue;
            }
            targets.push((key.name.clone(), ZiFieldPath::parse_writable(&key.name)?));
        }
        Ok(Self {
            field,
            pattern,
            targets,
            append_separator: String::new(),
            ignore_missing: false,
        })
    }

    pub fn with_append_separator(mut self, separator: impl Into<String>) -> Self {
        self.append_separator = separator.into();
        self
    }

    pub fn with_ignore_missing(mut self, ignore_missing: bool) -> Self {
        self.ignore_missing = ignore_missing;
        self
    }
}

impl ZiProcessor for ZiDissect {
    fn kind(&self) -> &'static str {
        "dissect"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let Some(input) = read_field(document, &self.field, self.ignore_missing)? else {
            return Ok(());
        };
        let text = input.as_str().ok_or_else(|| {
            ZiFault::wrong_type("dissect", "string", ZiValueKind::of(input).to_string())
        })?;
        let fields = self.pattern.matches(text, &self.append_separator)?;

        atomically(document, |document| {
            for (name, value) in fields {
                let Some((_, path)) = self.targets.iter().find(|(target, _)| *target == name) else {
                    continue;
                };
                path.set(document, Value::String(value), true)?;
            }
            Ok(())
        })
    }
}

/// Factory for `dissect`.
///
/// Options: `field`, `pattern`, `append_separator`, `ignore_missing`.
pub fn dissect_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "dissect")?;
    let pattern = ZiDissectPattern::parse(required_str(obj, "dissect", "pattern")?)?;
    let processor = ZiDissect::new(required_field(obj, "dissect", "field")?, pattern)?
        .with_append_separator(optional_str(obj, "dissect", "append_separator")?.unwrap_or(""))
        .with_ignore_missing(optional_bool(obj, "dissect", "ignore_missing", false)?);
    Ok(Box::new(processor))
}
