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

//! # Zingest Builder Module
//!
//! This module turns declarative pipeline definitions into [`ZiPipeline`]s.
//!
//! ## Definition Format
//!
//! ```json
//! {
//!   "description": "parse auth logs",
//!   "processors": [
//!     {"dissect": {"field": "message", "pattern": "%{}, %{user.name} %{}"}},
//!     {"set": {"field": "event.category", "value": "authentication",
//!              "if": "ctx.user?.name != null", "tag": "categorize"}}
//!   ],
//!   "on_failure": [
//!     {"set": {"field": "error.message", "value": "{{_ingest.on_failure_message}}"}}
//!   ]
//! }
//! ```
//!
//! A bare array of processors is accepted too. The same structure can be
//! written in YAML or loaded from a `.json` / `.yaml` / `.yml` file.
//!
//! ## Shared Processor Options
//!
//! `if`, `tag`, `description`, `ignore_failure` and `on_failure` are handled
//! here; everything else is passed to the processor factory. Processors inside
//! an `on_failure` list may not declare their own `on_failure`.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::condition::ZiCondition;
use crate::errors::{Result, ZiError};
use crate::pipeline::ZiPipeline;
use crate::processor::{ZiProcessorFactory, ZiProcessorNode};
use crate::processors;

const COMMON_OPTIONS: [&str; 5] = ["if", "tag", "description", "ignore_failure", "on_failure"];
const PIPELINE_KEYS: [&str; 4] = ["id", "description", "processors", "on_failure"];

/// Builder settings.
#[derive(Clone, Debug)]
pub struct ZiBuilderConfig {
    /// Reject unknown option keys instead of logging them.
    pub strict: bool,
    /// Id used when the definition does not carry one.
    pub pipeline_id: String,
}

impl Default for ZiBuilderConfig {
    fn default() -> Self {
        Self {
            strict: false,
            pipeline_id: "_simulate_pipeline".to_string(),
        }
    }
}

impl ZiBuilderConfig {
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_pipeline_id(mut self, pipeline_id: impl Into<String>) -> Self {
        self.pipeline_id = pipeline_id.into();
        self
    }
}

#[derive(Clone, Copy)]
struct Registration {
    factory: ZiProcessorFactory,
    /// Option keys the factory understands; `None` skips the unknown-key check.
    options: Option<&'static [&'static str]>,
}

/// Builder that knows how to instantiate processors from definitions.
pub struct ZiPipelineBuilder {
    factories: HashMap<String, Registration>,
    config: ZiBuilderConfig,
}

impl Default for ZiPipelineBuilder {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ZiPipelineBuilder {
    /// Creates a builder with no processors registered.
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            config: ZiBuilderConfig::default(),
        }
    }

    /// Creates a builder with every built-in processor registered.
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        builder.register_defaults();
        builder
    }

    pub fn with_config(mut self, config: ZiBuilderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ZiBuilderConfig {
        &self.config
    }

    /// Registers a custom processor type.
    pub fn register(&mut self, name: impl Into<String>, factory: ZiProcessorFactory) {
        self.factories.insert(
            name.into(),
            Registration {
                factory,
                options: None,
            },
        );
    }

    fn register_with_options(
        &mut self,
        name: &str,
        factory: ZiProcessorFactory,
        options: &'static [&'static str],
    ) {
        self.factories.insert(
            name.to_string(),
            Registration {
                factory,
                options: Some(options),
            },
        );
    }

    pub fn has_processor(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    fn register_defaults(&mut self) {
        // field
        self.register_with_options(
            "set",
            processors::field::set_factory,
            &["field", "value", "copy_from", "override", "ignore_empty_value", "create_parents"],
        );
        self.register_with_options(
            "rename",
            processors::field::rename_factory,
            &["field", "target_field", "ignore_missing", "override"],
        );
        self.register_with_options(
            "remove",
            processors::field::remove_factory,
            &["field", "ignore_missing"],
        );
        self.register_with_options(
            "append",
            processors::field::append_factory,
            &["field", "value", "allow_duplicates"],
        );

        // string
        const STRING_OPTIONS: &[&str] = &["field", "target_field", "ignore_missing"];
        self.register_with_options("lowercase", processors::string::lowercase_factory, STRING_OPTIONS);
        self.register_with_options("uppercase", processors::string::uppercase_factory, STRING_OPTIONS);
        self.register_with_options("trim", processors::string::trim_factory, STRING_OPTIONS);
        self.register_with_options(
            "split",
            processors::string::split_factory,
            &["field", "separator", "target_field", "ignore_missing", "preserve_trailing"],
        );
        self.register_with_options(
            "join",
            processors::string::join_factory,
            &["field", "separator", "target_field"],
        );

        // conversion
        self.register_with_options(
            "convert",
            processors::convert::convert_factory,
            &["field", "type", "target_field", "ignore_missing"],
        );
        self.register_with_options(
            "bytes",
            processors::bytes::bytes_factory,
            &["field", "target_field", "ignore_missing"],
        );

        // extraction
        self.register_with_options(
            "dissect",
            processors::dissect::dissect_factory,
            &["field", "pattern", "append_separator", "ignore_missing"],
        );

        // control
        self.register_with_options("script", processors::script::script_factory, &["source", "lang"]);
        self.register_with_options("fail", processors::fail::fail_factory, &["message"]);
    }

    /// Builds a pipeline from a parsed definition value.
    pub fn build_from_value(&self, definition: &Value) -> Result<ZiPipeline> {
        let (id, description, steps, handlers) = match definition {
            Value::Array(steps) => (None, None, steps.as_slice(), &[][..]),
            Value::Object(map) => {
                self.check_unknown_keys(map, &PIPELINE_KEYS, "pipeline")?;
                let steps = match map.get("processors") {
                    Some(Value::Array(steps)) => steps.as_slice(),
                    None => &[][..],
                    Some(_) => return Err(ZiError::validation("'processors' must be an array")),
                };
                let handlers = match map.get("on_failure") {
                    Some(Value::Array(handlers)) => handlers.as_slice(),
                    None => &[][..],
                    Some(_) => return Err(ZiError::validation("'on_failure' must be an array")),
                };
                (
                    map.get("id").and_then(Value::as_str),
                    map.get("description").and_then(Value::as_str),
                    steps,
                    handlers,
                )
            }
            _ => {
                return Err(ZiError::validation(
                    "pipeline definition must be an object or an array of processors",
                ))
            }
        };

        let processors = self.build_sequence(steps, false)?;
        let on_failure = self.build_sequence(handlers, true)?;

        let mut pipeline = ZiPipeline::new(id.unwrap_or(&self.config.pipeline_id), processors)
            .with_on_failure(on_failure);
        if let Some(description) = description {
            pipeline = pipeline.with_description(description);
        }
        Ok(pipeline)
    }

    /// Builds a pipeline from JSON text.
    pub fn build_from_json(&self, source: &str) -> Result<ZiPipeline> {
        let definition: Value = serde_json::from_str(source)?;
        self.build_from_value(&definition)
    }

    /// Builds a pipeline from YAML text.
    pub fn build_from_yaml(&self, source: &str) -> Result<ZiPipeline> {
        let definition: Value = serde_yaml::from_str(source)?;
        self.build_from_value(&definition)
    }

    /// Builds a pipeline from a definition file.
    ///
    /// The format follows the extension; other files are sniffed (JSON when
    /// the content starts with `{` or `[`, YAML otherwise).
    pub fn build_from_file(&self, path: impl AsRef<Path>) -> Result<ZiPipeline> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "json" => self.build_from_json(&content),
            "yaml" | "yml" => self.build_from_yaml(&content),
            _ => {
                let trimmed = content.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    self.build_from_json(&content)
                } else {
                    self.build_from_yaml(&content)
                }
            }
        }
    }

    fn build_sequence(&self, steps: &[Value], in_handler: bool) -> Result<Vec<ZiProcessorNode>> {
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.build_processor(step, in_handler).map_err(|err| {
                let scope = if in_handler { "on_failure" } else { "processors" };
                with_context(err, &format!("{scope}[{index}]"))
            }))
            .collect()
    }

    /// Builds one processor node from `{"<type>": {options}}`.
    pub fn build_processor(&self, definition: &Value, in_handler: bool) -> Result<ZiProcessorNode> {
        let object = definition
            .as_object()
            .ok_or_else(|| ZiError::validation("processor definition must be an object"))?;
        let mut entries = object.iter();
        let (kind, options) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(ZiError::validation(
                    "processor definition must have exactly one processor type key",
                ))
            }
        };

        let registration = self
            .factories
            .get(kind)
            .ok_or_else(|| ZiError::validation(format!("unknown processor type [{kind}]")))?;

        let options = match options {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ZiError::validation(format!(
                    "[{kind}] options must be an object"
                )))
            }
        };

        let mut specific = Map::new();
        let mut common = Map::new();
        for (key, value) in options {
            if COMMON_OPTIONS.contains(&key.as_str()) {
                common.insert(key, value);
            } else {
                specific.insert(key, value);
            }
        }
        if let Some(known) = registration.options {
            self.check_unknown_keys(&specific, known, kind)?;
        }

        let processor = (registration.factory)(&Value::Object(specific))
            .map_err(|err| with_context(err, &format!("[{kind}]")))?;
        let mut node = ZiProcessorNode::new(processor);

        if let Some(condition) = common.get("if") {
            let source = condition
                .as_str()
                .ok_or_else(|| ZiError::validation(format!("[{kind}] 'if' must be a string")))?;
            let condition = ZiCondition::parse(source)
                .map_err(|err| with_context(err, &format!("[{kind}] condition")))?;
            node = node.with_condition(condition);
        }
        if let Some(tag) = common.get("tag") {
            let tag = tag
                .as_str()
                .ok_or_else(|| ZiError::validation(format!("[{kind}] 'tag' must be a string")))?;
            node = node.with_tag(tag);
        }
        if let Some(description) = common.get("description").and_then(Value::as_str) {
            node = node.with_description(description);
        }
        match common.get("ignore_failure") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(flag)) => node = node.with_ignore_failure(*flag),
            Some(_) => {
                return Err(ZiError::validation(format!(
                    "[{kind}] 'ignore_failure' must be a boolean"
                )))
            }
        }
        if let Some(handlers) = common.get("on_failure") {
            if in_handler {
                return Err(ZiError::validation(format!(
                    "[{kind}] processors inside on_failure may not declare their own on_failure"
                )));
            }
            let handlers = handlers.as_array().ok_or_else(|| {
                ZiError::validation(format!("[{kind}] 'on_failure' must be an array"))
            })?;
            node = node.with_on_failure(self.build_sequence(handlers, true)?);
        }

        Ok(node)
    }

    fn check_unknown_keys(&self, options: &Map<String, Value>, known: &[&str], scope: &str) -> Result<()> {
        for key in options.keys() {
            if known.contains(&key.as_str()) {
                continue;
            }
            if self.config.strict {
                return Err(ZiError::validation(format!(
                    "[{scope}] unknown option '{key}'"
                )));
            }
            log::warn!("[{scope}] ignoring unknown option '{key}'");
        }
        Ok(())
    }
}

fn with_context(err: ZiError, context: &str) -> ZiError {
    match err {
        ZiError::Validation { message } => ZiError::validation(format!("{context}: {message}")),
        other => other,
    }
}
