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

//! # Zingest Pipeline Builder Tests
//!
//! Builds pipelines from JSON, YAML and files on disk, and checks the
//! errors reported for malformed definitions.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test builder
//! ```

use std::io::Write;

use serde_json::{json, Value};
use tempfile::NamedTempFile;
use zingest::{
    FaultResult, Result, ZiBoxedProcessor, ZiBuilderConfig, ZiDocument, ZiError, ZiPipelineBuilder,
    ZiProcessor,
};

const YAML_PIPELINE: &str = r#"
id: sizes
description: normalise sizes
processors:
  - bytes:
      field: size
      tag: to-bytes
  - set:
      field: large
      value: true
      if: "ctx.size > 1000000"
on_failure:
  - set:
      field: error
      value: "{{_ingest.on_failure_message}}"
"#;

/// Tests building from YAML text and running the result.
#[test]
fn test_build_from_yaml() {
    let pipeline = ZiPipelineBuilder::with_defaults()
        .build_from_yaml(YAML_PIPELINE)
        .unwrap();
    assert_eq!(pipeline.id(), "sizes");
    assert_eq!(pipeline.description(), Some("normalise sizes"));
    assert_eq!(pipeline.len(), 2);
    assert_eq!(pipeline.on_failure().len(), 1);
    assert_eq!(pipeline.processors()[0].tag(), Some("to-bytes"));
    assert_eq!(pipeline.processors()[1].processor_type(), "set");

    let result = pipeline.run(ZiDocument::from_value(json!({"size": "2M"})).unwrap());
    assert!(result.is_success());
    assert_eq!(result.document().source["size"], json!(2_000_000));
    assert_eq!(result.document().source["large"], json!(true));
}

/// Tests building from JSON text, including the bare array form.
#[test]
fn test_build_from_json() {
    let builder = ZiPipelineBuilder::with_defaults();

    let pipeline = builder
        .build_from_json(r#"{"id": "lower", "processors": [{"lowercase": {"field": "level"}}]}"#)
        .unwrap();
    assert_eq!(pipeline.id(), "lower");

    let bare = builder
        .build_from_json(r#"[{"trim": {"field": "a"}}, {"uppercase": {"field": "a"}}]"#)
        .unwrap();
    assert_eq!(bare.id(), "_simulate_pipeline");
    assert_eq!(bare.len(), 2);

    let result = bare.run(ZiDocument::from_value(json!({"a": "  x "})).unwrap());
    assert_eq!(result.document().source["a"], json!("X"));
}

/// Tests loading definitions from files by extension and by content.
#[test]
fn test_build_from_file() {
    let builder = ZiPipelineBuilder::with_defaults();

    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    yaml.write_all(YAML_PIPELINE.as_bytes()).unwrap();
    assert_eq!(builder.build_from_file(yaml.path()).unwrap().id(), "sizes");

    let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    json_file
        .write_all(br#"{"id": "from-json", "processors": [{"remove": {"field": "tmp"}}]}"#)
        .unwrap();
    assert_eq!(builder.build_from_file(json_file.path()).unwrap().id(), "from-json");

    let mut sniffed = NamedTempFile::new().unwrap();
    sniffed
        .write_all(br#"[{"set": {"field": "a", "value": 1}}]"#)
        .unwrap();
    assert_eq!(builder.build_from_file(sniffed.path()).unwrap().len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    assert!(matches!(builder.build_from_file(&missing), Err(ZiError::Io(_))));
}

/// Tests the validation errors raised for malformed definitions.
#[test]
fn test_definition_errors() {
    let builder = ZiPipelineBuilder::with_defaults();

    let cases = [
        json!("not a pipeline"),
        json!({"processors": {"set": {}}}),
        json!([{"unknown_processor": {}}]),
        json!([{"set": {"field": "a", "value": 1}, "rename": {"field": "a", "target_field": "b"}}]),
        json!([{"set": {"field": "a", "value": 1, "if": "ctx.a =="}}]),
        json!([{"set": {"field": "a", "value": 1, "ignore_failure": "yes"}}]),
        json!([{"dissect": {"field": "m", "pattern": "%{a}%{b}"}}]),
        json!([{"set": {"field": "a", "value": "{{unterminated"}}]),
    ];
    for definition in cases {
        let err = builder.build_from_value(&definition).unwrap_err();
        assert!(
            matches!(err, ZiError::Validation { .. }),
            "{definition} should be rejected, got {err}"
        );
    }

    assert!(matches!(
        builder.build_from_json("{not json"),
        Err(ZiError::Serde(_))
    ));
}

/// Tests that error messages point at the offending processor.
#[test]
fn test_error_context() {
    let err = ZiPipelineBuilder::with_defaults()
        .build_from_value(&json!({
            "processors": [
                {"set": {"field": "a", "value": 1}},
                {"bytes": {}}
            ]
        }))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("processors[1]"), "{message}");
    assert!(message.contains("bytes"), "{message}");
}

/// Tests that handlers inside `on_failure` may not nest their own handlers.
#[test]
fn test_nested_handlers_rejected() {
    let err = ZiPipelineBuilder::with_defaults()
        .build_from_value(&json!({
            "processors": [{"fail": {"message": "x"}}],
            "on_failure": [{
                "set": {"field": "a", "value": 1, "on_failure": [{"set": {"field": "b", "value": 2}}]}
            }]
        }))
        .unwrap_err();
    assert!(err.to_string().contains("on_failure"));
}

/// Tests strict mode and a custom pipeline id default.
#[test]
fn test_builder_config() {
    let config = ZiBuilderConfig::default()
        .with_strict(true)
        .with_pipeline_id("ingest-default");
    let builder = ZiPipelineBuilder::with_defaults().with_config(config);
    assert!(builder.config().strict);

    let pipeline = builder
        .build_from_value(&json!([{"set": {"field": "a", "value": 1}}]))
        .unwrap();
    assert_eq!(pipeline.id(), "ingest-default");

    assert!(builder
        .build_from_value(&json!({"processors": [], "version": 2}))
        .is_err());
}

#[derive(Debug)]
struct StampProcessor {
    value: Value,
}

impl ZiProcessor for StampProcessor {
    fn kind(&self) -> &'static str {
        "stamp"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        document.source.insert("stamp".to_string(), self.value.clone());
        Ok(())
    }
}

fn stamp_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let value = config
        .get("value")
        .cloned()
        .ok_or_else(|| ZiError::validation("stamp requires 'value'"))?;
    Ok(Box::new(StampProcessor { value }))
}

/// Tests registering a custom processor next to the built-ins.
#[test]
fn test_custom_processor_registration() {
    let mut builder = ZiPipelineBuilder::with_defaults();
    assert!(!builder.has_processor("stamp"));
    builder.register("stamp", stamp_factory);
    assert!(builder.has_processor("stamp"));
    assert!(builder.has_processor("dissect"));

    let pipeline = builder
        .build_from_value(&json!([{"stamp": {"value": "v1", "tag": "custom"}}]))
        .unwrap();
    assert_eq!(pipeline.processors()[0].tag(), Some("custom"));

    let result = pipeline.run(ZiDocument::default());
    assert_eq!(result.document().source["stamp"], json!("v1"));

    let empty = ZiPipelineBuilder::new();
    assert!(!empty.has_processor("set"));
}
