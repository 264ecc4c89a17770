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

//! # Zingest Pipeline Runtime Tests
//!
//! Drives documents through complete pipelines and checks the executor's
//! routing of guards, ignored failures and failure handlers.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test pipeline
//! ```

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use zingest::{
    run_pipeline, FaultResult, ZiDocument, ZiExecutionResult, ZiFault, ZiPipeline,
    ZiPipelineBuilder, ZiProcessor, ZiProcessorNode, ZiTraceStatus,
};

fn build(definition: Value) -> ZiPipeline {
    ZiPipelineBuilder::with_defaults()
        .build_from_value(&definition)
        .unwrap()
}

fn document(value: Value) -> ZiDocument {
    ZiDocument::from_value(value).unwrap()
}

/// Processor that records a marker field, used to observe execution order.
#[derive(Debug)]
struct MarkProcessor {
    name: &'static str,
}

impl ZiProcessor for MarkProcessor {
    fn kind(&self) -> &'static str {
        "mark"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let trail = document
            .source
            .entry("trail")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = trail {
            items.push(Value::String(self.name.to_string()));
        }
        Ok(())
    }
}

fn mark(name: &'static str) -> ZiProcessorNode {
    ZiProcessorNode::new(Box::new(MarkProcessor { name }))
}

/// Processor that always faults without touching the document.
#[derive(Debug)]
struct BrokenProcessor;

impl ZiProcessor for BrokenProcessor {
    fn kind(&self) -> &'static str {
        "broken"
    }

    fn apply(&self, _document: &mut ZiDocument) -> FaultResult<()> {
        Err(ZiFault::runtime("broken on purpose"))
    }
}

/// Tests that an empty pipeline returns the document unchanged.
#[test]
fn test_empty_pipeline() {
    let pipeline = build(json!({"id": "noop", "processors": []}));
    let input = document(json!({"message": "hello", "n": [1, 2]}));
    let result = run_pipeline(&pipeline, input.clone());
    match result {
        ZiExecutionResult::Succeeded(output) => assert_eq!(output, input),
        other => panic!("expected success, got {other:?}"),
    }
}

/// Tests the dissect failure scenario handled by a pipeline-level handler.
#[test]
fn test_pipeline_handler_after_dissect_mismatch() {
    let pipeline = build(json!({
        "id": "logins",
        "processors": [
            {"dissect": {"field": "message", "pattern": "%{}, %{user.name} %{}"}},
            {"set": {"field": "event.category", "value": "authentication"}}
        ],
        "on_failure": [
            {"set": {"field": "event.kind", "value": "pipeline_error"}},
            {"set": {"field": "error.message", "value": "{{ _ingest.on_failure_message }}"}}
        ]
    }));

    let result = pipeline.run(document(json!({"message": "user: philipp has logged in"})));
    let ZiExecutionResult::Failed { document, failure, handled } = result else {
        panic!("expected a failed result");
    };

    assert!(handled);
    assert_eq!(failure.processor_type, "dissect");
    assert_eq!(failure.pipeline, "logins");
    assert!(matches!(failure.fault, ZiFault::PatternMismatch { .. }));

    assert_eq!(document.source["event"]["kind"], json!("pipeline_error"));
    assert_eq!(document.source["error"]["message"], json!(failure.message));
    assert!(document.source["error"]["message"]
        .as_str()
        .unwrap()
        .contains("%{}, %{user.name} %{}"));
    assert!(document.source["event"].get("category").is_none());
    assert!(document.source.get("user").is_none());
    assert!(!document.ingest.contains_key("on_failure_message"));
}

/// Tests the same pipeline without a handler ends in an unhandled failure
/// that keeps the document as it was before the failing processor.
#[test]
fn test_unhandled_failure_keeps_document() {
    let pipeline = build(json!([
        {"set": {"field": "seen", "value": true}},
        {"dissect": {"field": "message", "pattern": "%{}, %{user.name} %{}"}},
        {"set": {"field": "after", "value": true}}
    ]));

    let result = pipeline.run(document(json!({"message": "user: philipp has logged in"})));
    assert!(!result.is_success());
    let ZiExecutionResult::Failed { document, failure, handled } = result else {
        panic!("expected a failed result");
    };
    assert!(!handled);
    assert_eq!(failure.pipeline, "_simulate_pipeline");
    assert_eq!(
        document.source,
        *json!({"message": "user: philipp has logged in", "seen": true})
            .as_object()
            .unwrap()
    );
}

/// Tests the latency script against a fixed evaluation instant.
#[test]
fn test_latency_script() {
    let pipeline = build(json!([{
        "script": {
            "source": "ensure(ctx.event.ingestion); ctx.event.ingestion.latency = seconds_between(ctx['@timestamp'], _ingest.timestamp);"
        }
    }]));
    let instant = Utc.with_ymd_and_hms(2025, 4, 3, 10, 7, 23).unwrap()
        + chrono::Duration::milliseconds(394);
    let input = document(json!({"@timestamp": "2025-04-03T10:00:00.000Z"}))
        .with_ingest_timestamp(instant);

    let result = pipeline.run(input);
    assert!(result.is_success());
    assert_eq!(
        result.document().source["event"]["ingestion"]["latency"],
        json!(443)
    );
}

/// Tests that a deserialized document without ingest metadata is stamped
/// before the first processor runs.
#[test]
fn test_latency_script_on_deserialized_document() {
    let pipeline = build(json!([{
        "script": {
            "source": "ensure(ctx.event.ingestion); ctx.event.ingestion.latency = seconds_between(ctx['@timestamp'], _ingest.timestamp);"
        }
    }]));
    let input: ZiDocument =
        serde_json::from_value(json!({"source": {"@timestamp": "2025-04-03T10:00:00.000Z"}}))
            .unwrap();
    assert!(input.ingest.is_empty());

    let result = pipeline.run(input);
    assert!(result.is_success(), "unexpected failure: {result:?}");
    let latency = &result.document().source["event"]["ingestion"]["latency"];
    assert!(latency.as_i64().is_some_and(|seconds| seconds > 0));
    assert!(result.document().ingest_timestamp().is_some());
}

/// Tests that a processor-level handler wins over the pipeline-level one
/// and that execution resumes after the failed processor.
#[test]
fn test_processor_handler_precedence_and_resume() {
    let pipeline = ZiPipeline::new(
        "precedence",
        vec![
            mark("first"),
            ZiProcessorNode::new(Box::new(BrokenProcessor))
                .with_tag("breaker")
                .with_on_failure(vec![mark("processor-handler")]),
            mark("third"),
        ],
    )
    .with_on_failure(vec![mark("pipeline-handler")]);

    let result = pipeline.run(ZiDocument::default());
    assert!(result.is_success());
    assert_eq!(
        result.document().source["trail"],
        json!(["first", "processor-handler", "third"])
    );
}

/// Tests that failure variables are visible to handler templates.
#[test]
fn test_failure_variables_in_handler() {
    let pipeline = build(json!({
        "id": "vars",
        "processors": [{
            "fail": {
                "message": "bad level {{level}}",
                "tag": "level-check",
                "on_failure": [{
                    "set": {
                        "field": "error",
                        "value": "{{_ingest.on_failure_processor_type}}/{{_ingest.on_failure_processor_tag}}/{{_ingest.on_failure_pipeline}}: {{_ingest.on_failure_message}}"
                    }
                }]
            }
        }]
    }));

    let result = pipeline.run(document(json!({"level": "trace"})));
    assert!(result.is_success());
    assert_eq!(
        result.document().source["error"],
        json!("fail/level-check/vars: bad level trace")
    );
    assert!(!result.document().ingest.contains_key("on_failure_processor_type"));
}

/// Tests that a fault inside a handler is terminal and reported against the
/// handler processor.
#[test]
fn test_handler_fault_is_terminal() {
    let pipeline = ZiPipeline::new(
        "nested",
        vec![
            ZiProcessorNode::new(Box::new(BrokenProcessor))
                .with_on_failure(vec![ZiProcessorNode::new(Box::new(BrokenProcessor)).with_tag("handler")]),
            mark("never"),
        ],
    )
    .with_on_failure(vec![mark("pipeline-handler")]);

    let result = pipeline.run(ZiDocument::default());
    let failure = result.failure().unwrap();
    assert_eq!(failure.tag.as_deref(), Some("handler"));
    assert!(matches!(
        result,
        ZiExecutionResult::Failed { handled: false, .. }
    ));
    assert!(result.document().source.get("trail").is_none());
}

/// Tests that `ignore_failure` advances without a failure context or any
/// document change.
#[test]
fn test_ignore_failure() {
    let pipeline = build(json!([
        {"rename": {"field": "missing", "target_field": "other", "ignore_failure": true}},
        {"set": {"field": "after", "value": 1}}
    ]));

    let (result, traces) = pipeline.run_verbose(document(json!({"a": true})));
    assert!(result.is_success());
    assert!(result.failure().is_none());
    assert_eq!(
        result.document().source,
        *json!({"a": true, "after": 1}).as_object().unwrap()
    );
    assert_eq!(traces[0].status, ZiTraceStatus::ErrorIgnored);
    assert!(matches!(traces[0].fault, Some(ZiFault::SourceMissing { .. })));
    assert_eq!(traces[1].status, ZiTraceStatus::Success);
}

/// Tests guard evaluation, including a guard that faults.
#[test]
fn test_guards() {
    let pipeline = build(json!([
        {"set": {"field": "alert", "value": true, "if": "ctx.level == 'error'"}},
        {"set": {"field": "checked", "value": true, "if": "ctx.level != null && ctx.level.startsWith('w')"}}
    ]));

    let (result, traces) = pipeline.run_verbose(document(json!({"level": "warn"})));
    assert!(result.is_success());
    assert!(result.document().source.get("alert").is_none());
    assert_eq!(result.document().source["checked"], json!(true));
    assert_eq!(traces[0].status, ZiTraceStatus::Skipped);

    // `&&` stops before calling a method on the missing field
    let result = pipeline.run(document(json!({})));
    assert!(result.is_success());

    let faulting = build(json!([
        {"set": {"field": "x", "value": 1, "if": "ctx.user.name == 'root'"}}
    ]));
    let result = faulting.run(document(json!({})));
    assert!(matches!(
        result.failure().map(|failure| &failure.fault),
        Some(ZiFault::NullEncountered { .. })
    ));
}

/// Tests that simulate returns one result per document in input order.
#[test]
fn test_simulate_preserves_order() {
    let pipeline = build(json!([
        {"bytes": {"field": "size"}}
    ]));
    let sizes = ["1K", "bogus", "2M", "3G", "", "4T"];
    let batch = sizes
        .iter()
        .enumerate()
        .map(|(idx, size)| document(json!({"size": size})).with_id(format!("doc-{idx}")))
        .collect::<Vec<_>>();

    let results = pipeline.simulate(batch);
    assert_eq!(results.len(), sizes.len());
    for (idx, result) in results.iter().enumerate() {
        assert_eq!(result.document().id.as_deref(), Some(format!("doc-{idx}").as_str()));
    }
    assert_eq!(results[0].document().source["size"], json!(1_000));
    assert!(matches!(
        results[1].failure().map(|failure| &failure.fault),
        Some(ZiFault::UnparsableSize { .. })
    ));
    assert_eq!(results[3].document().source["size"], json!(3_000_000_000_i64));
    assert!(!results[4].is_success());
}

/// Tests that execution results serialize with a status tag.
#[test]
fn test_result_serialization() {
    let pipeline = build(json!([{"fail": {"message": "stop"}}]));
    let result = pipeline.run(document(json!({})));
    let encoded = serde_json::to_value(&result).unwrap();
    assert_eq!(encoded["status"], json!("failed"));
    assert_eq!(encoded["failure"]["fault"]["type"], json!("user_fail"));
    assert_eq!(encoded["handled"], json!(false));
}
