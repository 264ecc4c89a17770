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

//! # Zingest Processor Tests
//!
//! Tests the built-in processors through their definition factories, the
//! same entry point the pipeline builder uses.
//!
//! ## Test Categories
//!
//! - **Field Tests**: set, rename, remove, append
//! - **String Tests**: case folding, trim, split, join
//! - **Conversion Tests**: convert, bytes
//! - **Extraction Tests**: dissect
//! - **Control Tests**: script, fail
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test processors
//! ```

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use zingest::processors::bytes::{bytes_factory, parse_byte_size};
use zingest::processors::convert::convert_factory;
use zingest::processors::dissect::dissect_factory;
use zingest::processors::fail::fail_factory;
use zingest::processors::field::{append_factory, remove_factory, rename_factory, set_factory};
use zingest::processors::script::script_factory;
use zingest::processors::string::{join_factory, lowercase_factory, split_factory, trim_factory};
use zingest::{ZiDocument, ZiFault, ZiProcessor};

fn document(value: Value) -> ZiDocument {
    ZiDocument::from_value(value).unwrap()
}

fn source(value: Value) -> zingest::ZiSource {
    value.as_object().unwrap().clone()
}

/// Tests `set` with a literal, a template and `copy_from`.
#[test]
fn test_set_value_sources() {
    let mut doc = document(json!({"host": "web-01", "level": "warn"}));

    set_factory(&json!({"field": "event.kind", "value": "event"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    set_factory(&json!({"field": "label", "value": "{{host}}:{{level}}"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    set_factory(&json!({"field": "observer.name", "copy_from": "host"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();

    assert_eq!(doc.source["event"]["kind"], json!("event"));
    assert_eq!(doc.source["label"], json!("web-01:warn"));
    assert_eq!(doc.source["observer"]["name"], json!("web-01"));
}

/// Tests `set` override and empty value handling.
#[test]
fn test_set_override_and_empty_values() {
    let mut doc = document(json!({"level": "warn", "empty": ""}));

    set_factory(&json!({"field": "level", "value": "info", "override": false}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["level"], json!("warn"));

    set_factory(&json!({"field": "copied", "copy_from": "empty", "ignore_empty_value": true}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert!(!doc.source.contains_key("copied"));

    let missing = set_factory(&json!({"field": "copied", "copy_from": "nowhere"})).unwrap();
    assert!(matches!(
        missing.apply(&mut doc),
        Err(ZiFault::SourceMissing { .. })
    ));

    let strict = set_factory(&json!({"field": "a.b", "value": 1, "create_parents": false})).unwrap();
    assert!(matches!(
        strict.apply(&mut doc),
        Err(ZiFault::MissingIntermediate { .. })
    ));
}

/// Tests that invalid `set` definitions are rejected.
#[test]
fn test_set_definition_errors() {
    assert!(set_factory(&json!({"field": "a"})).is_err());
    assert!(set_factory(&json!({"field": "a", "value": 1, "copy_from": "b"})).is_err());
    assert!(set_factory(&json!({"field": "_ingest.timestamp", "value": 1})).is_err());
    assert!(set_factory(&json!("a")).is_err());
}

/// Tests that renaming onto an existing field fails and changes nothing.
#[test]
fn test_rename_target_exists() {
    let mut doc = document(json!({"abc": "x", "def": "y"}));
    let rename = rename_factory(&json!({"field": "def", "target_field": "abc"})).unwrap();

    let fault = rename.apply(&mut doc).unwrap_err();
    assert_eq!(fault, ZiFault::TargetExists { field: "abc".into() });
    assert_eq!(fault.to_string(), "field [abc] already exists");
    assert_eq!(doc.source, source(json!({"abc": "x", "def": "y"})));
}

/// Tests rename of missing sources with and without `ignore_missing`.
#[test]
fn test_rename_missing_source() {
    let mut doc = document(json!({"abc": "x"}));

    let strict = rename_factory(&json!({"field": "nope", "target_field": "other"})).unwrap();
    assert_eq!(
        strict.apply(&mut doc).unwrap_err().to_string(),
        "field [nope] doesn't exist"
    );

    let lenient = rename_factory(&json!({
        "field": "nope", "target_field": "other", "ignore_missing": true
    }))
    .unwrap();
    lenient.apply(&mut doc).unwrap();
    assert_eq!(doc.source, source(json!({"abc": "x"})));
}

/// Tests a nested rename with override.
#[test]
fn test_rename_nested_with_override() {
    let mut doc = document(json!({"src": {"ip": "10.0.0.1"}, "source": {"ip": "old"}}));
    rename_factory(&json!({"field": "src.ip", "target_field": "source.ip", "override": true}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["source"]["ip"], json!("10.0.0.1"));
    assert_eq!(doc.source["src"], json!({}));
}

/// Tests `remove` with lists of fields and strict missing checks.
#[test]
fn test_remove_fields() {
    let mut doc = document(json!({"a": 1, "b": {"c": 2}, "d": 3}));

    remove_factory(&json!({"field": ["a", "b.c", "missing"]}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source, source(json!({"b": {}, "d": 3})));

    let strict = remove_factory(&json!({"field": ["d", "missing"], "ignore_missing": false})).unwrap();
    assert!(matches!(
        strict.apply(&mut doc),
        Err(ZiFault::SourceMissing { .. })
    ));
    assert_eq!(doc.source["d"], json!(3));
}

/// Tests `append` promotion of scalars and duplicate suppression.
#[test]
fn test_append() {
    let mut doc = document(json!({"tags": "prod"}));

    append_factory(&json!({"field": "tags", "value": ["eu", "prod"], "allow_duplicates": false}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["tags"], json!(["prod", "eu"]));

    append_factory(&json!({"field": "related.hosts", "value": "web-01"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["related"]["hosts"], json!(["web-01"]));
}

/// Tests string transforms on scalars and lists.
#[test]
fn test_string_transforms() {
    let mut doc = document(json!({"level": "WARN", "names": [" a ", "b "], "n": 1}));

    lowercase_factory(&json!({"field": "level", "target_field": "log.level"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    trim_factory(&json!({"field": "names"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["log"]["level"], json!("warn"));
    assert_eq!(doc.source["level"], json!("WARN"));
    assert_eq!(doc.source["names"], json!(["a", "b"]));

    let wrong = lowercase_factory(&json!({"field": "n"})).unwrap();
    assert!(matches!(wrong.apply(&mut doc), Err(ZiFault::WrongType { .. })));

    let missing = lowercase_factory(&json!({"field": "nope"})).unwrap();
    assert!(matches!(
        missing.apply(&mut doc),
        Err(ZiFault::SourceMissing { .. })
    ));
}

/// Tests split and join.
#[test]
fn test_split_and_join() {
    let mut doc = document(json!({"csv": "a, b,,c,,"}));

    split_factory(&json!({"field": "csv", "separator": r"\s*,\s*", "target_field": "parts"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["parts"], json!(["a", "b", "", "c"]));

    join_factory(&json!({"field": "parts", "separator": "|", "target_field": "joined"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["joined"], json!("a|b||c"));

    assert!(split_factory(&json!({"field": "csv", "separator": "("})).is_err());
}

/// Tests type conversion, including all-or-nothing list conversion.
#[test]
fn test_convert() {
    let mut doc = document(json!({"port": "8080", "ports": ["1", "x"], "flag": "TRUE"}));

    convert_factory(&json!({"field": "port", "type": "integer"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    convert_factory(&json!({"field": "flag", "type": "boolean"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["port"], json!(8080));
    assert_eq!(doc.source["flag"], json!(true));

    let list = convert_factory(&json!({"field": "ports", "type": "long"})).unwrap();
    assert!(matches!(list.apply(&mut doc), Err(ZiFault::WrongType { .. })));
    assert_eq!(doc.source["ports"], json!(["1", "x"]));

    assert!(convert_factory(&json!({"field": "port", "type": "ip"})).is_err());
}

/// Tests byte size parsing with decimal units.
#[test]
fn test_bytes() {
    assert_eq!(parse_byte_size("100M").unwrap(), 100_000_000);
    assert_eq!(parse_byte_size("2.5G").unwrap(), 2_500_000_000);
    assert!(matches!(
        parse_byte_size("abc"),
        Err(ZiFault::UnparsableSize { .. })
    ));

    let mut doc = document(json!({"size": "2.5GB", "bad": "lots"}));
    bytes_factory(&json!({"field": "size", "target_field": "size_bytes"}))
        .unwrap()
        .apply(&mut doc)
        .unwrap();
    assert_eq!(doc.source["size_bytes"], json!(2_500_000_000_i64));

    let bad = bytes_factory(&json!({"field": "bad"})).unwrap();
    assert_eq!(
        bad.apply(&mut doc).unwrap_err(),
        ZiFault::UnparsableSize { input: "lots".into() }
    );
    assert_eq!(doc.source["bad"], json!("lots"));
}

/// Tests dissect extraction into nested fields.
#[test]
fn test_dissect() {
    let mut doc = document(json!({
        "message": "10.0.0.1 - - [03/Apr/2025:10:00:00] \"GET /index.html\" 200"
    }));
    dissect_factory(&json!({
        "field": "message",
        "pattern": "%{source.ip} %{} %{} [%{timestamp}] \"%{http.method} %{url.path}\" %{http.status}"
    }))
    .unwrap()
    .apply(&mut doc)
    .unwrap();

    assert_eq!(doc.source["source"]["ip"], json!("10.0.0.1"));
    assert_eq!(doc.source["timestamp"], json!("03/Apr/2025:10:00:00"));
    assert_eq!(doc.source["http"]["method"], json!("GET"));
    assert_eq!(doc.source["url"]["path"], json!("/index.html"));
    assert_eq!(doc.source["http"]["status"], json!("200"));
}

/// Tests that a dissect mismatch writes nothing.
#[test]
fn test_dissect_mismatch() {
    let mut doc = document(json!({"message": "no delimiters here"}));
    let before = doc.source.clone();
    let dissect = dissect_factory(&json!({
        "field": "message",
        "pattern": "%{}, %{user.name} %{}"
    }))
    .unwrap();
    assert!(matches!(
        dissect.apply(&mut doc),
        Err(ZiFault::PatternMismatch { .. })
    ));
    assert_eq!(doc.source, before);
}

/// Tests dissect append keys with a separator.
#[test]
fn test_dissect_append() {
    let mut doc = document(json!({"message": "john jacob smith"}));
    dissect_factory(&json!({
        "field": "message",
        "pattern": "%{+name} %{+name} %{+name}",
        "append_separator": " "
    }))
    .unwrap()
    .apply(&mut doc)
    .unwrap();
    assert_eq!(doc.source["name"], json!("john jacob smith"));
}

/// Tests a script computing ingestion latency from `_ingest.timestamp`.
#[test]
fn test_script_latency() {
    let instant = Utc.with_ymd_and_hms(2025, 4, 3, 10, 7, 23).unwrap()
        + chrono::Duration::milliseconds(394);
    let mut doc = document(json!({"@timestamp": "2025-04-03T10:00:00.000Z"}))
        .with_ingest_timestamp(instant);

    script_factory(&json!({
        "source": "ensure(ctx.event.ingestion); ctx.event.ingestion.latency = seconds_between(ctx['@timestamp'], _ingest.timestamp);"
    }))
    .unwrap()
    .apply(&mut doc)
    .unwrap();
    assert_eq!(doc.source["event"]["ingestion"]["latency"], json!(443));
}

/// Tests that script faults surface as runtime faults.
#[test]
fn test_script_runtime_fault() {
    let mut doc = document(json!({"a": 1}));
    let script = script_factory(&json!({"source": "ctx.b = ctx.a / 0;"})).unwrap();
    assert!(matches!(
        script.apply(&mut doc),
        Err(ZiFault::RuntimeFault { .. })
    ));
    assert!(!doc.source.contains_key("b"));

    assert!(script_factory(&json!({"source": "ctx.a = ;"})).is_err());
    assert!(script_factory(&json!({"source": "ctx.a = 1;", "lang": "lua"})).is_err());
}

/// Tests the fail processor.
#[test]
fn test_fail() {
    let mut doc = document(json!({"code": 42}));
    let fail = fail_factory(&json!({"message": "unexpected code {{code}}"})).unwrap();
    assert_eq!(fail.kind(), "fail");
    assert_eq!(
        fail.apply(&mut doc).unwrap_err(),
        ZiFault::UserFail { message: "unexpected code 42".into() }
    );
}
