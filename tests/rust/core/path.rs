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

//! # Zingest Core Tests - Field Paths
//!
//! Covers path parsing, null-safe resolution and writes with and without
//! parent creation.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test path
//! ```

use serde_json::{json, Value};
use zingest::{ZiDocument, ZiFault, ZiFieldPath, ZiLookup, ZiPathRoot};

fn document(value: Value) -> ZiDocument {
    ZiDocument::from_value(value).unwrap()
}

/// Tests that nested keys resolve and a missing leaf is not an error.
#[test]
fn test_resolve_nested_and_missing_leaf() {
    let doc = document(json!({"user": {"name": "ada", "age": null}}));

    let name = ZiFieldPath::parse("user.name").unwrap();
    assert_eq!(name.resolve(&doc).unwrap(), ZiLookup::Found(&json!("ada")));

    let missing = ZiFieldPath::parse("user.email").unwrap();
    assert_eq!(missing.resolve(&doc).unwrap(), ZiLookup::NotFound);

    let age = ZiFieldPath::parse("user.age").unwrap();
    let lookup = age.resolve(&doc).unwrap();
    assert_eq!(lookup, ZiLookup::Found(&Value::Null));
    assert!(!lookup.is_present());
}

/// Tests that traversing through an absent container raises NullEncountered
/// unless the hop is null-safe.
#[test]
fn test_null_safe_hops() {
    let doc = document(json!({"event": {}}));

    let strict = ZiFieldPath::parse("user.name").unwrap();
    assert!(matches!(
        strict.resolve(&doc),
        Err(ZiFault::NullEncountered { .. })
    ));

    let safe = ZiFieldPath::parse("user?.name").unwrap();
    assert_eq!(safe.resolve(&doc).unwrap(), ZiLookup::Null);
    assert_eq!(safe.resolve(&doc).unwrap().to_value(), Value::Null);

    let all_safe = strict.null_safe();
    assert_eq!(all_safe.resolve(&doc).unwrap(), ZiLookup::Null);
}

/// Tests the optional `ctx.` prefix, bracket literals and list indices.
#[test]
fn test_path_forms() {
    let doc = document(json!({
        "@timestamp": "2025-04-03T10:00:00Z",
        "a": {"x.y": 7},
        "tags": ["first", "second"]
    }));

    let prefixed = ZiFieldPath::parse("ctx.a['x.y']").unwrap();
    assert_eq!(prefixed.resolve(&doc).unwrap().value(), Some(&json!(7)));

    let bracketed = ZiFieldPath::parse("ctx['@timestamp']").unwrap();
    assert!(bracketed.resolve(&doc).unwrap().is_present());

    let dotted_index = ZiFieldPath::parse("tags.1").unwrap();
    assert_eq!(dotted_index.resolve(&doc).unwrap().value(), Some(&json!("second")));

    let bracket_index = ZiFieldPath::parse("tags[0]").unwrap();
    assert_eq!(bracket_index.resolve(&doc).unwrap().value(), Some(&json!("first")));
}

/// Tests that `_ingest` paths read metadata and cannot be written.
#[test]
fn test_ingest_paths_are_read_only() {
    let mut doc = document(json!({}));

    let timestamp = ZiFieldPath::parse("_ingest.timestamp").unwrap();
    assert_eq!(timestamp.root(), ZiPathRoot::Ingest);
    assert!(timestamp.resolve(&doc).unwrap().is_present());

    assert!(ZiFieldPath::parse_writable("_ingest.timestamp").is_err());
    assert!(matches!(
        timestamp.set(&mut doc, json!("x"), true),
        Err(ZiFault::RuntimeFault { .. })
    ));
}

/// Tests that malformed path text is rejected at parse time.
#[test]
fn test_invalid_paths() {
    assert!(ZiFieldPath::parse("").is_err());
    assert!(ZiFieldPath::parse("ctx").is_err());
    assert!(ZiFieldPath::parse("_ingest").is_err());
}

/// Tests writes into missing parents with and without `create_parents`.
#[test]
fn test_set_parent_creation() {
    let mut doc = document(json!({"event": {"kind": "x"}}));

    let path = ZiFieldPath::parse("event.ingestion.latency").unwrap();
    assert!(matches!(
        path.set(&mut doc, json!(443), false),
        Err(ZiFault::MissingIntermediate { .. })
    ));
    assert_eq!(doc.source, *json!({"event": {"kind": "x"}}).as_object().unwrap());

    path.set(&mut doc, json!(443), true).unwrap();
    assert_eq!(doc.source["event"]["ingestion"]["latency"], json!(443));
    assert_eq!(doc.source["event"]["kind"], json!("x"));
}

/// Tests that a write blocked by a scalar leaves no partial parents behind.
#[test]
fn test_failed_set_leaves_document_unchanged() {
    let mut doc = document(json!({"a": {"b": "scalar"}}));
    let before = doc.source.clone();

    let path = ZiFieldPath::parse("a.b.c.d").unwrap();
    assert!(path.set(&mut doc, json!(1), true).is_err());
    assert_eq!(doc.source, before);
}

/// Tests `ensure_container` and `remove`.
#[test]
fn test_ensure_and_remove() {
    let mut doc = document(json!({"keep": 1, "drop": {"inner": true}}));

    let ensure = ZiFieldPath::parse("event.ingestion").unwrap();
    ensure.ensure_container(&mut doc).unwrap();
    assert_eq!(doc.source["event"]["ingestion"], json!({}));
    // existing containers are left alone
    ensure.ensure_container(&mut doc).unwrap();

    let scalar = ZiFieldPath::parse("keep").unwrap();
    assert!(matches!(
        scalar.ensure_container(&mut doc),
        Err(ZiFault::WrongType { .. })
    ));

    let inner = ZiFieldPath::parse("drop.inner").unwrap();
    assert_eq!(inner.remove(&mut doc).unwrap(), Some(json!(true)));
    assert_eq!(inner.remove(&mut doc).unwrap(), None);
    assert!(!inner.exists(&doc));
    assert!(ZiFieldPath::parse("drop").unwrap().exists(&doc));
}
