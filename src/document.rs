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

//! # Zingest Document Module
//!
//! This module provides the document type that flows through ingest
//! pipelines. A document is a mutable tree of key/value nodes whose leaves
//! are one of null, boolean, number, string, list or nested map; this is
//! exactly the shape of [`serde_json::Value`], which is used as the closed
//! value union throughout the crate.
//!
//! Alongside the source tree every document carries an ingest metadata map.
//! It always holds the evaluation instant under `timestamp` and is readable
//! from conditions, scripts and templates through paths rooted at `_ingest`.
//!
//! ## Usage Example
//!
//! ```rust
//! use zingest::document::ZiDocument;
//! use serde_json::json;
//!
//! let document = ZiDocument::from_value(json!({"message": "hello"})).unwrap()
//!     .with_id("doc-1");
//! assert_eq!(document.source["message"], json!("hello"));
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};

/// Key/value map used for document sources and ingest metadata.
pub type ZiSource = Map<String, Value>;

/// Ingest metadata key holding the evaluation instant.
pub const INGEST_TIMESTAMP: &str = "timestamp";
/// Ingest metadata key holding the id of the running pipeline.
pub const INGEST_PIPELINE: &str = "pipeline";

/// Unit of data processed by a pipeline run.
///
/// A document is owned by exactly one executor for the duration of a run and
/// handed to processors by exclusive mutable reference, one at a time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiDocument {
    /// Optional stable identifier, carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The document body processors read and mutate.
    pub source: ZiSource,

    /// Ingest metadata (evaluation timestamp, pipeline id, failure details).
    ///
    /// Processors can read it through `_ingest.*` paths but never write it.
    #[serde(default)]
    pub ingest: ZiSource,
}

impl ZiDocument {
    /// Creates a document from a source map, stamped with the current time.
    #[allow(non_snake_case)]
    pub fn new(source: ZiSource) -> Self {
        ZiDocument {
            id: None,
            source,
            ingest: ZiSource::new(),
        }
        .with_ingest_timestamp(Utc::now())
    }

    /// Creates a document from a JSON value, which must be an object.
    ///
    /// An empty document is an empty map, never null.
    #[allow(non_snake_case)]
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            Value::Null => Ok(Self::new(ZiSource::new())),
            other => Err(ZiError::validation(format!(
                "document source must be an object, found {}",
                crate::condition::ZiValueKind::of(&other)
            ))),
        }
    }

    /// Attaches an identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Overrides the evaluation instant exposed as `_ingest.timestamp`.
    pub fn with_ingest_timestamp(mut self, instant: DateTime<Utc>) -> Self {
        self.ingest.insert(
            INGEST_TIMESTAMP.to_string(),
            Value::String(instant.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        self
    }

    /// Returns the evaluation instant, if the metadata holds a parsable one.
    pub fn ingest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ingest
            .get(INGEST_TIMESTAMP)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|instant| instant.with_timezone(&Utc))
    }

    /// Consumes the document and returns its source as a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.source)
    }
}

impl Default for ZiDocument {
    fn default() -> Self {
        Self::new(ZiSource::new())
    }
}

/// Convenience alias for working on batches of documents.
pub type ZiDocumentBatch = Vec<ZiDocument>;
