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

//! # Processors Module
//!
//! This module contains the built-in processors. Each one implements
//! [`ZiProcessor`](crate::processor::ZiProcessor) and ships a factory that
//! builds it from definition options.
//!
//! ## Processor Families
//!
//! - **field**: set, rename, remove, append
//! - **string**: lowercase, uppercase, trim, split, join
//! - **convert**: type conversion
//! - **dissect**: delimiter based extraction
//! - **bytes**: human readable sizes to byte counts
//! - **script**: expression language statements
//! - **fail**: deliberate abort with a templated message

pub mod bytes;
pub mod convert;
pub mod dissect;
pub mod fail;
pub mod field;
pub mod script;
pub mod string;

use serde_json::{Map, Value};

use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiError, ZiFault};
use crate::path::{ZiFieldPath, ZiLookup};

/// Returns the options object of a processor definition.
pub(crate) fn options<'a>(config: &'a Value, kind: &str) -> Result<&'a Map<String, Value>> {
    config
        .as_object()
        .ok_or_else(|| ZiError::validation(format!("{kind} config must be object")))
}

pub(crate) fn required_str<'a>(
    options: &'a Map<String, Value>,
    kind: &str,
    key: &str,
) -> Result<&'a str> {
    options
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ZiError::validation(format!("{kind} requires string '{key}'")))
}

pub(crate) fn optional_str<'a>(
    options: &'a Map<String, Value>,
    kind: &str,
    key: &str,
) -> Result<Option<&'a str>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ZiError::validation(format!("{kind} option '{key}' must be a string"))),
    }
}

pub(crate) fn optional_bool(
    options: &Map<String, Value>,
    kind: &str,
    key: &str,
    default: bool,
) -> Result<bool> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(ZiError::validation(format!("{kind} option '{key}' must be a boolean"))),
    }
}

/// Parses a writable field path option.
pub(crate) fn required_field(
    options: &Map<String, Value>,
    kind: &str,
    key: &str,
) -> Result<ZiFieldPath> {
    ZiFieldPath::parse_writable(required_str(options, kind, key)?)
}

pub(crate) fn optional_field(
    options: &Map<String, Value>,
    kind: &str,
    key: &str,
) -> Result<Option<ZiFieldPath>> {
    optional_str(options, kind, key)?
        .map(ZiFieldPath::parse_writable)
        .transpose()
}

/// Reads the input field of a single-field processor.
///
/// Missing and null fields yield `Ok(None)` under `ignore_missing`, and
/// `SourceMissing` otherwise.
pub(crate) fn read_field<'a>(
    document: &'a ZiDocument,
    field: &ZiFieldPath,
    ignore_missing: bool,
) -> FaultResult<Option<&'a Value>> {
    match field.null_safe().resolve(document)? {
        ZiLookup::Found(value) if !value.is_null() => Ok(Some(value)),
        _ if ignore_missing => Ok(None),
        _ => Err(ZiFault::SourceMissing {
            field: field.to_string(),
        }),
    }
}

/// Runs a multi-step mutation, restoring the source if any step faults.
pub(crate) fn atomically<F>(document: &mut ZiDocument, mutation: F) -> FaultResult<()>
where
    F: FnOnce(&mut ZiDocument) -> FaultResult<()>,
{
    let snapshot = document.source.clone();
    let result = mutation(document);
    if result.is_err() {
        document.source = snapshot;
    }
    result
}
