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

//! # Convert Processor Module
//!
//! Converts a field to integer, float, string or boolean. Lists are converted
//! element by element; one failing element fails the whole processor.

use serde_json::{Number, Value};

use crate::condition::{display_string, parse_number, ZiValueKind};
use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiError, ZiFault};
use crate::path::ZiFieldPath;
use crate::processor::{ZiBoxedProcessor, ZiProcessor};
use crate::processors::{optional_bool, optional_field, options, read_field, required_field, required_str};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiConvertType {
    Integer,
    Float,
    String,
    Boolean,
    /// Strings that look like numbers or booleans become those, others stay.
    Auto,
}

impl ZiConvertType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "integer" | "long" => ZiConvertType::Integer,
            "float" | "double" => ZiConvertType::Float,
            "string" => ZiConvertType::String,
            "boolean" => ZiConvertType::Boolean,
            "auto" => ZiConvertType::Auto,
            _ => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            ZiConvertType::Integer => "integer",
            ZiConvertType::Float => "float",
            ZiConvertType::String => "string",
            ZiConvertType::Boolean => "boolean",
            ZiConvertType::Auto => "auto",
        }
    }

    fn convert(&self, value: &Value) -> FaultResult<Value> {
        let failed = || {
            ZiFault::wrong_type(
                "convert",
                self.name(),
                match value {
                    Value::String(s) => format!("'{s}'"),
                    other => ZiValueKind::of(other).to_string(),
                },
            )
        };

        match self {
            ZiConvertType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| failed()),
                _ => Err(failed()),
            },
            ZiConvertType::Float => {
                let parsed = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                parsed
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(failed)
            }
            ZiConvertType::String => Ok(Value::String(display_string(value))),
            ZiConvertType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(failed()),
            },
            ZiConvertType::Auto => match value {
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                Value::String(s) => Ok(parse_number(s.trim()).unwrap_or_else(|| value.clone())),
                other => Ok(other.clone()),
            },
        }
    }
}

#[derive(Debug)]
pub struct ZiConvert {
    field: ZiFieldPath,
    kind: ZiConvertType,
    target_field: Option<ZiFieldPath>,
    ignore_missing: bool,
}

impl ZiConvert {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath, kind: ZiConvertType) -> Self {
        Self {
            field,
            kind,
            target_field: None,
            ignore_missing: false,
        }
    }

    pub fn with_target_field(mut self, target_field: Option<ZiFieldPath>) -> Self {
        self.target_field = target_field;
        self
    }

    pub fn with_ignore_missing(mut self, ignore_missing: bool) -> Self {
        self.ignore_missing = ignore_missing;
        self
    }
}

impl ZiProcessor for ZiConvert {
    fn kind(&self) -> &'static str {
        "convert"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let Some(input) = read_field(document, &self.field, self.ignore_missing)? else {
            return Ok(());
        };
        let output = match input {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.kind.convert(item))
                    .collect::<FaultResult<Vec<_>>>()?,
            ),
            other => self.kind.convert(other)?,
        };
        let target = self.target_field.as_ref().unwrap_or(&self.field);
        target.set(document, output, true)
    }
}

/// Factory for `convert`.
///
/// Options: `field`, `type`, `target_field`, `ignore_missing`.
pub fn convert_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "convert")?;
    let name = required_str(obj, "convert", "type")?;
    let kind = ZiConvertType::parse(name)
        .ok_or_else(|| ZiError::validation(format!("convert type [{name}] not supported")))?;

    Ok(Box::new(
        ZiConvert::new(required_field(obj, "convert", "field")?, kind)
            .with_target_field(optional_field(obj, "convert", "target_field")?)
            .with_ignore_missing(optional_bool(obj, "convert", "ignore_missing", false)?),
    ))
}
