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

//! # String Processors Module
//!
//! Case folding, trimming, splitting and joining of string fields. Case and
//! trim processors also accept a list of strings and map over it.

use regex::Regex;
use serde_json::Value;

use crate::condition::{display_string, expect_str, ZiValueKind};
use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiError, ZiFault};
use crate::path::ZiFieldPath;
use crate::processor::{ZiBoxedProcessor, ZiProcessor};
use crate::processors::{
    optional_bool, optional_field, options, read_field, required_field, required_str,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiStringOp {
    Lowercase,
    Uppercase,
    Trim,
}

impl ZiStringOp {
    fn name(&self) -> &'static str {
        match self {
            ZiStringOp::Lowercase => "lowercase",
            ZiStringOp::Uppercase => "uppercase",
            ZiStringOp::Trim => "trim",
        }
    }

    fn transform(&self, text: &str) -> String {
        match self {
            ZiStringOp::Lowercase => text.to_lowercase(),
            ZiStringOp::Uppercase => text.to_uppercase(),
            ZiStringOp::Trim => text.trim().to_string(),
        }
    }
}

/// Applies a [`ZiStringOp`] to a string (or list of strings) field.
#[derive(Debug)]
pub struct ZiStringTransform {
    op: ZiStringOp,
    field: ZiFieldPath,
    target_field: Option<ZiFieldPath>,
    ignore_missing: bool,
}

impl ZiStringTransform {
    #[allow(non_snake_case)]
    pub fn new(op: ZiStringOp, field: ZiFieldPath) -> Self {
        Self {
            op,
            field,
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

impl ZiProcessor for ZiStringTransform {
    fn kind(&self) -> &'static str {
        self.op.name()
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let Some(input) = read_field(document, &self.field, self.ignore_missing)? else {
            return Ok(());
        };
        let context = self.op.name();
        let output = match input {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| expect_str(item, context).map(|s| Value::String(self.op.transform(s))))
                    .collect::<FaultResult<Vec<_>>>()?,
            ),
            other => Value::String(self.op.transform(expect_str(other, context)?)),
        };
        let target = self.target_field.as_ref().unwrap_or(&self.field);
        target.set(document, output, true)
    }
}

/// Splits a string field into a list using a regex separator.
#[derive(Debug)]
pub struct ZiSplit {
    field: ZiFieldPath,
    separator: Regex,
    target_field: Option<ZiFieldPath>,
    ignore_missing: bool,
    preserve_trailing: bool,
}

impl ZiSplit {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath, separator: Regex) -> Self {
        Self {
            field,
            separator,
            target_field: None,
            ignore_missing: false,
            preserve_trailing: false,
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

    pub fn with_preserve_trailing(mut self, preserve_trailing: bool) -> Self {
        self.preserve_trailing = preserve_trailing;
        self
    }
}

impl ZiProcessor for ZiSplit {
    fn kind(&self) -> &'static str {
        "split"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let Some(input) = read_field(document, &self.field, self.ignore_missing)? else {
            return Ok(());
        };
        let text = expect_str(input, "split")?;
        let mut parts: Vec<&str> = self.separator.split(text).collect();
        if !self.preserve_trailing {
            while parts.last().is_some_and(|part| part.is_empty()) {
                parts.pop();
            }
        }
        let output = Value::Array(parts.into_iter().map(|part| Value::String(part.to_string())).collect());
        let target = self.target_field.as_ref().unwrap_or(&self.field);
        target.set(document, output, true)
    }
}

/// Joins a list field into a string.
#[derive(Debug)]
pub struct ZiJoin {
    field: ZiFieldPath,
    separator: String,
    target_field: Option<ZiFieldPath>,
}

impl ZiJoin {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath, separator: impl Into<String>) -> Self {
        Self {
            field,
            separator: separator.into(),
            target_field: None,
        }
    }

    pub fn with_target_field(mut self, target_field: Option<ZiFieldPath>) -> Self {
        self.target_field = target_field;
        self
    }
}

impl ZiProcessor for ZiJoin {
    fn kind(&self) -> &'static str {
        "join"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let input = read_field(document, &self.field, false)?.unwrap_or(&Value::Null);
        let Value::Array(items) = input else {
            return Err(ZiFault::wrong_type(
                "join",
                "list",
                ZiValueKind::of(input).to_string(),
            ));
        };
        let joined = items
            .iter()
            .map(display_string)
            .collect::<Vec<_>>()
            .join(&self.separator);
        let target = self.target_field.as_ref().unwrap_or(&self.field);
        target.set(document, Value::String(joined), true)
    }
}

fn string_transform(config: &Value, op: ZiStringOp) -> Result<ZiBoxedProcessor> {
    let kind = op.name();
    let obj = options(config, kind)?;
    Ok(Box::new(
        ZiStringTransform::new(op, required_field(obj, kind, "field")?)
            .with_target_field(optional_field(obj, kind, "target_field")?)
            .with_ignore_missing(optional_bool(obj, kind, "ignore_missing", false)?),
    ))
}

/// Factory for `lowercase`.
pub fn lowercase_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    string_transform(config, ZiStringOp::Lowercase)
}

/// Factory for `uppercase`.
pub fn uppercase_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    string_transform(config, ZiStringOp::Uppercase)
}

/// Factory for `trim`.
pub fn trim_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    string_transform(config, ZiStringOp::Trim)
}

/// Factory for `split`.
pub fn split_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "split")?;
    let pattern = required_str(obj, "split", "separator")?;
    let separator = Regex::new(pattern)
        .map_err(|err| ZiError::validation(format!("split separator '{pattern}' is invalid: {err}")))?;

    Ok(Box::new(
        ZiSplit::new(required_field(obj, "split", "field")?, separator)
            .with_target_field(optional_field(obj, "split", "target_field")?)
            .with_ignore_missing(optional_bool(obj, "split", "ignore_missing", false)?)
            .with_preserve_trailing(optional_bool(obj, "split", "preserve_trailing", false)?),
    ))
}

/// Factory for `join`.
pub fn join_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "join")?;
    Ok(Box::new(
        ZiJoin::new(
            required_field(obj, "join", "field")?,
            required_str(obj, "join", "separator")?,
        )
        .with_target_field(optional_field(obj, "join", "target_field")?),
    ))
}
