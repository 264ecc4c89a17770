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

//! # Field Processors Module
//!
//! This module provides processors that write, move and delete document
//! fields.
//!
//! ## Processors
//!
//! - **ZiSet**: Writes a constant, templated or copied value
//! - **ZiRename**: Moves a field to a new path
//! - **ZiRemove**: Deletes one or more fields
//! - **ZiAppend**: Adds values to a list field

use serde_json::Value;

use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiError, ZiFault};
use crate::path::{ZiFieldPath, ZiLookup};
use crate::processor::{ZiBoxedProcessor, ZiProcessor};
use crate::processors::{atomically, optional_bool, optional_str, options, required_field};
use crate::template::ZiTemplate;

/// Where a written value comes from.
#[derive(Clone, Debug)]
pub enum ZiValueSource {
    /// Written as is.
    Literal(Value),
    /// Rendered against the document at apply time.
    Template(ZiTemplate),
    /// Read from another field at apply time.
    CopyFrom(ZiFieldPath),
}

impl ZiValueSource {
    /// Strings containing `{{` become templates, everything else is literal.
    pub fn from_config(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) if ZiTemplate::is_template(text) => {
                Ok(ZiValueSource::Template(ZiTemplate::compile(text)?))
            }
            other => Ok(ZiValueSource::Literal(other.clone())),
        }
    }

    fn resolve(&self, document: &ZiDocument) -> FaultResult<Option<Value>> {
        match self {
            ZiValueSource::Literal(value) => Ok(Some(value.clone())),
            ZiValueSource::Template(template) => {
                Ok(Some(Value::String(template.render(document, None))))
            }
            ZiValueSource::CopyFrom(path) => match path.null_safe().resolve(document)? {
                ZiLookup::Found(value) => Ok(Some(value.clone())),
                ZiLookup::NotFound | ZiLookup::Null => Ok(None),
            },
        }
    }
}

/// Writes a value at a field path.
///
/// Parents are created only when `create_parents` is set; otherwise an absent
/// ancestor raises `MissingIntermediate`.
#[derive(Debug)]
pub struct ZiSet {
    field: ZiFieldPath,
    value: ZiValueSource,
    override_existing: bool,
    ignore_empty_value: bool,
    create_parents: bool,
}

impl ZiSet {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath, value: ZiValueSource) -> Self {
        Self {
            field,
            value,
            override_existing: true,
            ignore_empty_value: false,
            create_parents: false,
        }
    }

    pub fn with_override(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }

    pub fn with_ignore_empty_value(mut self, ignore_empty_value: bool) -> Self {
        self.ignore_empty_value = ignore_empty_value;
        self
    }

    pub fn with_create_parents(mut self, create_parents: bool) -> Self {
        self.create_parents = create_parents;
        self
    }
}

impl ZiProcessor for ZiSet {
    fn kind(&self) -> &'static str {
        "set"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        if !self.override_existing {
            if let Ok(ZiLookup::Found(existing)) = self.field.null_safe().resolve(document) {
                if !existing.is_null() {
                    return Ok(());
                }
            }
        }

        let value = match self.value.resolve(document)? {
            Some(value) => value,
            None if self.ignore_empty_value => return Ok(()),
            None => {
                let source = match &self.value {
                    ZiValueSource::CopyFrom(path) => path.to_string(),
                    _ => self.field.to_string(),
                };
                return Err(ZiFault::SourceMissing { field: source });
            }
        };

        let empty = value.is_null() || value.as_str().is_some_and(str::is_empty);
        if self.ignore_empty_value && empty {
            return Ok(());
        }

        self.field.set(document, value, self.create_parents)
    }
}

/// Moves a field to a new path.
#[derive(Debug)]
pub struct ZiRename {
    field: ZiFieldPath,
    target_field: ZiFieldPath,
    ignore_missing: bool,
    override_existing: bool,
}

impl ZiRename {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath, target_field: ZiFieldPath) -> Self {
        Self {
            field,
            target_field,
            ignore_missing: false,
            override_existing: false,
        }
    }

    pub fn with_ignore_missing(mut self, ignore_missing: bool) -> Self {
        self.ignore_missing = ignore_missing;
        self
    }

    pub fn with_override(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }
}

impl ZiProcessor for ZiRename {
    fn kind(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        if !self.field.exists(document) {
            if self.ignore_missing {
                return Ok(());
            }
            return Err(ZiFault::SourceMissing {
                field: self.field.to_string(),
            });
        }

        if !self.override_existing && self.target_field.exists(document) {
            return Err(ZiFault::TargetExists {
                field: self.target_field.to_string(),
            });
        }

        atomically(document, |document| {
            let value = self.field.remove(document)?.unwrap_or(Value::Null);
            self.target_field.set(document, value, true)
        })
    }
}

/// Deletes one or more fields.
///
/// Absent fields are skipped unless `ignore_missing` is turned off, in which
/// case any absent field fails the whole processor before anything is removed.
#[derive(Debug)]
pub struct ZiRemove {
    fields: Vec<ZiFieldPath>,
    ignore_missing: bool,
}

impl ZiRemove {
    #[allow(non_snake_case)]
    pub fn new(fields: Vec<ZiFieldPath>) -> Self {
        Self {
            fields,
            ignore_missing: true,
        }
    }

    pub fn with_ignore_missing(mut self, ignore_missing: bool) -> Self {
        self.ignore_missing = ignore_missing;
        self
    }
}

impl ZiProcessor for ZiRemove {
    fn kind(&self) -> &'static str {
        "remove"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        if !self.ignore_missing {
            if let Some(missing) = self.fields.iter().find(|field| !field.exists(document)) {
                return Err(ZiFault::SourceMissing {
                    field: missing.to_string(),
                });
            }
        }
        for field in &self.fields {
            field.remove(document)?;
        }
        Ok(())
    }
}

/// Appends values to a list field, creating or promoting it as needed.
#[derive(Debug)]
pub struct ZiAppend {
    field: ZiFieldPath,
    values: Vec<ZiValueSource>,
    allow_duplicates: bool,
}

impl ZiAppend {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath, values: Vec<ZiValueSource>) -> Self {
        Self {
            field,
            values,
            allow_duplicates: true,
        }
    }

    pub fn with_allow_duplicates(mut self, allow_duplicates: bool) -> Self {
        self.allow_duplicates = allow_duplicates;
        self
    }
}

impl ZiProcessor for ZiAppend {
    fn kind(&self) -> &'static str {
        "append"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let mut list = match self.field.null_safe().resolve(document)? {
            ZiLookup::Found(Value::Array(items)) => items.clone(),
            ZiLookup::Found(Value::Null) | ZiLookup::NotFound | ZiLookup::Null => Vec::new(),
            ZiLookup::Found(scalar) => vec![scalar.clone()],
        };

        for source in &self.values {
            let Some(value) = source.resolve(document)? else {
                continue;
            };
            if !self.allow_duplicates && list.contains(&value) {
                continue;
            }
            list.push(value);
        }

        self.field.set(document, Value::Array(list), true)
    }
}

/// Factory for `set`.
///
/// Options: `field`, one of `value` / `copy_from`, `override` (default true),
/// `ignore_empty_value`, `create_parents` (default true).
pub fn set_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "set")?;
    let field = required_field(obj, "set", "field")?;

    let value = match (obj.get("value"), optional_str(obj, "set", "copy_from")?) {
        (Some(_), Some(_)) => {
            return Err(ZiError::validation(
                "set accepts only one of 'value' and 'copy_from'",
            ))
        }
        (Some(value), None) => ZiValueSource::from_config(value)?,
        (None, Some(source)) => ZiValueSource::CopyFrom(ZiFieldPath::parse(source)?),
        (None, None) => {
            return Err(ZiError::validation("set requires 'value' or 'copy_from'"));
        }
    };

    Ok(Box::new(
        ZiSet::new(field, value)
            .with_override(optional_bool(obj, "set", "override", true)?)
            .with_ignore_empty_value(optional_bool(obj, "set", "ignore_empty_value", false)?)
            .with_create_parents(optional_bool(obj, "set", "create_parents", true)?),
    ))
}

/// Factory for `rename`.
pub fn rename_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "rename")?;
    let field = required_field(obj, "rename", "field")?;
    let target_field = required_field(obj, "rename", "target_field")?;

    Ok(Box::new(
        ZiRename::new(field, target_field)
            .with_ignore_missing(optional_bool(obj, "rename", "ignore_missing", false)?)
            .with_override(optional_bool(obj, "rename", "override", false)?),
    ))
}

/// Factory for `remove`. `field` may be a string or a list of strings.
pub fn remove_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "remove")?;
    let fields = match obj.get("field") {
        Some(Value::String(field)) => vec![ZiFieldPath::parse_writable(field)?],
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| ZiError::validation("remove fields must be strings"))
                    .and_then(ZiFieldPath::parse_writable)
            })
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(ZiError::validation(
                "remove requires string or non-empty array 'field'",
            ))
        }
    };

    Ok(Box::new(
        ZiRemove::new(fields)
            .with_ignore_missing(optional_bool(obj, "remove", "ignore_missing", true)?),
    ))
}

/// Factory for `append`. `value` may be a single value or a list.
pub fn append_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "append")?;
    let field = required_field(obj, "append", "field")?;
    let values = match obj.get("value") {
        Some(Value::Array(items)) => items
            .iter()
            .map(ZiValueSource::from_config)
            .collect::<Result<Vec<_>>>()?,
        Some(value) => vec![ZiValueSource::from_config(value)?],
        None => return Err(ZiError::validation("append requires 'value'")),
    };

    Ok(Box::new(
        ZiAppend::new(field, values)
            .with_allow_duplicates(optional_bool(obj, "append", "allow_duplicates", true)?),
    ))
}
