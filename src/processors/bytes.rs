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

//! # Bytes Processor Module
//!
//! Converts human readable sizes (`100M`, `2.5GB`, `512k`) into integer byte
//! counts. Units are decimal powers of 1000; the trailing `B` is optional and
//! matching is case-insensitive.

use serde_json::Value;

use crate::condition::ZiValueKind;
use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiFault};
use crate::path::ZiFieldPath;
use crate::processor::{ZiBoxedProcessor, ZiProcessor};
use crate::processors::{optional_bool, optional_field, options, read_field, required_field};

/// Parses a human readable size into bytes using exact integer arithmetic.
///
/// Fractional inputs must resolve to a whole number of bytes.
pub fn parse_byte_size(input: &str) -> FaultResult<i64> {
    let unparsable = || ZiFault::UnparsableSize {
        input: input.to_string(),
    };

    let text = input.trim().to_ascii_uppercase();
    let text = text.strip_suffix('B').unwrap_or(&text);
    let (number, exponent) = match text.chars().last() {
        Some('K') => (&text[..text.len() - 1], 1),
        Some('M') => (&text[..text.len() - 1], 2),
        Some('G') => (&text[..text.len() - 1], 3),
        Some('T') => (&text[..text.len() - 1], 4),
        Some('P') => (&text[..text.len() - 1], 5),
        _ => (text, 0),
    };
    let number = number.trim();

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits_only = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() || !digits_only(whole) || !digits_only(fraction) {
        return Err(unparsable());
    }
    if number.ends_with('.') {
        return Err(unparsable());
    }

    let multiplier = 1000_i64.checked_pow(exponent).ok_or_else(unparsable)?;
    let whole = whole.parse::<i64>().map_err(|_| unparsable())?;
    let mut total = whole.checked_mul(multiplier).ok_or_else(unparsable)?;

    let fraction = fraction.trim_end_matches('0');
    if !fraction.is_empty() {
        let scale = u32::try_from(fraction.len())
            .ok()
            .and_then(|len| 10_i64.checked_pow(len))
            .ok_or_else(unparsable)?;
        let numerator = fraction
            .parse::<i64>()
            .ok()
            .and_then(|digits| digits.checked_mul(multiplier))
            .ok_or_else(unparsable)?;
        if numerator % scale != 0 {
            return Err(unparsable());
        }
        total = total.checked_add(numerator / scale).ok_or_else(unparsable)?;
    }

    Ok(total)
}

#[derive(Debug)]
pub struct ZiBytes {
    field: ZiFieldPath,
    target_field: Option<ZiFieldPath>,
    ignore_missing: bool,
}

impl ZiBytes {
    #[allow(non_snake_case)]
    pub fn new(field: ZiFieldPath) -> Self {
        Self {
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

impl ZiProcessor for ZiBytes {
    fn kind(&self) -> &'static str {
        "bytes"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let Some(input) = read_field(document, &self.field, self.ignore_missing)? else {
            return Ok(());
        };
        let text = input.as_str().ok_or_else(|| {
            ZiFault::wrong_type("bytes", "string", ZiValueKind::of(input).to_string())
        })?;
        let size = parse_byte_size(text)?;
        let target = self.target_field.as_ref().unwrap_or(&self.field);
        target.set(document, Value::from(size), true)
    }
}

/// Factory for `bytes`.
pub fn bytes_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "bytes")?;
    Ok(Box::new(
        ZiBytes::new(required_field(obj, "bytes", "field")?)
            .with_target_field(optional_field(obj, "bytes", "target_field")?)
            .with_ignore_missing(optional_bool(obj, "bytes", "ignore_missing", false)?),
    ))
}
