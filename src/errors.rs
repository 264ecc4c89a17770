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

//! # Zingest Error Module
//!
//! This module defines the two error families used throughout Zingest.
//!
//! ## Build Errors vs. Runtime Faults
//!
//! - [`ZiError`] covers everything that can go wrong while a pipeline is being
//!   constructed: malformed definitions, unknown processors, unparsable
//!   conditions or templates, unreadable files. These are returned to the
//!   caller of the builder and never occur while documents are processed.
//! - [`ZiFault`] is the runtime taxonomy raised by processors and by the
//!   expression evaluator while a document flows through a pipeline. Faults
//!   are intercepted by the executor and surface to callers only as data
//!   inside an execution result.
//!
//! ## Usage
//!
//! ```rust
//! use zingest::errors::{Result, ZiError, ZiFault};
//!
//! fn parse_threshold(raw: &str) -> Result<u64> {
//!     raw.parse().map_err(|_| ZiError::validation("threshold must be an integer"))
//! }
//!
//! let fault = ZiFault::null_encountered("ctx.user.name");
//! assert!(fault.is_evaluation_error());
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type used for pipeline construction.
pub type Result<T> = std::result::Result<T, ZiError>;

/// Result type for runtime operations that may raise a [`ZiFault`].
pub type FaultResult<T> = std::result::Result<T, ZiFault>;

/// Canonical construction-time error for Zingest.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ZiError {
    /// Errors originating from filesystem IO.
    #[error("io error: {0}")]
    Io(String),

    /// Validation errors triggered by invalid definitions or parameters.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for ZiError {
    fn from(err: io::Error) -> Self {
        ZiError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ZiError {
    fn from(err: serde_json::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for ZiError {
    fn from(err: serde_yaml::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl ZiError {
    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        ZiError::Validation {
            message: message.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        ZiError::Internal(message.into())
    }
}

/// Runtime fault raised while a document is being processed.
///
/// Every variant carries enough context to build a useful diagnostic message
/// without access to the processor that raised it. Faults are plain data:
/// they can be cloned into failure contexts, compared in tests, and
/// serialized into simulate responses.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZiFault {
    /// A non-null-safe traversal reached a null or missing ancestor.
    #[error("cannot access '{path}': an ancestor is null or missing")]
    NullEncountered { path: String },

    /// An operator was applied to a value of an incompatible kind.
    #[error("{context}: expected {expected}, found {found}")]
    WrongType {
        expected: String,
        found: String,
        context: String,
    },

    /// A write was attempted below an absent container.
    #[error("cannot set '{path}': parent container does not exist")]
    MissingIntermediate { path: String },

    /// A rename target already holds a value.
    #[error("field [{field}] already exists")]
    TargetExists { field: String },

    /// A rename source is absent.
    #[error("field [{field}] doesn't exist")]
    SourceMissing { field: String },

    /// A dissect pattern did not match its input.
    #[error("unable to find match for dissect pattern: {pattern} against source: {input}")]
    PatternMismatch { pattern: String, input: String },

    /// A human readable size could not be parsed.
    #[error("failed to parse [{input}] as a byte size")]
    UnparsableSize { input: String },

    /// Any failure inside a script transform.
    #[error("runtime error: {message}")]
    RuntimeFault { message: String },

    /// A deliberate abort raised by a fail processor.
    #[error("{message}")]
    UserFail { message: String },
}

impl ZiFault {
    /// Helper to construct null traversal faults.
    pub fn null_encountered(path: impl Into<String>) -> Self {
        ZiFault::NullEncountered { path: path.into() }
    }

    /// Helper to construct type mismatch faults.
    pub fn wrong_type(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        ZiFault::WrongType {
            expected: expected.into(),
            found: found.into(),
            context: context.into(),
        }
    }

    /// Helper to construct script runtime faults.
    pub fn runtime(message: impl Into<String>) -> Self {
        ZiFault::RuntimeFault {
            message: message.into(),
        }
    }

    /// Whether this fault belongs to the evaluation error family raised by
    /// the expression evaluator.
    pub fn is_evaluation_error(&self) -> bool {
        matches!(
            self,
            ZiFault::NullEncountered { .. } | ZiFault::WrongType { .. }
        )
    }

    /// Stable snake_case name of the variant, used in logs and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            ZiFault::NullEncountered { .. } => "null_encountered",
            ZiFault::WrongType { .. } => "wrong_type",
            ZiFault::MissingIntermediate { .. } => "missing_intermediate",
            ZiFault::TargetExists { .. } => "target_exists",
            ZiFault::SourceMissing { .. } => "source_missing",
            ZiFault::PatternMismatch { .. } => "pattern_mismatch",
            ZiFault::UnparsableSize { .. } => "unparsable_size",
            ZiFault::RuntimeFault { .. } => "runtime_fault",
            ZiFault::UserFail { .. } => "user_fail",
        }
    }
}
