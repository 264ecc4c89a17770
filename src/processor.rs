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

//! # Zingest Processor Module
//!
//! This module defines the processor trait and the node wrapper that the
//! executor walks. A processor is one configured mutation step; the node adds
//! the options every processor shares: an optional guard condition, a tag,
//! `ignore_failure`, and a processor-level failure handler.
//!
//! ## Implementing Custom Processors
//!
//! ```rust
//! use zingest::document::ZiDocument;
//! use zingest::errors::FaultResult;
//! use zingest::processor::ZiProcessor;
//!
//! #[derive(Debug)]
//! struct StampProcessor;
//!
//! impl ZiProcessor for StampProcessor {
//!     fn kind(&self) -> &'static str {
//!         "stamp"
//!     }
//!
//!     fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
//!         document.source.insert("stamped".into(), true.into());
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Contract
//!
//! `apply` either succeeds, or raises a [`ZiFault`](crate::errors::ZiFault)
//! and leaves the document exactly as it found it. Processors are immutable
//! after construction and shared across threads.

use serde_json::Value;

use crate::condition::ZiCondition;
use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result};

/// A single document mutation step.
pub trait ZiProcessor: std::fmt::Debug {
    /// Processor type name as used in pipeline definitions (`set`, `rename`).
    fn kind(&self) -> &'static str;

    /// Mutates the document in place.
    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()>;
}

/// Owned, thread-safe processor trait object.
pub type ZiBoxedProcessor = Box<dyn ZiProcessor + Send + Sync>;

/// Builds a processor from its definition options.
pub type ZiProcessorFactory = fn(&Value) -> Result<ZiBoxedProcessor>;

/// A processor together with its shared options.
#[derive(Debug)]
pub struct ZiProcessorNode {
    processor: ZiBoxedProcessor,
    tag: Option<String>,
    description: Option<String>,
    condition: Option<ZiCondition>,
    ignore_failure: bool,
    on_failure: Vec<ZiProcessorNode>,
}

impl ZiProcessorNode {
    #[allow(non_snake_case)]
    pub fn new(processor: ZiBoxedProcessor) -> Self {
        Self {
            processor,
            tag: None,
            description: None,
            condition: None,
            ignore_failure: false,
            on_failure: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_condition(mut self, condition: ZiCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_ignore_failure(mut self, ignore_failure: bool) -> Self {
        self.ignore_failure = ignore_failure;
        self
    }

    pub fn with_on_failure(mut self, handlers: Vec<ZiProcessorNode>) -> Self {
        self.on_failure = handlers;
        self
    }

    pub fn processor(&self) -> &dyn ZiProcessor {
        self.processor.as_ref()
    }

    pub fn processor_type(&self) -> &'static str {
        self.processor.kind()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn condition(&self) -> Option<&ZiCondition> {
        self.condition.as_ref()
    }

    pub fn ignore_failure(&self) -> bool {
        self.ignore_failure
    }

    pub fn on_failure(&self) -> &[ZiProcessorNode] {
        &self.on_failure
    }

    /// Evaluates the guard; a node without one always runs.
    pub fn should_run(&self, document: &ZiDocument) -> FaultResult<bool> {
        match &self.condition {
            Some(condition) => condition.evaluate(document),
            None => Ok(true),
        }
    }

    /// Applies the wrapped processor.
    pub fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        self.processor.apply(document)
    }
}
