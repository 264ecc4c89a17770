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

//! # Zingest Core Library
//!
//! This is the main library entry point for Zingest, an ingest pipeline
//! execution engine. A pipeline is an ordered list of processors that mutate
//! a JSON-like document one step at a time, each optionally gated by a
//! condition and optionally guarded by failure handlers.
//!
//! ## Module Overview
//!
//! - **document**: ZiDocument, the mutable record flowing through pipelines
//! - **path**: Field path parsing and null-safe resolution
//! - **condition**: Expression language for guards and scripts
//! - **template**: `{{field}}` string templates
//! - **processor**: Core processor trait and the node wrapper
//! - **processors**: Built-in processors (set, rename, dissect, bytes, script, ...)
//! - **pipeline**: Executor state machine, execution results, simulate
//! - **builder**: Pipeline construction from JSON / YAML definitions
//! - **errors**: Build errors and runtime faults
//!
//! ## Feature Flags
//!
//! - `parallel` (default): Runs `simulate` batches on rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use zingest::{ZiDocument, ZiPipelineBuilder};
//! use serde_json::json;
//!
//! let pipeline = ZiPipelineBuilder::with_defaults()
//!     .build_from_value(&json!([
//!         {"bytes": {"field": "size"}},
//!         {"set": {"field": "large", "value": true, "if": "ctx.size > 1000000"}}
//!     ]))
//!     .unwrap();
//!
//! let result = pipeline.run(ZiDocument::from_value(json!({"size": "2.5G"})).unwrap());
//! assert!(result.is_success());
//! ```
//!
//! ## Error Handling
//!
//! Building a pipeline returns `Result<T, ZiError>`. Running one never
//! returns an error: processor faults are reported as data inside
//! [`ZiExecutionResult`].

pub mod builder;
pub mod condition;
pub mod document;
pub mod errors;
pub mod path;
pub mod pipeline;
pub mod processor;
pub mod processors;
pub mod template;

pub use builder::{ZiBuilderConfig, ZiPipelineBuilder};
pub use condition::{ZiCondition, ZiExpr, ZiInstanceType, ZiStatement, ZiValueKind};
pub use document::{ZiDocument, ZiDocumentBatch, ZiSource};
pub use errors::{FaultResult, Result, ZiError, ZiFault};
pub use path::{ZiFieldPath, ZiLookup, ZiPathRoot};
pub use pipeline::{
    run_pipeline, ZiExecutionResult, ZiFailureContext, ZiPipeline, ZiProcessorTrace, ZiTraceStatus,
};
pub use processor::{ZiBoxedProcessor, ZiProcessor, ZiProcessorFactory, ZiProcessorNode};
pub use template::ZiTemplate;
