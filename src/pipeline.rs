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

//! # Zingest Pipeline Module
//!
//! This module provides the pipeline type and the executor that drives a
//! document through it.
//!
//! ## Execution Model
//!
//! The executor is a small state machine:
//!
//! ```text
//! Running(i) --guard false / success / ignored--> Running(i + 1)
//! Running(i) --fault--> HandlingFailure(i, context) | Failed(context)
//! HandlingFailure --processor handler ok--> Running(i + 1)
//! HandlingFailure --pipeline handler ok--> Failed(context, handled)
//! HandlingFailure --handler fault--> Failed(handler context)
//! Running(len) --> Succeeded
//! ```
//!
//! A fault in a guard is routed exactly like a fault in `apply`. Handlers are
//! plain processor sequences run over the current document with the failure
//! context exposed as `_ingest.on_failure_*`; a fault inside a handler is
//! terminal.
//!
//! ## Concurrency
//!
//! A [`ZiPipeline`] is immutable once built and can be shared across threads.
//! [`ZiPipeline::simulate`] fans a batch out over rayon when the `parallel`
//! feature is enabled and always returns results in input order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{ZiDocument, ZiDocumentBatch, ZiSource, INGEST_PIPELINE, INGEST_TIMESTAMP};
use crate::errors::ZiFault;
use crate::processor::ZiProcessorNode;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Ingest keys exposing the failure context to handlers.
pub const ON_FAILURE_MESSAGE: &str = "on_failure_message";
pub const ON_FAILURE_PROCESSOR_TYPE: &str = "on_failure_processor_type";
pub const ON_FAILURE_PROCESSOR_TAG: &str = "on_failure_processor_tag";
pub const ON_FAILURE_PIPELINE: &str = "on_failure_pipeline";

/// Diagnostic record of a processor fault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiFailureContext {
    pub processor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub pipeline: String,
    pub message: String,
    pub fault: ZiFault,
}

impl ZiFailureContext {
    #[allow(non_snake_case)]
    pub fn new(node: &ZiProcessorNode, pipeline: &str, fault: ZiFault) -> Self {
        Self {
            processor_type: node.processor_type().to_string(),
            tag: node.tag().map(str::to_string),
            pipeline: pipeline.to_string(),
            message: fault.to_string(),
            fault,
        }
    }

    /// Value of an `_ingest.on_failure_*` variable.
    pub fn variable(&self, key: &str) -> Option<Value> {
        match key {
            ON_FAILURE_MESSAGE => Some(Value::String(self.message.clone())),
            ON_FAILURE_PROCESSOR_TYPE => Some(Value::String(self.processor_type.clone())),
            ON_FAILURE_PROCESSOR_TAG => Some(
                self.tag
                    .as_ref()
                    .map(|tag| Value::String(tag.clone()))
                    .unwrap_or(Value::Null),
            ),
            ON_FAILURE_PIPELINE => Some(Value::String(self.pipeline.clone())),
            _ => None,
        }
    }

    fn project(&self, ingest: &mut ZiSource) {
        for key in FAILURE_KEYS {
            if let Some(value) = self.variable(key) {
                ingest.insert(key.to_string(), value);
            }
        }
    }

    fn clear(ingest: &mut ZiSource) {
        for key in FAILURE_KEYS {
            ingest.shift_remove(key);
        }
    }
}

const FAILURE_KEYS: [&str; 4] = [
    ON_FAILURE_MESSAGE,
    ON_FAILURE_PROCESSOR_TYPE,
    ON_FAILURE_PROCESSOR_TAG,
    ON_FAILURE_PIPELINE,
];

/// Terminal outcome of a pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ZiExecutionResult {
    Succeeded(ZiDocument),
    /// `handled` is set when a pipeline-level handler ran to completion.
    Failed {
        document: ZiDocument,
        failure: ZiFailureContext,
        handled: bool,
    },
}

impl ZiExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ZiExecutionResult::Succeeded(_))
    }

    pub fn document(&self) -> &ZiDocument {
        match self {
            ZiExecutionResult::Succeeded(document) => document,
            ZiExecutionResult::Failed { document, .. } => document,
        }
    }

    pub fn into_document(self) -> ZiDocument {
        match self {
            ZiExecutionResult::Succeeded(document) => document,
            ZiExecutionResult::Failed { document, .. } => document,
        }
    }

    pub fn failure(&self) -> Option<&ZiFailureContext> {
        match self {
            ZiExecutionResult::Succeeded(_) => None,
            ZiExecutionResult::Failed { failure, .. } => Some(failure),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiTraceStatus {
    Success,
    Skipped,
    Error,
    ErrorIgnored,
}

/// One processor step recorded by [`ZiPipeline::run_verbose`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiProcessorTrace {
    pub processor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub status: ZiTraceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<ZiFault>,
    /// Document source after the step.
    pub document: ZiSource,
}

/// Ordered processor list with an optional pipeline-level failure handler.
#[derive(Debug)]
pub struct ZiPipeline {
    id: String,
    description: Option<String>,
    processors: Vec<ZiProcessorNode>,
    on_failure: Vec<ZiProcessorNode>,
}

impl ZiPipeline {
    #[allow(non_snake_case)]
    pub fn new(id: impl Into<String>, processors: Vec<ZiProcessorNode>) -> Self {
        Self {
            id: id.into(),
            description: None,
            processors,
            on_failure: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_on_failure(mut self, handlers: Vec<ZiProcessorNode>) -> Self {
        self.on_failure = handlers;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn processors(&self) -> &[ZiProcessorNode] {
        &self.processors
    }

    pub fn on_failure(&self) -> &[ZiProcessorNode] {
        &self.on_failure
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs one document through the pipeline.
    pub fn run(&self, document: ZiDocument) -> ZiExecutionResult {
        ZiExecutor::new(self, None).run(document)
    }

    /// Runs one document and records every processor step.
    pub fn run_verbose(&self, document: ZiDocument) -> (ZiExecutionResult, Vec<ZiProcessorTrace>) {
        let mut traces = Vec::new();
        let result = ZiExecutor::new(self, Some(&mut traces)).run(document);
        (result, traces)
    }

    /// Runs a batch, one independent run per document, in input order.
    pub fn simulate(&self, documents: ZiDocumentBatch) -> Vec<ZiExecutionResult> {
        #[cfg(feature = "parallel")]
        {
            documents
                .into_par_iter()
                .map(|document| self.run(document))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            documents
                .into_iter()
                .map(|document| self.run(document))
                .collect()
        }
    }
}

/// Runs `document` through `pipeline`.
pub fn run_pipeline(pipeline: &ZiPipeline, document: ZiDocument) -> ZiExecutionResult {
    pipeline.run(document)
}

/// Puts back whatever `_ingest.pipeline` held before the run.
fn restore_pipeline(ingest: &mut ZiSource, previous: Option<Value>) {
    match previous {
        Some(value) => {
            ingest.insert(INGEST_PIPELINE.to_string(), value);
        }
        None => {
            ingest.shift_remove(INGEST_PIPELINE);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandlerScope {
    Processor,
    Pipeline,
}

enum ZiExecutionState {
    Running(usize),
    HandlingFailure {
        index: usize,
        context: ZiFailureContext,
        scope: HandlerScope,
    },
    Succeeded,
    Failed {
        context: ZiFailureContext,
        handled: bool,
    },
}

enum StepOutcome {
    Applied,
    Skipped,
    Ignored,
    Faulted(ZiFault),
}

struct ZiExecutor<'p, 't> {
    pipeline: &'p ZiPipeline,
    traces: Option<&'t mut Vec<ZiProcessorTrace>>,
}

impl<'p, 't> ZiExecutor<'p, 't> {
    fn new(pipeline: &'p ZiPipeline, traces: Option<&'t mut Vec<ZiProcessorTrace>>) -> Self {
        Self { pipeline, traces }
    }

    fn run(mut self, mut document: ZiDocument) -> ZiExecutionResult {
        let pipeline = self.pipeline;
        let id = pipeline.id();
        if !document.ingest.contains_key(INGEST_TIMESTAMP) {
            document = document.with_ingest_timestamp(Utc::now());
        }
        let mut caller_pipeline = document
            .ingest
            .insert(INGEST_PIPELINE.to_string(), Value::String(id.to_string()));

        let processors = pipeline.processors();
        let mut state = ZiExecutionState::Running(0);
        loop {
            state = match state {
                ZiExecutionState::Running(index) if index >= processors.len() => {
                    ZiExecutionState::Succeeded
                }
                ZiExecutionState::Running(index) => {
                    let node = &processors[index];
                    match self.step(node, &mut document) {
                        StepOutcome::Applied | StepOutcome::Skipped | StepOutcome::Ignored => {
                            ZiExecutionState::Running(index + 1)
                        }
                        StepOutcome::Faulted(fault) => {
                            let context = ZiFailureContext::new(node, id, fault);
                            if !node.on_failure().is_empty() {
                                ZiExecutionState::HandlingFailure {
                                    index,
                                    context,
                                    scope: HandlerScope::Processor,
                                }
                            } else if !pipeline.on_failure().is_empty() {
                                ZiExecutionState::HandlingFailure {
                                    index,
                                    context,
                                    scope: HandlerScope::Pipeline,
                                }
                            } else {
                                ZiExecutionState::Failed {
                                    context,
                                    handled: false,
                                }
                            }
                        }
                    }
                }
                ZiExecutionState::HandlingFailure {
                    index,
                    context,
                    scope,
                } => {
                    let handlers = match scope {
                        HandlerScope::Processor => processors[index].on_failure(),
                        HandlerScope::Pipeline => pipeline.on_failure(),
                    };
                    log::warn!(
                        "pipeline [{id}] processor [{}] failed, running {scope:?} handler: {}",
                        context.processor_type,
                        context.message
                    );
                    match self.run_handlers(handlers, &mut document, &context) {
                        Ok(()) if scope == HandlerScope::Processor => {
                            ZiExecutionState::Running(index + 1)
                        }
                        Ok(()) => ZiExecutionState::Failed {
                            context,
                            handled: true,
                        },
                        Err(handler_context) => ZiExecutionState::Failed {
                            context: handler_context,
                            handled: false,
                        },
                    }
                }
                ZiExecutionState::Succeeded => {
                    log::debug!("pipeline [{id}] completed");
                    restore_pipeline(&mut document.ingest, caller_pipeline.take());
                    return ZiExecutionResult::Succeeded(document);
                }
                ZiExecutionState::Failed { context, handled } => {
                    if !handled {
                        log::warn!(
                            "pipeline [{id}] failed at processor [{}]: {}",
                            context.processor_type,
                            context.message
                        );
                    }
                    restore_pipeline(&mut document.ingest, caller_pipeline.take());
                    return ZiExecutionResult::Failed {
                        document,
                        failure: context,
                        handled,
                    };
                }
            };
        }
    }

    /// Runs a handler sequence; the first unignored fault ends it.
    fn run_handlers(
        &mut self,
        handlers: &[ZiProcessorNode],
        document: &mut ZiDocument,
        context: &ZiFailureContext,
    ) -> Result<(), ZiFailureContext> {
        context.project(&mut document.ingest);
        let mut outcome = Ok(());
        for node in handlers {
            if let StepOutcome::Faulted(fault) = self.step(node, document) {
                outcome = Err(ZiFailureContext::new(node, self.pipeline.id(), fault));
                break;
            }
        }
        ZiFailureContext::clear(&mut document.ingest);
        outcome
    }

    fn step(&mut self, node: &ZiProcessorNode, document: &mut ZiDocument) -> StepOutcome {
        let outcome = match node.should_run(document) {
            Ok(false) => {
                log::debug!(
                    "skipping processor [{}] in pipeline [{}]: condition is false",
                    node.processor_type(),
                    self.pipeline.id()
                );
                StepOutcome::Skipped
            }
            Ok(true) => match node.apply(document) {
                Ok(()) => StepOutcome::Applied,
                Err(fault) => StepOutcome::Faulted(fault),
            },
            Err(fault) => StepOutcome::Faulted(fault),
        };

        let outcome = match outcome {
            StepOutcome::Faulted(fault) if node.ignore_failure() => {
                log::debug!(
                    "ignoring failure of processor [{}] in pipeline [{}]: {fault}",
                    node.processor_type(),
                    self.pipeline.id()
                );
                self.record(node, document, ZiTraceStatus::ErrorIgnored, Some(fault));
                return StepOutcome::Ignored;
            }
            other => other,
        };

        match &outcome {
            StepOutcome::Applied => self.record(node, document, ZiTraceStatus::Success, None),
            StepOutcome::Skipped => self.record(node, document, ZiTraceStatus::Skipped, None),
            StepOutcome::Faulted(fault) => {
                self.record(node, document, ZiTraceStatus::Error, Some(fault.clone()))
            }
            StepOutcome::Ignored => {}
        }
        outcome
    }

    fn record(
        &mut self,
        node: &ZiProcessorNode,
        document: &ZiDocument,
        status: ZiTraceStatus,
        fault: Option<ZiFault>,
    ) {
        if let Some(traces) = self.traces.as_mut() {
            traces.push(ZiProcessorTrace {
                processor_type: node.processor_type().to_string(),
                tag: node.tag().map(str::to_string),
                status,
                fault,
                document: document.source.clone(),
            });
        }
    }
}
