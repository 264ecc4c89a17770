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

//! # Script Processor Module
//!
//! Runs statements written in the condition language against the document:
//!
//! ```text
//! ensure(ctx.event.ingestion);
//! ctx.event.ingestion.latency = seconds_between(ctx['@timestamp'], _ingest.timestamp);
//! if (ctx.event.ingestion.latency > 60) { ctx.event.slow = true; } else { remove(ctx.event.slow); }
//! ```
//!
//! Statements run on a working copy; the document is replaced only when the
//! whole body succeeds. Every fault surfaces as `RuntimeFault`.

use serde_json::Value;

use crate::condition::{ZiParser, ZiStatement};
use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiError, ZiFault};
use crate::processor::{ZiBoxedProcessor, ZiProcessor};
use crate::processors::{optional_str, options, required_str};

#[derive(Debug)]
pub struct ZiScript {
    source: String,
    statements: Vec<ZiStatement>,
}

impl ZiScript {
    /// Compiles a script body.
    #[allow(non_snake_case)]
    pub fn new(source: &str) -> Result<Self> {
        let statements = ZiParser::new(source)?.parse_script()?;
        if statements.is_empty() {
            return Err(ZiError::validation("script source may not be empty"));
        }
        Ok(Self {
            source: source.to_string(),
            statements,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn execute(statements: &[ZiStatement], document: &mut ZiDocument) -> FaultResult<()> {
        for statement in statements {
            match statement {
                ZiStatement::Assign { target, value } => {
                    let value = value.evaluate_value(document)?.into_owned();
                    target.set(document, value, false)?;
                }
                ZiStatement::Remove(path) => {
                    path.remove(document)?;
                }
                ZiStatement::Ensure(path) => path.ensure_container(document)?,
                ZiStatement::If {
                    condition,
                    then,
                    otherwise,
                } => {
                    if condition.evaluate(document)? {
                        Self::execute(then, document)?;
                    } else {
                        Self::execute(otherwise, document)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl ZiProcessor for ZiScript {
    fn kind(&self) -> &'static str {
        "script"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        let mut working = document.clone();
        match Self::execute(&self.statements, &mut working) {
            Ok(()) => {
                *document = working;
                Ok(())
            }
            Err(fault @ ZiFault::RuntimeFault { .. }) => Err(fault),
            Err(fault) => Err(ZiFault::runtime(fault.to_string())),
        }
    }
}

/// Factory for `script`.
///
/// Options: `source`, optional `lang` (`painless` and `zingest` accepted).
pub fn script_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "script")?;
    if let Some(lang) = optional_str(obj, "script", "lang")? {
        if lang != "painless" && lang != "zingest" {
            return Err(ZiError::validation(format!("script lang [{lang}] not supported")));
        }
    }
    Ok(Box::new(ZiScript::new(required_str(obj, "script", "source")?)?))
}
