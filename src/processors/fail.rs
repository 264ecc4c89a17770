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

use serde_json::Value;

use crate::document::ZiDocument;
use crate::errors::{FaultResult, Result, ZiFault};
use crate::processor::{ZiBoxedProcessor, ZiProcessor};
use crate::processors::{options, required_str};
use crate::template::ZiTemplate;

/// Aborts the pipeline with a templated message.
#[derive(Debug)]
pub struct ZiFail {
    message: ZiTemplate,
}

impl ZiFail {
    #[allow(non_snake_case)]
    pub fn new(message: ZiTemplate) -> Self {
        Self { message }
    }
}

impl ZiProcessor for ZiFail {
    fn kind(&self) -> &'static str {
        "fail"
    }

    fn apply(&self, document: &mut ZiDocument) -> FaultResult<()> {
        Err(ZiFault::UserFail {
            message: self.message.render(document, None),
        })
    }
}

/// Factory for `fail`.
pub fn fail_factory(config: &Value) -> Result<ZiBoxedProcessor> {
    let obj = options(config, "fail")?;
    let message = ZiTemplate::compile(required_str(obj, "fail", "message")?)?;
    Ok(Box::new(ZiFail::new(message)))
}
