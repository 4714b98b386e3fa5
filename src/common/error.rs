// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use thiserror::Error;

/// Failure taxonomy of the execution core.
///
/// Numeric edge conditions (overflow, NaN) are never reported here; they are
/// folded into sentinel values by the functions themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// Rejected before any row is processed: duplicate slot claims, unbounded
    /// window input, function/column type mismatch.
    #[error("plan error: {0}")]
    Plan(String),

    /// A buffer or keyed store could not grow within its memory limit.
    #[error("memory limit exceeded in {label}: requested {requested} bytes, limit {limit} bytes")]
    ResourceExhausted {
        label: String,
        requested: i64,
        limit: i64,
    },

    /// Cooperative abort requested through the runtime state.
    #[error("query cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExecError {
    pub fn plan(msg: impl Into<String>) -> Self {
        Self::Plan(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<String> for ExecError {
    fn from(msg: String) -> Self {
        Self::Internal(msg)
    }
}

impl From<arrow::error::ArrowError> for ExecError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::Internal(format!("arrow: {err}"))
    }
}
