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
//! Row sources feeding the group-by and analytic record sources.
//!
//! A source hands out chunks in a deterministic order. Analytic execution
//! needs to see every row before emitting anything, so sources also report
//! whether they are bounded and can be rewound for a repeated execution.

use arrow::datatypes::SchemaRef;

use crate::common::error::ExecError;
use crate::exec::chunk::Chunk;
use crate::runtime::runtime_state::RuntimeState;

pub trait RecordSource: Send {
    fn name(&self) -> &str;

    fn schema(&self) -> SchemaRef;

    /// Whether the source is guaranteed to reach end-of-data.
    fn is_bounded(&self) -> bool {
        true
    }

    /// Restart from the first chunk.
    fn rewind(&mut self) -> Result<(), ExecError>;

    /// Next chunk, or `None` once the source is exhausted.
    fn next_chunk(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, ExecError>;
}

/// Finite in-memory source that emits a fixed list of chunks.
pub struct ValuesSource {
    name: String,
    schema: SchemaRef,
    chunks: Vec<Chunk>,
    pos: usize,
}

impl ValuesSource {
    pub fn try_new(schema: SchemaRef, chunks: Vec<Chunk>) -> Result<Self, ExecError> {
        for (idx, chunk) in chunks.iter().enumerate() {
            if chunk.schema().fields() != schema.fields() {
                return Err(ExecError::plan(format!(
                    "values chunk #{idx} schema does not match source schema"
                )));
            }
        }
        Ok(Self {
            name: "ValuesSource".to_string(),
            schema,
            chunks,
            pos: 0,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn num_rows(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}

impl RecordSource for ValuesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        self.pos = 0;
        Ok(())
    }

    fn next_chunk(&mut self, _state: &RuntimeState) -> Result<Option<Chunk>, ExecError> {
        let Some(chunk) = self.chunks.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        Ok(Some(chunk.clone()))
    }
}
