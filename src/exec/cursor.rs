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
use arrow::datatypes::SchemaRef;

use crate::common::error::ExecError;
use crate::exec::chunk::Chunk;
use crate::runtime::runtime_state::RuntimeState;

/// Output surface of a record source: `open` runs execution, `next` hands
/// out result chunks until `None`, `close` releases every buffer.
pub trait RecordCursor {
    fn schema(&self) -> SchemaRef;

    fn open(&mut self, state: &RuntimeState) -> Result<(), ExecError>;

    fn next(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, ExecError>;

    fn close(&mut self);
}

/// Open `cursor`, drain it and close it, returning every emitted chunk.
///
/// The cursor is closed on failure as well, so partial results are dropped.
pub fn collect_chunks(
    cursor: &mut dyn RecordCursor,
    state: &RuntimeState,
) -> Result<Vec<Chunk>, ExecError> {
    let result = (|| {
        cursor.open(state)?;
        let mut out = Vec::new();
        while let Some(chunk) = cursor.next(state)? {
            out.push(chunk);
        }
        Ok(out)
    })();
    cursor.close();
    result
}
