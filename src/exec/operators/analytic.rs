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
//! OVER(...) execution: buffer every input row, resolve, then replay.
//!
//! The source is drained into a [`RowBuffer`] while each window function
//! sees every row once, in slices of at most the cancellation interval.
//! After the last row each function resolves against the buffer, and the
//! buffered chunks are replayed in arrival order with one extra column per
//! function.

use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::aggcore_logging::{debug, info};
use crate::common::config;
use crate::common::error::ExecError;
use crate::exec::chunk::Chunk;
use crate::exec::cursor::RecordCursor;
use crate::exec::expr::analytic::{AnalyticFunction, AnalyticFunctionSpec, build_analytic_function};
use crate::exec::row_buffer::{RowBuffer, RowId};
use crate::exec::source::RecordSource;
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::runtime_state::RuntimeState;

pub struct AnalyticRecordSource {
    source: Box<dyn RecordSource>,
    functions: Vec<Box<dyn AnalyticFunction>>,
    buffer: RowBuffer,
    output_schema: SchemaRef,
    parallel_resolution: bool,
    /// Index of the next buffered chunk to replay; `None` until opened.
    replay: Option<usize>,
}

impl AnalyticRecordSource {
    pub fn try_new(
        source: Box<dyn RecordSource>,
        functions: Vec<Box<dyn AnalyticFunction>>,
    ) -> Result<Self, ExecError> {
        if !source.is_bounded() {
            return Err(ExecError::plan(format!(
                "window functions need a bounded input, {} is unbounded",
                source.name()
            )));
        }
        let input_schema = source.schema();
        let mut fields = input_schema
            .fields()
            .iter()
            .map(|field| field.as_ref().clone())
            .collect::<Vec<_>>();
        fields.extend(functions.iter().map(|function| function.output_field()));
        Ok(Self {
            source,
            functions,
            buffer: RowBuffer::new(),
            output_schema: Arc::new(Schema::new(fields)),
            parallel_resolution: config::analytic_parallel_resolution(),
            replay: None,
        })
    }

    pub fn from_specs(
        source: Box<dyn RecordSource>,
        specs: &[AnalyticFunctionSpec],
    ) -> Result<Self, ExecError> {
        let schema = source.schema();
        let functions = specs
            .iter()
            .map(|spec| build_analytic_function(spec, &schema))
            .collect::<Result<Vec<_>, _>>()?;
        Self::try_new(source, functions)
    }

    /// Resolve functions on scoped worker threads instead of one by one.
    pub fn with_parallel_resolution(mut self, parallel: bool) -> Self {
        self.parallel_resolution = parallel;
        self
    }

    pub fn buffered_rows(&self) -> usize {
        self.buffer.len()
    }

    fn reset(&mut self) {
        for function in self.functions.iter_mut() {
            function.reset();
        }
        self.buffer.clear();
        self.replay = None;
    }
}

impl RecordCursor for AnalyticRecordSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.output_schema)
    }

    fn open(&mut self, state: &RuntimeState) -> Result<(), ExecError> {
        self.reset();
        self.buffer
            .set_mem_tracker(MemTracker::new_child("AnalyticRowBuffer", &state.mem_tracker()));

        let result = ingest(self.source.as_mut(), &mut self.buffer, &mut self.functions, state)
            .and_then(|()| {
                resolve(&self.buffer, &mut self.functions, state, self.parallel_resolution)
            });
        if let Err(err) = result {
            if err.is_cancelled() {
                info!("analytic query_id={} cancelled", state.query_id());
            }
            self.reset();
            return Err(err);
        }
        debug!(
            "analytic query_id={} rows={} chunks={} functions={}",
            state.query_id(),
            self.buffer.len(),
            self.buffer.num_chunks(),
            self.functions.len()
        );
        self.replay = Some(0);
        Ok(())
    }

    fn next(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, ExecError> {
        let Some(position) = self.replay else {
            return Err(ExecError::plan("analytic cursor is not open"));
        };
        state.check_cancelled()?;
        let Some((start, chunk)) = self.buffer.chunk_at(position) else {
            return Ok(None);
        };
        let end = start + chunk.len() as RowId;
        let mut columns = chunk.columns().to_vec();
        for function in &self.functions {
            columns.push(function.build_array(start..end)?);
        }
        let batch = RecordBatch::try_new(Arc::clone(&self.output_schema), columns)?;
        self.replay = Some(position + 1);
        Ok(Some(Chunk::new(batch)))
    }

    fn close(&mut self) {
        self.reset();
    }
}

fn ingest(
    source: &mut dyn RecordSource,
    buffer: &mut RowBuffer,
    functions: &mut [Box<dyn AnalyticFunction>],
    state: &RuntimeState,
) -> Result<(), ExecError> {
    source.rewind()?;
    let interval = state.cancel_check_interval_rows().max(1);
    while let Some(chunk) = source.next_chunk(state)? {
        state.check_cancelled()?;
        let rows = buffer.append(chunk.clone())?;
        let mut offset = 0;
        while offset < chunk.len() {
            if offset > 0 {
                state.check_cancelled()?;
            }
            let len = interval.min(chunk.len() - offset);
            let slice = chunk.slice(offset, len);
            for function in functions.iter_mut() {
                function.add_chunk(&slice, rows.start + offset as RowId)?;
            }
            offset += len;
        }
    }
    Ok(())
}

fn resolve(
    buffer: &RowBuffer,
    functions: &mut [Box<dyn AnalyticFunction>],
    state: &RuntimeState,
    parallel: bool,
) -> Result<(), ExecError> {
    if !parallel || functions.len() < 2 {
        for function in functions.iter_mut() {
            state.check_cancelled()?;
            function.finalize_resolution(buffer)?;
        }
        return Ok(());
    }
    state.check_cancelled()?;
    std::thread::scope(|scope| {
        let handles = functions
            .iter_mut()
            .map(|function| scope.spawn(move || function.finalize_resolution(buffer)))
            .collect::<Vec<_>>();
        handles.into_iter().try_for_each(|handle| {
            handle.join().unwrap_or_else(|_| {
                Err(ExecError::Internal("analytic resolution worker panicked".to_string()))
            })
        })
    })?;
    state.check_cancelled()
}
