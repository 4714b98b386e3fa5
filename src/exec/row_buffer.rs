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
//! Append-only row store backing analytic execution.
//!
//! Rows are kept in the chunks they arrived in. Every row gets a dense
//! [`RowId`] in arrival order and a location entry, so random reads are a
//! single index lookup and the final replay walks chunks in order.

use std::ops::Range;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, new_empty_array};
use arrow::compute::concat;
use arrow::datatypes::SchemaRef;

use crate::common::error::ExecError;
use crate::exec::chunk::{Chunk, ChunkRow};
use crate::runtime::mem_tracker::{MemTracker, bytes_to_i64};

/// Dense, strictly increasing row identifier, valid for one execution.
pub type RowId = i64;

/// "No row" marker; also the LONG null sentinel.
pub const ROW_ID_NULL: RowId = i64::MIN;

#[derive(Clone, Copy, Debug)]
struct RowLocation {
    chunk: u32,
    row: u32,
}

#[derive(Debug, Default)]
pub struct RowBuffer {
    schema: Option<SchemaRef>,
    chunks: Vec<Chunk>,
    chunk_starts: Vec<RowId>,
    locations: Vec<RowLocation>,
    mem_tracker: Option<Arc<MemTracker>>,
    accounted_bytes: i64,
}

impl RowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        if let Some(current) = self.mem_tracker.as_ref() {
            if Arc::ptr_eq(current, &tracker) {
                return;
            }
            current.release(self.accounted_bytes);
        }
        tracker.consume(self.accounted_bytes);
        self.mem_tracker = Some(tracker);
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Identifier the next appended row will receive.
    pub fn next_row_id(&self) -> RowId {
        self.locations.len() as RowId
    }

    pub fn schema(&self) -> Option<SchemaRef> {
        self.schema.clone()
    }

    /// Store every row of `chunk`, returning the identifiers assigned to them.
    pub fn append(&mut self, chunk: Chunk) -> Result<Range<RowId>, ExecError> {
        let start = self.next_row_id();
        if chunk.is_empty() {
            return Ok(start..start);
        }
        match self.schema.as_ref() {
            Some(schema) if schema.fields() != chunk.schema().fields() => {
                return Err(ExecError::plan(
                    "row buffer chunk schema differs from the first buffered chunk",
                ));
            }
            Some(_) => {}
            None => self.schema = Some(chunk.schema()),
        }

        let chunk_idx = u32::try_from(self.chunks.len())
            .map_err(|_| ExecError::Internal("row buffer chunk count overflow".to_string()))?;
        let rows = chunk.len();
        let bytes = bytes_to_i64(
            chunk
                .logical_bytes()
                .saturating_add(rows.saturating_mul(std::mem::size_of::<RowLocation>())),
        );
        if let Some(tracker) = self.mem_tracker.as_ref() {
            tracker.try_consume(bytes)?;
        }
        self.accounted_bytes = self.accounted_bytes.saturating_add(bytes);

        self.locations.reserve(rows);
        for row in 0..rows {
            let row = u32::try_from(row)
                .map_err(|_| ExecError::Internal("row buffer chunk too large".to_string()))?;
            self.locations.push(RowLocation {
                chunk: chunk_idx,
                row,
            });
        }
        self.chunk_starts.push(start);
        self.chunks.push(chunk);
        Ok(start..self.next_row_id())
    }

    /// Store a single row, returning its identifier.
    pub fn append_row(&mut self, row: ChunkRow<'_>) -> Result<RowId, ExecError> {
        let range = self.append(row.chunk().slice(row.index(), 1))?;
        Ok(range.start)
    }

    /// O(1) lookup of a previously appended row.
    pub fn read(&self, row_id: RowId) -> Option<ChunkRow<'_>> {
        let idx = usize::try_from(row_id).ok()?;
        let loc = self.locations.get(idx)?;
        let chunk = self.chunks.get(loc.chunk as usize)?;
        Some(chunk.row(loc.row as usize))
    }

    /// Every row in ascending identifier order.
    pub fn scan(&self) -> impl Iterator<Item = (RowId, ChunkRow<'_>)> + '_ {
        self.chunks
            .iter()
            .zip(self.chunk_starts.iter())
            .flat_map(|(chunk, &start)| {
                (0..chunk.len()).map(move |row| (start + row as RowId, chunk.row(row)))
            })
    }

    /// Buffered chunks with the identifier of their first row.
    pub fn chunks(&self) -> impl Iterator<Item = (RowId, &Chunk)> + '_ {
        self.chunk_starts.iter().copied().zip(self.chunks.iter())
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_at(&self, idx: usize) -> Option<(RowId, &Chunk)> {
        Some((*self.chunk_starts.get(idx)?, self.chunks.get(idx)?))
    }

    /// One column over all buffered rows, indexed by row identifier.
    pub fn column(&self, idx: usize) -> Result<ArrayRef, ExecError> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| ExecError::Internal("row buffer is empty".to_string()))?;
        let field = schema.fields().get(idx).ok_or_else(|| {
            ExecError::plan(format!("row buffer has no column at index {idx}"))
        })?;
        let parts = self
            .chunks
            .iter()
            .map(|c| c.column(idx).map(|a| a.as_ref()))
            .collect::<Result<Vec<&dyn Array>, String>>()?;
        match parts.len() {
            0 => Ok(new_empty_array(field.data_type())),
            1 => Ok(Arc::clone(self.chunks[0].column(idx)?)),
            _ => Ok(concat(&parts)?),
        }
    }

    /// Drop every buffered row. Identifiers restart at zero.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.chunk_starts.clear();
        self.locations.clear();
        self.schema = None;
        if let Some(tracker) = self.mem_tracker.as_ref() {
            tracker.release(self.accounted_bytes);
        }
        self.accounted_bytes = 0;
    }
}

impl Drop for RowBuffer {
    fn drop(&mut self) {
        if let Some(tracker) = self.mem_tracker.as_ref() {
            tracker.release(self.accounted_bytes);
        }
    }
}
