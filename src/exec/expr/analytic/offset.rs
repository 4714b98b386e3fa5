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
//! `lead`/`lag` and their one-row forms `next`/`prev`.
//!
//! Each partition keeps a ring of its last `offset` row ids. When a row
//! arrives the oldest ring entry is exactly `offset` rows behind it in the
//! same partition, which links the pair in both directions. Resolution then
//! gathers all values with one `take` over the buffered argument column;
//! rows without a partner get the type's sentinel.

use std::collections::VecDeque;
use std::ops::Range;

use arrow::array::{Array, ArrayRef, UInt64Array, new_empty_array};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field};

use super::{
    AnalyticFunction, PartitionTracker, expect_next_row_id, nullable_field, resolved_index,
};
use crate::common::error::ExecError;
use crate::exec::chunk::{Chunk, ChunkRow};
use crate::exec::expr::scalar::{ScalarValue, fill_nulls_with_sentinel};
use crate::exec::row_buffer::{ROW_ID_NULL, RowBuffer, RowId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum OffsetDirection {
    /// Value from `offset` rows later in the partition.
    Following,
    /// Value from `offset` rows earlier in the partition.
    Preceding,
}

pub(super) struct OffsetRowAnalyticFunction {
    name: String,
    arg: usize,
    arg_name: String,
    arg_type: DataType,
    offset: usize,
    direction: OffsetDirection,
    partitions: PartitionTracker,
    recent: Vec<VecDeque<RowId>>,
    sources: Vec<RowId>,
    resolved: Option<ArrayRef>,
}

impl OffsetRowAnalyticFunction {
    pub(super) fn new(
        name: String,
        arg: usize,
        arg_name: String,
        arg_type: DataType,
        offset: usize,
        direction: OffsetDirection,
        partitions: PartitionTracker,
    ) -> Self {
        Self {
            name,
            arg,
            arg_name,
            arg_type,
            offset,
            direction,
            partitions,
            recent: Vec::new(),
            sources: Vec::new(),
            resolved: None,
        }
    }

    fn link(&mut self, partition: usize, row_id: RowId) -> Result<(), ExecError> {
        let index = expect_next_row_id(&self.name, self.sources.len(), row_id)?;
        if self.recent.len() <= partition {
            self.recent.resize_with(partition + 1, VecDeque::new);
        }
        self.sources.push(ROW_ID_NULL);
        let ring = &mut self.recent[partition];
        if ring.len() == self.offset {
            if let Some(behind) = ring.pop_front() {
                match self.direction {
                    OffsetDirection::Following => self.sources[behind as usize] = row_id,
                    OffsetDirection::Preceding => self.sources[index] = behind,
                }
            }
        }
        ring.push_back(row_id);
        Ok(())
    }

    fn resolved_values(&self) -> Result<&ArrayRef, ExecError> {
        self.resolved.as_ref().ok_or_else(|| {
            ExecError::plan(format!("{}: value requested before resolution", self.name))
        })
    }
}

impl AnalyticFunction for OffsetRowAnalyticFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_field(&self) -> Field {
        nullable_field(
            format!("{}({})", self.name, self.arg_name),
            self.arg_type.clone(),
        )
    }

    fn add_row(&mut self, row: ChunkRow<'_>, row_id: RowId) -> Result<(), ExecError> {
        let partition = self.partitions.partition_id(row)?;
        self.link(partition, row_id)
    }

    fn add_chunk(&mut self, chunk: &Chunk, first_row_id: RowId) -> Result<(), ExecError> {
        let partitions = self.partitions.partition_ids(chunk)?;
        for (row, partition) in partitions.into_iter().enumerate() {
            self.link(partition, first_row_id + row as RowId)?;
        }
        Ok(())
    }

    fn finalize_resolution(&mut self, buffer: &RowBuffer) -> Result<(), ExecError> {
        if buffer.len() != self.sources.len() {
            return Err(ExecError::Internal(format!(
                "{}: buffer holds {} rows, function saw {}",
                self.name,
                buffer.len(),
                self.sources.len()
            )));
        }
        let resolved = if self.sources.is_empty() {
            new_empty_array(&self.arg_type)
        } else {
            let column = buffer.column(self.arg)?;
            let indices = UInt64Array::from_iter(
                self.sources
                    .iter()
                    .map(|&source| (source != ROW_ID_NULL).then_some(source as u64)),
            );
            take(column.as_ref(), &indices, None)?
        };
        self.recent.clear();
        self.resolved = Some(resolved);
        Ok(())
    }

    fn reset(&mut self) {
        self.partitions.clear();
        self.recent.clear();
        self.sources.clear();
        self.resolved = None;
    }

    fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    fn value_for(&self, row_id: RowId) -> Result<ScalarValue, ExecError> {
        let values = self.resolved_values()?;
        let index = resolved_index(&self.name, true, values.len(), row_id)?;
        Ok(ScalarValue::from_array(values.as_ref(), index)?)
    }

    fn build_array(&self, row_ids: Range<RowId>) -> Result<ArrayRef, ExecError> {
        let values = self.resolved_values()?;
        if row_ids.start < 0 || row_ids.end < row_ids.start || row_ids.end as usize > values.len()
        {
            return Err(ExecError::Internal(format!(
                "{}: row range {:?} out of bounds for {} rows",
                self.name,
                row_ids,
                values.len()
            )));
        }
        let start = row_ids.start as usize;
        let len = (row_ids.end - row_ids.start) as usize;
        let slice = values.slice(start, len);
        Ok(fill_nulls_with_sentinel(&slice)?)
    }
}
