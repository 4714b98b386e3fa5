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
use std::ops::Range;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field};

use super::{
    AnalyticFunction, PartitionTracker, expect_next_row_id, nullable_field, resolved_index,
};
use crate::common::error::ExecError;
use crate::exec::chunk::{Chunk, ChunkRow};
use crate::exec::expr::scalar::ScalarValue;
use crate::exec::row_buffer::{RowBuffer, RowId};

/// 1-based position of each row within its partition, in arrival order.
pub(super) struct RowNumberAnalyticFunction {
    partitions: PartitionTracker,
    counters: Vec<i64>,
    numbers: Vec<i64>,
    resolved: bool,
}

impl RowNumberAnalyticFunction {
    pub(super) fn new(partitions: PartitionTracker) -> Self {
        Self {
            partitions,
            counters: Vec::new(),
            numbers: Vec::new(),
            resolved: false,
        }
    }

    fn number(&mut self, partition: usize, row_id: RowId) -> Result<(), ExecError> {
        expect_next_row_id("row_number", self.numbers.len(), row_id)?;
        if self.counters.len() <= partition {
            self.counters.resize(partition + 1, 0);
        }
        self.counters[partition] += 1;
        self.numbers.push(self.counters[partition]);
        Ok(())
    }
}

impl AnalyticFunction for RowNumberAnalyticFunction {
    fn name(&self) -> &str {
        "row_number"
    }

    fn output_field(&self) -> Field {
        nullable_field("row_number()".to_string(), DataType::Int64)
    }

    fn add_row(&mut self, row: ChunkRow<'_>, row_id: RowId) -> Result<(), ExecError> {
        let partition = self.partitions.partition_id(row)?;
        self.number(partition, row_id)
    }

    fn add_chunk(&mut self, chunk: &Chunk, first_row_id: RowId) -> Result<(), ExecError> {
        let partitions = self.partitions.partition_ids(chunk)?;
        for (row, partition) in partitions.into_iter().enumerate() {
            self.number(partition, first_row_id + row as RowId)?;
        }
        Ok(())
    }

    fn finalize_resolution(&mut self, buffer: &RowBuffer) -> Result<(), ExecError> {
        if buffer.len() != self.numbers.len() {
            return Err(ExecError::Internal(format!(
                "row_number: buffer holds {} rows, function saw {}",
                buffer.len(),
                self.numbers.len()
            )));
        }
        self.resolved = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.partitions.clear();
        self.counters.clear();
        self.numbers.clear();
        self.resolved = false;
    }

    fn is_resolved(&self) -> bool {
        self.resolved
    }

    fn value_for(&self, row_id: RowId) -> Result<ScalarValue, ExecError> {
        let index = resolved_index("row_number", self.resolved, self.numbers.len(), row_id)?;
        Ok(ScalarValue::Int64(self.numbers[index]))
    }

    fn build_array(&self, row_ids: Range<RowId>) -> Result<ArrayRef, ExecError> {
        if !self.resolved {
            return Err(ExecError::plan("row_number: value requested before resolution"));
        }
        if row_ids.is_empty() {
            return Ok(Arc::new(Int64Array::from(Vec::<i64>::new())));
        }
        let start = resolved_index("row_number", self.resolved, self.numbers.len(), row_ids.start)?;
        let last = resolved_index("row_number", self.resolved, self.numbers.len(), row_ids.end - 1)?;
        Ok(Arc::new(Int64Array::from(self.numbers[start..=last].to_vec())))
    }
}
