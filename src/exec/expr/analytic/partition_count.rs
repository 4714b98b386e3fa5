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
use arrow::datatypes::{DataType, Field};

use super::{
    AnalyticFunction, PartitionTracker, expect_next_row_id, nullable_field, resolved_index,
};
use crate::common::error::ExecError;
use crate::exec::chunk::{Chunk, ChunkRow};
use crate::exec::expr::scalar::ScalarValue;
use crate::exec::row_buffer::{RowBuffer, RowId};

/// `count(*) over (partition by ...)`: every row gets its partition's size,
/// which is only known once the input is exhausted.
pub(super) struct PartitionCountAnalyticFunction {
    partitions: PartitionTracker,
    row_partitions: Vec<usize>,
    counts: Vec<i64>,
    resolved: bool,
}

impl PartitionCountAnalyticFunction {
    pub(super) fn new(partitions: PartitionTracker) -> Self {
        Self {
            partitions,
            row_partitions: Vec::new(),
            counts: Vec::new(),
            resolved: false,
        }
    }

    fn count(&mut self, partition: usize, row_id: RowId) -> Result<(), ExecError> {
        expect_next_row_id("count", self.row_partitions.len(), row_id)?;
        if self.counts.len() <= partition {
            self.counts.resize(partition + 1, 0);
        }
        self.counts[partition] += 1;
        self.row_partitions.push(partition);
        Ok(())
    }
}

impl AnalyticFunction for PartitionCountAnalyticFunction {
    fn name(&self) -> &str {
        "count"
    }

    fn output_field(&self) -> Field {
        nullable_field("count(*)".to_string(), DataType::Int64)
    }

    fn add_row(&mut self, row: ChunkRow<'_>, row_id: RowId) -> Result<(), ExecError> {
        let partition = self.partitions.partition_id(row)?;
        self.count(partition, row_id)
    }

    fn add_chunk(&mut self, chunk: &Chunk, first_row_id: RowId) -> Result<(), ExecError> {
        let partitions = self.partitions.partition_ids(chunk)?;
        for (row, partition) in partitions.into_iter().enumerate() {
            self.count(partition, first_row_id + row as RowId)?;
        }
        Ok(())
    }

    fn finalize_resolution(&mut self, buffer: &RowBuffer) -> Result<(), ExecError> {
        if buffer.len() != self.row_partitions.len() {
            return Err(ExecError::Internal(format!(
                "count: buffer holds {} rows, function saw {}",
                buffer.len(),
                self.row_partitions.len()
            )));
        }
        self.resolved = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.partitions.clear();
        self.row_partitions.clear();
        self.counts.clear();
        self.resolved = false;
    }

    fn is_resolved(&self) -> bool {
        self.resolved
    }

    fn value_for(&self, row_id: RowId) -> Result<ScalarValue, ExecError> {
        let index = resolved_index("count", self.resolved, self.row_partitions.len(), row_id)?;
        Ok(ScalarValue::Int64(self.counts[self.row_partitions[index]]))
    }
}
