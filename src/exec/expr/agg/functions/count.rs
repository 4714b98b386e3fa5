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
use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;

use super::{FunctionArg, GroupByFunction, SlotClaims, build_primitive_array};
use crate::common::error::ExecError;
use crate::exec::chunk::ChunkRow;
use crate::exec::expr::agg::layout::{SlotType, ValueLayout};
use crate::exec::expr::agg::record::{StateRecord, StateRecordRef};
use crate::exec::expr::scalar::ScalarValue;
use crate::exec::row_buffer::RowId;

/// `count(*)` without an argument, otherwise rows whose argument is not null.
pub(super) struct CountGroupByFunction {
    arg: Option<FunctionArg>,
    slots: SlotClaims,
}

impl CountGroupByFunction {
    pub(super) fn new(arg: Option<FunctionArg>) -> Self {
        Self {
            arg,
            slots: SlotClaims::default(),
        }
    }

    fn counts(&self, row: ChunkRow<'_>) -> Result<i64, ExecError> {
        let Some(arg) = self.arg.as_ref() else {
            return Ok(1);
        };
        let column = row.column(arg.index)?;
        if column.is_null(row.index()) {
            return Ok(0);
        }
        let value = ScalarValue::from_array(column.as_ref(), row.index())?;
        Ok(i64::from(!value.is_null()))
    }
}

impl GroupByFunction for CountGroupByFunction {
    fn name(&self) -> &'static str {
        "count"
    }

    fn display_name(&self) -> String {
        match self.arg.as_ref() {
            Some(arg) => format!("count({})", arg.name),
            None => "count(*)".to_string(),
        }
    }

    fn output_type(&self) -> DataType {
        DataType::Int64
    }

    fn init_slots(&mut self, layout: &mut ValueLayout) -> Result<(), ExecError> {
        self.slots.claim("count", layout, &[SlotType::Long])
    }

    fn compute_first(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        _row_id: RowId,
    ) -> Result<(), ExecError> {
        record.put_i64(self.slots.offset(0), self.counts(row)?);
        Ok(())
    }

    fn compute_next(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        _row_id: RowId,
    ) -> Result<(), ExecError> {
        let offset = self.slots.offset(0);
        let count = record.get_i64(offset) + self.counts(row)?;
        record.put_i64(offset, count);
        Ok(())
    }

    fn merge(&self, dest: &mut StateRecord<'_>, src: StateRecordRef<'_>) {
        let offset = self.slots.offset(0);
        let count = dest.get_i64(offset) + src.get_i64(offset);
        dest.put_i64(offset, count);
    }

    fn set_null(&self, record: &mut StateRecord<'_>) {
        record.put_i64(self.slots.offset(0), 0);
    }

    fn get_value(&self, record: StateRecordRef<'_>) -> ScalarValue {
        ScalarValue::Int64(record.get_i64(self.slots.offset(0)))
    }

    fn build_array(&self, records: &[StateRecordRef<'_>]) -> Result<ArrayRef, ExecError> {
        Ok(build_primitive_array::<i64>(records, self.slots.offset(0)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int32Array};

    use super::*;
    use crate::exec::expr::agg::functions::test_util::{fold, init, merged, one_column_chunk, value};

    fn arg(data_type: DataType) -> FunctionArg {
        FunctionArg {
            index: 0,
            name: "x".to_string(),
            data_type,
        }
    }

    #[test]
    fn test_count_star_counts_every_row() {
        let mut count = CountGroupByFunction::new(None);
        let layout = init(&mut count);
        let chunk = one_column_chunk(Arc::new(Int32Array::from(vec![None, Some(1), None])));
        let bytes = fold(&count, &layout, &chunk, 0);
        assert_eq!(value(&count, &bytes), ScalarValue::Int64(3));
    }

    #[test]
    fn test_count_column_skips_nulls_and_sentinels() {
        let mut count = CountGroupByFunction::new(Some(arg(DataType::Float64)));
        let layout = init(&mut count);
        let chunk = one_column_chunk(Arc::new(Float64Array::from(vec![
            Some(1.0),
            None,
            Some(f64::NAN),
            Some(2.0),
        ])));
        let bytes = fold(&count, &layout, &chunk, 0);
        assert_eq!(value(&count, &bytes), ScalarValue::Int64(2));
    }

    #[test]
    fn test_merge_adds_partial_counts() {
        let mut count = CountGroupByFunction::new(None);
        let layout = init(&mut count);
        let a = fold(
            &count,
            &layout,
            &one_column_chunk(Arc::new(Int32Array::from(vec![1, 2]))),
            0,
        );
        let b = fold(
            &count,
            &layout,
            &one_column_chunk(Arc::new(Int32Array::from(vec![3]))),
            2,
        );
        assert_eq!(merged(&count, &layout, &[a, b]), ScalarValue::Int64(3));
        assert_eq!(merged(&count, &layout, &[]), ScalarValue::Int64(0));
    }
}
