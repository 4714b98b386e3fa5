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
use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use super::{FunctionArg, GroupByFunction, SlotClaims};
use crate::common::error::ExecError;
use crate::exec::chunk::ChunkRow;
use crate::exec::expr::agg::layout::{SlotType, ValueLayout};
use crate::exec::expr::agg::primitive::SlotPrimitive;
use crate::exec::expr::agg::record::{StateRecord, StateRecordRef};
use crate::exec::expr::scalar::ScalarValue;
use crate::exec::row_buffer::RowId;

pub(super) trait Summable: SlotPrimitive {
    fn add(self, other: Self) -> Self;
}

impl Summable for i64 {
    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
}

impl Summable for f64 {
    fn add(self, other: Self) -> Self {
        self + other
    }
}

/// Sum of non-null inputs; null when every input is null.
pub(super) struct SumGroupByFunction<T: Summable> {
    arg: FunctionArg,
    slots: SlotClaims,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Summable> SumGroupByFunction<T> {
    pub(super) fn new(arg: FunctionArg) -> Self {
        Self {
            arg,
            slots: SlotClaims::default(),
            _marker: std::marker::PhantomData,
        }
    }

    fn value_offset(&self) -> usize {
        self.slots.offset(0)
    }

    fn seen_offset(&self) -> usize {
        self.slots.offset(1)
    }

    /// Running sum, or `None` while no non-null input has been folded in.
    fn current(&self, record: StateRecordRef<'_>) -> Option<T> {
        record
            .get::<bool>(self.seen_offset())
            .then(|| record.get::<T>(self.value_offset()))
    }

    fn accumulate(&self, record: &mut StateRecord<'_>, value: T) {
        if value.is_null() {
            return;
        }
        let sum = match self.current(record.as_view()) {
            Some(current) => current.add(value),
            None => value,
        };
        record.put(self.value_offset(), sum);
        record.put(self.seen_offset(), true);
    }
}

impl<T: Summable> GroupByFunction for SumGroupByFunction<T> {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn display_name(&self) -> String {
        format!("sum({})", self.arg.name)
    }

    fn output_type(&self) -> DataType {
        T::data_type()
    }

    fn init_slots(&mut self, layout: &mut ValueLayout) -> Result<(), ExecError> {
        // The flag separates "no input yet" from a sum that wrapped onto the sentinel.
        self.slots.claim("sum", layout, &[T::SLOT, SlotType::Bool])
    }

    fn compute_first(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        _row_id: RowId,
    ) -> Result<(), ExecError> {
        self.set_null(record);
        self.accumulate(record, self.arg.read::<T>(row)?);
        Ok(())
    }

    fn compute_next(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        _row_id: RowId,
    ) -> Result<(), ExecError> {
        let value = self.arg.read::<T>(row)?;
        self.accumulate(record, value);
        Ok(())
    }

    fn merge(&self, dest: &mut StateRecord<'_>, src: StateRecordRef<'_>) {
        let Some(partial) = self.current(src) else {
            return;
        };
        let sum = match self.current(dest.as_view()) {
            Some(current) => current.add(partial),
            None => partial,
        };
        dest.put(self.value_offset(), sum);
        dest.put(self.seen_offset(), true);
    }

    fn set_null(&self, record: &mut StateRecord<'_>) {
        record.put(self.value_offset(), T::NULL);
        record.put(self.seen_offset(), false);
    }

    fn get_value(&self, record: StateRecordRef<'_>) -> ScalarValue {
        self.current(record).unwrap_or(T::NULL).into_scalar()
    }

    fn build_array(&self, records: &[StateRecordRef<'_>]) -> Result<ArrayRef, ExecError> {
        Ok(T::build_array(
            records
                .iter()
                .map(|r| self.current(*r).unwrap_or(T::NULL))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array};

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
    fn test_sum_skips_nulls_including_leading() {
        let mut sum = SumGroupByFunction::<i64>::new(arg(DataType::Int64));
        let layout = init(&mut sum);
        let chunk = one_column_chunk(Arc::new(Int64Array::from(vec![None, Some(4), None, Some(6)])));
        let bytes = fold(&sum, &layout, &chunk, 0);
        assert_eq!(value(&sum, &bytes), ScalarValue::Int64(10));
    }

    #[test]
    fn test_all_null_input_sums_to_null() {
        let mut sum = SumGroupByFunction::<f64>::new(arg(DataType::Float64));
        let layout = init(&mut sum);
        let chunk = one_column_chunk(Arc::new(Float64Array::from(vec![None, None])));
        let bytes = fold(&sum, &layout, &chunk, 0);
        assert!(value(&sum, &bytes).is_null());
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let mut sum = SumGroupByFunction::<i64>::new(arg(DataType::Int64));
        let layout = init(&mut sum);
        let whole = one_column_chunk(Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])));
        let expected = value(&sum, &fold(&sum, &layout, &whole, 0));
        let left = fold(&sum, &layout, &whole.slice(0, 2), 0);
        let right = fold(&sum, &layout, &whole.slice(2, 3), 2);
        assert_eq!(merged(&sum, &layout, &[left, right]), expected);
        assert!(merged(&sum, &layout, &[]).is_null());
    }

    #[test]
    fn test_merge_matches_single_pass_across_overflow() {
        let mut sum = SumGroupByFunction::<i64>::new(arg(DataType::Int64));
        let layout = init(&mut sum);
        let whole = one_column_chunk(Arc::new(Int64Array::from(vec![i64::MAX, 1, 5])));
        let expected = value(&sum, &fold(&sum, &layout, &whole, 0));
        assert_eq!(expected, ScalarValue::Int64(i64::MIN.wrapping_add(5)));
        let left = fold(&sum, &layout, &whole.slice(0, 1), 0);
        let right = fold(&sum, &layout, &whole.slice(1, 2), 1);
        assert_eq!(merged(&sum, &layout, &[left, right]), expected);
    }

    #[test]
    fn test_sum_landing_on_sentinel_keeps_accumulating() {
        let mut sum = SumGroupByFunction::<i64>::new(arg(DataType::Int64));
        let layout = init(&mut sum);
        let chunk = one_column_chunk(Arc::new(Int64Array::from(vec![i64::MAX, 1, 1])));
        let bytes = fold(&sum, &layout, &chunk, 0);
        assert_eq!(value(&sum, &bytes), ScalarValue::Int64(i64::MIN + 1));
    }
}
