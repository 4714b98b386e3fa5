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
use std::marker::PhantomData;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use super::{FunctionArg, GroupByFunction, SlotClaims, build_primitive_array};
use crate::common::error::ExecError;
use crate::exec::chunk::ChunkRow;
use crate::exec::expr::agg::layout::ValueLayout;
use crate::exec::expr::agg::primitive::SlotPrimitive;
use crate::exec::expr::agg::record::{StateRecord, StateRecordRef};
use crate::exec::expr::scalar::ScalarValue;
use crate::exec::row_buffer::RowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Extremum {
    Min,
    Max,
}

impl Extremum {
    /// A null candidate never replaces anything; anything non-null replaces null.
    fn replaces<T: SlotPrimitive>(self, candidate: T, current: T) -> bool {
        if candidate.is_null() {
            return false;
        }
        if current.is_null() {
            return true;
        }
        match self {
            Extremum::Min => candidate < current,
            Extremum::Max => candidate > current,
        }
    }
}

pub(super) struct MinMaxGroupByFunction<T: SlotPrimitive> {
    arg: FunctionArg,
    kind: Extremum,
    slots: SlotClaims,
    _marker: PhantomData<T>,
}

impl<T: SlotPrimitive> MinMaxGroupByFunction<T> {
    pub(super) fn new(arg: FunctionArg, kind: Extremum) -> Self {
        Self {
            arg,
            kind,
            slots: SlotClaims::default(),
            _marker: PhantomData,
        }
    }

    fn offer(&self, record: &mut StateRecord<'_>, candidate: T) {
        let offset = self.slots.offset(0);
        if self.kind.replaces(candidate, record.get::<T>(offset)) {
            record.put(offset, candidate);
        }
    }
}

impl<T: SlotPrimitive> GroupByFunction for MinMaxGroupByFunction<T> {
    fn name(&self) -> &'static str {
        match self.kind {
            Extremum::Min => "min",
            Extremum::Max => "max",
        }
    }

    fn display_name(&self) -> String {
        format!("{}({})", self.name(), self.arg.name)
    }

    fn output_type(&self) -> DataType {
        T::data_type()
    }

    fn init_slots(&mut self, layout: &mut ValueLayout) -> Result<(), ExecError> {
        let name = self.name();
        self.slots.claim(name, layout, &[T::SLOT])
    }

    fn compute_first(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        _row_id: RowId,
    ) -> Result<(), ExecError> {
        record.put(self.slots.offset(0), self.arg.read::<T>(row)?);
        Ok(())
    }

    fn compute_next(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        _row_id: RowId,
    ) -> Result<(), ExecError> {
        let candidate = self.arg.read::<T>(row)?;
        self.offer(record, candidate);
        Ok(())
    }

    fn merge(&self, dest: &mut StateRecord<'_>, src: StateRecordRef<'_>) {
        self.offer(dest, src.get::<T>(self.slots.offset(0)));
    }

    fn set_null(&self, record: &mut StateRecord<'_>) {
        record.put(self.slots.offset(0), T::NULL);
    }

    fn get_value(&self, record: StateRecordRef<'_>) -> ScalarValue {
        record.get::<T>(self.slots.offset(0)).into_scalar()
    }

    fn build_array(&self, records: &[StateRecordRef<'_>]) -> Result<ArrayRef, ExecError> {
        Ok(build_primitive_array::<T>(records, self.slots.offset(0)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int8Array, Int32Array};

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
    fn test_max_int_and_merge() {
        let mut max = MinMaxGroupByFunction::<i32>::new(arg(DataType::Int32), Extremum::Max);
        let layout = init(&mut max);
        let chunk = one_column_chunk(Arc::new(Int32Array::from(vec![5, 3, 9, 1])));
        let bytes = fold(&max, &layout, &chunk, 0);
        assert_eq!(value(&max, &bytes), ScalarValue::Int32(9));

        let other = fold(
            &max,
            &layout,
            &one_column_chunk(Arc::new(Int32Array::from(vec![7]))),
            4,
        );
        assert_eq!(
            merged(&max, &layout, &[bytes.clone(), other.clone()]),
            ScalarValue::Int32(9)
        );
        assert_eq!(merged(&max, &layout, &[other, bytes]), ScalarValue::Int32(9));
    }

    #[test]
    fn test_null_never_wins() {
        let mut min = MinMaxGroupByFunction::<i32>::new(arg(DataType::Int32), Extremum::Min);
        let layout = init(&mut min);
        let chunk = one_column_chunk(Arc::new(Int32Array::from(vec![None, Some(4), None, Some(2)])));
        let bytes = fold(&min, &layout, &chunk, 0);
        assert_eq!(value(&min, &bytes), ScalarValue::Int32(2));

        let nulls = fold(
            &min,
            &layout,
            &one_column_chunk(Arc::new(Int32Array::from(vec![None, None]))),
            0,
        );
        assert!(value(&min, &nulls).is_null());
        assert_eq!(merged(&min, &layout, &[nulls, bytes]), ScalarValue::Int32(2));
    }

    #[test]
    fn test_double_ignores_nan() {
        let mut max = MinMaxGroupByFunction::<f64>::new(arg(DataType::Float64), Extremum::Max);
        let layout = init(&mut max);
        let chunk = one_column_chunk(Arc::new(Float64Array::from(vec![f64::NAN, 1.5, f64::NAN])));
        let bytes = fold(&max, &layout, &chunk, 0);
        assert_eq!(value(&max, &bytes), ScalarValue::Float64(1.5));
    }

    #[test]
    fn test_byte_has_no_null() {
        let mut min = MinMaxGroupByFunction::<i8>::new(arg(DataType::Int8), Extremum::Min);
        let layout = init(&mut min);
        let chunk = one_column_chunk(Arc::new(Int8Array::from(vec![Some(4), None])));
        let bytes = fold(&min, &layout, &chunk, 0);
        assert_eq!(value(&min, &bytes), ScalarValue::Int8(0));
    }
}
