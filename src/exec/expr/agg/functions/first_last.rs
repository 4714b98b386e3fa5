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
//! `first` and `last` keep the value of the smallest or largest row id seen.
//!
//! Each function claims an auxiliary row id slot ahead of its value slot. The
//! stored row id always names the row whose value is stored, so partial
//! states from shards with disjoint row ids merge to the single-pass answer.

use std::marker::PhantomData;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use super::{FunctionArg, GroupByFunction, SlotClaims, build_primitive_array};
use crate::common::error::ExecError;
use crate::exec::chunk::ChunkRow;
use crate::exec::expr::agg::layout::{SlotType, ValueLayout};
use crate::exec::expr::agg::primitive::SlotPrimitive;
use crate::exec::expr::agg::record::{StateRecord, StateRecordRef};
use crate::exec::expr::scalar::ScalarValue;
use crate::exec::row_buffer::{ROW_ID_NULL, RowId};

const ROW_ID_SLOT: usize = 0;
const VALUE_SLOT: usize = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Pick {
    First,
    Last,
}

impl Pick {
    fn takes(self, candidate: RowId, current: RowId) -> bool {
        if candidate == ROW_ID_NULL {
            return false;
        }
        if current == ROW_ID_NULL {
            return true;
        }
        match self {
            Pick::First => candidate < current,
            Pick::Last => candidate > current,
        }
    }
}

pub(super) struct FirstLastGroupByFunction<T: SlotPrimitive> {
    arg: FunctionArg,
    pick: Pick,
    slots: SlotClaims,
    _marker: PhantomData<T>,
}

impl<T: SlotPrimitive> FirstLastGroupByFunction<T> {
    pub(super) fn new(arg: FunctionArg, pick: Pick) -> Self {
        Self {
            arg,
            pick,
            slots: SlotClaims::default(),
            _marker: PhantomData,
        }
    }

    fn store(&self, record: &mut StateRecord<'_>, row_id: RowId, value: T) {
        record.put_row_id(self.slots.offset(ROW_ID_SLOT), row_id);
        record.put(self.slots.offset(VALUE_SLOT), value);
    }
}

impl<T: SlotPrimitive> GroupByFunction for FirstLastGroupByFunction<T> {
    fn name(&self) -> &'static str {
        match self.pick {
            Pick::First => "first",
            Pick::Last => "last",
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
        self.slots.claim(name, layout, &[SlotType::RowId, T::SLOT])
    }

    fn compute_first(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        row_id: RowId,
    ) -> Result<(), ExecError> {
        let value = self.arg.read::<T>(row)?;
        self.store(record, row_id, value);
        Ok(())
    }

    fn compute_next(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        row_id: RowId,
    ) -> Result<(), ExecError> {
        let current = record.get_row_id(self.slots.offset(ROW_ID_SLOT));
        if self.pick.takes(row_id, current) {
            let value = self.arg.read::<T>(row)?;
            self.store(record, row_id, value);
        }
        Ok(())
    }

    fn merge(&self, dest: &mut StateRecord<'_>, src: StateRecordRef<'_>) {
        let src_row_id = src.get_row_id(self.slots.offset(ROW_ID_SLOT));
        let dest_row_id = dest.get_row_id(self.slots.offset(ROW_ID_SLOT));
        if self.pick.takes(src_row_id, dest_row_id) {
            self.store(dest, src_row_id, src.get::<T>(self.slots.offset(VALUE_SLOT)));
        }
    }

    fn set_null(&self, record: &mut StateRecord<'_>) {
        self.store(record, ROW_ID_NULL, T::NULL);
    }

    fn get_value(&self, record: StateRecordRef<'_>) -> ScalarValue {
        record.get::<T>(self.slots.offset(VALUE_SLOT)).into_scalar()
    }

    fn build_array(&self, records: &[StateRecordRef<'_>]) -> Result<ArrayRef, ExecError> {
        Ok(build_primitive_array::<T>(records, self.slots.offset(VALUE_SLOT)))
    }
}
