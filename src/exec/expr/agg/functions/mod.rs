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
//! Group-by function contract and the name-based registry.

use arrow::array::ArrayRef;
use arrow::datatypes::{DataType, SchemaRef};

use crate::common::error::ExecError;
use crate::exec::chunk::ChunkRow;
use crate::exec::expr::agg::layout::{SlotType, ValueLayout};
use crate::exec::expr::agg::primitive::SlotPrimitive;
use crate::exec::expr::agg::record::{StateRecord, StateRecordRef};
use crate::exec::expr::scalar::ScalarValue;
use crate::exec::row_buffer::RowId;

mod count;
mod first_last;
mod min_max;
mod sum;

use count::CountGroupByFunction;
use first_last::{FirstLastGroupByFunction, Pick};
use min_max::{Extremum, MinMaxGroupByFunction};
use sum::SumGroupByFunction;

/// Folds the rows of one group into slots of that group's state record.
///
/// Lifecycle per group: `compute_first` for the first row, `compute_next`
/// for every later row. Partial results from different shards combine with
/// `merge`; a record that receives no input is prepared with `set_null`.
/// `merge` must be associative and must treat a `set_null` source as the
/// identity.
pub trait GroupByFunction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Output column label, e.g. `max(price)`.
    fn display_name(&self) -> String;

    fn output_type(&self) -> DataType;

    /// Claims this function's slots. Calling it twice is a plan error.
    fn init_slots(&mut self, layout: &mut ValueLayout) -> Result<(), ExecError>;

    fn compute_first(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        row_id: RowId,
    ) -> Result<(), ExecError>;

    fn compute_next(
        &self,
        record: &mut StateRecord<'_>,
        row: ChunkRow<'_>,
        row_id: RowId,
    ) -> Result<(), ExecError>;

    fn merge(&self, dest: &mut StateRecord<'_>, src: StateRecordRef<'_>);

    fn set_null(&self, record: &mut StateRecord<'_>);

    fn get_value(&self, record: StateRecordRef<'_>) -> ScalarValue;

    fn build_array(&self, records: &[StateRecordRef<'_>]) -> Result<ArrayRef, ExecError> {
        let values = records
            .iter()
            .map(|record| self.get_value(*record))
            .collect::<Vec<_>>();
        Ok(ScalarValue::build_array(&self.output_type(), &values)?)
    }

    /// Whether finished records may be read from several threads at once.
    fn is_read_thread_safe(&self) -> bool {
        true
    }
}

/// Input column bound to a function.
#[derive(Clone, Debug)]
pub(crate) struct FunctionArg {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) data_type: DataType,
}

impl FunctionArg {
    fn resolve(schema: &SchemaRef, index: usize) -> Result<Self, ExecError> {
        let field = schema.fields().get(index).ok_or_else(|| {
            ExecError::plan(format!(
                "argument column {} out of range for schema with {} fields",
                index,
                schema.fields().len()
            ))
        })?;
        Ok(Self {
            index,
            name: field.name().clone(),
            data_type: field.data_type().clone(),
        })
    }

    pub(crate) fn read<T: SlotPrimitive>(&self, row: ChunkRow<'_>) -> Result<T, ExecError> {
        let column = row.column(self.index)?;
        Ok(T::read_column(column.as_ref(), row.index())?)
    }
}

/// Slot bookkeeping shared by every function.
#[derive(Clone, Debug, Default)]
pub(crate) struct SlotClaims {
    offsets: Vec<usize>,
}

impl SlotClaims {
    pub(crate) fn claim(
        &mut self,
        function: &str,
        layout: &mut ValueLayout,
        slots: &[SlotType],
    ) -> Result<(), ExecError> {
        if !self.offsets.is_empty() {
            return Err(ExecError::plan(format!(
                "{}: value slots are already initialized",
                function
            )));
        }
        for slot in slots {
            self.offsets.push(layout.claim(*slot)?);
        }
        Ok(())
    }

    /// Offset of the `n`th claimed slot. Only valid after `claim`.
    pub(crate) fn offset(&self, n: usize) -> usize {
        self.offsets[n]
    }
}

pub(crate) fn build_primitive_array<T: SlotPrimitive>(
    records: &[StateRecordRef<'_>],
    offset: usize,
) -> ArrayRef {
    T::build_array(records.iter().map(|r| r.get::<T>(offset)).collect())
}

macro_rules! dispatch_primitive {
    ($data_type:expr, $build:ident, $($args:expr),*) => {
        match $data_type {
            DataType::Boolean => Some($build::<bool>($($args),*)),
            DataType::Int8 => Some($build::<i8>($($args),*)),
            DataType::Int16 => Some($build::<i16>($($args),*)),
            DataType::Int32 => Some($build::<i32>($($args),*)),
            DataType::Int64 => Some($build::<i64>($($args),*)),
            DataType::Float32 => Some($build::<f32>($($args),*)),
            DataType::Float64 => Some($build::<f64>($($args),*)),
            _ => None,
        }
    };
}

fn boxed_min_max<T: SlotPrimitive>(arg: FunctionArg, kind: Extremum) -> Box<dyn GroupByFunction> {
    Box::new(MinMaxGroupByFunction::<T>::new(arg, kind))
}

fn boxed_first_last<T: SlotPrimitive>(arg: FunctionArg, pick: Pick) -> Box<dyn GroupByFunction> {
    Box::new(FirstLastGroupByFunction::<T>::new(arg, pick))
}

/// Builds the function registered under `name` for argument column `arg`.
///
/// Registered: `count` (with or without argument), `sum` over long and
/// double, `min`/`max` over numeric types, `first`/`last` over every
/// fixed-width type.
pub fn build_group_by_function(
    name: &str,
    arg: Option<usize>,
    schema: &SchemaRef,
) -> Result<Box<dyn GroupByFunction>, ExecError> {
    let name = name.to_ascii_lowercase();
    if name == "count" {
        let arg = arg.map(|idx| FunctionArg::resolve(schema, idx)).transpose()?;
        return Ok(Box::new(CountGroupByFunction::new(arg)));
    }

    let arg = match arg {
        Some(idx) => FunctionArg::resolve(schema, idx)?,
        None => {
            return Err(ExecError::plan(format!(
                "aggregate function {} requires an argument",
                name
            )));
        }
    };
    let data_type = arg.data_type.clone();
    let unsupported = || {
        ExecError::plan(format!(
            "unsupported input type {:?} for aggregate function {}",
            data_type, name
        ))
    };
    match name.as_str() {
        "sum" => match &data_type {
            DataType::Int64 => Ok(Box::new(SumGroupByFunction::<i64>::new(arg))),
            DataType::Float64 => Ok(Box::new(SumGroupByFunction::<f64>::new(arg))),
            _ => Err(unsupported()),
        },
        "min" | "max" => {
            let kind = if name == "min" {
                Extremum::Min
            } else {
                Extremum::Max
            };
            if matches!(arg.data_type, DataType::Boolean) {
                return Err(unsupported());
            }
            dispatch_primitive!(arg.data_type.clone(), boxed_min_max, arg, kind)
                .ok_or_else(unsupported)
        }
        "first" | "last" => {
            let pick = if name == "first" {
                Pick::First
            } else {
                Pick::Last
            };
            dispatch_primitive!(arg.data_type.clone(), boxed_first_last, arg, pick)
                .ok_or_else(unsupported)
        }
        _ => Err(ExecError::plan(format!(
            "unknown aggregate function: {}",
            name
        ))),
    }
}
