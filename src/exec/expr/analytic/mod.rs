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
//! Window functions evaluated over a full, buffered input.
//!
//! Rows are announced once each, in row id order, through `add_row` or the
//! batched `add_chunk`. After the last row the pipeline calls
//! `finalize_resolution` once; only then may `value_for` be asked. A
//! function keeps what it needs per partition while rows stream in and does
//! the cross-row work in a single resolution pass.

use std::ops::Range;

use arrow::array::ArrayRef;
use arrow::datatypes::{DataType, Field, SchemaRef};

use crate::common::error::ExecError;
use crate::exec::chunk::{Chunk, ChunkRow};
use crate::exec::expr::scalar::{ScalarValue, is_supported_value_type};
use crate::exec::hash_table::key_table::KeyTable;
use crate::exec::row_buffer::{RowBuffer, RowId};

mod offset;
mod partition_count;
mod row_number;

use offset::{OffsetDirection, OffsetRowAnalyticFunction};
use partition_count::PartitionCountAnalyticFunction;
use row_number::RowNumberAnalyticFunction;

pub trait AnalyticFunction: Send {
    fn name(&self) -> &str;

    /// Output column of this function; always nullable.
    fn output_field(&self) -> Field;

    fn add_row(&mut self, row: ChunkRow<'_>, row_id: RowId) -> Result<(), ExecError>;

    /// Announces every row of `chunk`, the first one carrying `first_row_id`.
    fn add_chunk(&mut self, chunk: &Chunk, first_row_id: RowId) -> Result<(), ExecError> {
        for row in 0..chunk.len() {
            self.add_row(chunk.row(row), first_row_id + row as RowId)?;
        }
        Ok(())
    }

    fn finalize_resolution(&mut self, buffer: &RowBuffer) -> Result<(), ExecError>;

    /// Drops all per-execution state; the function can run again afterwards.
    fn reset(&mut self);

    fn is_resolved(&self) -> bool;

    fn value_for(&self, row_id: RowId) -> Result<ScalarValue, ExecError>;

    /// Values for a contiguous range of row ids.
    fn build_array(&self, row_ids: Range<RowId>) -> Result<ArrayRef, ExecError> {
        let values = row_ids
            .map(|row_id| self.value_for(row_id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScalarValue::build_array(self.output_field().data_type(), &values)?)
    }
}

/// Plan-level description of one window function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyticFunctionSpec {
    pub name: String,
    pub arg: Option<usize>,
    pub offset: Option<usize>,
    pub partition_by: Vec<usize>,
}

impl AnalyticFunctionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: None,
            offset: None,
            partition_by: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: usize) -> Self {
        self.arg = Some(arg);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn partition_by(mut self, columns: Vec<usize>) -> Self {
        self.partition_by = columns;
        self
    }
}

pub fn build_analytic_function(
    spec: &AnalyticFunctionSpec,
    schema: &SchemaRef,
) -> Result<Box<dyn AnalyticFunction>, ExecError> {
    let name = spec.name.to_ascii_lowercase();
    let partitions = PartitionTracker::new(schema, spec.partition_by.clone())?;
    match name.as_str() {
        "next" | "prev" | "lead" | "lag" => {
            let arg = spec.arg.ok_or_else(|| {
                ExecError::plan(format!("window function {} requires an argument", name))
            })?;
            let field = schema.fields().get(arg).ok_or_else(|| {
                ExecError::plan(format!(
                    "argument column {} out of range for schema with {} fields",
                    arg,
                    schema.fields().len()
                ))
            })?;
            if !is_supported_value_type(field.data_type()) {
                return Err(ExecError::plan(format!(
                    "unsupported input type {:?} for window function {}",
                    field.data_type(),
                    name
                )));
            }
            let offset = match name.as_str() {
                "next" | "prev" => {
                    if spec.offset.is_some_and(|offset| offset != 1) {
                        return Err(ExecError::plan(format!(
                            "window function {} does not take an offset",
                            name
                        )));
                    }
                    1
                }
                _ => spec.offset.unwrap_or(1),
            };
            if offset == 0 {
                return Err(ExecError::plan(format!(
                    "window function {} requires a positive offset",
                    name
                )));
            }
            let direction = match name.as_str() {
                "next" | "lead" => OffsetDirection::Following,
                _ => OffsetDirection::Preceding,
            };
            Ok(Box::new(OffsetRowAnalyticFunction::new(
                name,
                arg,
                field.name().clone(),
                field.data_type().clone(),
                offset,
                direction,
                partitions,
            )))
        }
        "row_number" | "count" => {
            if spec.arg.is_some() || spec.offset.is_some() {
                return Err(ExecError::plan(format!(
                    "window function {} takes no arguments",
                    name
                )));
            }
            if name == "row_number" {
                Ok(Box::new(RowNumberAnalyticFunction::new(partitions)))
            } else {
                Ok(Box::new(PartitionCountAnalyticFunction::new(partitions)))
            }
        }
        _ => Err(ExecError::plan(format!(
            "unknown window function: {}",
            spec.name
        ))),
    }
}

/// Maps partition keys to dense partition ids.
pub(crate) struct PartitionTracker {
    keys: KeyTable,
}

impl PartitionTracker {
    pub(crate) fn new(schema: &SchemaRef, partition_by: Vec<usize>) -> Result<Self, ExecError> {
        Ok(Self {
            keys: KeyTable::new(schema, partition_by)?,
        })
    }

    pub(crate) fn partition_id(&mut self, row: ChunkRow<'_>) -> Result<usize, ExecError> {
        let encoded = self.keys.encode_row(row)?;
        Ok(self.keys.find_or_insert(encoded.key(0)).group_id)
    }

    pub(crate) fn partition_ids(&mut self, chunk: &Chunk) -> Result<Vec<usize>, ExecError> {
        let encoded = self.keys.encode(chunk)?;
        Ok((0..encoded.len())
            .map(|row| self.keys.find_or_insert(encoded.key(row)).group_id)
            .collect())
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Position of `row_id` in a function's per-row state, which must be the
/// next dense id.
pub(crate) fn expect_next_row_id(
    function: &str,
    expected: usize,
    row_id: RowId,
) -> Result<usize, ExecError> {
    if row_id < 0 || row_id as usize != expected {
        return Err(ExecError::Internal(format!(
            "{}: expected row id {}, got {}",
            function, expected, row_id
        )));
    }
    Ok(expected)
}

/// Position of `row_id` among `len` resolved rows.
pub(crate) fn resolved_index(
    function: &str,
    resolved: bool,
    len: usize,
    row_id: RowId,
) -> Result<usize, ExecError> {
    if !resolved {
        return Err(ExecError::plan(format!(
            "{}: value requested before resolution",
            function
        )));
    }
    if row_id < 0 || row_id as usize >= len {
        return Err(ExecError::Internal(format!(
            "{}: row id {} out of range for {} rows",
            function, row_id, len
        )));
    }
    Ok(row_id as usize)
}

pub(crate) fn nullable_field(name: String, data_type: DataType) -> Field {
    Field::new(name, data_type, true)
}
