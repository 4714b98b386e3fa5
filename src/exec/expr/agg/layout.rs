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
use crate::common::error::ExecError;

/// Physical slot kinds a function can claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Auxiliary row identifier, stored as a long.
    RowId,
}

impl SlotType {
    pub fn width(self) -> usize {
        match self {
            SlotType::Bool | SlotType::Byte => 1,
            SlotType::Short => 2,
            SlotType::Int | SlotType::Float => 4,
            SlotType::Long | SlotType::Double | SlotType::RowId => 8,
        }
    }
}

/// Ordered registry of slots claimed by the functions of one query.
///
/// Claims append; offsets of earlier slots never move. The layout is sealed
/// before the first record is allocated and refuses claims afterwards.
#[derive(Clone, Debug, Default)]
pub struct ValueLayout {
    slots: Vec<SlotType>,
    offsets: Vec<usize>,
    record_size: usize,
    sealed: bool,
}

impl ValueLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot and returns its byte offset within a record.
    pub fn claim(&mut self, slot: SlotType) -> Result<usize, ExecError> {
        if self.sealed {
            return Err(ExecError::plan(format!(
                "cannot claim {:?} slot: value layout is sealed",
                slot
            )));
        }
        let offset = self.record_size;
        self.slots.push(slot);
        self.offsets.push(offset);
        self.record_size += slot.width();
        Ok(offset)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_type(&self, index: usize) -> Option<SlotType> {
        self.slots.get(index).copied()
    }

    pub fn offset_of(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }
}
