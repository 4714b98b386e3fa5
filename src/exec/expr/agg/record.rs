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
use crate::exec::expr::agg::primitive::SlotPrimitive;
use crate::exec::row_buffer::RowId;

/// Mutable view of one group's state bytes.
pub struct StateRecord<'a> {
    bytes: &'a mut [u8],
}

/// Read-only view of one group's state bytes.
#[derive(Clone, Copy)]
pub struct StateRecordRef<'a> {
    bytes: &'a [u8],
}

impl<'a> StateRecord<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn get<T: SlotPrimitive>(&self, offset: usize) -> T {
        T::load(&self.bytes[offset..offset + T::SLOT.width()])
    }

    pub fn put<T: SlotPrimitive>(&mut self, offset: usize, value: T) {
        value.store(&mut self.bytes[offset..offset + T::SLOT.width()]);
    }

    pub fn get_i64(&self, offset: usize) -> i64 {
        self.get::<i64>(offset)
    }

    pub fn put_i64(&mut self, offset: usize, value: i64) {
        self.put::<i64>(offset, value);
    }

    pub fn get_row_id(&self, offset: usize) -> RowId {
        self.get_i64(offset)
    }

    pub fn put_row_id(&mut self, offset: usize, row_id: RowId) {
        self.put_i64(offset, row_id);
    }

    pub fn as_view(&self) -> StateRecordRef<'_> {
        StateRecordRef { bytes: self.bytes }
    }
}

impl<'a> StateRecordRef<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn get<T: SlotPrimitive>(&self, offset: usize) -> T {
        T::load(&self.bytes[offset..offset + T::SLOT.width()])
    }

    pub fn get_i64(&self, offset: usize) -> i64 {
        self.get::<i64>(offset)
    }

    pub fn get_row_id(&self, offset: usize) -> RowId {
        self.get_i64(offset)
    }
}
