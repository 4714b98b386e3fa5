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
//! Keyed aggregate store: one fixed-size state record per distinct key.
//!
//! Records live back to back in a single zero-filled byte region indexed by
//! group id. The region and the key table are charged to the attached
//! memory tracker before they grow.

use std::sync::Arc;

use arrow::array::ArrayRef;

use crate::common::error::ExecError;
use crate::exec::chunk::Chunk;
use crate::exec::expr::agg::{StateRecord, StateRecordRef};
use crate::exec::hash_table::key_table::{EncodedKeys, KeyLookup, KeyTable};
use crate::runtime::mem_tracker::{MemTracker, bytes_to_i64};

pub struct AggMap {
    keys: KeyTable,
    values: Vec<u8>,
    record_size: usize,
    mem_tracker: Option<Arc<MemTracker>>,
    accounted_bytes: i64,
}

impl AggMap {
    pub fn new(keys: KeyTable, record_size: usize) -> Self {
        Self {
            keys,
            values: Vec::new(),
            record_size,
            mem_tracker: None,
            accounted_bytes: 0,
        }
    }

    pub fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        if let Some(current) = self.mem_tracker.take() {
            current.release(self.accounted_bytes);
        }
        tracker.consume(self.accounted_bytes);
        self.mem_tracker = Some(tracker);
    }

    pub fn len(&self) -> usize {
        self.keys.group_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encode(&self, chunk: &Chunk) -> Result<EncodedKeys, ExecError> {
        self.keys.encode(chunk)
    }

    /// Looks up `key`; a new key gets a zero-filled record.
    pub fn find_or_insert(&mut self, key: &[u8]) -> Result<KeyLookup, ExecError> {
        if let Some(group_id) = self.keys.find(key) {
            return Ok(KeyLookup {
                group_id,
                is_new: false,
            });
        }
        self.reserve_for(key.len())?;
        let lookup = self.keys.find_or_insert(key);
        self.values.resize(self.values.len() + self.record_size, 0);
        Ok(lookup)
    }

    pub fn key(&self, group_id: usize) -> &[u8] {
        self.keys.key(group_id)
    }

    pub fn record(&self, group_id: usize) -> StateRecordRef<'_> {
        let start = group_id * self.record_size;
        StateRecordRef::new(&self.values[start..start + self.record_size])
    }

    pub fn record_mut(&mut self, group_id: usize) -> StateRecord<'_> {
        let start = group_id * self.record_size;
        StateRecord::new(&mut self.values[start..start + self.record_size])
    }

    /// Records in group id order.
    pub fn records(&self) -> Vec<StateRecordRef<'_>> {
        (0..self.len()).map(|group_id| self.record(group_id)).collect()
    }

    pub fn build_key_columns(&self) -> Result<Vec<ArrayRef>, ExecError> {
        self.keys.build_key_columns()
    }

    fn reserve_for(&mut self, key_len: usize) -> Result<(), ExecError> {
        let Some(tracker) = self.mem_tracker.as_ref() else {
            return Ok(());
        };
        // Growth is charged as the record plus stored key. Table rehash
        // overhead rides along with the key estimate.
        let bytes = bytes_to_i64(self.record_size + key_len + std::mem::size_of::<usize>() * 2);
        tracker.try_consume(bytes)?;
        self.accounted_bytes += bytes;
        Ok(())
    }

    fn release_all(&mut self) {
        if let Some(tracker) = self.mem_tracker.as_ref() {
            tracker.release(self.accounted_bytes);
        }
        self.accounted_bytes = 0;
    }
}

impl Drop for AggMap {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    fn keys_chunk(keys: Vec<&str>) -> Chunk {
        let schema = Arc::new(Schema::new(vec![Field::new("k", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(keys)) as ArrayRef])
            .expect("record batch");
        Chunk::new(batch)
    }

    #[test]
    fn test_new_records_are_zero_filled_and_addressable() {
        let chunk = keys_chunk(vec!["a", "b", "a"]);
        let table = KeyTable::new(&chunk.schema(), vec![0]).expect("key table");
        let mut map = AggMap::new(table, 8);
        let keys = map.encode(&chunk).expect("encode");
        for row in 0..keys.len() {
            let lookup = map.find_or_insert(keys.key(row)).expect("insert");
            let mut record = map.record_mut(lookup.group_id);
            assert!(lookup.is_new || record.get_i64(0) > 0);
            let count = record.get_i64(0);
            record.put_i64(0, count + 1);
        }
        assert_eq!(map.len(), 2);
        assert_eq!(map.record(0).get_i64(0), 2);
        assert_eq!(map.record(1).get_i64(0), 1);

        let columns = map.build_key_columns().expect("keys");
        let names = columns[0]
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("strings");
        assert_eq!(names.value(0), "a");
    }

    #[test]
    fn test_growth_is_charged_and_released() {
        let chunk = keys_chunk(vec!["a", "b"]);
        let tracker = MemTracker::new_root_with_limit("agg", 1024);
        let table = KeyTable::new(&chunk.schema(), vec![0]).expect("key table");
        let mut map = AggMap::new(table, 16);
        map.set_mem_tracker(Arc::clone(&tracker));
        let keys = map.encode(&chunk).expect("encode");
        map.find_or_insert(keys.key(0)).expect("insert");
        assert!(tracker.current() > 0);
        drop(map);
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn test_limit_rejects_new_group() {
        let chunk = keys_chunk(vec!["a", "b"]);
        let table = KeyTable::new(&chunk.schema(), vec![0]).expect("key table");
        let mut map = AggMap::new(table, 16);
        let keys = map.encode(&chunk).expect("encode");
        // Record, encoded key and two words of table overhead per group.
        let per_group = 16 + keys.key(0).len() + 2 * std::mem::size_of::<usize>();
        let limit = bytes_to_i64(2 * per_group - 1);
        let tracker = MemTracker::new_root_with_limit("agg", limit);
        map.set_mem_tracker(Arc::clone(&tracker));
        map.find_or_insert(keys.key(0)).expect("first group fits");
        assert_eq!(tracker.current(), bytes_to_i64(per_group));
        let err = map.find_or_insert(keys.key(1)).expect_err("second group exceeds");
        assert!(matches!(err, ExecError::ResourceExhausted { .. }));
        assert_eq!(map.len(), 1);
        assert_eq!(tracker.current(), bytes_to_i64(per_group));
    }
}
