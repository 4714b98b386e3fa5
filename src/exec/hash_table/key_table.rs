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
//! Dense group ids for encoded composite keys.
//!
//! Keys are normalized with Arrow's row format so every supported column
//! combination, nulls included, compares as plain bytes. Each distinct key
//! is stored once and receives the next id in first-seen order.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::row::{RowConverter, Rows, SortField};
use hashbrown::HashTable;

use crate::common::error::ExecError;
use crate::exec::chunk::{Chunk, ChunkRow};
use crate::exec::expr::scalar::is_supported_value_type;
use crate::exec::hash_table::hash::KeyHasher;

#[derive(Clone, Copy, Debug)]
struct KeyEntry {
    group_id: usize,
    hash: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyLookup {
    pub group_id: usize,
    pub is_new: bool,
}

/// Keys of one chunk in normalized form.
pub enum EncodedKeys {
    Rows(Rows),
    /// No key columns: every row maps to the single empty key.
    Global(usize),
}

impl EncodedKeys {
    pub fn len(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.num_rows(),
            Self::Global(len) => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key(&self, row: usize) -> &[u8] {
        match self {
            Self::Rows(rows) => rows.row(row).data(),
            Self::Global(_) => &[],
        }
    }
}

pub struct KeyTable {
    key_columns: Vec<usize>,
    converter: Option<RowConverter>,
    table: HashTable<KeyEntry>,
    keys: Vec<Box<[u8]>>,
    hasher: KeyHasher,
}

impl KeyTable {
    pub fn new(schema: &SchemaRef, key_columns: Vec<usize>) -> Result<Self, ExecError> {
        let mut key_types = Vec::with_capacity(key_columns.len());
        for &idx in &key_columns {
            let field = schema.fields().get(idx).ok_or_else(|| {
                ExecError::plan(format!(
                    "key column {} out of range for schema with {} fields",
                    idx,
                    schema.fields().len()
                ))
            })?;
            if !is_supported_value_type(field.data_type()) {
                return Err(ExecError::plan(format!(
                    "unsupported key type {:?} for column {}",
                    field.data_type(),
                    field.name()
                )));
            }
            key_types.push(field.data_type().clone());
        }
        let converter = if key_types.is_empty() {
            None
        } else {
            let fields = key_types.iter().cloned().map(SortField::new).collect();
            Some(RowConverter::new(fields)?)
        };
        Ok(Self {
            key_columns,
            converter,
            table: HashTable::new(),
            keys: Vec::new(),
            hasher: KeyHasher::default(),
        })
    }

    pub fn group_count(&self) -> usize {
        self.keys.len()
    }

    pub fn encode(&self, chunk: &Chunk) -> Result<EncodedKeys, ExecError> {
        let Some(converter) = self.converter.as_ref() else {
            return Ok(EncodedKeys::Global(chunk.len()));
        };
        let mut columns = Vec::with_capacity(self.key_columns.len());
        for &idx in &self.key_columns {
            columns.push(Arc::clone(chunk.column(idx)?));
        }
        Ok(EncodedKeys::Rows(converter.convert_columns(&columns)?))
    }

    /// Encodes a single row. Batch callers should prefer [`Self::encode`].
    pub fn encode_row(&self, row: ChunkRow<'_>) -> Result<EncodedKeys, ExecError> {
        let single = row.chunk().slice(row.index(), 1);
        self.encode(&single)
    }

    pub fn find(&self, key: &[u8]) -> Option<usize> {
        let hash = self.hasher.hash_key(key);
        self.table
            .find(hash, |entry| entry.hash == hash && self.keys[entry.group_id].as_ref() == key)
            .map(|entry| entry.group_id)
    }

    pub fn find_or_insert(&mut self, key: &[u8]) -> KeyLookup {
        let hash = self.hasher.hash_key(key);
        let keys = &self.keys;
        if let Some(entry) = self
            .table
            .find(hash, |entry| entry.hash == hash && keys[entry.group_id].as_ref() == key)
        {
            return KeyLookup {
                group_id: entry.group_id,
                is_new: false,
            };
        }
        let group_id = self.keys.len();
        self.keys.push(key.to_vec().into_boxed_slice());
        self.table
            .insert_unique(hash, KeyEntry { group_id, hash }, |entry| entry.hash);
        KeyLookup {
            group_id,
            is_new: true,
        }
    }

    pub fn key(&self, group_id: usize) -> &[u8] {
        &self.keys[group_id]
    }

    /// Decodes all stored keys back into columns, in group id order.
    pub fn build_key_columns(&self) -> Result<Vec<ArrayRef>, ExecError> {
        let Some(converter) = self.converter.as_ref() else {
            return Ok(Vec::new());
        };
        let parser = converter.parser();
        let rows = self.keys.iter().map(|key| parser.parse(key));
        Ok(converter.convert_rows(rows)?)
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    fn chunk(names: Vec<Option<&str>>, ids: Vec<i32>) -> Chunk {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("id", DataType::Int32, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(names)) as ArrayRef,
                Arc::new(Int32Array::from(ids)) as ArrayRef,
            ],
        )
        .expect("record batch");
        Chunk::new(batch)
    }

    #[test]
    fn test_group_ids_follow_first_seen_order() {
        let chunk = chunk(vec![Some("b"), Some("a"), Some("b"), None, None], vec![1; 5]);
        let mut table = KeyTable::new(&chunk.schema(), vec![0]).expect("table");
        let keys = table.encode(&chunk).expect("encode");
        let ids = (0..keys.len())
            .map(|row| table.find_or_insert(keys.key(row)))
            .collect::<Vec<_>>();
        let group_ids = ids.iter().map(|l| l.group_id).collect::<Vec<_>>();
        assert_eq!(group_ids, vec![0, 1, 0, 2, 2]);
        assert!(ids[0].is_new && ids[1].is_new && !ids[2].is_new && ids[3].is_new);
        assert_eq!(table.group_count(), 3);

        let columns = table.build_key_columns().expect("decode");
        let names = columns[0]
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("string keys");
        assert_eq!(names.value(0), "b");
        assert_eq!(names.value(1), "a");
        assert!(names.is_null(2));
    }

    #[test]
    fn test_composite_keys() {
        let chunk = chunk(
            vec![Some("a"), Some("a"), Some("b")],
            vec![1, 2, 1],
        );
        let mut table = KeyTable::new(&chunk.schema(), vec![0, 1]).expect("table");
        let keys = table.encode(&chunk).expect("encode");
        for row in 0..keys.len() {
            table.find_or_insert(keys.key(row));
        }
        assert_eq!(table.group_count(), 3);
        let row_keys = table.encode_row(chunk.row(1)).expect("encode row");
        assert_eq!(table.find(row_keys.key(0)), Some(1));
    }

    #[test]
    fn test_no_key_columns_is_one_group() {
        let chunk = chunk(vec![Some("a"), Some("b")], vec![1, 2]);
        let mut table = KeyTable::new(&chunk.schema(), Vec::new()).expect("table");
        let keys = table.encode(&chunk).expect("encode");
        assert_eq!(keys.len(), 2);
        assert_eq!(table.find_or_insert(keys.key(0)).group_id, 0);
        assert!(!table.find_or_insert(keys.key(1)).is_new);
        assert!(table.build_key_columns().expect("decode").is_empty());
    }

    #[test]
    fn test_rejects_bad_key_column() {
        let chunk = chunk(vec![Some("a")], vec![1]);
        let err = KeyTable::new(&chunk.schema(), vec![5])
            .err()
            .expect("out of range");
        assert!(matches!(err, ExecError::Plan(_)));
    }
}
