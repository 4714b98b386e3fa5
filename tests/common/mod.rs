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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int8Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use tempfile::TempDir;

use aggcore::runtime::runtime_state::CancellationHandle;
use aggcore::{
    Chunk, ExecError, RecordSource, RuntimeState, ValuesSource, aggcore_config, aggcore_logging,
};

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_aggcore.toml");

        let config_content = r#"
log_level = "debug"

[runtime]
output_chunk_size = 4096
cancel_check_interval_rows = 1024
query_mem_limit_bytes = -1
analytic_parallel_resolution = false
"#;

        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    pub fn init_logging(&self) {
        aggcore_logging::init_with_level("debug");
    }

    pub fn load_config(&self) -> anyhow::Result<&'static aggcore_config::AggCoreConfig> {
        aggcore_config::init_from_path(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

/// Schema of `(key: Utf8, val: Int32)` test rows.
pub fn keyed_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("val", DataType::Int32, true),
    ]))
}

pub fn keyed_chunk(keys: &[&str], values: &[Option<i32>]) -> Chunk {
    let batch = RecordBatch::try_new(
        keyed_schema(),
        vec![
            Arc::new(StringArray::from(keys.to_vec())) as ArrayRef,
            Arc::new(Int32Array::from(values.to_vec())) as ArrayRef,
        ],
    )
    .expect("record batch");
    Chunk::new(batch)
}

/// Wide rows covering every primitive type, keyed by a string column.
pub fn typed_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("b", DataType::Int8, true),
        Field::new("i", DataType::Int32, true),
        Field::new("l", DataType::Int64, true),
        Field::new("d", DataType::Float64, true),
        Field::new("s", DataType::Utf8, true),
    ]))
}

pub fn typed_chunk(rows: &[(&str, i8, i32, i64, f64, &str)]) -> Chunk {
    let batch = RecordBatch::try_new(
        typed_schema(),
        vec![
            Arc::new(StringArray::from(rows.iter().map(|r| r.0).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(Int8Array::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(Int32Array::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(Int64Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(Float64Array::from(rows.iter().map(|r| r.4).collect::<Vec<_>>()))
                as ArrayRef,
            Arc::new(StringArray::from(rows.iter().map(|r| r.5).collect::<Vec<_>>()))
                as ArrayRef,
        ],
    )
    .expect("record batch");
    Chunk::new(batch)
}

pub fn values_source(schema: SchemaRef, chunks: Vec<Chunk>) -> Box<dyn RecordSource> {
    Box::new(ValuesSource::try_new(schema, chunks).expect("values source"))
}

/// A source that never reports end-of-data.
pub struct UnboundedSource {
    schema: SchemaRef,
}

impl UnboundedSource {
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }
}

impl RecordSource for UnboundedSource {
    fn name(&self) -> &str {
        "UnboundedSource"
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn is_bounded(&self) -> bool {
        false
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        Ok(())
    }

    fn next_chunk(&mut self, _state: &RuntimeState) -> Result<Option<Chunk>, ExecError> {
        Ok(Some(Chunk::new(RecordBatch::new_empty(Arc::clone(&self.schema)))))
    }
}

/// Wraps a source and cancels the query after `after_chunks` chunks.
pub struct CancellingSource {
    inner: Box<dyn RecordSource>,
    handle: CancellationHandle,
    after_chunks: usize,
    emitted: usize,
}

impl CancellingSource {
    pub fn new(inner: Box<dyn RecordSource>, handle: CancellationHandle, after_chunks: usize) -> Self {
        Self {
            inner,
            handle,
            after_chunks,
            emitted: 0,
        }
    }
}

impl RecordSource for CancellingSource {
    fn name(&self) -> &str {
        "CancellingSource"
    }

    fn schema(&self) -> SchemaRef {
        self.inner.schema()
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        self.emitted = 0;
        self.inner.rewind()
    }

    fn next_chunk(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, ExecError> {
        if self.emitted == self.after_chunks {
            self.handle.cancel();
        }
        self.emitted += 1;
        self.inner.next_chunk(state)
    }
}

/// Concatenate all chunks of a result into one batch.
pub fn concat_chunks(chunks: &[Chunk]) -> RecordBatch {
    let schema = chunks
        .first()
        .map(|chunk| chunk.schema())
        .expect("at least one chunk");
    let batches = chunks.iter().map(|chunk| chunk.batch.clone()).collect::<Vec<_>>();
    arrow::compute::concat_batches(&schema, &batches).expect("concat batches")
}

pub fn int32_column(batch: &RecordBatch, idx: usize) -> Vec<i32> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int32Array>()
        .expect("int32 column")
        .values()
        .to_vec()
}

pub fn int64_column(batch: &RecordBatch, idx: usize) -> Vec<i64> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("int64 column")
        .values()
        .to_vec()
}

pub fn string_column(batch: &RecordBatch, idx: usize) -> Vec<Option<String>> {
    let array = batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("string column");
    array.iter().map(|value| value.map(str::to_string)).collect()
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}
