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
//! GROUP BY execution over one or more input shards.
//!
//! Each shard folds its rows into a private keyed store on its own thread.
//! The partial stores are then merged on the calling thread and the merged
//! store is emitted as key columns followed by one column per function.
//!
//! Row ids are global: shard `i` numbers its rows from its
//! `first_row_id`, so order-sensitive functions compare rows across shards
//! when partial states merge.

use std::collections::VecDeque;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::aggcore_logging::debug;
use crate::common::config;
use crate::common::error::ExecError;
use crate::exec::chunk::Chunk;
use crate::exec::cursor::RecordCursor;
use crate::exec::expr::agg::{GroupByFunction, StateRecordRef, ValueLayout};
use crate::exec::hash_table::agg_map::AggMap;
use crate::exec::hash_table::key_table::KeyTable;
use crate::exec::row_buffer::RowId;
use crate::exec::source::RecordSource;
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::runtime_state::RuntimeState;

/// One input partition of a group-by and the id of its first row.
pub struct ShardInput {
    source: Box<dyn RecordSource>,
    first_row_id: RowId,
}

impl ShardInput {
    pub fn new(source: Box<dyn RecordSource>, first_row_id: RowId) -> Self {
        Self {
            source,
            first_row_id,
        }
    }
}

pub struct GroupByRecordSource {
    shards: Vec<ShardInput>,
    input_schema: SchemaRef,
    key_columns: Vec<usize>,
    functions: Vec<Box<dyn GroupByFunction>>,
    layout: ValueLayout,
    output_schema: SchemaRef,
    output: VecDeque<Chunk>,
    opened: bool,
}

impl GroupByRecordSource {
    pub fn try_new(
        source: Box<dyn RecordSource>,
        key_columns: Vec<usize>,
        functions: Vec<Box<dyn GroupByFunction>>,
    ) -> Result<Self, ExecError> {
        Self::try_new_sharded(vec![ShardInput::new(source, 0)], key_columns, functions)
    }

    /// Builds the operator and lays out every function's slots.
    pub fn try_new_sharded(
        shards: Vec<ShardInput>,
        key_columns: Vec<usize>,
        mut functions: Vec<Box<dyn GroupByFunction>>,
    ) -> Result<Self, ExecError> {
        let Some(first) = shards.first() else {
            return Err(ExecError::plan("group-by requires at least one input shard"));
        };
        let input_schema = first.source.schema();
        for shard in &shards[1..] {
            if shard.source.schema() != input_schema {
                return Err(ExecError::plan(format!(
                    "shard {} schema does not match shard {}",
                    shard.source.name(),
                    first.source.name()
                )));
            }
        }
        if key_columns.is_empty() && functions.is_empty() {
            return Err(ExecError::plan(
                "group-by requires a key column or an aggregate function",
            ));
        }
        // Validates key column indexes and types up front.
        KeyTable::new(&input_schema, key_columns.clone())?;

        let mut layout = ValueLayout::new();
        for function in functions.iter_mut() {
            function.init_slots(&mut layout)?;
        }
        layout.seal();

        let mut fields = key_columns
            .iter()
            .map(|&idx| input_schema.field(idx).clone())
            .collect::<Vec<_>>();
        fields.extend(
            functions
                .iter()
                .map(|function| Field::new(function.display_name(), function.output_type(), true)),
        );

        Ok(Self {
            shards,
            input_schema,
            key_columns,
            functions,
            layout,
            output_schema: Arc::new(Schema::new(fields)),
            output: VecDeque::new(),
            opened: false,
        })
    }

    pub fn layout(&self) -> &ValueLayout {
        &self.layout
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }
}

impl RecordCursor for GroupByRecordSource {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.output_schema)
    }

    fn open(&mut self, state: &RuntimeState) -> Result<(), ExecError> {
        self.output.clear();
        self.opened = false;

        let tracker = MemTracker::new_child("GroupBy", &state.mem_tracker());
        let plan = ShardPlan {
            schema: &self.input_schema,
            key_columns: &self.key_columns,
            functions: &self.functions,
            record_size: self.layout.record_size(),
        };
        let maps = aggregate_shards(&plan, &mut self.shards, state, &tracker)?;
        let merged = merge_shards(&plan, maps, state)?;
        debug!(
            "group-by query_id={} shards={} groups={}",
            state.query_id(),
            self.shards.len(),
            merged.len()
        );
        self.output = emit(&plan, &merged, &self.output_schema)?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, ExecError> {
        if !self.opened {
            return Err(ExecError::plan("group-by cursor is not open"));
        }
        state.check_cancelled()?;
        Ok(self.output.pop_front())
    }

    fn close(&mut self) {
        self.output.clear();
        self.opened = false;
    }
}

/// Borrowed, thread-shareable view of the operator's plan.
struct ShardPlan<'a> {
    schema: &'a SchemaRef,
    key_columns: &'a [usize],
    functions: &'a [Box<dyn GroupByFunction>],
    record_size: usize,
}

fn aggregate_shards(
    plan: &ShardPlan<'_>,
    shards: &mut [ShardInput],
    state: &RuntimeState,
    tracker: &Arc<MemTracker>,
) -> Result<Vec<AggMap>, ExecError> {
    if shards.len() == 1 {
        let map = aggregate_shard(plan, &mut shards[0], state, Arc::clone(tracker))?;
        return Ok(vec![map]);
    }
    std::thread::scope(|scope| {
        let handles = shards
            .iter_mut()
            .enumerate()
            .map(|(idx, shard)| {
                let tracker = MemTracker::new_child(format!("GroupByShard{}", idx), tracker);
                scope.spawn(move || aggregate_shard(plan, shard, state, tracker))
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(ExecError::Internal("group-by shard worker panicked".to_string()))
                })
            })
            .collect()
    })
}

fn aggregate_shard(
    plan: &ShardPlan<'_>,
    shard: &mut ShardInput,
    state: &RuntimeState,
    tracker: Arc<MemTracker>,
) -> Result<AggMap, ExecError> {
    let keys = KeyTable::new(plan.schema, plan.key_columns.to_vec())?;
    let mut map = AggMap::new(keys, plan.record_size);
    map.set_mem_tracker(tracker);

    shard.source.rewind()?;
    let interval = state.cancel_check_interval_rows().max(1);
    let mut row_id = shard.first_row_id;
    while let Some(chunk) = shard.source.next_chunk(state)? {
        let mut offset = 0;
        while offset < chunk.len() {
            state.check_cancelled()?;
            let len = interval.min(chunk.len() - offset);
            let slice = chunk.slice(offset, len);
            let keys = map.encode(&slice)?;
            for row in 0..slice.len() {
                let lookup = map.find_or_insert(keys.key(row))?;
                let mut record = map.record_mut(lookup.group_id);
                for function in plan.functions {
                    if lookup.is_new {
                        function.compute_first(&mut record, slice.row(row), row_id)?;
                    } else {
                        function.compute_next(&mut record, slice.row(row), row_id)?;
                    }
                }
                row_id += 1;
            }
            offset += len;
        }
    }
    Ok(map)
}

fn merge_shards(
    plan: &ShardPlan<'_>,
    maps: Vec<AggMap>,
    state: &RuntimeState,
) -> Result<AggMap, ExecError> {
    let mut maps = maps.into_iter();
    let Some(mut dest) = maps.next() else {
        return Err(ExecError::Internal("group-by produced no shard state".to_string()));
    };
    for src in maps {
        state.check_cancelled()?;
        for group_id in 0..src.len() {
            let lookup = dest.find_or_insert(src.key(group_id))?;
            let mut record = dest.record_mut(lookup.group_id);
            let src_record = src.record(group_id);
            for function in plan.functions {
                if lookup.is_new {
                    function.set_null(&mut record);
                }
                function.merge(&mut record, src_record);
            }
        }
    }
    // A global aggregate over no rows still yields one row.
    if plan.key_columns.is_empty() && dest.is_empty() {
        let lookup = dest.find_or_insert(&[])?;
        let mut record = dest.record_mut(lookup.group_id);
        for function in plan.functions {
            function.set_null(&mut record);
        }
    }
    Ok(dest)
}

fn emit(
    plan: &ShardPlan<'_>,
    map: &AggMap,
    output_schema: &SchemaRef,
) -> Result<VecDeque<Chunk>, ExecError> {
    let mut columns = map.build_key_columns()?;
    let records = map.records();
    columns.extend(build_function_columns(plan.functions, &records)?);

    let batch = RecordBatch::try_new(Arc::clone(output_schema), columns)?;
    let chunk_size = config::output_chunk_size().max(1);
    let mut output = VecDeque::new();
    let mut offset = 0;
    while offset < batch.num_rows() {
        let len = chunk_size.min(batch.num_rows() - offset);
        output.push_back(Chunk::new(batch.slice(offset, len)));
        offset += len;
    }
    Ok(output)
}

fn build_function_columns(
    functions: &[Box<dyn GroupByFunction>],
    records: &[StateRecordRef<'_>],
) -> Result<Vec<ArrayRef>, ExecError> {
    let parallel = functions.len() > 1
        && records.len() >= config::output_chunk_size()
        && functions.iter().all(|function| function.is_read_thread_safe());
    if !parallel {
        return functions
            .iter()
            .map(|function| function.build_array(records))
            .collect();
    }
    std::thread::scope(|scope| {
        let handles = functions
            .iter()
            .map(|function| scope.spawn(move || function.build_array(records)))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(ExecError::Internal("group-by output worker panicked".to_string()))
                })
            })
            .collect()
    })
}
