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
//! Integration tests for GROUP BY execution over one or more shards.

use arrow::array::{Array, Float64Array, Int8Array};
use arrow::record_batch::RecordBatch;

use aggcore::exec::cursor::collect_chunks;
use aggcore::{
    ExecError, GroupByFunction, GroupByRecordSource, RecordCursor, RuntimeState, ShardInput,
    build_group_by_function,
};

use crate::common::{
    CancellingSource, concat_chunks, int32_column, int64_column, keyed_chunk, keyed_schema,
    string_column, typed_chunk, typed_schema, values_source,
};

mod common;

fn functions(specs: &[(&str, Option<usize>)]) -> Vec<Box<dyn GroupByFunction>> {
    let schema = typed_schema();
    specs
        .iter()
        .map(|(name, arg)| build_group_by_function(name, *arg, &schema).expect("function"))
        .collect()
}

const ROWS: [(&str, i8, i32, i64, f64, &str); 6] = [
    ("x", 3, 10, 100, 1.5, "a"),
    ("y", 7, 20, 200, 2.5, "b"),
    ("x", 1, 30, 300, 3.5, "c"),
    ("z", 5, 40, 400, 4.5, "d"),
    ("y", 2, 50, 500, 5.5, "e"),
    ("x", 9, 60, 600, 6.5, "f"),
];

fn all_functions() -> Vec<Box<dyn GroupByFunction>> {
    functions(&[
        ("count", None),
        ("sum", Some(3)),
        ("sum", Some(4)),
        ("min", Some(2)),
        ("max", Some(1)),
        ("first", Some(1)),
        ("last", Some(2)),
    ])
}

fn run(mut group_by: GroupByRecordSource) -> RecordBatch {
    let state = RuntimeState::default();
    let chunks = collect_chunks(&mut group_by, &state).expect("group by");
    concat_chunks(&chunks)
}

#[test]
fn test_keyed_aggregates_over_single_shard() {
    let source = values_source(typed_schema(), vec![typed_chunk(&ROWS)]);
    let batch = run(GroupByRecordSource::try_new(source, vec![0], all_functions()).expect("plan"));

    assert_eq!(
        string_column(&batch, 0),
        vec![Some("x".to_string()), Some("y".to_string()), Some("z".to_string())]
    );
    assert_eq!(int64_column(&batch, 1), vec![3, 2, 1]);
    assert_eq!(int64_column(&batch, 2), vec![1000, 700, 400]);
    let sums = batch.column(3).as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(sums.values().to_vec(), vec![11.5, 8.0, 4.5]);
    assert_eq!(int32_column(&batch, 4), vec![10, 20, 40]);
    let max = batch.column(5).as_any().downcast_ref::<Int8Array>().unwrap();
    assert_eq!(max.values().to_vec(), vec![9, 7, 5]);
    let first = batch.column(6).as_any().downcast_ref::<Int8Array>().unwrap();
    assert_eq!(first.values().to_vec(), vec![3, 7, 5]);
    assert_eq!(int32_column(&batch, 7), vec![60, 50, 40]);

    let names = batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["key", "count(*)", "sum(l)", "sum(d)", "min(i)", "max(b)", "first(b)", "last(i)"]
    );
}

#[test]
fn test_sharded_merge_matches_single_pass() {
    let single = run(
        GroupByRecordSource::try_new(
            values_source(typed_schema(), vec![typed_chunk(&ROWS)]),
            vec![0],
            all_functions(),
        )
        .expect("plan"),
    );

    let shards = vec![
        ShardInput::new(values_source(typed_schema(), vec![typed_chunk(&ROWS[0..2])]), 0),
        ShardInput::new(values_source(typed_schema(), vec![typed_chunk(&ROWS[2..3])]), 2),
        ShardInput::new(values_source(typed_schema(), vec![typed_chunk(&ROWS[3..6])]), 3),
    ];
    let sharded = run(
        GroupByRecordSource::try_new_sharded(shards, vec![0], all_functions()).expect("plan"),
    );
    assert_eq!(single, sharded);
}

#[test]
fn test_sharded_long_sum_wraps_like_single_pass() {
    let rows = [
        ("x", 0, 0, i64::MAX, 0.0, "a"),
        ("x", 0, 0, 1, 0.0, "b"),
        ("x", 0, 0, 5, 0.0, "c"),
    ];
    let sum = || functions(&[("sum", Some(3))]);
    let single = run(
        GroupByRecordSource::try_new(
            values_source(typed_schema(), vec![typed_chunk(&rows)]),
            vec![0],
            sum(),
        )
        .expect("plan"),
    );
    assert_eq!(int64_column(&single, 1), vec![i64::MIN + 5]);

    let shards = vec![
        ShardInput::new(values_source(typed_schema(), vec![typed_chunk(&rows[0..1])]), 0),
        ShardInput::new(values_source(typed_schema(), vec![typed_chunk(&rows[1..3])]), 1),
    ];
    let sharded =
        run(GroupByRecordSource::try_new_sharded(shards, vec![0], sum()).expect("plan"));
    assert_eq!(single, sharded);
}

#[test]
fn test_first_last_follow_global_row_ids_across_shards() {
    // The shard listed first holds the later rows.
    let late = ShardInput::new(
        values_source(keyed_schema(), vec![keyed_chunk(&["k", "k"], &[Some(30), Some(40)])]),
        100,
    );
    let early = ShardInput::new(
        values_source(keyed_schema(), vec![keyed_chunk(&["k", "k"], &[Some(10), Some(20)])]),
        0,
    );
    let schema = keyed_schema();
    let functions = vec![
        build_group_by_function("first", Some(1), &schema).expect("first"),
        build_group_by_function("last", Some(1), &schema).expect("last"),
    ];
    let batch = run(
        GroupByRecordSource::try_new_sharded(vec![late, early], vec![0], functions).expect("plan"),
    );
    assert_eq!(int32_column(&batch, 1), vec![10]);
    assert_eq!(int32_column(&batch, 2), vec![40]);
}

#[test]
fn test_null_inputs_follow_sentinel_policy() {
    let chunk = keyed_chunk(&["a", "a", "b"], &[None, Some(5), None]);
    let schema = keyed_schema();
    let functions = vec![
        build_group_by_function("min", Some(1), &schema).expect("min"),
        build_group_by_function("max", Some(1), &schema).expect("max"),
        build_group_by_function("count", Some(1), &schema).expect("count"),
    ];
    let batch = run(
        GroupByRecordSource::try_new(values_source(keyed_schema(), vec![chunk]), vec![0], functions)
            .expect("plan"),
    );
    assert_eq!(int32_column(&batch, 1), vec![5, i32::MIN]);
    assert_eq!(int32_column(&batch, 2), vec![5, i32::MIN]);
    assert_eq!(int64_column(&batch, 3), vec![1, 0]);
    assert_eq!(batch.column(1).null_count(), 0);
}

#[test]
fn test_output_is_split_into_chunks() {
    let keys = (0..5000).map(|i| format!("k{i}")).collect::<Vec<_>>();
    let key_refs = keys.iter().map(String::as_str).collect::<Vec<_>>();
    let values = (0..5000).map(Some).collect::<Vec<_>>();
    let schema = keyed_schema();
    let functions = vec![build_group_by_function("count", None, &schema).expect("count")];
    let mut group_by = GroupByRecordSource::try_new(
        values_source(keyed_schema(), vec![keyed_chunk(&key_refs, &values)]),
        vec![0],
        functions,
    )
    .expect("plan");
    let chunks = collect_chunks(&mut group_by, &RuntimeState::default()).expect("run");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 5000);
}

#[test]
fn test_reopen_produces_same_result() {
    let source = values_source(typed_schema(), vec![typed_chunk(&ROWS)]);
    let mut group_by = GroupByRecordSource::try_new(source, vec![0], all_functions()).expect("plan");
    let state = RuntimeState::default();
    let first = concat_chunks(&collect_chunks(&mut group_by, &state).expect("first run"));
    let second = concat_chunks(&collect_chunks(&mut group_by, &state).expect("second run"));
    assert_eq!(first, second);
}

#[test]
fn test_memory_limit_is_reported() {
    let keys = (0..1000).map(|i| format!("key-{i}")).collect::<Vec<_>>();
    let key_refs = keys.iter().map(String::as_str).collect::<Vec<_>>();
    let values = vec![Some(1); 1000];
    let schema = keyed_schema();
    let functions = vec![build_group_by_function("max", Some(1), &schema).expect("max")];
    let mut group_by = GroupByRecordSource::try_new(
        values_source(keyed_schema(), vec![keyed_chunk(&key_refs, &values)]),
        vec![0],
        functions,
    )
    .expect("plan");
    let state = RuntimeState::with_mem_limit(4 * 1024);
    let err = collect_chunks(&mut group_by, &state).expect_err("limit exceeded");
    assert!(matches!(err, ExecError::ResourceExhausted { .. }), "{err:?}");
    assert_eq!(state.mem_tracker().current(), 0);
}

#[test]
fn test_cancellation_stops_aggregation() {
    let state = RuntimeState::default().with_cancel_check_interval(1);
    let chunks = vec![
        keyed_chunk(&["a"], &[Some(1)]),
        keyed_chunk(&["b"], &[Some(2)]),
        keyed_chunk(&["c"], &[Some(3)]),
    ];
    let source = CancellingSource::new(
        values_source(keyed_schema(), chunks),
        state.cancellation_handle(),
        1,
    );
    let schema = keyed_schema();
    let functions = vec![build_group_by_function("count", None, &schema).expect("count")];
    let mut group_by =
        GroupByRecordSource::try_new(Box::new(source), vec![0], functions).expect("plan");
    let err = group_by.open(&state).expect_err("cancelled");
    assert!(err.is_cancelled());
    group_by.close();
    assert_eq!(state.mem_tracker().current(), 0);
}

#[test]
fn test_mismatched_shard_schemas_are_rejected() {
    let shards = vec![
        ShardInput::new(values_source(keyed_schema(), vec![]), 0),
        ShardInput::new(values_source(typed_schema(), vec![]), 0),
    ];
    let schema = keyed_schema();
    let functions = vec![build_group_by_function("count", None, &schema).expect("count")];
    let err = GroupByRecordSource::try_new_sharded(shards, vec![0], functions)
        .err()
        .expect("plan error");
    assert!(matches!(err, ExecError::Plan(_)));
}
