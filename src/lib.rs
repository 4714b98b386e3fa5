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
//! Execution core for GROUP BY aggregates and OVER(...) analytic functions.
//!
//! Group-by state lives in fixed-width state records laid out by
//! [`exec::expr::agg::ValueLayout`]; window functions buffer their input in a
//! [`exec::row_buffer::RowBuffer`] and resolve look-ahead values once the
//! source is exhausted.

pub mod common;
pub mod exec;
pub mod runtime;

pub use common::app_config as aggcore_config;
pub use common::error::ExecError;
pub use common::logging as aggcore_logging;

pub use exec::chunk::{Chunk, ChunkRow};
pub use exec::cursor::RecordCursor;
pub use exec::expr::agg::{GroupByFunction, build_group_by_function};
pub use exec::expr::analytic::{AnalyticFunction, AnalyticFunctionSpec, build_analytic_function};
pub use exec::expr::scalar::ScalarValue;
pub use exec::operators::group_by::{GroupByRecordSource, ShardInput};
pub use exec::operators::analytic::AnalyticRecordSource;
pub use exec::row_buffer::{ROW_ID_NULL, RowBuffer, RowId};
pub use exec::source::{RecordSource, ValuesSource};
pub use runtime::runtime_state::RuntimeState;
