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
use crate::aggcore_config::config as aggcore_app_config;

pub(crate) fn output_chunk_size() -> usize {
    aggcore_app_config()
        .ok()
        .map(|c| c.runtime.output_chunk_size)
        .unwrap_or(4096)
        .max(1)
}

pub(crate) fn cancel_check_interval_rows() -> usize {
    aggcore_app_config()
        .ok()
        .map(|c| c.runtime.cancel_check_interval_rows)
        .unwrap_or(1024)
        .max(1)
}

pub(crate) fn query_mem_limit_bytes() -> i64 {
    aggcore_app_config()
        .ok()
        .map(|c| c.runtime.query_mem_limit_bytes)
        .unwrap_or(-1)
}

pub(crate) fn analytic_parallel_resolution() -> bool {
    aggcore_app_config()
        .ok()
        .map(|c| c.runtime.analytic_parallel_resolution)
        .unwrap_or(false)
}
