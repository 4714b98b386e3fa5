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
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::common::config;
use crate::common::error::ExecError;
use crate::runtime::mem_tracker::MemTracker;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// RuntimeState is the per-query execution context.
///
/// It owns the query's root memory tracker and the cooperative cancellation
/// flag. Keyed stores and row buffers hang child trackers off it, so dropping
/// the state after a query releases every accounted byte.
#[derive(Debug)]
pub struct RuntimeState {
    query_id: u64,
    mem_tracker: Arc<MemTracker>,
    cancelled: Arc<AtomicBool>,
    cancel_check_interval_rows: usize,
}

/// Cloneable handle that can cancel a running query from another thread.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::with_mem_limit(config::query_mem_limit_bytes())
    }
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state whose root tracker refuses allocations beyond `limit`
    /// bytes; a negative limit means unlimited.
    pub fn with_mem_limit(limit: i64) -> Self {
        let query_id = NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            query_id,
            mem_tracker: MemTracker::new_root_with_limit(format!("query_{query_id}"), limit),
            cancelled: Arc::new(AtomicBool::new(false)),
            cancel_check_interval_rows: config::cancel_check_interval_rows(),
        }
    }

    pub fn with_cancel_check_interval(mut self, rows: usize) -> Self {
        self.cancel_check_interval_rows = rows.max(1);
        self
    }

    pub fn query_id(&self) -> u64 {
        self.query_id
    }

    pub fn mem_tracker(&self) -> Arc<MemTracker> {
        Arc::clone(&self.mem_tracker)
    }

    /// Rows a scan may process between two calls to [`check_cancelled`](Self::check_cancelled).
    pub fn cancel_check_interval_rows(&self) -> usize {
        self.cancel_check_interval_rows
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self) -> Result<(), ExecError> {
        if self.is_cancelled() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }
}
