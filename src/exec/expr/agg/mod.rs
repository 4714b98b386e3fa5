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
//! Group-by aggregate core.
//!
//! Functions claim typed slots in a shared [`ValueLayout`]; every group owns
//! one record of that layout inside the keyed store and functions fold input
//! rows into their slots through [`StateRecord`].

pub mod functions;
mod layout;
mod primitive;
mod record;

pub use functions::{GroupByFunction, build_group_by_function};
pub use layout::{SlotType, ValueLayout};
pub use primitive::SlotPrimitive;
pub use record::{StateRecord, StateRecordRef};
