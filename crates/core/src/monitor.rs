// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor identifier type.
//!
//! A monitor is a one-way watch on another process: the watcher is told
//! when the watched process terminates, with the termination reason. One
//! watcher may hold many monitors on the same process.

crate::define_id! {
    /// Unique identifier for one monitor.
    pub struct MonitorId("mon-");
}
