// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-way monitor edges: watcher → watched.
//!
//! The table stores directed records indexed from both ends; delivery of
//! down notifications happens in exit finalization. A watcher's own
//! termination drops every monitor it holds.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use arbor_core::{MonitorId, ProcessId};

#[derive(Clone, Copy)]
struct MonitorRecord {
    watcher: ProcessId,
    watched: ProcessId,
}

#[derive(Default)]
struct MonitorState {
    records: HashMap<MonitorId, MonitorRecord>,
    by_watched: HashMap<ProcessId, HashSet<MonitorId>>,
    by_watcher: HashMap<ProcessId, HashSet<MonitorId>>,
}

#[derive(Default)]
pub(crate) struct MonitorTable {
    inner: Mutex<MonitorState>,
}

impl MonitorTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a monitor. One watcher may hold many monitors on the same
    /// watched process; each fires separately.
    pub(crate) fn insert(&self, watcher: ProcessId, watched: ProcessId) -> MonitorId {
        let id = MonitorId::new();
        let mut state = self.inner.lock();
        state.records.insert(id, MonitorRecord { watcher, watched });
        state.by_watched.entry(watched).or_default().insert(id);
        state.by_watcher.entry(watcher).or_default().insert(id);
        id
    }

    /// Remove one monitor. Idempotent.
    pub(crate) fn remove(&self, id: &MonitorId) -> bool {
        let mut state = self.inner.lock();
        let Some(record) = state.records.remove(id) else {
            return false;
        };
        detach(&mut state.by_watched, record.watched, id);
        detach(&mut state.by_watcher, record.watcher, id);
        true
    }

    /// Remove and return every monitor watching `watched`; called when it
    /// terminates.
    pub(crate) fn take_watching(&self, watched: ProcessId) -> Vec<(MonitorId, ProcessId)> {
        let mut state = self.inner.lock();
        let Some(ids) = state.by_watched.remove(&watched) else {
            return Vec::new();
        };
        let mut watchers = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(record) = state.records.remove(&id) else {
                continue;
            };
            detach(&mut state.by_watcher, record.watcher, &id);
            watchers.push((id, record.watcher));
        }
        watchers
    }

    /// Drop every monitor held by `watcher`; called when it terminates.
    pub(crate) fn drop_held_by(&self, watcher: ProcessId) {
        let mut state = self.inner.lock();
        let Some(ids) = state.by_watcher.remove(&watcher) else {
            return;
        };
        for id in ids {
            if let Some(record) = state.records.remove(&id) {
                detach(&mut state.by_watched, record.watched, &id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Monitors currently involving `p` at either end. Observational.
    #[cfg(test)]
    pub(crate) fn involving(&self, p: ProcessId) -> usize {
        let state = self.inner.lock();
        let watching = state.by_watched.get(&p).map_or(0, HashSet::len);
        let held = state.by_watcher.get(&p).map_or(0, HashSet::len);
        watching + held
    }
}

fn detach(index: &mut HashMap<ProcessId, HashSet<MonitorId>>, p: ProcessId, id: &MonitorId) {
    if let Some(set) = index.get_mut(&p) {
        set.remove(id);
        if set.is_empty() {
            index.remove(&p);
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
