// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-wide process table: id → live process record.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use arbor_core::ProcessId;

use crate::process::cell::RawProcess;

/// Map of every live process. Entries are removed during exit
/// finalization, before the `terminated` event is published, so a miss is
/// the ordinary answer for a terminated id: a sentinel, not an error.
#[derive(Default)]
pub(crate) struct ProcessTable {
    procs: Mutex<HashMap<ProcessId, Arc<dyn RawProcess>>>,
}

impl ProcessTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, proc: Arc<dyn RawProcess>) {
        self.procs.lock().insert(proc.id(), proc);
    }

    pub(crate) fn lookup(&self, id: ProcessId) -> Option<Arc<dyn RawProcess>> {
        self.procs.lock().get(&id).map(Arc::clone)
    }

    pub(crate) fn contains(&self, id: ProcessId) -> bool {
        self.procs.lock().contains_key(&id)
    }

    pub(crate) fn remove(&self, id: ProcessId) -> Option<Arc<dyn RawProcess>> {
        self.procs.lock().remove(&id)
    }

    pub(crate) fn all_ids(&self) -> Vec<ProcessId> {
        self.procs.lock().keys().copied().collect()
    }

    pub(crate) fn all(&self) -> Vec<Arc<dyn RawProcess>> {
        self.procs.lock().values().map(Arc::clone).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.procs.lock().len()
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
