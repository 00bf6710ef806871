// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bidirectional link edges between processes.
//!
//! The table only stores edges; the propagation policy (trap-exit checks,
//! force termination, cascading) lives in exit finalization. Each edge is
//! removed before propagation crosses it, which is what bounds cascades
//! over cyclic link graphs.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use arbor_core::{LinkId, ProcessId};

#[derive(Default)]
struct LinkState {
    edges: HashMap<LinkId, (ProcessId, ProcessId)>,
    by_process: HashMap<ProcessId, HashSet<LinkId>>,
}

#[derive(Default)]
pub(crate) struct LinkTable {
    inner: Mutex<LinkState>,
}

impl LinkTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record an edge. Self-links and repeated links between the same pair
    /// are allowed; each gets its own id.
    pub(crate) fn link(&self, a: ProcessId, b: ProcessId) -> LinkId {
        let id = LinkId::new();
        let mut state = self.inner.lock();
        state.edges.insert(id, (a, b));
        state.by_process.entry(a).or_default().insert(id);
        state.by_process.entry(b).or_default().insert(id);
        id
    }

    /// Remove one edge by id. Idempotent.
    pub(crate) fn unlink(&self, id: &LinkId) -> bool {
        let mut state = self.inner.lock();
        let Some((a, b)) = state.edges.remove(id) else {
            return false;
        };
        detach(&mut state, a, id);
        detach(&mut state, b, id);
        true
    }

    /// Remove every edge touching `p`, returning the far endpoint of each.
    /// A self-link yields `p` itself, which propagation then skips
    /// naturally (the process is already terminating).
    pub(crate) fn take_edges_for(&self, p: ProcessId) -> Vec<(LinkId, ProcessId)> {
        let mut state = self.inner.lock();
        let Some(ids) = state.by_process.remove(&p) else {
            return Vec::new();
        };
        let mut neighbors = Vec::with_capacity(ids.len());
        for id in ids {
            let Some((a, b)) = state.edges.remove(&id) else {
                continue;
            };
            let peer = if a == p { b } else { a };
            detach(&mut state, peer, &id);
            neighbors.push((id, peer));
        }
        neighbors
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().edges.len()
    }

    /// Edges currently touching `p`. Observational.
    #[cfg(test)]
    pub(crate) fn links_of(&self, p: ProcessId) -> usize {
        self.inner.lock().by_process.get(&p).map_or(0, HashSet::len)
    }
}

fn detach(state: &mut LinkState, p: ProcessId, id: &LinkId) {
    if let Some(set) = state.by_process.get_mut(&p) {
        set.remove(id);
        if set.is_empty() {
            state.by_process.remove(&p);
        }
    }
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
