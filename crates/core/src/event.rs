// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events published on the runtime event bus.

use serde::{Deserialize, Serialize};

use crate::monitor::MonitorId;
use crate::process::{ExitReason, ProcessId};

/// Events describing process lifecycle transitions.
///
/// Serializes with `{"type": "noun:verb", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// A process finished initialization and is accepting messages.
    #[serde(rename = "process:started")]
    Started { id: ProcessId },

    /// A process terminated. Emitted exactly once per process, after its
    /// registry entries, links and monitors have been removed.
    #[serde(rename = "process:terminated")]
    Terminated { id: ProcessId, reason: ExitReason },

    /// A supervisor replaced a terminated child with a fresh process.
    #[serde(rename = "supervisor:child_restarted")]
    ChildRestarted {
        supervisor: ProcessId,
        child_id: String,
        /// Restart count of the child after this restart.
        attempt: u32,
    },

    /// A monitored process terminated (or never existed: `noproc`).
    #[serde(rename = "monitor:down")]
    ProcessDown {
        watcher: ProcessId,
        watched: ProcessId,
        monitor: MonitorId,
        reason: ExitReason,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &str {
        match self {
            LifecycleEvent::Started { .. } => "process:started",
            LifecycleEvent::Terminated { .. } => "process:terminated",
            LifecycleEvent::ChildRestarted { .. } => "supervisor:child_restarted",
            LifecycleEvent::ProcessDown { .. } => "monitor:down",
        }
    }

    /// The process this event is primarily about.
    pub fn process_id(&self) -> &ProcessId {
        match self {
            LifecycleEvent::Started { id } => id,
            LifecycleEvent::Terminated { id, .. } => id,
            LifecycleEvent::ChildRestarted { supervisor, .. } => supervisor,
            LifecycleEvent::ProcessDown { watched, .. } => watched,
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            LifecycleEvent::Started { id } => format!("{t} id={id}"),
            LifecycleEvent::Terminated { id, reason } => {
                format!("{t} id={id} reason={reason}")
            }
            LifecycleEvent::ChildRestarted { supervisor, child_id, attempt } => {
                format!("{t} supervisor={supervisor} child={child_id} attempt={attempt}")
            }
            LifecycleEvent::ProcessDown { watcher, watched, reason, .. } => {
                format!("{t} watcher={watcher} watched={watched} reason={reason}")
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
