// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process identity and lifecycle vocabulary.
//!
//! A process is a long-lived stateful actor with a private mailbox. These
//! types name where a process is in its lifecycle and why it went away;
//! the runtime machinery that moves processes between states lives in the
//! runtime crate.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a process.
    ///
    /// Stable for the lifetime of the process and never reused once the
    /// process has terminated.
    pub struct ProcessId("prc-");
}

/// Where a process is in its lifecycle.
///
/// ```text
/// initializing --> running --> stopping --> stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// `init` is running; no external messages are accepted yet.
    Initializing,
    /// Accepting and handling messages.
    Running,
    /// Stop requested; the in-flight handler may still be settling.
    Stopping,
    /// Terminated. Terminal state.
    Stopped,
}

impl ProcessStatus {
    /// True until the process has fully terminated.
    pub fn is_alive(&self) -> bool {
        !matches!(self, ProcessStatus::Stopped)
    }

    /// True while new messages are accepted.
    pub fn accepts_messages(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessStatus::Initializing => "initializing",
            ProcessStatus::Running => "running",
            ProcessStatus::Stopping => "stopping",
            ProcessStatus::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Why a process terminated.
///
/// Only [`ExitReason::Normal`] is quiet: every other reason propagates
/// across links and trips `Transient` restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExitReason {
    /// The process finished its work.
    Normal,
    /// Supervisor-initiated (or otherwise deliberate) shutdown.
    Shutdown,
    /// The process crashed or was told to stop with an error.
    Error { detail: String },
    /// Monitor-only: the watched process did not exist when the monitor
    /// was taken.
    NoProc,
}

impl ExitReason {
    /// Shorthand for an error reason.
    pub fn error(detail: impl Into<String>) -> Self {
        ExitReason::Error { detail: detail.into() }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ExitReason::Normal)
    }

    /// Abnormal reasons propagate across links.
    pub fn is_abnormal(&self) -> bool {
        !self.is_normal()
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::Shutdown => write!(f, "shutdown"),
            ExitReason::Error { detail } => write!(f, "error: {detail}"),
            ExitReason::NoProc => write!(f, "noproc"),
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
