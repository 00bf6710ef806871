// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process runtime record shared between handles, the mailbox runner
//! and the process table.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use arbor_core::{ExitReason, MonitorId, ProcessId, ProcessStatus};

use crate::behavior::{Behavior, Info, Responder};

/// One enqueued mailbox message. All kinds share a single FIFO queue.
pub(crate) enum Envelope<B: Behavior> {
    Call {
        msg: B::Call,
        responder: Responder<B::Reply>,
    },
    Cast(B::Cast),
    Info(Info<B::Info>),
}

/// Read-only view of a process at one observation instant.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSnapshot {
    pub id: ProcessId,
    pub status: ProcessStatus,
    /// Messages currently waiting in the mailbox.
    pub queue_size: usize,
    /// Messages dequeued over the process lifetime. Monotonic.
    pub message_count: u64,
    pub started_at_ms: u64,
    /// Approximate state footprint, if the behavior reports one.
    pub state_memory_bytes: Option<u64>,
}

/// The shared core of one process: mailbox sender, status word, counters
/// and the stop/kill/done signals. The runner owns the receiving half.
pub(crate) struct ProcessCell<B: Behavior> {
    id: ProcessId,
    started_at_ms: u64,
    status: Mutex<ProcessStatus>,
    exit_reason: Mutex<Option<ExitReason>>,
    queue_size: AtomicUsize,
    message_count: AtomicU64,
    state_bytes: Mutex<Option<u64>>,
    trap_exit: AtomicBool,
    tx: mpsc::UnboundedSender<Envelope<B>>,
    /// Wakes an idle runner so it notices a graceful stop request.
    pub(crate) stop_notify: Notify,
    /// Force-termination signal; aborts an in-flight handler.
    pub(crate) kill: CancellationToken,
    done: CancellationToken,
}

impl<B: Behavior> ProcessCell<B> {
    pub(crate) fn new(
        id: ProcessId,
        started_at_ms: u64,
        tx: mpsc::UnboundedSender<Envelope<B>>,
        trap_exit: bool,
    ) -> Self {
        ProcessCell {
            id,
            started_at_ms,
            status: Mutex::new(ProcessStatus::Initializing),
            exit_reason: Mutex::new(None),
            queue_size: AtomicUsize::new(0),
            message_count: AtomicU64::new(0),
            state_bytes: Mutex::new(None),
            trap_exit: AtomicBool::new(trap_exit),
            tx,
            stop_notify: Notify::new(),
            kill: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> ProcessId {
        self.id
    }

    pub(crate) fn status(&self) -> ProcessStatus {
        *self.status.lock()
    }

    pub(crate) fn set_running(&self) {
        *self.status.lock() = ProcessStatus::Running;
    }

    /// Request a graceful stop. Returns false if the process already left
    /// the running state.
    pub(crate) fn request_stop(&self, reason: ExitReason) -> bool {
        let mut status = self.status.lock();
        if *status != ProcessStatus::Running {
            return false;
        }
        *status = ProcessStatus::Stopping;
        *self.exit_reason.lock() = Some(reason);
        self.stop_notify.notify_one();
        true
    }

    /// Record the reason of an in-band `Stop` outcome.
    pub(crate) fn begin_stopping(&self) {
        let mut status = self.status.lock();
        if *status == ProcessStatus::Running {
            *status = ProcessStatus::Stopping;
        }
    }

    /// Force-terminate: abandons the mailbox and aborts an in-flight
    /// handler at its next suspension point. Returns false if the process
    /// already stopped.
    pub(crate) fn force_kill(&self, reason: ExitReason) -> bool {
        {
            let status = self.status.lock();
            if *status == ProcessStatus::Stopped {
                return false;
            }
            *self.exit_reason.lock() = Some(reason);
        }
        self.kill.cancel();
        true
    }

    pub(crate) fn take_exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason.lock().take()
    }

    pub(crate) fn mark_stopped(&self) {
        *self.status.lock() = ProcessStatus::Stopped;
    }

    pub(crate) fn signal_done(&self) {
        self.done.cancel();
    }

    pub(crate) fn done_token(&self) -> CancellationToken {
        self.done.clone()
    }

    /// Append to the mailbox. Returns false once the runner has dropped
    /// the receiving half.
    pub(crate) fn enqueue(&self, envelope: Envelope<B>) -> bool {
        if self.tx.send(envelope).is_err() {
            return false;
        }
        self.queue_size.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub(crate) fn note_dequeue(&self) {
        self.queue_size.fetch_sub(1, Ordering::Relaxed);
        self.message_count.fetch_add(1, Ordering::Relaxed);
    }

    /// A message removed without being handled (shutdown drain).
    pub(crate) fn note_drained(&self) {
        self.queue_size.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size.load(Ordering::Relaxed)
    }

    pub(crate) fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    pub(crate) fn trap_exit(&self) -> bool {
        self.trap_exit.load(Ordering::Relaxed)
    }

    pub(crate) fn set_trap_exit(&self, on: bool) {
        self.trap_exit.store(on, Ordering::Relaxed);
    }

    pub(crate) fn set_state_bytes(&self, bytes: Option<u64>) {
        *self.state_bytes.lock() = bytes;
    }

    pub(crate) fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id,
            status: self.status(),
            queue_size: self.queue_size(),
            message_count: self.message_count(),
            started_at_ms: self.started_at_ms,
            state_memory_bytes: *self.state_bytes.lock(),
        }
    }
}

/// Type-erased process surface stored in the process table. Everything the
/// runtime core needs without knowing the behavior type.
pub(crate) trait RawProcess: Send + Sync + 'static {
    fn id(&self) -> ProcessId;
    fn status(&self) -> ProcessStatus;
    fn snapshot(&self) -> ProcessSnapshot;
    fn trap_exit(&self) -> bool;
    /// Enqueue a trapped exit signal. Silent if the mailbox is gone.
    fn deliver_exit(&self, from: ProcessId, reason: ExitReason);
    /// Enqueue a monitor down notification. Silent if the mailbox is gone.
    fn deliver_down(&self, monitor: MonitorId, process: ProcessId, reason: ExitReason);
    fn request_stop(&self, reason: ExitReason) -> bool;
    fn force_kill(&self, reason: ExitReason) -> bool;
    fn done_token(&self) -> CancellationToken;
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<B: Behavior> RawProcess for ProcessCell<B> {
    fn id(&self) -> ProcessId {
        self.id
    }

    fn status(&self) -> ProcessStatus {
        ProcessCell::status(self)
    }

    fn snapshot(&self) -> ProcessSnapshot {
        ProcessCell::snapshot(self)
    }

    fn trap_exit(&self) -> bool {
        ProcessCell::trap_exit(self)
    }

    fn deliver_exit(&self, from: ProcessId, reason: ExitReason) {
        if !self.enqueue(Envelope::Info(Info::Exit { from, reason })) {
            tracing::debug!(process = %self.id, "exit signal dropped; mailbox closed");
        }
    }

    fn deliver_down(&self, monitor: MonitorId, process: ProcessId, reason: ExitReason) {
        if !self.enqueue(Envelope::Info(Info::Down { monitor, process, reason })) {
            tracing::debug!(process = %self.id, "down notification dropped; mailbox closed");
        }
    }

    fn request_stop(&self, reason: ExitReason) -> bool {
        ProcessCell::request_stop(self, reason)
    }

    fn force_kill(&self, reason: ExitReason) -> bool {
        ProcessCell::force_kill(self, reason)
    }

    fn done_token(&self) -> CancellationToken {
        ProcessCell::done_token(self)
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
