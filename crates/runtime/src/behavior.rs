// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The behavior contract: the operation table a process is built from.
//!
//! A behavior supplies `init`, `handle_call`, `handle_cast`, `handle_info`
//! and `terminate`. Handlers receive the state by value and hand it back in
//! their outcome; that is what lets the runtime guarantee "a failed handler
//! leaves the state untouched" without trusting handler discipline.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use arbor_core::{ExitReason, LinkId, MonitorId, ProcessId, TimerId};

use crate::error::{CallError, InitError, SendError};
use crate::process::ProcessRef;
use crate::runtime::Runtime;

/// Outcome of [`Behavior::handle_call`].
pub enum CallOutcome<B: Behavior> {
    /// Complete the pending call with `reply` and continue with the state.
    Reply(B::Reply, B::State),
    /// Continue without replying. The handler either claimed the reply slot
    /// via [`ProcessContext::take_responder`] for a later reply, or is
    /// content to let the caller time out.
    NoReply(B::State),
    /// Complete the pending call with `reply`, then stop the process.
    Stop(ExitReason, B::Reply, B::State),
    /// Complete the pending call with a handler error. The returned state
    /// is kept unchanged and the process survives.
    Fail(String, B::State),
}

/// Outcome of [`Behavior::handle_cast`] and [`Behavior::handle_info`].
pub enum HandlerOutcome<B: Behavior> {
    /// Continue with the state.
    Continue(B::State),
    /// Stop the process with the given reason.
    Stop(ExitReason, B::State),
    /// Drop the message: the error is logged at debug level, the returned
    /// state is kept unchanged and the process survives.
    Fail(String, B::State),
}

/// Out-of-band messages routed through [`Behavior::handle_info`].
///
/// Exit signals and monitor notifications arrive here in-band, so they are
/// observed in FIFO order with regular messages.
#[derive(Debug)]
pub enum Info<I> {
    /// A message pushed by a user via `send_info`.
    User(I),
    /// A linked process exited abnormally while this process traps exits.
    Exit { from: ProcessId, reason: ExitReason },
    /// A monitored process terminated (reason `noproc` if it never ran).
    Down {
        monitor: MonitorId,
        process: ProcessId,
        reason: ExitReason,
    },
}

/// The caller-supplied operation table of a process.
///
/// All handlers run on the process task, one at a time; a handler may await
/// freely, but the next mailbox message is not dequeued until the current
/// outcome is returned. Default implementations reject calls and drop casts,
/// so a behavior only implements the shapes it speaks.
#[async_trait]
pub trait Behavior: Sized + Send + Sync + 'static {
    /// Argument passed to [`init`](Behavior::init) by the spawner.
    type Config: Send + 'static;
    /// Private state owned by the process.
    type State: Send + Sync + 'static;
    /// Request message for `call`.
    type Call: Send + 'static;
    /// Response produced for `call`.
    type Reply: Send + 'static;
    /// Fire-and-forget message for `cast`.
    type Cast: Send + 'static;
    /// User-defined out-of-band message for `send_info`.
    type Info: Send + 'static;

    /// Produce the initial state. Runs before the process is recorded;
    /// failure (or exceeding the init timeout) fails the spawn and leaves
    /// no trace.
    async fn init(ctx: &ProcessContext<Self>, config: Self::Config)
        -> Result<Self::State, InitError>;

    /// Synchronous request/response.
    async fn handle_call(
        _ctx: &ProcessContext<Self>,
        _msg: Self::Call,
        state: Self::State,
    ) -> CallOutcome<Self> {
        CallOutcome::Fail("call not handled by this behavior".into(), state)
    }

    /// Fire-and-forget message.
    async fn handle_cast(
        _ctx: &ProcessContext<Self>,
        _msg: Self::Cast,
        state: Self::State,
    ) -> HandlerOutcome<Self> {
        HandlerOutcome::Fail("cast not handled by this behavior".into(), state)
    }

    /// Out-of-band messages: user pushes, trapped exit signals and monitor
    /// down notifications. Timer fires arrive as casts, not here.
    async fn handle_info(
        _ctx: &ProcessContext<Self>,
        _msg: Info<Self::Info>,
        state: Self::State,
    ) -> HandlerOutcome<Self> {
        HandlerOutcome::Continue(state)
    }

    /// Last-chance cleanup. Not invoked on force termination; panics here
    /// are swallowed.
    async fn terminate(_reason: &ExitReason, _state: Self::State) {}

    /// Approximate heap footprint of the state, surfaced in observer
    /// snapshots. `None` leaves the snapshot field empty.
    fn state_memory_bytes(_state: &Self::State) -> Option<u64> {
        None
    }
}

/// Single-shot reply slot for a pending call.
///
/// Obtained inside `handle_call` via [`ProcessContext::take_responder`] when
/// the handler returns [`CallOutcome::NoReply`] and wants to reply later
/// from another task or a subsequent handler.
pub struct Responder<R> {
    tx: oneshot::Sender<Result<R, CallError>>,
}

impl<R> Responder<R> {
    pub(crate) fn new(tx: oneshot::Sender<Result<R, CallError>>) -> Self {
        Responder { tx }
    }

    /// Complete the call. Returns false if the caller already gave up.
    pub fn send(self, reply: R) -> bool {
        self.tx.send(Ok(reply)).is_ok()
    }

    pub(crate) fn fail(self, error: CallError) {
        let _ = self.tx.send(Err(error));
    }
}

impl<R> std::fmt::Debug for Responder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder").finish_non_exhaustive()
    }
}

/// Handle given to a behavior's handlers for interacting with their own
/// process and the runtime it lives in.
pub struct ProcessContext<B: Behavior> {
    runtime: Runtime,
    self_ref: ProcessRef<B>,
    responder: Mutex<Option<Responder<B::Reply>>>,
}

impl<B: Behavior> ProcessContext<B> {
    pub(crate) fn new(runtime: Runtime, self_ref: ProcessRef<B>) -> Self {
        ProcessContext { runtime, self_ref, responder: Mutex::new(None) }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn self_ref(&self) -> &ProcessRef<B> {
        &self.self_ref
    }

    pub fn id(&self) -> ProcessId {
        self.self_ref.id()
    }

    /// Claim the pending call's reply slot for a deferred reply. Only
    /// meaningful inside `handle_call`; returns `None` otherwise, or if the
    /// slot was already claimed.
    pub fn take_responder(&self) -> Option<Responder<B::Reply>> {
        self.responder.lock().take()
    }

    /// Toggle exit trapping: when on, abnormal exits of linked processes
    /// arrive as [`Info::Exit`] messages instead of terminating this
    /// process.
    pub fn set_trap_exit(&self, on: bool) {
        self.self_ref.cell().set_trap_exit(on);
    }

    pub fn traps_exits(&self) -> bool {
        self.self_ref.cell().trap_exit()
    }

    /// Watch another process; its termination is delivered as
    /// [`Info::Down`].
    pub fn monitor(&self, watched: ProcessId) -> MonitorId {
        self.runtime.monitor(self.id(), watched)
    }

    pub fn demonitor(&self, monitor: &MonitorId) -> bool {
        self.runtime.demonitor(monitor)
    }

    /// Link this process to a running peer. Fails if either endpoint is no
    /// longer alive (during `init` the process is not linkable yet).
    pub fn link_to(&self, peer: ProcessId) -> Result<LinkId, SendError> {
        self.runtime.link(self.id(), peer)
    }

    /// Schedule a cast to this process after `delay`.
    pub fn send_after(&self, msg: B::Cast, delay: Duration) -> TimerId {
        self.runtime.send_after(&self.self_ref, msg, delay)
    }

    pub(crate) fn arm_responder(&self, responder: Responder<B::Reply>) {
        *self.responder.lock() = Some(responder);
    }

    pub(crate) fn disarm_responder(&self) -> Option<Responder<B::Reply>> {
        self.responder.lock().take()
    }
}
