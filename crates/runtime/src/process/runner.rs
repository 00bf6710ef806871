// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-process mailbox loop: one handler at a time, FIFO across all
//! message kinds, graceful-stop drain and force-kill abort.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::FutureExt;
use tokio::sync::mpsc;

use arbor_core::{ExitReason, ProcessStatus};

use crate::behavior::{Behavior, CallOutcome, HandlerOutcome, ProcessContext, Responder};
use crate::error::CallError;
use crate::persist::PersistSession;
use crate::process::cell::{Envelope, ProcessCell};

/// What a dispatched handler decided about the loop.
enum Flow {
    Continue,
    /// In-band stop (graceful): drain, terminate callback, finalize.
    Stop(ExitReason),
    /// Forced: no terminate callback, state already gone.
    Killed(ExitReason),
}

pub(crate) struct Runner<B: Behavior> {
    cell: Arc<ProcessCell<B>>,
    ctx: Arc<ProcessContext<B>>,
    rx: mpsc::UnboundedReceiver<Envelope<B>>,
    persistence: Option<PersistSession<B>>,
    /// Reply slots claimed-by-nobody after a `NoReply`: kept open so the
    /// caller observes its timeout rather than a closed channel.
    parked: Vec<Responder<B::Reply>>,
}

impl<B: Behavior> Runner<B> {
    pub(crate) fn new(
        cell: Arc<ProcessCell<B>>,
        ctx: Arc<ProcessContext<B>>,
        rx: mpsc::UnboundedReceiver<Envelope<B>>,
        persistence: Option<PersistSession<B>>,
    ) -> Self {
        Runner { cell, ctx, rx, persistence, parked: Vec::new() }
    }

    pub(crate) async fn run(mut self, state: B::State) {
        let mut slot = Some(state);
        let (reason, forced) = self.serve(&mut slot).await;
        let id = self.cell.id();
        let runtime = self.ctx.runtime().clone();

        // No further dequeues: reject whatever is still queued.
        self.rx.close();
        self.drain();

        if !forced {
            if let Some(state) = slot.take() {
                if let Some(p) = self.persistence.as_mut() {
                    p.flush(&state).await;
                }
                // Last-chance cleanup; a panicking terminate is swallowed.
                let fut = AssertUnwindSafe(B::terminate(&reason, state)).catch_unwind();
                if fut.await.is_err() {
                    tracing::debug!(process = %id, "terminate callback panicked");
                }
            }
        }

        self.parked.clear();
        self.cell.mark_stopped();
        runtime.finalize_exit(id, &reason);
        self.cell.signal_done();
        tracing::debug!(process = %id, reason = %reason, "process stopped");
    }

    /// Main loop. Returns the termination reason and whether it was forced.
    async fn serve(&mut self, slot: &mut Option<B::State>) -> (ExitReason, bool) {
        enum Wake<T> {
            Killed,
            StopNudge,
            Mail(Option<T>),
        }

        let kill = self.cell.kill.clone();
        let cell = Arc::clone(&self.cell);
        loop {
            if cell.status() == ProcessStatus::Stopping {
                let reason = cell.take_exit_reason().unwrap_or(ExitReason::Normal);
                return (reason, false);
            }
            let wake = tokio::select! {
                biased;
                _ = kill.cancelled() => Wake::Killed,
                _ = cell.stop_notify.notified() => Wake::StopNudge,
                envelope = self.rx.recv() => Wake::Mail(envelope),
            };
            match wake {
                Wake::Killed => return (self.kill_reason(), true),
                // Loop re-checks the status word.
                Wake::StopNudge => {}
                Wake::Mail(None) => return (ExitReason::Normal, false),
                Wake::Mail(Some(envelope)) => {
                    cell.note_dequeue();
                    match self.dispatch(envelope, slot).await {
                        Flow::Continue => {}
                        Flow::Stop(reason) => return (reason, false),
                        Flow::Killed(reason) => return (reason, true),
                    }
                }
            }
        }
    }

    async fn dispatch(&mut self, envelope: Envelope<B>, slot: &mut Option<B::State>) -> Flow {
        let Some(state) = slot.take() else {
            return Flow::Killed(ExitReason::error("process state lost"));
        };
        match envelope {
            Envelope::Call { msg, responder } => {
                self.ctx.arm_responder(responder);
                let kill = self.cell.kill.clone();
                let ctx = Arc::clone(&self.ctx);
                let fut = async move { B::handle_call(&ctx, msg, state).await };
                let raced = tokio::select! {
                    biased;
                    _ = kill.cancelled() => None,
                    outcome = AssertUnwindSafe(fut).catch_unwind() => Some(outcome),
                };
                let Some(outcome) = raced else {
                    self.ctx.disarm_responder();
                    return Flow::Killed(self.kill_reason());
                };
                let responder = self.ctx.disarm_responder();
                match outcome {
                    Ok(CallOutcome::Reply(reply, state)) => {
                        match responder {
                            Some(r) => {
                                r.send(reply);
                            }
                            None => tracing::debug!(
                                process = %self.cell.id(),
                                "reply discarded; responder was already claimed"
                            ),
                        }
                        self.after_handler(&state).await;
                        *slot = Some(state);
                        Flow::Continue
                    }
                    Ok(CallOutcome::NoReply(state)) => {
                        if let Some(r) = responder {
                            self.parked.push(r);
                        }
                        self.after_handler(&state).await;
                        *slot = Some(state);
                        Flow::Continue
                    }
                    Ok(CallOutcome::Stop(reason, reply, state)) => {
                        if let Some(r) = responder {
                            r.send(reply);
                        }
                        self.cell.begin_stopping();
                        *slot = Some(state);
                        Flow::Stop(reason)
                    }
                    Ok(CallOutcome::Fail(error, state)) => {
                        tracing::debug!(
                            process = %self.cell.id(),
                            error = %error,
                            "call handler failed; state unchanged"
                        );
                        if let Some(r) = responder {
                            r.fail(CallError::Handler(error));
                        }
                        *slot = Some(state);
                        Flow::Continue
                    }
                    Err(payload) => {
                        Flow::Killed(ExitReason::error(panic_detail("handle_call", &payload)))
                    }
                }
            }
            Envelope::Cast(msg) => {
                let ctx = Arc::clone(&self.ctx);
                let fut = async move { B::handle_cast(&ctx, msg, state).await };
                self.run_plain(fut, slot, "handle_cast").await
            }
            Envelope::Info(msg) => {
                let ctx = Arc::clone(&self.ctx);
                let fut = async move { B::handle_info(&ctx, msg, state).await };
                self.run_plain(fut, slot, "handle_info").await
            }
        }
    }

    async fn run_plain<F>(&mut self, fut: F, slot: &mut Option<B::State>, handler: &str) -> Flow
    where
        F: std::future::Future<Output = HandlerOutcome<B>>,
    {
        let kill = self.cell.kill.clone();
        let raced = tokio::select! {
            biased;
            _ = kill.cancelled() => None,
            outcome = AssertUnwindSafe(fut).catch_unwind() => Some(outcome),
        };
        let Some(outcome) = raced else {
            return Flow::Killed(self.kill_reason());
        };
        match outcome {
            Ok(HandlerOutcome::Continue(state)) => {
                self.after_handler(&state).await;
                *slot = Some(state);
                Flow::Continue
            }
            Ok(HandlerOutcome::Stop(reason, state)) => {
                self.cell.begin_stopping();
                *slot = Some(state);
                Flow::Stop(reason)
            }
            Ok(HandlerOutcome::Fail(error, state)) => {
                tracing::debug!(
                    process = %self.cell.id(),
                    handler,
                    error = %error,
                    "handler failed; message dropped, state unchanged"
                );
                *slot = Some(state);
                Flow::Continue
            }
            Err(payload) => Flow::Killed(ExitReason::error(panic_detail(handler, &payload))),
        }
    }

    async fn after_handler(&mut self, state: &B::State) {
        self.cell.set_state_bytes(B::state_memory_bytes(state));
        if let Some(p) = self.persistence.as_mut() {
            p.note_dirty();
            p.maybe_save(state).await;
        }
    }

    fn kill_reason(&self) -> ExitReason {
        self.cell
            .take_exit_reason()
            .unwrap_or_else(|| ExitReason::error("killed"))
    }

    fn drain(&mut self) {
        while let Ok(envelope) = self.rx.try_recv() {
            self.cell.note_drained();
            if let Envelope::Call { responder, .. } = envelope {
                responder.fail(CallError::NotRunning);
            }
        }
    }
}

fn panic_detail(handler: &str, payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("{handler} panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("{handler} panicked: {msg}")
    } else {
        format!("{handler} panicked")
    }
}
