// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled delivery of casts after a delay.
//!
//! Timers ride tokio's monotonic clock, so wall-clock jumps do not move
//! fire times. A fire is one silent mailbox enqueue; if the target stopped
//! first, the fire is discarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use arbor_core::TimerId;

use crate::behavior::Behavior;
use crate::process::ProcessRef;

#[derive(Default)]
pub(crate) struct TimerService {
    pending: Arc<Mutex<HashMap<TimerId, CancellationToken>>>,
}

impl TimerService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Deliver `msg` as a cast on `target` after `delay`.
    pub(crate) fn send_after<B: Behavior>(
        &self,
        target: &ProcessRef<B>,
        msg: B::Cast,
        delay: Duration,
    ) -> TimerId {
        let id = TimerId::new();
        let token = CancellationToken::new();
        self.pending.lock().insert(id, token.clone());

        let pending = Arc::clone(&self.pending);
        let target = target.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Whoever removes the entry owns the outcome: either
                    // this fire or a concurrent cancel, never both.
                    if pending.lock().remove(&id).is_some() && !target.cast_silent(msg) {
                        tracing::debug!(timer = %id, target = %target.id(), "timer fire discarded; target stopped");
                    }
                }
            }
        });
        id
    }

    /// Deliver `msg` as a cast on `target` every `every`, until cancelled
    /// or the target stops.
    pub(crate) fn send_interval<B: Behavior>(
        &self,
        target: &ProcessRef<B>,
        msg: B::Cast,
        every: Duration,
    ) -> TimerId
    where
        B::Cast: Clone,
    {
        let id = TimerId::new();
        let token = CancellationToken::new();
        self.pending.lock().insert(id, token.clone());

        let pending = Arc::clone(&self.pending);
        let target = target.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(every) => {
                        if !target.cast_silent(msg.clone()) {
                            tracing::debug!(timer = %id, target = %target.id(), "interval stopped; target gone");
                            pending.lock().remove(&id);
                            break;
                        }
                    }
                }
            }
        });
        id
    }

    /// Cancel a pending timer. True iff the timer had not fired (and is
    /// now revoked); false if it already fired or was already cancelled.
    pub(crate) fn cancel(&self, id: &TimerId) -> bool {
        match self.pending.lock().remove(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}
