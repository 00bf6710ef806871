// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pub/sub of lifecycle events.
//!
//! The publisher never blocks: every subscriber has its own queue, and a
//! subscriber that falls behind loses its own oldest events without
//! disturbing anybody else.

use tokio::sync::broadcast;

use arbor_core::LifecycleEvent;

/// Per-subscriber queue depth before the oldest events are dropped.
const EVENT_BUS_CAPACITY: usize = 1024;

pub(crate) struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        EventBus { tx }
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        tracing::trace!(event = %event.log_summary(), "lifecycle event");
        // Send only fails when there is no subscriber, which is fine.
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> EventStream {
        EventStream { rx: self.tx.subscribe() }
    }
}

/// One subscriber's ordered view of the lifecycle event flow.
pub struct EventStream {
    rx: broadcast::Receiver<LifecycleEvent>,
}

impl EventStream {
    /// Next event, in publish order. Returns `None` once the runtime that
    /// produced the stream is gone. A lagged stretch is skipped with a
    /// debug note rather than surfaced as an error.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "event subscriber lagged; skipping");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](EventStream::recv).
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "event subscriber lagged; skipping");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
