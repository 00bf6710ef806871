// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle and mailbox specs
//!
//! The counter scenario, FIFO delivery, handler exclusivity and the
//! exactly-one-terminated-event guarantee.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arbor_runtime::ProcessStatus;

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn counter_lifecycle_emits_one_started_and_one_terminated() {
    let runtime = Runtime::new();
    let mut events = runtime.subscribe();

    let counter = runtime.spawn::<Counter>(0).await.unwrap();
    counter.cast(CounterCast::Inc).unwrap();
    counter.cast(CounterCast::Inc).unwrap();
    counter.cast(CounterCast::Inc).unwrap();
    assert_eq!(counter.call(CounterCall::Get).await.unwrap(), 3);

    counter.stop(ExitReason::Normal).await;
    assert_eq!(counter.status(), ProcessStatus::Stopped);

    let mut started = 0;
    let mut terminated = 0;
    while let Some(event) = events.try_recv() {
        match event {
            LifecycleEvent::Started { id } if id == counter.id() => started += 1,
            LifecycleEvent::Terminated { id, reason } if id == counter.id() => {
                assert_eq!(reason, ExitReason::Normal);
                terminated += 1;
            }
            _ => {}
        }
    }
    assert_eq!(started, 1);
    assert_eq!(terminated, 1);
}

#[tokio::test(start_paused = true)]
async fn messages_from_one_sender_arrive_in_send_order() {
    let runtime = Runtime::new();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();

    // A cast enqueued before a call is handled before it, so every get
    // observes exactly the incs sent before it.
    for expected in 1..=50u64 {
        counter.cast(CounterCast::Inc).unwrap();
        assert_eq!(counter.call(CounterCall::Get).await.unwrap(), expected);
    }
}

/// Overlap detector: flags a violation if two handlers ever run at once.
struct Exclusive;

#[async_trait]
impl Behavior for Exclusive {
    type Config = Arc<(AtomicBool, AtomicBool)>;
    type State = Arc<(AtomicBool, AtomicBool)>;
    type Call = ();
    type Reply = ();
    type Cast = ();
    type Info = ();

    async fn init(
        _ctx: &ProcessContext<Self>,
        config: Self::Config,
    ) -> Result<Self::State, InitError> {
        Ok(config)
    }

    async fn handle_cast(
        _ctx: &ProcessContext<Self>,
        _msg: (),
        state: Self::State,
    ) -> HandlerOutcome<Self> {
        let (in_handler, violated) = &*state;
        if in_handler.swap(true, Ordering::SeqCst) {
            violated.store(true, Ordering::SeqCst);
        }
        // Suspend mid-handler; the next message must still wait.
        tokio::time::sleep(Duration::from_millis(1)).await;
        in_handler.store(false, Ordering::SeqCst);
        HandlerOutcome::Continue(state)
    }

    async fn handle_call(
        _ctx: &ProcessContext<Self>,
        _msg: (),
        state: Self::State,
    ) -> CallOutcome<Self> {
        CallOutcome::Reply((), state)
    }
}

#[tokio::test(start_paused = true)]
async fn at_most_one_handler_runs_at_any_instant() {
    let runtime = Runtime::new();
    let flags = Arc::new((AtomicBool::new(false), AtomicBool::new(false)));
    let proc = runtime.spawn::<Exclusive>(Arc::clone(&flags)).await.unwrap();

    for _ in 0..25 {
        proc.cast(()).unwrap();
    }
    // The call drains behind every cast.
    proc.call(()).await.unwrap();
    assert!(!flags.1.load(Ordering::SeqCst), "handlers overlapped");
}

#[tokio::test(start_paused = true)]
async fn force_terminate_emits_exactly_one_terminated() {
    let runtime = Runtime::new();
    let mut events = runtime.subscribe();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();

    assert!(runtime.force_terminate(counter.id(), ExitReason::error("boom")));
    wait_until("terminated", || !counter.is_alive()).await;
    // A second force on a stopped process is a no-op.
    assert!(!runtime.force_terminate(counter.id(), ExitReason::error("again")));
    settle().await;

    let mut terminations = Vec::new();
    while let Some(event) = events.try_recv() {
        if let LifecycleEvent::Terminated { id, reason } = event {
            if id == counter.id() {
                terminations.push(reason);
            }
        }
    }
    assert_eq!(terminations, vec![ExitReason::error("boom")]);
}

#[tokio::test(start_paused = true)]
async fn snapshots_are_consistent_at_observation() {
    let runtime = Runtime::new();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();
    counter.cast(CounterCast::Inc).unwrap();
    assert_eq!(counter.call(CounterCall::Get).await.unwrap(), 1);

    let snapshot = runtime.snapshot(counter.id()).unwrap();
    assert_eq!(snapshot.id, counter.id());
    assert_eq!(snapshot.status, ProcessStatus::Running);
    assert_eq!(snapshot.queue_size, 0);
    assert_eq!(snapshot.message_count, 2);

    assert_eq!(runtime.process_ids(), vec![counter.id()]);
}
