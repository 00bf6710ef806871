// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer specs
//!
//! Scheduled casts, cancellation semantics and fires against stopped
//! targets.

use std::time::Duration;

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn send_after_delivers_one_cast() {
    let runtime = Runtime::new();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();

    runtime.send_after(&counter, CounterCast::Inc, Duration::from_millis(100));
    assert_eq!(counter.call(CounterCall::Get).await.unwrap(), 0);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(counter.call(CounterCall::Get).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_timer_never_fires_and_cancel_is_single_shot() {
    let runtime = Runtime::new();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();

    let timer = runtime.send_after(&counter, CounterCast::Inc, Duration::from_millis(100));
    assert!(runtime.cancel_timer(&timer));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.call(CounterCall::Get).await.unwrap(), 0);
    assert!(!runtime.cancel_timer(&timer));
}

#[tokio::test(start_paused = true)]
async fn cancel_after_fire_reports_false() {
    let runtime = Runtime::new();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();

    let timer = runtime.send_after(&counter, CounterCast::Inc, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!runtime.cancel_timer(&timer));
    assert_eq!(counter.call(CounterCall::Get).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn fire_against_a_stopped_target_is_discarded() {
    let runtime = Runtime::new();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();

    runtime.send_after(&counter, CounterCast::Inc, Duration::from_millis(100));
    counter.stop(ExitReason::Normal).await;
    // The fire lands in the void; nothing panics, nothing restarts.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!counter.is_alive());
}

#[tokio::test(start_paused = true)]
async fn intervals_repeat_until_cancelled() {
    let runtime = Runtime::new();
    let counter = runtime.spawn::<Counter>(0).await.unwrap();

    let timer = runtime.send_interval(&counter, CounterCast::Inc, Duration::from_millis(10));
    wait_until("three ticks", || counter.snapshot().message_count >= 3).await;
    assert!(runtime.cancel_timer(&timer));

    let settled = counter.call(CounterCall::Get).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counter.call(CounterCall::Get).await.unwrap(), settled);
    assert!(settled >= 3);
}
