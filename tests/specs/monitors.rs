// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor specs
//!
//! Down notifications with real reasons, noproc for unknown ids, and
//! one-way semantics.

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn down_carries_the_termination_reason() {
    let runtime = Runtime::new();
    let watcher = runtime.spawn::<Probe>(()).await.unwrap();
    let watched = runtime.spawn::<Counter>(0).await.unwrap();
    runtime.monitor(watcher.id(), watched.id());

    runtime.force_terminate(watched.id(), ExitReason::error("crash"));
    wait_until("watched gone", || !runtime.is_alive(watched.id())).await;
    settle().await;

    let seen = watcher.call(()).await.unwrap();
    assert_eq!(
        seen,
        vec![ProbeEvent::Down { process: watched.id(), reason: ExitReason::error("crash") }]
    );
}

#[tokio::test(start_paused = true)]
async fn monitor_of_nonexistent_id_is_noproc_exactly_once() {
    let runtime = Runtime::new();
    let mut events = runtime.subscribe();
    let watcher = runtime.spawn::<Probe>(()).await.unwrap();
    let ghost = ProcessId::new();

    runtime.monitor(watcher.id(), ghost);
    settle().await;

    let seen = watcher.call(()).await.unwrap();
    assert_eq!(seen, vec![ProbeEvent::Down { process: ghost, reason: ExitReason::NoProc }]);

    let mut downs = 0;
    while let Some(event) = events.try_recv() {
        if matches!(event, LifecycleEvent::ProcessDown { watched, .. } if watched == ghost) {
            downs += 1;
        }
    }
    assert_eq!(downs, 1);
}

#[tokio::test(start_paused = true)]
async fn each_monitor_fires_separately() {
    let runtime = Runtime::new();
    let watcher = runtime.spawn::<Probe>(()).await.unwrap();
    let watched = runtime.spawn::<Counter>(0).await.unwrap();
    runtime.monitor(watcher.id(), watched.id());
    runtime.monitor(watcher.id(), watched.id());

    watched.stop(ExitReason::Normal).await;
    settle().await;

    let seen = watcher.call(()).await.unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|e| matches!(
        e,
        ProbeEvent::Down { process, reason } if *process == watched.id() && *reason == ExitReason::Normal
    )));
}

#[tokio::test(start_paused = true)]
async fn demonitor_is_idempotent_and_stops_delivery() {
    let runtime = Runtime::new();
    let watcher = runtime.spawn::<Probe>(()).await.unwrap();
    let watched = runtime.spawn::<Counter>(0).await.unwrap();
    let monitor = runtime.monitor(watcher.id(), watched.id());

    assert!(runtime.demonitor(&monitor));
    assert!(!runtime.demonitor(&monitor));

    watched.stop(ExitReason::Normal).await;
    settle().await;
    assert!(watcher.call(()).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn monitoring_is_one_way() {
    let runtime = Runtime::new();
    let watcher = runtime.spawn::<Probe>(()).await.unwrap();
    let watched = runtime.spawn::<Counter>(0).await.unwrap();
    runtime.monitor(watcher.id(), watched.id());

    // The watcher going away must not disturb the watched process.
    watcher.stop(ExitReason::Normal).await;
    settle().await;
    assert!(watched.is_alive());
    assert_eq!(watched.call(CounterCall::Get).await.unwrap(), 0);
}
