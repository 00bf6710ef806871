// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Link specs
//!
//! Exit propagation, trap-exit conversion and link symmetry.

use arbor_runtime::SpawnOptions;

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn trapped_abnormal_exit_arrives_as_info() {
    let runtime = Runtime::new();
    let trapper = runtime
        .spawn_with::<Probe>((), SpawnOptions::new().trap_exit(true))
        .await
        .unwrap();
    let plain = runtime.spawn::<Counter>(0).await.unwrap();
    runtime.link(trapper.id(), plain.id()).unwrap();

    runtime.force_terminate(plain.id(), ExitReason::error("boom"));
    wait_until("plain gone", || !runtime.is_alive(plain.id())).await;
    settle().await;

    assert!(trapper.is_alive());
    let seen = trapper.call(()).await.unwrap();
    assert_eq!(
        seen,
        vec![ProbeEvent::Exit { from: plain.id(), reason: ExitReason::error("boom") }]
    );
}

#[tokio::test(start_paused = true)]
async fn normal_exit_is_not_trapped_and_not_propagated() {
    let runtime = Runtime::new();
    let trapper = runtime
        .spawn_with::<Probe>((), SpawnOptions::new().trap_exit(true))
        .await
        .unwrap();
    let plain = runtime.spawn::<Counter>(0).await.unwrap();
    runtime.link(trapper.id(), plain.id()).unwrap();

    plain.stop(ExitReason::Normal).await;
    settle().await;

    assert!(trapper.is_alive());
    assert!(trapper.call(()).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn links_are_symmetric_under_crashes() {
    // Crashing either endpoint takes the other one down.
    for crash_first in [true, false] {
        let runtime = Runtime::new();
        let a = runtime.spawn::<Counter>(0).await.unwrap();
        let b = runtime.spawn::<Counter>(0).await.unwrap();
        runtime.link(a.id(), b.id()).unwrap();

        let (victim, other) = if crash_first { (&a, &b) } else { (&b, &a) };
        runtime.force_terminate(victim.id(), ExitReason::error("boom"));
        wait_until("both endpoints down", || {
            !runtime.is_alive(a.id()) && !runtime.is_alive(b.id())
        })
        .await;
        assert!(!other.is_alive());
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_reason_also_propagates() {
    let runtime = Runtime::new();
    let a = runtime.spawn::<Counter>(0).await.unwrap();
    let b = runtime.spawn::<Counter>(0).await.unwrap();
    runtime.link(a.id(), b.id()).unwrap();

    // Shutdown is abnormal for link purposes; only `normal` stays quiet.
    runtime.stop(b.id(), ExitReason::Shutdown).await;
    wait_until("peer taken down", || !a.is_alive()).await;
}

#[tokio::test(start_paused = true)]
async fn unlinked_processes_are_independent() {
    let runtime = Runtime::new();
    let a = runtime.spawn::<Counter>(0).await.unwrap();
    let b = runtime.spawn::<Counter>(0).await.unwrap();
    let link = runtime.link(a.id(), b.id()).unwrap();
    assert!(runtime.unlink(&link));

    runtime.force_terminate(b.id(), ExitReason::error("boom"));
    settle().await;
    assert!(a.is_alive());
}

#[tokio::test(start_paused = true)]
async fn cleanup_is_complete_after_termination() {
    // After `terminated(p)` is observed, nothing references p anymore.
    let runtime = Runtime::new();
    let registry = runtime.registry();
    let mut events = runtime.subscribe();

    let trapper = runtime
        .spawn_with::<Probe>((), SpawnOptions::new().trap_exit(true))
        .await
        .unwrap();
    let p = runtime.spawn::<Counter>(0).await.unwrap();
    runtime.link(trapper.id(), p.id()).unwrap();
    runtime.monitor(trapper.id(), p.id());
    registry.register("p", p.id(), None).unwrap();

    runtime.force_terminate(p.id(), ExitReason::error("boom"));
    loop {
        match events.recv().await {
            Some(LifecycleEvent::Terminated { id, .. }) if id == p.id() => break,
            Some(_) => {}
            None => panic!("bus closed"),
        }
    }

    assert!(registry.lookup("p").is_err());
    assert!(runtime.lookup::<Counter>(p.id()).is_none());
    settle().await;
    let seen = trapper.call(()).await.unwrap();
    assert!(seen
        .iter()
        .any(|e| matches!(e, ProbeEvent::Exit { from, .. } if *from == p.id())));
}
