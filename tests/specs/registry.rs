// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry specs
//!
//! Round trips, duplicate-mode dispatch and cleanup on termination.

use arbor_runtime::{KeyMode, RegistryError, SpawnOptions};
use serde_json::json;

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn register_lookup_round_trip_and_cleanup() {
    let runtime = Runtime::new();
    let registry = runtime.registry();

    let proc = runtime.spawn::<Counter>(0).await.unwrap();
    registry.register("cache", proc.id(), None).unwrap();
    assert_eq!(registry.lookup("cache").unwrap().process, proc.id());

    proc.stop(ExitReason::Normal).await;
    assert!(matches!(
        registry.lookup("cache"),
        Err(RegistryError::NotRegistered(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn force_terminate_also_cleans_the_registry() {
    let runtime = Runtime::new();
    let registry = runtime.registry();
    let proc = runtime.spawn::<Counter>(0).await.unwrap();
    registry.register("cache", proc.id(), None).unwrap();

    runtime.force_terminate(proc.id(), ExitReason::error("boom"));
    wait_until("evicted", || registry.lookup("cache").is_err()).await;
}

#[tokio::test(start_paused = true)]
async fn duplicate_mode_dispatch_reaches_every_subscriber() {
    let runtime = Runtime::new();
    let topics = runtime.named_registry("topics", KeyMode::Duplicate).unwrap();

    let p1 = runtime.spawn::<Counter>(0).await.unwrap();
    let p2 = runtime.spawn::<Counter>(0).await.unwrap();
    topics.register("t", p1.id(), None).unwrap();
    topics.register("t", p2.id(), None).unwrap();

    assert_eq!(topics.dispatch::<Counter>("t", CounterCast::Inc), 2);
    wait_until("both observed the cast", || {
        p1.snapshot().message_count >= 1 && p2.snapshot().message_count >= 1
    })
    .await;
    assert_eq!(p1.call(CounterCall::Get).await.unwrap(), 1);
    assert_eq!(p2.call(CounterCall::Get).await.unwrap(), 1);

    // After p1 goes away, only p2 remains under the key.
    p1.stop(ExitReason::Normal).await;
    let remaining = topics.lookup_all("t");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].process, p2.id());
}

#[tokio::test(start_paused = true)]
async fn start_and_register_is_atomic() {
    let runtime = Runtime::new();
    let registry = runtime.registry();
    let mut events = runtime.subscribe();

    let proc = runtime
        .spawn_with::<Counter>(
            0,
            SpawnOptions::new().register_with_metadata(&registry, "svc", json!({"role": "cache"})),
        )
        .await
        .unwrap();

    // By the time `started` is observable, the registration exists.
    let started = loop {
        match events.recv().await {
            Some(LifecycleEvent::Started { id }) => break id,
            Some(_) => {}
            None => panic!("bus closed"),
        }
    };
    assert_eq!(started, proc.id());
    let entry = registry.lookup("svc").unwrap();
    assert_eq!(entry.process, proc.id());
    assert_eq!(entry.metadata, Some(json!({"role": "cache"})));
}

#[tokio::test(start_paused = true)]
async fn metadata_updates_apply_to_every_matching_entry() {
    let runtime = Runtime::new();
    let topics = runtime.named_registry("meta", KeyMode::Duplicate).unwrap();
    let p1 = runtime.spawn::<Counter>(0).await.unwrap();
    let p2 = runtime.spawn::<Counter>(0).await.unwrap();
    topics.register("t", p1.id(), Some(json!({"gen": 1}))).unwrap();
    topics.register("t", p2.id(), Some(json!({"gen": 1}))).unwrap();

    let touched = topics.update_metadata("t", |_| Some(json!({"gen": 2}))).unwrap();
    assert_eq!(touched, 2);
    assert!(topics
        .lookup_all("t")
        .iter()
        .all(|e| e.metadata == Some(json!({"gen": 2}))));
}

#[tokio::test(start_paused = true)]
async fn key_globs_select_across_instances() {
    let runtime = Runtime::new();
    let registry = runtime.registry();
    let a = runtime.spawn::<Counter>(0).await.unwrap();
    let b = runtime.spawn::<Counter>(0).await.unwrap();
    let c = runtime.spawn::<Counter>(0).await.unwrap();
    registry.register("worker.1", a.id(), None).unwrap();
    registry.register("worker.2", b.id(), None).unwrap();
    registry.register("jobs/build/1", c.id(), None).unwrap();

    assert_eq!(registry.match_keys("worker.*").unwrap().len(), 2);
    assert_eq!(registry.match_keys("worker.?").unwrap().len(), 2);
    assert!(registry.match_keys("jobs/*").unwrap().is_empty());
    assert_eq!(registry.match_keys("jobs/**").unwrap().len(), 1);
    assert_eq!(registry.match_keys("**").unwrap().len(), 3);

    let selected = registry.select(|key, _| key.starts_with("worker"));
    assert_eq!(selected.len(), 2);
}
