// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence adapter specs
//!
//! Restore on init, save on shutdown, adapter failures kept out of the
//! process's way.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor_runtime::{AdapterError, MemoryAdapter, Persistence, SpawnOptions, StateAdapter};

use crate::prelude::*;

#[tokio::test(start_paused = true)]
async fn state_survives_a_stop_via_the_adapter() {
    let runtime = Runtime::new();
    let adapter: Arc<dyn StateAdapter> = Arc::new(MemoryAdapter::new());

    let first = runtime
        .spawn_with::<Counter>(
            0,
            SpawnOptions::new().persist(Persistence::json(Arc::clone(&adapter), "counter")),
        )
        .await
        .unwrap();
    first.cast(CounterCast::Inc).unwrap();
    first.cast(CounterCast::Inc).unwrap();
    assert_eq!(first.call(CounterCall::Get).await.unwrap(), 2);
    first.stop(ExitReason::Normal).await;

    // A fresh process under the same key resumes from the snapshot; its
    // init config is ignored in favor of the restored state.
    let second = runtime
        .spawn_with::<Counter>(
            99,
            SpawnOptions::new().persist(Persistence::json(Arc::clone(&adapter), "counter")),
        )
        .await
        .unwrap();
    assert_eq!(second.call(CounterCall::Get).await.unwrap(), 2);
}

struct FailingAdapter;

#[async_trait]
impl StateAdapter for FailingAdapter {
    async fn save(&self, _key: &str, _bytes: &[u8]) -> Result<(), AdapterError> {
        Err(AdapterError::new("disk on fire"))
    }

    async fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        Err(AdapterError::new("disk on fire"))
    }

    async fn delete(&self, _key: &str) -> Result<(), AdapterError> {
        Err(AdapterError::new("disk on fire"))
    }

    async fn exists(&self, _key: &str) -> Result<bool, AdapterError> {
        Err(AdapterError::new("disk on fire"))
    }

    async fn list_keys(&self) -> Result<Vec<String>, AdapterError> {
        Err(AdapterError::new("disk on fire"))
    }
}

#[tokio::test(start_paused = true)]
async fn adapter_failures_hit_the_hook_and_spare_the_process() {
    let runtime = Runtime::new();
    let hook_hits = Arc::new(AtomicUsize::new(0));

    let hits = Arc::clone(&hook_hits);
    let persistence = Persistence::<Counter>::json(Arc::new(FailingAdapter), "counter")
        .with_debounce(std::time::Duration::ZERO)
        .with_error_hook(Arc::new(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }));

    let proc = runtime
        .spawn_with::<Counter>(0, SpawnOptions::new().persist(persistence))
        .await
        .unwrap();

    // Load failed (hook), saves fail (hook), the process just keeps going.
    proc.cast(CounterCast::Inc).unwrap();
    assert_eq!(proc.call(CounterCall::Get).await.unwrap(), 1);
    assert!(hook_hits.load(Ordering::SeqCst) >= 2);
    proc.stop(ExitReason::Normal).await;
}
