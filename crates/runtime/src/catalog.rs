// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavior catalog: name → constructor.
//!
//! The hook a remote-spawn transport (or a dashboard) uses to materialize
//! a process from a behavior name and a JSON config.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use arbor_core::ProcessId;

use crate::behavior::Behavior;
use crate::error::SpawnError;
use crate::runtime::Runtime;

type Constructor =
    Arc<dyn Fn(Runtime, Value) -> BoxFuture<'static, Result<ProcessId, SpawnError>> + Send + Sync>;

#[derive(Default)]
pub(crate) struct BehaviorCatalog {
    entries: Mutex<HashMap<String, Constructor>>,
}

impl BehaviorCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `B` under `name`, replacing any previous registration.
    pub(crate) fn register<B>(&self, name: impl Into<String>)
    where
        B: Behavior,
        B::Config: DeserializeOwned,
    {
        let constructor: Constructor = Arc::new(|runtime, value| {
            Box::pin(async move {
                let config: B::Config = serde_json::from_value(value)
                    .map_err(|e| SpawnError::BadConfig(e.to_string()))?;
                runtime.spawn::<B>(config).await.map(|proc| proc.id())
            })
        });
        self.entries.lock().insert(name.into(), constructor);
    }

    pub(crate) async fn spawn(
        &self,
        runtime: Runtime,
        name: &str,
        config: Value,
    ) -> Result<ProcessId, SpawnError> {
        let constructor = self
            .entries
            .lock()
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| SpawnError::UnknownBehavior(name.to_string()))?;
        constructor(runtime, config).await
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
