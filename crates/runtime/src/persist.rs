// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State persistence adapter interface.
//!
//! Persistence itself is a collaborator concern: the runtime only calls a
//! user-supplied adapter at the right lifecycle moments (restore during
//! init, debounced save after handler completion, flush on shutdown).
//! Adapter failures are reported to an optional hook and the process keeps
//! running in memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::behavior::Behavior;
use crate::error::AdapterError;

/// User-supplied storage backend for process state snapshots.
#[async_trait]
pub trait StateAdapter: Send + Sync {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), AdapterError>;
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, AdapterError>;
    async fn delete(&self, key: &str) -> Result<(), AdapterError>;
    async fn exists(&self, key: &str) -> Result<bool, AdapterError>;
    async fn list_keys(&self) -> Result<Vec<String>, AdapterError>;
}

/// In-memory adapter for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryAdapter {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateAdapter for MemoryAdapter {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), AdapterError> {
        self.entries.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), AdapterError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, AdapterError> {
        Ok(self.entries.lock().contains_key(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>, AdapterError> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Hook invoked with adapter failures; the process continues in memory.
pub type ErrorHook = Arc<dyn Fn(&AdapterError) + Send + Sync>;

/// Default pause between saves of a dirty state.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Persistence wiring for one process, passed via spawn options.
pub struct Persistence<B: Behavior> {
    pub adapter: Arc<dyn StateAdapter>,
    pub key: String,
    pub debounce: Duration,
    pub encode: fn(&B::State) -> Result<Vec<u8>, AdapterError>,
    pub decode: fn(&[u8]) -> Result<B::State, AdapterError>,
    pub on_error: Option<ErrorHook>,
}

impl<B: Behavior> Clone for Persistence<B> {
    fn clone(&self) -> Self {
        Persistence {
            adapter: Arc::clone(&self.adapter),
            key: self.key.clone(),
            debounce: self.debounce,
            encode: self.encode,
            decode: self.decode,
            on_error: self.on_error.clone(),
        }
    }
}

impl<B: Behavior> Persistence<B>
where
    B::State: Serialize + DeserializeOwned,
{
    /// JSON-encoded snapshots under `key`.
    pub fn json(adapter: Arc<dyn StateAdapter>, key: impl Into<String>) -> Self {
        Persistence {
            adapter,
            key: key.into(),
            debounce: SAVE_DEBOUNCE,
            encode: encode_json::<B::State>,
            decode: decode_json::<B::State>,
            on_error: None,
        }
    }
}

impl<B: Behavior> Persistence<B> {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }
}

fn encode_json<S: Serialize>(state: &S) -> Result<Vec<u8>, AdapterError> {
    serde_json::to_vec(state).map_err(|e| AdapterError::new(e.to_string()))
}

fn decode_json<S: DeserializeOwned>(bytes: &[u8]) -> Result<S, AdapterError> {
    serde_json::from_slice(bytes).map_err(|e| AdapterError::new(e.to_string()))
}

/// Runner-side persistence state: dirtiness and the save debounce window.
pub(crate) struct PersistSession<B: Behavior> {
    config: Persistence<B>,
    dirty: bool,
    last_save: Option<Instant>,
}

impl<B: Behavior> PersistSession<B> {
    pub(crate) fn new(config: Persistence<B>) -> Self {
        PersistSession { config, dirty: false, last_save: None }
    }

    /// Load and decode a stored snapshot. `None` (no snapshot, or a
    /// load/decode failure routed to the hook) falls back to `init`.
    pub(crate) async fn restore(&self) -> Option<B::State> {
        let bytes = match self.config.adapter.load(&self.config.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(error) => {
                self.report(&error);
                return None;
            }
        };
        match (self.config.decode)(&bytes) {
            Ok(state) => Some(state),
            Err(error) => {
                self.report(&error);
                None
            }
        }
    }

    pub(crate) fn note_dirty(&mut self) {
        self.dirty = true;
    }

    /// Save if dirty and outside the debounce window.
    pub(crate) async fn maybe_save(&mut self, state: &B::State) {
        if !self.dirty {
            return;
        }
        if let Some(last) = self.last_save {
            if last.elapsed() < self.config.debounce {
                return;
            }
        }
        self.save(state).await;
    }

    /// Unconditional save of a dirty state; called on shutdown.
    pub(crate) async fn flush(&mut self, state: &B::State) {
        if self.dirty {
            self.save(state).await;
        }
    }

    async fn save(&mut self, state: &B::State) {
        let bytes = match (self.config.encode)(state) {
            Ok(bytes) => bytes,
            Err(error) => {
                self.report(&error);
                return;
            }
        };
        match self.config.adapter.save(&self.config.key, &bytes).await {
            Ok(()) => {
                self.dirty = false;
                self.last_save = Some(Instant::now());
            }
            Err(error) => self.report(&error),
        }
    }

    fn report(&self, error: &AdapterError) {
        tracing::debug!(key = %self.config.key, error = %error, "state adapter failed; continuing in memory");
        if let Some(hook) = &self.config.on_error {
            hook(error);
        }
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
