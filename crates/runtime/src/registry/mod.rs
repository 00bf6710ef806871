// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named process lookup with unique and duplicate key modes.
//!
//! Registries never outlive their entries' processes: exit finalization
//! evicts every entry for a terminated process across every instance
//! before the `terminated` event is published.

mod pattern;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use arbor_core::{Clock, ProcessId};

use crate::behavior::Behavior;
use crate::error::RegistryError;
use crate::process::cell::ProcessCell;
use crate::process::ProcessRef;
use crate::table::ProcessTable;

/// How a registry treats repeated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// At most one entry per key.
    Unique,
    /// Many entries per key; the identical `(key, process)` pair at most
    /// once.
    Duplicate,
}

/// One registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub key: String,
    pub process: ProcessId,
    pub metadata: Option<Value>,
    pub registered_at_ms: u64,
}

struct RegistryInner {
    name: String,
    mode: KeyMode,
    clock: Arc<dyn Clock>,
    table: Arc<ProcessTable>,
    entries: Mutex<HashMap<String, Vec<RegistryEntry>>>,
}

/// Cheap-clone handle to one registry instance.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub(crate) fn new(
        name: impl Into<String>,
        mode: KeyMode,
        clock: Arc<dyn Clock>,
        table: Arc<ProcessTable>,
    ) -> Self {
        Registry {
            inner: Arc::new(RegistryInner {
                name: name.into(),
                mode,
                clock,
                table,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn mode(&self) -> KeyMode {
        self.inner.mode
    }

    /// Register `process` under `key`.
    ///
    /// Unique mode rejects a key that is already present; duplicate mode
    /// rejects only the identical `(key, process)` pair.
    pub fn register(
        &self,
        key: impl Into<String>,
        process: ProcessId,
        metadata: Option<Value>,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        let mut entries = self.inner.entries.lock();
        match self.inner.mode {
            KeyMode::Unique => {
                if entries.get(&key).is_some_and(|b| !b.is_empty()) {
                    return Err(RegistryError::AlreadyRegistered(key));
                }
            }
            KeyMode::Duplicate => {
                let taken = entries
                    .get(&key)
                    .is_some_and(|b| b.iter().any(|e| e.process == process));
                if taken {
                    return Err(RegistryError::DuplicateRegistration(key));
                }
            }
        }
        entries.entry(key.clone()).or_default().push(RegistryEntry {
            key,
            process,
            metadata,
            registered_at_ms: self.inner.clock.epoch_ms(),
        });
        Ok(())
    }

    /// Remove one `(key, process)` registration. Idempotent.
    pub fn unregister(&self, key: &str, process: ProcessId) -> bool {
        let mut entries = self.inner.entries.lock();
        let Some(bucket) = entries.get_mut(key) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|e| e.process != process);
        let removed = bucket.len() < before;
        if bucket.is_empty() {
            entries.remove(key);
        }
        removed
    }

    /// Unique-mode lookup of exactly one entry.
    pub fn lookup(&self, key: &str) -> Result<RegistryEntry, RegistryError> {
        if self.inner.mode == KeyMode::Duplicate {
            return Err(RegistryError::WrongMode);
        }
        let entries = self.inner.entries.lock();
        entries
            .get(key)
            .and_then(|bucket| bucket.first())
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(key.to_string()))
    }

    /// Every entry under `key`, in registration order.
    pub fn lookup_all(&self, key: &str) -> Vec<RegistryEntry> {
        let entries = self.inner.entries.lock();
        entries.get(key).cloned().unwrap_or_default()
    }

    /// Atomically replace the metadata of every entry under `key`.
    pub fn update_metadata(
        &self,
        key: &str,
        mut update: impl FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<usize, RegistryError> {
        let mut entries = self.inner.entries.lock();
        let Some(bucket) = entries.get_mut(key) else {
            return Err(RegistryError::NotRegistered(key.to_string()));
        };
        for entry in bucket.iter_mut() {
            entry.metadata = update(entry.metadata.take());
        }
        Ok(bucket.len())
    }

    /// Linear scan over every entry.
    pub fn select(&self, predicate: impl FnMut(&str, &RegistryEntry) -> bool) -> Vec<RegistryEntry> {
        let entries = self.inner.entries.lock();
        let predicate = RefCell::new(predicate);
        let mut matches: Vec<RegistryEntry> = entries
            .iter()
            .flat_map(|(key, bucket)| {
                bucket
                    .iter()
                    .filter(|e| (predicate.borrow_mut())(key, e))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.key.cmp(&b.key));
        matches
    }

    /// Glob over keys: `*` stops at `/`, `**` does not, `?` is exactly one
    /// character, everything else is literal.
    pub fn match_keys(&self, glob: &str) -> Result<Vec<RegistryEntry>, RegistryError> {
        let re = pattern::compile(glob).map_err(|e| RegistryError::Pattern(e.to_string()))?;
        Ok(self.select(|key, _| re.is_match(key)))
    }

    /// [`match_keys`](Registry::match_keys) with an extra entry predicate.
    pub fn match_keys_where(
        &self,
        glob: &str,
        mut predicate: impl FnMut(&RegistryEntry) -> bool,
    ) -> Result<Vec<RegistryEntry>, RegistryError> {
        let re = pattern::compile(glob).map_err(|e| RegistryError::Pattern(e.to_string()))?;
        Ok(self.select(|key, entry| re.is_match(key) && predicate(entry)))
    }

    /// Cast `msg` to every process registered under `key`. Entries whose
    /// behavior type differs from `B` are skipped. Returns the number of
    /// deliveries.
    pub fn dispatch<B: Behavior>(&self, key: &str, msg: B::Cast) -> usize
    where
        B::Cast: Clone,
    {
        let mut delivered = 0;
        for entry in self.lookup_all(key) {
            let Some(raw) = self.inner.table.lookup(entry.process) else {
                continue;
            };
            match raw.as_any_arc().downcast::<ProcessCell<B>>() {
                Ok(cell) => {
                    if ProcessRef::from_cell(cell).cast_silent(msg.clone()) {
                        delivered += 1;
                    }
                }
                Err(_) => {
                    tracing::debug!(
                        registry = %self.inner.name,
                        key,
                        process = %entry.process,
                        "dispatch skipped entry with mismatched behavior type"
                    );
                }
            }
        }
        delivered
    }

    /// Apply `apply` to every entry under `key`.
    pub fn dispatch_with(&self, key: &str, mut apply: impl FnMut(&RegistryEntry)) -> usize {
        let entries = self.lookup_all(key);
        for entry in &entries {
            apply(entry);
        }
        entries.len()
    }

    pub fn keys(&self) -> Vec<String> {
        let entries = self.inner.entries.lock();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry for a terminated process. Called from exit
    /// finalization.
    pub(crate) fn evict(&self, process: ProcessId) -> usize {
        let mut entries = self.inner.entries.lock();
        let mut removed = 0;
        entries.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|e| e.process != process);
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        removed
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.inner.name)
            .field("mode", &self.inner.mode)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
