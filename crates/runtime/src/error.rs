// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the runtime surface

use std::time::Duration;

use thiserror::Error;

/// Error returned from `Behavior::init`.
///
/// Carries a message only; a failed init is reported to the spawner and
/// the process is never recorded.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InitError(pub String);

impl InitError {
    pub fn new(msg: impl Into<String>) -> Self {
        InitError(msg.into())
    }
}

impl From<&str> for InitError {
    fn from(msg: &str) -> Self {
        InitError(msg.to_string())
    }
}

impl From<String> for InitError {
    fn from(msg: String) -> Self {
        InitError(msg)
    }
}

/// Errors that can occur while starting a process
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("initialization failed: {0}")]
    InitFailed(String),
    #[error("initialization timed out after {0:?}")]
    InitTimeout(Duration),
    #[error("registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("unknown behavior: {0}")]
    UnknownBehavior(String),
    #[error("invalid behavior config: {0}")]
    BadConfig(String),
}

/// Errors returned to a caller awaiting a `call`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The caller-side timeout elapsed. The handler keeps running; only
    /// the reply slot is abandoned.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("process is not running")]
    NotRunning,
    /// The handler reported a failure; the process state is unchanged.
    #[error("handler failed: {0}")]
    Handler(String),
}

/// Error raised by user-facing `cast`/`send_info` on a dead process
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("process is not running")]
    NotRunning,
}

/// Errors raised by registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("key already registered: {0}")]
    AlreadyRegistered(String),
    #[error("duplicate registration for key: {0}")]
    DuplicateRegistration(String),
    #[error("key not registered: {0}")]
    NotRegistered(String),
    /// `lookup` on a duplicate-mode registry (use `lookup_all`), or a
    /// named registry requested with a mismatched key mode.
    #[error("operation does not match the registry key mode")]
    WrongMode,
    #[error("invalid key pattern: {0}")]
    Pattern(String),
}

/// Errors raised by the supervisor surface
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("child not found: {0}")]
    ChildNotFound(String),
    #[error("duplicate child id: {0}")]
    DuplicateChild(String),
    #[error("restart intensity exceeded")]
    MaxRestartsExceeded,
    #[error("supervisor is not running")]
    NotRunning,
    #[error("child start failed: {0}")]
    Start(#[from] SpawnError),
}

/// Error reported by a state adapter
#[derive(Debug, Clone, Error)]
#[error("state adapter error: {0}")]
pub struct AdapterError(pub String);

impl AdapterError {
    pub fn new(msg: impl Into<String>) -> Self {
        AdapterError(msg.into())
    }
}
