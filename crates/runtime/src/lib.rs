// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! arbor-runtime: in-process actor runtime with supervision trees.
//!
//! Long-lived stateful processes communicate only by message passing: one
//! FIFO mailbox per process, at most one in-flight handler, links and
//! monitors for failure signaling, named registries with automatic
//! cleanup, scheduled deliveries, and supervisors that restart children
//! according to declared strategies.

pub mod behavior;
mod bus;
mod catalog;
pub mod error;
mod link;
mod monitor;
pub mod persist;
pub mod process;
pub mod registry;
mod runtime;
pub mod supervisor;
mod table;
#[cfg(test)]
pub(crate) mod testutil;
mod timer;

// Behaviors are written as #[async_trait] impls; re-exported so downstream
// crates need no direct dependency.
pub use async_trait::async_trait;

pub use behavior::{Behavior, CallOutcome, HandlerOutcome, Info, ProcessContext, Responder};
pub use bus::EventStream;
pub use error::{
    AdapterError, CallError, InitError, RegistryError, SendError, SpawnError, SupervisorError,
};
pub use persist::{ErrorHook, MemoryAdapter, Persistence, StateAdapter};
pub use process::{ProcessRef, ProcessSnapshot, SpawnOptions};
pub use registry::{KeyMode, Registry, RegistryEntry};
pub use runtime::{Runtime, DEFAULT_REGISTRY};
pub use supervisor::{
    ChildInfo, ChildSpec, Restart, RestartIntensity, Strategy, SupervisorRef, SupervisorSpec,
};

// Domain vocabulary, re-exported for one-stop imports.
pub use arbor_core::{
    Clock, ExitReason, FakeClock, LifecycleEvent, LinkId, MonitorId, ProcessId, ProcessStatus,
    SystemClock, TimerId,
};
