// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process handles and the spawn flow.

pub(crate) mod cell;
pub(crate) mod runner;

use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use arbor_core::defaults::{CALL_TIMEOUT, INIT_TIMEOUT};
use arbor_core::{ExitReason, LifecycleEvent, ProcessId, ProcessStatus};

use crate::behavior::{Behavior, Info, ProcessContext, Responder};
use crate::error::{CallError, SendError, SpawnError};
use crate::persist::{PersistSession, Persistence};
use crate::registry::Registry;
use crate::runtime::Runtime;

pub use cell::ProcessSnapshot;

use cell::{Envelope, ProcessCell, RawProcess};
use runner::Runner;

/// Typed handle to a running process.
///
/// Cheap to clone; holding one does not keep the process alive (the process
/// lives until stopped) but does keep its post-mortem status readable.
pub struct ProcessRef<B: Behavior> {
    cell: Arc<ProcessCell<B>>,
}

impl<B: Behavior> Clone for ProcessRef<B> {
    fn clone(&self) -> Self {
        ProcessRef { cell: Arc::clone(&self.cell) }
    }
}

impl<B: Behavior> std::fmt::Debug for ProcessRef<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(&format!("ProcessRef<{}>", type_name::<B>()))
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

impl<B: Behavior> PartialEq for ProcessRef<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<B: Behavior> Eq for ProcessRef<B> {}

impl<B: Behavior> ProcessRef<B> {
    pub(crate) fn from_cell(cell: Arc<ProcessCell<B>>) -> Self {
        ProcessRef { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<ProcessCell<B>> {
        &self.cell
    }

    pub fn id(&self) -> ProcessId {
        self.cell.id()
    }

    pub fn status(&self) -> ProcessStatus {
        self.cell.status()
    }

    pub fn is_alive(&self) -> bool {
        self.status().is_alive()
    }

    /// Read-only view of the process at this instant.
    pub fn snapshot(&self) -> ProcessSnapshot {
        self.cell.snapshot()
    }

    /// Request/response with the default call timeout.
    pub async fn call(&self, msg: B::Call) -> Result<B::Reply, CallError> {
        self.call_with_timeout(msg, CALL_TIMEOUT).await
    }

    /// Request/response. If `timeout` elapses first the pending reply is
    /// abandoned and `CallError::Timeout` returned; the handler keeps
    /// running to completion.
    pub async fn call_with_timeout(
        &self,
        msg: B::Call,
        timeout: Duration,
    ) -> Result<B::Reply, CallError> {
        if !self.cell.status().accepts_messages() {
            return Err(CallError::NotRunning);
        }
        let (tx, rx) = oneshot::channel();
        let responder = Responder::new(tx);
        if !self.cell.enqueue(Envelope::Call { msg, responder }) {
            return Err(CallError::NotRunning);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            // Reply slot dropped: the process stopped before answering.
            Ok(Err(_)) => Err(CallError::NotRunning),
            Err(_) => Err(CallError::Timeout(timeout)),
        }
    }

    /// Fire-and-forget enqueue. Errors if the process is not running.
    pub fn cast(&self, msg: B::Cast) -> Result<(), SendError> {
        if !self.cell.status().accepts_messages() {
            return Err(SendError::NotRunning);
        }
        if !self.cell.enqueue(Envelope::Cast(msg)) {
            return Err(SendError::NotRunning);
        }
        Ok(())
    }

    /// Push an out-of-band message, delivered through `handle_info`.
    pub fn send_info(&self, msg: B::Info) -> Result<(), SendError> {
        if !self.cell.status().accepts_messages() {
            return Err(SendError::NotRunning);
        }
        if !self.cell.enqueue(Envelope::Info(Info::User(msg))) {
            return Err(SendError::NotRunning);
        }
        Ok(())
    }

    /// Internal delivery path (timers, propagation): no status check, no
    /// error. Returns whether the message landed in the mailbox.
    pub(crate) fn cast_silent(&self, msg: B::Cast) -> bool {
        self.cell.enqueue(Envelope::Cast(msg))
    }

    /// Gracefully stop the process and wait until it has fully terminated
    /// (cleanup done, `terminated` event published).
    pub async fn stop(&self, reason: ExitReason) {
        self.cell.request_stop(reason);
        self.cell.done_token().cancelled().await;
    }
}

/// Registration performed atomically with a successful start.
pub struct RegisterAs {
    pub(crate) registry: Registry,
    pub(crate) key: String,
    pub(crate) metadata: Option<serde_json::Value>,
}

/// Options for [`Runtime::spawn_with`].
pub struct SpawnOptions<B: Behavior> {
    pub trap_exit: bool,
    pub init_timeout: Duration,
    pub register: Option<RegisterAs>,
    pub persistence: Option<Persistence<B>>,
}

impl<B: Behavior> Default for SpawnOptions<B> {
    fn default() -> Self {
        SpawnOptions {
            trap_exit: false,
            init_timeout: INIT_TIMEOUT,
            register: None,
            persistence: None,
        }
    }
}

impl<B: Behavior> SpawnOptions<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trap_exit(mut self, on: bool) -> Self {
        self.trap_exit = on;
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Register the process under `key` in `registry` before the `started`
    /// event is published. A registration conflict fails the whole spawn.
    pub fn register_as(mut self, registry: &Registry, key: impl Into<String>) -> Self {
        self.register = Some(RegisterAs {
            registry: registry.clone(),
            key: key.into(),
            metadata: None,
        });
        self
    }

    pub fn register_with_metadata(
        mut self,
        registry: &Registry,
        key: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        self.register = Some(RegisterAs {
            registry: registry.clone(),
            key: key.into(),
            metadata: Some(metadata),
        });
        self
    }

    pub fn persist(mut self, persistence: Persistence<B>) -> Self {
        self.persistence = Some(persistence);
        self
    }
}

/// Start a process: run `init` under its timeout, register, record in the
/// table, publish `started`, then hand the mailbox to the runner task.
///
/// A failed init records nothing: the spawner gets the error and no
/// lifecycle event is emitted.
pub(crate) async fn spawn_process<B: Behavior>(
    runtime: Runtime,
    config: B::Config,
    opts: SpawnOptions<B>,
) -> Result<ProcessRef<B>, SpawnError> {
    let SpawnOptions { trap_exit, init_timeout, register, persistence } = opts;

    let (tx, rx) = mpsc::unbounded_channel();
    let id = ProcessId::new();
    let cell = Arc::new(ProcessCell::new(id, runtime.epoch_ms(), tx, trap_exit));
    let proc = ProcessRef::from_cell(Arc::clone(&cell));
    let ctx = Arc::new(ProcessContext::new(runtime.clone(), proc.clone()));

    let session = persistence.map(PersistSession::new);
    let init_ctx = Arc::clone(&ctx);
    let init_fut = async {
        // A stored snapshot wins over init; decode failures fall through.
        if let Some(session) = &session {
            if let Some(state) = session.restore().await {
                return Ok(state);
            }
        }
        B::init(&init_ctx, config).await
    };
    let state = match tokio::time::timeout(init_timeout, init_fut).await {
        Ok(Ok(state)) => state,
        Ok(Err(error)) => return Err(SpawnError::InitFailed(error.0)),
        Err(_) => return Err(SpawnError::InitTimeout(init_timeout)),
    };

    if let Some(reg) = &register {
        reg.registry
            .register(reg.key.clone(), id, reg.metadata.clone())?;
    }

    cell.set_running();
    runtime.insert_process(Arc::clone(&cell) as Arc<dyn RawProcess>);
    runtime.publish(LifecycleEvent::Started { id });
    tracing::debug!(process = %id, behavior = type_name::<B>(), "process started");

    tokio::spawn(Runner::new(cell, ctx, rx, session).run(state));
    Ok(proc)
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
