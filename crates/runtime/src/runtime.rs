// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime facade: one handle tying the process table, link/monitor
//! tables, timers, registries, behavior catalog and lifecycle bus together.
//!
//! There is no process-global instance; hosts (and tests) construct their
//! own `Runtime`, and everything inside is scoped to it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use arbor_core::defaults::SHUTDOWN_TIMEOUT;
use arbor_core::{
    Clock, ExitReason, LifecycleEvent, LinkId, MonitorId, ProcessId, SystemClock, TimerId,
};

use crate::behavior::Behavior;
use crate::bus::{EventBus, EventStream};
use crate::catalog::BehaviorCatalog;
use crate::error::{RegistryError, SendError, SpawnError, SupervisorError};
use crate::link::LinkTable;
use crate::monitor::MonitorTable;
use crate::process::cell::{ProcessCell, RawProcess};
use crate::process::{spawn_process, ProcessRef, ProcessSnapshot, SpawnOptions};
use crate::registry::{KeyMode, Registry};
use crate::supervisor::{self, SupervisorRef, SupervisorSpec};
use crate::table::ProcessTable;
use crate::timer::TimerService;

/// Name of the registry every runtime carries by default.
pub const DEFAULT_REGISTRY: &str = "global";

struct Shared {
    clock: Arc<dyn Clock>,
    table: Arc<ProcessTable>,
    links: LinkTable,
    monitors: MonitorTable,
    timers: TimerService,
    bus: EventBus,
    catalog: BehaviorCatalog,
    default_registry: Registry,
    registries: Mutex<HashMap<String, Registry>>,
    supervisors: Mutex<Vec<SupervisorRef>>,
}

/// Cheap-clone handle to one runtime instance.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Construct with an injected clock; tests drive restart-intensity
    /// windows through a `FakeClock`.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        let table = Arc::new(ProcessTable::new());
        let default_registry = Registry::new(
            DEFAULT_REGISTRY,
            KeyMode::Unique,
            Arc::clone(&clock),
            Arc::clone(&table),
        );
        Runtime {
            shared: Arc::new(Shared {
                clock,
                table,
                links: LinkTable::new(),
                monitors: MonitorTable::new(),
                timers: TimerService::new(),
                bus: EventBus::new(),
                catalog: BehaviorCatalog::new(),
                default_registry,
                registries: Mutex::new(HashMap::new()),
                supervisors: Mutex::new(Vec::new()),
            }),
        }
    }

    // --- processes ---

    /// Start a process of behavior `B` with default options.
    pub async fn spawn<B: Behavior>(
        &self,
        config: B::Config,
    ) -> Result<ProcessRef<B>, SpawnError> {
        self.spawn_with(config, SpawnOptions::default()).await
    }

    /// Start a process with explicit options (trap-exit, init timeout,
    /// atomic registration, persistence).
    pub async fn spawn_with<B: Behavior>(
        &self,
        config: B::Config,
        opts: SpawnOptions<B>,
    ) -> Result<ProcessRef<B>, SpawnError> {
        spawn_process(self.clone(), config, opts).await
    }

    /// Typed lookup. `None` for unknown or terminated ids, or when `B`
    /// does not match the process's behavior.
    pub fn lookup<B: Behavior>(&self, id: ProcessId) -> Option<ProcessRef<B>> {
        let raw = self.shared.table.lookup(id)?;
        let cell = raw.as_any_arc().downcast::<ProcessCell<B>>().ok()?;
        Some(ProcessRef::from_cell(cell))
    }

    pub fn is_alive(&self, id: ProcessId) -> bool {
        self.shared.table.contains(id)
    }

    pub fn process_ids(&self) -> Vec<ProcessId> {
        self.shared.table.all_ids()
    }

    pub fn process_count(&self) -> usize {
        self.shared.table.len()
    }

    /// Observer surface: a consistent snapshot of one live process.
    pub fn snapshot(&self, id: ProcessId) -> Option<ProcessSnapshot> {
        self.shared.table.lookup(id).map(|raw| raw.snapshot())
    }

    pub fn snapshots(&self) -> Vec<ProcessSnapshot> {
        self.shared.table.all().iter().map(|raw| raw.snapshot()).collect()
    }

    /// Gracefully stop a process and wait for its termination to finish.
    pub async fn stop(&self, id: ProcessId, reason: ExitReason) {
        let Some(raw) = self.shared.table.lookup(id) else {
            return;
        };
        let done = raw.done_token();
        raw.request_stop(reason);
        done.cancelled().await;
    }

    /// Gracefully stop with a deadline; the process is force-terminated if
    /// the deadline passes. True when the stop stayed graceful.
    pub async fn stop_and_wait(
        &self,
        id: ProcessId,
        reason: ExitReason,
        timeout: Duration,
    ) -> bool {
        let Some(raw) = self.shared.table.lookup(id) else {
            return true;
        };
        self.stop_raw_and_wait(raw, reason, timeout).await
    }

    pub(crate) async fn stop_raw_and_wait(
        &self,
        raw: Arc<dyn RawProcess>,
        reason: ExitReason,
        timeout: Duration,
    ) -> bool {
        let done = raw.done_token();
        raw.request_stop(reason.clone());
        tokio::select! {
            _ = done.cancelled() => true,
            _ = tokio::time::sleep(timeout) => {
                raw.force_kill(reason);
                done.cancelled().await;
                false
            }
        }
    }

    /// Skip `terminate`, drop the mailbox (pending calls reject), abort an
    /// in-flight handler. False if the process was already gone.
    pub fn force_terminate(&self, id: ProcessId, reason: ExitReason) -> bool {
        match self.shared.table.lookup(id) {
            Some(raw) => raw.force_kill(reason),
            None => false,
        }
    }

    // --- lifecycle events ---

    pub fn subscribe(&self) -> EventStream {
        self.shared.bus.subscribe()
    }

    // --- links ---

    /// Link two live processes. Abnormal termination of either endpoint
    /// propagates to the other (or is trapped into an `Info::Exit`).
    pub fn link(&self, a: ProcessId, b: ProcessId) -> Result<LinkId, SendError> {
        if !self.shared.table.contains(a) || !self.shared.table.contains(b) {
            return Err(SendError::NotRunning);
        }
        Ok(self.shared.links.link(a, b))
    }

    pub fn unlink(&self, link: &LinkId) -> bool {
        self.shared.links.unlink(link)
    }

    // --- monitors ---

    /// Watch `watched` on behalf of `watcher`. If `watched` is not alive
    /// the monitor is not recorded and a `noproc` down notification is
    /// scheduled on a later task. A process in `stopping` still counts as
    /// alive: the monitor fires with the real termination reason.
    pub fn monitor(&self, watcher: ProcessId, watched: ProcessId) -> MonitorId {
        if self.shared.table.contains(watched) {
            return self.shared.monitors.insert(watcher, watched);
        }
        let monitor = MonitorId::new();
        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.shared.bus.publish(LifecycleEvent::ProcessDown {
                watcher,
                watched,
                monitor,
                reason: ExitReason::NoProc,
            });
            if let Some(raw) = runtime.shared.table.lookup(watcher) {
                raw.deliver_down(monitor, watched, ExitReason::NoProc);
            }
        });
        monitor
    }

    /// Remove a monitor. Idempotent.
    pub fn demonitor(&self, monitor: &MonitorId) -> bool {
        self.shared.monitors.remove(monitor)
    }

    // --- timers ---

    /// Deliver `msg` as a cast on `target` after `delay`. The fire is
    /// silently discarded if the target has terminated.
    pub fn send_after<B: Behavior>(
        &self,
        target: &ProcessRef<B>,
        msg: B::Cast,
        delay: Duration,
    ) -> TimerId {
        self.shared.timers.send_after(target, msg, delay)
    }

    /// Periodic variant of [`send_after`](Runtime::send_after); stops by
    /// itself once the target is gone.
    pub fn send_interval<B: Behavior>(
        &self,
        target: &ProcessRef<B>,
        msg: B::Cast,
        every: Duration,
    ) -> TimerId
    where
        B::Cast: Clone,
    {
        self.shared.timers.send_interval(target, msg, every)
    }

    /// True iff the timer was still pending and is now revoked.
    pub fn cancel_timer(&self, timer: &TimerId) -> bool {
        self.shared.timers.cancel(timer)
    }

    // --- registries ---

    /// The default (unique-mode) registry.
    pub fn registry(&self) -> Registry {
        self.shared.default_registry.clone()
    }

    /// Get or create an isolated named registry. Asking for an existing
    /// name with a different key mode is an error.
    pub fn named_registry(
        &self,
        name: impl Into<String>,
        mode: KeyMode,
    ) -> Result<Registry, RegistryError> {
        let name = name.into();
        if name == DEFAULT_REGISTRY {
            if mode == KeyMode::Unique {
                return Ok(self.registry());
            }
            return Err(RegistryError::WrongMode);
        }
        let mut registries = self.shared.registries.lock();
        if let Some(existing) = registries.get(&name) {
            if existing.mode() != mode {
                return Err(RegistryError::WrongMode);
            }
            return Ok(existing.clone());
        }
        let registry = Registry::new(
            name.clone(),
            mode,
            Arc::clone(&self.shared.clock),
            Arc::clone(&self.shared.table),
        );
        registries.insert(name, registry.clone());
        Ok(registry)
    }

    // --- supervisors ---

    pub async fn start_supervisor(
        &self,
        spec: SupervisorSpec,
    ) -> Result<SupervisorRef, SupervisorError> {
        supervisor::start(self.clone(), spec).await
    }

    // --- behavior catalog (remote-spawn hook) ---

    /// Register behavior `B` under `name` for config-driven spawning.
    pub fn register_behavior<B>(&self, name: impl Into<String>)
    where
        B: Behavior,
        B::Config: DeserializeOwned,
    {
        self.shared.catalog.register::<B>(name);
    }

    /// Instantiate a registered behavior from a JSON config.
    pub async fn spawn_by_name(
        &self,
        name: &str,
        config: Value,
    ) -> Result<ProcessId, SpawnError> {
        self.shared.catalog.spawn(self.clone(), name, config).await
    }

    pub fn behavior_names(&self) -> Vec<String> {
        self.shared.catalog.names()
    }

    // --- teardown ---

    /// Orderly host teardown: supervisors stop first (so nothing restarts
    /// behind the sweep), then every remaining process is stopped with the
    /// default shutdown timeout.
    pub async fn shutdown(&self) {
        let supervisors: Vec<SupervisorRef> = {
            let mut held = self.shared.supervisors.lock();
            held.drain(..).collect()
        };
        for supervisor in supervisors {
            let _ = supervisor.stop(ExitReason::Shutdown).await;
        }
        let stops = self.shared.table.all().into_iter().map(|raw| {
            let runtime = self.clone();
            async move {
                runtime
                    .stop_raw_and_wait(raw, ExitReason::Shutdown, SHUTDOWN_TIMEOUT)
                    .await;
            }
        });
        futures_util::future::join_all(stops).await;
    }

    // --- internal plumbing ---

    pub(crate) fn epoch_ms(&self) -> u64 {
        self.shared.clock.epoch_ms()
    }

    pub(crate) fn clock_now(&self) -> Instant {
        self.shared.clock.now()
    }

    pub(crate) fn insert_process(&self, proc: Arc<dyn RawProcess>) {
        self.shared.table.register(proc);
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        self.shared.bus.publish(event);
    }

    pub(crate) fn track_supervisor(&self, handle: SupervisorRef) {
        self.shared.supervisors.lock().push(handle);
    }

    pub(crate) fn untrack_supervisor(&self, id: ProcessId) {
        self.shared.supervisors.lock().retain(|s| s.id() != id);
    }

    /// Drop every registry entry for `id`, across the default and all
    /// named instances.
    pub(crate) fn evict_registrations(&self, id: ProcessId) {
        let removed = self.shared.default_registry.evict(id);
        let mut total = removed;
        for registry in self.shared.registries.lock().values() {
            total += registry.evict(id);
        }
        if total > 0 {
            tracing::debug!(process = %id, entries = total, "registry entries evicted");
        }
    }

    /// The ordered teardown run once per process, on its own task, after
    /// its status turned `stopped`:
    ///
    /// 1. remove from the table (lookups turn sentinel),
    /// 2. evict registry entries, take link edges and monitor records,
    ///    so nothing references the id once the `terminated` event is out,
    /// 3. publish `terminated`,
    /// 4. emit one down notification per taken monitor,
    /// 5. propagate abnormal exits across the taken link edges, trapping
    ///    or force-terminating each peer (cascades run on the peers' own
    ///    tasks; edges are already gone, so cycles cannot re-enter).
    pub(crate) fn finalize_exit(&self, id: ProcessId, reason: &ExitReason) {
        let shared = &self.shared;
        shared.table.remove(id);
        self.evict_registrations(id);
        let links = shared.links.take_edges_for(id);
        let downs = shared.monitors.take_watching(id);
        shared.monitors.drop_held_by(id);

        shared.bus.publish(LifecycleEvent::Terminated { id, reason: reason.clone() });

        for (monitor, watcher) in downs {
            shared.bus.publish(LifecycleEvent::ProcessDown {
                watcher,
                watched: id,
                monitor,
                reason: reason.clone(),
            });
            if let Some(raw) = shared.table.lookup(watcher) {
                raw.deliver_down(monitor, id, reason.clone());
            }
        }

        if reason.is_abnormal() {
            for (link, peer) in links {
                let Some(raw) = shared.table.lookup(peer) else {
                    continue;
                };
                if raw.trap_exit() {
                    raw.deliver_exit(id, reason.clone());
                } else {
                    tracing::debug!(
                        from = %id,
                        to = %peer,
                        link = %link,
                        reason = %reason,
                        "propagating abnormal exit across link"
                    );
                    raw.force_kill(reason.clone());
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn link_count(&self) -> usize {
        self.shared.links.len()
    }

    #[cfg(test)]
    pub(crate) fn monitor_count(&self) -> usize {
        self.shared.monitors.len()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("processes", &self.process_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
