// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision: child specs, restart strategies, intensity throttling and
//! ordered shutdown.
//!
//! A supervisor is a plain task subscribed to the lifecycle bus: it owns an
//! ordered child table, reacts to `terminated` events for its children and
//! serves a small command channel for the dynamic API. Stops it initiates
//! itself are tracked as expected exits so they never enter the restart
//! path.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

use arbor_core::defaults::{MAX_RESTARTS, RESTART_WITHIN, SHUTDOWN_TIMEOUT};
use arbor_core::{ExitReason, LifecycleEvent, ProcessId};

use crate::behavior::Behavior;
use crate::bus::EventStream;
use crate::error::{SpawnError, SupervisorError};
use crate::runtime::Runtime;

/// How a child termination affects its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Restart only the failed child.
    #[default]
    OneForOne,
    /// Stop every other child, then restart all in start order.
    OneForAll,
    /// Stop the children started after the failed one, then restart from
    /// the failed one onward.
    RestForOne,
}

/// Whether a terminated child comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Restart {
    /// Restart on any termination reason.
    #[default]
    Permanent,
    /// Restart only on abnormal termination.
    Transient,
    /// Never restart; the child is removed on termination.
    Temporary,
}

impl Restart {
    pub(crate) fn should_restart(&self, reason: &ExitReason) -> bool {
        match self {
            Restart::Permanent => true,
            Restart::Transient => reason.is_abnormal(),
            Restart::Temporary => false,
        }
    }
}

/// Restart budget: more than `max_restarts` within `within` makes the
/// supervisor give up.
#[derive(Debug, Clone, Copy)]
pub struct RestartIntensity {
    pub max_restarts: u32,
    pub within: Duration,
}

impl Default for RestartIntensity {
    fn default() -> Self {
        RestartIntensity { max_restarts: MAX_RESTARTS, within: RESTART_WITHIN }
    }
}

type StartFn = Arc<dyn Fn(Runtime) -> BoxFuture<'static, Result<ProcessId, SpawnError>> + Send + Sync>;

/// Declaration of one supervised child.
#[derive(Clone)]
pub struct ChildSpec {
    pub id: String,
    start: StartFn,
    pub restart: Restart,
    pub shutdown_timeout: Duration,
}

impl ChildSpec {
    /// A child started by an arbitrary async start function.
    pub fn new<F, Fut>(id: impl Into<String>, start: F) -> Self
    where
        F: Fn(Runtime) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ProcessId, SpawnError>> + Send + 'static,
    {
        ChildSpec {
            id: id.into(),
            start: Arc::new(move |runtime| Box::pin(start(runtime))),
            restart: Restart::default(),
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    /// A child that is one process of behavior `B`, spawned fresh from the
    /// same config on every (re)start.
    pub fn worker<B>(id: impl Into<String>, config: B::Config) -> Self
    where
        B: Behavior,
        B::Config: Clone + Sync,
    {
        Self::new(id, move |runtime: Runtime| {
            let config = config.clone();
            async move { runtime.spawn::<B>(config).await.map(|proc| proc.id()) }
        })
    }

    pub fn with_restart(mut self, restart: Restart) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    fn launch(&self, runtime: Runtime) -> BoxFuture<'static, Result<ProcessId, SpawnError>> {
        (self.start)(runtime)
    }
}

impl std::fmt::Debug for ChildSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildSpec")
            .field("id", &self.id)
            .field("restart", &self.restart)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

/// Configuration accepted by [`Runtime::start_supervisor`].
#[derive(Default)]
pub struct SupervisorSpec {
    pub strategy: Strategy,
    pub children: Vec<ChildSpec>,
    pub intensity: RestartIntensity,
    /// Registers the supervisor under this key in the default registry.
    pub name: Option<String>,
}

impl SupervisorSpec {
    pub fn new(strategy: Strategy) -> Self {
        SupervisorSpec { strategy, ..Default::default() }
    }

    pub fn child(mut self, spec: ChildSpec) -> Self {
        self.children.push(spec);
        self
    }

    pub fn intensity(mut self, intensity: RestartIntensity) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Introspection row returned by [`SupervisorRef::which_children`].
#[derive(Debug, Clone)]
pub struct ChildInfo {
    pub id: String,
    pub process: Option<ProcessId>,
    pub restart: Restart,
    pub restart_count: u32,
}

enum Command {
    StartChild(ChildSpec, oneshot::Sender<Result<ProcessId, SupervisorError>>),
    TerminateChild(String, oneshot::Sender<Result<(), SupervisorError>>),
    RestartChild(String, oneshot::Sender<Result<ProcessId, SupervisorError>>),
    WhichChildren(oneshot::Sender<Vec<ChildInfo>>),
    Stop(ExitReason, oneshot::Sender<()>),
}

/// Handle to a running supervisor. Cheap to clone. Once the supervisor has
/// terminated (stopped, or gave up on restart intensity), every operation
/// returns [`SupervisorError::NotRunning`].
#[derive(Clone)]
pub struct SupervisorRef {
    id: ProcessId,
    tx: mpsc::UnboundedSender<Command>,
}

impl SupervisorRef {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Append and start a new child.
    pub async fn start_child(&self, spec: ChildSpec) -> Result<ProcessId, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::StartChild(spec, tx))?;
        rx.await.map_err(|_| SupervisorError::NotRunning)?
    }

    /// Stop the named child and remove it from the table.
    pub async fn terminate_child(&self, child_id: &str) -> Result<(), SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::TerminateChild(child_id.to_string(), tx))?;
        rx.await.map_err(|_| SupervisorError::NotRunning)?
    }

    /// Stop and restart the named child, incrementing its restart count.
    pub async fn restart_child(&self, child_id: &str) -> Result<ProcessId, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RestartChild(child_id.to_string(), tx))?;
        rx.await.map_err(|_| SupervisorError::NotRunning)?
    }

    pub async fn which_children(&self) -> Result<Vec<ChildInfo>, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::WhichChildren(tx))?;
        rx.await.map_err(|_| SupervisorError::NotRunning)
    }

    pub async fn count_children(&self) -> Result<usize, SupervisorError> {
        Ok(self.which_children().await?.len())
    }

    /// Stop the supervisor: children go down in reverse start order, each
    /// granted its shutdown timeout before being force-terminated.
    pub async fn stop(&self, reason: ExitReason) -> Result<(), SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop(reason, tx))?;
        rx.await.map_err(|_| SupervisorError::NotRunning)
    }

    fn send(&self, command: Command) -> Result<(), SupervisorError> {
        self.tx.send(command).map_err(|_| SupervisorError::NotRunning)
    }
}

impl std::fmt::Debug for SupervisorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorRef")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .finish()
    }
}

struct ChildRecord {
    spec: ChildSpec,
    process: Option<ProcessId>,
    restart_count: u32,
    /// Recent restart instants, bounded to the intensity budget.
    restart_times: VecDeque<Instant>,
}

impl ChildRecord {
    fn new(spec: ChildSpec, process: ProcessId) -> Self {
        ChildRecord {
            spec,
            process: Some(process),
            restart_count: 0,
            restart_times: VecDeque::new(),
        }
    }

    fn note_restart(&mut self, now: Instant, cap: usize) {
        self.restart_times.push_back(now);
        while self.restart_times.len() > cap {
            self.restart_times.pop_front();
        }
    }

    fn info(&self) -> ChildInfo {
        ChildInfo {
            id: self.spec.id.clone(),
            process: self.process,
            restart: self.spec.restart,
            restart_count: self.restart_count,
        }
    }
}

/// Start children in declared order (rolling back on failure), then hand
/// the table to the supervisor task.
pub(crate) async fn start(
    runtime: Runtime,
    spec: SupervisorSpec,
) -> Result<SupervisorRef, SupervisorError> {
    let SupervisorSpec { strategy, children, intensity, name } = spec;

    let mut seen = HashSet::new();
    for child in &children {
        if !seen.insert(child.id.clone()) {
            return Err(SupervisorError::DuplicateChild(child.id.clone()));
        }
    }

    let id = ProcessId::new();
    // Subscribe before the first child starts so no termination is missed.
    let events = runtime.subscribe();

    let mut records: Vec<ChildRecord> = Vec::with_capacity(children.len());
    for child in children {
        match child.launch(runtime.clone()).await {
            Ok(pid) => records.push(ChildRecord::new(child, pid)),
            Err(error) => {
                tracing::warn!(
                    supervisor = %id,
                    child = %child.id,
                    error = %error,
                    "child failed to start; rolling back"
                );
                rollback(&runtime, &mut records).await;
                return Err(SupervisorError::Start(error));
            }
        }
    }

    if let Some(name) = &name {
        if let Err(error) = runtime.registry().register(name.clone(), id, None) {
            rollback(&runtime, &mut records).await;
            return Err(SupervisorError::Start(SpawnError::Registry(error)));
        }
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let task = SupervisorTask {
        runtime: runtime.clone(),
        id,
        strategy,
        intensity,
        children: records,
        restarts: VecDeque::new(),
        expected: HashSet::new(),
        events,
        commands: rx,
        _keepalive: tx.clone(),
    };
    tokio::spawn(task.run());

    let handle = SupervisorRef { id, tx };
    runtime.track_supervisor(handle.clone());
    tracing::info!(supervisor = %id, strategy = ?strategy, "supervisor started");
    Ok(handle)
}

async fn rollback(runtime: &Runtime, records: &mut Vec<ChildRecord>) {
    for record in records.iter_mut().rev() {
        if let Some(pid) = record.process.take() {
            runtime
                .stop_and_wait(pid, ExitReason::Shutdown, record.spec.shutdown_timeout)
                .await;
        }
    }
    records.clear();
}

struct SupervisorTask {
    runtime: Runtime,
    id: ProcessId,
    strategy: Strategy,
    intensity: RestartIntensity,
    children: Vec<ChildRecord>,
    /// Supervisor-wide restart instants within the intensity window.
    restarts: VecDeque<Instant>,
    /// Processes the supervisor is stopping on purpose; their terminations
    /// must not enter the restart path.
    expected: HashSet<ProcessId>,
    events: EventStream,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Keeps the command channel open while the task lives, so dropping
    /// every `SupervisorRef` does not kill a healthy supervisor.
    _keepalive: mpsc::UnboundedSender<Command>,
}

impl SupervisorTask {
    async fn run(mut self) {
        enum Wake {
            Command(Option<Command>),
            Event(Option<LifecycleEvent>),
        }

        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                event = self.events.recv() => Wake::Event(event),
            };
            match wake {
                Wake::Command(Some(command)) => {
                    if self.handle_command(command).await {
                        return;
                    }
                }
                // Unreachable while the keepalive sender lives.
                Wake::Command(None) => {}
                Wake::Event(Some(LifecycleEvent::Terminated { id, reason })) => {
                    if self.on_child_exit(id, reason).await {
                        return;
                    }
                }
                Wake::Event(Some(_)) => {}
                // Bus gone: the runtime was dropped wholesale.
                Wake::Event(None) => return,
            }
        }
    }

    /// Returns true when the supervisor stopped.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::StartChild(spec, reply) => {
                let result = self.start_dynamic_child(spec).await;
                let _ = reply.send(result);
                false
            }
            Command::TerminateChild(child_id, reply) => {
                let result = match self.index_of(&child_id) {
                    Some(idx) => {
                        self.stop_child_process(idx).await;
                        self.children.remove(idx);
                        Ok(())
                    }
                    None => Err(SupervisorError::ChildNotFound(child_id)),
                };
                let _ = reply.send(result);
                false
            }
            Command::RestartChild(child_id, reply) => {
                let result = match self.index_of(&child_id) {
                    Some(idx) => {
                        self.stop_child_process(idx).await;
                        match self.children[idx].spec.launch(self.runtime.clone()).await {
                            Ok(pid) => {
                                self.note_child_restarted(idx, pid);
                                Ok(pid)
                            }
                            Err(error) => Err(SupervisorError::Start(error)),
                        }
                    }
                    None => Err(SupervisorError::ChildNotFound(child_id)),
                };
                let _ = reply.send(result);
                false
            }
            Command::WhichChildren(reply) => {
                let _ = reply.send(self.children.iter().map(ChildRecord::info).collect());
                false
            }
            Command::Stop(reason, reply) => {
                tracing::info!(supervisor = %self.id, reason = %reason, "supervisor stopping");
                self.shutdown_children().await;
                self.finish(reason);
                let _ = reply.send(());
                true
            }
        }
    }

    async fn start_dynamic_child(
        &mut self,
        spec: ChildSpec,
    ) -> Result<ProcessId, SupervisorError> {
        if self.index_of(&spec.id).is_some() {
            return Err(SupervisorError::DuplicateChild(spec.id));
        }
        let pid = spec.launch(self.runtime.clone()).await?;
        self.children.push(ChildRecord::new(spec, pid));
        Ok(pid)
    }

    /// Returns true when the supervisor gave up and terminated itself.
    async fn on_child_exit(&mut self, pid: ProcessId, reason: ExitReason) -> bool {
        if self.expected.remove(&pid) {
            return false;
        }
        let Some(idx) = self.children.iter().position(|c| c.process == Some(pid)) else {
            return false;
        };
        self.children[idx].process = None;
        let child_id = self.children[idx].spec.id.clone();

        if !self.children[idx].spec.restart.should_restart(&reason) {
            tracing::info!(
                supervisor = %self.id,
                child = %child_id,
                reason = %reason,
                "child terminated without restart"
            );
            self.children.remove(idx);
            return false;
        }

        tracing::warn!(
            supervisor = %self.id,
            child = %child_id,
            reason = %reason,
            strategy = ?self.strategy,
            "child terminated; applying restart strategy"
        );

        // One intensity timestamp per termination event, recorded before
        // any restart is performed.
        if self.note_restart_and_check() {
            self.give_up().await;
            return true;
        }

        match self.strategy {
            Strategy::OneForOne => self.restart_slot(idx).await,
            Strategy::OneForAll => {
                self.stop_tail_reverse(0, Some(idx)).await;
                self.restart_range(0).await
            }
            Strategy::RestForOne => {
                self.stop_tail_reverse(idx + 1, None).await;
                self.restart_range(idx).await
            }
        }
    }

    /// Restart the child at `idx`, retrying (against the intensity budget)
    /// if its start function fails. Returns true when the budget ran out.
    async fn restart_slot(&mut self, idx: usize) -> bool {
        loop {
            match self.children[idx].spec.launch(self.runtime.clone()).await {
                Ok(pid) => {
                    self.note_child_restarted(idx, pid);
                    return false;
                }
                Err(error) => {
                    tracing::warn!(
                        supervisor = %self.id,
                        child = %self.children[idx].spec.id,
                        error = %error,
                        "child restart failed; retrying"
                    );
                    if self.note_restart_and_check() {
                        self.give_up().await;
                        return true;
                    }
                }
            }
        }
    }

    /// Restart every child from `from` onward, in start order.
    async fn restart_range(&mut self, from: usize) -> bool {
        for idx in from..self.children.len() {
            if self.children[idx].process.is_some() {
                continue;
            }
            if self.restart_slot(idx).await {
                return true;
            }
        }
        false
    }

    /// Stop the live children at `from..`, in reverse start order. `skip`
    /// marks the failed slot, which is already dead.
    async fn stop_tail_reverse(&mut self, from: usize, skip: Option<usize>) {
        for idx in (from..self.children.len()).rev() {
            if Some(idx) == skip {
                continue;
            }
            self.stop_child_process(idx).await;
        }
    }

    /// Gracefully stop one child's process within its shutdown timeout,
    /// then force. The termination is marked expected.
    async fn stop_child_process(&mut self, idx: usize) {
        let timeout = self.children[idx].spec.shutdown_timeout;
        let Some(pid) = self.children[idx].process.take() else {
            return;
        };
        self.expected.insert(pid);
        let graceful = self
            .runtime
            .stop_and_wait(pid, ExitReason::Shutdown, timeout)
            .await;
        if !graceful {
            tracing::warn!(
                supervisor = %self.id,
                child = %self.children[idx].spec.id,
                process = %pid,
                "child exceeded shutdown timeout; force terminated"
            );
        }
    }

    fn note_child_restarted(&mut self, idx: usize, pid: ProcessId) {
        let now = self.runtime.clock_now();
        let cap = self.intensity.max_restarts as usize + 1;
        let record = &mut self.children[idx];
        record.process = Some(pid);
        record.restart_count += 1;
        record.note_restart(now, cap);
        self.runtime.publish(LifecycleEvent::ChildRestarted {
            supervisor: self.id,
            child_id: record.spec.id.clone(),
            attempt: record.restart_count,
        });
    }

    /// Record a restart timestamp; true when the intensity budget is
    /// exceeded.
    fn note_restart_and_check(&mut self) -> bool {
        let now = self.runtime.clock_now();
        while let Some(front) = self.restarts.front() {
            if now.duration_since(*front) > self.intensity.within {
                self.restarts.pop_front();
            } else {
                break;
            }
        }
        self.restarts.push_back(now);
        self.restarts.len() > self.intensity.max_restarts as usize
    }

    async fn give_up(&mut self) {
        tracing::error!(
            supervisor = %self.id,
            max_restarts = self.intensity.max_restarts,
            within_ms = self.intensity.within.as_millis() as u64,
            "restart intensity exceeded; supervisor giving up"
        );
        self.shutdown_children().await;
        self.finish(ExitReason::error(
            SupervisorError::MaxRestartsExceeded.to_string(),
        ));
    }

    /// Reverse start order, honoring each child's shutdown timeout.
    async fn shutdown_children(&mut self) {
        for idx in (0..self.children.len()).rev() {
            self.stop_child_process(idx).await;
        }
        self.children.clear();
    }

    fn finish(&self, reason: ExitReason) {
        self.runtime.untrack_supervisor(self.id);
        self.runtime.evict_registrations(self.id);
        self.runtime
            .publish(LifecycleEvent::Terminated { id: self.id, reason });
    }

    fn index_of(&self, child_id: &str) -> Option<usize> {
        self.children.iter().position(|c| c.spec.id == child_id)
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
