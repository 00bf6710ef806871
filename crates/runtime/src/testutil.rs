// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behaviors and helpers shared by the runtime unit tests.

use std::time::Duration;

use async_trait::async_trait;

use arbor_core::{ExitReason, ProcessId};

use crate::behavior::{Behavior, CallOutcome, HandlerOutcome, Info, ProcessContext};
use crate::error::InitError;

/// Simple counter used across the runtime tests.
pub(crate) struct Counter;

pub(crate) enum CounterCall {
    Get,
    Boom,
}

#[derive(Clone)]
pub(crate) enum CounterCast {
    Inc,
    Add(u64),
    Fail,
    Stop,
}

#[async_trait]
impl Behavior for Counter {
    type Config = u64;
    type State = u64;
    type Call = CounterCall;
    type Reply = u64;
    type Cast = CounterCast;
    type Info = u64;

    async fn init(_ctx: &ProcessContext<Self>, config: u64) -> Result<u64, InitError> {
        Ok(config)
    }

    async fn handle_call(
        _ctx: &ProcessContext<Self>,
        msg: CounterCall,
        state: u64,
    ) -> CallOutcome<Self> {
        match msg {
            CounterCall::Get => CallOutcome::Reply(state, state),
            CounterCall::Boom => CallOutcome::Fail("boom".into(), state),
        }
    }

    async fn handle_cast(
        _ctx: &ProcessContext<Self>,
        msg: CounterCast,
        state: u64,
    ) -> HandlerOutcome<Self> {
        match msg {
            CounterCast::Inc => HandlerOutcome::Continue(state + 1),
            CounterCast::Add(n) => HandlerOutcome::Continue(state + n),
            CounterCast::Fail => HandlerOutcome::Fail("cast failed".into(), state),
            CounterCast::Stop => HandlerOutcome::Stop(ExitReason::Normal, state),
        }
    }

    async fn handle_info(
        _ctx: &ProcessContext<Self>,
        msg: Info<u64>,
        state: u64,
    ) -> HandlerOutcome<Self> {
        match msg {
            Info::User(n) => HandlerOutcome::Continue(state + n),
            _ => HandlerOutcome::Continue(state),
        }
    }
}

/// Records every out-of-band message it observes; `call(())` returns the
/// log. Used for trap-exit and monitor delivery tests.
pub(crate) struct Probe;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProbeEvent {
    Exit { from: ProcessId, reason: ExitReason },
    Down { process: ProcessId, reason: ExitReason },
    User(String),
}

#[async_trait]
impl Behavior for Probe {
    type Config = ();
    type State = Vec<ProbeEvent>;
    type Call = ();
    type Reply = Vec<ProbeEvent>;
    type Cast = ();
    type Info = String;

    async fn init(_ctx: &ProcessContext<Self>, _config: ()) -> Result<Self::State, InitError> {
        Ok(Vec::new())
    }

    async fn handle_call(
        _ctx: &ProcessContext<Self>,
        _msg: (),
        state: Self::State,
    ) -> CallOutcome<Self> {
        CallOutcome::Reply(state.clone(), state)
    }

    async fn handle_info(
        _ctx: &ProcessContext<Self>,
        msg: Info<String>,
        mut state: Self::State,
    ) -> HandlerOutcome<Self> {
        match msg {
            Info::User(text) => state.push(ProbeEvent::User(text)),
            Info::Exit { from, reason } => state.push(ProbeEvent::Exit { from, reason }),
            Info::Down { process, reason, .. } => {
                state.push(ProbeEvent::Down { process, reason });
            }
        }
        HandlerOutcome::Continue(state)
    }
}

/// Poll `cond` until it holds. Panics after ~2s of (virtual) time.
pub(crate) async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
