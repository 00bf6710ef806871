// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default tuning parameters shared across the workspace.

use std::time::Duration;

/// Bound on `Behavior::init`; exceeding it fails the start.
pub const INIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Caller-side bound on `call`; the handler is unaffected when it trips.
pub const CALL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Grace period for a child to stop before it is force-terminated.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Restarts tolerated within [`RESTART_WITHIN`] before a supervisor gives up.
pub const MAX_RESTARTS: u32 = 3;

/// Window over which [`MAX_RESTARTS`] is counted.
pub const RESTART_WITHIN: Duration = Duration::from_millis(5000);
