// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifier type for tracking scheduled deliveries.

crate::define_id! {
    /// Unique identifier for a scheduled delivery.
    ///
    /// Returned by `send_after`/`send_interval`; pass it to `cancel_timer`
    /// to revoke a delivery that has not fired yet.
    pub struct TimerId("tmr-");
}
