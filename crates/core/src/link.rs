// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Link identifier type.
//!
//! A link is an undirected edge between two processes. Abnormal exits
//! propagate across links; removal is by `LinkId`, so the same pair may
//! hold several independent links.

crate::define_id! {
    /// Unique identifier for one link edge.
    pub struct LinkId("lnk-");
}
