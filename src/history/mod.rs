// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session history
//!
//! Lists sessions stored on the server and rebuilds an editing context from
//! a session's stored messages so it can be continued.

pub mod restore;
pub mod store;

pub use restore::restore_context;
pub use store::SessionHistory;
