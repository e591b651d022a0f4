// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session lifecycle
//!
//! A session is created lazily on the first send and reused afterwards. At
//! most one session exists per editing surface.

pub mod controller;

pub use controller::SessionController;
