// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Artifact versioning
//!
//! Tracks every snapshot of the shared document along with who produced it.

pub mod store;

pub use store::{ArtifactVersion, ArtifactVersionStore, VersionId, VersionSelection};
