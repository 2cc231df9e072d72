// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for BYOK vault integration tests.
//!
//! - [`TestVault`] - complete vault over a temp database
//! - [`ScriptedProbe`] - liveness probe with pre-configured status codes

pub mod harness;
pub mod probe;

pub use harness::{
    ROTATED_MASTER_SECRET, TEST_MASTER_SECRET, TestVault, TestVaultBuilder, master, openai_key,
};
pub use probe::ScriptedProbe;
