// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams of the vault.
//!
//! The store is async (`#[async_trait]`) so backends can be swapped behind
//! `Arc<dyn CredentialStore>`.

pub mod store;

pub use store::{CredentialStore, UpdateFn};
