// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the BYOK credential vault.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the [`SqliteCredentialStore`]
//! implementation of [`byok_core::CredentialStore`].

pub mod database;
pub mod migrations;
pub mod queries;
pub mod rows;
pub mod store;

pub use database::Database;
pub use store::SqliteCredentialStore;
