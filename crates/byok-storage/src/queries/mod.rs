// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database` and runs through
//! the single tokio-rusqlite connection.

pub mod audit;
pub mod chains;
pub mod credentials;
pub mod housekeeping;
pub mod usage;
