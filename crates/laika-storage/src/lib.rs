// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Laika core.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, typed queries for every domain
//! table, and the crash-safe queue that doubles as the delivery outbox.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
mod row;

#[cfg(test)]
pub(crate) mod test_support;

pub use database::Database;
pub use models::*;
