// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Laika integration tests.
//!
//! Provides recording sinks, row fixtures, and a harness that wires the full
//! pipeline over a temp database, for fast, deterministic tests without
//! external services.
//!
//! # Components
//!
//! - [`TestHarness`] - the whole stack with manual delivery draining
//! - [`RecordingSinks`] - websocket, e-mail, and Slack sinks that capture output
//! - [`fixtures`] - seeding helpers

pub mod fixtures;
pub mod harness;
pub mod recording;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use recording::{RecordingSinks, SlackPost};
