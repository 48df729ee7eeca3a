// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor connectors for the Laika compliance core.
//!
//! Every vendor implements [`Connector`]: a credential test, scope discovery,
//! and a paged `pull` that turns vendor JSON into normalized [`Record`]s.
//! [`PullStream`] drives a connector under a [`ChunkBudget`] so a poll tick
//! stops early and resumes from a persisted cursor.

pub mod connector;
pub mod normalize;
pub mod pull;
pub mod registry;
pub mod vendors;

pub use connector::{Connector, ConnectorSession, Page, Record, Scope};
pub use normalize::{RecordBuilder, parse_vendor_ts, reached_since, str_at};
pub use pull::{ChunkBudget, PullStream};
pub use registry::ConnectorRegistry;
pub use vendors::{
    CheckrConnector, DatadogConnector, GithubConnector, JiraConnector, LinearConnector,
    OktaConnector, SlackConnector,
};
