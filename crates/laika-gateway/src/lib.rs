// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and websocket edge for the Laika core.
//!
//! - `POST /v1/commands` feeds [`InboundCommand`](laika_engine::InboundCommand)s
//!   to the engine.
//! - `GET /v1/launchpad` serves the comment catalogue.
//! - `GET /v1/ws?room=` streams alert frames published through [`WsHub`].
//! - `GET /health` reports liveness without auth.
//!
//! Everything under `/v1` fails closed when no credentials are configured.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod server;
pub mod ws;

pub use auth::{AuthConfig, sign_timestamp};
pub use error::{ApiError, status_for};
pub use hub::WsHub;
pub use server::{GatewayState, router, start_server};
