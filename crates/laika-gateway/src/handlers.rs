// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles GET /health, POST /v1/commands, and GET /v1/launchpad.

use axum::{
    Json,
    extract::{Query, State},
};
use laika_engine::{CommandOutput, InboundCommand};
use laika_launchpad::LaunchpadEntry;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// GET /health, unauthenticated.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// POST /v1/commands
pub async fn post_commands(
    State(state): State<GatewayState>,
    Json(command): Json<InboundCommand>,
) -> Result<Json<CommandOutput>, ApiError> {
    let name = command.name();
    tracing::debug!(command = name, "command received");
    let output = state.engine.dispatch(command).await?;
    Ok(Json(output))
}

#[derive(Debug, Deserialize)]
pub struct LaunchpadQuery {
    pub organization_id: String,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LaunchpadResponse {
    pub entries: Vec<LaunchpadEntry>,
}

/// GET /v1/launchpad?organization_id=..&q=..
pub async fn get_launchpad(
    State(state): State<GatewayState>,
    Query(query): Query<LaunchpadQuery>,
) -> Result<Json<LaunchpadResponse>, ApiError> {
    let entries = match query.q.as_deref() {
        Some(q) => state.launchpad.search(&query.organization_id, q).await?,
        None => state.launchpad.index(&query.organization_id).await?,
    };
    Ok(Json(LaunchpadResponse { entries }))
}
