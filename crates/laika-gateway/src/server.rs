// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use laika_config::model::GatewayConfig;
use laika_core::LaikaError;
use laika_engine::Engine;
use laika_launchpad::Launchpad;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::hub::WsHub;
use crate::ws;

/// In-flight request cap across all routes.
const MAX_IN_FLIGHT: usize = 256;

#[derive(Debug, Clone)]
pub struct HealthState {
    pub start_time: std::time::Instant,
}

/// Shared state for axum request handlers.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub engine: Arc<Engine>,
    pub launchpad: Launchpad,
    pub hub: WsHub,
    pub auth: AuthConfig,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(engine: Arc<Engine>, launchpad: Launchpad, hub: WsHub, auth: AuthConfig) -> Self {
        Self {
            engine,
            launchpad,
            hub,
            auth,
            health: HealthState {
                start_time: std::time::Instant::now(),
            },
        }
    }
}

/// Every route:
/// - GET /health (public)
/// - POST /v1/commands (auth)
/// - GET /v1/launchpad (auth)
/// - GET /v1/ws (auth during the handshake, not via middleware)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/commands", post(handlers::post_commands))
        .route("/v1/launchpad", get(handlers::get_launchpad))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/v1/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), LaikaError> {
    if !state.auth.is_configured() {
        tracing::warn!("gateway started without a bearer token or signing secret; /v1 rejects everything");
    }
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LaikaError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| LaikaError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use laika_core::Role;
    use laika_test_utils::TestHarness;
    use laika_test_utils::fixtures::{self, UserSpec};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const TOKEN: &str = "gw-token";

    async fn app() -> (TestHarness, Router) {
        let harness = TestHarness::builder().build().await.unwrap();
        harness
            .seed(|conn| {
                fixtures::organization(conn, "o1", "Acme")?;
                fixtures::organization(conn, "o2", "Other")?;
                fixtures::user(conn, UserSpec::member("a", "o1", "a@x.com").named("A", "Name"))?;
                fixtures::user(conn, UserSpec::member("b", "o1", "b@x.com").named("B", ""))?;
                fixtures::user(conn, UserSpec::member("z", "o2", "z@y.com").role(Role::OrganizationAdmin))?;
                fixtures::control(conn, "ctl", "o1", "Ctl-1")
            })
            .await
            .unwrap();
        let state = GatewayState::new(
            harness.engine.clone(),
            harness.launchpad.clone(),
            WsHub::new(),
            AuthConfig {
                bearer_token: Some(TOKEN.into()),
                signing_secret: None,
            },
        );
        (harness, router(state))
    }

    fn command(body: Value) -> Request<Body> {
        Request::post("/v1/commands")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn mention() -> Value {
        json!({
            "command": "comment.add",
            "owner_id": "b",
            "attachment": {"kind": "control", "id": "ctl"},
            "content": "Hi @(a@x.com)"
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let (_h, app) = app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn commands_require_the_bearer_token() {
        let (_h, app) = app().await;
        let request = Request::post("/v1/commands")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(mention().to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn comment_command_returns_its_alerts() {
        let (harness, app) = app().await;
        let response = app.oneshot(command(mention())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["result"], "comment");
        assert_eq!(body["alert_ids"].as_array().unwrap().len(), 1);

        let alerts = harness
            .alerts_of_type(laika_core::AlertType::ControlMention)
            .await
            .unwrap();
        assert_eq!(alerts[0].receiver_id, "a");
    }

    #[tokio::test]
    async fn engine_errors_map_to_statuses() {
        let (_h, app) = app().await;

        let foreign = json!({
            "command": "comment.add",
            "owner_id": "z",
            "attachment": {"kind": "control", "id": "ctl"},
            "content": "peek"
        });
        let response = app.clone().oneshot(command(foreign)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"], "permission_denied");

        let missing = json!({"command": "integration.remove", "connection_account_id": "nope"});
        let response = app.clone().oneshot(command(missing)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let empty = json!({
            "command": "comment.add",
            "owner_id": "b",
            "attachment": {"kind": "control", "id": "ctl"},
            "content": "   "
        });
        let response = app.oneshot(command(empty)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"], "service_exception");
    }

    #[tokio::test]
    async fn launchpad_lists_and_filters() {
        let (_h, app) = app().await;
        app.clone().oneshot(command(mention())).await.unwrap();

        let get = |uri: &str| {
            Request::get(uri)
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(get("/v1/launchpad?organization_id=o1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let entries = json_body(response).await["entries"].as_array().unwrap().clone();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e["url"] == "/controls/ctl?activeTab=Comments"));
        assert!(entries.iter().any(|e| e["kind"] == "mention" && e["mention"] == "A Name"));

        let response = app
            .oneshot(get("/v1/launchpad?organization_id=o1&q=nothing-like-this"))
            .await
            .unwrap();
        assert!(json_body(response).await["entries"].as_array().unwrap().is_empty());
    }
}
