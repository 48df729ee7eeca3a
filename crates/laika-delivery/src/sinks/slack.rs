// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack direct messages through the organization's bot token.

use std::sync::Arc;

use async_trait::async_trait;
use laika_core::{LaikaError, SlackMessage, SlackSender};
use laika_http::{AccessSecret, HttpClient, IntegrationContext, RateLimitHeaders, VendorRequest};
use laika_storage::Database;
use laika_storage::queries::connections;
use laika_vault::CredentialVault;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

fn slack_error(message: impl Into<String>) -> LaikaError {
    LaikaError::delivery("slack", message)
}

/// Unwrap Slack's `{ok, error}` envelope.
fn ok_envelope(body: Value) -> Result<Value, LaikaError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        Ok(body)
    } else {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        Err(slack_error(error))
    }
}

pub struct SlackPoster {
    db: Database,
    credentials: Arc<CredentialVault>,
    http: HttpClient,
    api_base: String,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SlackPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackPoster")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl SlackPoster {
    pub fn new(
        db: Database,
        credentials: Arc<CredentialVault>,
        http: HttpClient,
        api_base: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            db,
            credentials,
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            cancel,
        }
    }

    async fn call(
        &self,
        ctx: &mut IntegrationContext,
        secret: &AccessSecret,
        request: VendorRequest,
    ) -> Result<Value, LaikaError> {
        let request = secret.authorize(request.rate_limit(RateLimitHeaders::retry_after_only()));
        let response = self.http.execute(ctx, &self.cancel, request).await?;
        ok_envelope(response.json()?)
    }

    async fn lookup_user(
        &self,
        ctx: &mut IntegrationContext,
        secret: &AccessSecret,
        email: &str,
    ) -> Result<String, LaikaError> {
        let request = VendorRequest::get(format!("{}/users.lookupByEmail", self.api_base))
            .query("email", email)
            .endpoint("users.lookupByEmail");
        let body = self.call(ctx, secret, request).await?;
        body.pointer("/user/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| slack_error("users.lookupByEmail returned no user id"))
    }
}

#[async_trait]
impl SlackSender for SlackPoster {
    #[instrument(skip(self, message))]
    async fn post(
        &self,
        organization_id: &str,
        receiver_email: &str,
        message: &SlackMessage,
    ) -> Result<(), LaikaError> {
        let org = organization_id.to_string();
        let account = self
            .db
            .call(move |conn| connections::active_slack_connection(conn, &org))
            .await?
            .ok_or_else(|| slack_error("organization has no active slack connection"))?;
        let secret = self.credentials.ensure_fresh(&account.id, &self.cancel).await?;

        let mut ctx = IntegrationContext::new("slack", account.id.clone());
        let channel = self.lookup_user(&mut ctx, &secret, receiver_email).await?;
        let request = VendorRequest::post_json(
            format!("{}/chat.postMessage", self.api_base),
            json!({
                "channel": channel,
                "text": message.text,
                "blocks": message.blocks,
            }),
        )
        .endpoint("chat.postMessage");
        self.call(&mut ctx, &secret, request).await?;
        debug!(network_calls = ctx.network_calls, "slack message posted");
        Ok(())
    }
}
