// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack workspace members.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laika_core::{Cursor, LaikaError, ObjectType, Vendor, fields};
use laika_http::{RateLimitHeaders, VendorRequest};
use serde_json::Value;
use tracing::instrument;

use crate::connector::{Connector, ConnectorSession, Page, Record, Scope};
use crate::normalize::{RecordBuilder, str_at};
use crate::vendors::resolve_base;

const DEFAULT_BASE: &str = "https://slack.com/api";
const PAGE_LIMIT: &str = "200";
const SLACKBOT_ID: &str = "USLACKBOT";

/// `error` values meaning the token itself is unusable.
const AUTH_ERRORS: [&str; 5] = [
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "missing_scope",
];

#[derive(Debug, Clone, Default)]
pub struct SlackConnector {
    api_base: Option<String>,
}

impl SlackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(self, base: impl Into<String>) -> Self {
        Self {
            api_base: Some(base.into()),
        }
    }

    pub fn with_api_base_opt(self, base: Option<String>) -> Self {
        Self { api_base: base }
    }

    /// Call a Web API method and unwrap Slack's `ok` envelope.
    async fn call(
        &self,
        session: &mut ConnectorSession<'_>,
        api_method: &str,
        query: &[(&str, String)],
    ) -> Result<Value, LaikaError> {
        let base = resolve_base(session, self.api_base.as_deref(), || Ok(DEFAULT_BASE.to_string()))?;
        let mut request = VendorRequest::get(format!("{base}/{api_method}"))
            .endpoint(api_method)
            .rate_limit(RateLimitHeaders::retry_after_only());
        for (k, v) in query {
            request = request.query(*k, v.clone());
        }
        let body: Value = session.send(request).await?.json()?;
        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(body);
        }
        let error = str_at(&body, "/error").unwrap_or_else(|| "unknown_error".into());
        if AUTH_ERRORS.contains(&error.as_str()) {
            Err(LaikaError::ConfigurationError {
                message: format!("slack {api_method}: {error}"),
            })
        } else {
            Err(LaikaError::Value(format!("slack {api_method}: {error}")))
        }
    }

    fn is_person(member: &Value) -> bool {
        let flag = |k: &str| member.get(k).and_then(Value::as_bool).unwrap_or(false);
        !flag("is_bot") && !flag("deleted") && str_at(member, "/id").as_deref() != Some(SLACKBOT_ID)
    }

    fn member_record(member: &Value) -> Option<Record> {
        let id = str_at(member, "/id")?;
        Some(
            RecordBuilder::new(ObjectType::User, id)
                .opt(fields::FIRST_NAME, str_at(member, "/profile/first_name"))
                .opt(fields::LAST_NAME, str_at(member, "/profile/last_name"))
                .opt(fields::EMAIL, str_at(member, "/profile/email"))
                .opt("Display Name", str_at(member, "/profile/display_name"))
                .opt("Title", str_at(member, "/profile/title"))
                .opt("Is Admin", member.get("is_admin").and_then(Value::as_bool))
                .opt("Has 2FA", member.get("has_2fa").and_then(Value::as_bool))
                .opt("Timezone", str_at(member, "/tz"))
                .build(),
        )
    }
}

#[async_trait]
impl Connector for SlackConnector {
    fn vendor(&self) -> Vendor {
        Vendor::Slack
    }

    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
        self.call(session, "auth.test", &[]).await?;
        Ok(())
    }

    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
        let body = self.call(session, "auth.test", &[]).await?;
        let id = str_at(&body, "/team_id").unwrap_or_else(|| "workspace".into());
        let name = str_at(&body, "/team").unwrap_or_else(|| id.clone());
        Ok(vec![Scope::new(id, name)])
    }

    #[instrument(skip_all, fields(vendor = "slack", scope = %scope.id))]
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        scope: &Scope,
        _since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError> {
        let mut query = vec![("limit", PAGE_LIMIT.to_string())];
        if let Some(Cursor::Token(token)) = cursor {
            query.push(("cursor", token));
        }
        let body = self.call(session, "users.list", &query).await?;
        let records = body
            .get("members")
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| Self::is_person(m))
                    .filter_map(Self::member_record)
                    .collect()
            })
            .unwrap_or_default();
        let next = str_at(&body, "/response_metadata/next_cursor")
            .filter(|c| !c.is_empty())
            .map(Cursor::Token);
        Ok(Page::new(records, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laika_http::AccessSecret;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::vendors::test_support::Fixture;

    fn fixture() -> Fixture {
        Fixture::new("slack", AccessSecret::bearer(SecretString::from("xoxb-1")))
    }

    #[tokio::test]
    async fn members_skip_bots_and_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.list"))
            .and(query_param("cursor", "dXNlcjpVMDI="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": [
                    {"id": "U01", "profile": {"first_name": "Ada", "email": "ada@acme.com"}},
                    {"id": "B01", "is_bot": true, "profile": {}},
                    {"id": "U03", "deleted": true, "profile": {}},
                    {"id": "USLACKBOT", "profile": {}}
                ],
                "response_metadata": {"next_cursor": ""}
            })))
            .mount(&server)
            .await;

        let connector = SlackConnector::new().with_api_base(server.uri());
        let mut fx = fixture();
        let page = connector
            .pull(
                &mut fx.session(),
                &Scope::new("T1", "Acme"),
                None,
                Some(Cursor::Token("dXNlcjpVMDI=".into())),
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].data[fields::EMAIL], "ada@acme.com");
        assert_eq!(page.next, None);
    }

    #[tokio::test]
    async fn invalid_auth_is_configuration_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth.test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_auth"})),
            )
            .mount(&server)
            .await;
        let connector = SlackConnector::new().with_api_base(server.uri());
        let mut fx = fixture();
        let err = connector.test_credentials(&mut fx.session()).await.unwrap_err();
        assert!(matches!(err, LaikaError::ConfigurationError { .. }));
    }

    #[tokio::test]
    async fn workspace_is_the_only_scope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "team": "Acme", "team_id": "T1"
            })))
            .mount(&server)
            .await;
        let connector = SlackConnector::new().with_api_base(server.uri());
        let mut fx = fixture();
        let scopes = connector.discover_scope(&mut fx.session()).await.unwrap();
        assert_eq!(scopes, vec![Scope::new("T1", "Acme")]);
    }
}
