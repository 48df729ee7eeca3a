// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Okta directory users.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use laika_core::{AuthKind, Cursor, LaikaError, ObjectType, Vendor, fields};
use laika_http::{RateLimitHeaders, VendorRequest};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::instrument;

use crate::connector::{Connector, ConnectorSession, Page, Record, Scope};
use crate::normalize::{RecordBuilder, str_at};
use crate::vendors::{resolve_base, tenant_base};

const PAGE_LIMIT: &str = "200";

#[derive(Debug, Clone, Default)]
pub struct OktaConnector {
    api_base: Option<String>,
}

impl OktaConnector {
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

    fn base(&self, session: &ConnectorSession<'_>) -> Result<String, LaikaError> {
        resolve_base(session, self.api_base.as_deref(), || tenant_base(session, "okta.com"))
    }

    /// API tokens use Okta's `SSWS` scheme; OAuth tokens are plain bearer.
    fn request(session: &ConnectorSession<'_>, url: impl Into<String>, endpoint: &str) -> VendorRequest {
        let request = VendorRequest::get(url)
            .header("accept", "application/json")
            .endpoint(endpoint)
            .rate_limit(RateLimitHeaders::okta());
        match session.secret.auth_kind {
            AuthKind::ApiKey => request.auth_header(
                "authorization",
                SecretString::from(format!("SSWS {}", session.secret.secret.expose_secret())),
            ),
            _ => request,
        }
    }

    fn user_record(user: &Value) -> Option<Record> {
        let id = str_at(user, "/id")?;
        Some(
            RecordBuilder::new(ObjectType::User, id)
                .opt(fields::FIRST_NAME, str_at(user, "/profile/firstName"))
                .opt(fields::LAST_NAME, str_at(user, "/profile/lastName"))
                .opt(fields::EMAIL, str_at(user, "/profile/email"))
                .opt("Login", str_at(user, "/profile/login"))
                .opt("Title", str_at(user, "/profile/title"))
                .opt("Department", str_at(user, "/profile/department"))
                .opt("Status", str_at(user, "/status"))
                .opt("Created At", str_at(user, "/created"))
                .opt("Last Login", str_at(user, "/lastLogin"))
                .opt("Updated At", str_at(user, "/lastUpdated"))
                .build(),
        )
    }
}

#[async_trait]
impl Connector for OktaConnector {
    fn vendor(&self) -> Vendor {
        Vendor::Okta
    }

    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
        let base = self.base(session)?;
        let request = Self::request(session, format!("{base}/api/v1/users/me"), "users.me");
        session.send(request).await?;
        Ok(())
    }

    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
        let name = session
            .secret
            .subdomain
            .clone()
            .unwrap_or_else(|| "directory".to_string());
        Ok(vec![Scope::new("users", name)])
    }

    #[instrument(skip_all, fields(vendor = "okta"))]
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        _scope: &Scope,
        since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError> {
        let request = match cursor {
            Some(Cursor::Url(url)) => Self::request(session, url, "users.list"),
            _ => {
                let base = self.base(session)?;
                let mut request = Self::request(session, format!("{base}/api/v1/users"), "users.list")
                    .query("limit", PAGE_LIMIT);
                if let Some(since) = since {
                    let ts = since.to_rfc3339_opts(SecondsFormat::Millis, true);
                    request = request.query("filter", format!("lastUpdated gt \"{ts}\""));
                }
                request
            }
        };
        let response = session.send(request).await?;
        let users: Vec<Value> = response.json()?;
        let records = users.iter().filter_map(Self::user_record).collect();
        Ok(Page::new(records, response.next_link().map(Cursor::Url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laika_http::AccessSecret;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::vendors::test_support::Fixture;

    #[tokio::test]
    async fn api_tokens_use_ssws_and_follow_links() {
        let server = MockServer::start().await;
        let next = format!("{}/api/v1/users?after=00u2&limit=200", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/v1/users"))
            .and(query_param("limit", "200"))
            .and(header("authorization", "SSWS 00abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                    .set_body_json(json!([{
                        "id": "00u1", "status": "ACTIVE",
                        "profile": {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@acme.com"}
                    }])),
            )
            .mount(&server)
            .await;

        let connector = OktaConnector::new().with_api_base(server.uri());
        let secret = AccessSecret {
            auth_kind: AuthKind::ApiKey,
            secret: SecretString::from("00abc"),
            subdomain: Some("acme".into()),
        };
        let mut fx = Fixture::new("okta", secret);
        let scope = Scope::new("users", "acme");
        let page = connector.pull(&mut fx.session(), &scope, None, None).await.unwrap();

        assert_eq!(page.records.len(), 1);
        let data = &page.records[0].data;
        assert_eq!(data[fields::EMAIL], "ada@acme.com");
        assert_eq!(data[fields::FIRST_NAME], "Ada");
        assert_eq!(page.next, Some(Cursor::Url(next)));
    }

    #[tokio::test]
    async fn single_directory_scope() {
        let connector = OktaConnector::new();
        let mut fx = Fixture::new("okta", AccessSecret::bearer(SecretString::from("t")));
        let scopes = connector.discover_scope(&mut fx.session()).await.unwrap();
        assert_eq!(scopes, vec![Scope::new("users", "directory")]);
    }
}
