// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checkr candidates as background checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laika_core::{Cursor, LaikaError, ObjectType, Vendor, fields};
use laika_http::{RateLimitHeaders, VendorRequest};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::instrument;

use crate::connector::{Connector, ConnectorSession, Page, Record, Scope};
use crate::normalize::{RecordBuilder, reached_since, str_at};
use crate::vendors::resolve_base;

const DEFAULT_BASE: &str = "https://api.checkr.com";
const PER_PAGE: &str = "100";

#[derive(Debug, Clone, Default)]
pub struct CheckrConnector {
    api_base: Option<String>,
}

impl CheckrConnector {
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
        resolve_base(session, self.api_base.as_deref(), || Ok(DEFAULT_BASE.to_string()))
    }

    /// Checkr authenticates with the API key as the basic-auth username.
    fn request(session: &ConnectorSession<'_>, url: impl Into<String>, endpoint: &str) -> VendorRequest {
        VendorRequest::get(url)
            .basic(session.secret.secret.expose_secret(), SecretString::from(String::new()))
            .endpoint(endpoint)
            .rate_limit(RateLimitHeaders::retry_after_only())
    }

    fn candidate_record(candidate: &Value) -> Option<Record> {
        let id = str_at(candidate, "/id")?;
        let report = candidate
            .get("report_ids")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(
            RecordBuilder::new(ObjectType::BackgroundCheck, id)
                .opt(fields::FIRST_NAME, str_at(candidate, "/first_name"))
                .opt(fields::LAST_NAME, str_at(candidate, "/last_name"))
                .opt(fields::EMAIL, str_at(candidate, "/email"))
                .opt("Report", report)
                .opt("Created At", str_at(candidate, "/created_at"))
                .build(),
        )
    }
}

#[async_trait]
impl Connector for CheckrConnector {
    fn vendor(&self) -> Vendor {
        Vendor::Checkr
    }

    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
        let base = self.base(session)?;
        let request = Self::request(session, format!("{base}/v1/account"), "account");
        session.send(request).await?;
        Ok(())
    }

    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
        let base = self.base(session)?;
        let request = Self::request(session, format!("{base}/v1/account"), "account");
        let account: Value = session.send(request).await?.json()?;
        let id = str_at(&account, "/id").unwrap_or_else(|| "account".into());
        let name = str_at(&account, "/company/name")
            .or_else(|| str_at(&account, "/name"))
            .unwrap_or_else(|| id.clone());
        Ok(vec![Scope::new(id, name)])
    }

    #[instrument(skip_all, fields(vendor = "checkr"))]
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        _scope: &Scope,
        since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError> {
        let url = match cursor {
            Some(Cursor::Url(url)) => url,
            _ => format!("{}/v1/candidates?per_page={PER_PAGE}", self.base(session)?),
        };
        let request = Self::request(session, url, "candidates");
        let body: Value = session.send(request).await?.json()?;
        let candidates = body.get("data").and_then(Value::as_array).cloned().unwrap_or_default();

        let records = candidates.iter().filter_map(Self::candidate_record).collect();
        let older_seen = reached_since(
            since,
            candidates.iter().map(|c| c.get("created_at").and_then(Value::as_str)),
        );
        let next = if older_seen {
            None
        } else {
            str_at(&body, "/next_href").map(Cursor::Url)
        };
        Ok(Page::new(records, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laika_core::AuthKind;
    use laika_http::AccessSecret;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::vendors::test_support::Fixture;

    #[tokio::test]
    async fn candidates_become_background_checks() {
        let server = MockServer::start().await;
        let next = format!("{}/v1/candidates?page=2&per_page=100", server.uri());
        // base64("sk_test:")
        Mock::given(method("GET"))
            .and(path("/v1/candidates"))
            .and(header("authorization", "Basic c2tfdGVzdDo="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "cand1", "first_name": "Ada", "last_name": "Lovelace",
                          "email": "ada@acme.com", "report_ids": ["rep1"],
                          "created_at": "2026-03-01T00:00:00Z"}],
                "next_href": next
            })))
            .mount(&server)
            .await;

        let connector = CheckrConnector::new().with_api_base(server.uri());
        let secret = AccessSecret {
            auth_kind: AuthKind::ApiKey,
            secret: SecretString::from("sk_test"),
            subdomain: None,
        };
        let mut fx = Fixture::new("checkr", secret);
        let page = connector
            .pull(&mut fx.session(), &Scope::new("acc", "Acme"), None, None)
            .await
            .unwrap();
        let record = &page.records[0];
        assert_eq!(record.object_type, ObjectType::BackgroundCheck);
        assert_eq!(record.data[fields::LAST_NAME], "Lovelace");
        assert_eq!(record.data["Report"], "rep1");
        assert_eq!(page.next, Some(Cursor::Url(next)));
    }
}
