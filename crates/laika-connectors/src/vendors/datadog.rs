// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datadog monitors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laika_core::{Cursor, LaikaError, ObjectType, Vendor};
use laika_http::{RateLimitHeaders, VendorRequest};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::instrument;

use crate::connector::{Connector, ConnectorSession, Page, Record, Scope};
use crate::normalize::{RecordBuilder, str_at};
use crate::vendors::resolve_base;

const DEFAULT_BASE: &str = "https://api.datadoghq.com";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct DatadogConnector {
    api_base: Option<String>,
}

impl DatadogConnector {
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
        resolve_base(session, self.api_base.as_deref(), || {
            Ok(match session.setting_str("site") {
                Some(site) => format!("https://api.{site}"),
                None => DEFAULT_BASE.to_string(),
            })
        })
    }

    /// The stored secret is `api_key:application_key`.
    fn request(
        session: &ConnectorSession<'_>,
        url: impl Into<String>,
        endpoint: &str,
    ) -> Result<VendorRequest, LaikaError> {
        let raw = session.secret.secret.expose_secret();
        let (api_key, app_key) = raw.split_once(':').ok_or_else(|| LaikaError::BadCredentials {
            message: "datadog secret must be api_key:application_key".into(),
        })?;
        Ok(VendorRequest::get(url)
            .auth_header("DD-API-KEY", SecretString::from(api_key.to_string()))
            .secret_header("DD-APPLICATION-KEY", SecretString::from(app_key.to_string()))
            .endpoint(endpoint)
            .rate_limit(RateLimitHeaders::datadog()))
    }

    fn monitor_record(monitor: &Value) -> Option<Record> {
        let id = str_at(monitor, "/id")?;
        let tags = monitor
            .get("tags")
            .and_then(Value::as_array)
            .map(|t| t.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(", "));
        Some(
            RecordBuilder::new(ObjectType::Monitor, id)
                .opt("Name", str_at(monitor, "/name"))
                .opt("Type", str_at(monitor, "/type"))
                .opt("Query", str_at(monitor, "/query"))
                .opt("Status", str_at(monitor, "/overall_state"))
                .opt("Tags", tags)
                .opt("Created At", str_at(monitor, "/created"))
                .opt("Updated At", str_at(monitor, "/modified"))
                .build(),
        )
    }
}

#[async_trait]
impl Connector for DatadogConnector {
    fn vendor(&self) -> Vendor {
        Vendor::Datadog
    }

    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError> {
        let base = self.base(session)?;
        let request = Self::request(session, format!("{base}/api/v1/validate"), "validate")?;
        let body: Value = session.send(request).await?.json()?;
        if body.get("valid").and_then(Value::as_bool) == Some(false) {
            return Err(LaikaError::BadCredentials {
                message: "datadog rejected the api key".into(),
            });
        }
        Ok(())
    }

    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError> {
        self.test_credentials(session).await?;
        Ok(vec![Scope::new("monitors", "Monitors")])
    }

    #[instrument(skip_all, fields(vendor = "datadog"))]
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        _scope: &Scope,
        _since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError> {
        let page = match cursor {
            Some(Cursor::Page(n)) => n,
            _ => 0,
        };
        let base = self.base(session)?;
        let request = Self::request(session, format!("{base}/api/v1/monitor"), "monitor.list")?
            .query("page", page.to_string())
            .query("page_size", PAGE_SIZE.to_string());
        let monitors: Vec<Value> = session.send(request).await?.json()?;
        let records = monitors.iter().filter_map(Self::monitor_record).collect();
        let next = (monitors.len() == PAGE_SIZE).then_some(Cursor::Page(page + 1));
        Ok(Page::new(records, next))
    }
}
