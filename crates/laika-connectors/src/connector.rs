// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The paged-pull contract every vendor driver implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laika_core::{Cursor, LaikaError, ObjectType, Vendor};
use laika_http::{AccessSecret, HttpClient, IntegrationContext, VendorRequest, VendorResponse};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A selectable unit inside a vendor account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub id: String,
    pub name: String,
}

impl Scope {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One normalized record. `data["Id"]` is the vendor natural id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub object_type: ObjectType,
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub next: Option<Cursor>,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(records: Vec<Record>, next: Option<Cursor>) -> Self {
        Self { records, next }
    }
}

/// Everything a connector call needs, borrowed from the polling task.
pub struct ConnectorSession<'a> {
    pub http: &'a HttpClient,
    pub ctx: &'a mut IntegrationContext,
    pub secret: &'a AccessSecret,
    pub settings: &'a serde_json::Value,
    pub cancel: &'a CancellationToken,
}

impl<'a> ConnectorSession<'a> {
    /// Send `request` through the kernel. Requests without explicit auth get
    /// the session secret attached the conventional way for its kind.
    pub async fn send(&mut self, request: VendorRequest) -> Result<VendorResponse, LaikaError> {
        let request = if request.auth.is_none() {
            self.secret.authorize(request)
        } else {
            request
        };
        self.http.execute(self.ctx, self.cancel, request).await
    }

    /// `api_base` from the connection settings, the per-connection override.
    pub fn api_base_override(&self) -> Option<&str> {
        self.settings
            .get("api_base")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Cheapest authenticated round-trip the vendor offers.
    async fn test_credentials(&self, session: &mut ConnectorSession<'_>) -> Result<(), LaikaError>;

    async fn discover_scope(&self, session: &mut ConnectorSession<'_>) -> Result<Vec<Scope>, LaikaError>;

    /// Fetch one page of `scope`. `cursor` is `None` for the first page.
    async fn pull(
        &self,
        session: &mut ConnectorSession<'_>,
        scope: &Scope,
        since: Option<DateTime<Utc>>,
        cursor: Option<Cursor>,
    ) -> Result<Page, LaikaError>;
}
