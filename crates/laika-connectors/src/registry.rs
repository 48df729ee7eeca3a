// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor to connector lookup.

use std::collections::HashMap;
use std::sync::Arc;

use laika_config::LaikaConfig;
use laika_core::{LaikaError, Vendor};
use tracing::debug;

use crate::connector::Connector;
use crate::vendors::{
    CheckrConnector, DatadogConnector, GithubConnector, JiraConnector, LinearConnector,
    OktaConnector, SlackConnector,
};

#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<Vendor, Arc<dyn Connector>>,
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("vendors", &self.vendors())
            .finish()
    }
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in connector, with `vendors.{tag}.api_base` applied.
    pub fn builtin(config: &LaikaConfig) -> Self {
        let base = |vendor: Vendor| {
            config
                .vendor(&vendor.to_string())
                .and_then(|v| v.api_base.clone())
        };
        let mut registry = Self::new();
        registry.register(Arc::new(GithubConnector::new().with_api_base_opt(base(Vendor::Github))));
        registry.register(Arc::new(JiraConnector::new().with_api_base_opt(base(Vendor::Jira))));
        registry.register(Arc::new(LinearConnector::new().with_api_base_opt(base(Vendor::Linear))));
        registry.register(Arc::new(OktaConnector::new().with_api_base_opt(base(Vendor::Okta))));
        registry.register(Arc::new(
            SlackConnector::new().with_api_base_opt(base(Vendor::Slack).or_else(|| Some(config.slack.api_base.clone()))),
        ));
        registry.register(Arc::new(CheckrConnector::new().with_api_base_opt(base(Vendor::Checkr))));
        registry.register(Arc::new(DatadogConnector::new().with_api_base_opt(base(Vendor::Datadog))));
        registry
    }

    /// Add or replace the connector for its vendor.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        debug!(vendor = %connector.vendor(), "connector registered");
        self.connectors.insert(connector.vendor(), connector);
    }

    pub fn get(&self, vendor: Vendor) -> Result<Arc<dyn Connector>, LaikaError> {
        self.connectors
            .get(&vendor)
            .cloned()
            .ok_or_else(|| LaikaError::AdapterNotFound {
                adapter_type: "connector".into(),
                name: vendor.to_string(),
            })
    }

    pub fn vendors(&self) -> Vec<Vendor> {
        let mut out: Vec<Vendor> = self.connectors.keys().copied().collect();
        out.sort();
        out
    }
}
