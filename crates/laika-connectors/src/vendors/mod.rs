// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in vendor drivers.

mod checkr;
mod datadog;
mod github;
mod jira;
mod linear;
mod okta;
mod slack;

pub use checkr::CheckrConnector;
pub use datadog::DatadogConnector;
pub use github::GithubConnector;
pub use jira::JiraConnector;
pub use linear::LinearConnector;
pub use okta::OktaConnector;
pub use slack::SlackConnector;

use laika_core::LaikaError;

use crate::connector::ConnectorSession;

/// API base chosen for one call: the connection's `api_base` setting, then
/// the connector-wide override, then the vendor default.
pub(crate) fn resolve_base(
    session: &ConnectorSession<'_>,
    configured: Option<&str>,
    default: impl FnOnce() -> Result<String, LaikaError>,
) -> Result<String, LaikaError> {
    let base = match session.api_base_override().or(configured) {
        Some(base) => base.to_string(),
        None => default()?,
    };
    Ok(base.trim_end_matches('/').to_string())
}

/// `https://{subdomain}.{domain}` for vendors hosted per tenant.
pub(crate) fn tenant_base(session: &ConnectorSession<'_>, domain: &str) -> Result<String, LaikaError> {
    let subdomain = session
        .secret
        .subdomain
        .as_deref()
        .or_else(|| session.setting_str("subdomain"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LaikaError::ConfigurationError {
            message: format!("connection has no {domain} subdomain"),
        })?;
    Ok(format!("https://{subdomain}.{domain}"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use laika_config::model::HttpConfig;
    use laika_http::{AccessSecret, HttpClient, IntegrationContext, RetryPolicy};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::connector::ConnectorSession;

    /// Owns everything a [`ConnectorSession`] borrows.
    pub struct Fixture {
        pub http: HttpClient,
        pub ctx: IntegrationContext,
        pub secret: AccessSecret,
        pub settings: serde_json::Value,
        pub cancel: CancellationToken,
    }

    impl Fixture {
        pub fn new(vendor: &str, secret: AccessSecret) -> Self {
            let http = HttpClient::from_config(&HttpConfig::default())
                .unwrap()
                .with_policy(RetryPolicy {
                    max_attempts: 1,
                    base: Duration::from_millis(1),
                    max: Duration::from_millis(1),
                })
                .with_rate_limit_buffer(Duration::ZERO);
            Self {
                http,
                ctx: IntegrationContext::new(vendor, "c1"),
                secret,
                settings: serde_json::json!({}),
                cancel: CancellationToken::new(),
            }
        }

        pub fn session(&mut self) -> ConnectorSession<'_> {
            ConnectorSession {
                http: &self.http,
                ctx: &mut self.ctx,
                secret: &self.secret,
                settings: &self.settings,
                cancel: &self.cancel,
            }
        }
    }
}
