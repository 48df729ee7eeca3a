// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::str::FromStr;

use croner::Cron;

use crate::diagnostic::ConfigError;
use crate::model::LaikaConfig;

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &LaikaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    for (key, value) in [
        ("urls.web_redirect", &config.urls.web_redirect),
        ("urls.audit_redirect", &config.urls.audit_redirect),
        ("urls.concierge_redirect", &config.urls.concierge_redirect),
        ("slack.api_base", &config.slack.api_base),
    ] {
        if let Err(e) = url::Url::parse(value) {
            errors.push(ConfigError::validation(format!(
                "{key} `{value}` is not a valid URL: {e}"
            )));
        }
    }

    let from = config.email.no_reply_email.trim();
    if from.is_empty() || !from.contains('@') {
        errors.push(ConfigError::validation(format!(
            "email.no_reply_email `{from}` is not an e-mail address"
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.http.max_attempts == 0 {
        errors.push(ConfigError::validation("http.max_attempts must be at least 1"));
    }
    if config.http.timeout_secs == 0 {
        errors.push(ConfigError::validation("http.timeout_secs must be at least 1"));
    }
    if config.http.backoff_base_ms > config.http.backoff_max_ms {
        errors.push(ConfigError::validation(format!(
            "http.backoff_base_ms ({}) exceeds http.backoff_max_ms ({})",
            config.http.backoff_base_ms, config.http.backoff_max_ms
        )));
    }

    if config.polling.chunk_max_records == 0 || config.polling.chunk_max_pages == 0 {
        errors.push(ConfigError::validation(
            "polling.chunk_max_records and polling.chunk_max_pages must be positive",
        ));
    }
    if config.polling.interval_secs == 0 {
        errors.push(ConfigError::validation("polling.interval_secs must be positive"));
    }

    for (key, value) in [
        ("delivery.websocket_max_attempts", config.delivery.websocket_max_attempts),
        ("delivery.email_max_attempts", config.delivery.email_max_attempts),
        ("delivery.slack_max_attempts", config.delivery.slack_max_attempts),
    ] {
        if value < 1 {
            errors.push(ConfigError::validation(format!(
                "{key} must be at least 1, got {value}"
            )));
        }
    }

    if let Err(e) = Cron::from_str(&config.digest.schedule) {
        errors.push(ConfigError::validation(format!(
            "digest.schedule `{}` is not a valid cron expression: {e}",
            config.digest.schedule
        )));
    }

    if config.vault.kdf_memory_cost < 32768 {
        errors.push(ConfigError::validation(format!(
            "vault.kdf_memory_cost must be at least 32768 (32 MiB), got {}",
            config.vault.kdf_memory_cost
        )));
    }
    if config.vault.kdf_iterations < 2 {
        errors.push(ConfigError::validation(format!(
            "vault.kdf_iterations must be at least 2, got {}",
            config.vault.kdf_iterations
        )));
    }

    for (tag, vendor) in &config.vendors {
        if let Some(url) = &vendor.oauth_url {
            if url::Url::parse(url).is_err() {
                errors.push(ConfigError::validation(format!(
                    "vendors.{tag}.oauth_url `{url}` is not a valid URL"
                )));
            }
        }
        if vendor.client_id.is_some() != vendor.client_secret.is_some() {
            errors.push(ConfigError::validation(format!(
                "vendors.{tag} must set client_id and client_secret together"
            )));
        }
    }

    if config.gateway.enabled && config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&LaikaConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let mut config = LaikaConfig::default();
        config.urls.web_redirect = "not a url".into();
        config.http.max_attempts = 0;
        config.digest.schedule = "every day".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn vendor_credentials_must_pair() {
        let mut config = LaikaConfig::default();
        config.vendors.insert(
            "github".into(),
            crate::model::VendorConfig {
                client_id: Some("id".into()),
                ..Default::default()
            },
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("vendors.github"));
    }
}
