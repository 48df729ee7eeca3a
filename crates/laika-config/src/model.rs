// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Laika core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup with a suggestion instead of being silently ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Laika configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LaikaConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    /// Vendor HTTP kernel settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Integration polling settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Delivery worker settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub digest: DigestConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    /// Front-end redirect targets used in e-mails and Slack links.
    #[serde(default)]
    pub urls: UrlsConfig,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Per-vendor OAuth client settings, keyed by vendor tag (`github`, `jira`, ...).
    #[serde(default)]
    pub vendors: BTreeMap<String, VendorConfig>,
}

impl LaikaConfig {
    pub fn vendor(&self, tag: &str) -> Option<&VendorConfig> {
        self.vendors.get(tag)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "laika".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Milliseconds SQLite waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("laika").join("laika.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("laika.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Argon2id memory cost in KiB.
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,

    /// Seconds before expiry at which tokens are renewed.
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
            refresh_skew_secs: default_refresh_skew_secs(),
        }
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

fn default_refresh_skew_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Padding added to the vendor's reset epoch before the next call.
    #[serde(default = "default_rate_limit_buffer_secs")]
    pub rate_limit_buffer_secs: u64,

    /// Upper bound on any single rate-limit sleep.
    #[serde(default = "default_max_rate_limit_sleep_secs")]
    pub max_rate_limit_sleep_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            rate_limit_buffer_secs: default_rate_limit_buffer_secs(),
            max_rate_limit_sleep_secs: default_max_rate_limit_sleep_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_rate_limit_buffer_secs() -> u64 {
    15
}

fn default_max_rate_limit_sleep_secs() -> u64 {
    900
}

fn default_user_agent() -> String {
    format!("laika/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between poll ticks for every active connection.
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Records processed per connection per tick before the cursor is saved.
    #[serde(default = "default_chunk_max_records")]
    pub chunk_max_records: usize,

    /// Pages fetched per connection per tick.
    #[serde(default = "default_chunk_max_pages")]
    pub chunk_max_pages: usize,

    /// How far back the first poll of a new connection reaches.
    #[serde(default = "default_initial_lookback_days")]
    pub initial_lookback_days: i64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_poll_interval_secs(),
            chunk_max_records: default_chunk_max_records(),
            chunk_max_pages: default_chunk_max_pages(),
            initial_lookback_days: default_initial_lookback_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    3600
}

fn default_chunk_max_records() -> usize {
    5000
}

fn default_chunk_max_pages() -> usize {
    100
}

fn default_initial_lookback_days() -> i64 {
    365
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Idle sleep between empty dequeues, in milliseconds.
    #[serde(default = "default_worker_idle_ms")]
    pub worker_idle_ms: u64,

    #[serde(default = "default_websocket_max_attempts")]
    pub websocket_max_attempts: i32,

    #[serde(default = "default_channel_max_attempts")]
    pub email_max_attempts: i32,

    #[serde(default = "default_channel_max_attempts")]
    pub slack_max_attempts: i32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            worker_idle_ms: default_worker_idle_ms(),
            websocket_max_attempts: default_websocket_max_attempts(),
            email_max_attempts: default_channel_max_attempts(),
            slack_max_attempts: default_channel_max_attempts(),
        }
    }
}

fn default_worker_idle_ms() -> u64 {
    1000
}

fn default_websocket_max_attempts() -> i32 {
    1
}

fn default_channel_max_attempts() -> i32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DigestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression (seconds field optional), evaluated in UTC.
    #[serde(default = "default_digest_schedule")]
    pub schedule: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_digest_schedule(),
        }
    }
}

fn default_digest_schedule() -> String {
    "0 0 13 * * *".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Envelope sender for every outbound e-mail (`NO_REPLY_EMAIL`).
    #[serde(default = "default_no_reply_email")]
    pub no_reply_email: String,

    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    /// Vault secret name holding the SMTP password.
    #[serde(default = "default_smtp_password_secret")]
    pub smtp_password_secret: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            no_reply_email: default_no_reply_email(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password_secret: default_smtp_password_secret(),
        }
    }
}

fn default_no_reply_email() -> String {
    "no-reply@heylaika.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_password_secret() -> String {
    "smtp.password".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UrlsConfig {
    /// `LAIKA_WEB_REDIRECT`: base of the customer web app.
    #[serde(default = "default_web_redirect")]
    pub web_redirect: String,

    /// `LAIKA_AUDIT_REDIRECT`: base of the auditor web app.
    #[serde(default = "default_audit_redirect")]
    pub audit_redirect: String,

    /// `LAIKA_CONCIERGE_REDIRECT`.
    #[serde(default = "default_concierge_redirect")]
    pub concierge_redirect: String,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self {
            web_redirect: default_web_redirect(),
            audit_redirect: default_audit_redirect(),
            concierge_redirect: default_concierge_redirect(),
        }
    }
}

fn default_web_redirect() -> String {
    "http://localhost:3000".to_string()
}

fn default_audit_redirect() -> String {
    "http://localhost:3001".to_string()
}

fn default_concierge_redirect() -> String {
    "http://localhost:3002".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// `AWS_EXTERNAL_ID` passed on every assume-role call.
    #[serde(default)]
    pub external_id: Option<String>,

    /// Regions checked after each credential refresh.
    #[serde(default = "default_aws_regions")]
    pub regions: Vec<String>,
}

fn default_aws_regions() -> Vec<String> {
    ["us-east-1", "us-east-2", "us-west-1", "us-west-2", "eu-west-1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for `/v1/*`. With no token and no signing secret every
    /// request is rejected.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Shared HMAC secret for signed command webhooks.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            signing_secret: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8088
}

/// OAuth client settings of one vendor (`{VENDOR}_CLIENT_ID`, ...).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VendorConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    /// Token endpoint used for refresh-token grants.
    #[serde(default)]
    pub oauth_url: Option<String>,

    /// Override of the vendor API base URL.
    #[serde(default)]
    pub api_base: Option<String>,
}
