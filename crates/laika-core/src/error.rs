// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Laika core.
//!
//! Every variant carries a stable [`LaikaError::code`] that callers outside the
//! core (the GraphQL layer, the gateway) can match on.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Laika crates.
#[derive(Debug, Error)]
pub enum LaikaError {
    /// Vendor rejected our credentials, the scope is unreachable, or the
    /// account lacks a required permission.
    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    /// Vendor rate limited the call.
    #[error("too many requests (retry after {retry_after:?})")]
    TooManyRequests { retry_after: Option<Duration> },

    /// Request timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("bad gateway")]
    BadGateway,

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("gateway timeout")]
    GatewayTimeout,

    /// Transport level failure before any response was read.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Any other non-success vendor response. Logged, never retried.
    #[error("vendor responded with HTTP {status}")]
    Http { status: u16, body: String },

    /// A vendor resource (project, repo, group) does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Token refresh failed; the owning connection is flagged.
    #[error("bad credentials: {message}")]
    BadCredentials { message: String },

    /// Internal authorization failure.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Guarded precondition violation (empty content, missing relation).
    #[error("service error: {0}")]
    Service(String),

    /// Malformed domain entity.
    #[error("invalid value: {0}")]
    Value(String),

    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("config error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Vault errors (wrong passphrase, corrupt ciphertext, missing master key).
    #[error("vault error: {0}")]
    Vault(String),

    /// A delivery sink failed to hand a message over.
    #[error("delivery error on {channel}: {message}")]
    Delivery { channel: String, message: String },

    /// No connector is registered for the vendor.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// The owning task was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LaikaError {
    /// Stable machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigurationError { .. } => "configuration_error",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::Timeout { .. } => "timeout",
            Self::BadGateway => "bad_gateway",
            Self::ServiceUnavailable => "service_unavailable",
            Self::GatewayTimeout => "gateway_timeout",
            Self::Connection { .. } => "connection_error",
            Self::Http { .. } => "connection_result",
            Self::NotFound { .. } => "not_found",
            Self::BadCredentials { .. } => "bad_credentials",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Service(_) => "service_exception",
            Self::Value(_) => "value_error",
            Self::Config(_) => "config",
            Self::Storage { .. } => "storage",
            Self::Vault(_) => "vault",
            Self::Delivery { .. } => "delivery",
            Self::AdapterNotFound { .. } => "adapter_not_found",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the HTTP kernel may retry the call that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TooManyRequests { .. }
                | Self::Timeout { .. }
                | Self::BadGateway
                | Self::ServiceUnavailable
                | Self::GatewayTimeout
                | Self::Connection { .. }
        )
    }

    /// Whether the error means the connection's credentials or permissions
    /// are unusable and the connection must be flagged.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError { .. } | Self::BadCredentials { .. }
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            source: message.into().into(),
        }
    }

    pub fn delivery(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for LaikaError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage {
            source: Box::new(e),
        }
    }
}

impl From<serde_json::Error> for LaikaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Value(format!("json: {e}"))
    }
}
