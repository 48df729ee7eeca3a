// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! Supports two auth methods (checked in order):
//! 1. Bearer token (`Authorization: Bearer <token>`)
//! 2. HMAC-SHA256 signature (`X-Signature` + `X-Timestamp` headers), keyed by
//!    the shared signing secret and computed over the timestamp
//!
//! When neither is configured, all requests are rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use laika_config::model::GatewayConfig;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signed requests older (or newer) than this are replays.
const MAX_SKEW_SECS: i64 = 60;

#[derive(Clone, Default)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
    pub signing_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[redacted]"))
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl AuthConfig {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
            signing_secret: config.signing_secret.clone().filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bearer_token.is_some() || self.signing_secret.is_some()
    }

    /// Constant-time comparison against the configured bearer token.
    pub fn accepts_token(&self, token: &str) -> bool {
        match &self.bearer_token {
            Some(expected) => {
                expected.len() == token.len()
                    && expected
                        .bytes()
                        .zip(token.bytes())
                        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                        == 0
            }
            None => false,
        }
    }

    fn accepts_signature(&self, headers: &HeaderMap, now: DateTime<Utc>) -> bool {
        let Some(secret) = &self.signing_secret else {
            return false;
        };
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let (Some(sig_hex), Some(timestamp)) = (header("x-signature"), header("x-timestamp")) else {
            return false;
        };
        let Ok(sent_at) = DateTime::parse_from_rfc3339(timestamp) else {
            return false;
        };
        let age = now.signed_duration_since(sent_at).num_seconds();
        if age.abs() > MAX_SKEW_SECS {
            tracing::debug!(age_secs = age, "signed request rejected: timestamp out of window");
            return false;
        }
        let Ok(signature) = hex::decode(sig_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }

    /// Whether `headers` carry valid credentials at `now`.
    pub fn authorize(&self, headers: &HeaderMap, now: DateTime<Utc>) -> bool {
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if let Some(token) = bearer {
            if self.accepts_token(token) {
                return true;
            }
        }
        self.accepts_signature(headers, now)
    }
}

/// Hex HMAC-SHA256 of `timestamp` under `secret`, as clients send it.
pub fn sign_timestamp(secret: &str, timestamp: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !auth.is_configured() {
        tracing::error!("gateway has no auth configured, rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    if auth.authorize(request.headers(), Utc::now()) {
        return Ok(next.run(request).await);
    }
    Err(StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn empty_settings_fail_closed() {
        let auth = AuthConfig::from_config(&GatewayConfig {
            bearer_token: Some(String::new()),
            ..GatewayConfig::default()
        });
        assert!(!auth.is_configured());
        assert!(!auth.authorize(&headers(&[("authorization", "Bearer ")]), Utc::now()));
    }

    #[test]
    fn bearer_token_must_match_exactly() {
        let auth = AuthConfig {
            bearer_token: Some("tok-1".into()),
            signing_secret: None,
        };
        assert!(auth.authorize(&headers(&[("authorization", "Bearer tok-1")]), Utc::now()));
        assert!(!auth.authorize(&headers(&[("authorization", "Bearer tok-12")]), Utc::now()));
        assert!(!auth.authorize(&headers(&[("authorization", "tok-1")]), Utc::now()));
    }

    #[test]
    fn signatures_are_checked_within_the_window() {
        let auth = AuthConfig {
            bearer_token: None,
            signing_secret: Some("shh".into()),
        };
        let now = Utc::now();
        let ts = now.to_rfc3339();
        let sig = sign_timestamp("shh", &ts).unwrap();
        assert!(auth.authorize(&headers(&[("x-signature", &sig), ("x-timestamp", &ts)]), now));

        let wrong = sign_timestamp("other", &ts).unwrap();
        assert!(!auth.authorize(&headers(&[("x-signature", &wrong), ("x-timestamp", &ts)]), now));

        let later = now + chrono::Duration::seconds(MAX_SKEW_SECS + 5);
        assert!(!auth.authorize(&headers(&[("x-signature", &sig), ("x-timestamp", &ts)]), later));
    }

    #[test]
    fn debug_redacts_secrets() {
        let auth = AuthConfig {
            bearer_token: Some("secret-token".into()),
            signing_secret: Some("secret-key".into()),
        };
        let shown = format!("{auth:?}");
        assert!(!shown.contains("secret-token"));
        assert!(!shown.contains("secret-key"));
        assert!(shown.contains("[redacted]"));
    }
}
