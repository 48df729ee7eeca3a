// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expiry checks on stored access tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use laika_core::{AuthKind, LaikaError};
use secrecy::ExposeSecret;

use crate::credential::Credential;

/// Three non-empty base64url segments separated by dots.
pub fn is_jwt_shaped(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='))
        })
}

/// The `exp` claim of a JWT-shaped token, if the payload carries one.
pub fn decode_exp(token: &str) -> Result<Option<i64>, LaikaError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| LaikaError::Value("token has no payload segment".into()))?;
    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| LaikaError::Value(format!("token payload is not base64url: {e}")))?;
    let claims: serde_json::Value = serde_json::from_slice(&raw)?;
    Ok(claims.get("exp").and_then(|v| v.as_i64()))
}

/// Whether `credential` must be renewed before use at `now`.
pub fn needs_refresh(credential: &Credential, now: DateTime<Utc>, skew: Duration) -> bool {
    if matches!(credential.auth_kind, AuthKind::ApiKey | AuthKind::Basic) {
        return false;
    }
    let Some(token) = credential.access_token.as_ref() else {
        return true;
    };
    let token = token.expose_secret();

    if is_jwt_shaped(token) {
        match decode_exp(token) {
            Ok(Some(exp)) => return exp - now.timestamp() <= skew.num_seconds(),
            Ok(None) => {}
            Err(_) => return true,
        }
    }
    match credential.expires_at {
        Some(expires_at) => expires_at - now <= skew,
        None => false,
    }
}
