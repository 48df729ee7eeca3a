// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fresh secret a connector authenticates with.

use laika_core::AuthKind;
use secrecy::{ExposeSecret, SecretString};

use crate::request::VendorRequest;

/// Secret handed out by the credential vault after any refresh.
///
/// For `basic` credentials `secret` is the already encoded
/// `base64(username:password)` value.
#[derive(Debug, Clone)]
pub struct AccessSecret {
    pub auth_kind: AuthKind,
    pub secret: SecretString,
    pub subdomain: Option<String>,
}

impl AccessSecret {
    pub fn bearer(secret: SecretString) -> Self {
        Self {
            auth_kind: AuthKind::Oauth2,
            secret,
            subdomain: None,
        }
    }

    /// Attach the secret the conventional way for its kind: `Basic` for
    /// basic credentials, `Bearer` for everything else.
    pub fn authorize(&self, request: VendorRequest) -> VendorRequest {
        match self.auth_kind {
            AuthKind::Basic => {
                let value = format!("Basic {}", self.secret.expose_secret());
                request.auth_header("authorization", SecretString::from(value))
            }
            _ => request.bearer(self.secret.clone()),
        }
    }
}
