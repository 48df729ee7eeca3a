// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection credentials and their encrypted row form.
//!
//! Every secret field travels through one JSON document sealed under the
//! vault master key. Only the non-secret columns (`auth_kind`, `subdomain`,
//! `expires_at`, `regions`) are readable in the database.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use laika_core::{AuthKind, LaikaError, Vendor};
use laika_http::AccessSecret;
use laika_storage::CredentialRow;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::Sealed;
use crate::vault::Vault;

/// Temporary keys returned by an assume-role call.
#[derive(Debug, Clone)]
pub struct AwsSession {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub connection_id: String,
    pub vendor: Vendor,
    pub auth_kind: AuthKind,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub api_key: Option<SecretString>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub subdomain: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Role the platform assumes in the customer account.
    pub role_arn: Option<String>,
    pub aws_session: Option<AwsSession>,
    pub regions: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct SecretDocument {
    access_token: Option<String>,
    refresh_token: Option<String>,
    api_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    role_arn: Option<String>,
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    aws_session_token: Option<String>,
}

fn exposed(secret: &Option<SecretString>) -> Option<String> {
    secret.as_ref().map(|s| s.expose_secret().to_string())
}

fn wrapped(value: &Option<String>) -> Option<SecretString> {
    value.as_ref().map(|s| SecretString::from(s.clone()))
}

impl Credential {
    pub fn new(connection_id: impl Into<String>, vendor: Vendor, auth_kind: AuthKind) -> Self {
        Self {
            connection_id: connection_id.into(),
            vendor,
            auth_kind,
            access_token: None,
            refresh_token: None,
            api_key: None,
            username: None,
            password: None,
            subdomain: None,
            expires_at: None,
            role_arn: None,
            aws_session: None,
            regions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn oauth2(
        connection_id: impl Into<String>,
        vendor: Vendor,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut cred = Self::new(connection_id, vendor, AuthKind::Oauth2);
        cred.access_token = Some(SecretString::from(access_token.to_string()));
        cred.refresh_token = refresh_token.map(|t| SecretString::from(t.to_string()));
        cred.expires_at = expires_at;
        cred
    }

    pub fn api_key(connection_id: impl Into<String>, vendor: Vendor, key: &str) -> Self {
        let mut cred = Self::new(connection_id, vendor, AuthKind::ApiKey);
        cred.api_key = Some(SecretString::from(key.to_string()));
        cred
    }

    pub fn basic(
        connection_id: impl Into<String>,
        vendor: Vendor,
        username: &str,
        password: &str,
    ) -> Self {
        let mut cred = Self::new(connection_id, vendor, AuthKind::Basic);
        cred.username = Some(username.to_string());
        cred.password = Some(SecretString::from(password.to_string()));
        cred
    }

    /// The secret a connector authenticates with.
    pub fn access_secret(&self) -> Result<AccessSecret, LaikaError> {
        let secret = match self.auth_kind {
            AuthKind::Basic => {
                let (Some(user), Some(pass)) = (&self.username, &self.password) else {
                    return Err(self.missing("username and password"));
                };
                SecretString::from(STANDARD.encode(format!("{user}:{}", pass.expose_secret())))
            }
            AuthKind::ApiKey => self.api_key.clone().ok_or_else(|| self.missing("api key"))?,
            AuthKind::Oauth2 | AuthKind::Jwt => match (&self.access_token, &self.aws_session) {
                (Some(token), _) => token.clone(),
                (None, Some(session)) => session.session_token.clone(),
                (None, None) => return Err(self.missing("access token")),
            },
        };
        Ok(AccessSecret {
            auth_kind: self.auth_kind,
            secret,
            subdomain: self.subdomain.clone(),
        })
    }

    fn missing(&self, what: &str) -> LaikaError {
        LaikaError::BadCredentials {
            message: format!("connection {} has no {what}", self.connection_id),
        }
    }

    pub(crate) fn to_row(&self, vault: &Vault) -> Result<CredentialRow, LaikaError> {
        let doc = SecretDocument {
            access_token: exposed(&self.access_token),
            refresh_token: exposed(&self.refresh_token),
            api_key: exposed(&self.api_key),
            username: self.username.clone(),
            password: exposed(&self.password),
            role_arn: self.role_arn.clone(),
            aws_access_key_id: self.aws_session.as_ref().map(|s| s.access_key_id.clone()),
            aws_secret_access_key: self
                .aws_session
                .as_ref()
                .map(|s| s.secret_access_key.expose_secret().to_string()),
            aws_session_token: self
                .aws_session
                .as_ref()
                .map(|s| s.session_token.expose_secret().to_string()),
        };
        let plain = Zeroizing::new(serde_json::to_vec(&doc)?);
        let sealed = vault.seal(&plain)?;
        Ok(CredentialRow {
            connection_id: self.connection_id.clone(),
            vendor: self.vendor,
            auth_kind: self.auth_kind,
            subdomain: self.subdomain.clone(),
            expires_at: self.expires_at,
            regions: self.regions.clone(),
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce.to_vec(),
            updated_at: self.updated_at,
        })
    }

    pub(crate) fn from_row(row: CredentialRow, vault: &Vault) -> Result<Self, LaikaError> {
        let plain = vault.open(&Sealed::from_parts(row.ciphertext, row.nonce)?)?;
        let doc: SecretDocument = serde_json::from_slice(&plain).map_err(|e| {
            LaikaError::Vault(format!(
                "credential document for {} is corrupt: {e}",
                row.connection_id
            ))
        })?;
        let aws_session = match (
            &doc.aws_access_key_id,
            &doc.aws_secret_access_key,
            &doc.aws_session_token,
        ) {
            (Some(id), Some(secret), Some(token)) => Some(AwsSession {
                access_key_id: id.clone(),
                secret_access_key: SecretString::from(secret.clone()),
                session_token: SecretString::from(token.clone()),
            }),
            _ => None,
        };
        Ok(Self {
            connection_id: row.connection_id,
            vendor: row.vendor,
            auth_kind: row.auth_kind,
            access_token: wrapped(&doc.access_token),
            refresh_token: wrapped(&doc.refresh_token),
            api_key: wrapped(&doc.api_key),
            username: doc.username.clone(),
            password: wrapped(&doc.password),
            subdomain: row.subdomain,
            expires_at: row.expires_at,
            role_arn: doc.role_arn.clone(),
            aws_session,
            regions: row.regions,
            updated_at: row.updated_at,
        })
    }
}
