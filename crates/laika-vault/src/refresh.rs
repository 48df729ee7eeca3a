// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-vendor token renewal plugs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use laika_config::model::VendorConfig;
use laika_core::LaikaError;
use laika_http::{HttpClient, IntegrationContext, VendorRequest};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::credential::{AwsSession, Credential};

/// What a successful renewal hands back for persisting.
#[derive(Debug, Clone, Default)]
pub struct RefreshedTokens {
    pub access_token: Option<SecretString>,
    /// `None` keeps the stored refresh token.
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
    pub aws_session: Option<AwsSession>,
    /// Replacement region list, when the refresher re-validated it.
    pub regions: Option<Vec<String>>,
}

impl RefreshedTokens {
    /// Fold the renewal into `credential`.
    pub fn apply(self, credential: &mut Credential) {
        if let Some(token) = self.access_token {
            credential.access_token = Some(token);
        }
        if let Some(token) = self.refresh_token {
            credential.refresh_token = Some(token);
        }
        if let Some(session) = self.aws_session {
            credential.aws_session = Some(session);
        }
        if let Some(regions) = self.regions {
            credential.regions = regions;
        }
        credential.expires_at = self.expires_at;
        credential.updated_at = Utc::now();
    }
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<RefreshedTokens, LaikaError>;
}

/// OAuth2 `refresh_token` grant against the vendor token endpoint.
pub struct OAuth2Refresher {
    http: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl OAuth2Refresher {
    pub fn new(
        http: HttpClient,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// `None` unless the vendor section names a token URL, client id and secret.
    pub fn from_vendor_config(config: &VendorConfig, http: HttpClient) -> Option<Self> {
        match (&config.oauth_url, &config.client_id, &config.client_secret) {
            (Some(url), Some(id), Some(secret)) => Some(Self::new(
                http,
                url.clone(),
                id.clone(),
                SecretString::from(secret.clone()),
            )),
            _ => None,
        }
    }
}

#[async_trait]
impl TokenRefresher for OAuth2Refresher {
    #[instrument(skip_all, fields(vendor = %credential.vendor, connection_id = %credential.connection_id))]
    async fn refresh(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<RefreshedTokens, LaikaError> {
        let refresh_token = credential.refresh_token.as_ref().ok_or_else(|| {
            LaikaError::BadCredentials {
                message: "no refresh token stored".into(),
            }
        })?;
        let form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            (
                "refresh_token".to_string(),
                refresh_token.expose_secret().to_string(),
            ),
            ("client_id".to_string(), self.client_id.clone()),
            (
                "client_secret".to_string(),
                self.client_secret.expose_secret().to_string(),
            ),
        ];
        let mut ctx = IntegrationContext::new(credential.vendor.to_string(), &credential.connection_id);
        let request = VendorRequest::post_form(&self.token_url, form)
            .header("accept", "application/json")
            .endpoint("oauth.token");
        let response = self.http.execute(&mut ctx, cancel, request).await?;
        let body: TokenResponse = response.json()?;
        debug!(rotated = body.refresh_token.is_some(), "access token refreshed");

        Ok(RefreshedTokens {
            access_token: Some(SecretString::from(body.access_token)),
            refresh_token: body.refresh_token.map(SecretString::from),
            expires_at: body.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            aws_session: None,
            regions: None,
        })
    }
}
