// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Load, store, and keep fresh the credential of every connection account.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use laika_core::{LaikaError, Vendor};
use laika_http::AccessSecret;
use laika_storage::Database;
use laika_storage::queries::connections;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::credential::Credential;
use crate::jwt::needs_refresh;
use crate::refresh::TokenRefresher;
use crate::vault::Vault;

pub struct CredentialVault {
    vault: Arc<Vault>,
    refreshers: HashMap<Vendor, Arc<dyn TokenRefresher>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    skew: Duration,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("refreshers", &self.refreshers.keys().collect::<Vec<_>>())
            .field("skew", &self.skew)
            .finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// `skew` is how long before expiry a token counts as stale.
    pub fn new(vault: Arc<Vault>, skew: std::time::Duration) -> Self {
        Self {
            vault,
            refreshers: HashMap::new(),
            locks: DashMap::new(),
            skew: Duration::from_std(skew).unwrap_or(Duration::minutes(5)),
        }
    }

    pub fn with_refresher(mut self, vendor: Vendor, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refreshers.insert(vendor, refresher);
        self
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    fn db(&self) -> &Database {
        self.vault.database()
    }

    pub async fn load(&self, connection_id: &str) -> Result<Credential, LaikaError> {
        let id = connection_id.to_string();
        let row = self
            .db()
            .call(move |conn| connections::get_credential(conn, &id))
            .await?
            .ok_or_else(|| LaikaError::NotFound {
                resource: format!("credential for connection {connection_id}"),
            })?;
        Credential::from_row(row, &self.vault)
    }

    /// Persist every field of `credential` in one row write.
    pub async fn store(&self, credential: &Credential) -> Result<(), LaikaError> {
        let row = credential.to_row(&self.vault)?;
        self.db()
            .call(move |conn| connections::upsert_credential(conn, &row))
            .await?;
        debug!(connection_id = %credential.connection_id, "credential stored");
        Ok(())
    }

    /// The connection's secret, renewed first when it is about to expire.
    ///
    /// Callers for the same connection are serialized; a caller that waited
    /// finds the renewed token on its re-read and does not refresh again.
    #[instrument(skip(self, cancel))]
    pub async fn ensure_fresh(
        &self,
        connection_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AccessSecret, LaikaError> {
        let lock = self
            .locks
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut credential = self.load(connection_id).await?;
        if !needs_refresh(&credential, Utc::now(), self.skew) {
            return credential.access_secret();
        }

        let Some(refresher) = self.refreshers.get(&credential.vendor) else {
            let message = format!("no token refresher for {}", credential.vendor);
            self.flag(connection_id, &message).await?;
            return Err(LaikaError::BadCredentials { message });
        };

        match refresher.refresh(&credential, cancel).await {
            Ok(tokens) => {
                tokens.apply(&mut credential);
                self.store(&credential).await?;
                info!(vendor = %credential.vendor, "credential refreshed");
                credential.access_secret()
            }
            Err(LaikaError::Cancelled) => Err(LaikaError::Cancelled),
            Err(e) => {
                let message = format!("token refresh failed: {e}");
                warn!(vendor = %credential.vendor, error = %e, "token refresh failed");
                self.flag(connection_id, &message).await?;
                Err(LaikaError::BadCredentials { message })
            }
        }
    }

    async fn flag(&self, connection_id: &str, message: &str) -> Result<(), LaikaError> {
        let id = connection_id.to_string();
        let message = message.to_string();
        self.db()
            .call(move |conn| connections::mark_error(conn, &id, &message, Utc::now()))
            .await
    }
}
