// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembling the running service from a validated configuration.

use std::sync::Arc;
use std::time::Duration;

use laika_config::LaikaConfig;
use laika_connectors::ConnectorRegistry;
use laika_core::{EmailSender, LaikaError, Vendor};
use laika_delivery::{
    DeliveryRouter, DeliverySinks, DigestRunner, EmailTemplates, Links, LogEmailSender,
    SlackPoster, SmtpEmailSender,
};
use laika_engine::{Engine, EventBus, PollRunner};
use laika_gateway::WsHub;
use laika_http::HttpClient;
use laika_launchpad::Launchpad;
use laika_storage::Database;
use laika_vault::{
    AwsAssumeRoleRefresher, CredentialVault, OAuth2Refresher, StsClient, Vault,
    new_vault_passphrase, vault_passphrase,
};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Vault entries holding the platform's own AWS keys, used to assume
/// customer roles.
pub const AWS_ACCESS_KEY_SECRET: &str = "aws.access_key_id";
pub const AWS_SECRET_KEY_SECRET: &str = "aws.secret_access_key";

/// Every long-lived component of the service.
pub struct App {
    pub config: LaikaConfig,
    pub db: Database,
    pub vault: Arc<Vault>,
    pub engine: Arc<Engine>,
    pub hub: WsHub,
    pub sinks: DeliverySinks,
    pub links: Links,
    pub digest: DigestRunner,
    pub launchpad: Launchpad,
}

impl App {
    pub async fn open(config: LaikaConfig, cancel: CancellationToken) -> Result<Self, LaikaError> {
        let db = Database::open_with(&config.storage).await?;
        let vault = Arc::new(open_vault(&db, &config).await?);
        let http = HttpClient::from_config(&config.http)?;

        let credentials = Arc::new(credential_vault(&config, vault.clone(), &http).await?);
        let registry = Arc::new(ConnectorRegistry::builtin(&config));
        let bus = EventBus::standard(DeliveryRouter::from_config(&config.delivery));
        let poller = PollRunner::new(
            db.clone(),
            bus.clone(),
            registry,
            credentials.clone(),
            http.clone(),
            config.polling.clone(),
        );
        let engine = Arc::new(Engine::new(db.clone(), bus, poller).with_shutdown(cancel.clone()));

        let hub = WsHub::new();
        let email = email_sender(&config, &vault).await?;
        let slack = SlackPoster::new(
            db.clone(),
            credentials,
            http,
            config.slack.api_base.clone(),
            cancel,
        );
        let sinks = DeliverySinks {
            websocket: Arc::new(hub.clone()),
            email: email.clone(),
            slack: Arc::new(slack),
        };
        let links = Links::new(&config.urls);
        let digest = DigestRunner::new(
            db.clone(),
            email,
            links.clone(),
            config.email.no_reply_email.clone(),
        );

        info!(service = %config.service.name, "laika assembled");
        Ok(Self {
            launchpad: Launchpad::new(db.clone()),
            config,
            db,
            vault,
            engine,
            hub,
            sinks,
            links,
            digest,
        })
    }
}

/// Unlock the vault, creating it on first start.
pub async fn open_vault(db: &Database, config: &LaikaConfig) -> Result<Vault, LaikaError> {
    let passphrase = if Vault::exists(db).await? {
        vault_passphrase()?
    } else {
        info!("no vault yet, creating one");
        new_vault_passphrase()?
    };
    Vault::open_or_create(db.clone(), &passphrase, &config.vault).await
}

async fn credential_vault(
    config: &LaikaConfig,
    vault: Arc<Vault>,
    http: &HttpClient,
) -> Result<CredentialVault, LaikaError> {
    let mut credentials = CredentialVault::new(
        vault.clone(),
        Duration::from_secs(config.vault.refresh_skew_secs),
    );

    for (tag, vendor_config) in &config.vendors {
        let Ok(vendor) = tag.parse::<Vendor>() else {
            warn!(vendor = %tag, "unknown vendor section ignored");
            continue;
        };
        if let Some(refresher) = OAuth2Refresher::from_vendor_config(vendor_config, http.clone()) {
            debug!(%vendor, "oauth2 refresher registered");
            credentials = credentials.with_refresher(vendor, Arc::new(refresher));
        }
    }

    let key_id = vault.retrieve_secret(AWS_ACCESS_KEY_SECRET).await?;
    let secret_key = vault.retrieve_secret(AWS_SECRET_KEY_SECRET).await?;
    if let (Some(key_id), Some(secret_key)) = (key_id, secret_key) {
        let sts = StsClient::new(http.clone(), key_id.expose_secret(), secret_key);
        let refresher = AwsAssumeRoleRefresher::with_sts(
            sts,
            config.aws.external_id.clone(),
            config.aws.regions.clone(),
        );
        debug!("aws assume-role refresher registered");
        credentials = credentials.with_refresher(Vendor::Aws, Arc::new(refresher));
    } else {
        debug!("no platform aws keys in the vault, aws connections cannot refresh");
    }

    Ok(credentials)
}

async fn email_sender(config: &LaikaConfig, vault: &Vault) -> Result<Arc<dyn EmailSender>, LaikaError> {
    if config.email.smtp_host.is_none() {
        warn!("email.smtp_host is not set, e-mails are only logged");
        return Ok(Arc::new(LogEmailSender));
    }
    let password: Option<SecretString> = if config.email.smtp_password_secret.is_empty() {
        None
    } else {
        vault.retrieve_secret(&config.email.smtp_password_secret).await?
    };
    let templates = Arc::new(EmailTemplates::new()?);
    Ok(Arc::new(SmtpEmailSender::from_config(&config.email, password, templates)?))
}
