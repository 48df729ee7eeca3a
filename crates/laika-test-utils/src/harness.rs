// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the whole pipeline (storage, vault, engine, bus,
//! delivery workers, digest, launchpad) over a temp SQLite file, with
//! [`RecordingSinks`] in place of the e-mail relay, Slack, and the websocket
//! hub. Nothing runs in the background: tests call [`TestHarness::drain`]
//! and [`TestHarness::run_digest`] to move deliveries along.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use laika_config::LaikaConfig;
use laika_connectors::{Connector, ConnectorRegistry};
use laika_core::{Alert, AlertType, BatchResult, EmailSender, LaikaError};
use laika_delivery::{DeliveryRouter, DeliveryWorker, DigestRunner, DrainStats, Links, workers};
use laika_engine::{CommandOutput, Engine, EventBus, InboundCommand, PollRunner};
use laika_http::{HttpClient, RetryPolicy};
use laika_launchpad::Launchpad;
use laika_storage::Database;
use laika_storage::queries::alerts;
use laika_vault::{CredentialVault, Vault};
use rusqlite::Connection;

use crate::recording::RecordingSinks;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    registry: ConnectorRegistry,
    config: LaikaConfig,
    sinks: RecordingSinks,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            registry: ConnectorRegistry::new(),
            config: LaikaConfig::default(),
            sinks: RecordingSinks::new(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.registry.register(connector);
        self
    }

    pub fn with_config(mut self, config: LaikaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sinks(mut self, sinks: RecordingSinks) -> Self {
        self.sinks = sinks;
        self
    }

    pub async fn build(self) -> Result<TestHarness, LaikaError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| LaikaError::storage(format!("temp dir: {e}")))?;
        let db_path = temp_dir.path().join("laika-test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let config = self.config;
        let vault = Arc::new(CredentialVault::new(
            Arc::new(Vault::ephemeral(db.clone())?),
            Duration::from_secs(config.vault.refresh_skew_secs),
        ));
        let http = HttpClient::from_config(&config.http)?
            .with_policy(RetryPolicy {
                max_attempts: 1,
                base: Duration::from_millis(1),
                max: Duration::from_millis(1),
            })
            .with_rate_limit_buffer(Duration::ZERO);

        let bus = EventBus::standard(DeliveryRouter::from_config(&config.delivery));
        let poller = PollRunner::new(
            db.clone(),
            bus.clone(),
            Arc::new(self.registry),
            vault,
            http,
            config.polling.clone(),
        );
        let engine = Arc::new(Engine::new(db.clone(), bus, poller));

        let links = Links::new(&config.urls);
        let from = config.email.no_reply_email.clone();
        let delivery = workers(
            &db,
            &self.sinks.sinks(),
            &links,
            &from,
            Duration::from_millis(1),
        );
        let email: Arc<dyn EmailSender> = Arc::new(self.sinks.clone());
        let digest = DigestRunner::new(db.clone(), email, links, from);

        Ok(TestHarness {
            launchpad: Launchpad::new(db.clone()),
            db,
            engine,
            sinks: self.sinks,
            workers: delivery,
            digest,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete Laika stack over a temp database.
pub struct TestHarness {
    pub db: Database,
    pub engine: Arc<Engine>,
    pub launchpad: Launchpad,
    /// Everything the delivery workers and the digest sent.
    pub sinks: RecordingSinks,
    pub workers: Vec<DeliveryWorker>,
    pub digest: DigestRunner,
    pub config: LaikaConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Seed rows with [`fixtures`](crate::fixtures) helpers in one call.
    pub async fn seed<F>(&self, f: F) -> Result<(), LaikaError>
    where
        F: FnOnce(&Connection) -> Result<(), LaikaError> + Send + 'static,
    {
        self.db.call(move |conn| f(conn)).await
    }

    pub async fn dispatch(&self, command: InboundCommand) -> Result<CommandOutput, LaikaError> {
        self.engine.dispatch(command).await
    }

    /// Run every delivery worker until its queue is empty.
    pub async fn drain(&self) -> Result<DrainStats, LaikaError> {
        let mut total = DrainStats::default();
        for worker in &self.workers {
            let stats = worker.drain_once().await?;
            total.delivered += stats.delivered;
            total.failed += stats.failed;
            total.dropped += stats.dropped;
        }
        Ok(total)
    }

    pub async fn run_digest(&self, now: DateTime<Utc>) -> Result<BatchResult, LaikaError> {
        self.digest.run(now).await
    }

    pub async fn alerts_of_type(&self, alert_type: AlertType) -> Result<Vec<Alert>, LaikaError> {
        self.db
            .call(move |conn| alerts::list_by_type(conn, alert_type))
            .await
    }
}
