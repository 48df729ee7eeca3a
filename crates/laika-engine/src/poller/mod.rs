// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunked, resumable polling of connection accounts.
//!
//! One run walks the connector's scopes in order, persisting every page in
//! its own transaction. When the [`ChunkBudget`] runs out or the process is
//! cancelled the position is stored as a [`PollCursor`] and the next run
//! continues from it. A run that reaches the end moves `since` to the moment
//! the (possibly interrupted) run started.

pub mod ingest;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use laika_config::model::PollingConfig;
use laika_connectors::{ChunkBudget, Connector, ConnectorRegistry, ConnectorSession, PullStream, Record};
use laika_core::{BatchResult, ConnectionAccount, LaikaError, PollCursor};
use laika_http::{AccessSecret, HttpClient, IntegrationContext};
use laika_storage::Database;
use laika_storage::queries::connections;
use laika_vault::CredentialVault;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::bus::EventBus;
use crate::correlation::people_discovery_event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Complete,
    Partial,
}

/// Outcome of one run against one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub connection_id: String,
    pub status: PollStatus,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Events dispatched, correlation follow-ups included.
    pub events: usize,
    pub people_created: usize,
    pub failed_scopes: Vec<String>,
}

impl PollReport {
    fn new(connection_id: &str) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            status: PollStatus::Complete,
            created: 0,
            updated: 0,
            unchanged: 0,
            events: 0,
            people_created: 0,
            failed_scopes: Vec::new(),
        }
    }

    fn absorb(&mut self, page: ingest::PageIngest) {
        self.created += page.created;
        self.updated += page.updated;
        self.unchanged += page.unchanged;
        self.people_created += page.people_created;
        self.events += page.dispatched.events.len();
    }
}

pub struct PollRunner {
    db: Database,
    bus: EventBus,
    registry: Arc<ConnectorRegistry>,
    vault: Arc<CredentialVault>,
    http: HttpClient,
    config: PollingConfig,
}

impl std::fmt::Debug for PollRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollRunner")
            .field("vendors", &self.registry.vendors())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PollRunner {
    pub fn new(
        db: Database,
        bus: EventBus,
        registry: Arc<ConnectorRegistry>,
        vault: Arc<CredentialVault>,
        http: HttpClient,
        config: PollingConfig,
    ) -> Self {
        Self {
            db,
            bus,
            registry,
            vault,
            http,
            config,
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    fn budget(&self) -> ChunkBudget {
        ChunkBudget::new(self.config.chunk_max_records, self.config.chunk_max_pages)
    }

    fn since_for(&self, account: &ConnectionAccount, now: DateTime<Utc>) -> DateTime<Utc> {
        account
            .since
            .or_else(|| account.settings_since())
            .unwrap_or_else(|| now - chrono::Duration::days(self.config.initial_lookback_days))
    }

    async fn load_account(&self, connection_id: &str) -> Result<ConnectionAccount, LaikaError> {
        let id = connection_id.to_string();
        self.db
            .call(move |conn| connections::get_connection(conn, &id))
            .await?
            .ok_or_else(|| LaikaError::NotFound {
                resource: format!("connection account {connection_id}"),
            })
    }

    /// Cheapest authenticated call against the vendor. Nothing is stored.
    #[instrument(skip(self, account, cancel), fields(connection = %account.id, vendor = %account.vendor))]
    pub async fn test_connection(
        &self,
        account: &ConnectionAccount,
        cancel: &CancellationToken,
    ) -> Result<(), LaikaError> {
        let connector = self.registry.get(account.vendor)?;
        let secret = self.vault.ensure_fresh(&account.id, cancel).await?;
        let mut ctx = IntegrationContext::new(account.vendor.to_string(), account.id.clone());
        let mut session = ConnectorSession {
            http: &self.http,
            ctx: &mut ctx,
            secret: &secret,
            settings: &account.settings,
            cancel,
        };
        connector.test_credentials(&mut session).await
    }

    /// Poll one connection until its scopes are exhausted or the budget is
    /// spent.
    #[instrument(skip(self, cancel))]
    pub async fn poll_connection(
        &self,
        connection_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PollReport, LaikaError> {
        let account = self.load_account(connection_id).await?;
        let connector = self.registry.get(account.vendor)?;
        let secret = self.vault.ensure_fresh(&account.id, cancel).await?;

        let now = Utc::now().trunc_subsecs(3);
        let resume = account.cursor.clone().unwrap_or_default();
        let earlier_people = resume.people_created;
        let run_started = resume.run_started_at.unwrap_or(now);
        let since = self.since_for(&account, now);
        let mut ctx = IntegrationContext::new(account.vendor.to_string(), account.id.clone());
        let mut report = PollReport::new(&account.id);

        let outcome = self
            .pull_scopes(
                connector.as_ref(),
                &account,
                &secret,
                &mut ctx,
                since,
                resume,
                run_started,
                cancel,
                &mut report,
            )
            .await;
        let metrics = ctx.to_metrics();
        let id = account.id.clone();

        match outcome {
            Ok(None) => {
                let next_since = if report.failed_scopes.is_empty() {
                    run_started
                } else {
                    account.since.unwrap_or(since)
                };
                self.db
                    .call(move |conn| {
                        connections::update_after_poll(conn, &id, next_since, &metrics, Utc::now())
                    })
                    .await?;
                if earlier_people + report.people_created > 0 {
                    report.events += self.announce_people(&account.organization_id).await?;
                }
                info!(
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    failed_scopes = report.failed_scopes.len(),
                    "poll complete"
                );
            }
            Ok(Some(cursor)) => {
                report.status = PollStatus::Partial;
                self.db
                    .call(move |conn| {
                        connections::save_cursor(conn, &id, &cursor, &metrics, Utc::now())
                    })
                    .await?;
                info!(created = report.created, "poll paused, cursor saved");
            }
            Err(e) => {
                if e.is_auth_failure() {
                    let message = e.to_string();
                    self.db
                        .call(move |conn| connections::mark_error(conn, &id, &message, Utc::now()))
                        .await?;
                }
                warn!(error = %e, "poll failed");
                return Err(e);
            }
        }
        Ok(report)
    }

    /// Walk the scopes. Returns the cursor to persist when the run stops
    /// early, `None` once every scope was visited.
    #[allow(clippy::too_many_arguments)]
    async fn pull_scopes(
        &self,
        connector: &dyn Connector,
        account: &ConnectionAccount,
        secret: &AccessSecret,
        ctx: &mut IntegrationContext,
        since: DateTime<Utc>,
        resume: PollCursor,
        run_started: DateTime<Utc>,
        cancel: &CancellationToken,
        report: &mut PollReport,
    ) -> Result<Option<PollCursor>, LaikaError> {
        let mut session = ConnectorSession {
            http: &self.http,
            ctx,
            secret,
            settings: &account.settings,
            cancel,
        };
        let mut scopes = connector.discover_scope(&mut session).await?;
        if let Some(selected) = account.selected_scopes() {
            scopes.retain(|scope| selected.contains(&scope.id));
        }

        let earlier_people = resume.people_created;
        let mut completed = resume.completed_scopes;
        let mut budget = self.budget();
        let paused = |completed: &[String], scope_id: &str, cursor, people: usize| PollCursor {
            completed_scopes: completed.to_vec(),
            scope_id: Some(scope_id.to_string()),
            cursor,
            run_started_at: Some(run_started),
            people_created: earlier_people + people,
        };

        for scope in scopes {
            if completed.contains(&scope.id) {
                continue;
            }
            let cursor = if resume.scope_id.as_deref() == Some(scope.id.as_str()) {
                resume.cursor.clone()
            } else {
                None
            };
            if budget.is_spent() || cancel.is_cancelled() {
                return Ok(Some(paused(&completed, &scope.id, cursor, report.people_created)));
            }

            let mut stream = PullStream::new(connector, scope.clone(), Some(since), cursor, budget);
            let pulled = loop {
                if cancel.is_cancelled() {
                    break Err(LaikaError::Cancelled);
                }
                match stream.next_page(&mut session).await {
                    Ok(Some(page)) => self.persist(account, page.records, report).await?,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };
            budget = budget.after(stream.records_fetched(), stream.pages_fetched());

            match pulled {
                Ok(()) if stream.is_exhausted() => completed.push(scope.id),
                Ok(()) | Err(LaikaError::Cancelled) => {
                    return Ok(Some(paused(
                        &completed,
                        &scope.id,
                        stream.resume_cursor().cloned(),
                        report.people_created,
                    )));
                }
                Err(LaikaError::NotFound { resource }) => {
                    warn!(scope = %scope.id, %resource, "scope not found, skipped");
                    completed.push(scope.id);
                }
                Err(e) if e.is_auth_failure() => return Err(e),
                Err(e) => {
                    warn!(scope = %scope.id, error = %e, "scope failed");
                    report.failed_scopes.push(scope.id);
                }
            }
        }
        Ok(None)
    }

    async fn persist(
        &self,
        account: &ConnectionAccount,
        records: Vec<Record>,
        report: &mut PollReport,
    ) -> Result<(), LaikaError> {
        if records.is_empty() {
            return Ok(());
        }
        let bus = self.bus.clone();
        let organization_id = account.organization_id.clone();
        let connection_id = account.id.clone();
        let page = self
            .db
            .transaction(move |tx| {
                ingest::persist_page(tx, &bus, &organization_id, &connection_id, records, Utc::now())
            })
            .await?;
        report.absorb(page);
        Ok(())
    }

    async fn announce_people(&self, organization_id: &str) -> Result<usize, LaikaError> {
        let bus = self.bus.clone();
        let organization_id = organization_id.to_string();
        self.db
            .transaction(move |tx| {
                let now = Utc::now();
                match people_discovery_event(tx, &organization_id, now)? {
                    Some(event) => Ok(bus.dispatch(tx, vec![event], now)?.events.len()),
                    None => Ok(0),
                }
            })
            .await
    }

    /// Poll every connection not in error. Partial runs count as neither
    /// success nor failure.
    pub async fn poll_tick(&self, cancel: &CancellationToken) -> Result<BatchResult, LaikaError> {
        let accounts = self.db.call(|conn| connections::list_pollable(conn)).await?;
        let mut result = BatchResult::default();
        for account in accounts {
            if cancel.is_cancelled() {
                break;
            }
            match self.poll_connection(&account.id, cancel).await {
                Ok(report) if report.status == PollStatus::Complete => result.record_success(),
                Ok(_) => {}
                Err(e) => {
                    warn!(connection = %account.id, error = %e, "connection poll failed");
                    result.record_failure(account.id);
                }
            }
        }
        Ok(result)
    }

    /// Tick every `interval_secs` until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancel.cancelled() => {
                    info!("poll scheduler shutting down");
                    return;
                }
            }
            match self.poll_tick(&cancel).await {
                Ok(result) => info!(
                    complete = result.success_count,
                    failed = result.failed_ids.len(),
                    "poll tick finished"
                ),
                Err(e) => warn!(error = %e, "poll tick failed"),
            }
        }
    }
}
