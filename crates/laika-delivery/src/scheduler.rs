// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron-driven digest loop.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use croner::Cron;
use laika_core::LaikaError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::digest::DigestRunner;

pub struct DigestScheduler {
    runner: DigestRunner,
    schedule: Cron,
    expression: String,
}

impl std::fmt::Debug for DigestScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestScheduler")
            .field("schedule", &self.expression)
            .finish_non_exhaustive()
    }
}

impl DigestScheduler {
    pub fn new(runner: DigestRunner, expression: &str) -> Result<Self, LaikaError> {
        let schedule = Cron::from_str(expression).map_err(|e| {
            LaikaError::Config(format!("invalid digest schedule `{expression}`: {e}"))
        })?;
        Ok(Self {
            runner,
            schedule,
            expression: expression.to_string(),
        })
    }

    /// First fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, LaikaError> {
        self.schedule
            .find_next_occurrence(&now, false)
            .map_err(|e| LaikaError::Internal(format!("digest schedule has no next run: {e}")))
    }

    /// Sleep until each fire time and run the digest for the window ending
    /// there. Returns when `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(schedule = %self.expression, "digest scheduler started");
        loop {
            let now = Utc::now();
            let next = match self.next_after(now) {
                Ok(next) => next,
                Err(e) => {
                    warn!(error = %e, "digest scheduler stopping");
                    return;
                }
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => {
                    info!("digest scheduler shutting down");
                    return;
                }
            }
            match self.runner.run(next).await {
                Ok(result) => info!(
                    sent = result.success_count,
                    failed = result.failed_ids.len(),
                    missed = result.missed_users.len(),
                    "scheduled digest finished"
                ),
                Err(e) => warn!(error = %e, "scheduled digest failed"),
            }
        }
    }
}
