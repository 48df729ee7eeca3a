// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel queue consumers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use laika_core::{EmailSender, LaikaError, SlackSender, WebsocketPublisher};
use laika_storage::queries::{alert_views, queue};
use laika_storage::{AlertView, Database, QueueEntry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::render::{Links, email::render_email, slack::render_slack, websocket::render_frame};
use crate::router::{Channel, DeliveryJob};

/// How often a running worker puts expired `processing` jobs back.
pub const RECLAIM_EVERY: Duration = Duration::from_secs(60);

/// The three outbound sinks.
#[derive(Clone)]
pub struct DeliverySinks {
    pub websocket: Arc<dyn WebsocketPublisher>,
    pub email: Arc<dyn EmailSender>,
    pub slack: Arc<dyn SlackSender>,
}

impl std::fmt::Debug for DeliverySinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliverySinks").finish_non_exhaustive()
    }
}

/// What one pass over a queue did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub delivered: usize,
    pub failed: usize,
    pub dropped: usize,
}

impl DrainStats {
    pub fn processed(&self) -> usize {
        self.delivered + self.failed + self.dropped
    }
}

enum JobOutcome {
    Delivered,
    Failed(String),
    Dropped,
}

/// Consumes one channel's queue.
#[derive(Debug, Clone)]
pub struct DeliveryWorker {
    db: Database,
    channel: Channel,
    sinks: DeliverySinks,
    links: Links,
    from: String,
    idle: Duration,
}

impl DeliveryWorker {
    pub fn new(
        db: Database,
        channel: Channel,
        sinks: DeliverySinks,
        links: Links,
        from: impl Into<String>,
    ) -> Self {
        Self {
            db,
            channel,
            sinks,
            links,
            from: from.into(),
            idle: Duration::from_millis(500),
        }
    }

    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Process jobs until the queue is empty. Each job is attempted at most
    /// once per pass; failures, including jobs whose processing errored, are
    /// released back to the queue at the end.
    pub async fn drain_once(&self) -> Result<DrainStats, LaikaError> {
        let mut stats = DrainStats::default();
        let mut failures = Vec::new();
        let drained = loop {
            let entry = match queue::dequeue(&self.db, self.channel.queue_name()).await {
                Ok(Some(entry)) => entry,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            let id = entry.id;
            match self.process(entry).await {
                Ok(JobOutcome::Delivered) => stats.delivered += 1,
                Ok(JobOutcome::Failed(error)) => failures.push((id, error)),
                Ok(JobOutcome::Dropped) => stats.dropped += 1,
                Err(e) => {
                    warn!(channel = %self.channel, job_id = id, error = %e, "delivery job errored");
                    failures.push((id, e.to_string()));
                }
            }
        };
        for (id, error) in &failures {
            queue::fail(&self.db, *id, error).await?;
        }
        drained?;
        stats.failed = failures.len();
        if stats.processed() > 0 {
            debug!(channel = %self.channel, ?stats, "queue drained");
        }
        Ok(stats)
    }

    /// Drain, then sleep `idle` between empty passes until cancelled. Expired
    /// `processing` locks are reclaimed every [`RECLAIM_EVERY`].
    pub async fn run(self, cancel: CancellationToken) {
        info!(channel = %self.channel, "delivery worker started");
        let mut last_reclaim = Instant::now();
        loop {
            if last_reclaim.elapsed() >= RECLAIM_EVERY {
                last_reclaim = Instant::now();
                match queue::requeue_stale(&self.db).await {
                    Ok(0) => {}
                    Ok(n) => info!(channel = %self.channel, requeued = n, "reclaimed stale jobs"),
                    Err(e) => warn!(channel = %self.channel, error = %e, "stale job reclaim failed"),
                }
            }
            let busy = match self.drain_once().await {
                Ok(stats) => stats.delivered + stats.dropped > 0,
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "delivery pass failed");
                    false
                }
            };
            if busy {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.idle) => {}
                _ = cancel.cancelled() => {
                    info!(channel = %self.channel, "delivery worker shutting down");
                    break;
                }
            }
        }
    }

    #[instrument(skip_all, fields(channel = %self.channel, job_id = entry.id))]
    async fn process(&self, entry: QueueEntry) -> Result<JobOutcome, LaikaError> {
        let job: DeliveryJob = match serde_json::from_str(&entry.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "dropping malformed delivery job");
                queue::ack(&self.db, entry.id).await?;
                return Ok(JobOutcome::Dropped);
            }
        };

        let alert_id = job.alert_id.clone();
        let view = self
            .db
            .call(move |conn| alert_views::load_alert_view(conn, &alert_id))
            .await?;
        let Some(view) = view else {
            warn!(alert_id = %job.alert_id, "alert is gone, dropping delivery job");
            queue::ack(&self.db, entry.id).await?;
            return Ok(JobOutcome::Dropped);
        };

        match self.deliver(&view).await {
            Ok(()) => {
                queue::ack(&self.db, entry.id).await?;
                debug!(alert_id = %job.alert_id, "delivered");
                Ok(JobOutcome::Delivered)
            }
            Err(e) => {
                warn!(
                    alert_id = %job.alert_id,
                    attempt = entry.attempts + 1,
                    max_attempts = entry.max_attempts,
                    error = %e,
                    "delivery failed"
                );
                Ok(JobOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn deliver(&self, view: &AlertView) -> Result<(), LaikaError> {
        match self.channel {
            Channel::Websocket => self.sinks.websocket.publish(&render_frame(view)).await,
            Channel::Email => {
                self.sinks
                    .email
                    .send(&render_email(view, &self.links, &self.from))
                    .await
            }
            Channel::Slack => {
                self.sinks
                    .slack
                    .post(
                        &view.receiver.organization_id,
                        &view.receiver.email,
                        &render_slack(view, &self.links),
                    )
                    .await
            }
        }
    }
}

/// One worker per channel, sharing the sinks.
pub fn workers(
    db: &Database,
    sinks: &DeliverySinks,
    links: &Links,
    from: &str,
    idle: Duration,
) -> Vec<DeliveryWorker> {
    Channel::ALL
        .iter()
        .map(|channel| {
            DeliveryWorker::new(db.clone(), *channel, sinks.clone(), links.clone(), from)
                .with_idle(idle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::DeliveryRouter;
    use crate::testing::{Recording, seed_mention};
    use laika_config::model::UrlsConfig;
    use laika_core::AlertPreference;

    fn worker(db: &Database, channel: Channel, sinks: &Recording) -> DeliveryWorker {
        DeliveryWorker::new(
            db.clone(),
            channel,
            sinks.sinks(),
            Links::new(&UrlsConfig::default()),
            "no-reply@heylaika.com",
        )
    }

    #[tokio::test]
    async fn immediate_mention_goes_out_on_websocket_and_email() {
        let db = Database::open_in_memory().await.unwrap();
        let alert_id = seed_mention(&db, AlertPreference::Immediately).await;
        let router = DeliveryRouter::default();
        let id = alert_id.clone();
        let channels = db
            .call(move |conn| {
                let (alert, _) = laika_storage::queries::alerts::get_alert(conn, &id)?.unwrap();
                let receiver = laika_storage::queries::users::get_user(conn, &alert.receiver_id)?.unwrap();
                router.route_in(conn, &alert, &receiver)
            })
            .await
            .unwrap();
        assert_eq!(channels, vec![Channel::Websocket, Channel::Email]);

        let sinks = Recording::default();
        for channel in channels {
            let stats = worker(&db, channel, &sinks).drain_once().await.unwrap();
            assert_eq!(stats.delivered, 1);
        }

        let frames = sinks.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].room_id, "o1");
        let emails = sinks.emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].to, "a@x.com");
        assert_eq!(emails[0].subject, "B mentioned you in a comment in Ctl-1.");
    }

    #[tokio::test]
    async fn failures_retry_until_max_attempts() {
        let db = Database::open_in_memory().await.unwrap();
        let alert_id = seed_mention(&db, AlertPreference::Immediately).await;
        let payload = serde_json::to_string(&DeliveryJob { alert_id }).unwrap();
        db.call(move |conn| queue::enqueue_in(conn, "delivery.email", &payload, 2))
            .await
            .unwrap();

        let sinks = Recording::failing_email();
        let worker = worker(&db, Channel::Email, &sinks);
        assert_eq!(worker.drain_once().await.unwrap().failed, 1);
        assert_eq!(worker.drain_once().await.unwrap().failed, 1);
        assert_eq!(worker.drain_once().await.unwrap().processed(), 0);

        let entries = db
            .call(|conn| queue::list_queue(conn, "delivery.email"))
            .await
            .unwrap();
        assert_eq!(entries[0].status, "failed");
        assert_eq!(entries[0].attempts, 2);
    }

    #[tokio::test]
    async fn erroring_job_is_released_and_the_pass_continues() {
        let db = Database::open_in_memory().await.unwrap();
        let broken = seed_mention(&db, AlertPreference::Immediately).await;
        let id = broken.clone();
        db.call(move |conn| {
            conn.execute(
                "UPDATE alerts SET alert_type = 'not_a_type' WHERE id = ?1",
                rusqlite::params![id],
            )?;
            Ok(())
        })
        .await
        .unwrap();
        let payload = serde_json::to_string(&DeliveryJob { alert_id: broken }).unwrap();
        db.call(move |conn| queue::enqueue_in(conn, "delivery.websocket", &payload, 3))
            .await
            .unwrap();
        let gone = serde_json::to_string(&DeliveryJob {
            alert_id: "gone".into(),
        })
        .unwrap();
        db.call(move |conn| queue::enqueue_in(conn, "delivery.websocket", &gone, 3))
            .await
            .unwrap();

        let sinks = Recording::default();
        let stats = worker(&db, Channel::Websocket, &sinks).drain_once().await.unwrap();
        assert_eq!((stats.failed, stats.dropped), (1, 1));

        let entries = db
            .call(|conn| queue::list_queue(conn, "delivery.websocket"))
            .await
            .unwrap();
        assert_eq!(entries[0].status, "pending");
        assert_eq!(entries[0].attempts, 1);
        assert!(entries[0].last_error.is_some());
    }

    #[tokio::test]
    async fn missing_alerts_are_dropped() {
        let db = Database::open_in_memory().await.unwrap();
        let payload = serde_json::to_string(&DeliveryJob {
            alert_id: "gone".into(),
        })
        .unwrap();
        db.call(move |conn| queue::enqueue_in(conn, "delivery.websocket", &payload, 3))
            .await
            .unwrap();
        let sinks = Recording::default();
        let stats = worker(&db, Channel::Websocket, &sinks).drain_once().await.unwrap();
        assert_eq!(stats.dropped, 1);
        assert!(sinks.frames().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let db = Database::open_in_memory().await.unwrap();
        let sinks = Recording::default();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            worker(&db, Channel::Slack, &sinks)
                .with_idle(Duration::from_millis(10))
                .run(cancel.clone()),
        );
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
