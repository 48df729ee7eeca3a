// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily rollup e-mail for users who asked for `DAILY` alerts.
//!
//! Alerts from the last 24 hours (inclusive) are grouped four ways. Comment,
//! control and policy alerts share one `daily_digest` e-mail trimmed to
//! [`DIGEST_LIMIT`] items; audit and evidence alerts get one `audit_digest`
//! e-mail per audit. The digest never marks alerts, so a re-run inside the
//! same window sends the same mail.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use laika_core::{
    AlertFamily, AlertPreference, BatchResult, EmailMessage, EmailSender, LaikaError, User,
};
use laika_storage::queries::{alert_views, alerts, users};
use laika_storage::{AlertView, Database};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::render::email::subject_template;
use crate::render::{Links, Placeholders};

/// Items shown per digest e-mail.
pub const DIGEST_LIMIT: usize = 3;

pub const DAILY_DIGEST_SUBJECT: &str = "Your Laika daily digest";
pub const AUDIT_DIGEST_SUBJECT: &str = "Updates on your [AuditType] audit";

/// First `DIGEST_LIMIT` items.
pub fn trim_alerts<T: Clone>(items: &[T]) -> Vec<T> {
    items.iter().take(DIGEST_LIMIT).cloned().collect()
}

/// How many items the trimmed digest leaves out. Negative when there are
/// fewer than `DIGEST_LIMIT`.
pub fn calculate_surpass_alerts<T>(groups: &[&[T]]) -> i64 {
    let total: usize = groups.iter().map(|g| g.len()).sum();
    total as i64 - DIGEST_LIMIT as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestGroup {
    Comment,
    Control,
    Policy,
    Audit,
}

impl DigestGroup {
    pub fn of(view: &AlertView) -> Option<Self> {
        match view.alert.alert_type.family() {
            AlertFamily::Comments => Some(Self::Comment),
            AlertFamily::Controls => Some(Self::Control),
            AlertFamily::Policies => Some(Self::Policy),
            AlertFamily::Audits | AlertFamily::EvidenceComments => Some(Self::Audit),
            AlertFamily::Generic => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Comment => "Comments",
            Self::Control => "Controls",
            Self::Policy => "Policies",
            Self::Audit => "Audits",
        }
    }
}

/// One line of a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestItem {
    pub group: &'static str,
    pub alert_id: String,
    pub title: String,
    pub sender_name: String,
    pub content: String,
    pub url: String,
    pub created_at: String,
}

fn item(view: &AlertView, group: DigestGroup, links: &Links) -> DigestItem {
    let values = Placeholders::from_view(view, links);
    DigestItem {
        group: group.label(),
        alert_id: view.alert.id.clone(),
        title: values.fill(subject_template(view.alert.alert_type)),
        sender_name: values.user.clone(),
        content: values.comment.clone(),
        url: values.url,
        created_at: view.alert.created_at.format("%b %-d, %H:%M UTC").to_string(),
    }
}

/// A user's alerts sorted into digest groups, newest first.
#[derive(Debug, Default)]
pub struct GroupedAlerts {
    pub comment: Vec<DigestItem>,
    pub control: Vec<DigestItem>,
    pub policy: Vec<DigestItem>,
    /// Audit id to its items.
    pub audits: BTreeMap<String, (AuditInfo, Vec<DigestItem>)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditInfo {
    pub name: String,
    pub audit_type: String,
}

impl GroupedAlerts {
    pub fn build(views: &[AlertView], links: &Links) -> Self {
        let mut grouped = Self::default();
        for view in views {
            let Some(group) = DigestGroup::of(view) else {
                continue;
            };
            let entry = item(view, group, links);
            match group {
                DigestGroup::Comment => grouped.comment.push(entry),
                DigestGroup::Control => grouped.control.push(entry),
                DigestGroup::Policy => grouped.policy.push(entry),
                DigestGroup::Audit => {
                    let Some(audit) = &view.audit else {
                        continue;
                    };
                    grouped
                        .audits
                        .entry(audit.id.clone())
                        .or_insert_with(|| {
                            (
                                AuditInfo {
                                    name: audit.name.clone(),
                                    audit_type: audit.audit_type.clone(),
                                },
                                Vec::new(),
                            )
                        })
                        .1
                        .push(entry);
                }
            }
        }
        grouped
    }

    pub fn is_empty(&self) -> bool {
        self.comment.is_empty()
            && self.control.is_empty()
            && self.policy.is_empty()
            && self.audits.is_empty()
    }

    /// Non-audit items in display order.
    pub fn daily_items(&self) -> Vec<DigestItem> {
        self.comment
            .iter()
            .chain(&self.control)
            .chain(&self.policy)
            .cloned()
            .collect()
    }
}

fn daily_message(user: &User, company: &str, grouped: &GroupedAlerts, links: &Links, from: &str) -> EmailMessage {
    let items = grouped.daily_items();
    let additional = calculate_surpass_alerts(&[
        grouped.comment.as_slice(),
        grouped.control.as_slice(),
        grouped.policy.as_slice(),
    ]);
    EmailMessage {
        to: user.email.clone(),
        from: from.to_string(),
        subject: DAILY_DIGEST_SUBJECT.to_string(),
        template: "daily_digest".into(),
        context: json!({
            "receiver_name": user.display_name(),
            "company_name": company,
            "alerts": trim_alerts(&items),
            "additional_alerts": additional.max(0),
            "call_to_action_url": links.call_to_action(),
        }),
    }
}

fn audit_message(
    user: &User,
    company: &str,
    audit: &AuditInfo,
    items: &[DigestItem],
    links: &Links,
    from: &str,
) -> EmailMessage {
    let values = Placeholders {
        audit_type: audit.audit_type.clone(),
        ..Placeholders::default()
    };
    EmailMessage {
        to: user.email.clone(),
        from: from.to_string(),
        subject: values.fill(AUDIT_DIGEST_SUBJECT),
        template: "audit_digest".into(),
        context: json!({
            "receiver_name": user.display_name(),
            "company_name": company,
            "audit_name": audit.name,
            "audit_type": audit.audit_type,
            "alerts": trim_alerts(items),
            "additional_alerts": calculate_surpass_alerts(&[items]).max(0),
            "call_to_action_url": links.call_to_action(),
        }),
    }
}

/// Builds and sends every digest for one window.
#[derive(Clone)]
pub struct DigestRunner {
    db: Database,
    email: Arc<dyn EmailSender>,
    links: Links,
    from: String,
}

impl std::fmt::Debug for DigestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestRunner")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl DigestRunner {
    pub fn new(db: Database, email: Arc<dyn EmailSender>, links: Links, from: impl Into<String>) -> Self {
        Self {
            db,
            email,
            links,
            from: from.into(),
        }
    }

    async fn views_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<AlertView>, LaikaError> {
        let user_id = user_id.to_string();
        self.db
            .call(move |conn| {
                alerts::list_for_receiver_since(conn, &user_id, since)?
                    .into_iter()
                    .map(|(alert, reference)| alert_views::build_view(conn, alert, reference))
                    .collect()
            })
            .await
    }

    /// Send the digests of the window ending at `now`. One user's failure
    /// never stops the others.
    #[instrument(skip(self))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<BatchResult, LaikaError> {
        let since = now - Duration::days(1);
        let recipients = self
            .db
            .call(|conn| users::list_active_by_preference(conn, AlertPreference::Daily))
            .await?;

        let mut result = BatchResult::default();
        for user in &recipients {
            let views = match self.views_since(&user.id, since).await {
                Ok(views) => views,
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "could not load digest alerts");
                    result.record_failure(&user.id);
                    result.record_missed(&user.id);
                    continue;
                }
            };
            let grouped = GroupedAlerts::build(&views, &self.links);
            if grouped.is_empty() {
                info!(user_id = %user.id, "no alerts in the digest window");
                result.record_missed(&user.id);
                continue;
            }
            let company = views
                .first()
                .map(|v| v.company_name.clone())
                .unwrap_or_default();

            let mut messages = Vec::new();
            if !grouped.daily_items().is_empty() {
                messages.push(daily_message(user, &company, &grouped, &self.links, &self.from));
            }
            for (audit, items) in grouped.audits.values() {
                messages.push(audit_message(user, &company, audit, items, &self.links, &self.from));
            }

            let mut failed = false;
            for message in &messages {
                if let Err(e) = self.email.send(message).await {
                    warn!(user_id = %user.id, template = %message.template, error = %e, "digest send failed");
                    failed = true;
                } else {
                    result.record_success();
                }
            }
            if failed {
                result.record_failure(&user.id);
                result.record_missed(&user.id);
            }
        }
        info!(
            recipients = recipients.len(),
            sent = result.success_count,
            missed = result.missed_users.len(),
            "digest run finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recording, seed_alert, seed_base, seed_comment, seed_reply};
    use laika_config::model::UrlsConfig;
    use laika_core::{AlertReference, AlertType, Audit, AuditStage};
    use laika_storage::queries::audits;
    use proptest::prelude::*;

    #[test]
    fn trim_keeps_three() {
        assert_eq!(trim_alerts(&["a", "b", "c", "d", "e"]), vec!["a", "b", "c"]);
        assert_eq!(trim_alerts(&["a"]), vec!["a"]);
    }

    #[test]
    fn surpass_counts_across_groups() {
        let a = [1, 2];
        let b = [3, 4, 5];
        let c: [i32; 0] = [];
        assert_eq!(calculate_surpass_alerts(&[&a[..], &b[..], &c[..]]), 2);
        assert_eq!(calculate_surpass_alerts(&[&a[..]]), -1);
    }

    proptest! {
        #[test]
        fn trim_never_exceeds_limit(items in proptest::collection::vec(any::<u8>(), 0..20)) {
            let trimmed = trim_alerts(&items);
            prop_assert_eq!(trimmed.len(), items.len().min(DIGEST_LIMIT));
            prop_assert_eq!(&items[..trimmed.len()], &trimmed[..]);
        }

        #[test]
        fn surpass_plus_limit_is_the_total(
            a in proptest::collection::vec(any::<u8>(), 0..10),
            b in proptest::collection::vec(any::<u8>(), 0..10),
        ) {
            let surpass = calculate_surpass_alerts(&[a.as_slice(), b.as_slice()]);
            prop_assert_eq!(surpass + DIGEST_LIMIT as i64, (a.len() + b.len()) as i64);
        }
    }

    fn runner(db: &Database, sinks: &Recording) -> DigestRunner {
        DigestRunner::new(
            db.clone(),
            sinks.sinks().email,
            Links::new(&UrlsConfig::default()),
            "no-reply@heylaika.com",
        )
    }

    #[tokio::test]
    async fn daily_user_gets_one_digest_with_rewritten_content() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.call(move |conn| {
            seed_base(conn, AlertPreference::Daily);
            seed_comment(conn, "c1", "Hi @(a@x.com)");
            seed_alert(
                conn,
                AlertType::ControlMention,
                AlertReference::Comment {
                    comment_id: "c1".into(),
                },
                now - Duration::hours(2),
            );
            Ok(())
        })
        .await
        .unwrap();

        let sinks = Recording::default();
        let runner = runner(&db, &sinks);
        let result = runner.run(now).await.unwrap();
        assert_eq!(result.success_count, 1);
        assert!(result.missed_users.is_empty());

        let emails = sinks.emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].template, "daily_digest");
        assert_eq!(emails[0].context["alerts"][0]["content"], "Hi @A Name");
        assert_eq!(
            emails[0].context["call_to_action_url"],
            "http://localhost:3000/dashboard/?alertsOpen=true"
        );
        assert_eq!(emails[0].context["additional_alerts"], 0);

        runner.run(now).await.unwrap();
        let again = sinks.emails();
        assert_eq!(again.len(), 2);
        assert_eq!(again[0], again[1]);
    }

    #[tokio::test]
    async fn window_is_inclusive_and_older_alerts_are_ignored() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.call(move |conn| {
            seed_base(conn, AlertPreference::Daily);
            seed_comment(conn, "c1", "edge");
            seed_comment(conn, "c2", "stale");
            seed_alert(
                conn,
                AlertType::ControlMention,
                AlertReference::Comment {
                    comment_id: "c1".into(),
                },
                now - Duration::days(1),
            );
            seed_alert(
                conn,
                AlertType::ControlMention,
                AlertReference::Comment {
                    comment_id: "c2".into(),
                },
                now - Duration::days(1) - Duration::seconds(1),
            );
            Ok(())
        })
        .await
        .unwrap();

        let sinks = Recording::default();
        runner(&db, &sinks).run(now).await.unwrap();
        let emails = sinks.emails();
        let alerts = emails[0].context["alerts"].as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["content"], "edge");
    }

    #[tokio::test]
    async fn five_alerts_trim_to_three_and_report_the_rest() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.call(move |conn| {
            seed_base(conn, AlertPreference::Daily);
            for i in 0..5 {
                let comment_id = format!("c{i}");
                let reply_id = format!("r{i}");
                seed_comment(conn, &comment_id, "x");
                seed_reply(conn, &reply_id, &comment_id, "y");
                seed_alert(
                    conn,
                    AlertType::ControlReply,
                    AlertReference::Reply { reply_id },
                    now - Duration::minutes(i),
                );
            }
            Ok(())
        })
        .await
        .unwrap();

        let sinks = Recording::default();
        runner(&db, &sinks).run(now).await.unwrap();
        let ctx = &sinks.emails()[0].context;
        assert_eq!(ctx["alerts"].as_array().unwrap().len(), 3);
        assert_eq!(ctx["additional_alerts"], 2);
    }

    #[tokio::test]
    async fn audit_alerts_get_their_own_digest() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.call(move |conn| {
            seed_base(conn, AlertPreference::Daily);
            audits::insert_audit(
                conn,
                &Audit {
                    id: "au1".into(),
                    organization_id: "o1".into(),
                    name: "SOC 2 2026".into(),
                    audit_type: "SOC 2 Type 1".into(),
                    stage: AuditStage::Initiated,
                    completed_at: None,
                    created_at: now,
                },
            )?;
            seed_alert(
                conn,
                AlertType::AuditInitiated,
                AlertReference::Audit {
                    audit_id: "au1".into(),
                },
                now - Duration::minutes(5),
            );
            Ok(())
        })
        .await
        .unwrap();

        let sinks = Recording::default();
        let result = runner(&db, &sinks).run(now).await.unwrap();
        assert_eq!(result.success_count, 1);
        let emails = sinks.emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].template, "audit_digest");
        assert_eq!(emails[0].subject, "Updates on your SOC 2 Type 1 audit");
    }

    #[tokio::test]
    async fn quiet_users_and_send_failures_are_missed() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.call(|conn| {
            seed_base(conn, AlertPreference::Daily);
            Ok(())
        })
        .await
        .unwrap();
        let sinks = Recording::default();
        let result = runner(&db, &sinks).run(now).await.unwrap();
        assert_eq!(result.missed_users, vec!["a".to_string()]);
        assert!(result.failed_ids.is_empty());

        db.call(move |conn| {
            seed_comment(conn, "c1", "x");
            seed_alert(
                conn,
                AlertType::ControlMention,
                AlertReference::Comment {
                    comment_id: "c1".into(),
                },
                now,
            );
            Ok(())
        })
        .await
        .unwrap();
        let failing = Recording::failing_email();
        let result = runner(&db, &failing).run(now).await.unwrap();
        assert_eq!(result.failed_ids, vec!["a".to_string()]);
        assert_eq!(result.missed_users, vec!["a".to_string()]);
    }
}
