// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Launchpad: one searchable catalogue of the comments, replies, and mentions
//! attached to controls, evidence requests, and draft reports.

pub mod entry;

pub use entry::{LaunchpadEntry, Party, map_record};

use laika_core::LaikaError;
use laika_storage::Database;
use laika_storage::queries::launchpad;
use rusqlite::Connection;
use tracing::debug;

/// Every visible entry of an organization, oldest first.
pub fn collect(conn: &Connection, organization_id: &str) -> Result<Vec<LaunchpadEntry>, LaikaError> {
    let mut records = launchpad::list_comment_records(conn, organization_id)?;
    records.extend(launchpad::list_reply_records(conn, organization_id)?);
    records.extend(launchpad::list_mention_records(conn, organization_id)?);

    let mut entries: Vec<LaunchpadEntry> = records.into_iter().filter_map(map_record).collect();
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(entries)
}

#[derive(Debug, Clone)]
pub struct Launchpad {
    db: Database,
}

impl Launchpad {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn index(&self, organization_id: &str) -> Result<Vec<LaunchpadEntry>, LaikaError> {
        let org = organization_id.to_string();
        let entries = self.db.call(move |conn| collect(conn, &org)).await?;
        debug!(organization_id, entries = entries.len(), "launchpad indexed");
        Ok(entries)
    }

    /// Entries whose name or description contains `query`, ignoring case.
    /// A blank query returns the whole index.
    pub async fn search(
        &self,
        organization_id: &str,
        query: &str,
    ) -> Result<Vec<LaunchpadEntry>, LaikaError> {
        let needle = query.trim().to_lowercase();
        let mut entries = self.index(organization_id).await?;
        if !needle.is_empty() {
            entries.retain(|entry| entry.matches(&needle));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use laika_core::{
        Attachment, Audit, AuditStage, Comment, CommentState, DiscoveryState, EvidenceStatus,
        Mention, MentionTarget, Organization, Reply, Role, User, UserPreferences,
    };
    use laika_storage::LaunchpadRecordKind;
    use laika_storage::queries::{audits, comments, entities, organizations, users};

    fn user(id: &str, email: &str, first: &str, last: &str) -> User {
        User {
            id: id.into(),
            organization_id: "o1".into(),
            email: email.into(),
            first_name: first.into(),
            last_name: last.into(),
            role: Role::OrganizationMember,
            preferences: UserPreferences::default(),
            discovery_state: DiscoveryState::Confirmed,
            employment_type: None,
            is_active: true,
            date_joined: Utc::now(),
        }
    }

    fn comment(id: &str, attachment: Attachment, content: &str, minutes: i64) -> Comment {
        let at = Utc::now() - Duration::hours(1) + Duration::minutes(minutes);
        Comment {
            id: id.into(),
            organization_id: "o1".into(),
            owner_id: "ann".into(),
            content: content.into(),
            attachment,
            state: CommentState::Unresolved,
            resolved_by: None,
            resolved_at: None,
            is_deleted: false,
            created_at: at,
            updated_at: at,
        }
    }

    /// Control, open evidence, accepted evidence, a live audit, and a
    /// completed audit, each with one comment.
    fn seed(conn: &Connection) -> Result<(), LaikaError> {
        let now = Utc::now();
        organizations::insert_organization(
            conn,
            &Organization {
                id: "o1".into(),
                name: "Org".into(),
                created_at: now,
            },
        )?;
        users::insert_user(conn, &user("ann", "ann@x.com", "Ann", "Lee"))?;
        users::insert_user(conn, &user("bo", "bo@x.com", "Bo", "Ray"))?;
        for (id, completed) in [("au1", false), ("au2", true)] {
            audits::insert_audit(
                conn,
                &Audit {
                    id: id.into(),
                    organization_id: "o1".into(),
                    name: format!("SOC 2 {id}"),
                    audit_type: "SOC 2 Type 1".into(),
                    stage: AuditStage::Fieldwork,
                    completed_at: None,
                    created_at: now,
                },
            )?;
            if completed {
                audits::update_stage(conn, id, AuditStage::Completed, now)?;
            }
        }
        entities::insert_named(conn, entities::NamedTable::Control, "ctl", "o1", "Access Control", now)?;
        entities::insert_audit_entity(conn, entities::AuditTable::Evidence, "ev1", "o1", "au1", "Pen Test", now)?;
        entities::insert_audit_entity(conn, entities::AuditTable::Evidence, "ev2", "o1", "au1", "Backups", now)?;
        entities::set_evidence_status(conn, "ev2", EvidenceStatus::AuditorAccepted)?;

        comments::insert_comment(conn, &comment("c1", Attachment::Control("ctl".into()), "Review quarterly", 1))?;
        comments::insert_comment(conn, &comment("c2", Attachment::Evidence("ev1".into()), "Upload the report", 2))?;
        comments::insert_comment(conn, &comment("c3", Attachment::Evidence("ev2".into()), "Accepted already", 3))?;
        comments::insert_comment(conn, &comment("c4", Attachment::DraftReport("au1".into()), "Typo on page 2", 4))?;
        comments::insert_comment(conn, &comment("c5", Attachment::DraftReport("au2".into()), "Old report", 5))?;

        let at = now - Duration::minutes(30);
        comments::insert_reply(
            conn,
            &Reply {
                id: "r1".into(),
                comment_id: "c1".into(),
                owner_id: "bo".into(),
                content: "On it".into(),
                is_deleted: false,
                created_at: at,
                updated_at: at,
            },
        )?;
        comments::insert_mention(
            conn,
            &Mention {
                id: "m1".into(),
                user_id: "bo".into(),
                target: MentionTarget::Comment("c2".into()),
                created_at: at + Duration::minutes(1),
            },
        )?;
        Ok(())
    }

    async fn launchpad() -> Launchpad {
        let db = Database::open_in_memory().await.unwrap();
        db.call(|conn| seed(conn)).await.unwrap();
        Launchpad::new(db)
    }

    #[tokio::test]
    async fn index_applies_every_exclusion() {
        let pad = launchpad().await;
        let entries = pad.index("o1").await.unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c4", "r1", "m1"]);

        let mention = &entries[4];
        assert_eq!(mention.kind, LaunchpadRecordKind::Mention);
        assert_eq!(mention.party, Party::Mention("Bo Ray".into()));
        assert_eq!(mention.description, "Upload the report");
        assert_eq!(mention.url, "/audits/au1/evidence-detail/ev1?activeTab=Comments");

        assert!(pad.index("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_on_name_and_description() {
        let pad = launchpad().await;

        let by_name = pad.search("o1", "ACCESS").await.unwrap();
        let ids: Vec<&str> = by_name.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c1", "r1"]);

        let by_description = pad.search("o1", "typo").await.unwrap();
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].url, "/audits/au1?activeKey=Draft%20Report");

        assert_eq!(pad.search("o1", "  ").await.unwrap().len(), 5);
        assert!(pad.search("o1", "accepted").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_comment_hides_its_thread() {
        let pad = launchpad().await;
        pad.db
            .call(|conn| comments::soft_delete_comment(conn, "c1", Utc::now()))
            .await
            .unwrap();
        let ids: Vec<String> = pad.index("o1").await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["c2", "c4", "m1"]);
    }
}
