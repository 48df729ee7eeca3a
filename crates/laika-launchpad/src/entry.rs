// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning raw launchpad records into catalogue entries.

use chrono::{DateTime, Utc};
use laika_core::{Attachment, EvidenceStatus};
use laika_storage::{LaunchpadRecord, LaunchpadRecordKind};
use serde::Serialize;

/// Who an entry is about: the author of a comment or reply, or the person a
/// mention points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Owner(String),
    Mention(String),
}

/// One searchable line in the launchpad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchpadEntry {
    pub id: String,
    pub kind: LaunchpadRecordKind,
    pub attachment: Attachment,
    pub name: String,
    pub description: String,
    /// Relative to the web app root.
    pub url: String,
    #[serde(flatten)]
    pub party: Party,
    pub created_at: DateTime<Utc>,
}

impl LaunchpadEntry {
    /// Case-insensitive substring match on the name and description.
    /// `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.description.to_lowercase().contains(needle)
    }
}

fn control_url(id: &str) -> String {
    format!("/controls/{id}?activeTab=Comments")
}

fn evidence_url(audit_id: &str, id: &str) -> String {
    format!("/audits/{audit_id}/evidence-detail/{id}?activeTab=Comments")
}

fn draft_report_url(audit_id: &str) -> String {
    format!("/audits/{audit_id}?activeKey=Draft%20Report")
}

/// Link for a record, or `None` when its attachment is hidden from the
/// launchpad.
fn url_for(record: &LaunchpadRecord) -> Option<String> {
    match &record.attachment {
        Attachment::Control(id) => Some(control_url(id)),
        Attachment::Evidence(id) => {
            if record.evidence_status == Some(EvidenceStatus::AuditorAccepted) {
                return None;
            }
            record.audit_id.as_deref().map(|audit| evidence_url(audit, id))
        }
        Attachment::DraftReport(audit_id) => {
            (!record.audit_completed).then(|| draft_report_url(audit_id))
        }
        _ => None,
    }
}

fn is_removed(record: &LaunchpadRecord) -> bool {
    match record.kind {
        LaunchpadRecordKind::Comment => record.deleted,
        LaunchpadRecordKind::Reply | LaunchpadRecordKind::Mention => {
            record.deleted || record.parent_deleted
        }
    }
}

/// Map one record, applying every exclusion rule.
pub fn map_record(record: LaunchpadRecord) -> Option<LaunchpadEntry> {
    if is_removed(&record) {
        return None;
    }
    let url = url_for(&record)?;
    let party = match record.kind {
        LaunchpadRecordKind::Mention => Party::Mention(record.mentioned_name?),
        LaunchpadRecordKind::Comment | LaunchpadRecordKind::Reply => Party::Owner(record.owner_name),
    };
    Some(LaunchpadEntry {
        id: record.id,
        kind: record.kind,
        attachment: record.attachment,
        name: record.attachment_name,
        description: record.content,
        url,
        party,
        created_at: record.created_at,
    })
}
