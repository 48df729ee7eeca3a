// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-side records that have no home in `laika-core`.
//!
//! The domain types themselves live in `laika_core::model` and are re-exported
//! here for convenience within the storage crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use laika_core::model::{
    ActionItem, Alert, AlertReference, Attachment, Audit, Comment, ConnectionAccount,
    LaikaObject, Mention, Organization, Reply, User,
};
use laika_core::types::{AuthKind, EvidenceStatus, Vendor};

/// A row of the background task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

/// What an upsert did to the laika-object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResult {
    pub outcome: UpsertOutcome,
    pub object_id: String,
}

/// Encrypted credential row. Secrets stay inside `ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRow {
    pub connection_id: String,
    pub vendor: Vendor,
    pub auth_kind: AuthKind,
    pub subdomain: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub regions: Vec<String>,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub organization_id: String,
    pub audit_id: String,
    pub name: String,
    pub status: EvidenceStatus,
}

/// Everything a delivery channel needs to render one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertView {
    pub alert: Alert,
    pub reference: AlertReference,
    pub receiver: User,
    pub sender: Option<User>,
    pub company_name: String,
    /// Comment the alert's comment or reply reference belongs to.
    pub comment: Option<Comment>,
    pub reply: Option<Reply>,
    /// Display name of the comment's attachment (control name, evidence name...).
    pub entity_name: Option<String>,
    pub audit: Option<Audit>,
    pub action_item: Option<ActionItem>,
    pub quantity: Option<i64>,
    /// Lower-cased e-mail to display name for every mention in the content.
    pub mention_names: HashMap<String, String>,
}

impl AlertView {
    /// Text the alert is about: the reply when there is one, else the comment.
    pub fn content(&self) -> Option<&str> {
        self.reply
            .as_ref()
            .map(|r| r.content.as_str())
            .or_else(|| self.comment.as_ref().map(|c| c.content.as_str()))
    }

    /// Content with `@(email)` rewritten to `@Display Name`.
    pub fn rendered_content(&self) -> Option<String> {
        self.content().map(|c| {
            laika_core::mention::rewrite_mentions(c, |email| self.mention_names.get(email).cloned())
        })
    }

    pub fn sender_name(&self) -> &str {
        &self.alert.sender_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchpadRecordKind {
    Comment,
    Reply,
    Mention,
}

/// One comment, reply, or mention attached to a control, evidence, or draft
/// report, with the joined facts the launchpad filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchpadRecord {
    pub kind: LaunchpadRecordKind,
    pub id: String,
    pub comment_id: String,
    pub content: String,
    pub attachment: Attachment,
    pub attachment_name: String,
    pub audit_id: Option<String>,
    pub evidence_status: Option<EvidenceStatus>,
    pub audit_completed: bool,
    pub owner_name: String,
    pub mentioned_name: Option<String>,
    pub deleted: bool,
    pub parent_deleted: bool,
    pub created_at: DateTime<Utc>,
}
