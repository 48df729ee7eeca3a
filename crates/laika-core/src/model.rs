// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain records as they cross crate boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::alert_type::ReferenceKind;
use crate::error::LaikaError;
use crate::types::{
    AlertPreference, AuditStage, CommentState, ConnectionStatus, DiscoveryState, ObjectType,
    Role, Vendor,
};

/// Well-known keys inside [`LaikaObject::data`].
pub mod fields {
    pub const ID: &str = "Id";
    pub const FIRST_NAME: &str = "First Name";
    pub const LAST_NAME: &str = "Last Name";
    pub const EMAIL: &str = "Email";
    pub const LINK_TO_PEOPLE_TABLE: &str = "Link to People Table";
}

/// Sender name recorded for alerts nobody in particular caused.
pub const SYSTEM_SENDER_NAME: &str = "Laika";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilePreferences {
    pub alerts: AlertPreference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub profile: ProfilePreferences,
}

impl UserPreferences {
    pub fn with_alerts(alerts: AlertPreference) -> Self {
        Self {
            profile: ProfilePreferences { alerts },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub preferences: UserPreferences,
    pub discovery_state: DiscoveryState,
    pub employment_type: Option<String>,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// `"first last"`, falling back to the e-mail when both are blank.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    pub fn alert_preference(&self) -> AlertPreference {
        self.preferences.profile.alerts
    }
}

/// Discriminant of [`Attachment`], stored in `comments.attachment_kind`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Task,
    Control,
    Policy,
    Evidence,
    Requirement,
    Population,
    DraftReport,
}

/// The single entity a comment hangs off. `DraftReport` carries the audit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Attachment {
    Task(String),
    Control(String),
    Policy(String),
    Evidence(String),
    Requirement(String),
    Population(String),
    DraftReport(String),
}

impl Attachment {
    pub fn kind(&self) -> AttachmentKind {
        match self {
            Attachment::Task(_) => AttachmentKind::Task,
            Attachment::Control(_) => AttachmentKind::Control,
            Attachment::Policy(_) => AttachmentKind::Policy,
            Attachment::Evidence(_) => AttachmentKind::Evidence,
            Attachment::Requirement(_) => AttachmentKind::Requirement,
            Attachment::Population(_) => AttachmentKind::Population,
            Attachment::DraftReport(_) => AttachmentKind::DraftReport,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Attachment::Task(id)
            | Attachment::Control(id)
            | Attachment::Policy(id)
            | Attachment::Evidence(id)
            | Attachment::Requirement(id)
            | Attachment::Population(id)
            | Attachment::DraftReport(id) => id,
        }
    }

    pub fn from_parts(kind: AttachmentKind, id: String) -> Self {
        match kind {
            AttachmentKind::Task => Attachment::Task(id),
            AttachmentKind::Control => Attachment::Control(id),
            AttachmentKind::Policy => Attachment::Policy(id),
            AttachmentKind::Evidence => Attachment::Evidence(id),
            AttachmentKind::Requirement => Attachment::Requirement(id),
            AttachmentKind::Population => Attachment::Population(id),
            AttachmentKind::DraftReport => Attachment::DraftReport(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub organization_id: String,
    pub owner_id: String,
    pub content: String,
    pub attachment: Attachment,
    pub state: CommentState,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub comment_id: String,
    pub owner_id: String,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a mention points at. Exactly one of the two, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MentionTarget {
    Comment(String),
    Reply(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub user_id: String,
    pub target: MentionTarget,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub audit_type: String,
    pub stage: AuditStage,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub control_id: Option<String>,
    pub assignee_id: Option<String>,
    pub created_by: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub organization_id: String,
    pub created_at: DateTime<Utc>,
    pub alert_type: crate::alert_type::AlertType,
    pub sender_id: Option<String>,
    pub sender_name: String,
    pub receiver_id: String,
    pub viewed: bool,
}

/// Typed back-reference from an alert to the entity that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertReference {
    Comment { comment_id: String },
    Reply { reply_id: String },
    Subtask { action_item_id: String },
    Audit { audit_id: String },
    PeopleDiscovery { quantity: i64 },
    VendorDiscovery { quantity: i64 },
    AccessReview { access_review_id: String },
    BackgroundCheck {
        laika_object_id: Option<String>,
        user_id: Option<String>,
    },
    Training { training_id: String },
    Question { question_id: String },
    LibraryEntry { quantity: i64 },
}

impl AlertReference {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            AlertReference::Comment { .. } => ReferenceKind::CommentAlert,
            AlertReference::Reply { .. } => ReferenceKind::ReplyAlert,
            AlertReference::Subtask { .. } => ReferenceKind::SubtaskAlert,
            AlertReference::Audit { .. } => ReferenceKind::AuditAlert,
            AlertReference::PeopleDiscovery { .. } => ReferenceKind::PeopleDiscoveryAlert,
            AlertReference::VendorDiscovery { .. } => ReferenceKind::VendorDiscoveryAlert,
            AlertReference::AccessReview { .. } => ReferenceKind::AccessReviewAlert,
            AlertReference::BackgroundCheck { .. } => ReferenceKind::BackgroundCheckAlert,
            AlertReference::Training { .. } => ReferenceKind::TrainingAlert,
            AlertReference::Question { .. } => ReferenceKind::QuestionAlert,
            AlertReference::LibraryEntry { .. } => ReferenceKind::LibraryEntryAlert,
        }
    }
}

/// Normalized vendor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaikaObject {
    pub id: String,
    pub organization_id: String,
    pub object_type: ObjectType,
    pub connection_account_id: Option<String>,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LaikaObject {
    pub fn natural_id(&self) -> Option<&str> {
        self.data.get(fields::ID).and_then(|v| v.as_str())
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn is_linked_to_person(&self) -> bool {
        self.field_str(fields::LINK_TO_PEOPLE_TABLE)
            .is_some_and(|v| !v.trim().is_empty())
    }
}

/// Natural key of a record: `data["Id"]` rendered as a string.
///
/// Numeric ids are accepted and stringified; anything else is rejected.
pub fn natural_key(data: &serde_json::Map<String, serde_json::Value>) -> Result<String, LaikaError> {
    match data.get(fields::ID) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(LaikaError::Value(
            "laika object data has no usable \"Id\"".into(),
        )),
    }
}

/// Resume position of a paged pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cursor {
    /// Absolute URL of the next page (`Link: rel="next"`, `next_href`).
    Url(String),
    /// Opaque continuation token (`endCursor`, `next_cursor`).
    Token(String),
    /// Record offset (`startAt`).
    Offset(u64),
    /// Page number.
    Page(u32),
}

/// Where an interrupted poll picks up again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCursor {
    /// Scopes fully pulled during the interrupted run.
    pub completed_scopes: Vec<String>,
    /// Scope in progress and its next-page cursor.
    pub scope_id: Option<String>,
    pub cursor: Option<Cursor>,
    /// Start of the interrupted run; becomes `since` once it finishes.
    pub run_started_at: Option<DateTime<Utc>>,
    /// People created by the earlier chunks of the run.
    #[serde(default)]
    pub people_created: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAccount {
    pub id: String,
    pub organization_id: String,
    pub vendor: Vendor,
    pub status: ConnectionStatus,
    pub error_message: Option<String>,
    pub settings: serde_json::Value,
    pub since: Option<DateTime<Utc>>,
    pub cursor: Option<PollCursor>,
    pub metrics: serde_json::Value,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionAccount {
    /// Scope ids the user selected in settings, if any.
    pub fn selected_scopes(&self) -> Option<Vec<String>> {
        self.settings
            .get("scopes")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
    }

    /// Lower bound the user picked for the first poll.
    pub fn settings_since(&self) -> Option<DateTime<Utc>> {
        self.settings
            .get("since")
            .and_then(|v| v.as_str())
            .and_then(|s| crate::types::parse_ts(s).ok())
    }
}

/// Outcome of a batch flow (digest, bulk invite, poll).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub success_count: usize,
    pub failed_ids: Vec<String>,
    pub missed_users: Vec<String>,
}

impl BatchResult {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, id: impl Into<String>) {
        self.failed_ids.push(id.into());
    }

    pub fn record_missed(&mut self, user: impl Into<String>) {
        let user = user.into();
        if !self.missed_users.contains(&user) {
            self.missed_users.push(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn user(first: &str, last: &str, email: &str) -> User {
        User {
            id: "u1".into(),
            organization_id: "o1".into(),
            email: email.into(),
            first_name: first.into(),
            last_name: last.into(),
            role: Role::OrganizationMember,
            preferences: UserPreferences::default(),
            discovery_state: DiscoveryState::Confirmed,
            employment_type: None,
            is_active: true,
            date_joined: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(user("A", "Name", "a@x.com").display_name(), "A Name");
        assert_eq!(user("B", "", "b@x.com").display_name(), "B");
        assert_eq!(user(" ", "", "c@x.com").display_name(), "c@x.com");
    }

    #[test]
    fn missing_preferences_mean_immediately() {
        let prefs: UserPreferences = serde_json::from_value(json!({})).unwrap();
        assert_eq!(prefs.profile.alerts, AlertPreference::Immediately);
        let prefs: UserPreferences =
            serde_json::from_value(json!({"profile": {"alerts": "DAILY"}})).unwrap();
        assert_eq!(prefs.profile.alerts, AlertPreference::Daily);
    }

    #[test]
    fn attachment_parts_round_trip() {
        let a = Attachment::from_parts(AttachmentKind::DraftReport, "audit-1".into());
        assert_eq!(a.kind(), AttachmentKind::DraftReport);
        assert_eq!(a.id(), "audit-1");
        assert_eq!(AttachmentKind::DraftReport.to_string(), "draft_report");
    }

    #[test]
    fn natural_key_accepts_strings_and_numbers() {
        let data = json!({"Id": "PR-1"});
        assert_eq!(natural_key(data.as_object().unwrap()).unwrap(), "PR-1");
        let data = json!({"Id": 42});
        assert_eq!(natural_key(data.as_object().unwrap()).unwrap(), "42");
        let data = json!({"Id": ""});
        assert!(natural_key(data.as_object().unwrap()).is_err());
        let data = json!({"Name": "x"});
        assert!(natural_key(data.as_object().unwrap()).is_err());
    }

    #[test]
    fn batch_result_dedups_missed_users() {
        let mut r = BatchResult::default();
        r.record_missed("u1");
        r.record_missed("u1");
        r.record_failure("u2");
        assert_eq!(r.missed_users, vec!["u1".to_string()]);
        assert_eq!(r.failed_ids, vec!["u2".to_string()]);
    }

    #[test]
    fn connection_settings_helpers() {
        let now = Utc::now();
        let conn = ConnectionAccount {
            id: "c".into(),
            organization_id: "o".into(),
            vendor: Vendor::Jira,
            status: ConnectionStatus::Success,
            error_message: None,
            settings: json!({"scopes": ["PROJ", "OPS"], "since": "2026-01-01T00:00:00.000Z"}),
            since: None,
            cursor: None,
            metrics: json!({}),
            last_run_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            conn.selected_scopes(),
            Some(vec!["PROJ".to_string(), "OPS".to_string()])
        );
        assert_eq!(
            conn.settings_since(),
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );
    }
}
