// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed string enums shared across the workspace.
//!
//! All of these are persisted as text; the `Display`/`EnumString` forms are
//! the stored forms and must not change.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::LaikaError;

/// Internal user role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum Role {
    OrganizationAdmin,
    OrganizationMember,
    OrganizationViewer,
    SuperAdmin,
    Auditor,
    AuditorAdmin,
    Salesperson,
    Concierge,
}

impl Role {
    /// Roles that belong to an audit firm rather than the client organization.
    pub fn is_auditor(self) -> bool {
        matches!(self, Role::Auditor | Role::AuditorAdmin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::OrganizationAdmin | Role::SuperAdmin)
    }
}

/// `user_preferences.profile.alerts`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertPreference {
    #[default]
    Immediately,
    Daily,
    Never,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryState {
    New,
    #[default]
    Confirmed,
    Ignored,
}

/// Third-party vendor tags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Github,
    Gitlab,
    Bitbucket,
    Jira,
    Asana,
    Shortcut,
    Slack,
    Okta,
    Gsuite,
    Microsoft365,
    Aws,
    Gcp,
    Azure,
    Rippling,
    Finch,
    Jamf,
    Datadog,
    Sentry,
    Heroku,
    Digitalocean,
    Linear,
    Checkr,
    Vetty,
}

impl Vendor {
    /// Prefix used for `{VENDOR}_CLIENT_ID` style environment variables.
    pub fn env_prefix(self) -> String {
        self.to_string().to_uppercase()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    Oauth2,
    ApiKey,
    Basic,
    Jwt,
}

/// Well-known laika object tags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    User,
    Account,
    BackgroundCheck,
    ChangeRequest,
    Device,
    Event,
    ServiceAccount,
    Monitor,
    Repository,
    PullRequest,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Pending,
    Success,
    Error,
}

/// Audit lifecycle. Advances strictly forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Requested,
    Initiated,
    Fieldwork,
    InDraftReport,
    Completed,
}

impl AuditStage {
    pub fn next(self) -> Option<AuditStage> {
        match self {
            AuditStage::Requested => Some(AuditStage::Initiated),
            AuditStage::Initiated => Some(AuditStage::Fieldwork),
            AuditStage::Fieldwork => Some(AuditStage::InDraftReport),
            AuditStage::InDraftReport => Some(AuditStage::Completed),
            AuditStage::Completed => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum EvidenceStatus {
    Open,
    Submitted,
    #[strum(serialize = "Auditor Accepted")]
    #[serde(rename = "Auditor Accepted")]
    AuditorAccepted,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentState {
    #[default]
    Unresolved,
    Resolved,
}

/// Generate a new random identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Format a timestamp the way every table stores it.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>, LaikaError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LaikaError::Value(format!("bad timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn preference_codes() {
        assert_eq!(AlertPreference::Immediately.to_string(), "IMMEDIATELY");
        assert_eq!(
            AlertPreference::from_str("DAILY").unwrap(),
            AlertPreference::Daily
        );
        assert_eq!(AlertPreference::default(), AlertPreference::Immediately);
    }

    #[test]
    fn evidence_status_keeps_space() {
        assert_eq!(EvidenceStatus::AuditorAccepted.to_string(), "Auditor Accepted");
        assert_eq!(
            EvidenceStatus::from_str("Auditor Accepted").unwrap(),
            EvidenceStatus::AuditorAccepted
        );
    }

    #[test]
    fn audit_stage_advances_forward() {
        assert_eq!(AuditStage::Requested.next(), Some(AuditStage::Initiated));
        assert_eq!(AuditStage::Completed.next(), None);
        assert_eq!(AuditStage::InDraftReport.to_string(), "in_draft_report");
    }

    #[test]
    fn vendor_env_prefix() {
        assert_eq!(Vendor::Github.env_prefix(), "GITHUB");
        assert_eq!(Vendor::Microsoft365.to_string(), "microsoft365");
    }

    #[test]
    fn timestamps_round_trip_with_millis() {
        let ts = parse_ts("2026-03-01T12:30:00.250Z").unwrap();
        assert_eq!(format_ts(ts), "2026-03-01T12:30:00.250Z");
    }
}
