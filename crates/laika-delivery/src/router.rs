// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel planning and the transactional outbox.

use laika_config::model::DeliveryConfig;
use laika_core::{Alert, AlertPreference, AlertType, LaikaError, User};
use laika_storage::queries::{connections, queue};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An outbound delivery channel. Each has its own queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Websocket,
    Email,
    Slack,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Websocket, Channel::Email, Channel::Slack];

    pub fn queue_name(self) -> &'static str {
        match self {
            Channel::Websocket => "delivery.websocket",
            Channel::Email => "delivery.email",
            Channel::Slack => "delivery.slack",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Websocket => "websocket",
            Channel::Email => "email",
            Channel::Slack => "slack",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Types mailed right away to `IMMEDIATELY` users.
pub const IMMEDIATE_EMAIL_TYPES: &[AlertType] = &[
    AlertType::Mention,
    AlertType::Reply,
    AlertType::Resolve,
    AlertType::ControlMention,
    AlertType::ControlReply,
    AlertType::PolicyMention,
    AlertType::PolicyReply,
    AlertType::EvidenceMention,
    AlertType::EvidenceReply,
    AlertType::RequirementMention,
    AlertType::RequirementReply,
    AlertType::PopulationMention,
    AlertType::PopulationReply,
    AlertType::DraftReportMention,
    AlertType::DraftReportReply,
    AlertType::NewAssignment,
    AlertType::AssignmentCompleted,
    AlertType::AuditRequested,
    AlertType::AuditInitiated,
    AlertType::DraftReportAvailable,
    AlertType::AuditComplete,
    AlertType::VendorDiscovery,
    AlertType::PeopleDiscovery,
    AlertType::BackgroundCheckSingleMatch,
    AlertType::BackgroundCheckMultipleMatch,
    AlertType::TrainingReminder,
    AlertType::AccessReviewStart,
    AlertType::AccessReviewComplete,
    AlertType::ControlActionItemAssignment,
    AlertType::ControlPastDueActionItem,
    AlertType::QuestionAssignment,
];

/// Types posted to Slack when the organization has a live Slack connection.
pub const SLACK_TYPES: &[AlertType] = &[
    AlertType::Mention,
    AlertType::Reply,
    AlertType::ControlMention,
    AlertType::ControlReply,
    AlertType::PolicyMention,
    AlertType::PolicyReply,
    AlertType::EvidenceMention,
    AlertType::EvidenceReply,
    AlertType::NewAssignment,
    AlertType::AuditRequested,
    AlertType::AuditInitiated,
    AlertType::DraftReportAvailable,
    AlertType::AuditComplete,
    AlertType::VendorDiscovery,
    AlertType::PeopleDiscovery,
];

/// Channels an alert goes out on. In-app delivery is unconditional;
/// `DAILY` e-mail is left to the digest job.
pub fn plan(alert_type: AlertType, preference: AlertPreference, slack_available: bool) -> Vec<Channel> {
    let mut channels = vec![Channel::Websocket];
    if preference == AlertPreference::Immediately && IMMEDIATE_EMAIL_TYPES.contains(&alert_type) {
        channels.push(Channel::Email);
    }
    if preference != AlertPreference::Never && slack_available && SLACK_TYPES.contains(&alert_type) {
        channels.push(Channel::Slack);
    }
    channels
}

/// Queue payload of every delivery job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub alert_id: String,
}

/// Plans deliveries and writes them into the queue inside the caller's
/// transaction.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRouter {
    websocket_max_attempts: i32,
    email_max_attempts: i32,
    slack_max_attempts: i32,
}

impl Default for DeliveryRouter {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

impl DeliveryRouter {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            websocket_max_attempts: config.websocket_max_attempts,
            email_max_attempts: config.email_max_attempts,
            slack_max_attempts: config.slack_max_attempts,
        }
    }

    pub fn max_attempts(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Websocket => self.websocket_max_attempts,
            Channel::Email => self.email_max_attempts,
            Channel::Slack => self.slack_max_attempts,
        }
    }

    pub fn route_in(
        &self,
        conn: &Connection,
        alert: &Alert,
        receiver: &User,
    ) -> Result<Vec<Channel>, LaikaError> {
        let slack_available =
            connections::active_slack_connection(conn, &receiver.organization_id)?.is_some();
        let channels = plan(alert.alert_type, receiver.alert_preference(), slack_available);
        let payload = serde_json::to_string(&DeliveryJob {
            alert_id: alert.id.clone(),
        })?;
        for channel in &channels {
            queue::enqueue_in(conn, channel.queue_name(), &payload, self.max_attempts(*channel))?;
        }
        debug!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            channels = ?channels,
            "deliveries enqueued"
        );
        Ok(channels)
    }
}
