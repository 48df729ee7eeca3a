// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain events carried by the in-process bus.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{Attachment, MentionTarget};
use crate::types::{AuditStage, ObjectType};

/// Tag identifying the payload variant of a [`DomainEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum EventKind {
    Mention,
    Reply,
    Resolve,
    NewAssignment,
    AssignmentCompleted,
    AuditStageChanged,
    DraftReportAvailable,
    AuditComplete,
    VendorDiscovery,
    PeopleDiscovery,
    TrainingReminder,
    BackgroundCheckSingleMatch,
    BackgroundCheckMultipleMatch,
    AccessReviewStart,
    AccessReviewComplete,
    ControlActionItemAssignment,
    ControlPastDueActionItem,
    ControlFutureDueActionItem,
    QuestionAssignment,
    LibraryEntrySuggestions,
    ObjectCreated,
    ObjectUpdated,
    ConnectionRemoved,
}

/// Which side of a background-check match triggered the correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MatchSubject {
    Object(String),
    User(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Mention {
        sender_id: String,
        mentioned_user_id: String,
        target: MentionTarget,
        comment_id: String,
        attachment: Attachment,
    },
    Reply {
        sender_id: String,
        comment_id: String,
        reply_id: String,
        attachment: Attachment,
    },
    Resolve {
        sender_id: String,
        comment_id: String,
        attachment: Attachment,
    },
    NewAssignment {
        sender_id: Option<String>,
        assignee_id: String,
        action_item_id: String,
    },
    AssignmentCompleted {
        sender_id: String,
        receiver_id: String,
        action_item_id: String,
    },
    /// Stage transition. The materializer decides which stages alert.
    AuditStageChanged {
        sender_id: Option<String>,
        audit_id: String,
        from: AuditStage,
        to: AuditStage,
    },
    DraftReportAvailable {
        sender_id: Option<String>,
        audit_id: String,
    },
    AuditComplete {
        sender_id: Option<String>,
        audit_id: String,
    },
    VendorDiscovery {
        organization_id: String,
        quantity: i64,
    },
    PeopleDiscovery {
        organization_id: String,
        quantity: i64,
    },
    TrainingReminder {
        organization_id: String,
        receiver_id: String,
        training_id: String,
    },
    BackgroundCheckSingleMatch {
        organization_id: String,
        user_id: String,
        object_id: String,
    },
    BackgroundCheckMultipleMatch {
        organization_id: String,
        subject: MatchSubject,
        candidates: Vec<String>,
    },
    AccessReviewStart {
        organization_id: String,
        access_review_id: String,
        reviewer_ids: Vec<String>,
    },
    AccessReviewComplete {
        organization_id: String,
        access_review_id: String,
        reviewer_ids: Vec<String>,
    },
    ControlActionItemAssignment {
        sender_id: Option<String>,
        assignee_id: String,
        action_item_id: String,
    },
    ControlPastDueActionItem {
        assignee_id: String,
        action_item_id: String,
    },
    ControlFutureDueActionItem {
        assignee_id: String,
        action_item_id: String,
    },
    QuestionAssignment {
        sender_id: Option<String>,
        assignee_id: String,
        question_id: String,
    },
    LibraryEntrySuggestions {
        organization_id: String,
        receiver_id: String,
        quantity: i64,
    },
    ObjectCreated {
        organization_id: String,
        object_id: String,
        object_type: ObjectType,
    },
    ObjectUpdated {
        organization_id: String,
        object_id: String,
        object_type: ObjectType,
    },
    ConnectionRemoved {
        organization_id: String,
        connection_account_id: String,
        removed_objects: usize,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Mention { .. } => EventKind::Mention,
            DomainEvent::Reply { .. } => EventKind::Reply,
            DomainEvent::Resolve { .. } => EventKind::Resolve,
            DomainEvent::NewAssignment { .. } => EventKind::NewAssignment,
            DomainEvent::AssignmentCompleted { .. } => EventKind::AssignmentCompleted,
            DomainEvent::AuditStageChanged { .. } => EventKind::AuditStageChanged,
            DomainEvent::DraftReportAvailable { .. } => EventKind::DraftReportAvailable,
            DomainEvent::AuditComplete { .. } => EventKind::AuditComplete,
            DomainEvent::VendorDiscovery { .. } => EventKind::VendorDiscovery,
            DomainEvent::PeopleDiscovery { .. } => EventKind::PeopleDiscovery,
            DomainEvent::TrainingReminder { .. } => EventKind::TrainingReminder,
            DomainEvent::BackgroundCheckSingleMatch { .. } => {
                EventKind::BackgroundCheckSingleMatch
            }
            DomainEvent::BackgroundCheckMultipleMatch { .. } => {
                EventKind::BackgroundCheckMultipleMatch
            }
            DomainEvent::AccessReviewStart { .. } => EventKind::AccessReviewStart,
            DomainEvent::AccessReviewComplete { .. } => EventKind::AccessReviewComplete,
            DomainEvent::ControlActionItemAssignment { .. } => {
                EventKind::ControlActionItemAssignment
            }
            DomainEvent::ControlPastDueActionItem { .. } => EventKind::ControlPastDueActionItem,
            DomainEvent::ControlFutureDueActionItem { .. } => {
                EventKind::ControlFutureDueActionItem
            }
            DomainEvent::QuestionAssignment { .. } => EventKind::QuestionAssignment,
            DomainEvent::LibraryEntrySuggestions { .. } => EventKind::LibraryEntrySuggestions,
            DomainEvent::ObjectCreated { .. } => EventKind::ObjectCreated,
            DomainEvent::ObjectUpdated { .. } => EventKind::ObjectUpdated,
            DomainEvent::ConnectionRemoved { .. } => EventKind::ConnectionRemoved,
        }
    }
}

impl EventKind {
    /// Store-level kinds that never turn into alerts on their own.
    pub fn is_store_event(self) -> bool {
        matches!(
            self,
            EventKind::ObjectCreated | EventKind::ObjectUpdated | EventKind::ConnectionRemoved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_payload() {
        let ev = DomainEvent::PeopleDiscovery {
            organization_id: "o".into(),
            quantity: 2,
        };
        assert_eq!(ev.kind(), EventKind::PeopleDiscovery);
        assert!(!ev.kind().is_store_event());
        assert!(EventKind::ObjectCreated.is_store_event());
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let ev = DomainEvent::Resolve {
            sender_id: "u1".into(),
            comment_id: "c1".into(),
            attachment: Attachment::Control("ctl".into()),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "resolve");
        assert_eq!(json["attachment"]["kind"], "control");
    }
}
