// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of alert-type codes and the families they fall into.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::model::AttachmentKind;

/// Alert-type code. Persisted verbatim in `alerts.alert_type`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Mention,
    Reply,
    Resolve,
    ControlMention,
    ControlReply,
    PolicyMention,
    PolicyReply,
    EvidenceMention,
    EvidenceReply,
    RequirementMention,
    RequirementReply,
    PopulationMention,
    PopulationReply,
    DraftReportMention,
    DraftReportReply,
    NewAssignment,
    AssignmentCompleted,
    AuditRequested,
    AuditInitiated,
    DraftReportAvailable,
    AuditComplete,
    VendorDiscovery,
    PeopleDiscovery,
    TrainingReminder,
    #[strum(serialize = "LO_BACKGROUND_CHECK_SINGLE_MATCH_LO_TO_USER")]
    #[serde(rename = "LO_BACKGROUND_CHECK_SINGLE_MATCH_LO_TO_USER")]
    BackgroundCheckSingleMatch,
    #[strum(serialize = "LO_BACKGROUND_CHECK_MULTIPLE_MATCH_LO_TO_USER")]
    #[serde(rename = "LO_BACKGROUND_CHECK_MULTIPLE_MATCH_LO_TO_USER")]
    BackgroundCheckMultipleMatch,
    AccessReviewStart,
    AccessReviewComplete,
    ControlActionItemAssignment,
    ControlPastDueActionItem,
    ControlFutureDueActionItem,
    QuestionAssignment,
    LibraryEntrySuggestions,
}

/// Kind of the single back-reference row each alert owns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ReferenceKind {
    CommentAlert,
    ReplyAlert,
    SubtaskAlert,
    AuditAlert,
    PeopleDiscoveryAlert,
    VendorDiscoveryAlert,
    AccessReviewAlert,
    #[strum(serialize = "LOBackgroundCheckAlert")]
    #[serde(rename = "LOBackgroundCheckAlert")]
    BackgroundCheckAlert,
    TrainingAlert,
    QuestionAlert,
    LibraryEntryAlert,
}

/// Template family used by the e-mail renderer and the digest grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum AlertFamily {
    Comments,
    EvidenceComments,
    Audits,
    Controls,
    Policies,
    Generic,
}

impl AlertType {
    pub fn reference_kind(self) -> ReferenceKind {
        use AlertType::*;
        match self {
            Mention | Resolve | ControlMention | PolicyMention | EvidenceMention
            | RequirementMention | PopulationMention | DraftReportMention => {
                ReferenceKind::CommentAlert
            }
            Reply | ControlReply | PolicyReply | EvidenceReply | RequirementReply
            | PopulationReply | DraftReportReply => ReferenceKind::ReplyAlert,
            NewAssignment
            | AssignmentCompleted
            | ControlActionItemAssignment
            | ControlPastDueActionItem
            | ControlFutureDueActionItem => ReferenceKind::SubtaskAlert,
            AuditRequested | AuditInitiated | DraftReportAvailable | AuditComplete => {
                ReferenceKind::AuditAlert
            }
            VendorDiscovery => ReferenceKind::VendorDiscoveryAlert,
            PeopleDiscovery => ReferenceKind::PeopleDiscoveryAlert,
            TrainingReminder => ReferenceKind::TrainingAlert,
            BackgroundCheckSingleMatch | BackgroundCheckMultipleMatch => {
                ReferenceKind::BackgroundCheckAlert
            }
            AccessReviewStart | AccessReviewComplete => ReferenceKind::AccessReviewAlert,
            QuestionAssignment => ReferenceKind::QuestionAlert,
            LibraryEntrySuggestions => ReferenceKind::LibraryEntryAlert,
        }
    }

    pub fn family(self) -> AlertFamily {
        use AlertType::*;
        match self {
            Mention | Reply | Resolve => AlertFamily::Comments,
            EvidenceMention | EvidenceReply | RequirementMention | RequirementReply
            | PopulationMention | PopulationReply | DraftReportMention | DraftReportReply => {
                AlertFamily::EvidenceComments
            }
            AuditRequested | AuditInitiated | DraftReportAvailable | AuditComplete => {
                AlertFamily::Audits
            }
            ControlMention
            | ControlReply
            | ControlActionItemAssignment
            | ControlPastDueActionItem
            | ControlFutureDueActionItem => AlertFamily::Controls,
            PolicyMention | PolicyReply => AlertFamily::Policies,
            _ => AlertFamily::Generic,
        }
    }

    /// Mention, reply, and resolve codes of every attachment kind. These are
    /// never delivered to the user who caused them.
    pub fn is_comment_family(self) -> bool {
        matches!(
            self.reference_kind(),
            ReferenceKind::CommentAlert | ReferenceKind::ReplyAlert
        )
    }

    /// Mention code for a comment attached to `kind`.
    pub fn mention_for(kind: AttachmentKind) -> AlertType {
        match kind {
            AttachmentKind::Task => AlertType::Mention,
            AttachmentKind::Control => AlertType::ControlMention,
            AttachmentKind::Policy => AlertType::PolicyMention,
            AttachmentKind::Evidence => AlertType::EvidenceMention,
            AttachmentKind::Requirement => AlertType::RequirementMention,
            AttachmentKind::Population => AlertType::PopulationMention,
            AttachmentKind::DraftReport => AlertType::DraftReportMention,
        }
    }

    /// Reply code for a comment attached to `kind`.
    pub fn reply_for(kind: AttachmentKind) -> AlertType {
        match kind {
            AttachmentKind::Task => AlertType::Reply,
            AttachmentKind::Control => AlertType::ControlReply,
            AttachmentKind::Policy => AlertType::PolicyReply,
            AttachmentKind::Evidence => AlertType::EvidenceReply,
            AttachmentKind::Requirement => AlertType::RequirementReply,
            AttachmentKind::Population => AlertType::PopulationReply,
            AttachmentKind::DraftReport => AlertType::DraftReportReply,
        }
    }
}
