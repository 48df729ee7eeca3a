// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Templated e-mail for one alert.

use laika_core::{AlertFamily, AlertType, EmailMessage};
use laika_storage::AlertView;
use serde_json::json;

use super::{Links, Placeholders};

/// Template a family renders with.
pub fn template_for(alert_type: AlertType) -> &'static str {
    match alert_type.family() {
        AlertFamily::Comments => "comment_alert",
        AlertFamily::EvidenceComments => "evidence_comment_alert",
        AlertFamily::Audits => "audit_alert",
        AlertFamily::Controls => "control_alert",
        AlertFamily::Policies => "policy_alert",
        AlertFamily::Generic => "generic_alert",
    }
}

/// Subject line with literal placeholders.
pub fn subject_template(alert_type: AlertType) -> &'static str {
    use AlertType::*;
    match alert_type {
        Mention => "[User] mentioned you in a comment in [TaskName].",
        Reply => "[User] replied to your comment in [TaskName].",
        Resolve => "[User] resolved your comment in [TaskName].",
        ControlMention => "[User] mentioned you in a comment in [ControlName].",
        ControlReply => "[User] replied to your comment in [ControlName].",
        PolicyMention => "[User] mentioned you in a comment in [PolicyName].",
        PolicyReply => "[User] replied to your comment in [PolicyName].",
        EvidenceMention | RequirementMention | PopulationMention => {
            "[User] mentioned you in a comment in [EvidenceName]."
        }
        EvidenceReply | RequirementReply | PopulationReply => {
            "[User] replied to your comment in [EvidenceName]."
        }
        DraftReportMention => "[User] mentioned you in a comment in the [AuditName] draft report.",
        DraftReportReply => "[User] replied to your comment in the [AuditName] draft report.",
        NewAssignment => "[User] assigned you to [Task] in [SubtaskGroup].",
        AssignmentCompleted => "[User] completed [Task].",
        AuditRequested => "[CompanyName] have an [AuditType] audit requested",
        AuditInitiated => "[CompanyName] have an [AuditType] audit initiated",
        DraftReportAvailable => "[CompanyName] have an [AuditType] draft report available",
        AuditComplete => "[CompanyName] have an [AuditType] audit completed",
        VendorDiscovery => "Laika discovered [Quantity] new vendors for [CompanyName]",
        PeopleDiscovery => "Laika discovered [Quantity] new people in [CompanyName]",
        TrainingReminder => "You have a training to complete",
        BackgroundCheckSingleMatch => "A background check was linked to a person in [CompanyName]",
        BackgroundCheckMultipleMatch => {
            "A background check matches several people in [CompanyName]"
        }
        AccessReviewStart => "You have an access review to complete",
        AccessReviewComplete => "The access review for [CompanyName] is complete",
        ControlActionItemAssignment => "[User] assigned you the action item [Task]",
        ControlPastDueActionItem => "You have an action item past due: [Task]",
        ControlFutureDueActionItem => "You have an action item due soon: [Task]",
        QuestionAssignment => "[User] assigned you a question",
        LibraryEntrySuggestions => "Laika found [Quantity] library entry suggestions",
    }
}

/// Body line shown above the call to action.
fn message_template(alert_type: AlertType) -> &'static str {
    use AlertType::*;
    match alert_type {
        t if t.is_comment_family() => "[Comment]",
        NewAssignment | ControlActionItemAssignment => "[User] assigned [Task] to you.",
        AssignmentCompleted => "[Task] is done.",
        ControlPastDueActionItem => "[Task] is past its due date.",
        ControlFutureDueActionItem => "[Task] is due soon.",
        VendorDiscovery | PeopleDiscovery | LibraryEntrySuggestions => {
            "[Quantity] new items are waiting for your review."
        }
        _ => "Open Laika to see the details.",
    }
}

/// Render `view` for `from`.
pub fn render_email(view: &AlertView, links: &Links, from: &str) -> EmailMessage {
    let values = Placeholders::from_view(view, links);
    let alert_type = view.alert.alert_type;
    EmailMessage {
        to: view.receiver.email.clone(),
        from: from.to_string(),
        subject: values.fill(subject_template(alert_type)),
        template: template_for(alert_type).to_string(),
        context: json!({
            "alert_type": alert_type.to_string(),
            "receiver_name": values.receiver,
            "sender_name": values.user,
            "company_name": values.company_name,
            "entity_name": values.entity_name,
            "audit_name": values.audit_name,
            "audit_type": values.audit_type,
            "task": values.task,
            "quantity": values.quantity,
            "content": values.comment,
            "message": values.fill(message_template(alert_type)),
            "url": values.url,
            "call_to_action_url": links.call_to_action(),
        }),
    }
}
