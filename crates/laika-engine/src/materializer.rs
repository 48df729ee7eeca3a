// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns alerting events into one alert and back-reference per recipient,
//! then routes each alert through the delivery outbox.

use laika_core::{
    Alert, AlertReference, AlertType, AuditStage, DomainEvent, EventKind, LaikaError, MatchSubject,
    SYSTEM_SENDER_NAME, User, new_id,
};
use laika_delivery::DeliveryRouter;
use laika_storage::queries::{alerts, audits, comments, entities, users};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::bus::{EventContext, EventSubscriber};
use crate::permission::{self, Permission, Target};

/// Stage codes. `fieldwork` is silent.
pub fn stage_alert(stage: AuditStage) -> Option<AlertType> {
    match stage {
        AuditStage::Requested => Some(AlertType::AuditRequested),
        AuditStage::Initiated => Some(AlertType::AuditInitiated),
        AuditStage::Fieldwork => None,
        AuditStage::InDraftReport => Some(AlertType::DraftReportAvailable),
        AuditStage::Completed => Some(AlertType::AuditComplete),
    }
}

/// Everything needed to write the alerts for one event.
struct Plan {
    alert_type: AlertType,
    reference: AlertReference,
    sender_id: Option<String>,
    recipients: Vec<User>,
    target: Target,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlertMaterializer {
    router: DeliveryRouter,
}

impl AlertMaterializer {
    pub fn new(router: DeliveryRouter) -> Self {
        Self { router }
    }

    /// Write and route the alerts `event` produces. Returns their ids.
    pub fn materialize(
        &self,
        conn: &Connection,
        event: &DomainEvent,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<String>, LaikaError> {
        let Some(plan) = plan(conn, event)? else {
            return Ok(Vec::new());
        };

        let sender = match &plan.sender_id {
            Some(id) => users::get_user(conn, id)?,
            None => None,
        };
        let sender_name = sender
            .as_ref()
            .map(User::display_name)
            .unwrap_or_else(|| SYSTEM_SENDER_NAME.to_string());

        let mut seen: Vec<String> = Vec::new();
        let mut created = Vec::new();
        for receiver in plan.recipients {
            if seen.contains(&receiver.id) {
                continue;
            }
            seen.push(receiver.id.clone());

            if plan.alert_type.is_comment_family()
                && plan.sender_id.as_deref() == Some(receiver.id.as_str())
            {
                debug!(alert_type = %plan.alert_type, user = %receiver.id, "self alert suppressed");
                continue;
            }
            if !permission::can_receive(conn, &receiver, &plan.target)? {
                debug!(
                    alert_type = %plan.alert_type,
                    user = %receiver.id,
                    role = %receiver.role,
                    "recipient filtered by permission gate"
                );
                continue;
            }

            let alert = Alert {
                id: new_id(),
                organization_id: plan.target.organization_id.clone(),
                created_at: now,
                alert_type: plan.alert_type,
                sender_id: sender.as_ref().map(|s| s.id.clone()),
                sender_name: sender_name.clone(),
                receiver_id: receiver.id.clone(),
                viewed: false,
            };
            alerts::insert_alert(conn, &alert, &plan.reference)?;
            self.router.route_in(conn, &alert, &receiver)?;
            created.push(alert.id);
        }
        Ok(created)
    }
}

impl EventSubscriber for AlertMaterializer {
    fn name(&self) -> &'static str {
        "alert_materializer"
    }

    fn interested_in(&self, kind: EventKind) -> bool {
        !kind.is_store_event()
    }

    fn handle(
        &self,
        tx: &Connection,
        event: &DomainEvent,
        ctx: &mut EventContext,
    ) -> Result<(), LaikaError> {
        for id in self.materialize(tx, event, ctx.now)? {
            ctx.record_alert(id);
        }
        Ok(())
    }
}

fn require_user(conn: &Connection, id: &str) -> Result<Option<User>, LaikaError> {
    let user = users::get_user(conn, id)?;
    if user.is_none() {
        warn!(user = %id, "alert recipient does not exist");
    }
    Ok(user)
}

fn single(conn: &Connection, id: &str) -> Result<Vec<User>, LaikaError> {
    Ok(require_user(conn, id)?.into_iter().collect())
}

fn many(conn: &Connection, ids: &[String]) -> Result<Vec<User>, LaikaError> {
    let mut out = Vec::new();
    for id in ids {
        out.extend(require_user(conn, id)?);
    }
    Ok(out)
}

fn comment_owner(conn: &Connection, comment_id: &str) -> Result<String, LaikaError> {
    comments::get_comment(conn, comment_id)?
        .map(|c| c.owner_id)
        .ok_or_else(|| LaikaError::Service(format!("comment {comment_id} does not exist")))
}

/// Audit team auditors followed by the audited organization's admins.
fn audit_plan(
    conn: &Connection,
    audit_id: &str,
    sender_id: &Option<String>,
    alert_type: AlertType,
) -> Result<Option<Plan>, LaikaError> {
    let audit = audits::get_audit(conn, audit_id)?
        .ok_or_else(|| LaikaError::Service(format!("audit {audit_id} does not exist")))?;
    let mut recipients: Vec<User> = audits::team_members(conn, audit_id)?
        .into_iter()
        .filter(|u| u.role.is_auditor())
        .collect();
    recipients.extend(users::list_admins(conn, &audit.organization_id)?);
    Ok(Some(Plan {
        alert_type,
        reference: AlertReference::Audit {
            audit_id: audit_id.to_string(),
        },
        sender_id: sender_id.clone(),
        recipients,
        target: Target::audit(&audit),
    }))
}

fn action_item_plan(
    conn: &Connection,
    alert_type: AlertType,
    sender_id: Option<String>,
    receiver_id: &str,
    action_item_id: &str,
) -> Result<Option<Plan>, LaikaError> {
    let item = entities::get_action_item(conn, action_item_id)?.ok_or_else(|| {
        LaikaError::Service(format!("action item {action_item_id} does not exist"))
    })?;
    Ok(Some(Plan {
        alert_type,
        reference: AlertReference::Subtask {
            action_item_id: action_item_id.to_string(),
        },
        sender_id,
        recipients: single(conn, receiver_id)?,
        target: Target::organization(item.organization_id, Some(Permission::ViewActionItem)),
    }))
}

fn admins_plan(
    conn: &Connection,
    organization_id: &str,
    alert_type: AlertType,
    reference: AlertReference,
) -> Result<Option<Plan>, LaikaError> {
    Ok(Some(Plan {
        alert_type,
        reference,
        sender_id: None,
        recipients: users::list_admins(conn, organization_id)?,
        target: Target::organization(organization_id, Some(Permission::ViewUser)),
    }))
}

fn plan(conn: &Connection, event: &DomainEvent) -> Result<Option<Plan>, LaikaError> {
    match event {
        DomainEvent::Mention {
            sender_id,
            mentioned_user_id,
            target: _,
            comment_id,
            attachment,
        } => Ok(Some(Plan {
            alert_type: AlertType::mention_for(attachment.kind()),
            reference: AlertReference::Comment {
                comment_id: comment_id.clone(),
            },
            sender_id: Some(sender_id.clone()),
            recipients: single(conn, mentioned_user_id)?,
            target: Target::attachment(conn, attachment)?,
        })),
        DomainEvent::Reply {
            sender_id,
            comment_id,
            reply_id,
            attachment,
        } => Ok(Some(Plan {
            alert_type: AlertType::reply_for(attachment.kind()),
            reference: AlertReference::Reply {
                reply_id: reply_id.clone(),
            },
            sender_id: Some(sender_id.clone()),
            recipients: single(conn, &comment_owner(conn, comment_id)?)?,
            target: Target::attachment(conn, attachment)?,
        })),
        DomainEvent::Resolve {
            sender_id,
            comment_id,
            attachment,
        } => Ok(Some(Plan {
            alert_type: AlertType::Resolve,
            reference: AlertReference::Comment {
                comment_id: comment_id.clone(),
            },
            sender_id: Some(sender_id.clone()),
            recipients: single(conn, &comment_owner(conn, comment_id)?)?,
            target: Target::attachment(conn, attachment)?,
        })),
        DomainEvent::NewAssignment {
            sender_id,
            assignee_id,
            action_item_id,
        } => action_item_plan(
            conn,
            AlertType::NewAssignment,
            sender_id.clone(),
            assignee_id,
            action_item_id,
        ),
        DomainEvent::AssignmentCompleted {
            sender_id,
            receiver_id,
            action_item_id,
        } => action_item_plan(
            conn,
            AlertType::AssignmentCompleted,
            Some(sender_id.clone()),
            receiver_id,
            action_item_id,
        ),
        DomainEvent::ControlActionItemAssignment {
            sender_id,
            assignee_id,
            action_item_id,
        } => action_item_plan(
            conn,
            AlertType::ControlActionItemAssignment,
            sender_id.clone(),
            assignee_id,
            action_item_id,
        ),
        DomainEvent::ControlPastDueActionItem {
            assignee_id,
            action_item_id,
        } => action_item_plan(
            conn,
            AlertType::ControlPastDueActionItem,
            None,
            assignee_id,
            action_item_id,
        ),
        DomainEvent::ControlFutureDueActionItem {
            assignee_id,
            action_item_id,
        } => action_item_plan(
            conn,
            AlertType::ControlFutureDueActionItem,
            None,
            assignee_id,
            action_item_id,
        ),
        DomainEvent::AuditStageChanged {
            sender_id,
            audit_id,
            to,
            ..
        } => match stage_alert(*to) {
            Some(alert_type) => audit_plan(conn, audit_id, sender_id, alert_type),
            None => Ok(None),
        },
        DomainEvent::DraftReportAvailable {
            sender_id,
            audit_id,
        } => audit_plan(conn, audit_id, sender_id, AlertType::DraftReportAvailable),
        DomainEvent::AuditComplete {
            sender_id,
            audit_id,
        } => audit_plan(conn, audit_id, sender_id, AlertType::AuditComplete),
        DomainEvent::VendorDiscovery {
            organization_id,
            quantity,
        } => admins_plan(
            conn,
            organization_id,
            AlertType::VendorDiscovery,
            AlertReference::VendorDiscovery {
                quantity: *quantity,
            },
        ),
        DomainEvent::PeopleDiscovery {
            organization_id,
            quantity,
        } => admins_plan(
            conn,
            organization_id,
            AlertType::PeopleDiscovery,
            AlertReference::PeopleDiscovery {
                quantity: *quantity,
            },
        ),
        DomainEvent::BackgroundCheckSingleMatch {
            organization_id,
            user_id,
            object_id,
        } => admins_plan(
            conn,
            organization_id,
            AlertType::BackgroundCheckSingleMatch,
            AlertReference::BackgroundCheck {
                laika_object_id: Some(object_id.clone()),
                user_id: Some(user_id.clone()),
            },
        ),
        DomainEvent::BackgroundCheckMultipleMatch {
            organization_id,
            subject,
            ..
        } => {
            let (laika_object_id, user_id) = match subject {
                MatchSubject::Object(id) => (Some(id.clone()), None),
                MatchSubject::User(id) => (None, Some(id.clone())),
            };
            admins_plan(
                conn,
                organization_id,
                AlertType::BackgroundCheckMultipleMatch,
                AlertReference::BackgroundCheck {
                    laika_object_id,
                    user_id,
                },
            )
        }
        DomainEvent::TrainingReminder {
            organization_id,
            receiver_id,
            training_id,
        } => Ok(Some(Plan {
            alert_type: AlertType::TrainingReminder,
            reference: AlertReference::Training {
                training_id: training_id.clone(),
            },
            sender_id: None,
            recipients: single(conn, receiver_id)?,
            target: Target::organization(organization_id.clone(), None),
        })),
        DomainEvent::AccessReviewStart {
            organization_id,
            access_review_id,
            reviewer_ids,
        }
        | DomainEvent::AccessReviewComplete {
            organization_id,
            access_review_id,
            reviewer_ids,
        } => {
            let alert_type = if event.kind() == EventKind::AccessReviewStart {
                AlertType::AccessReviewStart
            } else {
                AlertType::AccessReviewComplete
            };
            Ok(Some(Plan {
                alert_type,
                reference: AlertReference::AccessReview {
                    access_review_id: access_review_id.clone(),
                },
                sender_id: None,
                recipients: many(conn, reviewer_ids)?,
                target: Target::organization(organization_id.clone(), None),
            }))
        }
        DomainEvent::QuestionAssignment {
            sender_id,
            assignee_id,
            question_id,
        } => {
            let Some(assignee) = require_user(conn, assignee_id)? else {
                return Ok(None);
            };
            Ok(Some(Plan {
                alert_type: AlertType::QuestionAssignment,
                reference: AlertReference::Question {
                    question_id: question_id.clone(),
                },
                sender_id: sender_id.clone(),
                target: Target::organization(assignee.organization_id.clone(), None),
                recipients: vec![assignee],
            }))
        }
        DomainEvent::LibraryEntrySuggestions {
            organization_id,
            receiver_id,
            quantity,
        } => Ok(Some(Plan {
            alert_type: AlertType::LibraryEntrySuggestions,
            reference: AlertReference::LibraryEntry {
                quantity: *quantity,
            },
            sender_id: None,
            recipients: single(conn, receiver_id)?,
            target: Target::organization(organization_id.clone(), None),
        })),
        DomainEvent::ObjectCreated { .. }
        | DomainEvent::ObjectUpdated { .. }
        | DomainEvent::ConnectionRemoved { .. } => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_audit, seed_comment, seed_org, seed_user};
    use chrono::Utc;
    use laika_core::{ActionItem, Attachment, MentionTarget, Role};
    use laika_storage::queries::queue;

    fn conn() -> Connection {
        crate::testing::conn()
    }

    fn materialize(conn: &Connection, event: DomainEvent) -> Vec<String> {
        AlertMaterializer::default()
            .materialize(conn, &event, Utc::now())
            .unwrap()
    }

    fn seed_team(conn: &Connection) {
        seed_org(conn, "o1");
        seed_user(conn, "a", "o1", "a@x.com", "A", "Name", Role::OrganizationMember);
        seed_user(conn, "b", "o1", "b@x.com", "B", "", Role::OrganizationMember);
    }

    #[test]
    fn control_mention_alerts_the_mentioned_user() {
        let conn = conn();
        seed_team(&conn);
        seed_comment(&conn, "c1", "b", "Hi @(a@x.com)");
        let ids = materialize(
            &conn,
            DomainEvent::Mention {
                sender_id: "b".into(),
                mentioned_user_id: "a".into(),
                target: MentionTarget::Comment("c1".into()),
                comment_id: "c1".into(),
                attachment: Attachment::Control("ctl".into()),
            },
        );
        assert_eq!(ids.len(), 1);
        let (alert, reference) = alerts::get_alert(&conn, &ids[0]).unwrap().unwrap();
        assert_eq!(alert.alert_type, AlertType::ControlMention);
        assert_eq!(alert.receiver_id, "a");
        assert_eq!(alert.sender_name, "B");
        assert_eq!(
            reference,
            AlertReference::Comment {
                comment_id: "c1".into()
            }
        );
        assert_eq!(queue::list_queue(&conn, "delivery.websocket").unwrap().len(), 1);
    }

    #[test]
    fn replies_to_own_comment_are_suppressed() {
        let conn = conn();
        seed_team(&conn);
        seed_comment(&conn, "c1", "b", "note");
        let ids = materialize(
            &conn,
            DomainEvent::Reply {
                sender_id: "b".into(),
                comment_id: "c1".into(),
                reply_id: "r1".into(),
                attachment: Attachment::Control("ctl".into()),
            },
        );
        assert!(ids.is_empty());
        assert!(alerts::list_by_type(&conn, AlertType::ControlReply).unwrap().is_empty());
    }

    #[test]
    fn fieldwork_is_silent_and_other_stages_reach_auditors_and_admins() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_org(&conn, "firm");
        seed_audit(&conn, "au1", "o1");
        seed_user(&conn, "adm", "o1", "adm@x.com", "Ad", "Min", Role::OrganizationAdmin);
        seed_user(&conn, "aud", "firm", "aud@firm.com", "Au", "Ditor", Role::Auditor);
        seed_user(&conn, "mem", "o1", "mem@x.com", "Me", "M", Role::OrganizationMember);
        audits::add_team_member(&conn, "au1", "aud").unwrap();
        audits::add_team_member(&conn, "au1", "mem").unwrap();

        let stage = |to| DomainEvent::AuditStageChanged {
            sender_id: None,
            audit_id: "au1".into(),
            from: AuditStage::Initiated,
            to,
        };
        assert!(materialize(&conn, stage(AuditStage::Fieldwork)).is_empty());

        let ids = materialize(&conn, stage(AuditStage::InDraftReport));
        assert_eq!(ids.len(), 2);
        let alerts = alerts::list_by_type(&conn, AlertType::DraftReportAvailable).unwrap();
        let mut receivers: Vec<_> = alerts.iter().map(|a| a.receiver_id.as_str()).collect();
        receivers.sort();
        assert_eq!(receivers, vec!["adm", "aud"]);
        assert!(alerts.iter().all(|a| a.sender_name == SYSTEM_SENDER_NAME));
    }

    #[test]
    fn discovery_goes_to_admins() {
        let conn = conn();
        seed_team(&conn);
        seed_user(&conn, "adm", "o1", "adm@x.com", "Ad", "Min", Role::OrganizationAdmin);
        let ids = materialize(
            &conn,
            DomainEvent::BackgroundCheckMultipleMatch {
                organization_id: "o1".into(),
                subject: MatchSubject::User("a".into()),
                candidates: vec!["x".into(), "y".into()],
            },
        );
        assert_eq!(ids.len(), 1);
        let (alert, reference) = alerts::get_alert(&conn, &ids[0]).unwrap().unwrap();
        assert_eq!(alert.receiver_id, "adm");
        assert_eq!(
            reference,
            AlertReference::BackgroundCheck {
                laika_object_id: None,
                user_id: Some("a".into())
            }
        );
    }

    #[test]
    fn assignments_reference_the_action_item() {
        let conn = conn();
        seed_team(&conn);
        entities::insert_action_item(
            &conn,
            &ActionItem {
                id: "ai1".into(),
                organization_id: "o1".into(),
                name: "Rotate keys".into(),
                control_id: None,
                assignee_id: Some("a".into()),
                created_by: Some("b".into()),
                due_date: None,
                completed_at: None,
                created_at: Utc::now(),
            },
        )
        .unwrap();
        let ids = materialize(
            &conn,
            DomainEvent::NewAssignment {
                sender_id: Some("b".into()),
                assignee_id: "a".into(),
                action_item_id: "ai1".into(),
            },
        );
        let (alert, reference) = alerts::get_alert(&conn, &ids[0]).unwrap().unwrap();
        assert_eq!(alert.alert_type, AlertType::NewAssignment);
        assert_eq!(
            reference,
            AlertReference::Subtask {
                action_item_id: "ai1".into()
            }
        );
    }

    #[test]
    fn store_events_make_no_alerts() {
        let conn = conn();
        let ids = materialize(
            &conn,
            DomainEvent::ConnectionRemoved {
                organization_id: "o1".into(),
                connection_account_id: "c1".into(),
                removed_objects: 3,
            },
        );
        assert!(ids.is_empty());
    }
}
