// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Joined alert view used by the delivery channels and the digest.

use std::collections::HashMap;

use laika_core::{Alert, AlertReference, LaikaError, mention::parse_mentions};
use rusqlite::Connection;

use crate::models::AlertView;
use crate::queries::{alerts, audits, comments, entities, organizations, users};

/// Load the view for one alert, `None` when the alert is gone.
pub fn load_alert_view(conn: &Connection, alert_id: &str) -> Result<Option<AlertView>, LaikaError> {
    let Some((alert, reference)) = alerts::get_alert(conn, alert_id)? else {
        return Ok(None);
    };
    build_view(conn, alert, reference).map(Some)
}

/// Build the view for an alert already in hand.
pub fn build_view(
    conn: &Connection,
    alert: Alert,
    reference: AlertReference,
) -> Result<AlertView, LaikaError> {
    let receiver = users::get_user(conn, &alert.receiver_id)?.ok_or_else(|| {
        LaikaError::Service(format!("alert {} has no receiver", alert.id))
    })?;
    let sender = match &alert.sender_id {
        Some(id) => users::get_user(conn, id)?,
        None => None,
    };
    let company_name = organizations::organization_name(conn, &alert.organization_id)?;

    let mut comment = None;
    let mut reply = None;
    let mut audit = None;
    let mut action_item = None;
    let mut quantity = None;

    match &reference {
        AlertReference::Comment { comment_id } => {
            comment = comments::get_comment(conn, comment_id)?;
        }
        AlertReference::Reply { reply_id } => {
            reply = comments::get_reply(conn, reply_id)?;
            if let Some(r) = &reply {
                comment = comments::get_comment(conn, &r.comment_id)?;
            }
        }
        AlertReference::Subtask { action_item_id } => {
            action_item = entities::get_action_item(conn, action_item_id)?;
        }
        AlertReference::Audit { audit_id } => {
            audit = audits::get_audit(conn, audit_id)?;
        }
        AlertReference::PeopleDiscovery { quantity: q }
        | AlertReference::VendorDiscovery { quantity: q }
        | AlertReference::LibraryEntry { quantity: q } => quantity = Some(*q),
        AlertReference::BackgroundCheck { .. }
        | AlertReference::AccessReview { .. }
        | AlertReference::Training { .. }
        | AlertReference::Question { .. } => {}
    }

    let mut entity_name = None;
    if let Some(c) = &comment {
        entity_name = entities::entity_name(conn, &c.attachment)?;
        if audit.is_none() {
            if let Some(audit_id) = entities::attachment_audit(conn, &c.attachment)? {
                audit = audits::get_audit(conn, &audit_id)?;
            }
        }
    }

    let content = reply
        .as_ref()
        .map(|r| r.content.as_str())
        .or_else(|| comment.as_ref().map(|c| c.content.as_str()));
    let mention_names = match content {
        Some(text) => users::display_names(conn, &alert.organization_id, &parse_mentions(text))?,
        None => HashMap::new(),
    };

    Ok(AlertView {
        alert,
        reference,
        receiver,
        sender,
        company_name,
        comment,
        reply,
        entity_name,
        audit,
        action_item,
        quantity,
        mention_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{conn, seed_control_comment, seed_org, seed_user};
    use chrono::Utc;
    use laika_core::{AlertType, Role, new_id};

    #[test]
    fn view_rewrites_mentions_and_names_the_control() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_user(&conn, "a", "o1", "a@x.com", "A", "Name", Role::OrganizationMember);
        seed_user(&conn, "b", "o1", "b@x.com", "B", "", Role::OrganizationMember);
        seed_control_comment(&conn, "c1", "o1", "b", "Hi @(a@x.com)");

        let alert = Alert {
            id: new_id(),
            organization_id: "o1".into(),
            created_at: Utc::now(),
            alert_type: AlertType::ControlMention,
            sender_id: Some("b".into()),
            sender_name: "B".into(),
            receiver_id: "a".into(),
            viewed: false,
        };
        alerts::insert_alert(
            &conn,
            &alert,
            &AlertReference::Comment {
                comment_id: "c1".into(),
            },
        )
        .unwrap();

        let view = load_alert_view(&conn, &alert.id).unwrap().unwrap();
        assert_eq!(view.company_name, "Org o1");
        assert_eq!(view.entity_name.as_deref(), Some("Ctl-1"));
        assert_eq!(view.rendered_content().as_deref(), Some("Hi @A Name"));
        assert_eq!(view.sender.unwrap().id, "b");
    }

    #[test]
    fn unknown_alert_has_no_view() {
        let conn = conn();
        assert!(load_alert_view(&conn, "nope").unwrap().is_none());
    }
}
