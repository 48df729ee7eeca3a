// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures and recording sinks for the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use laika_core::{
    Alert, AlertPreference, AlertReference, AlertType, Attachment, Comment, CommentState,
    DiscoveryState, EmailMessage, EmailSender, LaikaError, Organization, Reply, Role, SlackMessage,
    SlackSender, User, UserPreferences, WebsocketPublisher, WsFrame, new_id,
};
use laika_storage::Database;
use laika_storage::queries::{alerts, comments, entities, organizations, users};
use rusqlite::Connection;

use crate::worker::DeliverySinks;

#[derive(Default)]
struct Log {
    frames: Vec<WsFrame>,
    emails: Vec<EmailMessage>,
    slack: Vec<(String, SlackMessage)>,
}

/// Sinks that remember everything handed to them.
#[derive(Clone, Default)]
pub(crate) struct Recording {
    log: Arc<Mutex<Log>>,
    fail_email: bool,
}

impl Recording {
    pub(crate) fn failing_email() -> Self {
        Self {
            fail_email: true,
            ..Self::default()
        }
    }

    pub(crate) fn sinks(&self) -> DeliverySinks {
        DeliverySinks {
            websocket: Arc::new(self.clone()),
            email: Arc::new(self.clone()),
            slack: Arc::new(self.clone()),
        }
    }

    pub(crate) fn frames(&self) -> Vec<WsFrame> {
        self.log.lock().unwrap().frames.clone()
    }

    pub(crate) fn emails(&self) -> Vec<EmailMessage> {
        self.log.lock().unwrap().emails.clone()
    }
}

#[async_trait]
impl WebsocketPublisher for Recording {
    async fn publish(&self, frame: &WsFrame) -> Result<(), LaikaError> {
        self.log.lock().unwrap().frames.push(frame.clone());
        Ok(())
    }
}

#[async_trait]
impl EmailSender for Recording {
    async fn send(&self, message: &EmailMessage) -> Result<(), LaikaError> {
        if self.fail_email {
            return Err(LaikaError::delivery("email", "relay refused"));
        }
        self.log.lock().unwrap().emails.push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl SlackSender for Recording {
    async fn post(&self, _org: &str, email: &str, message: &SlackMessage) -> Result<(), LaikaError> {
        self.log
            .lock()
            .unwrap()
            .slack
            .push((email.to_string(), message.clone()));
        Ok(())
    }
}

pub(crate) fn user(id: &str, email: &str, first: &str, last: &str, pref: AlertPreference) -> User {
    User {
        id: id.into(),
        organization_id: "o1".into(),
        email: email.into(),
        first_name: first.into(),
        last_name: last.into(),
        role: Role::OrganizationMember,
        preferences: UserPreferences::with_alerts(pref),
        discovery_state: DiscoveryState::Confirmed,
        employment_type: None,
        is_active: true,
        date_joined: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// Organization `o1`, receiver `a` with `pref`, sender `b`, control "Ctl-1".
pub(crate) fn seed_base(conn: &Connection, pref: AlertPreference) {
    organizations::insert_organization(
        conn,
        &Organization {
            id: "o1".into(),
            name: "Acme".into(),
            created_at: Utc::now(),
        },
    )
    .unwrap();
    users::insert_user(conn, &user("a", "a@x.com", "A", "Name", pref)).unwrap();
    users::insert_user(conn, &user("b", "b@x.com", "B", "", AlertPreference::Never)).unwrap();
    entities::insert_named(conn, entities::NamedTable::Control, "ctl", "o1", "Ctl-1", Utc::now())
        .unwrap();
}

pub(crate) fn seed_comment(conn: &Connection, id: &str, content: &str) {
    let now = Utc::now();
    comments::insert_comment(
        conn,
        &Comment {
            id: id.into(),
            organization_id: "o1".into(),
            owner_id: "b".into(),
            content: content.into(),
            attachment: Attachment::Control("ctl".into()),
            state: CommentState::Unresolved,
            resolved_by: None,
            resolved_at: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        },
    )
    .unwrap();
}

/// Reply by B on comment `comment_id`.
pub(crate) fn seed_reply(conn: &Connection, id: &str, comment_id: &str, content: &str) {
    let now = Utc::now();
    comments::insert_reply(
        conn,
        &Reply {
            id: id.into(),
            comment_id: comment_id.into(),
            owner_id: "b".into(),
            content: content.into(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        },
    )
    .unwrap();
}

pub(crate) fn seed_alert(
    conn: &Connection,
    alert_type: AlertType,
    reference: AlertReference,
    created_at: DateTime<Utc>,
) -> String {
    let alert = Alert {
        id: new_id(),
        organization_id: "o1".into(),
        created_at,
        alert_type,
        sender_id: Some("b".into()),
        sender_name: "B".into(),
        receiver_id: "a".into(),
        viewed: false,
    };
    alerts::insert_alert(conn, &alert, &reference).unwrap();
    alert.id
}

/// B mentions A on "Ctl-1"; returns the alert id.
pub(crate) async fn seed_mention(db: &Database, pref: AlertPreference) -> String {
    db.call(move |conn| {
        seed_base(conn, pref);
        seed_comment(conn, "c1", "Hi @(a@x.com)");
        Ok(seed_alert(
            conn,
            AlertType::ControlMention,
            AlertReference::Comment {
                comment_id: "c1".into(),
            },
            Utc::now(),
        ))
    })
    .await
    .unwrap()
}
