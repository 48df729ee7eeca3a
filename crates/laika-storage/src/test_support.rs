// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures for the query unit tests.

use chrono::{TimeZone, Utc};
use laika_core::{
    Attachment, Audit, AuditStage, Comment, CommentState, ConnectionAccount, ConnectionStatus,
    DiscoveryState, Organization, Role, User, UserPreferences, Vendor,
};
use rusqlite::Connection;

use crate::queries::{audits, comments, connections, entities, organizations, users};

pub(crate) fn conn() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    crate::migrations::run_migrations(&mut conn).unwrap();
    conn
}

pub(crate) fn seed_org(conn: &Connection, id: &str) {
    organizations::insert_organization(
        conn,
        &Organization {
            id: id.into(),
            name: format!("Org {id}"),
            created_at: Utc::now(),
        },
    )
    .unwrap();
}

pub(crate) fn seed_user(
    conn: &Connection,
    id: &str,
    org: &str,
    email: &str,
    first: &str,
    last: &str,
    role: Role,
) {
    users::insert_user(
        conn,
        &User {
            id: id.into(),
            organization_id: org.into(),
            email: email.into(),
            first_name: first.into(),
            last_name: last.into(),
            role,
            preferences: UserPreferences::default(),
            discovery_state: DiscoveryState::Confirmed,
            employment_type: None,
            is_active: true,
            date_joined: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        },
    )
    .unwrap();
}

pub(crate) fn seed_audit(conn: &Connection, id: &str, org: &str) {
    audits::insert_audit(
        conn,
        &Audit {
            id: id.into(),
            organization_id: org.into(),
            name: format!("Audit {id}"),
            audit_type: "SOC 2 Type 1".into(),
            stage: AuditStage::Requested,
            completed_at: None,
            created_at: Utc::now(),
        },
    )
    .unwrap();
}

/// Comment on control `ctl` ("Ctl-1"), creating the control on first use.
pub(crate) fn seed_control_comment(conn: &Connection, id: &str, org: &str, owner: &str, content: &str) {
    if entities::entity_name(conn, &Attachment::Control("ctl".into()))
        .unwrap()
        .is_none()
    {
        entities::insert_named(conn, entities::NamedTable::Control, "ctl", org, "Ctl-1", Utc::now())
            .unwrap();
    }
    let now = Utc::now();
    comments::insert_comment(
        conn,
        &Comment {
            id: id.into(),
            organization_id: org.into(),
            owner_id: owner.into(),
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

pub(crate) fn seed_connection(conn: &Connection, id: &str, org: &str, vendor: Vendor) {
    let now = Utc::now();
    connections::insert_connection(
        conn,
        &ConnectionAccount {
            id: id.into(),
            organization_id: org.into(),
            vendor,
            status: ConnectionStatus::Pending,
            error_message: None,
            settings: serde_json::json!({}),
            since: None,
            cursor: None,
            metrics: serde_json::json!({}),
            last_run_at: None,
            created_at: now,
            updated_at: now,
        },
    )
    .unwrap();
}
