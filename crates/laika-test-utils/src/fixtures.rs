// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row builders for seeding a harness database.
//!
//! Every helper takes a plain connection so several can share one
//! [`TestHarness::seed`](crate::TestHarness::seed) call.

use chrono::{TimeZone, Utc};
use laika_core::{
    ActionItem, AlertPreference, Audit, AuditStage, ConnectionAccount, ConnectionStatus,
    DiscoveryState, LaikaError, ObjectType, Organization, Role, User, UserPreferences, Vendor,
    fields,
};
use laika_storage::queries::{audits, connections, entities, objects, organizations, users};
use rusqlite::Connection;
use serde_json::{Map, Value, json};

pub fn organization(conn: &Connection, id: &str, name: &str) -> Result<(), LaikaError> {
    organizations::insert_organization(
        conn,
        &Organization {
            id: id.into(),
            name: name.into(),
            created_at: Utc::now(),
        },
    )
}

/// A confirmed, active user.
pub struct UserSpec<'a> {
    pub id: &'a str,
    pub organization_id: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub alerts: AlertPreference,
}

impl<'a> UserSpec<'a> {
    pub fn member(id: &'a str, organization_id: &'a str, email: &'a str) -> Self {
        Self {
            id,
            organization_id,
            email,
            first_name: "",
            last_name: "",
            role: Role::OrganizationMember,
            alerts: AlertPreference::Immediately,
        }
    }

    pub fn named(mut self, first: &'a str, last: &'a str) -> Self {
        self.first_name = first;
        self.last_name = last;
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn alerts(mut self, alerts: AlertPreference) -> Self {
        self.alerts = alerts;
        self
    }
}

pub fn user(conn: &Connection, spec: UserSpec<'_>) -> Result<User, LaikaError> {
    let user = User {
        id: spec.id.into(),
        organization_id: spec.organization_id.into(),
        email: spec.email.into(),
        first_name: spec.first_name.into(),
        last_name: spec.last_name.into(),
        role: spec.role,
        preferences: UserPreferences::with_alerts(spec.alerts),
        discovery_state: DiscoveryState::Confirmed,
        employment_type: None,
        is_active: true,
        date_joined: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now),
    };
    users::insert_user(conn, &user)?;
    Ok(user)
}

pub fn control(conn: &Connection, id: &str, organization_id: &str, name: &str) -> Result<(), LaikaError> {
    entities::insert_named(conn, entities::NamedTable::Control, id, organization_id, name, Utc::now())
}

/// An audit in `requested` with `team` as its audit team.
pub fn audit(
    conn: &Connection,
    id: &str,
    organization_id: &str,
    audit_type: &str,
    team: &[&str],
) -> Result<Audit, LaikaError> {
    let audit = Audit {
        id: id.into(),
        organization_id: organization_id.into(),
        name: format!("{audit_type} audit"),
        audit_type: audit_type.into(),
        stage: AuditStage::Requested,
        completed_at: None,
        created_at: Utc::now(),
    };
    audits::insert_audit(conn, &audit)?;
    for member in team {
        audits::add_team_member(conn, id, member)?;
    }
    Ok(audit)
}

pub fn evidence(
    conn: &Connection,
    id: &str,
    organization_id: &str,
    audit_id: &str,
    name: &str,
) -> Result<(), LaikaError> {
    entities::insert_audit_entity(
        conn,
        entities::AuditTable::Evidence,
        id,
        organization_id,
        audit_id,
        name,
        Utc::now(),
    )
}

pub fn action_item(
    conn: &Connection,
    id: &str,
    organization_id: &str,
    created_by: Option<&str>,
) -> Result<ActionItem, LaikaError> {
    let item = ActionItem {
        id: id.into(),
        organization_id: organization_id.into(),
        name: format!("Action {id}"),
        control_id: None,
        assignee_id: None,
        created_by: created_by.map(str::to_string),
        due_date: None,
        completed_at: None,
        created_at: Utc::now(),
    };
    entities::insert_action_item(conn, &item)?;
    Ok(item)
}

/// A connected account in `success` state.
pub fn connection(
    conn: &Connection,
    id: &str,
    organization_id: &str,
    vendor: Vendor,
    settings: Value,
) -> Result<ConnectionAccount, LaikaError> {
    let now = Utc::now();
    let account = ConnectionAccount {
        id: id.into(),
        organization_id: organization_id.into(),
        vendor,
        status: ConnectionStatus::Success,
        error_message: None,
        settings,
        since: None,
        cursor: None,
        metrics: json!({}),
        last_run_at: None,
        created_at: now,
        updated_at: now,
    };
    connections::insert_connection(conn, &account)?;
    Ok(account)
}

/// An unlinked background-check object for the given person.
pub fn background_check(
    conn: &Connection,
    organization_id: &str,
    id: &str,
    first_name: &str,
    last_name: &str,
    email: Option<&str>,
) -> Result<String, LaikaError> {
    let mut data = Map::new();
    data.insert(fields::ID.into(), json!(id));
    data.insert(fields::FIRST_NAME.into(), json!(first_name));
    data.insert(fields::LAST_NAME.into(), json!(last_name));
    if let Some(email) = email {
        data.insert(fields::EMAIL.into(), json!(email));
    }
    let result = objects::upsert_object(
        conn,
        organization_id,
        ObjectType::BackgroundCheck,
        None,
        data,
        Utc::now(),
    )?;
    Ok(result.object_id)
}
