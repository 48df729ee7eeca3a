// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures for the unit tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use laika_config::model::{HttpConfig, PollingConfig};
use laika_connectors::ConnectorRegistry;
use laika_core::{
    Attachment, Audit, AuditStage, Comment, CommentState, ConnectionAccount, ConnectionStatus,
    DiscoveryState, Organization, Role, User, UserPreferences, Vendor,
};
use laika_delivery::DeliveryRouter;
use laika_http::{HttpClient, RetryPolicy};
use laika_storage::Database;
use laika_storage::queries::{audits, comments, connections, entities, organizations, users};
use laika_vault::{CredentialVault, Vault};
use rusqlite::Connection;

use crate::bus::EventBus;
use crate::engine::Engine;
use crate::poller::PollRunner;

pub(crate) fn conn() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    laika_storage::migrations::run_migrations(&mut conn).unwrap();
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
) -> User {
    let user = User {
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
    };
    users::insert_user(conn, &user).unwrap();
    user
}

pub(crate) fn seed_audit(conn: &Connection, id: &str, org: &str) -> Audit {
    let audit = Audit {
        id: id.into(),
        organization_id: org.into(),
        name: format!("Audit {id}"),
        audit_type: "SOC 2 Type 1".into(),
        stage: AuditStage::Requested,
        completed_at: None,
        created_at: Utc::now(),
    };
    audits::insert_audit(conn, &audit).unwrap();
    audit
}

/// Control `ctl` ("Ctl-1") in `o1`, created on first use.
pub(crate) fn seed_control(conn: &Connection) {
    if entities::entity_name(conn, &Attachment::Control("ctl".into()))
        .unwrap()
        .is_none()
    {
        entities::insert_named(conn, entities::NamedTable::Control, "ctl", "o1", "Ctl-1", Utc::now())
            .unwrap();
    }
}

/// Comment on control `ctl` in `o1`.
pub(crate) fn seed_comment(conn: &Connection, id: &str, owner: &str, content: &str) {
    seed_control(conn);
    let now = Utc::now();
    comments::insert_comment(
        conn,
        &Comment {
            id: id.into(),
            organization_id: "o1".into(),
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

pub(crate) fn connection_account(id: &str, org: &str, vendor: Vendor) -> ConnectionAccount {
    let now = Utc::now();
    ConnectionAccount {
        id: id.into(),
        organization_id: org.into(),
        vendor,
        status: ConnectionStatus::Success,
        error_message: None,
        settings: serde_json::json!({}),
        since: None,
        cursor: None,
        metrics: serde_json::json!({}),
        last_run_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn seed_connection(conn: &Connection, id: &str, org: &str, vendor: Vendor) {
    connections::insert_connection(conn, &connection_account(id, org, vendor)).unwrap();
}

pub(crate) fn fast_http() -> HttpClient {
    HttpClient::from_config(&HttpConfig::default())
        .unwrap()
        .with_policy(RetryPolicy {
            max_attempts: 1,
            base: Duration::from_millis(1),
            max: Duration::from_millis(1),
        })
        .with_rate_limit_buffer(Duration::ZERO)
}

/// Engine over a fresh in-memory database with the given connectors.
pub(crate) async fn engine_with(registry: ConnectorRegistry, polling: PollingConfig) -> Engine {
    let db = Database::open_in_memory().await.unwrap();
    let vault = Arc::new(CredentialVault::new(
        Arc::new(Vault::ephemeral(db.clone()).unwrap()),
        Duration::from_secs(300),
    ));
    let bus = EventBus::standard(DeliveryRouter::default());
    let poller = PollRunner::new(
        db.clone(),
        bus.clone(),
        Arc::new(registry),
        vault,
        fast_http(),
        polling,
    );
    Engine::new(db, bus, poller)
}

pub(crate) async fn engine() -> Engine {
    engine_with(ConnectorRegistry::new(), PollingConfig::default()).await
}

/// Organization `o1` with member A (`a@x.com`), member B, and admin `adm`.
pub(crate) async fn seed_people(engine: &Engine) {
    engine
        .database()
        .call(|conn| {
            seed_org(conn, "o1");
            seed_user(conn, "a", "o1", "a@x.com", "A", "Name", Role::OrganizationMember);
            seed_user(conn, "b", "o1", "b@x.com", "B", "", Role::OrganizationMember);
            seed_user(conn, "adm", "o1", "adm@x.com", "Ad", "Min", Role::OrganizationAdmin);
            seed_control(conn);
            Ok(())
        })
        .await
        .unwrap();
}
