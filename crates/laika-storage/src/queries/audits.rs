// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit and audit-team queries.

use chrono::{DateTime, Utc};
use laika_core::{Audit, AuditStage, LaikaError, User, format_ts};
use rusqlite::{Connection, OptionalExtension, params};

use crate::queries::users::map_user;
use crate::row::{enum_col, fmt_opt_ts, opt_ts_col, ts_col};

pub fn insert_audit(conn: &Connection, audit: &Audit) -> Result<(), LaikaError> {
    conn.execute(
        "INSERT INTO audits (id, organization_id, name, audit_type, status, completed_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            audit.id,
            audit.organization_id,
            audit.name,
            audit.audit_type,
            audit.stage.to_string(),
            fmt_opt_ts(audit.completed_at),
            format_ts(audit.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_audit(conn: &Connection, id: &str) -> Result<Option<Audit>, LaikaError> {
    let audit = conn
        .query_row(
            "SELECT id, organization_id, name, audit_type, status, completed_at, created_at
             FROM audits WHERE id = ?1",
            params![id],
            |row| {
                Ok(Audit {
                    id: row.get(0)?,
                    organization_id: row.get(1)?,
                    name: row.get(2)?,
                    audit_type: row.get(3)?,
                    stage: enum_col(row, 4)?,
                    completed_at: opt_ts_col(row, 5)?,
                    created_at: ts_col(row, 6)?,
                })
            },
        )
        .optional()?;
    Ok(audit)
}

/// Store a new stage. Reaching `completed` also stamps `completed_at`.
pub fn update_stage(
    conn: &Connection,
    id: &str,
    stage: AuditStage,
    now: DateTime<Utc>,
) -> Result<(), LaikaError> {
    let completed_at = (stage == AuditStage::Completed).then(|| format_ts(now));
    conn.execute(
        "UPDATE audits SET status = ?1, completed_at = COALESCE(?2, completed_at) WHERE id = ?3",
        params![stage.to_string(), completed_at, id],
    )?;
    Ok(())
}

pub fn add_team_member(conn: &Connection, audit_id: &str, user_id: &str) -> Result<(), LaikaError> {
    conn.execute(
        "INSERT OR IGNORE INTO audit_team (audit_id, user_id) VALUES (?1, ?2)",
        params![audit_id, user_id],
    )?;
    Ok(())
}

pub fn team_members(conn: &Connection, audit_id: &str) -> Result<Vec<User>, LaikaError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.organization_id, u.email, u.first_name, u.last_name, u.role,
                u.user_preferences, u.discovery_state, u.employment_type, u.is_active, u.date_joined
         FROM audit_team t JOIN users u ON u.id = t.user_id
         WHERE t.audit_id = ?1
         ORDER BY u.email",
    )?;
    let rows = stmt.query_map(params![audit_id], map_user)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

pub fn is_team_member(conn: &Connection, audit_id: &str, user_id: &str) -> Result<bool, LaikaError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM audit_team WHERE audit_id = ?1 AND user_id = ?2",
            params![audit_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{conn, seed_audit, seed_org, seed_user};
    use laika_core::Role;

    #[test]
    fn completing_stamps_completed_at() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_audit(&conn, "a1", "o1");
        update_stage(&conn, "a1", AuditStage::Initiated, Utc::now()).unwrap();
        let audit = get_audit(&conn, "a1").unwrap().unwrap();
        assert_eq!(audit.stage, AuditStage::Initiated);
        assert!(audit.completed_at.is_none());

        update_stage(&conn, "a1", AuditStage::Completed, Utc::now()).unwrap();
        assert!(get_audit(&conn, "a1").unwrap().unwrap().completed_at.is_some());
    }

    #[test]
    fn team_membership() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_org(&conn, "firm");
        seed_audit(&conn, "a1", "o1");
        seed_user(&conn, "aud", "firm", "aud@firm.com", "A", "", Role::Auditor);
        add_team_member(&conn, "a1", "aud").unwrap();
        add_team_member(&conn, "a1", "aud").unwrap();
        assert_eq!(team_members(&conn, "a1").unwrap().len(), 1);
        assert!(is_team_member(&conn, "a1", "aud").unwrap());
        assert!(!is_team_member(&conn, "a1", "nobody").unwrap());
    }
}
