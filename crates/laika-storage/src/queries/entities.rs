// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal entity tables: the things comments attach to and alerts point at.

use chrono::{DateTime, Utc};
use laika_core::{ActionItem, Attachment, EvidenceStatus, LaikaError, format_ts};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::EvidenceRecord;
use crate::row::{enum_col, fmt_opt_ts, opt_ts_col, ts_col};

/// Entity tables that carry only a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTable {
    Control,
    Policy,
    Task,
    AccessReview,
    Training,
    Question,
}

impl NamedTable {
    fn table(self) -> &'static str {
        match self {
            NamedTable::Control => "controls",
            NamedTable::Policy => "policies",
            NamedTable::Task => "tasks",
            NamedTable::AccessReview => "access_reviews",
            NamedTable::Training => "trainings",
            NamedTable::Question => "questions",
        }
    }
}

/// Entity tables that belong to an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTable {
    Evidence,
    Requirement,
    Population,
}

impl AuditTable {
    fn table(self) -> &'static str {
        match self {
            AuditTable::Evidence => "evidence",
            AuditTable::Requirement => "requirements",
            AuditTable::Population => "populations",
        }
    }
}

pub fn insert_named(
    conn: &Connection,
    table: NamedTable,
    id: &str,
    organization_id: &str,
    name: &str,
    created_at: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        &format!(
            "INSERT INTO {} (id, organization_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            table.table()
        ),
        params![id, organization_id, name, format_ts(created_at)],
    )?;
    Ok(())
}

pub fn insert_audit_entity(
    conn: &Connection,
    table: AuditTable,
    id: &str,
    organization_id: &str,
    audit_id: &str,
    name: &str,
    created_at: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        &format!(
            "INSERT INTO {} (id, organization_id, audit_id, name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            table.table()
        ),
        params![id, organization_id, audit_id, name, format_ts(created_at)],
    )?;
    Ok(())
}

pub fn set_evidence_status(
    conn: &Connection,
    id: &str,
    status: EvidenceStatus,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE evidence SET status = ?1 WHERE id = ?2",
        params![status.to_string(), id],
    )?;
    Ok(())
}

pub fn get_evidence(conn: &Connection, id: &str) -> Result<Option<EvidenceRecord>, LaikaError> {
    let evidence = conn
        .query_row(
            "SELECT id, organization_id, audit_id, name, status FROM evidence WHERE id = ?1",
            params![id],
            |row| {
                Ok(EvidenceRecord {
                    id: row.get(0)?,
                    organization_id: row.get(1)?,
                    audit_id: row.get(2)?,
                    name: row.get(3)?,
                    status: enum_col(row, 4)?,
                })
            },
        )
        .optional()?;
    Ok(evidence)
}

fn lookup(
    conn: &Connection,
    sql: &str,
    id: &str,
) -> Result<Option<(String, String, Option<String>)>, LaikaError> {
    let found = conn
        .query_row(sql, params![id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .optional()?;
    Ok(found)
}

/// `(organization_id, name, audit_id)` of the entity behind an attachment.
fn attachment_row(
    conn: &Connection,
    attachment: &Attachment,
) -> Result<Option<(String, String, Option<String>)>, LaikaError> {
    let id = attachment.id();
    match attachment {
        Attachment::Control(_) => lookup(
            conn,
            "SELECT organization_id, name, NULL FROM controls WHERE id = ?1",
            id,
        ),
        Attachment::Policy(_) => lookup(
            conn,
            "SELECT organization_id, name, NULL FROM policies WHERE id = ?1",
            id,
        ),
        Attachment::Task(_) => lookup(
            conn,
            "SELECT organization_id, name, NULL FROM tasks WHERE id = ?1",
            id,
        ),
        Attachment::Evidence(_) => lookup(
            conn,
            "SELECT organization_id, name, audit_id FROM evidence WHERE id = ?1",
            id,
        ),
        Attachment::Requirement(_) => lookup(
            conn,
            "SELECT organization_id, name, audit_id FROM requirements WHERE id = ?1",
            id,
        ),
        Attachment::Population(_) => lookup(
            conn,
            "SELECT organization_id, name, audit_id FROM populations WHERE id = ?1",
            id,
        ),
        Attachment::DraftReport(_) => lookup(
            conn,
            "SELECT organization_id, name, id FROM audits WHERE id = ?1",
            id,
        ),
    }
}

/// Owning organization of the attached entity, `None` when it does not exist.
pub fn attachment_organization(
    conn: &Connection,
    attachment: &Attachment,
) -> Result<Option<String>, LaikaError> {
    Ok(attachment_row(conn, attachment)?.map(|(org, _, _)| org))
}

pub fn entity_name(conn: &Connection, attachment: &Attachment) -> Result<Option<String>, LaikaError> {
    Ok(attachment_row(conn, attachment)?.map(|(_, name, _)| name))
}

/// Audit an attachment belongs to. Draft reports are the audit itself.
pub fn attachment_audit(
    conn: &Connection,
    attachment: &Attachment,
) -> Result<Option<String>, LaikaError> {
    Ok(attachment_row(conn, attachment)?.and_then(|(_, _, audit)| audit))
}

const ACTION_ITEM_COLUMNS: &str =
    "id, organization_id, name, control_id, assignee_id, created_by, due_date, completed_at, created_at";

fn map_action_item(row: &Row<'_>) -> rusqlite::Result<ActionItem> {
    Ok(ActionItem {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        control_id: row.get(3)?,
        assignee_id: row.get(4)?,
        created_by: row.get(5)?,
        due_date: opt_ts_col(row, 6)?,
        completed_at: opt_ts_col(row, 7)?,
        created_at: ts_col(row, 8)?,
    })
}

pub fn insert_action_item(conn: &Connection, item: &ActionItem) -> Result<(), LaikaError> {
    conn.execute(
        &format!("INSERT INTO action_items ({ACTION_ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            item.id,
            item.organization_id,
            item.name,
            item.control_id,
            item.assignee_id,
            item.created_by,
            fmt_opt_ts(item.due_date),
            fmt_opt_ts(item.completed_at),
            format_ts(item.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_action_item(conn: &Connection, id: &str) -> Result<Option<ActionItem>, LaikaError> {
    let item = conn
        .query_row(
            &format!("SELECT {ACTION_ITEM_COLUMNS} FROM action_items WHERE id = ?1"),
            params![id],
            map_action_item,
        )
        .optional()?;
    Ok(item)
}

pub fn assign_action_item(
    conn: &Connection,
    id: &str,
    assignee_id: &str,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE action_items SET assignee_id = ?1, completed_at = NULL WHERE id = ?2",
        params![assignee_id, id],
    )?;
    Ok(())
}

pub fn complete_action_item(
    conn: &Connection,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE action_items SET completed_at = ?1 WHERE id = ?2",
        params![format_ts(at), id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{conn, seed_audit, seed_org};

    #[test]
    fn attachment_lookups_cover_every_kind() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_audit(&conn, "a1", "o1");
        let now = Utc::now();
        insert_named(&conn, NamedTable::Control, "ctl", "o1", "Ctl-1", now).unwrap();
        insert_audit_entity(&conn, AuditTable::Evidence, "ev", "o1", "a1", "Ev-1", now).unwrap();

        assert_eq!(
            entity_name(&conn, &Attachment::Control("ctl".into())).unwrap().as_deref(),
            Some("Ctl-1")
        );
        assert_eq!(
            attachment_audit(&conn, &Attachment::Evidence("ev".into())).unwrap().as_deref(),
            Some("a1")
        );
        assert_eq!(
            attachment_audit(&conn, &Attachment::DraftReport("a1".into())).unwrap().as_deref(),
            Some("a1")
        );
        assert_eq!(
            attachment_organization(&conn, &Attachment::Policy("missing".into())).unwrap(),
            None
        );
    }

    #[test]
    fn evidence_status_keeps_its_stored_form() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_audit(&conn, "a1", "o1");
        insert_audit_entity(&conn, AuditTable::Evidence, "ev", "o1", "a1", "Ev", Utc::now())
            .unwrap();
        assert_eq!(get_evidence(&conn, "ev").unwrap().unwrap().status, EvidenceStatus::Open);
        set_evidence_status(&conn, "ev", EvidenceStatus::AuditorAccepted).unwrap();
        assert_eq!(
            get_evidence(&conn, "ev").unwrap().unwrap().status,
            EvidenceStatus::AuditorAccepted
        );
    }
}
