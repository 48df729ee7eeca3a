// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw comment, reply, and mention rows for the launchpad catalogue.

use laika_core::{Attachment, AttachmentKind, LaikaError};
use rusqlite::{Connection, Row, params};

use crate::models::{LaunchpadRecord, LaunchpadRecordKind};
use crate::row::{enum_col, ts_col};

/// Joins every query shares: the comment `c` plus its attachment.
const ATTACHMENT_JOINS: &str = "
    LEFT JOIN controls ctl ON c.attachment_kind = 'control' AND ctl.id = c.attachment_id
    LEFT JOIN evidence ev ON c.attachment_kind = 'evidence' AND ev.id = c.attachment_id
    LEFT JOIN audits dr ON c.attachment_kind = 'draft_report' AND dr.id = c.attachment_id";

/// Columns 4.. every query shares, in [`map_record`] order.
const ATTACHMENT_COLUMNS: &str = "
    c.attachment_kind, c.attachment_id,
    COALESCE(ctl.name, ev.name, dr.name, ''),
    COALESCE(ev.audit_id, dr.id),
    ev.status,
    dr.completed_at IS NOT NULL";

const SCOPE: &str = "c.organization_id = ?1 AND c.attachment_kind IN ('control', 'evidence', 'draft_report')";

fn person(first: String, last: String, email: String) -> String {
    let name = format!("{} {}", first.trim(), last.trim());
    let name = name.trim();
    if name.is_empty() { email } else { name.to_string() }
}

fn map_record(kind: LaunchpadRecordKind, row: &Row<'_>) -> rusqlite::Result<LaunchpadRecord> {
    let attachment_kind: AttachmentKind = enum_col(row, 3)?;
    let evidence_status: Option<String> = row.get(7)?;
    let evidence_status = match evidence_status {
        Some(_) => Some(enum_col(row, 7)?),
        None => None,
    };
    let mentioned_email: Option<String> = row.get(15)?;
    let mentioned_name = match mentioned_email {
        Some(email) => Some(person(
            row.get::<_, Option<String>>(13)?.unwrap_or_default(),
            row.get::<_, Option<String>>(14)?.unwrap_or_default(),
            email,
        )),
        None => None,
    };
    Ok(LaunchpadRecord {
        kind,
        id: row.get(0)?,
        comment_id: row.get(1)?,
        content: row.get(2)?,
        attachment: Attachment::from_parts(attachment_kind, row.get(4)?),
        attachment_name: row.get(5)?,
        audit_id: row.get(6)?,
        evidence_status,
        audit_completed: row.get(8)?,
        owner_name: person(row.get(9)?, row.get(10)?, row.get(11)?),
        mentioned_name,
        deleted: row.get(12)?,
        parent_deleted: row.get(16)?,
        created_at: ts_col(row, 17)?,
    })
}

fn run(
    conn: &Connection,
    kind: LaunchpadRecordKind,
    sql: &str,
    organization_id: &str,
) -> Result<Vec<LaunchpadRecord>, LaikaError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![organization_id], |row| map_record(kind, row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn list_comment_records(
    conn: &Connection,
    organization_id: &str,
) -> Result<Vec<LaunchpadRecord>, LaikaError> {
    let sql = format!(
        "SELECT c.id, c.id, c.content, {ATTACHMENT_COLUMNS},
                o.first_name, o.last_name, o.email, c.is_deleted,
                NULL, NULL, NULL, 0, c.created_at
         FROM comments c
         JOIN users o ON o.id = c.owner_id
         {ATTACHMENT_JOINS}
         WHERE {SCOPE}
         ORDER BY c.created_at, c.id"
    );
    run(conn, LaunchpadRecordKind::Comment, &sql, organization_id)
}

pub fn list_reply_records(
    conn: &Connection,
    organization_id: &str,
) -> Result<Vec<LaunchpadRecord>, LaikaError> {
    let sql = format!(
        "SELECT r.id, c.id, r.content, {ATTACHMENT_COLUMNS},
                o.first_name, o.last_name, o.email, r.is_deleted,
                NULL, NULL, NULL, c.is_deleted, r.created_at
         FROM replies r
         JOIN comments c ON c.id = r.comment_id
         JOIN users o ON o.id = r.owner_id
         {ATTACHMENT_JOINS}
         WHERE {SCOPE}
         ORDER BY r.created_at, r.id"
    );
    run(conn, LaunchpadRecordKind::Reply, &sql, organization_id)
}

/// Mentions inherit content, owner, and deletion from the comment or reply
/// they point at.
pub fn list_mention_records(
    conn: &Connection,
    organization_id: &str,
) -> Result<Vec<LaunchpadRecord>, LaikaError> {
    let sql = format!(
        "SELECT m.id, c.id, COALESCE(r.content, c.content), {ATTACHMENT_COLUMNS},
                o.first_name, o.last_name, o.email, COALESCE(r.is_deleted, c.is_deleted),
                mu.first_name, mu.last_name, mu.email,
                CASE WHEN r.id IS NULL THEN 0 ELSE c.is_deleted END,
                m.created_at
         FROM mentions m
         LEFT JOIN replies r ON r.id = m.reply_id
         JOIN comments c ON c.id = COALESCE(m.comment_id, r.comment_id)
         JOIN users o ON o.id = COALESCE(r.owner_id, c.owner_id)
         JOIN users mu ON mu.id = m.user_id
         {ATTACHMENT_JOINS}
         WHERE {SCOPE}
         ORDER BY m.created_at, m.id"
    );
    run(conn, LaunchpadRecordKind::Mention, &sql, organization_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::comments;
    use crate::test_support::{conn, seed_control_comment, seed_org, seed_user};
    use chrono::Utc;
    use laika_core::{Mention, MentionTarget, Reply, Role};

    #[test]
    fn records_carry_names_and_deletion_flags() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_user(&conn, "u1", "o1", "a@x.com", "Ann", "Lee", Role::OrganizationMember);
        seed_user(&conn, "u2", "o1", "b@x.com", "", "", Role::OrganizationMember);
        seed_control_comment(&conn, "c1", "o1", "u1", "Review @(b@x.com)");
        let now = Utc::now();
        comments::insert_reply(
            &conn,
            &Reply {
                id: "r1".into(),
                comment_id: "c1".into(),
                owner_id: "u2".into(),
                content: "done".into(),
                is_deleted: false,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
        comments::insert_mention(
            &conn,
            &Mention {
                id: "m1".into(),
                user_id: "u2".into(),
                target: MentionTarget::Comment("c1".into()),
                created_at: now,
            },
        )
        .unwrap();
        comments::soft_delete_comment(&conn, "c1", now).unwrap();

        let c = list_comment_records(&conn, "o1").unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].attachment_name, "Ctl-1");
        assert_eq!(c[0].owner_name, "Ann Lee");
        assert!(c[0].deleted);

        let r = list_reply_records(&conn, "o1").unwrap();
        assert_eq!(r[0].owner_name, "b@x.com");
        assert!(!r[0].deleted);
        assert!(r[0].parent_deleted);

        let m = list_mention_records(&conn, "o1").unwrap();
        assert_eq!(m[0].mentioned_name.as_deref(), Some("b@x.com"));
        assert!(m[0].deleted);
    }
}
