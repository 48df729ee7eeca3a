// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comments, replies, and mentions.

use chrono::{DateTime, Utc};
use laika_core::{
    Attachment, AttachmentKind, Comment, CommentState, LaikaError, Mention, MentionTarget, Reply,
    format_ts,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::row::{enum_col, fmt_opt_ts, opt_ts_col, ts_col};

const COMMENT_COLUMNS: &str = "id, organization_id, owner_id, content, attachment_kind, \
     attachment_id, state, resolved_by, resolved_at, is_deleted, created_at, updated_at";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let kind: AttachmentKind = enum_col(row, 4)?;
    Ok(Comment {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        owner_id: row.get(2)?,
        content: row.get(3)?,
        attachment: Attachment::from_parts(kind, row.get(5)?),
        state: enum_col(row, 6)?,
        resolved_by: row.get(7)?,
        resolved_at: opt_ts_col(row, 8)?,
        is_deleted: row.get(9)?,
        created_at: ts_col(row, 10)?,
        updated_at: ts_col(row, 11)?,
    })
}

fn map_reply(row: &Row<'_>) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get(0)?,
        comment_id: row.get(1)?,
        owner_id: row.get(2)?,
        content: row.get(3)?,
        is_deleted: row.get(4)?,
        created_at: ts_col(row, 5)?,
        updated_at: ts_col(row, 6)?,
    })
}

pub fn insert_comment(conn: &Connection, comment: &Comment) -> Result<(), LaikaError> {
    conn.execute(
        &format!(
            "INSERT INTO comments ({COMMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            comment.id,
            comment.organization_id,
            comment.owner_id,
            comment.content,
            comment.attachment.kind().to_string(),
            comment.attachment.id(),
            comment.state.to_string(),
            comment.resolved_by,
            fmt_opt_ts(comment.resolved_at),
            comment.is_deleted,
            format_ts(comment.created_at),
            format_ts(comment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_comment(conn: &Connection, id: &str) -> Result<Option<Comment>, LaikaError> {
    let comment = conn
        .query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
            params![id],
            map_comment,
        )
        .optional()?;
    Ok(comment)
}

pub fn update_comment_content(
    conn: &Connection,
    id: &str,
    content: &str,
    now: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
        params![content, format_ts(now), id],
    )?;
    Ok(())
}

pub fn resolve_comment(
    conn: &Connection,
    id: &str,
    resolved_by: &str,
    now: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE comments SET state = ?1, resolved_by = ?2, resolved_at = ?3, updated_at = ?3
         WHERE id = ?4",
        params![CommentState::Resolved.to_string(), resolved_by, format_ts(now), id],
    )?;
    Ok(())
}

pub fn soft_delete_comment(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE comments SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
        params![format_ts(now), id],
    )?;
    Ok(())
}

pub fn insert_reply(conn: &Connection, reply: &Reply) -> Result<(), LaikaError> {
    conn.execute(
        "INSERT INTO replies (id, comment_id, owner_id, content, is_deleted, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            reply.id,
            reply.comment_id,
            reply.owner_id,
            reply.content,
            reply.is_deleted,
            format_ts(reply.created_at),
            format_ts(reply.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_reply(conn: &Connection, id: &str) -> Result<Option<Reply>, LaikaError> {
    let reply = conn
        .query_row(
            "SELECT id, comment_id, owner_id, content, is_deleted, created_at, updated_at
             FROM replies WHERE id = ?1",
            params![id],
            map_reply,
        )
        .optional()?;
    Ok(reply)
}

pub fn soft_delete_reply(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE replies SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
        params![format_ts(now), id],
    )?;
    Ok(())
}

/// Record a mention. Returns `false` when the user was already mentioned on
/// the same target.
pub fn insert_mention(conn: &Connection, mention: &Mention) -> Result<bool, LaikaError> {
    let (comment_id, reply_id) = match &mention.target {
        MentionTarget::Comment(id) => (Some(id.as_str()), None),
        MentionTarget::Reply(id) => (None, Some(id.as_str())),
    };
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO mentions (id, user_id, comment_id, reply_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            mention.id,
            mention.user_id,
            comment_id,
            reply_id,
            format_ts(mention.created_at)
        ],
    )?;
    Ok(inserted > 0)
}

/// Users already mentioned on `target`.
pub fn mentioned_user_ids(
    conn: &Connection,
    target: &MentionTarget,
) -> Result<Vec<String>, LaikaError> {
    let (sql, id) = match target {
        MentionTarget::Comment(id) => ("SELECT user_id FROM mentions WHERE comment_id = ?1", id),
        MentionTarget::Reply(id) => ("SELECT user_id FROM mentions WHERE reply_id = ?1", id),
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{conn, seed_control_comment, seed_org, seed_user};
    use laika_core::{Role, new_id};

    #[test]
    fn resolve_sets_both_fields() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_user(&conn, "u1", "o1", "a@x.com", "A", "", Role::OrganizationMember);
        seed_control_comment(&conn, "c1", "o1", "u1", "hello");
        resolve_comment(&conn, "c1", "u1", Utc::now()).unwrap();
        let c = get_comment(&conn, "c1").unwrap().unwrap();
        assert_eq!(c.state, CommentState::Resolved);
        assert_eq!(c.resolved_by.as_deref(), Some("u1"));
        assert!(c.resolved_at.is_some());
    }

    #[test]
    fn resolved_without_resolver_violates_schema() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_user(&conn, "u1", "o1", "a@x.com", "A", "", Role::OrganizationMember);
        seed_control_comment(&conn, "c1", "o1", "u1", "hello");
        let err = conn.execute("UPDATE comments SET state = 'RESOLVED' WHERE id = 'c1'", []);
        assert!(err.is_err());
    }

    #[test]
    fn mentions_dedup_per_target() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_user(&conn, "u1", "o1", "a@x.com", "A", "", Role::OrganizationMember);
        seed_control_comment(&conn, "c1", "o1", "u1", "hi @(a@x.com)");
        let mention = |id: String| Mention {
            id,
            user_id: "u1".into(),
            target: MentionTarget::Comment("c1".into()),
            created_at: Utc::now(),
        };
        assert!(insert_mention(&conn, &mention(new_id())).unwrap());
        assert!(!insert_mention(&conn, &mention(new_id())).unwrap());
        assert_eq!(
            mentioned_user_ids(&conn, &MentionTarget::Comment("c1".into())).unwrap(),
            vec!["u1".to_string()]
        );
    }

    #[test]
    fn mention_must_target_exactly_one_record() {
        let conn = conn();
        seed_org(&conn, "o1");
        seed_user(&conn, "u1", "o1", "a@x.com", "A", "", Role::OrganizationMember);
        let err = conn.execute(
            "INSERT INTO mentions (id, user_id, created_at) VALUES ('m', 'u1', '2026-01-01T00:00:00.000Z')",
            [],
        );
        assert!(err.is_err());
    }
}
