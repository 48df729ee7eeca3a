// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alerts and their back-reference rows.

use chrono::{DateTime, Utc};
use laika_core::{
    Alert, AlertReference, AlertType, Attachment, LaikaError, ReferenceKind, format_ts,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::EvidenceRecord;
use crate::queries::{comments, entities};
use crate::row::{enum_col, ts_col};

const ALERT_COLUMNS: &str =
    "a.id, a.organization_id, a.created_at, a.alert_type, a.sender_id, a.sender_name, a.receiver_id, a.viewed";

const REFERENCE_COLUMNS: &str = "r.kind, r.comment_id, r.reply_id, r.action_item_id, r.audit_id, \
     r.laika_object_id, r.user_id, r.access_review_id, r.training_id, r.question_id, r.quantity";

fn map_alert(row: &Row<'_>) -> rusqlite::Result<Alert> {
    Ok(Alert {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        created_at: ts_col(row, 2)?,
        alert_type: enum_col(row, 3)?,
        sender_id: row.get(4)?,
        sender_name: row.get(5)?,
        receiver_id: row.get(6)?,
        viewed: row.get(7)?,
    })
}

fn missing(idx: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Null,
        format!("alert reference is missing {name}").into(),
    )
}

/// Decode the reference columns starting at `base`.
fn map_reference(row: &Row<'_>, base: usize) -> rusqlite::Result<AlertReference> {
    let kind: ReferenceKind = enum_col(row, base)?;
    let text = |offset: usize, name: &str| -> rusqlite::Result<String> {
        row.get::<_, Option<String>>(base + offset)?
            .ok_or_else(|| missing(base + offset, name))
    };
    let quantity = || -> rusqlite::Result<i64> {
        Ok(row.get::<_, Option<i64>>(base + 10)?.unwrap_or_default())
    };
    Ok(match kind {
        ReferenceKind::CommentAlert => AlertReference::Comment {
            comment_id: text(1, "comment_id")?,
        },
        ReferenceKind::ReplyAlert => AlertReference::Reply {
            reply_id: text(2, "reply_id")?,
        },
        ReferenceKind::SubtaskAlert => AlertReference::Subtask {
            action_item_id: text(3, "action_item_id")?,
        },
        ReferenceKind::AuditAlert => AlertReference::Audit {
            audit_id: text(4, "audit_id")?,
        },
        ReferenceKind::BackgroundCheckAlert => AlertReference::BackgroundCheck {
            laika_object_id: row.get(base + 5)?,
            user_id: row.get(base + 6)?,
        },
        ReferenceKind::AccessReviewAlert => AlertReference::AccessReview {
            access_review_id: text(7, "access_review_id")?,
        },
        ReferenceKind::TrainingAlert => AlertReference::Training {
            training_id: text(8, "training_id")?,
        },
        ReferenceKind::QuestionAlert => AlertReference::Question {
            question_id: text(9, "question_id")?,
        },
        ReferenceKind::PeopleDiscoveryAlert => AlertReference::PeopleDiscovery {
            quantity: quantity()?,
        },
        ReferenceKind::VendorDiscoveryAlert => AlertReference::VendorDiscovery {
            quantity: quantity()?,
        },
        ReferenceKind::LibraryEntryAlert => AlertReference::LibraryEntry {
            quantity: quantity()?,
        },
    })
}

/// Insert an alert together with its single back-reference row.
///
/// The reference kind must be the one the alert type implies.
pub fn insert_alert(
    conn: &Connection,
    alert: &Alert,
    reference: &AlertReference,
) -> Result<(), LaikaError> {
    if reference.kind() != alert.alert_type.reference_kind() {
        return Err(LaikaError::Value(format!(
            "{} alerts need a {} reference, got {}",
            alert.alert_type,
            alert.alert_type.reference_kind(),
            reference.kind()
        )));
    }

    conn.execute(
        "INSERT INTO alerts (id, organization_id, created_at, alert_type, sender_id, sender_name, receiver_id, viewed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            alert.id,
            alert.organization_id,
            format_ts(alert.created_at),
            alert.alert_type.to_string(),
            alert.sender_id,
            alert.sender_name,
            alert.receiver_id,
            alert.viewed,
        ],
    )?;

    let mut comment_id = None;
    let mut reply_id = None;
    let mut action_item_id = None;
    let mut audit_id = None;
    let mut laika_object_id = None;
    let mut user_id = None;
    let mut access_review_id = None;
    let mut training_id = None;
    let mut question_id = None;
    let mut quantity = None;
    match reference {
        AlertReference::Comment { comment_id: id } => comment_id = Some(id),
        AlertReference::Reply { reply_id: id } => reply_id = Some(id),
        AlertReference::Subtask { action_item_id: id } => action_item_id = Some(id),
        AlertReference::Audit { audit_id: id } => audit_id = Some(id),
        AlertReference::BackgroundCheck {
            laika_object_id: object,
            user_id: user,
        } => {
            laika_object_id = object.as_ref();
            user_id = user.as_ref();
        }
        AlertReference::AccessReview { access_review_id: id } => access_review_id = Some(id),
        AlertReference::Training { training_id: id } => training_id = Some(id),
        AlertReference::Question { question_id: id } => question_id = Some(id),
        AlertReference::PeopleDiscovery { quantity: q }
        | AlertReference::VendorDiscovery { quantity: q }
        | AlertReference::LibraryEntry { quantity: q } => quantity = Some(*q),
    }

    conn.execute(
        "INSERT INTO alert_references (alert_id, kind, comment_id, reply_id, action_item_id, audit_id,
             laika_object_id, user_id, access_review_id, training_id, question_id, quantity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            alert.id,
            reference.kind().to_string(),
            comment_id,
            reply_id,
            action_item_id,
            audit_id,
            laika_object_id,
            user_id,
            access_review_id,
            training_id,
            question_id,
            quantity,
        ],
    )?;
    Ok(())
}

pub fn get_alert(
    conn: &Connection,
    id: &str,
) -> Result<Option<(Alert, AlertReference)>, LaikaError> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {ALERT_COLUMNS}, {REFERENCE_COLUMNS}
                 FROM alerts a JOIN alert_references r ON r.alert_id = a.id
                 WHERE a.id = ?1"
            ),
            params![id],
            |row| Ok((map_alert(row)?, map_reference(row, 8)?)),
        )
        .optional()?;
    Ok(found)
}

/// Alerts of `receiver_id` created at or after `since`, newest first.
pub fn list_for_receiver_since(
    conn: &Connection,
    receiver_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<(Alert, AlertReference)>, LaikaError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALERT_COLUMNS}, {REFERENCE_COLUMNS}
         FROM alerts a JOIN alert_references r ON r.alert_id = a.id
         WHERE a.receiver_id = ?1 AND a.created_at >= ?2
         ORDER BY a.created_at DESC, a.id"
    ))?;
    let rows = stmt.query_map(params![receiver_id, format_ts(since)], |row| {
        Ok((map_alert(row)?, map_reference(row, 8)?))
    })?;
    let mut alerts = Vec::new();
    for row in rows {
        alerts.push(row?);
    }
    Ok(alerts)
}

/// All alerts of a type, oldest first.
pub fn list_by_type(conn: &Connection, alert_type: AlertType) -> Result<Vec<Alert>, LaikaError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALERT_COLUMNS} FROM alerts a WHERE a.alert_type = ?1 ORDER BY a.created_at, a.id"
    ))?;
    let rows = stmt.query_map(params![alert_type.to_string()], map_alert)?;
    let mut alerts = Vec::new();
    for row in rows {
        alerts.push(row?);
    }
    Ok(alerts)
}

pub fn mark_viewed(conn: &Connection, id: &str) -> Result<(), LaikaError> {
    conn.execute("UPDATE alerts SET viewed = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

/// Comment an alert's comment or reply reference ultimately points at.
pub fn comment_id_for_reference(
    conn: &Connection,
    reference: &AlertReference,
) -> Result<Option<String>, LaikaError> {
    match reference {
        AlertReference::Comment { comment_id } => Ok(Some(comment_id.clone())),
        AlertReference::Reply { reply_id } => {
            Ok(comments::get_reply(conn, reply_id)?.map(|r| r.comment_id))
        }
        _ => Ok(None),
    }
}

/// Evidence behind an evidence mention or reply alert.
pub fn evidence_for_alert(
    conn: &Connection,
    alert_id: &str,
) -> Result<Option<EvidenceRecord>, LaikaError> {
    let Some((_, reference)) = get_alert(conn, alert_id)? else {
        return Ok(None);
    };
    let Some(comment_id) = comment_id_for_reference(conn, &reference)? else {
        return Ok(None);
    };
    let Some(comment) = comments::get_comment(conn, &comment_id)? else {
        return Ok(None);
    };
    match comment.attachment {
        Attachment::Evidence(id) => entities::get_evidence(conn, &id),
        _ => Ok(None),
    }
}
