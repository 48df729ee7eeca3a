// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Laika-object store: normalized vendor records keyed by
//! `(organization_id, object_type, data["Id"])`.

use chrono::{DateTime, Utc};
use laika_core::{LaikaError, LaikaObject, ObjectType, fields, format_ts, natural_key, new_id};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Map, Value};

use crate::models::{UpsertOutcome, UpsertResult};
use crate::queries::{folded, person_matches};
use crate::row::{enum_col, json_col, ts_col};

const OBJECT_COLUMNS: &str =
    "id, organization_id, object_type, connection_account_id, data, created_at, updated_at";

/// Keys written back by correlation that a vendor record never carries.
const WRITE_BACK_KEYS: &[&str] = &[fields::LINK_TO_PEOPLE_TABLE];

fn map_object(row: &Row<'_>) -> rusqlite::Result<LaikaObject> {
    Ok(LaikaObject {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        object_type: enum_col(row, 2)?,
        connection_account_id: row.get(3)?,
        data: json_col(row, 4)?,
        created_at: ts_col(row, 5)?,
        updated_at: ts_col(row, 6)?,
    })
}

fn collect(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<LaikaObject>, LaikaError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map_object)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Insert or replace a record by natural key.
///
/// An identical replay is `Unchanged` and touches nothing.
pub fn upsert_object(
    conn: &Connection,
    organization_id: &str,
    object_type: ObjectType,
    connection_account_id: Option<&str>,
    data: Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<UpsertResult, LaikaError> {
    let natural_id = natural_key(&data)?;
    let existing = conn
        .query_row(
            &format!(
                "SELECT {OBJECT_COLUMNS} FROM laika_objects
                 WHERE organization_id = ?1 AND object_type = ?2 AND natural_id = ?3"
            ),
            params![organization_id, object_type.to_string(), natural_id],
            map_object,
        )
        .optional()?;

    let Some(existing) = existing else {
        let id = new_id();
        conn.execute(
            &format!(
                "INSERT INTO laika_objects ({OBJECT_COLUMNS}, natural_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)"
            ),
            params![
                id,
                organization_id,
                object_type.to_string(),
                connection_account_id,
                serde_json::to_string(&data)?,
                format_ts(now),
                natural_id,
            ],
        )?;
        return Ok(UpsertResult {
            outcome: UpsertOutcome::Created,
            object_id: id,
        });
    };

    let mut merged = data;
    for key in WRITE_BACK_KEYS {
        if !merged.contains_key(*key) {
            if let Some(value) = existing.data.get(*key) {
                merged.insert((*key).to_string(), value.clone());
            }
        }
    }

    if merged == existing.data {
        return Ok(UpsertResult {
            outcome: UpsertOutcome::Unchanged,
            object_id: existing.id,
        });
    }

    conn.execute(
        "UPDATE laika_objects
         SET data = ?1, updated_at = ?2,
             connection_account_id = COALESCE(?3, connection_account_id)
         WHERE id = ?4",
        params![
            serde_json::to_string(&merged)?,
            format_ts(now),
            connection_account_id,
            existing.id
        ],
    )?;
    Ok(UpsertResult {
        outcome: UpsertOutcome::Updated,
        object_id: existing.id,
    })
}

pub fn get_object(conn: &Connection, id: &str) -> Result<Option<LaikaObject>, LaikaError> {
    let object = conn
        .query_row(
            &format!("SELECT {OBJECT_COLUMNS} FROM laika_objects WHERE id = ?1"),
            params![id],
            map_object,
        )
        .optional()?;
    Ok(object)
}

pub fn list_by_type(
    conn: &Connection,
    organization_id: &str,
    object_type: ObjectType,
) -> Result<Vec<LaikaObject>, LaikaError> {
    collect(
        conn,
        &format!(
            "SELECT {OBJECT_COLUMNS} FROM laika_objects
             WHERE organization_id = ?1 AND object_type = ?2
             ORDER BY created_at, id"
        ),
        params![organization_id, object_type.to_string()],
    )
}

/// Set one data key, used for correlation write-back.
pub fn set_field(
    conn: &Connection,
    id: &str,
    key: &str,
    value: Value,
    now: DateTime<Utc>,
) -> Result<(), LaikaError> {
    let Some(mut object) = get_object(conn, id)? else {
        return Err(LaikaError::NotFound {
            resource: format!("laika object {id}"),
        });
    };
    object.data.insert(key.to_string(), value);
    conn.execute(
        "UPDATE laika_objects SET data = ?1, updated_at = ?2 WHERE id = ?3",
        params![serde_json::to_string(&object.data)?, format_ts(now), id],
    )?;
    Ok(())
}

pub fn count_by_connection(conn: &Connection, connection_account_id: &str) -> Result<i64, LaikaError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM laika_objects WHERE connection_account_id = ?1",
        params![connection_account_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_all(conn: &Connection, organization_id: &str) -> Result<i64, LaikaError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM laika_objects WHERE organization_id = ?1",
        params![organization_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Records of `object_type` whose trimmed `First Name` and `Last Name` match,
/// or whose `Email` matches, ignoring case. With `unlinked_only`, records
/// already carrying `Link to People Table` are skipped.
pub fn match_by_person(
    conn: &Connection,
    organization_id: &str,
    object_type: ObjectType,
    first_name: &str,
    last_name: &str,
    email: &str,
    unlinked_only: bool,
) -> Result<Vec<LaikaObject>, LaikaError> {
    let (first, last, email) = (folded(first_name), folded(last_name), folded(email));
    if email.is_empty() && (first.is_empty() || last.is_empty()) {
        return Ok(Vec::new());
    }
    let candidates = collect(
        conn,
        &format!(
            "SELECT {OBJECT_COLUMNS} FROM laika_objects
             WHERE organization_id = ?1 AND object_type = ?2
               AND (?3 = 0 OR COALESCE(trim(json_extract(data, '$.\"Link to People Table\"')), '') = '')
             ORDER BY created_at, id"
        ),
        params![organization_id, object_type.to_string(), unlinked_only],
    )?;
    Ok(candidates
        .into_iter()
        .filter(|object| {
            let field = |key: &str| object.field_str(key).unwrap_or_default();
            person_matches(
                (field(fields::FIRST_NAME), field(fields::LAST_NAME), field(fields::EMAIL)),
                (first.as_str(), last.as_str(), email.as_str()),
            )
        })
        .collect())
}
