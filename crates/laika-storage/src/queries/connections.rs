// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection accounts and their encrypted credential rows.

use chrono::{DateTime, Utc};
use laika_core::{
    ConnectionAccount, ConnectionStatus, LaikaError, PollCursor, Vendor, format_ts,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::CredentialRow;
use crate::row::{enum_col, fmt_opt_ts, json_col, opt_json_col, opt_ts_col, ts_col};

const CONNECTION_COLUMNS: &str = "id, organization_id, vendor, status, error_message, settings, \
     since, cursor, metrics, last_run_at, created_at, updated_at";

fn map_connection(row: &Row<'_>) -> rusqlite::Result<ConnectionAccount> {
    Ok(ConnectionAccount {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        vendor: enum_col(row, 2)?,
        status: enum_col(row, 3)?,
        error_message: row.get(4)?,
        settings: json_col(row, 5)?,
        since: opt_ts_col(row, 6)?,
        cursor: opt_json_col::<PollCursor>(row, 7)?,
        metrics: json_col(row, 8)?,
        last_run_at: opt_ts_col(row, 9)?,
        created_at: ts_col(row, 10)?,
        updated_at: ts_col(row, 11)?,
    })
}

pub fn insert_connection(conn: &Connection, account: &ConnectionAccount) -> Result<(), LaikaError> {
    let cursor = account
        .cursor
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        &format!(
            "INSERT INTO connection_accounts ({CONNECTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            account.id,
            account.organization_id,
            account.vendor.to_string(),
            account.status.to_string(),
            account.error_message,
            serde_json::to_string(&account.settings)?,
            fmt_opt_ts(account.since),
            cursor,
            serde_json::to_string(&account.metrics)?,
            fmt_opt_ts(account.last_run_at),
            format_ts(account.created_at),
            format_ts(account.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_connection(conn: &Connection, id: &str) -> Result<Option<ConnectionAccount>, LaikaError> {
    let account = conn
        .query_row(
            &format!("SELECT {CONNECTION_COLUMNS} FROM connection_accounts WHERE id = ?1"),
            params![id],
            map_connection,
        )
        .optional()?;
    Ok(account)
}

/// Connections a poll tick should visit: everything not flagged as broken.
pub fn list_pollable(conn: &Connection) -> Result<Vec<ConnectionAccount>, LaikaError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONNECTION_COLUMNS} FROM connection_accounts
         WHERE status <> ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![ConnectionStatus::Error.to_string()], map_connection)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Record the outcome of a finished poll run and clear any saved cursor.
pub fn update_after_poll(
    conn: &Connection,
    id: &str,
    since: DateTime<Utc>,
    metrics: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE connection_accounts
         SET status = ?1, error_message = NULL, since = ?2, cursor = NULL,
             metrics = ?3, last_run_at = ?4, updated_at = ?4
         WHERE id = ?5",
        params![
            ConnectionStatus::Success.to_string(),
            format_ts(since),
            serde_json::to_string(metrics)?,
            format_ts(now),
            id
        ],
    )?;
    Ok(())
}

/// Persist a resume cursor for an interrupted run.
pub fn save_cursor(
    conn: &Connection,
    id: &str,
    cursor: &PollCursor,
    metrics: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE connection_accounts
         SET cursor = ?1, metrics = ?2, last_run_at = ?3, updated_at = ?3
         WHERE id = ?4",
        params![
            serde_json::to_string(cursor)?,
            serde_json::to_string(metrics)?,
            format_ts(now),
            id
        ],
    )?;
    Ok(())
}

pub fn mark_error(
    conn: &Connection,
    id: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE connection_accounts SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
        params![ConnectionStatus::Error.to_string(), message, format_ts(now), id],
    )?;
    Ok(())
}

pub fn mark_success(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE connection_accounts SET status = ?1, error_message = NULL, updated_at = ?2 WHERE id = ?3",
        params![ConnectionStatus::Success.to_string(), format_ts(now), id],
    )?;
    Ok(())
}

/// Delete a connection. Its laika objects and credential go with it.
/// Returns the number of objects removed, or `None` for an unknown id.
pub fn delete_connection(conn: &Connection, id: &str) -> Result<Option<usize>, LaikaError> {
    let removed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM laika_objects WHERE connection_account_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let deleted = conn.execute("DELETE FROM connection_accounts WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Ok(None);
    }
    Ok(Some(usize::try_from(removed).unwrap_or_default()))
}

/// The organization's Slack connection in `success` state, if any.
pub fn active_slack_connection(
    conn: &Connection,
    organization_id: &str,
) -> Result<Option<ConnectionAccount>, LaikaError> {
    let account = conn
        .query_row(
            &format!(
                "SELECT {CONNECTION_COLUMNS} FROM connection_accounts
                 WHERE organization_id = ?1 AND vendor = ?2 AND status = ?3
                 ORDER BY updated_at DESC LIMIT 1"
            ),
            params![
                organization_id,
                Vendor::Slack.to_string(),
                ConnectionStatus::Success.to_string()
            ],
            map_connection,
        )
        .optional()?;
    Ok(account)
}

pub fn upsert_credential(conn: &Connection, row: &CredentialRow) -> Result<(), LaikaError> {
    conn.execute(
        "INSERT INTO credentials (connection_id, vendor, auth_kind, subdomain, expires_at, regions, ciphertext, nonce, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(connection_id) DO UPDATE SET
             vendor = excluded.vendor,
             auth_kind = excluded.auth_kind,
             subdomain = excluded.subdomain,
             expires_at = excluded.expires_at,
             regions = excluded.regions,
             ciphertext = excluded.ciphertext,
             nonce = excluded.nonce,
             updated_at = excluded.updated_at",
        params![
            row.connection_id,
            row.vendor.to_string(),
            row.auth_kind.to_string(),
            row.subdomain,
            fmt_opt_ts(row.expires_at),
            serde_json::to_string(&row.regions)?,
            row.ciphertext,
            row.nonce,
            format_ts(row.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_credential(conn: &Connection, connection_id: &str) -> Result<Option<CredentialRow>, LaikaError> {
    let row = conn
        .query_row(
            "SELECT connection_id, vendor, auth_kind, subdomain, expires_at, regions, ciphertext, nonce, updated_at
             FROM credentials WHERE connection_id = ?1",
            params![connection_id],
            |row| {
                Ok(CredentialRow {
                    connection_id: row.get(0)?,
                    vendor: enum_col(row, 1)?,
                    auth_kind: enum_col(row, 2)?,
                    subdomain: row.get(3)?,
                    expires_at: opt_ts_col(row, 4)?,
                    regions: json_col(row, 5)?,
                    ciphertext: row.get(6)?,
                    nonce: row.get(7)?,
                    updated_at: ts_col(row, 8)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}
