// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for the crash-safe delivery outbox.
//!
//! `enqueue_in` writes inside a caller's transaction so jobs commit together
//! with the alert rows they deliver.

use laika_core::LaikaError;
use rusqlite::{Connection, Row, params};

use crate::database::Database;
use crate::models::QueueEntry;

fn map_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        locked_until: row.get(9)?,
    })
}

/// Enqueue on an open connection or transaction. Returns the entry ID.
pub fn enqueue_in(
    conn: &Connection,
    queue_name: &str,
    payload: &str,
    max_attempts: i32,
) -> Result<i64, LaikaError> {
    conn.execute(
        "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
        params![queue_name, payload, max_attempts.max(1)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Enqueue a new item with the default of three attempts.
pub async fn enqueue(db: &Database, queue_name: &str, payload: &str) -> Result<i64, LaikaError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.call(move |conn| enqueue_in(conn, &queue_name, &payload, 3))
        .await
}

/// Dequeue the next pending entry from the named queue.
///
/// Atomically selects the oldest pending entry and marks it as "processing"
/// with a 5-minute lock timeout. Returns `None` if the queue is empty.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, LaikaError> {
    let queue_name = queue_name.to_string();
    db.transaction(move |tx| {
        let mut stmt = tx.prepare(
            "SELECT id, queue_name, payload, status, attempts, max_attempts, last_error,
                    created_at, updated_at, locked_until
             FROM queue
             WHERE queue_name = ?1 AND status = 'pending'
             ORDER BY id ASC
             LIMIT 1",
        )?;
        let result = stmt.query_row(params![queue_name], map_entry);

        match result {
            Ok(entry) => {
                tx.execute(
                    "UPDATE queue SET status = 'processing',
                     locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![entry.id],
                )?;
                Ok(Some(QueueEntry {
                    status: "processing".to_string(),
                    ..entry
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    })
    .await
}

/// Acknowledge successful processing of a queue entry.
pub async fn ack(db: &Database, id: i64) -> Result<(), LaikaError> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE queue SET status = 'completed', locked_until = NULL,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
    .await
}

/// Mark a queue entry as failed.
///
/// Increments attempts. If attempts >= max_attempts, sets status to "failed".
/// Otherwise resets to "pending" for retry and clears the lock.
pub async fn fail(db: &Database, id: i64, error: &str) -> Result<(), LaikaError> {
    let error = error.to_string();
    db.call(move |conn| {
        let (attempts, max_attempts): (i32, i32) = conn.query_row(
            "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let new_attempts = attempts + 1;
        let status = if new_attempts >= max_attempts {
            "failed"
        } else {
            "pending"
        };
        conn.execute(
            "UPDATE queue SET status = ?1, attempts = ?2, last_error = ?3,
             locked_until = NULL,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?4",
            params![status, new_attempts, error, id],
        )?;
        Ok(())
    })
    .await
}

/// Put `processing` entries whose lock expired back to `pending`. Run on
/// startup to reclaim jobs a crashed worker held.
pub async fn requeue_stale(db: &Database) -> Result<usize, LaikaError> {
    db.call(|conn| {
        let n = conn.execute(
            "UPDATE queue SET status = 'pending', locked_until = NULL,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE status = 'processing'
               AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            [],
        )?;
        Ok(n)
    })
    .await
}

/// Every entry of a queue, oldest first.
pub fn list_queue(conn: &Connection, queue_name: &str) -> Result<Vec<QueueEntry>, LaikaError> {
    let mut stmt = conn.prepare(
        "SELECT id, queue_name, payload, status, attempts, max_attempts, last_error,
                created_at, updated_at, locked_until
         FROM queue WHERE queue_name = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![queue_name], map_entry)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
