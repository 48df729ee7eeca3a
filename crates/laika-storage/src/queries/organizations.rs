// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Organization CRUD operations.

use laika_core::{LaikaError, Organization, format_ts};
use rusqlite::{Connection, OptionalExtension, params};

use crate::row::ts_col;

pub fn insert_organization(conn: &Connection, org: &Organization) -> Result<(), LaikaError> {
    conn.execute(
        "INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![org.id, org.name, format_ts(org.created_at)],
    )?;
    Ok(())
}

pub fn get_organization(conn: &Connection, id: &str) -> Result<Option<Organization>, LaikaError> {
    let org = conn
        .query_row(
            "SELECT id, name, created_at FROM organizations WHERE id = ?1",
            params![id],
            |row| {
                Ok(Organization {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: ts_col(row, 2)?,
                })
            },
        )
        .optional()?;
    Ok(org)
}

/// Organization name, or an empty string for an unknown id.
pub fn organization_name(conn: &Connection, id: &str) -> Result<String, LaikaError> {
    Ok(get_organization(conn, id)?.map(|o| o.name).unwrap_or_default())
}
