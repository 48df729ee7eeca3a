// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal user queries.
//!
//! E-mail comparisons rely on the `COLLATE NOCASE` column plus trimming.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use laika_core::{
    AlertPreference, DiscoveryState, LaikaError, Role, User, UserPreferences, format_ts,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::queries::{folded, person_matches};
use crate::row::{enum_col, json_col, ts_col};

const USER_COLUMNS: &str = "id, organization_id, email, first_name, last_name, role, \
     user_preferences, discovery_state, employment_type, is_active, date_joined";

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: enum_col(row, 5)?,
        preferences: json_col::<UserPreferences>(row, 6)?,
        discovery_state: enum_col(row, 7)?,
        employment_type: row.get(8)?,
        is_active: row.get(9)?,
        date_joined: ts_col(row, 10)?,
    })
}

fn collect(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<User>, LaikaError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map_user)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), LaikaError> {
    conn.execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            user.id,
            user.organization_id,
            user.email.trim(),
            user.first_name,
            user.last_name,
            user.role.to_string(),
            serde_json::to_string(&user.preferences)?,
            user.discovery_state.to_string(),
            user.employment_type,
            user.is_active,
            format_ts(user.date_joined),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>, LaikaError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(
    conn: &Connection,
    organization_id: &str,
    email: &str,
) -> Result<Option<User>, LaikaError> {
    let user = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE organization_id = ?1 AND email = ?2"
            ),
            params![organization_id, email.trim()],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn list_by_organization(
    conn: &Connection,
    organization_id: &str,
) -> Result<Vec<User>, LaikaError> {
    collect(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE organization_id = ?1 ORDER BY email"),
        params![organization_id],
    )
}

/// Active organization admins, the recipients of discovery alerts.
pub fn list_admins(conn: &Connection, organization_id: &str) -> Result<Vec<User>, LaikaError> {
    collect(
        conn,
        &format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE organization_id = ?1 AND role = ?2 AND is_active = 1
             ORDER BY email"
        ),
        params![organization_id, Role::OrganizationAdmin.to_string()],
    )
}

/// Active users across all organizations whose alert preference is `pref`.
/// A user without a stored preference counts as `IMMEDIATELY`.
pub fn list_active_by_preference(
    conn: &Connection,
    pref: AlertPreference,
) -> Result<Vec<User>, LaikaError> {
    collect(
        conn,
        &format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE is_active = 1
               AND COALESCE(json_extract(user_preferences, '$.profile.alerts'), 'IMMEDIATELY') = ?1
             ORDER BY organization_id, email"
        ),
        params![pref.to_string()],
    )
}

pub fn update_discovery_state(
    conn: &Connection,
    id: &str,
    state: DiscoveryState,
) -> Result<bool, LaikaError> {
    let changed = conn.execute(
        "UPDATE users SET discovery_state = ?1 WHERE id = ?2",
        params![state.to_string(), id],
    )?;
    Ok(changed > 0)
}

pub fn update_preferences(
    conn: &Connection,
    id: &str,
    preferences: &UserPreferences,
) -> Result<(), LaikaError> {
    conn.execute(
        "UPDATE users SET user_preferences = ?1 WHERE id = ?2",
        params![serde_json::to_string(preferences)?, id],
    )?;
    Ok(())
}

/// Users of the organization whose trimmed first and last name match, or
/// whose e-mail matches, ignoring case.
pub fn find_by_name_or_email(
    conn: &Connection,
    organization_id: &str,
    first_name: &str,
    last_name: &str,
    email: &str,
) -> Result<Vec<User>, LaikaError> {
    let (first, last, email) = (folded(first_name), folded(last_name), folded(email));
    if email.is_empty() && (first.is_empty() || last.is_empty()) {
        return Ok(Vec::new());
    }
    let candidates = collect(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE organization_id = ?1 ORDER BY email"),
        params![organization_id],
    )?;
    Ok(candidates
        .into_iter()
        .filter(|user| {
            person_matches(
                (user.first_name.as_str(), user.last_name.as_str(), user.email.as_str()),
                (first.as_str(), last.as_str(), email.as_str()),
            )
        })
        .collect())
}

/// Number of non-admin `NEW` users who joined at or after `since`.
pub fn count_new_non_admin_since(
    conn: &Connection,
    organization_id: &str,
    since: DateTime<Utc>,
) -> Result<i64, LaikaError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users
         WHERE organization_id = ?1
           AND discovery_state = ?2
           AND role NOT IN (?3, ?4)
           AND date_joined >= ?5",
        params![
            organization_id,
            DiscoveryState::New.to_string(),
            Role::OrganizationAdmin.to_string(),
            Role::SuperAdmin.to_string(),
            format_ts(since),
        ],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Resolve a mentioned e-mail. Members of the organization win; otherwise an
/// auditor or super admin with that e-mail is accepted.
pub fn find_mentionable(
    conn: &Connection,
    organization_id: &str,
    email: &str,
) -> Result<Option<User>, LaikaError> {
    if let Some(user) = get_user_by_email(conn, organization_id, email)? {
        return Ok(Some(user));
    }
    let user = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE email = ?1 AND role IN (?2, ?3, ?4)
                 ORDER BY date_joined LIMIT 1"
            ),
            params![
                email.trim(),
                Role::Auditor.to_string(),
                Role::AuditorAdmin.to_string(),
                Role::SuperAdmin.to_string(),
            ],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// Display names for the given e-mails, keyed by the lower-cased e-mail.
/// E-mails nobody owns are absent from the map.
pub fn display_names(
    conn: &Connection,
    organization_id: &str,
    emails: &[String],
) -> Result<HashMap<String, String>, LaikaError> {
    let mut names = HashMap::new();
    for email in emails {
        if let Some(user) = find_mentionable(conn, organization_id, email)? {
            names.insert(email.to_lowercase(), user.display_name());
        }
    }
    Ok(names)
}
