// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.
//!
//! Apart from the queue's async helpers, every function takes a plain
//! `rusqlite::Connection` so it can run inside a caller's transaction.

pub mod alert_views;
pub mod alerts;
pub mod audits;
pub mod comments;
pub mod connections;
pub mod entities;
pub mod launchpad;
pub mod objects;
pub mod organizations;
pub mod queue;
pub mod users;

/// Trimmed, Unicode-lowercased form used for case-insensitive person matching.
/// SQLite's `lower()` folds ASCII only, so the comparison happens here.
pub(crate) fn folded(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Whether a person's name pair or e-mail matches the already folded
/// `wanted` values. Empty wanted values never match.
pub(crate) fn person_matches(
    (first, last, email): (&str, &str, &str),
    (want_first, want_last, want_email): (&str, &str, &str),
) -> bool {
    let by_name = !want_first.is_empty()
        && !want_last.is_empty()
        && folded(first) == want_first
        && folded(last) == want_last;
    by_name || (!want_email.is_empty() && folded(email) == want_email)
}
