// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budgeted, resumable iteration over the pages of one scope.

use chrono::{DateTime, Utc};
use laika_core::{Cursor, LaikaError};
use tracing::debug;

use crate::connector::{Connector, ConnectorSession, Page, Scope};

/// Upper bound on the work one poll tick does for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBudget {
    pub max_records: usize,
    pub max_pages: usize,
}

impl ChunkBudget {
    pub fn new(max_records: usize, max_pages: usize) -> Self {
        Self {
            max_records,
            max_pages,
        }
    }

    /// What is left after `records` and `pages` were spent.
    pub fn after(self, records: usize, pages: usize) -> Self {
        Self {
            max_records: self.max_records.saturating_sub(records),
            max_pages: self.max_pages.saturating_sub(pages),
        }
    }

    pub fn is_spent(&self) -> bool {
        self.max_records == 0 || self.max_pages == 0
    }
}

/// Lazily fetches pages of one scope until the vendor runs out of pages or
/// the budget is spent. A stream built from [`PullStream::resume_cursor`]
/// continues exactly where this one stopped.
pub struct PullStream<'c> {
    connector: &'c dyn Connector,
    scope: Scope,
    since: Option<DateTime<Utc>>,
    cursor: Option<Cursor>,
    budget: ChunkBudget,
    exhausted: bool,
    pages: usize,
    records: usize,
}

impl<'c> PullStream<'c> {
    pub fn new(
        connector: &'c dyn Connector,
        scope: Scope,
        since: Option<DateTime<Utc>>,
        resume: Option<Cursor>,
        budget: ChunkBudget,
    ) -> Self {
        Self {
            connector,
            scope,
            since,
            cursor: resume,
            budget,
            exhausted: false,
            pages: 0,
            records: 0,
        }
    }

    /// The next page, or `None` once the scope is exhausted or the budget
    /// does not allow another fetch.
    pub async fn next_page(
        &mut self,
        session: &mut ConnectorSession<'_>,
    ) -> Result<Option<Page>, LaikaError> {
        if self.exhausted || self.budget_spent() {
            return Ok(None);
        }
        let page = self
            .connector
            .pull(session, &self.scope, self.since, self.cursor.clone())
            .await?;
        self.pages += 1;
        self.records += page.records.len();
        self.cursor = page.next.clone();
        self.exhausted = page.next.is_none();
        debug!(
            scope = %self.scope.id,
            records = page.records.len(),
            more = !self.exhausted,
            "page pulled"
        );
        Ok(Some(page))
    }

    pub fn budget_spent(&self) -> bool {
        self.budget.after(self.records, self.pages).is_spent()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Cursor of the first page not yet fetched.
    pub fn resume_cursor(&self) -> Option<&Cursor> {
        if self.exhausted { None } else { self.cursor.as_ref() }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn records_fetched(&self) -> usize {
        self.records
    }
}
