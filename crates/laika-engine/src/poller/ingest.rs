// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisting one pulled page inside a single transaction.

use chrono::{DateTime, Utc};
use laika_connectors::Record;
use laika_core::{DomainEvent, LaikaError, ObjectType};
use laika_storage::UpsertOutcome;
use laika_storage::queries::objects;
use rusqlite::Connection;
use tracing::trace;

use crate::bus::{Dispatched, EventBus};
use crate::correlation::discover_person;

/// What writing one page changed.
#[derive(Debug, Default)]
pub struct PageIngest {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub people_created: usize,
    pub dispatched: Dispatched,
}

/// Upsert `records` in connector order and publish the store events.
///
/// Person records with an e-mail unknown to the organization also create a
/// `NEW` user.
pub fn persist_page(
    tx: &Connection,
    bus: &EventBus,
    organization_id: &str,
    connection_id: &str,
    records: Vec<Record>,
    now: DateTime<Utc>,
) -> Result<PageIngest, LaikaError> {
    let mut out = PageIngest::default();
    let mut events = Vec::new();

    for record in records {
        if record.object_type == ObjectType::User
            && discover_person(tx, organization_id, &record.data, now)?.is_some()
        {
            out.people_created += 1;
        }
        let object_type = record.object_type;
        let result = objects::upsert_object(
            tx,
            organization_id,
            object_type,
            Some(connection_id),
            record.data,
            now,
        )?;
        trace!(object = %result.object_id, outcome = ?result.outcome, "record upserted");
        let event = match result.outcome {
            UpsertOutcome::Created => {
                out.created += 1;
                DomainEvent::ObjectCreated {
                    organization_id: organization_id.to_string(),
                    object_id: result.object_id,
                    object_type,
                }
            }
            UpsertOutcome::Updated => {
                out.updated += 1;
                DomainEvent::ObjectUpdated {
                    organization_id: organization_id.to_string(),
                    object_id: result.object_id,
                    object_type,
                }
            }
            UpsertOutcome::Unchanged => {
                out.unchanged += 1;
                continue;
            }
        };
        events.push(event);
    }

    if !events.is_empty() {
        out.dispatched = bus.dispatch(tx, events, now)?;
    }
    Ok(out)
}
