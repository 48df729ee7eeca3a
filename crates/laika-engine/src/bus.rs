// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous publish/subscribe inside the producing transaction.
//!
//! Subscribers see events in emission order. Anything a subscriber emits
//! through [`EventContext::emit`] is appended to the same queue, so a
//! correlation match published while handling `ObjectCreated` is delivered
//! after every event already waiting. A subscriber error aborts the dispatch
//! and, because the caller owns the transaction, rolls the operation back.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use laika_core::{DomainEvent, EventKind, LaikaError};
use rusqlite::Connection;
use tracing::{debug, trace};

use crate::correlation::Correlator;
use crate::materializer::AlertMaterializer;

/// Guard against subscribers that keep answering events with more events.
const MAX_EVENTS_PER_DISPATCH: usize = 10_000;

/// Per-dispatch scratch space handed to every subscriber.
#[derive(Debug)]
pub struct EventContext {
    pub now: DateTime<Utc>,
    follow_ups: Vec<DomainEvent>,
    alert_ids: Vec<String>,
}

impl EventContext {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            follow_ups: Vec::new(),
            alert_ids: Vec::new(),
        }
    }

    /// Queue a follow-up event behind everything already pending.
    pub fn emit(&mut self, event: DomainEvent) {
        self.follow_ups.push(event);
    }

    /// Remember an alert created while handling the current event.
    pub fn record_alert(&mut self, alert_id: impl Into<String>) {
        self.alert_ids.push(alert_id.into());
    }
}

pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    fn interested_in(&self, kind: EventKind) -> bool;

    fn handle(
        &self,
        tx: &Connection,
        event: &DomainEvent,
        ctx: &mut EventContext,
    ) -> Result<(), LaikaError>;
}

/// What one dispatch delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatched {
    /// Every event processed, follow-ups included, in delivery order.
    pub events: Vec<DomainEvent>,
    /// Alerts materialized along the way.
    pub alert_ids: Vec<String>,
}

impl Dispatched {
    pub fn merge(&mut self, other: Dispatched) {
        self.events.extend(other.events);
        self.alert_ids.extend(other.alert_ids);
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

/// Ordered set of subscribers. Cloning shares the subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Vec<Arc<dyn EventSubscriber>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subscribers.iter().map(|s| s.name()).collect();
        f.debug_struct("EventBus").field("subscribers", &names).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlation first, then alert materialization.
    pub fn standard(router: laika_delivery::DeliveryRouter) -> Self {
        Self::new()
            .with_subscriber(Arc::new(Correlator))
            .with_subscriber(Arc::new(AlertMaterializer::new(router)))
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        Arc::make_mut(&mut self.subscribers).push(subscriber);
        self
    }

    pub fn subscriber_names(&self) -> Vec<&'static str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }

    /// Deliver `events` and their follow-ups to every interested subscriber.
    pub fn dispatch(
        &self,
        tx: &Connection,
        events: Vec<DomainEvent>,
        now: DateTime<Utc>,
    ) -> Result<Dispatched, LaikaError> {
        let mut queue: VecDeque<DomainEvent> = events.into();
        let mut ctx = EventContext::new(now);
        let mut delivered = Vec::new();

        while let Some(event) = queue.pop_front() {
            if delivered.len() >= MAX_EVENTS_PER_DISPATCH {
                return Err(LaikaError::Internal(format!(
                    "event dispatch exceeded {MAX_EVENTS_PER_DISPATCH} events"
                )));
            }
            let kind = event.kind();
            for subscriber in self.subscribers.iter() {
                if !subscriber.interested_in(kind) {
                    continue;
                }
                trace!(subscriber = subscriber.name(), %kind, "delivering event");
                subscriber.handle(tx, &event, &mut ctx)?;
            }
            queue.extend(ctx.follow_ups.drain(..));
            delivered.push(event);
        }

        if !delivered.is_empty() {
            debug!(
                events = delivered.len(),
                alerts = ctx.alert_ids.len(),
                "events dispatched"
            );
        }
        Ok(Dispatched {
            events: delivered,
            alert_ids: ctx.alert_ids,
        })
    }
}
