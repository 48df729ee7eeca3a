// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Laika domain engine.
//!
//! Inbound commands mutate the store and publish [`DomainEvent`]s on the
//! [`EventBus`] inside the same transaction. The bus feeds the correlation
//! engine and the alert materializer, which applies the permission gate and
//! hands every alert to the delivery router. The [`PollRunner`] drives vendor
//! connectors and feeds harvested records through the same bus.
//!
//! [`DomainEvent`]: laika_core::DomainEvent

pub mod bus;
pub mod command;
pub mod correlation;
pub mod engine;
pub mod materializer;
pub mod permission;
pub mod poller;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::{Dispatched, EventBus, EventContext, EventSubscriber};
pub use command::{CommandOutput, CredentialInput, InboundCommand, Invite, Posted};
pub use correlation::Correlator;
pub use engine::Engine;
pub use materializer::AlertMaterializer;
pub use permission::{Permission, Target, can_receive};
pub use poller::{PollReport, PollRunner, PollStatus};
