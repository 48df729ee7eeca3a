// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert delivery for the Laika core.
//!
//! [`DeliveryRouter`] decides which channels an alert goes out on and writes
//! one queue job per channel inside the transaction that created the alert.
//! A [`DeliveryWorker`] per channel drains its queue, renders the joined
//! [`AlertView`](laika_storage::AlertView), and hands the result to a sink.
//! The [`DigestRunner`] sends the daily rollup for `DAILY` users on the
//! [`DigestScheduler`]'s cron.

pub mod digest;
pub mod render;
pub mod router;
pub mod scheduler;
pub mod sinks;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use digest::{DIGEST_LIMIT, DigestRunner, calculate_surpass_alerts, trim_alerts};
pub use render::Links;
pub use router::{Channel, DeliveryJob, DeliveryRouter, IMMEDIATE_EMAIL_TYPES, SLACK_TYPES, plan};
pub use scheduler::DigestScheduler;
pub use sinks::{EmailTemplates, LogEmailSender, SlackPoster, SmtpEmailSender};
pub use worker::{DeliverySinks, DeliveryWorker, DrainStats, workers};
