// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP kernel shared by every vendor connector.
//!
//! [`HttpClient::execute`] wraps `reqwest` with bounded retries, exponential
//! backoff with jitter, vendor rate-limit headers, structured request spans,
//! and cancellation. Call statistics accumulate in an explicit
//! [`IntegrationContext`] owned by the polling task.

pub mod auth;
pub mod client;
pub mod context;
pub mod rate_limit;
pub mod request;
pub mod retry;

pub use auth::AccessSecret;
pub use client::{HttpClient, classify, sleep_or_cancel};
pub use context::IntegrationContext;
pub use rate_limit::{RateLimitHeaders, ResetKind, rate_limit_delay};
pub use request::{RequestAuth, RequestBody, VendorRequest, VendorResponse, parse_next_link};
pub use retry::RetryPolicy;
