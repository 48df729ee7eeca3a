// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor rate-limit header conventions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

/// How a vendor expresses the reset moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Unix epoch seconds (GitHub, Okta).
    EpochSeconds,
    /// Unix epoch milliseconds (Linear).
    EpochMillis,
    /// Seconds from now (Datadog).
    DeltaSeconds,
}

/// Names of the headers a vendor uses to announce its rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub remaining: Option<&'static str>,
    pub reset: Option<&'static str>,
    pub retry_after: &'static str,
    pub reset_kind: ResetKind,
}

impl Default for RateLimitHeaders {
    fn default() -> Self {
        Self {
            remaining: Some("x-ratelimit-remaining"),
            reset: Some("x-ratelimit-reset"),
            retry_after: "retry-after",
            reset_kind: ResetKind::EpochSeconds,
        }
    }
}

impl RateLimitHeaders {
    pub fn github() -> Self {
        Self::default()
    }

    pub fn okta() -> Self {
        Self {
            remaining: Some("x-rate-limit-remaining"),
            reset: Some("x-rate-limit-reset"),
            ..Self::default()
        }
    }

    pub fn linear() -> Self {
        Self {
            remaining: Some("x-ratelimit-requests-remaining"),
            reset: Some("x-ratelimit-requests-reset"),
            reset_kind: ResetKind::EpochMillis,
            ..Self::default()
        }
    }

    pub fn datadog() -> Self {
        Self {
            remaining: Some("x-ratelimit-remaining"),
            reset: Some("x-ratelimit-reset"),
            reset_kind: ResetKind::DeltaSeconds,
            ..Self::default()
        }
    }

    /// Slack only sends `Retry-After` on 429.
    pub fn retry_after_only() -> Self {
        Self {
            remaining: None,
            reset: None,
            ..Self::default()
        }
    }

    /// Parse the `Retry-After` seconds of a response, if present. Values too
    /// large for a [`Duration`] saturate.
    pub fn retry_after(&self, headers: &HeaderMap) -> Option<Duration> {
        header_f64(headers, self.retry_after)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
}

/// Sleep owed before the next call: `reset - now + buffer` once the window
/// has at most one call left, capped at `cap`. `None` when no sleep is due.
pub fn rate_limit_delay(
    headers: &HeaderMap,
    spec: &RateLimitHeaders,
    now: DateTime<Utc>,
    buffer: Duration,
    cap: Duration,
) -> Option<Duration> {
    let remaining = header_f64(headers, spec.remaining?)?;
    if remaining > 1.0 {
        return None;
    }
    let reset = header_f64(headers, spec.reset?)?;
    let now_ms = now.timestamp_millis() as f64;
    let until_reset_secs = match spec.reset_kind {
        ResetKind::EpochSeconds => (reset * 1000.0 - now_ms) / 1000.0,
        ResetKind::EpochMillis => (reset - now_ms) / 1000.0,
        ResetKind::DeltaSeconds => reset,
    };
    let until_reset = if until_reset_secs.is_finite() && until_reset_secs > 0.0 {
        Duration::try_from_secs_f64(until_reset_secs).unwrap_or(cap)
    } else {
        Duration::ZERO
    };
    Some(until_reset.saturating_add(buffer).min(cap))
}
