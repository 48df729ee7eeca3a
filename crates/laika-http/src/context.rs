// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-poll call statistics.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

/// Statistics of one polling run against one connection.
///
/// Passed by `&mut` through the kernel and the connector; serialized into
/// `connection_accounts.metrics` when the run ends.
#[derive(Debug, Clone, Default)]
pub struct IntegrationContext {
    pub vendor: String,
    pub connection_id: String,
    pub retries: u32,
    pub network_calls: u32,
    pub network_wait: Duration,
    pub rate_limit_wait: Duration,
    pub timers: BTreeMap<String, Duration>,
}

impl IntegrationContext {
    pub fn new(vendor: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            connection_id: connection_id.into(),
            ..Self::default()
        }
    }

    /// Add `elapsed` to the named timer.
    pub fn record_timer(&mut self, name: &str, elapsed: Duration) {
        *self.timers.entry(name.to_string()).or_default() += elapsed;
    }

    /// Start timing `name`; call [`TimerGuard::stop`] to record it.
    pub fn start_timer(&self, name: &str) -> TimerGuard {
        TimerGuard {
            name: name.to_string(),
            started: Instant::now(),
        }
    }

    /// JSON snapshot stored on the connection. Durations are milliseconds.
    pub fn to_metrics(&self) -> Value {
        let timers: serde_json::Map<String, Value> = self
            .timers
            .iter()
            .map(|(k, v)| (k.clone(), json!(millis(*v))))
            .collect();
        json!({
            "retries": self.retries,
            "network_calls": self.network_calls,
            "network_wait_ms": millis(self.network_wait),
            "rate_limit_wait_ms": millis(self.rate_limit_wait),
            "timers": timers,
        })
    }
}

pub struct TimerGuard {
    name: String,
    started: Instant,
}

impl TimerGuard {
    pub fn stop(self, ctx: &mut IntegrationContext) {
        ctx.record_timer(&self.name, self.started.elapsed());
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_accumulate() {
        let mut ctx = IntegrationContext::new("jira", "c1");
        ctx.record_timer("pull", Duration::from_millis(40));
        ctx.record_timer("pull", Duration::from_millis(2));
        ctx.retries = 2;
        let metrics = ctx.to_metrics();
        assert_eq!(metrics["timers"]["pull"], 42);
        assert_eq!(metrics["retries"], 2);
        assert_eq!(metrics["network_wait_ms"], 0);
    }

    #[test]
    fn guard_records_on_stop() {
        let mut ctx = IntegrationContext::new("okta", "c2");
        let guard = ctx.start_timer("discover");
        guard.stop(&mut ctx);
        assert!(ctx.timers.contains_key("discover"));
    }
}
