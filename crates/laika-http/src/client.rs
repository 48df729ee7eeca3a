// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The retrying, rate-limit aware vendor client.

use std::time::{Duration, Instant};

use chrono::Utc;
use laika_config::model::HttpConfig;
use laika_core::LaikaError;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::context::IntegrationContext;
use crate::rate_limit::rate_limit_delay;
use crate::request::{RequestAuth, RequestBody, VendorRequest, VendorResponse, request_id};
use crate::retry::RetryPolicy;

const MAX_ERROR_BODY: usize = 512;

/// HTTP client for vendor APIs.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    policy: RetryPolicy,
    timeout: Duration,
    rate_limit_buffer: Duration,
    max_rate_limit_sleep: Duration,
}

impl HttpClient {
    pub fn from_config(config: &HttpConfig) -> Result<Self, LaikaError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LaikaError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            policy: RetryPolicy::from_config(config),
            timeout,
            rate_limit_buffer: Duration::from_secs(config.rate_limit_buffer_secs),
            max_rate_limit_sleep: Duration::from_secs(config.max_rate_limit_sleep_secs),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_rate_limit_buffer(mut self, buffer: Duration) -> Self {
        self.rate_limit_buffer = buffer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying transient failures.
    ///
    /// A 2xx/3xx response is returned after any sleep its rate-limit headers
    /// demand. Every network call and sleep races `cancel`.
    #[instrument(
        name = "vendor_request",
        skip_all,
        fields(
            vendor = %ctx.vendor,
            endpoint = %request.endpoint,
            connection_id = %ctx.connection_id,
            request_id = tracing::field::Empty,
        )
    )]
    pub async fn execute(
        &self,
        ctx: &mut IntegrationContext,
        cancel: &CancellationToken,
        request: VendorRequest,
    ) -> Result<VendorResponse, LaikaError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            ctx.network_calls += 1;
            let started = Instant::now();
            let outcome = self.send_once(cancel, &request).await;
            ctx.network_wait += started.elapsed();

            match outcome {
                Ok(response) => {
                    debug!(status = response.status, attempt, "vendor response");
                    let delay = rate_limit_delay(
                        &response.headers,
                        &request.rate_limit,
                        Utc::now(),
                        self.rate_limit_buffer,
                        self.max_rate_limit_sleep,
                    );
                    if let Some(delay) = delay {
                        info!(delay_ms = delay.as_millis() as u64, "rate limit window exhausted, sleeping");
                        ctx.rate_limit_wait += delay;
                        sleep_or_cancel(cancel, delay).await?;
                    }
                    return Ok(response);
                }
                Err(err) if err.is_transient() && self.policy.should_retry(attempt) => {
                    let wait = match &err {
                        LaikaError::TooManyRequests {
                            retry_after: Some(after),
                        } => {
                            let after = (*after).min(self.max_rate_limit_sleep);
                            ctx.rate_limit_wait += after;
                            after
                        }
                        _ => self.policy.backoff(attempt - 1),
                    };
                    ctx.retries += 1;
                    warn!(
                        error = %err,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "transient vendor error, will retry"
                    );
                    sleep_or_cancel(cancel, wait).await?;
                }
                Err(err) => {
                    if !matches!(err, LaikaError::Cancelled) {
                        warn!(error = %err, code = err.code(), attempt, "vendor request failed");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(
        &self,
        cancel: &CancellationToken,
        request: &VendorRequest,
    ) -> Result<VendorResponse, LaikaError> {
        let builder = self.build(request)?;
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LaikaError::Cancelled),
            result = builder.send() => result.map_err(|e| self.transport_error(e))?,
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let request_id = request_id(&headers);
        if let Some(id) = &request_id {
            tracing::Span::current().record("request_id", id.as_str());
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(LaikaError::Cancelled),
            result = response.bytes() => result.map_err(|e| self.transport_error(e))?,
        };

        if status >= 400 {
            let retry_after = request.rate_limit.retry_after(&headers);
            let text = String::from_utf8_lossy(&body);
            return Err(classify(status, retry_after, &text, &request.endpoint));
        }

        Ok(VendorResponse {
            status,
            headers,
            body: body.to_vec(),
            request_id,
        })
    }

    fn build(&self, request: &VendorRequest) -> Result<reqwest::RequestBuilder, LaikaError> {
        let url = request.full_url()?;
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            headers.insert(header_name(name)?, header_value(value)?);
        }

        let mut builder = self.client.request(request.method.clone(), url);
        builder = match &request.auth {
            Some(RequestAuth::Bearer(token)) => builder.bearer_auth(token.expose_secret()),
            Some(RequestAuth::Basic { username, password }) => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
            Some(RequestAuth::Header { name, value }) => {
                let mut value = header_value(value.expose_secret())?;
                value.set_sensitive(true);
                headers.insert(header_name(name)?, value);
                builder
            }
            None => builder,
        };
        for (name, value) in &request.secret_headers {
            let mut value = header_value(value.expose_secret())?;
            value.set_sensitive(true);
            headers.insert(header_name(name)?, value);
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(pairs)) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs.iter())
                    .finish();
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                builder.body(encoded)
            }
            Some(RequestBody::Raw { content_type, body }) => {
                headers.insert(CONTENT_TYPE, header_value(content_type)?);
                builder.body(body.clone())
            }
            None => builder,
        };
        Ok(builder.headers(headers))
    }

    fn transport_error(&self, e: reqwest::Error) -> LaikaError {
        if e.is_timeout() {
            LaikaError::Timeout {
                duration: self.timeout,
            }
        } else {
            LaikaError::Connection {
                message: e.to_string(),
            }
        }
    }
}

fn header_name(name: &str) -> Result<HeaderName, LaikaError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| LaikaError::Value(format!("invalid header name {name:?}: {e}")))
}

fn header_value(value: &str) -> Result<HeaderValue, LaikaError> {
    HeaderValue::from_str(value).map_err(|e| LaikaError::Value(format!("invalid header value: {e}")))
}

/// Map a non-success status to the error taxonomy.
pub fn classify(
    status: u16,
    retry_after: Option<Duration>,
    body: &str,
    endpoint: &str,
) -> LaikaError {
    match status {
        401 | 403 => LaikaError::ConfigurationError {
            message: format!("{endpoint} rejected the credentials (HTTP {status})"),
        },
        404 => LaikaError::NotFound {
            resource: endpoint.to_string(),
        },
        429 => LaikaError::TooManyRequests { retry_after },
        502 => LaikaError::BadGateway,
        503 => LaikaError::ServiceUnavailable,
        504 => LaikaError::GatewayTimeout,
        _ => LaikaError::Http {
            status,
            body: truncate(body, MAX_ERROR_BODY),
        },
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> Result<(), LaikaError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(LaikaError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(LaikaError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
