// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor request and response envelopes.

use laika_core::LaikaError;
use reqwest::Method;
use reqwest::header::HeaderMap;
use secrecy::SecretString;
use serde::de::DeserializeOwned;

use crate::rate_limit::RateLimitHeaders;

/// Response headers carrying the vendor's request id, checked in order.
pub const REQUEST_ID_HEADERS: &[&str] = &[
    "x-request-id",
    "x-github-request-id",
    "x-amzn-requestid",
    "x-datadog-request-id",
];

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// Pre-encoded body with its content type.
    Raw {
        content_type: String,
        body: String,
    },
}

#[derive(Debug, Clone)]
pub enum RequestAuth {
    Bearer(SecretString),
    Basic {
        username: String,
        password: SecretString,
    },
    /// A vendor-specific header such as `DD-API-KEY`.
    Header { name: String, value: SecretString },
}

/// One vendor call. `endpoint` is a short label used in spans and errors.
#[derive(Debug, Clone)]
pub struct VendorRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub auth: Option<RequestAuth>,
    /// Extra credential headers sent alongside `auth`, all marked sensitive.
    pub secret_headers: Vec<(String, SecretString)>,
    pub endpoint: String,
    pub rate_limit: RateLimitHeaders,
}

impl VendorRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            method,
            endpoint: endpoint_label(&url),
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            auth: None,
            secret_headers: Vec::new(),
            rate_limit: RateLimitHeaders::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        let mut req = Self::new(Method::POST, url);
        req.body = Some(RequestBody::Json(body));
        req
    }

    pub fn post_form(url: impl Into<String>, pairs: Vec<(String, String)>) -> Self {
        let mut req = Self::new(Method::POST, url);
        req.body = Some(RequestBody::Form(pairs));
        req
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(mut self, token: SecretString) -> Self {
        self.auth = Some(RequestAuth::Bearer(token));
        self
    }

    pub fn basic(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.auth = Some(RequestAuth::Basic {
            username: username.into(),
            password,
        });
        self
    }

    /// Authenticate with a single vendor-specific header.
    pub fn auth_header(mut self, name: impl Into<String>, value: SecretString) -> Self {
        self.auth = Some(RequestAuth::Header {
            name: name.into(),
            value,
        });
        self
    }

    /// Add a sensitive header without touching `auth`. Repeats accumulate.
    pub fn secret_header(mut self, name: impl Into<String>, value: SecretString) -> Self {
        self.secret_headers.push((name.into(), value));
        self
    }

    pub fn endpoint(mut self, label: impl Into<String>) -> Self {
        self.endpoint = label.into();
        self
    }

    pub fn rate_limit(mut self, headers: RateLimitHeaders) -> Self {
        self.rate_limit = headers;
        self
    }

    /// Full URL with the query pairs appended.
    pub fn full_url(&self) -> Result<url::Url, LaikaError> {
        let mut url = url::Url::parse(&self.url)
            .map_err(|e| LaikaError::Value(format!("bad request url {:?}: {e}", self.url)))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

/// Path of `url`, used when no explicit label is given.
fn endpoint_label(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[derive(Debug, Clone)]
pub struct VendorResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub request_id: Option<String>,
}

impl VendorResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, LaikaError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| LaikaError::Value(format!("vendor returned malformed JSON: {e}")))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `rel="next"` target of the `Link` header.
    pub fn next_link(&self) -> Option<String> {
        self.header("link").and_then(parse_next_link)
    }
}

pub(crate) fn request_id(headers: &HeaderMap) -> Option<String> {
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Extract the `rel="next"` URL from an RFC 8288 `Link` header.
pub fn parse_next_link(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
