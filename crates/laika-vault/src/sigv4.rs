// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS Signature Version 4 for the handful of STS calls the vault makes.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use laika_core::LaikaError;
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SigningInput<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub now: DateTime<Utc>,
}

/// Headers to add to the request: `x-amz-date` and `authorization`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub amz_date: String,
    pub authorization: String,
    pub signature: String,
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, LaikaError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| LaikaError::Internal(format!("hmac key rejected: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn signing_key(
    secret_access_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, LaikaError> {
    let k_date = hmac(format!("AWS4{secret_access_key}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// RFC 3986 encoding with the unreserved set left alone.
fn uri_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// `host[:port]` the way the request will carry it.
pub fn host_header(url: &Url) -> Result<String, LaikaError> {
    let host = url
        .host_str()
        .ok_or_else(|| LaikaError::Value(format!("url {url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    payload: &[u8],
) -> (String, String) {
    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    query.sort();
    let query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut headers: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim().to_string()))
        .collect();
    headers.sort();
    let canonical_headers: String = headers.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let path = if url.path().is_empty() { "/" } else { url.path() };
    let canonical = format!(
        "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{}",
        sha256_hex(payload)
    );
    (canonical, signed_headers)
}

/// Sign a request. `headers` must already include `host` and `x-amz-date`
/// (see [`amz_date`]) plus anything else that should be covered.
pub fn sign(
    input: &SigningInput<'_>,
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    payload: &[u8],
) -> Result<Signature, LaikaError> {
    let amz_date = amz_date(input.now);
    let date = &amz_date[..8];
    let scope = format!("{date}/{}/{}/aws4_request", input.region, input.service);
    let (canonical, signed_headers) = canonical_request(method, url, headers, payload);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical.as_bytes())
    );
    let key = signing_key(input.secret_access_key, date, input.region, input.service)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);
    Ok(Signature {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            input.access_key_id
        ),
        amz_date,
        signature,
    })
}

pub fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}
