// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Hierarchy: `./laika.toml` > `~/.config/laika/laika.toml` > `/etc/laika/laika.toml`,
//! then environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use laika_core::Vendor;
use strum::IntoEnumIterator;

use crate::model::LaikaConfig;

/// Sections reachable through `LAIKA_{SECTION}_{KEY}`.
const SECTIONS: &[&str] = &[
    "service", "storage", "vault", "http", "polling", "delivery", "digest", "email", "slack",
    "urls", "aws", "gateway",
];

/// Un-sectioned `LAIKA_*` variables the deployment has always used.
const URL_VARS: &[&str] = &["web_redirect", "audit_redirect", "concierge_redirect"];

const VENDOR_KEYS: &[&str] = &["client_id", "client_secret", "oauth_url", "api_base"];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/laika/laika.toml`
/// 3. `~/.config/laika/laika.toml`
/// 4. `./laika.toml`
/// 5. Environment variables
pub fn load_config() -> Result<LaikaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<LaikaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LaikaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LaikaConfig, figment::Error> {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(LaikaConfig::default()))
            .merge(Toml::file(path)),
    )
    .extract()
}

/// The Figment used for loading, before extraction.
pub fn build_figment() -> Figment {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(LaikaConfig::default()))
            .merge(Toml::file("/etc/laika/laika.toml"))
            .merge(Toml::file(
                dirs::config_dir()
                    .map(|d| d.join("laika/laika.toml"))
                    .unwrap_or_default(),
            ))
            .merge(Toml::file("laika.toml")),
    )
}

fn with_env(figment: Figment) -> Figment {
    figment
        .merge(prefixed_env())
        .merge(legacy_env())
        .merge(vendor_env())
}

/// `LAIKA_*` variables, except the vault passphrase.
///
/// Uses an explicit section map rather than `Env::split("_")`, since keys
/// themselves contain underscores (`LAIKA_STORAGE_DATABASE_PATH` is
/// `storage.database_path`, not `storage.database.path`).
fn prefixed_env() -> Env {
    Env::prefixed("LAIKA_")
        .ignore(&["VAULT_KEY"])
        .map(|key| map_prefixed_key(key.as_str()).into())
}

/// `key` may arrive in any case; the result is always lowercase.
pub(crate) fn map_prefixed_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    let key = key.as_str();
    if URL_VARS.contains(&key) {
        return format!("urls.{key}");
    }
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

/// `NO_REPLY_EMAIL` and `AWS_EXTERNAL_ID`.
fn legacy_env() -> Env {
    Env::raw()
        .only(&["NO_REPLY_EMAIL", "AWS_EXTERNAL_ID"])
        .map(|key| match key.as_str().to_ascii_lowercase().as_str() {
            "no_reply_email" => "email.no_reply_email".into(),
            "aws_external_id" => "aws.external_id".into(),
            other => other.to_string().into(),
        })
}

/// `{VENDOR}_CLIENT_ID`, `{VENDOR}_CLIENT_SECRET`, `{VENDOR}_OAUTH_URL`, `{VENDOR}_API_BASE`.
fn vendor_env() -> Env {
    Env::raw().filter_map(|key| map_vendor_key(key.as_str()).map(Into::into))
}

pub(crate) fn map_vendor_key(key: &str) -> Option<String> {
    let key = key.to_ascii_lowercase();
    let key = key.as_str();
    Vendor::iter().find_map(|vendor| {
        let tag = vendor.to_string();
        let rest = key.strip_prefix(tag.as_str())?.strip_prefix('_')?;
        VENDOR_KEYS
            .contains(&rest)
            .then(|| format!("vendors.{tag}.{rest}"))
    })
}
