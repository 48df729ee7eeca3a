// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: polling, digests, launchpad queries, config, and
//! vault maintenance.

use std::io::BufRead;

use chrono::Utc;
use laika_config::LaikaConfig;
use laika_core::LaikaError;
use laika_launchpad::Launchpad;
use laika_storage::Database;
use laika_vault::mask_secret;
use secrecy::SecretString;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::{App, open_vault};

/// Config keys whose values never reach the terminal.
const SECRET_KEYS: &[&str] = &["client_secret", "bearer_token", "signing_secret"];

fn print_json<T: Serialize>(value: &T) -> Result<(), LaikaError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LaikaError::Internal(format!("cannot render output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Poll one connection, or run one scheduler tick over every due connection.
pub async fn poll(config: LaikaConfig, connection: Option<String>) -> Result<(), LaikaError> {
    let cancel = CancellationToken::new();
    let app = App::open(config, cancel.clone()).await?;
    match connection {
        Some(id) => {
            let report = app.engine.poller().poll_connection(&id, &cancel).await?;
            print_json(&report)?;
        }
        None => {
            let result = app.engine.poll_tick().await?;
            print_json(&result)?;
        }
    }
    Ok(())
}

/// Send the digests of the window ending now.
pub async fn digest(config: LaikaConfig) -> Result<(), LaikaError> {
    let app = App::open(config, CancellationToken::new()).await?;
    let result = app.digest.run(Utc::now()).await?;
    print_json(&result)
}

pub async fn launchpad(
    config: &LaikaConfig,
    organization_id: &str,
    query: Option<&str>,
) -> Result<(), LaikaError> {
    let db = Database::open_with(&config.storage).await?;
    let pad = Launchpad::new(db);
    let entries = pad.search(organization_id, query.unwrap_or_default()).await?;
    print_json(&entries)
}

/// The effective configuration as TOML, with secrets masked.
pub fn show_config(config: &LaikaConfig) -> Result<String, LaikaError> {
    let mut value = toml::Value::try_from(config)
        .map_err(|e| LaikaError::Internal(format!("cannot serialize config: {e}")))?;
    mask_secrets(&mut value);
    toml::to_string_pretty(&value)
        .map_err(|e| LaikaError::Internal(format!("cannot render config: {e}")))
}

fn mask_secrets(value: &mut toml::Value) {
    if let toml::Value::Table(table) = value {
        for (key, entry) in table.iter_mut() {
            match entry {
                toml::Value::String(text) if SECRET_KEYS.contains(&key.as_str()) => {
                    *text = mask_secret(text);
                }
                other => mask_secrets(other),
            }
        }
    }
}

fn read_stdin_line(label: &str) -> Result<SecretString, LaikaError> {
    eprintln!("{label}");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| LaikaError::Vault(format!("failed to read stdin: {e}")))?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        return Err(LaikaError::Vault("empty value".to_string()));
    }
    Ok(SecretString::from(value))
}

pub enum VaultAction {
    Init,
    Set(String),
    List,
    Delete(String),
    RotatePassphrase,
}

pub async fn vault(config: &LaikaConfig, action: VaultAction) -> Result<(), LaikaError> {
    let db = Database::open_with(&config.storage).await?;
    let vault = open_vault(&db, config).await?;
    match action {
        VaultAction::Init => println!("vault ready"),
        VaultAction::Set(name) => {
            let value = read_stdin_line(&format!("value for {name} (one line on stdin):"))?;
            vault.store_secret(&name, &value).await?;
            println!("stored {name}");
        }
        VaultAction::List => {
            for (name, masked) in vault.list_secrets().await? {
                println!("{name}\t{masked}");
            }
        }
        VaultAction::Delete(name) => {
            if vault.delete_secret(&name).await? {
                println!("deleted {name}");
            } else {
                return Err(LaikaError::NotFound {
                    resource: format!("secret {name}"),
                });
            }
        }
        VaultAction::RotatePassphrase => {
            let next = read_stdin_line("new passphrase (one line on stdin):")?;
            vault.change_passphrase(&next, &config.vault).await?;
            info!("vault passphrase rotated");
            println!("passphrase changed");
        }
    }
    db.close().await
}
