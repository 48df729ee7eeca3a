// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault passphrase from `LAIKA_VAULT_KEY` or an interactive prompt.

use std::io::IsTerminal;

use laika_core::LaikaError;
use secrecy::SecretString;

pub const VAULT_KEY_ENV_VAR: &str = "LAIKA_VAULT_KEY";

/// Passphrase for unlocking an existing vault.
pub fn vault_passphrase() -> Result<SecretString, LaikaError> {
    resolve_passphrase(std::env::var(VAULT_KEY_ENV_VAR).ok(), || {
        read_hidden("Vault passphrase: ").map(Some)
    })
}

/// Passphrase for a new vault; interactive input is asked for twice.
pub fn new_vault_passphrase() -> Result<SecretString, LaikaError> {
    resolve_passphrase(std::env::var(VAULT_KEY_ENV_VAR).ok(), || {
        let first = read_hidden("New vault passphrase: ")?;
        let second = read_hidden("Confirm vault passphrase: ")?;
        if first != second {
            return Err(LaikaError::Vault("passphrases do not match".to_string()));
        }
        Ok(Some(first))
    })
}

fn read_hidden(label: &str) -> Result<String, LaikaError> {
    if !std::io::stdin().is_terminal() {
        return Err(LaikaError::Vault(format!(
            "no passphrase provided: set {VAULT_KEY_ENV_VAR} or run interactively"
        )));
    }
    eprint!("{label}");
    rpassword::read_password()
        .map_err(|e| LaikaError::Vault(format!("failed to read passphrase: {e}")))
}

/// The environment value wins when non-empty; otherwise `interactive` is
/// asked. Empty passphrases are refused either way.
pub(crate) fn resolve_passphrase<F>(
    env_value: Option<String>,
    interactive: F,
) -> Result<SecretString, LaikaError>
where
    F: FnOnce() -> Result<Option<String>, LaikaError>,
{
    if let Some(value) = env_value {
        if !value.is_empty() {
            return Ok(SecretString::from(value));
        }
    }
    match interactive()? {
        Some(value) if !value.is_empty() => Ok(SecretString::from(value)),
        _ => Err(LaikaError::Vault("empty passphrase not allowed".to_string())),
    }
}
