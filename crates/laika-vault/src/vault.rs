// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master-key vault.
//!
//! A random master key encrypts every secret: named entries in
//! `vault_entries` and the credential documents of connection accounts. The
//! master key itself is stored wrapped by an Argon2id key derived from the
//! operator passphrase. Changing the passphrase re-wraps only the master key.

use laika_config::model::VaultConfig;
use laika_core::LaikaError;
use laika_storage::Database;
use rusqlite::{OptionalExtension, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN, Sealed};
use crate::kdf::{self, KdfParams};

const META_WRAPPED_KEY: &str = "wrapped_master_key";
const META_KEY_NONCE: &str = "master_key_nonce";
const META_SALT: &str = "kdf_salt";
const META_PARAMS: &str = "kdf_params";

/// The unlocked vault. The master key lives only in memory.
pub struct Vault {
    master_key: Zeroizing<[u8; KEY_LEN]>,
    db: Database,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("master_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

struct WrappedKey {
    sealed: Sealed,
    salt: [u8; 16],
    params: KdfParams,
}

impl Vault {
    pub async fn exists(db: &Database) -> Result<bool, LaikaError> {
        db.call(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM vault_meta WHERE key = ?1",
                params![META_WRAPPED_KEY],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    /// Create the vault with a fresh master key wrapped by `passphrase`.
    pub async fn create(
        db: Database,
        passphrase: &SecretString,
        config: &VaultConfig,
    ) -> Result<Self, LaikaError> {
        if Self::exists(&db).await? {
            return Err(LaikaError::Vault("a vault already exists in this database".into()));
        }
        let master_key = crypto::generate_key()?;
        write_wrapped(&db, &master_key, passphrase, KdfParams::from(config)).await?;
        info!("vault created");
        Ok(Self { master_key, db })
    }

    /// Unwrap the stored master key with `passphrase`.
    pub async fn unlock(db: Database, passphrase: &SecretString) -> Result<Self, LaikaError> {
        let wrapped = read_wrapped(&db).await?;
        let wrapping_key = kdf::derive_key(
            passphrase.expose_secret().as_bytes(),
            &wrapped.salt,
            &wrapped.params,
        )?;
        let plain = crypto::open(&wrapping_key, &wrapped.sealed).map_err(|_| {
            LaikaError::Vault("invalid passphrase or corrupted vault: decryption failed".into())
        })?;
        let master_key: [u8; KEY_LEN] = plain
            .as_slice()
            .try_into()
            .map_err(|_| LaikaError::Vault("corrupted master key (expected 32 bytes)".into()))?;
        debug!("vault unlocked");
        Ok(Self {
            master_key: Zeroizing::new(master_key),
            db,
        })
    }

    /// Unlock the vault, creating it on first start.
    pub async fn open_or_create(
        db: Database,
        passphrase: &SecretString,
        config: &VaultConfig,
    ) -> Result<Self, LaikaError> {
        if Self::exists(&db).await? {
            Self::unlock(db, passphrase).await
        } else {
            Self::create(db, passphrase, config).await
        }
    }

    /// A vault with a random master key that is never persisted. Secrets
    /// stored through it are unreadable after the process exits.
    pub fn ephemeral(db: Database) -> Result<Self, LaikaError> {
        Ok(Self {
            master_key: crypto::generate_key()?,
            db,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub(crate) fn seal(&self, plaintext: &[u8]) -> Result<Sealed, LaikaError> {
        crypto::seal(&self.master_key, plaintext)
    }

    pub(crate) fn open(&self, sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>, LaikaError> {
        crypto::open(&self.master_key, sealed)
    }

    pub async fn store_secret(&self, name: &str, value: &SecretString) -> Result<(), LaikaError> {
        let sealed = self.seal(value.expose_secret().as_bytes())?;
        let key = name.to_string();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO vault_entries (name, ciphertext, nonce) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name) DO UPDATE SET
                         ciphertext = excluded.ciphertext,
                         nonce = excluded.nonce,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![key, sealed.ciphertext, sealed.nonce.to_vec()],
                )?;
                Ok(())
            })
            .await?;
        debug!(name, "secret stored");
        Ok(())
    }

    pub async fn retrieve_secret(&self, name: &str) -> Result<Option<SecretString>, LaikaError> {
        let key = name.to_string();
        let row: Option<(Vec<u8>, Vec<u8>)> = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT ciphertext, nonce FROM vault_entries WHERE name = ?1",
                        params![key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?)
            })
            .await?;
        let Some((ciphertext, nonce)) = row else {
            return Ok(None);
        };
        let plain = self.open(&Sealed::from_parts(ciphertext, nonce)?)?;
        let text = std::str::from_utf8(&plain)
            .map_err(|e| LaikaError::Vault(format!("secret {name} is not UTF-8: {e}")))?;
        Ok(Some(SecretString::from(text.to_string())))
    }

    /// Names with a masked preview of each value.
    pub async fn list_secrets(&self) -> Result<Vec<(String, String)>, LaikaError> {
        let names: Vec<String> = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM vault_entries ORDER BY name")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await?;

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let preview = match self.retrieve_secret(&name).await {
                Ok(Some(secret)) => mask_secret(secret.expose_secret()),
                _ => "[unreadable]".to_string(),
            };
            out.push((name, preview));
        }
        Ok(out)
    }

    /// Returns whether an entry was removed.
    pub async fn delete_secret(&self, name: &str) -> Result<bool, LaikaError> {
        let key = name.to_string();
        let removed = self
            .db
            .call(move |conn| Ok(conn.execute("DELETE FROM vault_entries WHERE name = ?1", params![key])?))
            .await?;
        debug!(name, removed, "secret deleted");
        Ok(removed > 0)
    }

    pub async fn change_passphrase(
        &self,
        new_passphrase: &SecretString,
        config: &VaultConfig,
    ) -> Result<(), LaikaError> {
        write_wrapped(&self.db, &self.master_key, new_passphrase, KdfParams::from(config)).await?;
        info!("vault passphrase changed");
        Ok(())
    }
}

async fn write_wrapped(
    db: &Database,
    master_key: &[u8; KEY_LEN],
    passphrase: &SecretString,
    params: KdfParams,
) -> Result<(), LaikaError> {
    let salt = crypto::generate_salt()?;
    let wrapping_key = kdf::derive_key(passphrase.expose_secret().as_bytes(), &salt, &params)?;
    let sealed = crypto::seal(&wrapping_key, master_key)?;
    let params_json = serde_json::to_vec(&params)?;

    db.transaction(move |tx| {
        let entries: [(&str, Vec<u8>); 4] = [
            (META_WRAPPED_KEY, sealed.ciphertext),
            (META_KEY_NONCE, sealed.nonce.to_vec()),
            (META_SALT, salt.to_vec()),
            (META_PARAMS, params_json),
        ];
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        Ok(())
    })
    .await
}

async fn read_wrapped(db: &Database) -> Result<WrappedKey, LaikaError> {
    let (wrapped, nonce, salt, params) = db
        .call(|conn| {
            let get = |key: &str| -> Result<Vec<u8>, LaikaError> {
                conn.query_row(
                    "SELECT value FROM vault_meta WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| LaikaError::Vault(format!("vault is missing {key}; run `laika vault init`")))
            };
            Ok((
                get(META_WRAPPED_KEY)?,
                get(META_KEY_NONCE)?,
                get(META_SALT)?,
                get(META_PARAMS)?,
            ))
        })
        .await?;

    let params: KdfParams = serde_json::from_slice(&params)
        .map_err(|e| LaikaError::Vault(format!("corrupted KDF params: {e}")))?;
    let salt: [u8; 16] = salt
        .try_into()
        .map_err(|_| LaikaError::Vault("corrupted salt (expected 16 bytes)".into()))?;
    Ok(WrappedKey {
        sealed: Sealed::from_parts(wrapped, nonce)?,
        salt,
        params,
    })
}

/// `abcd...wxyz` preview; values shorter than ten characters are fully masked.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}...{suffix}")
}
