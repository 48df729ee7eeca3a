// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted credential vault for the Laika core.
//!
//! A random master key encrypts all secrets, and the master key itself is
//! protected by a passphrase-derived key via Argon2id. On top of it the
//! [`CredentialVault`] keeps each connection account's OAuth tokens, API keys
//! and AWS sessions, renewing them through per-vendor [`TokenRefresher`]s.

pub mod aws;
pub mod credential;
pub mod credential_vault;
pub mod crypto;
pub mod jwt;
pub mod kdf;
pub mod prompt;
pub mod refresh;
pub mod sigv4;
pub mod vault;

pub use aws::{AssumeRoleProvider, AwsAssumeRoleRefresher, RegionProbe, StsClient};
pub use credential::{AwsSession, Credential};
pub use credential_vault::CredentialVault;
pub use prompt::{VAULT_KEY_ENV_VAR, new_vault_passphrase, vault_passphrase};
pub use refresh::{OAuth2Refresher, RefreshedTokens, TokenRefresher};
pub use vault::{Vault, mask_secret};
