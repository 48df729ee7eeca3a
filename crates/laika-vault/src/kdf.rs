// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id (v0x13) derivation of the key that wraps the master key.

use laika_config::model::VaultConfig;
use laika_core::LaikaError;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::KEY_LEN;

/// Cost parameters, persisted next to the wrapped key so a later config
/// change does not lock the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<&VaultConfig> for KdfParams {
    fn from(config: &VaultConfig) -> Self {
        Self {
            memory_cost: config.kdf_memory_cost,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
        }
    }
}

pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; 16],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, LaikaError> {
    let argon_params = argon2::Params::new(
        params.memory_cost,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| LaikaError::Vault(format!("invalid Argon2id parameters: {e}")))?;
    let argon = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon_params);
    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| LaikaError::Vault(format!("Argon2id key derivation failed: {e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEAP: KdfParams = KdfParams {
        memory_cost: 8192,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn derivation_is_deterministic_per_salt() {
        let a = derive_key(b"pass", &[1; 16], &CHEAP).unwrap();
        let b = derive_key(b"pass", &[1; 16], &CHEAP).unwrap();
        let c = derive_key(b"pass", &[2; 16], &CHEAP).unwrap();
        let d = derive_key(b"other", &[1; 16], &CHEAP).unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
        assert_ne!(*a, *d);
    }

    #[test]
    fn nonsense_parameters_are_rejected() {
        let bad = KdfParams {
            memory_cost: 1,
            iterations: 0,
            parallelism: 0,
        };
        assert!(derive_key(b"pass", &[0; 16], &bad).is_err());
    }
}
