// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM sealing with a fresh random 96-bit nonce per message.

use laika_core::LaikaError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// Ciphertext (tag appended) plus the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

impl Sealed {
    /// Rebuild from the two stored columns.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: Vec<u8>) -> Result<Self, LaikaError> {
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| LaikaError::Vault("stored nonce is not 12 bytes".to_string()))?;
        Ok(Self { ciphertext, nonce })
    }
}

fn aead_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, LaikaError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| LaikaError::Vault("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

fn random_bytes<const N: usize>(what: &str) -> Result<[u8; N], LaikaError> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| LaikaError::Vault(format!("failed to generate random {what}")))?;
    Ok(out)
}

pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Sealed, LaikaError> {
    let key = aead_key(key)?;
    let nonce = random_bytes::<NONCE_LEN>("nonce")?;
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| LaikaError::Vault("AES-256-GCM encryption failed".to_string()))?;
    Ok(Sealed {
        ciphertext: in_out,
        nonce,
    })
}

/// Decrypt `sealed`. A wrong key and tampered data are indistinguishable.
pub fn open(key: &[u8; KEY_LEN], sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>, LaikaError> {
    let key = aead_key(key)?;
    let mut in_out = Zeroizing::new(sealed.ciphertext.clone());
    let len = key
        .open_in_place(
            Nonce::assume_unique_for_key(sealed.nonce),
            Aad::empty(),
            in_out.as_mut_slice(),
        )
        .map_err(|_| {
            LaikaError::Vault("decryption failed: wrong key or corrupted data".to_string())
        })?
        .len();
    in_out.truncate(len);
    Ok(in_out)
}

pub fn generate_key() -> Result<Zeroizing<[u8; KEY_LEN]>, LaikaError> {
    random_bytes::<KEY_LEN>("key").map(Zeroizing::new)
}

pub fn generate_salt() -> Result<[u8; 16], LaikaError> {
    random_bytes::<16>("salt")
}
