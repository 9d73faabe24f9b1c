// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! AES-256-GCM and randomness on top of aws-lc-rs.
//!
//! Plaintext only ever lives in a [`SecretBuffer`]: sealing encrypts a
//! pre-sized copy in place, opening decrypts into a buffer that is cleared
//! if the tag does not verify.

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use aws_lc_rs::error::Unspecified;
use aws_lc_rs::rand::{SecureRandom, SystemRandom};

use crate::constants::{NONCE_LEN, TAG_LEN};
use crate::secret::SecretBuffer;

pub(crate) fn random_array<const N: usize>() -> Result<[u8; N], Unspecified> {
    let mut bytes = [0u8; N];
    SystemRandom::new().fill(&mut bytes)?;
    Ok(bytes)
}

pub(crate) fn random_secret(len: usize) -> Result<SecretBuffer, Unspecified> {
    let mut secret = SecretBuffer::zeroed(len);
    SystemRandom::new().fill(secret.as_mut_bytes())?;
    Ok(secret)
}

fn aead_key(key: &[u8]) -> Result<LessSafeKey, Unspecified> {
    Ok(LessSafeKey::new(UnboundKey::new(&AES_256_GCM, key)?))
}

/// Encrypts `plaintext` and returns ciphertext with the tag appended.
pub(crate) fn seal(
    key: &[u8],
    nonce: [u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, Unspecified> {
    let key = aead_key(key)?;

    // encrypted in place, so the plaintext copy is overwritten by ciphertext
    let mut in_out = SecretBuffer::from_slice(plaintext);

    let mut sealed = Vec::with_capacity(plaintext.len() + TAG_LEN);
    let tag = key.seal_in_place_separate_tag(
        Nonce::assume_unique_for_key(nonce),
        Aad::from(aad),
        in_out.as_mut_bytes(),
    )?;
    sealed.extend_from_slice(in_out.as_bytes());
    sealed.extend_from_slice(tag.as_ref());
    Ok(sealed)
}

/// Verifies and decrypts `ciphertext` (tag appended). Fails closed: no
/// plaintext byte survives a verification failure.
pub(crate) fn open(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<SecretBuffer, Unspecified> {
    let key = aead_key(key)?;
    let nonce = Nonce::try_assume_unique_for_key(nonce)?;

    let mut buffer = SecretBuffer::from_slice(ciphertext);
    let opened = key
        .open_in_place(nonce, Aad::from(aad), buffer.as_mut_bytes())
        .map(|plaintext| plaintext.len());

    match opened {
        Ok(len) => {
            buffer.truncate(len);
            Ok(buffer)
        }
        Err(err) => {
            buffer.clear();
            Err(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::constants::KEY_LEN;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = random_secret(KEY_LEN).unwrap();
        let nonce = random_array::<NONCE_LEN>().unwrap();

        let sealed = seal(key.as_bytes(), nonce, b"aad", b"pw123").unwrap();
        assert_eq!(sealed.len(), 5 + TAG_LEN);

        let opened = open(key.as_bytes(), &nonce, b"aad", &sealed).unwrap();
        assert_eq!(opened.as_bytes(), b"pw123");
    }

    #[test]
    fn test_open_with_wrong_aad_fails() {
        let key = random_secret(KEY_LEN).unwrap();
        let nonce = random_array::<NONCE_LEN>().unwrap();
        let sealed = seal(key.as_bytes(), nonce, b"aad", b"pw123").unwrap();
        assert!(open(key.as_bytes(), &nonce, b"other", &sealed).is_err());
    }

    #[test]
    fn test_open_rejects_short_nonce() {
        let key = random_secret(KEY_LEN).unwrap();
        let nonce = random_array::<NONCE_LEN>().unwrap();
        let sealed = seal(key.as_bytes(), nonce, b"", b"x").unwrap();
        assert!(open(key.as_bytes(), &nonce[..8], b"", &sealed).is_err());
    }

    #[test]
    fn test_open_rejects_truncated_ciphertext() {
        let key = random_secret(KEY_LEN).unwrap();
        let nonce = random_array::<NONCE_LEN>().unwrap();
        let sealed = seal(key.as_bytes(), nonce, b"", b"secret").unwrap();
        assert!(open(key.as_bytes(), &nonce, b"", &sealed[..4]).is_err());
    }

    #[test]
    fn test_wrong_key_length_rejected() {
        let nonce = random_array::<NONCE_LEN>().unwrap();
        assert!(seal(&[0u8; 16], nonce, b"", b"x").is_err());
    }

    #[test]
    fn test_random_secret_is_not_zero() {
        let a = random_secret(KEY_LEN).unwrap();
        let b = random_secret(KEY_LEN).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
