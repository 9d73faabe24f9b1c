// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Authenticated encryption of protected secrets under a work key.
//!
//! # Nonces
//!
//! Every [`SecretCodec::seal`] draws a fresh 96-bit nonce from the system
//! RNG and checks it against the nonces this codec already issued; a repeat
//! is redrawn a bounded number of times. A work key seals at most a handful
//! of envelopes over the lifetime of a store (one per category on first
//! run), so random nonces stay far below the birthday bound.
//!
//! # Envelope AAD
//!
//! The AAD binds the envelope version and category, so an envelope moved to
//! another category's file, or relabelled, fails authentication.

use std::collections::HashSet;

use crate::cipher;
use crate::constants::{ENVELOPE_VERSION, MAX_NONCE_ATTEMPTS, NONCE_LEN};
use crate::error::{DecryptError, SealError};
use crate::models::{Envelope, SecretKind};
use crate::secret::SecretBuffer;
use crate::work_key::WorkKey;

#[derive(Debug)]
pub struct SecretCodec {
    kind: SecretKind,
    issued_nonces: HashSet<[u8; NONCE_LEN]>,
}

impl SecretCodec {
    pub fn new(kind: SecretKind) -> Self {
        Self {
            kind,
            issued_nonces: HashSet::new(),
        }
    }

    pub fn seal(&mut self, work_key: &WorkKey, plaintext: &[u8]) -> Result<Envelope, SealError> {
        let nonce = self.fresh_nonce()?;
        let aad = envelope_aad(ENVELOPE_VERSION, self.kind);
        let ciphertext = cipher::seal(work_key.as_bytes(), nonce, &aad, plaintext)
            .map_err(|_| SealError::Crypto)?;

        Ok(Envelope {
            version: ENVELOPE_VERSION,
            category: self.kind,
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    /// Verifies the tag and returns the plaintext. Nothing is returned on a
    /// verification failure.
    pub fn open(&self, work_key: &WorkKey, envelope: &Envelope) -> Result<SecretBuffer, DecryptError> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(DecryptError::UnsupportedVersion(envelope.version));
        }
        if envelope.category != self.kind {
            return Err(DecryptError::AuthenticationFailed);
        }

        let aad = envelope_aad(envelope.version, self.kind);
        cipher::open(
            work_key.as_bytes(),
            &envelope.nonce,
            &aad,
            &envelope.ciphertext,
        )
        .map_err(|_| DecryptError::AuthenticationFailed)
    }

    fn fresh_nonce(&mut self) -> Result<[u8; NONCE_LEN], SealError> {
        for _ in 0..MAX_NONCE_ATTEMPTS {
            let nonce = cipher::random_array::<NONCE_LEN>().map_err(|_| SealError::Crypto)?;
            if self.issued_nonces.insert(nonce) {
                return Ok(nonce);
            }
            tracing::warn!("[keyring] nonce collision for {}, redrawing", self.kind);
        }
        Err(SealError::NonceCollision)
    }
}

fn envelope_aad(version: u8, kind: SecretKind) -> Vec<u8> {
    format!("mepauth-envelope/v{}/{}", version, kind.as_str()).into_bytes()
}
