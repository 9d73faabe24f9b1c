// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Root key persistence.
//!
//! The root key is 32 random bytes sealed with AES-256-GCM under a key that
//! Argon2id derives from the operator's key component and a per-record salt.
//! The AAD binds the record version, the KDF parameters and the salt, so
//! editing any of them breaks authentication.
//!
//! # Oracle resistance
//!
//! [`RootKeyStore::unseal`] returns [`UnsealError::AuthenticationFailed`] for
//! a wrong component, a flipped ciphertext bit and a structurally damaged
//! record alike, and runs the KDF in every case so the three take roughly
//! the same time. A record file that cannot be parsed at all goes through
//! [`RootKeyStore::reject_damaged`] and fails the same way.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::cipher;
use crate::constants::{
    KEY_LEN, NONCE_LEN, ROOT_KEY_FILE, ROOT_KEY_RECORD_VERSION, SALT_LEN, TAG_LEN,
};
use crate::error::{StoreError, UnsealError};
use crate::kdf::derive_protection_key;
use crate::models::{KdfParams, RootKeyRecord};
use crate::policy::KeyComponent;
use crate::secret::SecretBuffer;
use crate::store;

#[derive(Debug, Clone)]
pub struct RootKeyStore {
    path: PathBuf,
    params: KdfParams,
}

impl RootKeyStore {
    /// Store rooted at `dir`, using the default Argon2id parameters for new
    /// records.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(ROOT_KEY_FILE),
            params: KdfParams::default(),
        }
    }

    /// Parameters for records created by [`initialize`](Self::initialize)
    /// and [`reseal`](Self::reseal). Existing records keep their own.
    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted record. `Ok(None)` signals a first run.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<RootKeyRecord>, StoreError> {
        store::read_versioned(&self.path, ROOT_KEY_RECORD_VERSION)
    }

    /// Generates a fresh root key, seals it under `component` and persists
    /// the record. Refuses to overwrite an existing record.
    ///
    /// Returns the record together with the root key plaintext so the caller
    /// does not pay for a second KDF run.
    #[tracing::instrument(skip(self, component), fields(path = %self.path.display()))]
    pub fn initialize(
        &self,
        component: &KeyComponent,
    ) -> Result<(RootKeyRecord, SecretBuffer), StoreError> {
        let root_key = cipher::random_secret(KEY_LEN).map_err(|_| StoreError::Crypto)?;
        let record = seal_root_key(&root_key, component, self.params)?;
        store::write_new(&self.path, &record)?;

        tracing::info!("[keyring] created root key record");

        Ok((record, root_key))
    }

    /// Re-protects an unsealed root key under a new key component and
    /// atomically replaces the stored record. Envelopes sealed under work
    /// keys of this root key stay valid.
    #[tracing::instrument(skip(self, root_key, component), fields(path = %self.path.display()))]
    pub fn reseal(
        &self,
        root_key: &SecretBuffer,
        component: &KeyComponent,
    ) -> Result<RootKeyRecord, StoreError> {
        if root_key.len() != KEY_LEN {
            return Err(StoreError::Crypto);
        }
        let record = seal_root_key(root_key, component, self.params)?;
        store::write_replace(&self.path, &record)?;

        tracing::info!("[keyring] replaced root key record");

        Ok(record)
    }

    /// Derives the protection key from `component` and the record's salt and
    /// parameters, then decrypts and authenticates the root key.
    pub fn unseal(
        &self,
        record: &RootKeyRecord,
        component: &KeyComponent,
    ) -> Result<SecretBuffer, UnsealError> {
        if record.version != ROOT_KEY_RECORD_VERSION {
            return Err(UnsealError::UnsupportedVersion(record.version));
        }

        let well_formed = record.kdf.is_within_bounds()
            && record.salt.len() == SALT_LEN
            && record.nonce.len() == NONCE_LEN
            && record.ciphertext.len() == KEY_LEN + TAG_LEN;

        if !well_formed {
            return Err(self.reject_damaged(component));
        }

        let protection_key = derive_protection_key(component.as_bytes(), &record.salt, &record.kdf)
            .map_err(|_| UnsealError::AuthenticationFailed)?;

        let aad = root_key_aad(record.version, &record.kdf, &record.salt);
        cipher::open(
            protection_key.as_bytes(),
            &record.nonce,
            &aad,
            &record.ciphertext,
        )
        .map_err(|_| UnsealError::AuthenticationFailed)
    }

    /// Pays one KDF run with the default parameters and reports an
    /// authentication failure. Used for records that are structurally
    /// damaged or cannot be parsed at all.
    pub fn reject_damaged(&self, component: &KeyComponent) -> UnsealError {
        let fallback_salt = [0u8; SALT_LEN];
        let derived =
            derive_protection_key(component.as_bytes(), &fallback_salt, &KdfParams::default());
        if derived.is_err() {
            tracing::debug!("[keyring] key derivation for a damaged record failed");
        }
        UnsealError::AuthenticationFailed
    }
}

fn seal_root_key(
    root_key: &SecretBuffer,
    component: &KeyComponent,
    params: KdfParams,
) -> Result<RootKeyRecord, StoreError> {
    let salt = cipher::random_array::<SALT_LEN>().map_err(|_| StoreError::Crypto)?;
    let nonce = cipher::random_array::<NONCE_LEN>().map_err(|_| StoreError::Crypto)?;

    let protection_key = derive_protection_key(component.as_bytes(), &salt, &params)
        .map_err(|_| StoreError::KeyDerivation)?;

    let aad = root_key_aad(ROOT_KEY_RECORD_VERSION, &params, &salt);
    let ciphertext = cipher::seal(protection_key.as_bytes(), nonce, &aad, root_key.as_bytes())
        .map_err(|_| StoreError::Crypto)?;

    Ok(RootKeyRecord {
        version: ROOT_KEY_RECORD_VERSION,
        created_at: Utc::now(),
        kdf: params,
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

fn root_key_aad(version: u8, params: &KdfParams, salt: &[u8]) -> Vec<u8> {
    let mut aad = format!("mepauth-root-key/v{}/{}/", version, params.encode()).into_bytes();
    aad.extend_from_slice(salt);
    aad
}
