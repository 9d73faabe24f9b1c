// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Argon2id derivation of the key that protects the root key.

use argon2::{Algorithm, Argon2, Params, Version};

use crate::constants::KEY_LEN;
use crate::models::KdfParams;
use crate::secret::SecretBuffer;

/// Derives a 32-byte protection key from `password` and `salt`.
pub(crate) fn derive_protection_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<SecretBuffer, argon2::Error> {
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.lanes,
        Some(KEY_LEN),
    )?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = SecretBuffer::zeroed(KEY_LEN);
    if let Err(err) = argon2.hash_password_into(password, salt, output.as_mut_bytes()) {
        output.clear();
        return Err(err);
    }
    Ok(output)
}
