// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Work keys: HKDF-SHA256 expansions of the root key, one per label.
//!
//! A work key is never written anywhere. The same root key and label always
//! give the same work key, and distinct labels give independent keys.

use std::fmt;

use aws_lc_rs::hkdf::{KeyType, Salt, HKDF_SHA256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{KEY_LEN, WORK_KEY_SALT};
use crate::models::SecretKind;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WorkKey([u8; KEY_LEN]);

struct WorkKeyLength;

impl KeyType for WorkKeyLength {
    fn len(&self) -> usize {
        KEY_LEN
    }
}

impl WorkKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn clear(&mut self) {
        self.0.zeroize();
    }
}

/// Derives the work key for `label` from the root key.
///
/// # Panics
///
/// Panics if `root_key` is not exactly [`KEY_LEN`] bytes. Root keys only
/// come out of [`RootKeyStore`](crate::root_key::RootKeyStore), which
/// guarantees the length, so anything else is a caller bug.
pub fn derive(root_key: &[u8], label: &str) -> WorkKey {
    assert_eq!(
        root_key.len(),
        KEY_LEN,
        "root key must be {KEY_LEN} bytes"
    );

    let prk = Salt::new(HKDF_SHA256, WORK_KEY_SALT).extract(root_key);
    let info = [label.as_bytes()];
    let mut key = WorkKey([0u8; KEY_LEN]);
    let filled = prk
        .expand(&info, WorkKeyLength)
        .and_then(|okm| okm.fill(&mut key.0));
    if filled.is_err() {
        // 32 bytes is always within HKDF-SHA256's output limit
        unreachable!("HKDF-SHA256 expand of {KEY_LEN} bytes failed");
    }
    key
}

/// Derives the work key for a protected-secret category.
pub fn derive_for(root_key: &[u8], kind: SecretKind) -> WorkKey {
    derive(root_key, &kind.work_key_label())
}

impl fmt::Debug for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkKey").field(&"[REDACTED]").finish()
    }
}
