// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Byte buffer for secret material with guaranteed zeroing.
//!
//! [`SecretBuffer::clear`] overwrites every byte in place without
//! reallocating or shrinking, so a cleared buffer still has its original
//! length and reads back as all zeros. The same clearing runs on drop, which
//! covers early returns and unwinding.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

pub struct SecretBuffer {
    bytes: Vec<u8>,
    cleared: bool,
}

impl SecretBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            cleared: false,
        }
    }

    /// Copies `bytes` into a new buffer. The caller still owns (and must
    /// clear) the source.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Borrows the contents as UTF-8, if they are.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Overwrites every byte with zero. Idempotent.
    pub fn clear(&mut self) {
        self.bytes.as_mut_slice().zeroize();
        self.cleared = true;
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Shortens the buffer to `len`, zeroing the dropped tail first.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len < self.bytes.len() {
            self.bytes[len..].zeroize();
            self.bytes.truncate(len);
        }
    }

    /// Appends `bytes`, reallocating through a zeroed copy so no stale
    /// plaintext is left behind in the old allocation.
    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        let needed = self.bytes.len() + bytes.len();
        if needed > self.bytes.capacity() {
            let mut grown = Vec::with_capacity(needed.max(self.bytes.capacity() * 2));
            grown.extend_from_slice(&self.bytes);
            self.bytes.as_mut_slice().zeroize();
            self.bytes = grown;
        }
        self.bytes.extend_from_slice(bytes);
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}

impl ZeroizeOnDrop for SecretBuffer {}

impl From<Vec<u8>> for SecretBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
