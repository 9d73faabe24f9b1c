// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Complexity policy for the operator-supplied key component.
//!
//! The only way to obtain a [`KeyComponent`] is [`ComponentPolicy::accept`],
//! so nothing downstream can derive keys from an unchecked value.

use std::fmt;

use crate::constants::{
    COMPONENT_MAX_LENGTH, COMPONENT_MAX_REPEAT, COMPONENT_MAX_SEQUENCE, COMPONENT_MIN_LENGTH,
};
use crate::error::ValidationError;
use crate::secret::SecretBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
    /// Longest run of one repeated character that is still accepted.
    pub max_repeat: usize,
    /// Longest ascending or descending run (`abc`, `321`) that is still accepted.
    pub max_sequence: usize,
}

impl Default for ComponentPolicy {
    fn default() -> Self {
        Self {
            min_length: COMPONENT_MIN_LENGTH,
            max_length: COMPONENT_MAX_LENGTH,
            require_upper: true,
            require_lower: true,
            require_digit: true,
            require_symbol: true,
            max_repeat: COMPONENT_MAX_REPEAT,
            max_sequence: COMPONENT_MAX_SEQUENCE,
        }
    }
}

impl ComponentPolicy {
    /// Checks `component` against the policy. Pure; `component` is untouched.
    pub fn validate(&self, component: &[u8]) -> Result<(), ValidationError> {
        let length = component.len();
        if length == 0 || length < self.min_length {
            return Err(ValidationError::TooShort {
                min: self.min_length.max(1),
            });
        }
        if length > self.max_length {
            return Err(ValidationError::TooLong {
                max: self.max_length,
            });
        }

        let (mut upper, mut lower, mut digit, mut symbol) = (false, false, false, false);
        for byte in component {
            match byte {
                b'A'..=b'Z' => upper = true,
                b'a'..=b'z' => lower = true,
                b'0'..=b'9' => digit = true,
                _ => symbol = true,
            }
        }
        if (self.require_upper && !upper)
            || (self.require_lower && !lower)
            || (self.require_digit && !digit)
            || (self.require_symbol && !symbol)
        {
            return Err(ValidationError::InsufficientComplexity);
        }

        if longest_repeat(component) > self.max_repeat
            || longest_sequence(component) > self.max_sequence
        {
            return Err(ValidationError::WeakPattern);
        }

        Ok(())
    }

    /// Validates and takes ownership of `component`. On rejection the buffer
    /// is cleared before the error is returned.
    pub fn accept(&self, mut component: SecretBuffer) -> Result<KeyComponent, ValidationError> {
        match self.validate(component.as_bytes()) {
            Ok(()) => Ok(KeyComponent(component)),
            Err(err) => {
                component.clear();
                Err(err)
            }
        }
    }
}

fn longest_repeat(bytes: &[u8]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<u8> = None;
    for &byte in bytes {
        current = if previous == Some(byte) { current + 1 } else { 1 };
        longest = longest.max(current);
        previous = Some(byte);
    }
    longest
}

fn longest_sequence(bytes: &[u8]) -> usize {
    let mut longest = bytes.len().min(1);
    let mut ascending = 1;
    let mut descending = 1;
    for pair in bytes.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let alphanumeric = a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric();
        ascending = if alphanumeric && b == a.wrapping_add(1) { ascending + 1 } else { 1 };
        descending = if alphanumeric && a == b.wrapping_add(1) { descending + 1 } else { 1 };
        longest = longest.max(ascending).max(descending);
    }
    longest
}

/// A key component that passed the policy.
pub struct KeyComponent(SecretBuffer);

impl KeyComponent {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_cleared(&self) -> bool {
        self.0.is_cleared()
    }
}

impl fmt::Debug for KeyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyComponent").field(&"[REDACTED]").finish()
    }
}
