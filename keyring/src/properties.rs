// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! `NAME = value` properties read straight into [`SecretBuffer`]s.
//!
//! Each line is split on its first `=` and both sides are trimmed. Lines
//! without `=` or with an empty name are skipped. A later duplicate replaces
//! the earlier value, whose buffer is zeroed. The raw file contents are
//! zeroed once parsing is done.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use zeroize::Zeroize;

use crate::error::PropertiesError;
use crate::secret::SecretBuffer;

/// Largest properties source accepted.
pub const MAX_PROPERTIES_SIZE: usize = 1024 * 1024;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Default)]
pub struct ConfigProperties {
    entries: BTreeMap<String, SecretBuffer>,
}

impl ConfigProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: &Path) -> Result<Self, PropertiesError> {
        let io_error = |source| PropertiesError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(path).map_err(io_error)?;
        Self::from_reader(file).map_err(|err| match err {
            PropertiesError::Io { source, .. } => io_error(source),
            other => other,
        })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, PropertiesError> {
        let mut raw = SecretBuffer::new(Vec::new());
        let mut chunk = [0u8; READ_CHUNK];
        let read = loop {
            match reader.read(&mut chunk) {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    if raw.len() + n > MAX_PROPERTIES_SIZE {
                        break Err(PropertiesError::TooLarge {
                            limit: MAX_PROPERTIES_SIZE,
                        });
                    }
                    raw.extend_from_slice(&chunk[..n]);
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    break Err(PropertiesError::Io {
                        path: "<reader>".to_string(),
                        source,
                    });
                }
            }
        };
        chunk.zeroize();
        read?;

        let properties = Self::parse(raw.as_bytes());
        raw.clear();
        Ok(properties)
    }

    fn parse(raw: &[u8]) -> Self {
        let mut properties = Self::new();
        for line in raw.split(|byte| *byte == b'\n') {
            let line = line.trim_ascii();
            let Some(split) = line.iter().position(|byte| *byte == b'=') else {
                continue;
            };
            let name = match std::str::from_utf8(line[..split].trim_ascii()) {
                Ok(name) if !name.is_empty() => name,
                _ => continue,
            };
            let value = line[split + 1..].trim_ascii();
            properties.insert(name, SecretBuffer::from_slice(value));
        }
        properties
    }

    /// Adds or replaces a property. A replaced value is zeroed.
    pub fn insert(&mut self, name: impl Into<String>, value: SecretBuffer) {
        if let Some(mut previous) = self.entries.insert(name.into(), value) {
            previous.clear();
        }
    }

    pub fn get(&self, name: &str) -> Option<&SecretBuffer> {
        self.entries.get(name)
    }

    /// Removes a property, handing ownership (and the duty to clear it) to
    /// the caller.
    pub fn take(&mut self, name: &str) -> Option<SecretBuffer> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Zeroes every value in place. Entries stay so callers can check.
    pub fn clear_all(&mut self) {
        for value in self.entries.values_mut() {
            value.clear();
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.entries
            .values()
            .all(|value| value.is_cleared() && value.as_bytes().iter().all(|byte| *byte == 0))
    }
}
