// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! On-disk persistence for key records.
//!
//! Records are small JSON documents. Writes go to a temporary file in the
//! target directory, are flushed to disk and then renamed over the target,
//! so a reader sees either the old record or the new one, never a mix.
//! Temporary files are created with mode 0600 on Unix.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::constants::{ENVELOPE_VERSION, MAX_RECORD_SIZE};
use crate::error::StoreError;
use crate::models::{Envelope, SecretKind};

/// Reads a versioned record. `Ok(None)` means the file does not exist.
///
/// The version field is checked before the rest of the document is
/// interpreted, so a newer format is reported as unsupported rather than
/// as corruption.
pub(crate) fn read_versioned<T: DeserializeOwned>(
    path: &Path,
    expected_version: u8,
) -> Result<Option<T>, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io(path, err)),
    };

    let mut bytes = Vec::new();
    file.take(MAX_RECORD_SIZE + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| StoreError::io(path, err))?;
    if bytes.len() as u64 > MAX_RECORD_SIZE {
        return Err(StoreError::corrupt(path));
    }

    let value: Value = serde_json::from_slice(&bytes).map_err(|_| StoreError::corrupt(path))?;
    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| StoreError::corrupt(path))?;
    if version != u64::from(expected_version) {
        return Err(StoreError::UnsupportedVersion {
            path: path.display().to_string(),
            version: u8::try_from(version).unwrap_or(u8::MAX),
        });
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|_| StoreError::corrupt(path))
}

/// Writes a record that must not exist yet.
pub(crate) fn write_new<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    write_atomic(path, record, false)
}

/// Atomically replaces a record.
pub(crate) fn write_replace<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    write_atomic(path, record, true)
}

fn write_atomic<T: Serialize>(path: &Path, record: &T, replace: bool) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|err| StoreError::io(dir, err))?;

    let bytes = serde_json::to_vec_pretty(record).map_err(|_| StoreError::corrupt(path))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".mepauth-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| StoreError::io(dir, err))?;
    temp.write_all(&bytes)
        .map_err(|err| StoreError::io(temp.path(), err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| StoreError::io(temp.path(), err))?;

    if replace {
        temp.persist(path)
            .map_err(|err| StoreError::io(path, err.error))?;
    } else {
        temp.persist_noclobber(path).map_err(|err| {
            if err.error.kind() == ErrorKind::AlreadyExists {
                StoreError::AlreadyInitialized {
                    path: path.display().to_string(),
                }
            } else {
                StoreError::io(path, err.error)
            }
        })?;
    }

    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|err| StoreError::io(dir, err))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// One envelope file per protected-secret category.
#[derive(Debug, Clone)]
pub struct EnvelopeStore {
    dir: PathBuf,
}

impl EnvelopeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, kind: SecretKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub fn load(&self, kind: SecretKind) -> Result<Option<Envelope>, StoreError> {
        read_versioned(&self.path(kind), ENVELOPE_VERSION)
    }

    /// Persists a first-run envelope. Fails if one is already stored.
    pub fn store(&self, envelope: &Envelope) -> Result<(), StoreError> {
        write_new(&self.path(envelope.category), envelope)
    }
}
