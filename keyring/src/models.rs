// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Persisted records and the secret categories they protect.
//!
//! Both record types are self-describing JSON documents with an explicit
//! version so a future format change is rejected instead of misread.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    KDF_ALGORITHM, KDF_DEFAULT_ITERATIONS, KDF_DEFAULT_LANES, KDF_DEFAULT_MEMORY_KIB,
    KDF_MAX_ITERATIONS, KDF_MAX_LANES, KDF_MAX_MEMORY_KIB, KDF_MIN_MEMORY_KIB,
    WORK_KEY_LABEL_PREFIX,
};

/// Protected secret categories. Each one gets its own work key and envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    JwtPassword,
    AccessKey,
    SecretKey,
}

impl SecretKind {
    pub const ALL: [SecretKind; 3] = [Self::JwtPassword, Self::AccessKey, Self::SecretKey];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JwtPassword => "jwt_password",
            Self::AccessKey => "access_key",
            Self::SecretKey => "secret_key",
        }
    }

    /// Domain-separation label for the category's work key.
    pub fn work_key_label(&self) -> String {
        format!("{}{}", WORK_KEY_LABEL_PREFIX, self.as_str())
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argon2id cost parameters, stored alongside the salt they were used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    #[serde(rename = "argon2id")]
    Argon2id,
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(KDF_ALGORITHM)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib: KDF_DEFAULT_MEMORY_KIB,
            iterations: KDF_DEFAULT_ITERATIONS,
            lanes: KDF_DEFAULT_LANES,
        }
    }
}

impl KdfParams {
    pub fn new(memory_kib: u32, iterations: u32, lanes: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib,
            iterations,
            lanes,
        }
    }

    /// Whether these parameters are sane enough to run. Values read from
    /// disk outside these bounds are treated as a damaged record.
    pub fn is_within_bounds(&self) -> bool {
        (1..=KDF_MAX_LANES).contains(&self.lanes)
            && (1..=KDF_MAX_ITERATIONS).contains(&self.iterations)
            && self.memory_kib >= KDF_MIN_MEMORY_KIB.max(8 * self.lanes)
            && self.memory_kib <= KDF_MAX_MEMORY_KIB
    }

    /// Canonical encoding bound into the root-key AAD.
    pub(crate) fn encode(&self) -> String {
        format!(
            "{}:m={},t={},p={}",
            self.algorithm, self.memory_kib, self.iterations, self.lanes
        )
    }
}

/// Root key sealed under a key derived from the operator's key component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootKeyRecord {
    pub version: u8,
    pub created_at: DateTime<Utc>,
    pub kdf: KdfParams,
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Root key followed by the AES-GCM tag.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

/// One protected secret sealed under its category's work key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    pub category: SecretKind,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext followed by the AES-GCM tag.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

mod base64_bytes {
    use data_encoding::BASE64;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|err| D::Error::custom(format!("invalid base64: {err}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_kind_labels_are_distinct() {
        let labels: Vec<String> = SecretKind::ALL.iter().map(|k| k.work_key_label()).collect();
        assert_eq!(labels[0], "mepauth/work-key/v1/jwt_password");
        assert_ne!(labels[0], labels[1]);
        assert_ne!(labels[1], labels[2]);
    }

    #[test]
    fn test_secret_kind_serde_matches_file_name() {
        for kind in SecretKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.file_name(), format!("{}.json", kind.as_str()));
        }
    }

    #[test]
    fn test_default_kdf_params_within_bounds() {
        assert!(KdfParams::default().is_within_bounds());
        assert!(KdfParams::new(1024, 1, 1).is_within_bounds());
    }

    #[test]
    fn test_kdf_params_out_of_bounds() {
        assert!(!KdfParams::new(4, 1, 1).is_within_bounds());
        assert!(!KdfParams::new(1024, 0, 1).is_within_bounds());
        assert!(!KdfParams::new(1024, 1, 0).is_within_bounds());
        assert!(!KdfParams::new(KDF_MAX_MEMORY_KIB + 1, 1, 1).is_within_bounds());
        assert!(!KdfParams::new(1024, KDF_MAX_ITERATIONS + 1, 1).is_within_bounds());
        // argon2 needs at least 8 KiB per lane
        assert!(!KdfParams::new(16, 1, 4).is_within_bounds());
    }

    #[test]
    fn test_kdf_params_json_shape() {
        let json = serde_json::to_value(KdfParams::new(1024, 2, 1)).unwrap();
        assert_eq!(json["algorithm"], "argon2id");
        assert_eq!(json["memory_kib"], 1024);
        assert_eq!(json["iterations"], 2);
        assert_eq!(json["lanes"], 1);
    }

    #[test]
    fn test_envelope_rejects_bad_base64() {
        let json = r#"{"version":1,"category":"jwt_password","nonce":"!!","ciphertext":"AA=="}"#;
        assert!(serde_json::from_str::<Envelope>(json).is_err());
    }
}
