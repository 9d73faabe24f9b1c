// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

/// Length of the root key and of every derived work key (AES-256).
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Argon2id salt length for the root-key record.
pub const SALT_LEN: usize = 32;

pub const ROOT_KEY_RECORD_VERSION: u8 = 1;
pub const ENVELOPE_VERSION: u8 = 1;

pub const KDF_ALGORITHM: &str = "argon2id";

// Argon2id defaults (64 MiB, 3 passes, 1 lane)
pub const KDF_DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
pub const KDF_DEFAULT_ITERATIONS: u32 = 3;
pub const KDF_DEFAULT_LANES: u32 = 1;

// Bounds accepted when reading parameters back from disk
pub const KDF_MIN_MEMORY_KIB: u32 = 8;
pub const KDF_MAX_MEMORY_KIB: u32 = 1024 * 1024;
pub const KDF_MAX_ITERATIONS: u32 = 16;
pub const KDF_MAX_LANES: u32 = 8;

/// HKDF extract salt for work-key derivation.
pub const WORK_KEY_SALT: &[u8] = b"mepauth work key salt v1";
pub const WORK_KEY_LABEL_PREFIX: &str = "mepauth/work-key/v1/";

pub const ROOT_KEY_FILE: &str = "root_key.json";

/// Upper bound on a persisted record, far above anything we write.
pub const MAX_RECORD_SIZE: u64 = 64 * 1024;

/// Attempts at drawing a fresh nonce before giving up on a collision.
pub const MAX_NONCE_ATTEMPTS: usize = 4;

// Property names consumed by the bootstrapper
pub const PROP_KEY_COMPONENT: &str = "KEY_COMPONENT";
pub const PROP_TRUSTED_LIST: &str = "TRUSTED_LIST";
pub const PROP_JWT_PRIVATE_KEY: &str = "JWT_PRIVATE_KEY";
pub const PROP_APP_INST_ID: &str = "APP_INST_ID";
pub const PROP_ACCESS_KEY: &str = "ACCESS_KEY";
pub const PROP_SECRET_KEY: &str = "SECRET_KEY";
pub const PROP_TLS_CERT_FILE: &str = "TLS_CERT_FILE";
pub const PROP_TLS_KEY_FILE: &str = "TLS_KEY_FILE";

// Input limits
pub const MAX_APP_INST_ID_LENGTH: usize = 64;
pub const MAX_ACCESS_KEY_LENGTH: usize = 64;
pub const MAX_SECRET_LENGTH: usize = 256;

// Key component policy defaults
pub const COMPONENT_MIN_LENGTH: usize = 8;
pub const COMPONENT_MAX_LENGTH: usize = 256;
pub const COMPONENT_MAX_REPEAT: usize = 3;
pub const COMPONENT_MAX_SEQUENCE: usize = 3;
