// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Error types for the key hierarchy.
//!
//! Authentication failures carry no detail on purpose: a wrong key component
//! and a tampered record must look the same to the caller.

use crate::models::SecretKind;

/// Key component rejected by the [`ComponentPolicy`](crate::policy::ComponentPolicy).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("key component is shorter than {min} characters")]
    TooShort { min: usize },
    #[error("key component is longer than {max} characters")]
    TooLong { max: usize },
    #[error("key component must mix upper case, lower case, digit and symbol characters")]
    InsufficientComplexity,
    #[error("key component contains a repeated or sequential run")]
    WeakPattern,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("key store I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("key store record {path} is malformed")]
    Corrupt { path: String },
    #[error("key store record {path} already exists")]
    AlreadyInitialized { path: String },
    #[error("key store record {path} has unsupported version {version}")]
    UnsupportedVersion { path: String, version: u8 },
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("unable to seal root key")]
    Crypto,
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &std::path::Path) -> Self {
        Self::Corrupt {
            path: path.display().to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsealError {
    #[error("root key authentication failed")]
    AuthenticationFailed,
    #[error("unsupported root key record version {0}")]
    UnsupportedVersion(u8),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptError {
    #[error("envelope authentication failed")]
    AuthenticationFailed,
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealError {
    #[error("unable to draw a unique nonce")]
    NonceCollision,
    #[error("encryption failed")]
    Crypto,
}

#[derive(thiserror::Error, Debug)]
pub enum PropertiesError {
    #[error("unable to read properties from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("properties source exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Terminal failure of [`CredentialBootstrapper::run`](crate::bootstrap::CredentialBootstrapper::run).
#[derive(thiserror::Error, Debug)]
pub enum BootstrapError {
    #[error("missing required property {0}")]
    MissingProperty(&'static str),
    #[error("property {0} is malformed")]
    InvalidProperty(&'static str),
    #[error("key component rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("root key store failure: {0}")]
    Store(#[from] StoreError),
    #[error("unable to unseal root key: {0}")]
    Unseal(#[from] UnsealError),
    #[error("unable to open {kind} envelope: {source}")]
    Decrypt {
        kind: SecretKind,
        #[source]
        source: DecryptError,
    },
    #[error("unable to seal {kind}: {source}")]
    Seal {
        kind: SecretKind,
        #[source]
        source: SealError,
    },
    #[error("no stored envelope and no supplied value for {0}")]
    MissingSecret(SecretKind),
    #[error("bootstrap already ran for this context")]
    AlreadyRan,
}

impl BootstrapError {
    /// Stable label for logs; never includes secret material.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingProperty(_) | Self::InvalidProperty(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Store(StoreError::UnsupportedVersion { .. }) => "unsupported_version",
            Self::Store(_) => "store",
            Self::Unseal(UnsealError::UnsupportedVersion(_)) => "unsupported_version",
            Self::Unseal(UnsealError::AuthenticationFailed) => "authentication",
            Self::Decrypt {
                source: DecryptError::UnsupportedVersion(_),
                ..
            } => "unsupported_version",
            Self::Decrypt { .. } => "authentication",
            Self::Seal { .. } => "crypto",
            Self::MissingSecret(_) => "configuration",
            Self::AlreadyRan => "state",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_errors_carry_no_detail() {
        assert_eq!(
            UnsealError::AuthenticationFailed.to_string(),
            "root key authentication failed"
        );
        assert_eq!(
            DecryptError::AuthenticationFailed.to_string(),
            "envelope authentication failed"
        );
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(
            BootstrapError::from(ValidationError::WeakPattern).category(),
            "validation"
        );
        assert_eq!(
            BootstrapError::from(UnsealError::AuthenticationFailed).category(),
            "authentication"
        );
        assert_eq!(
            BootstrapError::Decrypt {
                kind: SecretKind::JwtPassword,
                source: DecryptError::UnsupportedVersion(9),
            }
            .category(),
            "unsupported_version"
        );
        assert_eq!(
            BootstrapError::MissingProperty("KEY_COMPONENT").category(),
            "configuration"
        );
    }
}
