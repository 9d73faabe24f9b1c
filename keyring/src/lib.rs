// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Key hierarchy and credential bootstrap for the MEP authentication service.
//!
//! An operator-supplied key component unseals a persisted root key, the root
//! key yields one work key per secret category, and the work keys open the
//! envelopes holding the service's JWT password, access key and secret key.

pub mod bootstrap;
mod cipher;
pub mod codec;
pub mod constants;
pub mod error;
mod kdf;
pub mod models;
pub mod policy;
pub mod properties;
pub mod root_key;
pub mod secret;
pub mod store;
pub mod work_key;

pub use bootstrap::{BootstrapContext, BootstrapState, CredentialBootstrapper, Credentials};
pub use error::BootstrapError;
pub use properties::ConfigProperties;
pub use secret::SecretBuffer;
