// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::constants::{DEFAULT_HOST, DEFAULT_KEY_DIR, DEFAULT_PORT, DEFAULT_PROPERTIES_PATH};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct MepauthOptions {
    #[arg(long, default_value = DEFAULT_HOST, env("MEPAUTH_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_PORT, env("MEPAUTH_HTTP_PORT"))]
    pub port: u16,
    /// Properties file holding the key component and first-run secrets
    #[arg(long, default_value = DEFAULT_PROPERTIES_PATH, env("MEPAUTH_PROPERTIES"))]
    pub properties: PathBuf,
    /// Directory of the root key record and secret envelopes
    #[arg(long, default_value = DEFAULT_KEY_DIR, env("MEPAUTH_KEY_DIR"))]
    pub key_dir: PathBuf,
    /// Serve plain HTTP when no TLS certificate is configured
    #[arg(long, default_value = "false", env("MEPAUTH_ALLOW_PLAINTEXT"), action = ArgAction::SetTrue)]
    pub allow_plaintext: bool,
}

impl MepauthOptions {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for MepauthOptions {
    fn default() -> Self {
        MepauthOptions {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            properties: PathBuf::from(DEFAULT_PROPERTIES_PATH),
            key_dir: PathBuf::from(DEFAULT_KEY_DIR),
            allow_plaintext: false,
        }
    }
}
