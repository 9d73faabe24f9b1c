// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10443;
pub const DEFAULT_PROPERTIES_PATH: &str = "/usr/mep/mprop/mepauth.properties";
pub const DEFAULT_KEY_DIR: &str = "/usr/mep/keys";

/// A client that has not finished the TLS handshake by then is dropped.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handshaken connections waiting for the server to pick them up.
pub const ESTABLISHED_BACKLOG: usize = 64;

pub const ALPN_HTTP1: &[u8] = b"http/1.1";
