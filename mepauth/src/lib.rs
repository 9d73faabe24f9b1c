// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # mepauth
//!
//! Startup and serving shell of the MEP authentication service.
//!
//! ```text
//! mepauth.properties -> CredentialBootstrapper (mep-keyring) -> Arc<Credentials>
//!                                                                   |
//!                         TLS listener -> access gate -> routes <---+
//! ```
//!
//! The process refuses to bind a listener until the credential bootstrap has
//! succeeded. Every request except `/health` must come from a peer in the
//! `TRUSTED_LIST` networks.
//!
//! ## Modules
//!
//! - [`access`]: trusted-network list and the gate middleware
//! - [`application`]: router and listener setup
//! - [`configuration`]: CLI and environment options
//! - [`errors`]: error types with HTTP response mapping
//! - [`routes`]: HTTP handlers
//! - [`tls`]: rustls server configuration and the TLS listener

pub mod access;
pub mod application;
pub mod configuration;
pub mod constants;
pub mod errors;
pub mod routes;
pub mod tls;
