// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Peer access control bound to the `TRUSTED_LIST` property.
//!
//! The list holds CIDR networks, bare addresses and host names separated by
//! commas or whitespace. Host names are resolved once, at load. An empty list
//! permits every peer.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::connect_info::Connected;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::serve::IncomingStream;
use ipnet::IpNet;
use tokio::net::TcpListener;

use crate::application::AppState;
use crate::errors::{AccessListError, AppError};
use crate::tls::TlsListener;

/// Remote address of a connection, attached to every request as
/// `ConnectInfo<PeerAddr>` whether the listener speaks TLS or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

impl Connected<IncomingStream<'_, TcpListener>> for PeerAddr {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self(*stream.remote_addr())
    }
}

impl Connected<IncomingStream<'_, TlsListener>> for PeerAddr {
    fn connect_info(stream: IncomingStream<'_, TlsListener>) -> Self {
        Self(*stream.remote_addr())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedNetworks {
    networks: Vec<IpNet>,
}

impl TrustedNetworks {
    /// Parses `list`, resolving host names through the system resolver.
    pub async fn load(list: &str) -> Result<Self, AccessListError> {
        let mut networks = Vec::new();
        for entry in entries(list) {
            match parse_literal(entry) {
                Some(network) => networks.push(network),
                None => networks.extend(resolve(entry).await?),
            }
        }

        let trusted = Self { networks };
        if trusted.permits_all() {
            tracing::warn!("[mepauth] trusted list is empty, every peer is permitted");
        } else {
            tracing::info!(
                "[mepauth] trusted list holds {} networks",
                trusted.networks.len()
            );
        }
        Ok(trusted)
    }

    /// Parses `list` without touching the resolver; host names are rejected.
    pub fn from_literals(list: &str) -> Result<Self, AccessListError> {
        let networks = entries(list)
            .map(|entry| {
                parse_literal(entry).ok_or_else(|| AccessListError::InvalidEntry(entry.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    pub fn permits_all(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn permits(&self, ip: IpAddr) -> bool {
        // IPv4 peers on a dual-stack socket show up as ::ffff:a.b.c.d
        let ip = ip.to_canonical();
        self.permits_all() || self.networks.iter().any(|network| network.contains(&ip))
    }

    pub fn networks(&self) -> &[IpNet] {
        &self.networks
    }
}

fn entries(list: &str) -> impl Iterator<Item = &str> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
}

fn parse_literal(entry: &str) -> Option<IpNet> {
    entry
        .parse::<IpNet>()
        .ok()
        .or_else(|| entry.parse::<IpAddr>().ok().map(IpNet::from))
}

async fn resolve(host: &str) -> Result<Vec<IpNet>, AccessListError> {
    let valid_name = host.len() <= 253
        && host
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.');
    if !valid_name {
        return Err(AccessListError::InvalidEntry(host.to_string()));
    }

    let addresses: Vec<IpNet> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|source| AccessListError::Resolve {
            host: host.to_string(),
            source,
        })?
        .map(|address| IpNet::from(address.ip()))
        .collect();
    if addresses.is_empty() {
        return Err(AccessListError::Unresolved(host.to_string()));
    }

    tracing::debug!("[mepauth] resolved {} to {:?}", host, addresses);
    Ok(addresses)
}

/// Rejects requests from peers outside the trusted list. A request without a
/// known peer address is rejected too.
pub async fn gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ConnectInfo(PeerAddr(peer))) = request.extensions().get::<ConnectInfo<PeerAddr>>()
    else {
        tracing::warn!("[mepauth] rejected request without a peer address");
        return Err(AppError::Forbidden);
    };

    if !state.trusted.permits(peer.ip()) {
        tracing::warn!("[mepauth] rejected request from untrusted peer {}", peer.ip());
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
