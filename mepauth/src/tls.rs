// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! TLS termination for the HTTP listener.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::serve::Listener;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

use crate::constants::{ALPN_HTTP1, ESTABLISHED_BACKLOG, TLS_HANDSHAKE_TIMEOUT};
use crate::errors::TlsConfigError;

/// Builds a server configuration from a PEM certificate chain and private key.
pub fn server_config(cert_file: &Path, key_file: &Path) -> Result<Arc<ServerConfig>, TlsConfigError> {
    let pem_error = |path: &Path| {
        let path = path.display().to_string();
        move |source| TlsConfigError::Pem { path, source }
    };

    let certs = CertificateDer::pem_file_iter(cert_file)
        .map_err(pem_error(cert_file))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(pem_error(cert_file))?;
    if certs.is_empty() {
        return Err(TlsConfigError::NoCertificates(
            cert_file.display().to_string(),
        ));
    }
    let key = PrivateKeyDer::from_pem_file(key_file).map_err(pem_error(key_file))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![ALPN_HTTP1.to_vec()];

    tracing::info!(
        "[mepauth] loaded TLS certificate from {}",
        cert_file.display()
    );

    Ok(Arc::new(config))
}

/// Listener that hands axum connections whose TLS handshake has completed.
///
/// A background task accepts TCP connections and runs every handshake on its
/// own task, so a client that stalls mid-handshake holds up nobody else.
/// Failed or timed-out handshakes are logged and dropped. The background task
/// stops once the listener is dropped.
pub struct TlsListener {
    local_addr: SocketAddr,
    established: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
}

impl TlsListener {
    /// Must be called from within a tokio runtime.
    pub fn new(inner: TcpListener, config: Arc<ServerConfig>) -> io::Result<Self> {
        let local_addr = inner.local_addr()?;
        let (sender, established) = mpsc::channel(ESTABLISHED_BACKLOG);
        tokio::spawn(accept_loop(inner, TlsAcceptor::from(config), sender));

        Ok(Self {
            local_addr,
            established,
        })
    }
}

async fn accept_loop(
    mut inner: TcpListener,
    acceptor: TlsAcceptor,
    sender: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    loop {
        let (stream, peer) = tokio::select! {
            accepted = Listener::accept(&mut inner) => accepted,
            () = sender.closed() => return,
        };

        let acceptor = acceptor.clone();
        let sender = sender.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls)) => {
                    if sender.send((tls, peer)).await.is_err() {
                        tracing::debug!("[mepauth] listener closed, dropping {}", peer);
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!("[mepauth] TLS handshake with {} failed: {}", peer, err)
                }
                Err(_) => tracing::warn!("[mepauth] TLS handshake with {} timed out", peer),
            }
        });
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.established.recv().await {
            Some(connection) => connection,
            // the accept loop owns a sender for as long as this receiver lives
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}
