// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use mep_keyring::Credentials;
use rustls::ServerConfig;
use tokio::net::TcpListener;

use crate::access::{self, PeerAddr, TrustedNetworks};
use crate::configuration::MepauthOptions;
use crate::routes;
use crate::tls::TlsListener;

pub struct AppState {
    pub credentials: Arc<Credentials>,
    pub trusted: TrustedNetworks,
}

enum Bound {
    Plain(TcpListener),
    Tls(TlsListener),
}

pub struct Application {
    port: u16,
    listener: Bound,
    router: Router,
}

impl Application {
    /// Binds the listener. Without a TLS configuration the server speaks
    /// plain HTTP.
    pub async fn build(
        options: &MepauthOptions,
        state: AppState,
        tls: Option<Arc<ServerConfig>>,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(options.address()).await?;
        let port = listener.local_addr()?.port();

        let listener = match tls {
            Some(config) => {
                tracing::info!("[mepauth] listening at https://{}:{}", options.host, port);
                Bound::Tls(TlsListener::new(listener, config)?)
            }
            None => {
                tracing::warn!("[mepauth] listening at http://{}:{} without TLS", options.host, port);
                Bound::Plain(listener)
            }
        };

        Ok(Self {
            port,
            listener,
            router: create_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until `shutdown` resolves, then drains open connections.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let service = self
            .router
            .into_make_service_with_connect_info::<PeerAddr>();
        match self.listener {
            Bound::Plain(listener) => {
                axum::serve(listener, service)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
            Bound::Tls(listener) => {
                axum::serve(listener, service)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
        }
    }
}

/// `/health` is reachable by anyone; every other route sits behind the
/// trusted-network gate.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/status", get(routes::status))
        .route_layer(middleware::from_fn_with_state(state.clone(), access::gate))
        .route("/health", get(routes::health))
        .with_state(state)
}
