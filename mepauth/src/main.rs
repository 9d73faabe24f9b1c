// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mep_keyring::constants::{PROP_TLS_CERT_FILE, PROP_TLS_KEY_FILE, PROP_TRUSTED_LIST};
use mep_keyring::{BootstrapContext, ConfigProperties, CredentialBootstrapper, SecretBuffer};
use mepauth::access::TrustedNetworks;
use mepauth::application::{AppState, Application};
use mepauth::configuration::MepauthOptions;
use mepauth::tls;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();

    let options = MepauthOptions::parse();

    tracing::info!("[mepauth] {:?}", &options);

    let mut props = ConfigProperties::from_path(&options.properties)?;

    // not consumed by the bootstrap, which clears everything left in props
    let trusted_list = props.take(PROP_TRUSTED_LIST);
    let tls_files = (
        non_empty(props.take(PROP_TLS_CERT_FILE)),
        non_empty(props.take(PROP_TLS_KEY_FILE)),
    );

    let bootstrapper = CredentialBootstrapper::new(&options.key_dir);
    let credentials = tokio::task::spawn_blocking(move || {
        let mut ctx = BootstrapContext::new();
        bootstrapper.run(&mut ctx, &mut props)
    })
    .await
    .context("bootstrap task panicked")??;

    let trusted = TrustedNetworks::load(
        trusted_list
            .as_ref()
            .map(|list| list.as_str().context("TRUSTED_LIST is not valid UTF-8"))
            .transpose()?
            .unwrap_or_default(),
    )
    .await?;

    let tls = match tls_files {
        (Some(cert), Some(key)) => Some(tls::server_config(&path(&cert)?, &path(&key)?)?),
        (None, None) if options.allow_plaintext => None,
        (None, None) => bail!(
            "{PROP_TLS_CERT_FILE} and {PROP_TLS_KEY_FILE} are required unless --allow-plaintext is set"
        ),
        _ => bail!("{PROP_TLS_CERT_FILE} and {PROP_TLS_KEY_FILE} must be set together"),
    };

    let state = AppState {
        credentials,
        trusted,
    };
    let application = Application::build(&options, state, tls).await?;

    application.run_until_stopped(shutdown_signal()).await?;

    tracing::info!("[mepauth] stopped");
    Ok(())
}

fn non_empty(value: Option<SecretBuffer>) -> Option<SecretBuffer> {
    value.filter(|value| !value.is_empty())
}

fn path(value: &SecretBuffer) -> Result<PathBuf> {
    value
        .as_str()
        .map(PathBuf::from)
        .context("TLS file path is not valid UTF-8")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("[mepauth] unable to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("[mepauth] unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("[mepauth] shutdown signal received");
}
