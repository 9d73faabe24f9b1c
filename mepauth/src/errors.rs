// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("peer is not in the trusted list")]
    Forbidden,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
        };

        let body = Json(json!({"code": status.as_u16(), "message": message}));

        (status, body).into_response()
    }
}

/// Failure to turn `TRUSTED_LIST` into an access list.
#[derive(thiserror::Error, Debug)]
pub enum AccessListError {
    #[error("trusted list entry {0:?} is neither a network, an address nor a host name")]
    InvalidEntry(String),
    #[error("unable to resolve trusted host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("trusted host {0} resolved to no addresses")]
    Unresolved(String),
}

#[derive(thiserror::Error, Debug)]
pub enum TlsConfigError {
    #[error("unable to read PEM from {path}: {source}")]
    Pem {
        path: String,
        #[source]
        source: rustls::pki_types::pem::Error,
    },
    #[error("no certificate found in {0}")]
    NoCertificates(String),
    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forbidden_body() {
        let response = AppError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({"code": 403, "message": "Forbidden"}));
    }
}
