// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers.
//!
//! | Method | Path | Handler | Gated |
//! |--------|------|---------|-------|
//! | GET | `/health` | [`health`] | no |
//! | GET | `/status` | [`status`] | yes |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::application::AppState;

/// Liveness check.
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Reports that credentials were bootstrapped for this application instance.
/// Secret values never leave the process.
#[tracing::instrument(skip(state))]
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "bootstrapped",
        "app_inst_id": state.credentials.app_inst_id(),
        "trusted_networks": state.trusted.networks().len(),
    }))
}
