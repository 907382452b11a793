//! Magnet cache-status check handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use magnetmux_core::checker::{CacheStatusResult, CheckerError};
use magnetmux_core::peer::Envelope;
use magnetmux_core::store::CheckStatusParams;

use crate::metrics::{MAGNET_CHECKS_TOTAL, MAGNET_CHECK_VERDICTS, STORE_CHECK_ERRORS_TOTAL};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckMagnetsQuery {
    /// Comma-separated hashes or magnet URIs.
    pub magnet: String,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckMagnetsRequest {
    pub magnets: Vec<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckMagnetsData {
    pub items: Vec<CacheStatusResult>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
}

type CheckResponse =
    Result<Json<Envelope<CheckMagnetsData>>, (StatusCode, Json<Envelope<CheckMagnetsData>>)>;

/// GET /v0/store/magnets/check
pub async fn check_magnets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckMagnetsQuery>,
) -> CheckResponse {
    let magnets: Vec<String> = query
        .magnet
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    run_check(&state, magnets, query.sid, query.client_ip).await
}

/// POST /v0/store/magnets/check
pub async fn check_magnets_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckMagnetsRequest>,
) -> CheckResponse {
    run_check(&state, request.magnets, request.sid, request.client_ip).await
}

async fn run_check(
    state: &AppState,
    magnets: Vec<String>,
    sid: Option<String>,
    client_ip: Option<String>,
) -> CheckResponse {
    MAGNET_CHECKS_TOTAL.inc();

    let params = CheckStatusParams {
        client_ip: client_ip.as_deref(),
        stream_id: sid.as_deref(),
    };
    let outcome = state.checker().check(&magnets, &params).await.map_err(|e| {
        let status = match e {
            CheckerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CheckerError::NoConfiguredStore => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(Envelope::err(e.to_string())))
    })?;

    for result in &outcome.results {
        MAGNET_CHECK_VERDICTS
            .with_label_values(&[result.status.as_str()])
            .inc();
    }
    for store in outcome.store_errors.keys() {
        STORE_CHECK_ERRORS_TOTAL.with_label_values(&[store]).inc();
    }

    Ok(Json(Envelope::ok(CheckMagnetsData {
        items: outcome.results,
        errors: outcome.store_errors,
    })))
}
