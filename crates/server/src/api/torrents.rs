//! Torrent listing and ingestion handlers.
//!
//! These are the peer-facing endpoints: another instance configured with this
//! server as its peer speaks to `/v0/torrents` through the same envelope the
//! core peer client sends.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use magnetmux_core::indexer::{search_all, to_records, SearchQuery};
use magnetmux_core::peer::{
    Envelope, PushTorrentsBody, TorrentsPage, HEADER_INSTANCE_ID, HEADER_ORIGIN_INSTANCE_ID,
    HEADER_PEER_TOKEN,
};
use magnetmux_core::sync::ResolveParams;
use magnetmux_core::usage::UsageEvent;

use crate::metrics::{PEER_AUTH_FAILURES_TOTAL, TORRENT_LISTS_TOTAL};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTorrentsQuery {
    pub sid: String,
    #[serde(default)]
    pub local_only: bool,
    /// Free-text search used to seed the repository when it has nothing for
    /// this stream yet.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub exclude_missing_size: bool,
}

#[derive(Debug, Serialize)]
pub struct PushTorrentsData {
    pub ingested: usize,
}

type ApiError = (StatusCode, Json<Envelope<()>>);

fn check_peer_token(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.peer_token() else {
        return Ok(());
    };
    let presented = headers
        .get(HEADER_PEER_TOKEN)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        PEER_AUTH_FAILURES_TOTAL.inc();
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(Envelope::err("invalid peer token")),
        ));
    }
    Ok(())
}

/// GET /v0/torrents
pub async fn list_torrents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListTorrentsQuery>,
) -> Result<([(&'static str, String); 1], Json<Envelope<TorrentsPage>>), ApiError> {
    check_peer_token(&state, &headers)?;
    TORRENT_LISTS_TOTAL.inc();

    let origin_instance_id = headers
        .get(HEADER_ORIGIN_INSTANCE_ID)
        .and_then(|v| v.to_str().ok());

    let mut items = state
        .gate()
        .resolve_stream_torrents(&ResolveParams {
            stream_id: &query.sid,
            local_only: query.local_only,
            origin_instance_id,
            exclude_missing_size: query.exclude_missing_size,
        })
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::err(e.to_string())),
            )
        })?;

    // Nothing known for this stream: fall back to the configured indexers
    // and seed the repository with whatever they return.
    if items.is_empty() && !state.indexers().is_empty() {
        if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
            items = seed_from_indexers(&state, &query.sid, q, query.exclude_missing_size).await?;
        }
    }

    let page = TorrentsPage {
        total: items.len() as u64,
        items,
    };
    Ok((
        [(HEADER_INSTANCE_ID, state.runtime().instance_id().to_string())],
        Json(Envelope::ok(page)),
    ))
}

async fn seed_from_indexers(
    state: &AppState,
    stream_id: &str,
    q: &str,
    exclude_missing_size: bool,
) -> Result<Vec<magnetmux_core::repository::TorrentInfoRecord>, ApiError> {
    let started = std::time::Instant::now();
    let outcome = search_all(state.indexers(), &SearchQuery::new(q)).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    for (indexer, error) in &outcome.errors {
        state.usage().try_emit(UsageEvent::IndexerQueryFailed {
            indexer: indexer.clone(),
            stream_id: stream_id.to_string(),
            duration_ms,
            error_type: "search".to_string(),
            error_message: error.clone(),
        });
    }
    state.usage().try_emit(UsageEvent::IndexerQuery {
        indexer: "all".to_string(),
        stream_id: stream_id.to_string(),
        duration_ms,
        result_count: outcome.results.len() as u32,
        cached: false,
    });

    let records = to_records(&outcome.results);
    if !records.is_empty() {
        if let Err(e) = state.repository().upsert(&records, Some(stream_id), true) {
            warn!(stream_id, error = %e, "failed to store indexer results");
        }
    }

    state
        .repository()
        .list_by_stream_id(stream_id, exclude_missing_size)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::err(e.to_string())),
            )
        })
}

/// POST /v0/torrents
pub async fn push_torrents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PushTorrentsBody>,
) -> Result<Json<Envelope<PushTorrentsData>>, ApiError> {
    check_peer_token(&state, &headers)?;

    let count = body.items.len();
    state
        .repository()
        .upsert(&body.items, body.stream_id.as_deref(), true)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::err(e.to_string())),
            )
        })?;

    Ok(Json(Envelope::ok(PushTorrentsData { ingested: count })))
}
