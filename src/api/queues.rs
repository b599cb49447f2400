use crate::error::Result;
use crate::models::DrainResult;
use crate::services::{run_drain, ErrorPolicy, QueuingClient, RemoteClient};
use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueDepths {
    pub now_playing: usize,
    pub scrobble: usize,
    pub rating: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProcessParams {
    #[serde(default)]
    pub fail_fast: bool,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub authenticated: bool,
    pub results: Vec<DrainResult>,
}

pub fn queue_routes<C: RemoteClient + 'static>() -> Router<Arc<QueuingClient<C>>> {
    Router::new()
        .route("/queues", get(queue_depths::<C>))
        .route("/session", put(set_session::<C>))
        .route("/process", post(process::<C>))
}

async fn queue_depths<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
) -> Json<QueueDepths> {
    let now_playing = client.now_playing_count();
    let scrobble = client.scrobble_count();
    let rating = client.rating_count();

    Json(QueueDepths {
        now_playing,
        scrobble,
        rating,
        total: now_playing + scrobble + rating,
    })
}

async fn set_session<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
    Json(req): Json<SessionRequest>,
) -> Json<SessionStatus> {
    client.set_session_key(req.session_key);
    Json(SessionStatus {
        authenticated: client.has_session(),
    })
}

/// Runs one drain immediately and returns every per-event result.
async fn process<C: RemoteClient + 'static>(
    State(client): State<Arc<QueuingClient<C>>>,
    Query(params): Query<ProcessParams>,
) -> Result<Json<ProcessResponse>> {
    let policy = ErrorPolicy::from_fail_fast(params.fail_fast);
    let response = match run_drain(client, policy).await? {
        Some(results) => ProcessResponse {
            authenticated: true,
            results,
        },
        None => ProcessResponse {
            authenticated: false,
            results: Vec::new(),
        },
    };

    Ok(Json(response))
}
