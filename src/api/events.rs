use crate::models::Track;
use crate::services::{QueuingClient, RemoteClient};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use std::sync::Arc;

/// Producer endpoints. Each one queues the track and returns immediately;
/// nothing is validated or sent until the next drain.
pub fn event_routes<C: RemoteClient + 'static>() -> Router<Arc<QueuingClient<C>>> {
    Router::new()
        .route("/nowplaying", post(now_playing::<C>))
        .route("/scrobble", post(scrobble::<C>))
        .route("/love", post(love::<C>))
        .route("/unlove", post(unlove::<C>))
        .route("/ban", post(ban::<C>))
        .route("/unban", post(unban::<C>))
}

async fn now_playing<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
    Json(track): Json<Track>,
) -> StatusCode {
    tracing::debug!("Queued now-playing: {}", track);
    client.now_playing(track);
    StatusCode::ACCEPTED
}

async fn scrobble<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
    Json(track): Json<Track>,
) -> StatusCode {
    tracing::debug!("Queued scrobble: {}", track);
    client.scrobble(track);
    StatusCode::ACCEPTED
}

async fn love<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
    Json(track): Json<Track>,
) -> StatusCode {
    client.love(track);
    StatusCode::ACCEPTED
}

async fn unlove<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
    Json(track): Json<Track>,
) -> StatusCode {
    client.unlove(track);
    StatusCode::ACCEPTED
}

async fn ban<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
    Json(track): Json<Track>,
) -> StatusCode {
    client.ban(track);
    StatusCode::ACCEPTED
}

async fn unban<C: RemoteClient>(
    State(client): State<Arc<QueuingClient<C>>>,
    Json(track): Json<Track>,
) -> StatusCode {
    client.unban(track);
    StatusCode::ACCEPTED
}
