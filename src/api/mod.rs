pub mod events;
pub mod queues;

pub use events::event_routes;
pub use queues::queue_routes;

use crate::services::{QueuingClient, RemoteClient};
use axum::Router;
use std::sync::Arc;

/// All relay endpoints, to be nested under `/api/v1`.
pub fn routes<C: RemoteClient + 'static>() -> Router<Arc<QueuingClient<C>>> {
    Router::new()
        .merge(event_routes::<C>())
        .merge(queue_routes::<C>())
}
