//! Queues now-playing, scrobble and rating events from any number of
//! producers and submits them to a Last.fm-compatible service on demand.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use error::{AppError, ClientError, Result};
pub use models::{DrainResult, RatingEvent, RatingKind, Track};
pub use services::{ErrorPolicy, EventQueue, LastfmClient, QueuingClient, RemoteClient};
