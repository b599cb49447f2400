use crate::error::{AppError, ClientError, Result};
use crate::models::{ApiResponse, DrainResult, EventResult, RatingEvent, RatingKind, Track};
use crate::services::event_queue::EventQueue;
use crate::services::LastfmClient;
use std::sync::{Mutex, RwLock};

/// The remote calls a drain needs. Each call is a single blocking attempt.
pub trait RemoteClient: Send + Sync {
    fn now_playing(&self, session_key: &str, track: &Track) -> std::result::Result<ApiResponse, ClientError>;
    fn scrobble(&self, session_key: &str, track: &Track) -> std::result::Result<ApiResponse, ClientError>;
    fn love(&self, session_key: &str, track: &Track) -> std::result::Result<ApiResponse, ClientError>;
    fn unlove(&self, session_key: &str, track: &Track) -> std::result::Result<ApiResponse, ClientError>;
    fn ban(&self, session_key: &str, track: &Track) -> std::result::Result<ApiResponse, ClientError>;
    fn unban(&self, session_key: &str, track: &Track) -> std::result::Result<ApiResponse, ClientError>;
}

/// What a drain does when a remote call fails locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record a failed result for the item and keep draining.
    #[default]
    Isolate,
    /// Abort the drain and return the error. Results gathered so far are dropped.
    FailFast,
}

impl ErrorPolicy {
    pub fn from_fail_fast(fail_fast: bool) -> Self {
        if fail_fast {
            ErrorPolicy::FailFast
        } else {
            ErrorPolicy::Isolate
        }
    }
}

/// Buffers now-playing, scrobble and rating events and submits them on `process`.
///
/// Producers may call the enqueue methods from any thread. `process` drains
/// the queues in a fixed order: all now-playing events, then scrobbles, then
/// ratings.
pub struct QueuingClient<C = LastfmClient> {
    session_key: RwLock<Option<String>>,
    client: C,
    now_playing: EventQueue<Track>,
    scrobbles: EventQueue<Track>,
    ratings: EventQueue<RatingEvent>,
    drain_lock: Mutex<()>,
}

impl QueuingClient<LastfmClient> {
    pub fn new(api_key: &str, api_secret: &str, session_key: Option<String>) -> Result<Self> {
        let client = LastfmClient::new(api_key.to_string(), api_secret.to_string())?;
        Self::with_client(api_key, api_secret, session_key, client)
    }
}

impl<C: RemoteClient> QueuingClient<C> {
    /// Fails with `InvalidArgument` when `api_key` or `api_secret` is empty.
    /// Whitespace-only values count as empty. The key and secret are only
    /// checked here; signing is left to `client`.
    pub fn with_client(
        api_key: &str,
        api_secret: &str,
        session_key: Option<String>,
        client: C,
    ) -> Result<Self> {
        check_credentials(api_key, api_secret)?;

        Ok(Self {
            session_key: RwLock::new(normalize_session(session_key)),
            client,
            now_playing: EventQueue::new(),
            scrobbles: EventQueue::new(),
            ratings: EventQueue::new(),
            drain_lock: Mutex::new(()),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Sets or clears the session key. Without one, `process` leaves the queues alone.
    pub fn set_session_key(&self, session_key: Option<String>) {
        let session_key = normalize_session(session_key);
        tracing::info!(
            "Session key {}",
            if session_key.is_some() { "set" } else { "cleared" }
        );
        *self.session_key.write().unwrap_or_else(|e| e.into_inner()) = session_key;
    }

    pub fn has_session(&self) -> bool {
        self.session_key().is_some()
    }

    fn session_key(&self) -> Option<String> {
        self.session_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn now_playing(&self, track: Track) {
        self.now_playing.enqueue(track);
    }

    pub fn scrobble(&self, track: Track) {
        self.scrobbles.enqueue(track);
    }

    pub fn love(&self, track: Track) {
        self.rate(track, RatingKind::Love);
    }

    pub fn unlove(&self, track: Track) {
        self.rate(track, RatingKind::Unlove);
    }

    pub fn ban(&self, track: Track) {
        self.rate(track, RatingKind::Ban);
    }

    pub fn unban(&self, track: Track) {
        self.rate(track, RatingKind::Unban);
    }

    pub fn rate(&self, track: Track, kind: RatingKind) {
        self.ratings.enqueue(RatingEvent::new(track, kind));
    }

    pub fn now_playing_count(&self) -> usize {
        self.now_playing.len()
    }

    pub fn scrobble_count(&self) -> usize {
        self.scrobbles.len()
    }

    pub fn rating_count(&self) -> usize {
        self.ratings.len()
    }

    /// Total number of queued events across all three queues.
    pub fn count(&self) -> usize {
        self.now_playing_count() + self.scrobble_count() + self.rating_count()
    }

    /// Drains every queue once, calling the remote service for each event.
    ///
    /// Returns `Ok(None)` without touching the queues when no session key is
    /// set. With `ErrorPolicy::FailFast` the first local failure is returned
    /// as an error; items already dequeued are gone and their results are
    /// dropped, items not yet dequeued stay queued.
    pub fn process(&self, policy: ErrorPolicy) -> Result<Option<Vec<DrainResult>>> {
        let Some(session_key) = self.session_key() else {
            tracing::debug!("No session key, skipping drain of {} events", self.count());
            return Ok(None);
        };

        let _guard = self.drain_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut results = Vec::new();

        let drained = drain_phase(&self.now_playing, policy, &mut results, |track| {
            let outcome = self.client.now_playing(&session_key, &track);
            (outcome, track, DrainResult::NowPlaying)
        })?;
        tracing::debug!("Now-playing phase drained {} events", drained);

        let drained = drain_phase(&self.scrobbles, policy, &mut results, |track| {
            let outcome = self.client.scrobble(&session_key, &track);
            (outcome, track, DrainResult::Scrobble)
        })?;
        tracing::debug!("Scrobble phase drained {} events", drained);

        let drained = drain_phase(&self.ratings, policy, &mut results, |event| {
            let RatingEvent { track, kind } = event;
            let outcome = match kind {
                RatingKind::Ban => self.client.ban(&session_key, &track),
                RatingKind::Love => self.client.love(&session_key, &track),
                RatingKind::Unban => self.client.unban(&session_key, &track),
                RatingKind::Unlove => self.client.unlove(&session_key, &track),
            };
            (outcome, track, move |result: EventResult| DrainResult::Rating { kind, result })
        })?;
        tracing::debug!("Rating phase drained {} events", drained);

        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            "Drain finished: {} events, {} not accepted",
            results.len(),
            failed
        );

        Ok(Some(results))
    }
}

/// Pops `queue` until it is observed empty, handing each item to `call` and
/// recording the outcome. Returns the number of items dequeued.
fn drain_phase<T, F, W>(
    queue: &EventQueue<T>,
    policy: ErrorPolicy,
    results: &mut Vec<DrainResult>,
    mut call: F,
) -> Result<usize>
where
    F: FnMut(T) -> (std::result::Result<ApiResponse, ClientError>, Track, W),
    W: FnOnce(EventResult) -> DrainResult,
{
    let mut drained = 0;
    while let Some(item) = queue.try_dequeue() {
        drained += 1;
        let (outcome, track, wrap) = call(item);
        let result = match outcome {
            Ok(response) => {
                if let Some(err) = &response.error {
                    tracing::warn!("{} rejected by service: {} {}", track, err.code, err.message);
                }
                EventResult::completed(track, response)
            }
            Err(e) => match policy {
                ErrorPolicy::FailFast => {
                    tracing::error!("Aborting drain on {}: {}", track, e);
                    return Err(AppError::Remote(e));
                }
                ErrorPolicy::Isolate => {
                    tracing::warn!("Failed to submit {}: {}", track, e);
                    EventResult::failed(track, e)
                }
            },
        };
        results.push(wrap(result));
    }
    Ok(drained)
}

fn check_credentials(api_key: &str, api_secret: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(AppError::InvalidArgument("api_key must not be empty".to_string()));
    }
    if api_secret.trim().is_empty() {
        return Err(AppError::InvalidArgument("api_secret must not be empty".to_string()));
    }
    Ok(())
}

fn normalize_session(session_key: Option<String>) -> Option<String> {
    session_key.filter(|k| !k.trim().is_empty())
}
