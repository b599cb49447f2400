use crate::error::ClientError;
use crate::models::{RatingKind, Track};
use serde::{Serialize, Serializer};

/// Error reported by the remote service in an otherwise well-formed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: u32,
    pub message: String,
}

/// Notice attached to a scrobble the service accepted but chose to ignore
/// (artist/track filtered, timestamp too old, daily limit reached, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredMessage {
    pub code: u32,
    pub message: String,
}

/// Outcome of a remote call that completed at the transport level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<IgnoredMessage>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn api_error(code: u32, message: impl Into<String>) -> Self {
        Self {
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
            ignored: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Outcome {
    Completed(ApiResponse),
    Failed(#[serde(serialize_with = "serialize_display")] ClientError),
}

fn serialize_display<S: Serializer>(error: &ClientError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventResult {
    pub track: Track,
    pub outcome: Outcome,
}

impl EventResult {
    pub fn completed(track: Track, response: ApiResponse) -> Self {
        Self {
            track,
            outcome: Outcome::Completed(response),
        }
    }

    pub fn failed(track: Track, error: ClientError) -> Self {
        Self {
            track,
            outcome: Outcome::Failed(error),
        }
    }
}

/// Per-event record produced by a drain, tagged with the phase it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DrainResult {
    NowPlaying(EventResult),
    Scrobble(EventResult),
    Rating { kind: RatingKind, result: EventResult },
}

impl DrainResult {
    fn event(&self) -> &EventResult {
        match self {
            DrainResult::NowPlaying(result) | DrainResult::Scrobble(result) => result,
            DrainResult::Rating { result, .. } => result,
        }
    }

    pub fn track(&self) -> &Track {
        &self.event().track
    }

    pub fn outcome(&self) -> &Outcome {
        &self.event().outcome
    }

    /// Error code/message returned by the service, if the call completed.
    pub fn remote_error(&self) -> Option<&ApiError> {
        match self.outcome() {
            Outcome::Completed(response) => response.error.as_ref(),
            Outcome::Failed(_) => None,
        }
    }

    /// Local error captured while the call was made.
    pub fn failure(&self) -> Option<&ClientError> {
        match self.outcome() {
            Outcome::Completed(_) => None,
            Outcome::Failed(error) => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome(), Outcome::Completed(response) if response.is_ok())
    }
}
