use crate::models::Track;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingKind {
    Ban,
    Love,
    Unban,
    Unlove,
}

impl RatingKind {
    /// Web service method for this rating
    pub fn method(self) -> &'static str {
        match self {
            RatingKind::Ban => "track.ban",
            RatingKind::Love => "track.love",
            RatingKind::Unban => "track.unban",
            RatingKind::Unlove => "track.unlove",
        }
    }
}

/// A rating change waiting in the rating queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingEvent {
    pub track: Track,
    pub kind: RatingKind,
}

impl RatingEvent {
    pub fn new(track: Track, kind: RatingKind) -> Self {
        Self { track, kind }
    }
}
