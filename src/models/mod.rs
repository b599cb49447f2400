pub mod rating;
pub mod response;
pub mod track;

pub use rating::{RatingEvent, RatingKind};
pub use response::{ApiError, ApiResponse, DrainResult, EventResult, IgnoredMessage, Outcome};
pub use track::Track;
