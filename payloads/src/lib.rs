//! Types shared between the tournament API service and its clients.

pub mod api_client;
pub mod envelope;
pub mod requests;
pub mod responses;
pub mod sse;
pub mod validation;

use serde::{Deserialize, Serialize};

pub use api_client::{APIClient, ClientError, EventStream, Filters};
pub use envelope::{
    ApiResponse, DEFAULT_ERROR, Envelope, PaginatedResponse, Pagination,
    UNEXPECTED_ERROR, error_message,
};

/// Identifier of a tournament. The backend issues these as 24 character hex
/// object ids, but the event bus accepts any string key.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct TournamentId(pub String);

impl From<&str> for TournamentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for TournamentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
