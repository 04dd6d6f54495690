//! Request controllers for screens backed by the REST API.
//!
//! Each controller owns a request state published through a
//! [`tokio::sync::watch`] channel: views read the latest snapshot with
//! `state()` and `subscribe()` to be woken on every change. Executions are
//! never queued. Each one takes a sequence token and only the most recent
//! execution may settle the state, so a slow superseded response (or one that
//! was in flight during `reset()`) is dropped instead of overwriting newer
//! state.

mod sequence;
pub mod use_api;
pub mod use_mutation;
pub mod use_paginated_api;

use std::sync::Arc;

pub use use_api::{ApiHook, ApiOptions, use_api};
pub use use_mutation::{MutationHook, MutationOptions, use_mutation};
pub use use_paginated_api::{
    PaginatedHook, PaginatedOptions, PaginatedState, use_paginated_api,
};

/// Called with the settled data of a successful request.
pub type SuccessCallback<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;

/// Called with the message of a failed request.
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// State of a single request.
///
/// At rest at most one of `data` and `error` is set; both are `None` before
/// the first execution and after a reset.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> RequestState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }

    pub(crate) fn pending() -> Self {
        Self {
            loading: true,
            ..Self::idle()
        }
    }

    pub(crate) fn succeeded(data: Option<T>) -> Self {
        Self {
            data,
            loading: false,
            error: None,
        }
    }

    pub(crate) fn failed(error: String) -> Self {
        Self {
            data: None,
            loading: false,
            error: Some(error),
        }
    }

    /// Returns true if this is the initial load (no data yet, currently
    /// loading, and no error).
    pub fn is_initial_loading(&self) -> bool {
        self.loading && self.data.is_none() && self.error.is_none()
    }
}
