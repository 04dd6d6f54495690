//! The `{ success, data, error }` envelope every backend response is wrapped
//! in.
//!
//! Two shapes exist: a plain [`ApiResponse`] and a [`PaginatedResponse`]
//! carrying a page of items plus [`Pagination`] metadata. Which shape an
//! endpoint returns is fixed by the client method's return type, and the
//! [`Envelope`] trait turns either one into "data or error message" without
//! inspecting the payload at runtime.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Message used when the backend reports a failure without saying why.
pub const DEFAULT_ERROR: &str = "An error occurred";

/// Message used when an operation fails with an error that has no message.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// The page this response holds, starting at 1.
    pub current: u32,
    pub pages: u32,
    /// Number of items on this page.
    pub count: u64,
    /// Number of items across all pages.
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> PaginatedResponse<T> {
    pub fn page(items: Vec<T>, pagination: Pagination) -> Self {
        Self {
            success: true,
            data: Some(items),
            error: None,
            pagination: Some(pagination),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            pagination: None,
        }
    }

    /// The items of a successful page, empty when the backend sent none.
    pub fn items(&self) -> &[T] {
        self.data.as_deref().unwrap_or_default()
    }
}

/// A response shape that settles into either a data value or an error
/// message.
pub trait Envelope {
    /// The value stored by a request controller on success.
    type Data;

    /// `Ok(data)` when the backend reported success, otherwise the reported
    /// error or [`DEFAULT_ERROR`].
    fn settle(self) -> Result<Option<Self::Data>, String>;
}

impl<T> Envelope for ApiResponse<T> {
    type Data = T;

    fn settle(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(failure_message(self.error))
        }
    }
}

/// Paginated responses settle to the whole envelope rather than the inner
/// items, so consumers keep access to the pagination metadata.
impl<T> Envelope for PaginatedResponse<T> {
    type Data = PaginatedResponse<T>;

    fn settle(self) -> Result<Option<Self::Data>, String> {
        if self.success {
            Ok(Some(self))
        } else {
            Err(failure_message(self.error))
        }
    }
}

/// The backend's error, or [`DEFAULT_ERROR`] when it is absent or empty.
fn failure_message(error: Option<String>) -> String {
    error
        .filter(|error| !error.is_empty())
        .unwrap_or_else(|| DEFAULT_ERROR.to_string())
}

/// The user-facing message for an error raised while performing a request.
pub fn error_message(error: impl Display) -> String {
    let message = error.to_string();
    if message.is_empty() {
        UNEXPECTED_ERROR.to_string()
    } else {
        message
    }
}
