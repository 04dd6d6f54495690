pub mod tournament;

use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{
    HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, http::StatusCode, web,
};
use serde::Serialize;

static INCLUDE_STACK: AtomicBool = AtomicBool::new(false);

/// Whether error bodies carry the full error chain. Enabled for development
/// deployments by [`crate::build`].
pub fn set_include_stack(include: bool) {
    INCLUDE_STACK.store(include, Ordering::Relaxed);
}

fn include_stack() -> bool {
    INCLUDE_STACK.load(Ordering::Relaxed)
}

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .app_data(json_config())
        .app_data(path_config())
        .service(health_check)
        .service(tournament::stream_tournament)
        .service(tournament::publish_event)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

/// Malformed JSON bodies are reported with the same envelope as every other
/// error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|e, _req| APIError::BadRequest(e.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|e, _req| APIError::BadRequest(e.to_string()).into())
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    /// An error carrying its own status code.
    #[error("{1}")]
    Status(StatusCode, String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid ID format")]
    InvalidId(#[source] anyhow::Error),
    #[error("Duplicate field value")]
    DuplicateKey(#[source] anyhow::Error),
    /// One message per failed field.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("Invalid token")]
    InvalidToken(#[source] anyhow::Error),
    #[error("Token expired")]
    TokenExpired(#[source] anyhow::Error),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorBody {
    pub fn new(error: &APIError, include_stack: bool) -> Self {
        let mut message = error.to_string();
        if message.is_empty() {
            message = "Server Error".to_string();
        }
        Self {
            success: false,
            error: message,
            stack: include_stack.then(|| format!("{error:?}")),
        }
    }
}

impl ResponseError for APIError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Status(code, _) => *code,
            Self::BadRequest(_)
            | Self::InvalidId(_)
            | Self::DuplicateKey(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidToken(_) | Self::TokenExpired(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{self:#}");
        } else {
            tracing::debug!(%status, "{self}");
        }
        HttpResponse::build(status).json(ErrorBody::new(self, include_stack()))
    }
}
