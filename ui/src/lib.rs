use payloads::APIClient;

pub mod hooks;
pub mod logs;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// API client for the backend named by `BACKEND_URL`, falling back to a
/// local server.
pub fn get_api_client() -> APIClient {
    APIClient {
        address: backend_address(std::env::var("BACKEND_URL").ok()),
        inner_client: reqwest::Client::new(),
    }
}

/// Base address with any trailing slash removed. Unset or blank values
/// fall back to [`DEFAULT_BACKEND_URL`].
fn backend_address(configured: Option<String>) -> String {
    configured
        .filter(|url| !url.trim().is_empty())
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}
