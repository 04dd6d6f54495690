use std::collections::VecDeque;

use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    ApiResponse, PaginatedResponse, PlayerId, TournamentId, requests,
    responses,
    sse::{ServerEvent, SseDecoder},
};

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// Filters for list endpoints, sent as query parameters.
pub type Filters = Map<String, Value>;

/// An API client for interfacing with the backend.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    async fn get(&self, path: &str, query: &[(String, String)]) -> ReqwestResult {
        self.inner_client
            .get(self.format_url(path))
            .query(query)
            .send()
            .await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        self.inner_client.get(self.format_url(path)).send().await
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .post(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn put(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .put(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn delete(&self, path: &str) -> ReqwestResult {
        self.inner_client.delete(self.format_url(path)).send().await
    }
}

/// Methods on the backend API
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    pub async fn list_players(
        &self,
        page: u32,
        filters: &Filters,
    ) -> Result<PaginatedResponse<responses::Player>, ClientError> {
        let response = self.get("players", &page_query(page, filters)).await?;
        envelope_body(response).await
    }

    pub async fn get_player(
        &self,
        player_id: &PlayerId,
    ) -> Result<ApiResponse<responses::Player>, ClientError> {
        let response = self.empty_get(&format!("players/{player_id}")).await?;
        envelope_body(response).await
    }

    pub async fn create_player(
        &self,
        details: &requests::PlayerInput,
    ) -> Result<ApiResponse<responses::Player>, ClientError> {
        let response = self.post("players", details).await?;
        envelope_body(response).await
    }

    pub async fn update_player(
        &self,
        player_id: &PlayerId,
        details: &requests::PlayerInput,
    ) -> Result<ApiResponse<responses::Player>, ClientError> {
        let response =
            self.put(&format!("players/{player_id}"), details).await?;
        envelope_body(response).await
    }

    pub async fn delete_player(
        &self,
        player_id: &PlayerId,
    ) -> Result<ApiResponse<()>, ClientError> {
        let response = self.delete(&format!("players/{player_id}")).await?;
        envelope_body(response).await
    }

    pub async fn list_tournaments(
        &self,
        page: u32,
        filters: &Filters,
    ) -> Result<PaginatedResponse<responses::Tournament>, ClientError> {
        let response =
            self.get("tournaments", &page_query(page, filters)).await?;
        envelope_body(response).await
    }

    pub async fn get_tournament(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<ApiResponse<responses::Tournament>, ClientError> {
        let response = self
            .empty_get(&format!("tournaments/{tournament_id}"))
            .await?;
        envelope_body(response).await
    }

    /// Broadcast an event to everyone streaming this tournament.
    pub async fn publish_tournament_event(
        &self,
        tournament_id: &TournamentId,
        details: &requests::PublishTournamentEvent,
    ) -> Result<ApiResponse<responses::PublishedEvent>, ClientError> {
        let response = self
            .post(&format!("tournaments/{tournament_id}/events"), details)
            .await?;
        envelope_body(response).await
    }

    /// Open the live event stream of a tournament. The server has registered
    /// the subscription by the time this returns.
    pub async fn tournament_events(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<EventStream, ClientError> {
        let response = self
            .empty_get(&format!("tournaments/{tournament_id}/stream"))
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            let message = serde_json::from_str::<ApiResponse<()>>(&text)
                .ok()
                .and_then(|envelope| envelope.error)
                .unwrap_or(text);
            return Err(ClientError::APIError(status, message));
        }
        Ok(EventStream {
            response,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        })
    }
}

/// A server-sent event stream read chunk by chunk.
pub struct EventStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<ServerEvent>,
}

impl EventStream {
    /// The next event of any name, or `None` once the server closes the
    /// stream.
    pub async fn next_event(
        &mut self,
    ) -> Result<Option<ServerEvent>, ClientError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            match self.response.chunk().await? {
                Some(chunk) => self.pending.extend(self.decoder.push(&chunk)),
                None => return Ok(None),
            }
        }
    }

    /// The next `update` frame, skipping every other event.
    pub async fn next_tournament_event(
        &mut self,
    ) -> Result<Option<responses::TournamentEvent>, ClientError> {
        while let Some(event) = self.next_event().await? {
            if event.event == "update" {
                return Ok(Some(serde_json::from_str(&event.data)?));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected response from server")]
    Decode(#[from] serde_json::Error),
}

fn page_query(page: u32, filters: &Filters) -> Vec<(String, String)> {
    let mut query = vec![("page".to_string(), page.to_string())];
    for (key, value) in filters {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        query.push((key.clone(), value));
    }
    query
}

/// Decode a response envelope.
///
/// The backend reports failures as `{ success: false, error }` with a 4xx/5xx
/// status, so an envelope is returned whatever the status. Bodies that are
/// not an envelope become [`ClientError::APIError`] on error statuses.
pub async fn envelope_body<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    let text = response.text().await?;
    match serde_json::from_str::<T>(&text) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => {
            Err(ClientError::APIError(status, text))
        }
        Err(e) => Err(ClientError::Decode(e)),
    }
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
