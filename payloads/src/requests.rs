use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Publish an event to everyone watching a tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishTournamentEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Fields accepted when creating or updating a player. Statistics are
/// normally computed by the backend, but historical imports set them
/// directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bods_played: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_result: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_finish: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games_played: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games_won: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing: Option<String>,
}
