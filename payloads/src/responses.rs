use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PlayerId, TournamentId};

/// A notification about a change to a live tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub tournament_id: TournamentId,
    /// Absent when the emitter had nothing to attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp: Timestamp,
}

/// Result of publishing an event: the envelope that was broadcast and how
/// many listeners were attached at the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub event: TournamentEvent,
    pub delivered: usize,
}

/// Data of the `ready` frame that opens a tournament event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReady {
    pub tournament_id: TournamentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(alias = "_id")]
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub bods_played: u32,
    #[serde(default)]
    pub best_result: u32,
    #[serde(default)]
    pub avg_finish: f64,
    #[serde(default)]
    pub games_played: u32,
    #[serde(default)]
    pub games_won: u32,
    #[serde(default)]
    pub winning_percentage: f64,
    #[serde(default)]
    pub individual_championships: u32,
    #[serde(default)]
    pub division_championships: u32,
    #[serde(default)]
    pub total_championships: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    Scheduled,
    Open,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    #[serde(alias = "_id")]
    pub id: TournamentId,
    pub date: String,
    pub bod_number: u32,
    pub format: String,
    pub location: String,
    pub advancement_criteria: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: TournamentStatus,
    #[serde(default)]
    pub max_players: Option<u32>,
    #[serde(default)]
    pub current_player_count: Option<u32>,
}
