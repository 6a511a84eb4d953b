//! Typed payloads, camelCase on the wire.

use serde::{Deserialize, Serialize};

/// `timer_start` and `event_timer_restart`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStartPayload {
    pub tournament_id: i64,
    #[serde(alias = "newDurationMs")]
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentCreatedPayload {
    pub tournament_id: i64,
    pub name: String,
    pub level_duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentWinnerPayload {
    pub tournament_id: i64,
    pub winner_id: i64,
    pub username: String,
}

/// `event_player_add`: registration forwarded by the tournament aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAddPayload {
    pub tournament_id: i64,
    pub username: String,
}

/// `event_player_eliminate`: elimination request forwarded by the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEliminatePayload {
    pub tournament_id: i64,
    pub player_id: i64,
}

/// `event_tables_add`: seat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesAddPayload {
    pub tournament_id: i64,
    pub player_id: i64,
    pub username: String,
}

/// `event_tables_eliminate`: unseat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesEliminatePayload {
    pub tournament_id: i64,
    pub player_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSeatedPayload {
    pub tournament_id: i64,
    pub player_id: i64,
    pub table_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMovedPayload {
    pub tournament_id: i64,
    pub player_id: i64,
    pub old_table_id: i64,
    pub new_table_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBrokenPayload {
    pub tournament_id: i64,
    pub table_id: i64,
}
