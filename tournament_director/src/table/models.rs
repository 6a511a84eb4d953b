//! Table data models.

use crate::player::PlayerStatus;
use serde::{Deserialize, Serialize};

/// Table ID type
pub type TableId = i64;

/// Seats per table
pub const TABLE_CAPACITY: usize = 9;

/// Upper bound on passes for one rebalance run
pub const MAX_REBALANCE_PASSES: usize = 20;

/// Player sitting at a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatedPlayer {
    pub player_id: i64,
    pub username: String,
}

/// Table with its occupants, ordered by player id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub tournament_id: i64,
    pub seated_players: Vec<SeatedPlayer>,
}

impl Table {
    pub fn player_count(&self) -> usize {
        self.seated_players.len()
    }

    pub fn has_free_seat(&self) -> bool {
        self.player_count() < TABLE_CAPACITY
    }
}

/// The allocation service's own view of a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePlayer {
    pub id: i64,
    pub tournament_id: i64,
    pub username: String,
    pub status: PlayerStatus,
    pub table_id: Option<TableId>,
}

/// Where a seat request landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seating {
    pub player_id: i64,
    pub table_id: TableId,
    /// `false` when the player was already seated there
    pub newly_seated: bool,
}

/// A single player relocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub player_id: i64,
    pub from_table_id: TableId,
    pub to_table_id: TableId,
}

/// What one rebalance pass changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing to do
    Balanced,
    /// One player moved from the fullest to the emptiest table
    Moved(Move),
    /// A surplus table was emptied and deleted
    TableBroken { table_id: TableId, moves: Vec<Move> },
}

impl PassOutcome {
    pub fn is_balanced(&self) -> bool {
        matches!(self, PassOutcome::Balanced)
    }
}

/// Summary of a rebalance run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceReport {
    /// Passes that made a structural change
    pub passes: usize,
    /// `false` if the pass bound was hit first
    pub balanced: bool,
}

/// Least-loaded table with a free seat, lowest id on ties
pub fn least_loaded(tables: &[Table]) -> Option<&Table> {
    tables
        .iter()
        .filter(|t| t.has_free_seat())
        .min_by_key(|t| (t.player_count(), t.id))
}

/// Number of tables needed to seat `players`
pub fn ideal_table_count(players: usize) -> usize {
    players.div_ceil(TABLE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: TableId, players: usize) -> Table {
        Table {
            id,
            tournament_id: 1,
            seated_players: (0..players)
                .map(|i| SeatedPlayer {
                    player_id: id * 100 + i as i64,
                    username: format!("p{id}_{i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_least_loaded_prefers_fewest_then_lowest_id() {
        let tables = vec![table(1, 7), table(2, 5), table(3, 5)];
        assert_eq!(least_loaded(&tables).map(|t| t.id), Some(2));
    }

    #[test]
    fn test_least_loaded_skips_full_tables() {
        let tables = vec![table(1, 9), table(2, 9)];
        assert!(least_loaded(&tables).is_none());
    }

    #[test]
    fn test_ideal_table_count() {
        assert_eq!(ideal_table_count(0), 0);
        assert_eq!(ideal_table_count(1), 1);
        assert_eq!(ideal_table_count(9), 1);
        assert_eq!(ideal_table_count(10), 2);
        assert_eq!(ideal_table_count(18), 2);
    }
}
