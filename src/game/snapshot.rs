//! Read-only views of a game for display layers

use std::collections::HashMap;

use serde::Serialize;

use crate::store::{EntityRecord, MoveRecord, PlayerRecord, VoteRecord};

use super::types::{Direction, GameId, PlayerId, Position, Timestamp};

/// Share of the fresh votes going to one direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionTally {
    pub direction: Direction,
    pub count: u32,
    /// `count` over all fresh votes, in `0.0..=1.0`
    pub percent: f64,
}

/// Board state as seen by a (possibly anonymous) viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub score: u32,
    pub high_score: u32,
    pub last_move_at: Timestamp,
    pub entities: Vec<EntityRecord>,
    /// Where the avatar stood before the last executed move
    pub last_avatar_position: Option<Position>,
    /// The viewer's pending vote
    pub player_vote: Option<Direction>,
    pub tally: Vec<DirectionTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateView {
    pub player_name: String,
    pub direction: Direction,
    pub cast_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub player_name: String,
    pub direction: Direction,
    pub from: Position,
    pub executed_at: Timestamp,
}

/// Everything known about a game, for the stats page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameStats {
    pub game_id: GameId,
    pub score: u32,
    pub high_score: u32,
    pub last_move_at: Timestamp,
    pub entities: Vec<EntityRecord>,
    pub players: Vec<PlayerRecord>,
    pub candidates: Vec<CandidateView>,
    pub history: Vec<HistoryEntry>,
}

/// Count fresh votes per direction. Directions nobody voted for are left out.
pub fn tally_votes(votes: &[VoteRecord]) -> Vec<DirectionTally> {
    let total = votes.len();
    if total == 0 {
        return Vec::new();
    }

    Direction::ALL
        .iter()
        .filter_map(|&direction| {
            let count = votes.iter().filter(|v| v.direction == direction).count();
            (count > 0).then(|| DirectionTally {
                direction,
                count: count as u32,
                percent: count as f64 / total as f64,
            })
        })
        .collect()
}

/// Join vote and move records with player names
pub struct NameResolver {
    names: HashMap<PlayerId, String>,
}

impl NameResolver {
    pub fn new(players: &[PlayerRecord]) -> Self {
        Self {
            names: players.iter().map(|p| (p.id, p.name.clone())).collect(),
        }
    }

    fn name(&self, id: PlayerId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("player#{id}"))
    }

    pub fn candidates(&self, votes: &[VoteRecord]) -> Vec<CandidateView> {
        votes
            .iter()
            .map(|v| CandidateView {
                player_name: self.name(v.player_id),
                direction: v.direction,
                cast_at: v.cast_at,
            })
            .collect()
    }

    pub fn history(&self, moves: &[MoveRecord]) -> Vec<HistoryEntry> {
        moves
            .iter()
            .map(|m| HistoryEntry {
                player_name: self.name(m.player_id),
                direction: m.direction,
                from: m.from,
                executed_at: m.executed_at,
            })
            .collect()
    }
}
