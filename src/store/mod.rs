//! Storage contract consumed by the engine, plus the in-process adapter
//!
//! Any persistence engine can back a game by implementing [`GameStore`].
//! All operations except player lookup are keyed by [`GameId`].

pub mod memory;

pub use memory::InMemoryStore;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::game::{Direction, EntityKind, GameId, PlayerId, Position, Timestamp};

/// Score state of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    pub id: GameId,
    pub score: u32,
    pub high_score: u32,
    pub started_at: Timestamp,
}

/// Position of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
}

/// A cast vote (move candidate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub player_id: PlayerId,
    pub direction: Direction,
    pub cast_at: Timestamp,
}

/// An executed tick, blocked attempts included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub player_id: PlayerId,
    pub direction: Direction,
    /// Avatar position before the move
    pub from: Position,
    pub executed_at: Timestamp,
}

/// Every write produced by one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickCommit {
    pub record: MoveRecord,
    pub avatar: Option<Position>,
    pub score: Option<u32>,
    pub high_score: Option<u32>,
    pub respawns: Vec<EntityRecord>,
}

impl TickCommit {
    pub fn new(record: MoveRecord) -> Self {
        Self {
            record,
            avatar: None,
            score: None,
            high_score: None,
            respawns: Vec::new(),
        }
    }
}

/// One consistent read of a game, taken between tick commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub record: GameRecord,
    pub entities: Vec<EntityRecord>,
    /// Full move history, oldest first
    pub moves: Vec<MoveRecord>,
    /// Votes cast after the last move, in cast order
    pub fresh_votes: Vec<VoteRecord>,
}

impl GameView {
    /// Executed-at of the latest move, or the game start before any move
    pub fn last_move_at(&self) -> Timestamp {
        self.moves
            .last()
            .map_or(self.record.started_at, |m| m.executed_at)
    }
}

/// Persistence contract for games, players, votes and moves
#[async_trait]
pub trait GameStore: Send + Sync {
    /// The currently active game, if one was ever created
    async fn find_game(&self) -> Result<Option<GameId>, StoreError>;

    /// Create a game with zero score and the given entity placement
    async fn create_game(
        &self,
        entities: &[EntityRecord],
        started_at: Timestamp,
    ) -> Result<GameId, StoreError>;

    /// Refresh `started_at` of an existing game
    async fn resume_game(&self, game: GameId, started_at: Timestamp) -> Result<(), StoreError>;

    async fn get_game(&self, game: GameId) -> Result<GameRecord, StoreError>;

    async fn update_score(&self, game: GameId, score: u32) -> Result<(), StoreError>;

    async fn update_high_score(&self, game: GameId, high_score: u32) -> Result<(), StoreError>;

    async fn get_entity_position(
        &self,
        game: GameId,
        kind: EntityKind,
    ) -> Result<Position, StoreError>;

    async fn set_entity_position(
        &self,
        game: GameId,
        kind: EntityKind,
        position: Position,
    ) -> Result<(), StoreError>;

    async fn list_entities(&self, game: GameId) -> Result<Vec<EntityRecord>, StoreError>;

    async fn list_occupied_positions(&self, game: GameId) -> Result<HashSet<Position>, StoreError> {
        let entities = self.list_entities(game).await?;
        Ok(entities.into_iter().map(|e| e.position).collect())
    }

    /// Idempotent create-or-fetch by identity
    async fn ensure_player(&self, identity: &str) -> Result<PlayerId, StoreError>;

    /// Lookup without creating
    async fn find_player(&self, identity: &str) -> Result<Option<PlayerId>, StoreError>;

    async fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError>;

    async fn record_vote(
        &self,
        game: GameId,
        player: PlayerId,
        direction: Direction,
        cast_at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Votes with `cast_at > last_move_at`, in cast order
    async fn list_fresh_votes(
        &self,
        game: GameId,
        last_move_at: Timestamp,
    ) -> Result<Vec<VoteRecord>, StoreError>;

    async fn has_fresh_vote(
        &self,
        game: GameId,
        player: PlayerId,
        last_move_at: Timestamp,
    ) -> Result<bool, StoreError> {
        let votes = self.list_fresh_votes(game, last_move_at).await?;
        Ok(votes.iter().any(|v| v.player_id == player))
    }

    /// Remove the player's fresh vote, returning its direction
    async fn retract_fresh_vote(
        &self,
        game: GameId,
        player: PlayerId,
        last_move_at: Timestamp,
    ) -> Result<Option<Direction>, StoreError>;

    async fn append_move(&self, game: GameId, record: MoveRecord) -> Result<(), StoreError>;

    /// `executed_at` of the most recent move, `None` before the first one
    async fn last_move_at(&self, game: GameId) -> Result<Option<Timestamp>, StoreError>;

    /// Full move history, oldest first
    async fn list_moves(&self, game: GameId) -> Result<Vec<MoveRecord>, StoreError>;

    /// Game record, entities, moves and fresh votes as of a single instant.
    ///
    /// Must never observe part of a tick commit.
    async fn read_view(&self, game: GameId) -> Result<GameView, StoreError>;

    /// Apply all writes of a tick as one unit: readers see all of them or
    /// none of them.
    async fn commit_tick(&self, game: GameId, commit: &TickCommit) -> Result<(), StoreError>;
}

/// Apply a tick through the granular store operations, in write order.
///
/// Not atomic on its own. Only for backends that wrap the call in their
/// own transaction.
pub async fn apply_sequentially<S: GameStore + ?Sized>(
    store: &S,
    game: GameId,
    commit: &TickCommit,
) -> Result<(), StoreError> {
    store.append_move(game, commit.record).await?;
    if let Some(avatar) = commit.avatar {
        store
            .set_entity_position(game, EntityKind::Avatar, avatar)
            .await?;
    }
    if let Some(high_score) = commit.high_score {
        store.update_high_score(game, high_score).await?;
    }
    if let Some(score) = commit.score {
        store.update_score(game, score).await?;
    }
    for respawn in &commit.respawns {
        store
            .set_entity_position(game, respawn.kind, respawn.position)
            .await?;
    }
    Ok(())
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("Entity {kind} missing from game {game}")]
    EntityMissing { game: GameId, kind: EntityKind },

    #[error("Storage backend failure: {0}")]
    Backend(String),
}
