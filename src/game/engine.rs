//! Authoritative game engine: vote intake and tick execution
//!
//! Every mutation (`init`, `record_move`, `tick`) runs under one async
//! mutex that also owns the random source, so a vote lands entirely before
//! or entirely after a tick's freshness cutoff. Reads go straight to the
//! store and never wait on a tick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::store::{EntityRecord, GameStore, MoveRecord, TickCommit};
use crate::util::time::Clock;

use super::error::GameError;
use super::grid::Grid;
use super::ledger::{VoteLedger, VoteOutcome, VotePolicy};
use super::respawn::random_unoccupied_cell;
use super::snapshot::{tally_votes, GameSnapshot, GameStats, NameResolver};
use super::types::{Direction, EntityKind, GameId, Position, Timestamp};

/// Entity placement for a freshly created game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialLayout {
    pub avatar: Position,
    pub coin: Position,
    pub bomb: Position,
}

impl Default for InitialLayout {
    fn default() -> Self {
        Self {
            avatar: Position::new(0, 2),
            coin: Position::new(2, 0),
            bomb: Position::new(0, 1),
        }
    }
}

impl InitialLayout {
    pub fn entities(&self) -> [EntityRecord; 3] {
        [
            EntityRecord {
                kind: EntityKind::Avatar,
                position: self.avatar,
            },
            EntityRecord {
                kind: EntityKind::Coin,
                position: self.coin,
            },
            EntityRecord {
                kind: EntityKind::Bomb,
                position: self.bomb,
            },
        ]
    }

    /// All cells on the board and pairwise distinct
    pub fn validate(&self, grid: &Grid) -> Result<(), GameError> {
        let entities = self.entities();
        for entity in &entities {
            if !grid.is_in_bounds(entity.position) {
                return Err(GameError::InvalidLayout(format!(
                    "{} at {} is outside the {}x{} grid",
                    entity.kind,
                    entity.position,
                    grid.width(),
                    grid.height()
                )));
            }
        }
        let distinct: HashSet<Position> = entities.iter().map(|e| e.position).collect();
        if distinct.len() != entities.len() {
            return Err(GameError::InvalidLayout(
                "entities must start on distinct cells".to_string(),
            ));
        }
        Ok(())
    }
}

/// Effect of landing on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Collision {
    Coin {
        score: u32,
        high_score: u32,
        /// `None` when no free cell was left
        respawned_to: Option<Position>,
    },
    Bomb {
        respawned_to: Option<Position>,
    },
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No fresh votes; nothing recorded
    NoOp,
    /// Destination off the board; the attempt is still in the history
    Blocked { record: MoveRecord },
    Moved {
        record: MoveRecord,
        to: Position,
        collisions: Vec<Collision>,
    },
}

/// State owned by the single writer
struct Writer {
    rng: ChaCha8Rng,
}

pub struct GameEngine {
    store: Arc<dyn GameStore>,
    ledger: VoteLedger,
    grid: Grid,
    layout: InitialLayout,
    clock: Arc<dyn Clock>,
    writer: Mutex<Writer>,
}

impl GameEngine {
    pub fn new(
        store: Arc<dyn GameStore>,
        grid: Grid,
        policy: VotePolicy,
        clock: Arc<dyn Clock>,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            ledger: VoteLedger::new(store.clone(), policy),
            store,
            grid,
            layout: InitialLayout::default(),
            clock,
            writer: Mutex::new(Writer { rng }),
        }
    }

    /// Use a non-default starting placement for newly created games
    pub fn with_layout(mut self, layout: InitialLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Resume the existing game or create one. Idempotent.
    pub async fn init(&self) -> Result<GameId, GameError> {
        let _writer = self.writer.lock().await;
        let now = self.clock.now();

        if let Some(game) = self.store.find_game().await? {
            self.store.resume_game(game, now).await?;
            info!(game_id = %game, "Resuming game");
            return Ok(game);
        }

        self.layout.validate(&self.grid)?;
        let game = self
            .store
            .create_game(&self.layout.entities(), now)
            .await?;
        info!(
            game_id = %game,
            width = self.grid.width(),
            height = self.grid.height(),
            "Created new game"
        );
        Ok(game)
    }

    /// Cast `direction` on behalf of an externally verified identity
    pub async fn record_move(
        &self,
        game: GameId,
        direction: Direction,
        identity: &str,
    ) -> Result<VoteOutcome, GameError> {
        let _writer = self.writer.lock().await;

        let player = self.store.ensure_player(identity).await?;
        let last_move_at = self.last_move_at(game).await?;
        // Anything recorded after the cutoff must count for the next tick
        let cast_at = self
            .clock
            .now()
            .max(last_move_at + chrono::Duration::nanoseconds(1));

        let outcome = self
            .ledger
            .record_vote(game, player, direction, cast_at, last_move_at)
            .await?;

        match outcome {
            VoteOutcome::Recorded => {
                info!(game_id = %game, player_id = %player, %direction, "Vote recorded");
            }
            VoteOutcome::AlreadyVoted => {
                debug!(
                    game_id = %game,
                    player_id = %player,
                    %direction,
                    "Vote already recorded this window"
                );
            }
            VoteOutcome::Replaced { previous } => {
                info!(game_id = %game, player_id = %player, %previous, %direction, "Vote replaced");
            }
        }
        Ok(outcome)
    }

    /// Execute one voting window
    pub async fn tick(&self, game: GameId, now: Timestamp) -> Result<TickOutcome, GameError> {
        let mut writer = self.writer.lock().await;

        let last_move_at = self.last_move_at(game).await?;
        let votes = self.ledger.fresh_votes(game, now, last_move_at).await?;
        let Some(vote) = votes.choose(&mut writer.rng).copied() else {
            debug!(game_id = %game, "No fresh votes");
            return Ok(TickOutcome::NoOp);
        };

        let avatar = self
            .store
            .get_entity_position(game, EntityKind::Avatar)
            .await?;
        let target = Grid::translate(avatar, vote.direction);
        let record = MoveRecord {
            player_id: vote.player_id,
            direction: vote.direction,
            from: avatar,
            executed_at: now,
        };
        let mut commit = TickCommit::new(record);

        if !self.grid.is_in_bounds(target) {
            self.store.commit_tick(game, &commit).await?;
            info!(
                game_id = %game,
                player_id = %vote.player_id,
                direction = %vote.direction,
                x = target.x,
                y = target.y,
                "Move blocked"
            );
            return Ok(TickOutcome::Blocked { record });
        }

        let state = self.store.get_game(game).await?;
        let mut positions: HashMap<EntityKind, Position> = self
            .store
            .list_entities(game)
            .await?
            .into_iter()
            .map(|e| (e.kind, e.position))
            .collect();
        let hits_coin = positions.get(&EntityKind::Coin) == Some(&target);
        let hits_bomb = positions.get(&EntityKind::Bomb) == Some(&target);
        positions.insert(EntityKind::Avatar, target);
        commit.avatar = Some(target);

        let mut score = state.score;
        let mut high_score = state.high_score;
        let mut collisions = Vec::new();
        let mut placement_error = None;

        // Both checks run even though the layout keeps entities apart
        if hits_coin {
            score += 1;
            if score > high_score {
                high_score = score;
                commit.high_score = Some(high_score);
            }
            commit.score = Some(score);

            let respawned_to = self.respawn(
                EntityKind::Coin,
                &mut positions,
                &mut writer.rng,
                &mut commit,
                &mut placement_error,
            );
            collisions.push(Collision::Coin {
                score,
                high_score,
                respawned_to,
            });
        }
        if hits_bomb {
            score = 0;
            commit.score = Some(score);

            let respawned_to = self.respawn(
                EntityKind::Bomb,
                &mut positions,
                &mut writer.rng,
                &mut commit,
                &mut placement_error,
            );
            collisions.push(Collision::Bomb { respawned_to });
        }

        self.store.commit_tick(game, &commit).await?;

        for collision in &collisions {
            match collision {
                Collision::Coin {
                    score, high_score, ..
                } => info!(game_id = %game, score, high_score, "Coin collected"),
                Collision::Bomb { .. } => info!(game_id = %game, "Bomb hit, score reset"),
            }
        }
        info!(
            game_id = %game,
            player_id = %vote.player_id,
            direction = %vote.direction,
            x = target.x,
            y = target.y,
            "Move executed"
        );

        if let Some(err) = placement_error {
            return Err(err);
        }

        Ok(TickOutcome::Moved {
            record,
            to: target,
            collisions,
        })
    }

    /// Move `kind` to a free cell, recording the write in `commit`.
    /// On failure the entity keeps its cell and the error is kept for the caller.
    fn respawn(
        &self,
        kind: EntityKind,
        positions: &mut HashMap<EntityKind, Position>,
        rng: &mut ChaCha8Rng,
        commit: &mut TickCommit,
        placement_error: &mut Option<GameError>,
    ) -> Option<Position> {
        let occupied: HashSet<Position> = positions
            .iter()
            .filter(|(other, _)| **other != kind)
            .map(|(_, pos)| *pos)
            .collect();

        match random_unoccupied_cell(&self.grid, &occupied, rng) {
            Ok(cell) => {
                positions.insert(kind, cell);
                commit.respawns.push(EntityRecord {
                    kind,
                    position: cell,
                });
                Some(cell)
            }
            Err(err) => {
                error!(
                    entity = %kind,
                    error = %err,
                    "Respawn failed, entity left overlapping the avatar"
                );
                placement_error.get_or_insert(err);
                None
            }
        }
    }

    /// Executed-at of the latest move, or the game start before any move
    pub async fn last_move_at(&self, game: GameId) -> Result<Timestamp, GameError> {
        match self.store.last_move_at(game).await? {
            Some(at) => Ok(at),
            None => Ok(self.store.get_game(game).await?.started_at),
        }
    }

    /// Snapshot for display; `viewer` selects whose pending vote to report
    pub async fn get_state(
        &self,
        game: GameId,
        viewer: Option<&str>,
    ) -> Result<GameSnapshot, GameError> {
        let view = self.store.read_view(game).await?;

        let player_vote = match viewer {
            Some(identity) => self.store.find_player(identity).await?.and_then(|player| {
                view.fresh_votes
                    .iter()
                    .find(|v| v.player_id == player)
                    .map(|v| v.direction)
            }),
            None => None,
        };

        Ok(GameSnapshot {
            game_id: game,
            score: view.record.score,
            high_score: view.record.high_score,
            last_move_at: view.last_move_at(),
            last_avatar_position: view.moves.last().map(|m| m.from),
            player_vote,
            tally: tally_votes(&view.fresh_votes),
            entities: view.entities,
        })
    }

    /// Players, pending candidates and full move history
    pub async fn get_stats(&self, game: GameId) -> Result<GameStats, GameError> {
        let view = self.store.read_view(game).await?;
        let players = self.store.list_players().await?;
        let resolver = NameResolver::new(&players);

        Ok(GameStats {
            game_id: game,
            score: view.record.score,
            high_score: view.record.high_score,
            last_move_at: view.last_move_at(),
            candidates: resolver.candidates(&view.fresh_votes),
            history: resolver.history(&view.moves),
            entities: view.entities,
            players,
        })
    }
}
