//! In-process `GameStore` for single-node runs and tests

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::game::{Direction, EntityKind, GameId, PlayerId, Position, Timestamp};

use super::{
    EntityRecord, GameRecord, GameStore, GameView, MoveRecord, PlayerRecord, StoreError,
    TickCommit, VoteRecord,
};

/// Everything belonging to one game
#[derive(Debug, Clone)]
struct GameData {
    record: GameRecord,
    entities: HashMap<EntityKind, Position>,
    votes: Vec<VoteRecord>,
    moves: Vec<MoveRecord>,
}

impl GameData {
    fn entity(&self, game: GameId, kind: EntityKind) -> Result<Position, StoreError> {
        self.entities
            .get(&kind)
            .copied()
            .ok_or(StoreError::EntityMissing { game, kind })
    }

    fn entity_records(&self) -> Vec<EntityRecord> {
        EntityKind::ALL
            .iter()
            .filter_map(|kind| {
                self.entities.get(kind).map(|&position| EntityRecord {
                    kind: *kind,
                    position,
                })
            })
            .collect()
    }

    fn last_move_at(&self) -> Timestamp {
        self.moves
            .last()
            .map_or(self.record.started_at, |m| m.executed_at)
    }
}

#[derive(Debug, Default)]
struct PlayerTable {
    by_identity: HashMap<String, PlayerId>,
    players: Vec<PlayerRecord>,
}

/// Games are sharded in a `DashMap`; a shard guard covers one whole tick commit
#[derive(Default)]
pub struct InMemoryStore {
    games: DashMap<GameId, GameData>,
    active: RwLock<Option<GameId>>,
    players: RwLock<PlayerTable>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(
        &self,
        game: GameId,
        f: impl FnOnce(&GameData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let data = self.games.get(&game).ok_or(StoreError::GameNotFound(game))?;
        f(data.value())
    }

    fn write<T>(
        &self,
        game: GameId,
        f: impl FnOnce(&mut GameData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self
            .games
            .get_mut(&game)
            .ok_or(StoreError::GameNotFound(game))?;
        f(data.value_mut())
    }
}

#[async_trait]
impl GameStore for InMemoryStore {
    async fn find_game(&self) -> Result<Option<GameId>, StoreError> {
        Ok(*self.active.read())
    }

    async fn create_game(
        &self,
        entities: &[EntityRecord],
        started_at: Timestamp,
    ) -> Result<GameId, StoreError> {
        let id = GameId::new();
        let data = GameData {
            record: GameRecord {
                id,
                score: 0,
                high_score: 0,
                started_at,
            },
            entities: entities.iter().map(|e| (e.kind, e.position)).collect(),
            votes: Vec::new(),
            moves: Vec::new(),
        };
        self.games.insert(id, data);
        *self.active.write() = Some(id);
        Ok(id)
    }

    async fn resume_game(&self, game: GameId, started_at: Timestamp) -> Result<(), StoreError> {
        self.write(game, |data| {
            data.record.started_at = started_at;
            Ok(())
        })
    }

    async fn get_game(&self, game: GameId) -> Result<GameRecord, StoreError> {
        self.read(game, |data| Ok(data.record))
    }

    async fn update_score(&self, game: GameId, score: u32) -> Result<(), StoreError> {
        self.write(game, |data| {
            data.record.score = score;
            Ok(())
        })
    }

    async fn update_high_score(&self, game: GameId, high_score: u32) -> Result<(), StoreError> {
        self.write(game, |data| {
            data.record.high_score = high_score;
            Ok(())
        })
    }

    async fn get_entity_position(
        &self,
        game: GameId,
        kind: EntityKind,
    ) -> Result<Position, StoreError> {
        self.read(game, |data| data.entity(game, kind))
    }

    async fn set_entity_position(
        &self,
        game: GameId,
        kind: EntityKind,
        position: Position,
    ) -> Result<(), StoreError> {
        self.write(game, |data| {
            data.entities.insert(kind, position);
            Ok(())
        })
    }

    async fn list_entities(&self, game: GameId) -> Result<Vec<EntityRecord>, StoreError> {
        self.read(game, |data| Ok(data.entity_records()))
    }

    async fn list_occupied_positions(&self, game: GameId) -> Result<HashSet<Position>, StoreError> {
        self.read(game, |data| Ok(data.entities.values().copied().collect()))
    }

    async fn ensure_player(&self, identity: &str) -> Result<PlayerId, StoreError> {
        if let Some(id) = self.players.read().by_identity.get(identity) {
            return Ok(*id);
        }

        let mut table = self.players.write();
        // Another caller may have created it between the two locks
        if let Some(id) = table.by_identity.get(identity) {
            return Ok(*id);
        }
        let id = PlayerId(table.players.len() as u64 + 1);
        table.by_identity.insert(identity.to_string(), id);
        table.players.push(PlayerRecord {
            id,
            name: identity.to_string(),
        });
        Ok(id)
    }

    async fn find_player(&self, identity: &str) -> Result<Option<PlayerId>, StoreError> {
        Ok(self.players.read().by_identity.get(identity).copied())
    }

    async fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self.players.read().players.clone())
    }

    async fn record_vote(
        &self,
        game: GameId,
        player: PlayerId,
        direction: Direction,
        cast_at: Timestamp,
    ) -> Result<(), StoreError> {
        self.write(game, |data| {
            data.votes.push(VoteRecord {
                player_id: player,
                direction,
                cast_at,
            });
            Ok(())
        })
    }

    async fn list_fresh_votes(
        &self,
        game: GameId,
        last_move_at: Timestamp,
    ) -> Result<Vec<VoteRecord>, StoreError> {
        self.read(game, |data| {
            Ok(data
                .votes
                .iter()
                .filter(|v| v.cast_at > last_move_at)
                .copied()
                .collect())
        })
    }

    async fn has_fresh_vote(
        &self,
        game: GameId,
        player: PlayerId,
        last_move_at: Timestamp,
    ) -> Result<bool, StoreError> {
        self.read(game, |data| {
            Ok(data
                .votes
                .iter()
                .any(|v| v.player_id == player && v.cast_at > last_move_at))
        })
    }

    async fn retract_fresh_vote(
        &self,
        game: GameId,
        player: PlayerId,
        last_move_at: Timestamp,
    ) -> Result<Option<Direction>, StoreError> {
        self.write(game, |data| {
            let idx = data
                .votes
                .iter()
                .position(|v| v.player_id == player && v.cast_at > last_move_at);
            Ok(idx.map(|i| data.votes.remove(i).direction))
        })
    }

    async fn append_move(&self, game: GameId, record: MoveRecord) -> Result<(), StoreError> {
        self.write(game, |data| {
            data.moves.push(record);
            Ok(())
        })
    }

    async fn last_move_at(&self, game: GameId) -> Result<Option<Timestamp>, StoreError> {
        self.read(game, |data| Ok(data.moves.last().map(|m| m.executed_at)))
    }

    async fn list_moves(&self, game: GameId) -> Result<Vec<MoveRecord>, StoreError> {
        self.read(game, |data| Ok(data.moves.clone()))
    }

    async fn read_view(&self, game: GameId) -> Result<GameView, StoreError> {
        self.read(game, |data| {
            let cutoff = data.last_move_at();
            Ok(GameView {
                record: data.record,
                entities: data.entity_records(),
                moves: data.moves.clone(),
                fresh_votes: data
                    .votes
                    .iter()
                    .filter(|v| v.cast_at > cutoff)
                    .copied()
                    .collect(),
            })
        })
    }

    async fn commit_tick(&self, game: GameId, commit: &TickCommit) -> Result<(), StoreError> {
        self.write(game, |data| {
            // Validate before touching anything
            data.entity(game, EntityKind::Avatar)?;
            for respawn in &commit.respawns {
                data.entity(game, respawn.kind)?;
            }

            data.moves.push(commit.record);
            if let Some(avatar) = commit.avatar {
                data.entities.insert(EntityKind::Avatar, avatar);
            }
            if let Some(high_score) = commit.high_score {
                data.record.high_score = high_score;
            }
            if let Some(score) = commit.score {
                data.record.score = score;
            }
            for respawn in &commit.respawns {
                data.entities.insert(respawn.kind, respawn.position);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn layout() -> Vec<EntityRecord> {
        vec![
            EntityRecord {
                kind: EntityKind::Avatar,
                position: Position::new(0, 2),
            },
            EntityRecord {
                kind: EntityKind::Coin,
                position: Position::new(2, 0),
            },
            EntityRecord {
                kind: EntityKind::Bomb,
                position: Position::new(0, 1),
            },
        ]
    }

    #[tokio::test]
    async fn test_create_and_find_game() {
        let store = InMemoryStore::new();
        assert_eq!(store.find_game().await.unwrap(), None);

        let game = store.create_game(&layout(), t(0)).await.unwrap();
        assert_eq!(store.find_game().await.unwrap(), Some(game));

        let record = store.get_game(game).await.unwrap();
        assert_eq!(record.score, 0);
        assert_eq!(record.high_score, 0);
        assert_eq!(record.started_at, t(0));
        assert_eq!(store.list_occupied_positions(game).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_game() {
        let store = InMemoryStore::new();
        let missing = GameId::new();
        assert!(matches!(
            store.get_game(missing).await,
            Err(StoreError::GameNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_ensure_player_is_idempotent() {
        let store = InMemoryStore::new();
        let alice = store.ensure_player("alice").await.unwrap();
        let bob = store.ensure_player("bob").await.unwrap();
        assert_ne!(alice, bob);
        assert_eq!(store.ensure_player("alice").await.unwrap(), alice);
        assert_eq!(store.find_player("carol").await.unwrap(), None);
        assert_eq!(store.list_players().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fresh_votes_are_strictly_after_cutoff() {
        let store = InMemoryStore::new();
        let game = store.create_game(&layout(), t(0)).await.unwrap();
        let alice = store.ensure_player("alice").await.unwrap();
        let bob = store.ensure_player("bob").await.unwrap();

        store.record_vote(game, alice, Direction::Up, t(5)).await.unwrap();
        store
            .record_vote(game, bob, Direction::Left, t(5) + Duration::nanoseconds(1))
            .await
            .unwrap();

        let fresh = store.list_fresh_votes(game, t(5)).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].player_id, bob);
        assert!(!store.has_fresh_vote(game, alice, t(5)).await.unwrap());
        assert!(store.has_fresh_vote(game, bob, t(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_retract_only_touches_fresh_vote() {
        let store = InMemoryStore::new();
        let game = store.create_game(&layout(), t(0)).await.unwrap();
        let alice = store.ensure_player("alice").await.unwrap();

        store.record_vote(game, alice, Direction::Up, t(1)).await.unwrap();
        store.record_vote(game, alice, Direction::Down, t(3)).await.unwrap();

        let retracted = store.retract_fresh_vote(game, alice, t(2)).await.unwrap();
        assert_eq!(retracted, Some(Direction::Down));
        assert_eq!(store.retract_fresh_vote(game, alice, t(2)).await.unwrap(), None);

        // The stale vote stays for the audit trail
        assert_eq!(store.list_fresh_votes(game, t(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_tick_applies_everything() {
        let store = InMemoryStore::new();
        let game = store.create_game(&layout(), t(0)).await.unwrap();
        let alice = store.ensure_player("alice").await.unwrap();

        let mut commit = TickCommit::new(MoveRecord {
            player_id: alice,
            direction: Direction::Up,
            from: Position::new(2, 1),
            executed_at: t(10),
        });
        commit.avatar = Some(Position::new(2, 0));
        commit.score = Some(1);
        commit.high_score = Some(1);
        commit.respawns.push(EntityRecord {
            kind: EntityKind::Coin,
            position: Position::new(1, 1),
        });

        store.commit_tick(game, &commit).await.unwrap();

        let record = store.get_game(game).await.unwrap();
        assert_eq!((record.score, record.high_score), (1, 1));
        assert_eq!(
            store.get_entity_position(game, EntityKind::Avatar).await.unwrap(),
            Position::new(2, 0)
        );
        assert_eq!(
            store.get_entity_position(game, EntityKind::Coin).await.unwrap(),
            Position::new(1, 1)
        );
        assert_eq!(store.last_move_at(game).await.unwrap(), Some(t(10)));
    }

    #[tokio::test]
    async fn test_read_view_uses_last_move_as_cutoff() {
        let store = InMemoryStore::new();
        let game = store.create_game(&layout(), t(0)).await.unwrap();
        let alice = store.ensure_player("alice").await.unwrap();
        let bob = store.ensure_player("bob").await.unwrap();

        store.record_vote(game, alice, Direction::Up, t(1)).await.unwrap();
        let view = store.read_view(game).await.unwrap();
        assert_eq!(view.last_move_at(), t(0));
        assert_eq!(view.fresh_votes.len(), 1);

        let mut commit = TickCommit::new(MoveRecord {
            player_id: alice,
            direction: Direction::Up,
            from: Position::new(0, 2),
            executed_at: t(5),
        });
        commit.avatar = Some(Position::new(0, 1));
        store.commit_tick(game, &commit).await.unwrap();
        store.record_vote(game, bob, Direction::Left, t(6)).await.unwrap();

        let view = store.read_view(game).await.unwrap();
        assert_eq!(view.last_move_at(), t(5));
        assert_eq!(view.moves.len(), 1);
        assert_eq!(view.fresh_votes.len(), 1);
        assert_eq!(view.fresh_votes[0].player_id, bob);
        assert_eq!(view.entities[0].position, Position::new(0, 1));
    }

    #[tokio::test]
    async fn test_commit_tick_rejects_missing_entity_without_writing() {
        let store = InMemoryStore::new();
        let game = store
            .create_game(
                &[EntityRecord {
                    kind: EntityKind::Avatar,
                    position: Position::new(0, 0),
                }],
                t(0),
            )
            .await
            .unwrap();
        let alice = store.ensure_player("alice").await.unwrap();

        let mut commit = TickCommit::new(MoveRecord {
            player_id: alice,
            direction: Direction::Right,
            from: Position::new(0, 0),
            executed_at: t(1),
        });
        commit.avatar = Some(Position::new(1, 0));
        commit.respawns.push(EntityRecord {
            kind: EntityKind::Coin,
            position: Position::new(2, 2),
        });

        assert!(matches!(
            store.commit_tick(game, &commit).await,
            Err(StoreError::EntityMissing { kind: EntityKind::Coin, .. })
        ));
        assert!(store.list_moves(game).await.unwrap().is_empty());
        assert_eq!(
            store.get_entity_position(game, EntityKind::Avatar).await.unwrap(),
            Position::new(0, 0)
        );
    }
}
