//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crowd_grid_server::game::{
    Direction, EntityKind, GameEngine, GameId, Grid, Position, TickOutcome, Timestamp,
    VoteOutcome, VotePolicy,
};
use crowd_grid_server::store::{GameStore, InMemoryStore};
use crowd_grid_server::util::time::{Clock, ManualClock};

pub fn epoch() -> Timestamp {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub struct Harness {
    pub engine: Arc<GameEngine>,
    pub store: Arc<dyn GameStore>,
    pub clock: Arc<ManualClock>,
    pub game: GameId,
}

impl Harness {
    pub async fn new(seed: u64) -> Self {
        Self::with(
            Arc::new(InMemoryStore::new()),
            Grid::new(3, 3).unwrap(),
            VotePolicy::FirstWins,
            seed,
        )
        .await
    }

    pub async fn with(
        store: Arc<dyn GameStore>,
        grid: Grid,
        policy: VotePolicy,
        seed: u64,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let engine = Arc::new(GameEngine::new(
            store.clone(),
            grid,
            policy,
            clock.clone(),
            ChaCha8Rng::seed_from_u64(seed),
        ));
        let game = engine.init().await.unwrap();
        Self {
            engine,
            store,
            clock,
            game,
        }
    }

    pub async fn vote(&self, identity: &str, direction: Direction) -> VoteOutcome {
        self.engine
            .record_move(self.game, direction, identity)
            .await
            .unwrap()
    }

    /// Let one period pass and run the tick
    pub async fn tick(&self) -> TickOutcome {
        self.clock.advance(Duration::seconds(5));
        self.engine.tick(self.game, self.clock.now()).await.unwrap()
    }

    pub async fn position(&self, kind: EntityKind) -> Position {
        self.store.get_entity_position(self.game, kind).await.unwrap()
    }

    pub async fn place(&self, kind: EntityKind, position: Position) {
        self.store
            .set_entity_position(self.game, kind, position)
            .await
            .unwrap();
    }

    pub async fn scores(&self) -> (u32, u32) {
        let record = self.store.get_game(self.game).await.unwrap();
        (record.score, record.high_score)
    }

    /// Avatar, coin and bomb on three distinct in-bound cells
    pub async fn assert_board_consistent(&self) {
        let grid = *self.engine.grid();
        let avatar = self.position(EntityKind::Avatar).await;
        let coin = self.position(EntityKind::Coin).await;
        let bomb = self.position(EntityKind::Bomb).await;

        for pos in [avatar, coin, bomb] {
            assert!(grid.is_in_bounds(pos), "{pos} out of bounds");
        }
        assert_ne!(avatar, coin);
        assert_ne!(avatar, bomb);
        assert_ne!(coin, bomb);
    }
}
