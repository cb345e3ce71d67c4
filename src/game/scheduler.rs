//! Fixed-period tick driver

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::engine::GameEngine;
use super::types::GameId;

/// Runs `GameEngine::tick` once per period, independent of vote traffic
pub struct TickScheduler {
    engine: Arc<GameEngine>,
    game: GameId,
    period: Duration,
}

/// Stops the scheduler task
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scheduling; an in-flight tick finishes first
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "Tick scheduler task ended abnormally");
        }
    }
}

impl TickScheduler {
    pub fn new(engine: Arc<GameEngine>, game: GameId, period: Duration) -> Self {
        Self {
            engine,
            game,
            period,
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            game_id = %self.game,
            period_ms = self.period.as_millis() as u64,
            "Tick scheduler started"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; the first window gets a full period
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let now = self.engine.clock().now();
            // Not retried: the window simply stays open one more period
            if let Err(err) = self.engine.tick(self.game, now).await {
                warn!(game_id = %self.game, error = %err, "Scheduled tick failed");
            }
        }

        info!(game_id = %self.game, "Tick scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, Grid, VotePolicy};
    use crate::store::{GameStore, InMemoryStore};
    use crate::util::time::ManualClock;
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_period_and_stops() {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));
        let engine = Arc::new(GameEngine::new(
            store.clone(),
            Grid::new(3, 3).unwrap(),
            VotePolicy::FirstWins,
            clock.clone(),
            ChaCha8Rng::seed_from_u64(5),
        ));
        let game = engine.init().await.unwrap();

        let handle = TickScheduler::new(engine.clone(), game, Duration::from_secs(5)).spawn();

        engine.record_move(game, Direction::Right, "alice").await.unwrap();
        clock.advance(chrono::Duration::seconds(1));

        // Nothing before the first full period
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(store.list_moves(game).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.list_moves(game).await.unwrap().len(), 1);

        handle.shutdown().await;

        engine.record_move(game, Direction::Right, "alice").await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(store.list_moves(game).await.unwrap().len(), 1);
    }
}
