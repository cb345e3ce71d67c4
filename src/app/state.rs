//! Application state shared by the scheduler and any boundary layer

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::Config;
use crate::game::{GameEngine, GameError, Grid};
use crate::store::{GameStore, InMemoryStore};
use crate::util::time::SystemClock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn GameStore>,
    pub engine: Arc<GameEngine>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, GameError> {
        Self::with_store(config, Arc::new(InMemoryStore::new()))
    }

    /// Wire the engine on top of an existing store
    pub fn with_store(config: Config, store: Arc<dyn GameStore>) -> Result<Self, GameError> {
        let config = Arc::new(config);

        let grid = Grid::new(config.grid_width, config.grid_height)?;

        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let engine = Arc::new(GameEngine::new(
            store.clone(),
            grid,
            config.vote_policy,
            Arc::new(SystemClock),
            rng,
        ));

        Ok(Self {
            config,
            store,
            engine,
        })
    }
}
