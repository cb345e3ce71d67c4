//! Crowd-voted grid game: geometry, vote ledger, tick engine and scheduling

pub mod engine;
pub mod error;
pub mod grid;
pub mod ledger;
pub mod respawn;
pub mod scheduler;
pub mod snapshot;
pub mod types;

pub use engine::{Collision, GameEngine, InitialLayout, TickOutcome};
pub use error::GameError;
pub use grid::Grid;
pub use ledger::{VoteLedger, VoteOutcome, VotePolicy};
pub use scheduler::{SchedulerHandle, TickScheduler};
pub use snapshot::{DirectionTally, GameSnapshot, GameStats};
pub use types::{Direction, EntityKind, GameId, PlayerId, Position, Timestamp};
