//! Engine error taxonomy

use crate::store::StoreError;

/// Errors surfaced by the game engine
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Invalid direction: {0:?}")]
    InvalidDirection(String),

    #[error("No unoccupied cell left on a {width}x{height} grid")]
    NoCellsAvailable { width: u32, height: u32 },

    #[error("Invalid grid dimensions {width}x{height}")]
    InvalidGrid { width: u32, height: u32 },

    #[error("Invalid initial layout: {0}")]
    InvalidLayout(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}
