//! Random placement of respawning entities

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use super::error::GameError;
use super::grid::Grid;
use super::types::Position;

/// Pick a cell uniformly among those not in `occupied`
pub fn random_unoccupied_cell<R: Rng + ?Sized>(
    grid: &Grid,
    occupied: &HashSet<Position>,
    rng: &mut R,
) -> Result<Position, GameError> {
    let free: Vec<Position> = grid.cells().filter(|cell| !occupied.contains(cell)).collect();

    free.choose(rng).copied().ok_or(GameError::NoCellsAvailable {
        width: grid.width(),
        height: grid.height(),
    })
}
