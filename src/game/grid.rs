//! Board geometry: bounds and direction arithmetic

use super::error::GameError;
use super::types::{Direction, Position};

/// Rectangular board of `width` x `height` cells, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Result<Self, GameError> {
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(GameError::InvalidGrid { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True iff the position lies within `[0, width) x [0, height)`
    pub fn is_in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && (pos.x as u32) < self.width && pos.y >= 0 && (pos.y as u32) < self.height
    }

    /// Unit step for a direction; `y` grows downwards
    pub fn displacement(direction: Direction) -> (i32, i32) {
        match direction {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Step one cell. No clamping; callers check `is_in_bounds`.
    pub fn translate(pos: Position, direction: Direction) -> Position {
        let (dx, dy) = Self::displacement(direction);
        Position::new(pos.x + dx, pos.y + dy)
    }

    /// Every cell of the board in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }
}
