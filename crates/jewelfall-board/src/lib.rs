//! Board rules for Jewelfall.
//!
//! Pure, synchronous game physics for one player's board:
//!
//! - [`Grid`]: the cell matrix, placement checks, gravity, match detection,
//!   and the bounded resolution loop run after a lock-in.
//! - [`Piece`]: a falling column of three jewels.
//!
//! Nothing here knows about rooms, time or connections. Row 0 is the
//! bottom of the board and `y` grows upwards.

mod error;
mod grid;
mod piece;

pub use error::BoardError;
pub use grid::{Grid, Resolution, MAX_RESOLUTION_PASSES};
pub use piece::{Piece, PieceCell, PIECE_LEN};

/// A jewel-type tag. `0` is empty, `1..=7` are jewels.
pub type Jewel = u8;

/// The empty cell.
pub const EMPTY: Jewel = 0;

/// Highest valid jewel type.
pub const MAX_JEWEL: Jewel = 7;

/// Standard board width.
pub const GRID_WIDTH: usize = 6;

/// Standard board height.
pub const GRID_HEIGHT: usize = 12;

/// Returns `true` if `jewel` is a placeable (non-empty, in-range) type.
pub fn is_jewel(jewel: Jewel) -> bool {
    (1..=MAX_JEWEL).contains(&jewel)
}
