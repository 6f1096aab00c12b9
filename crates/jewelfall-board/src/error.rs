//! Error types for the board layer.

use crate::Jewel;

/// Errors raised when board data would break a grid invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The coordinate is outside the visible grid.
    #[error("cell ({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },

    /// The value is not in `0..=7` (cells) or `1..=7` (piece jewels).
    #[error("invalid jewel type {0}")]
    InvalidJewel(Jewel),

    /// Seed rows passed to [`Grid::from_rows`](crate::Grid::from_rows)
    /// don't form a rectangle.
    #[error("rows must all have the same non-zero width")]
    Ragged,
}
