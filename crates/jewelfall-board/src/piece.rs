//! Falling pieces: a vertical stack of three jewels.
//!
//! Movement never validates. The caller moves the piece, asks
//! [`Grid::can_place`](crate::Grid::can_place), and moves it back on failure.

use rand::Rng;

use crate::{is_jewel, BoardError, Grid, Jewel, MAX_JEWEL};

/// Number of jewels in a piece.
pub const PIECE_LEN: usize = 3;

/// One cell of a piece in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceCell {
    pub x: i32,
    pub y: i32,
    pub jewel: Jewel,
}

/// A falling piece. `(x, y)` is the bottom jewel; the others stack above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    /// Bottom, middle, top.
    jewels: [Jewel; PIECE_LEN],
    x: i32,
    y: i32,
}

impl Piece {
    /// Creates a piece with explicit jewels at `(x, y)`.
    ///
    /// # Errors
    /// [`BoardError::InvalidJewel`] if any jewel is empty or above 7.
    pub fn new(jewels: [Jewel; PIECE_LEN], x: i32, y: i32) -> Result<Self, BoardError> {
        if let Some(&bad) = jewels.iter().find(|j| !is_jewel(**j)) {
            return Err(BoardError::InvalidJewel(bad));
        }
        Ok(Self { jewels, x, y })
    }

    /// Creates a piece of three independent, uniformly drawn jewels.
    pub fn random<R: Rng>(rng: &mut R, x: i32, y: i32) -> Self {
        let jewels = std::array::from_fn(|_| rng.random_range(1..=MAX_JEWEL));
        Self { jewels, x, y }
    }

    /// Creates a random piece at the spawn position of `grid`.
    pub fn spawn<R: Rng>(rng: &mut R, grid: &Grid) -> Self {
        let (x, y) = Self::spawn_position(grid);
        Self::random(rng, x, y)
    }

    /// Column just left of centre, with the top jewel on the top row.
    pub fn spawn_position(grid: &Grid) -> (i32, i32) {
        let x = (grid.width() as i32 / 2 - 1).max(0);
        let y = grid.height() as i32 - PIECE_LEN as i32;
        (x, y)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// Jewels from bottom to top.
    pub fn jewels(&self) -> [Jewel; PIECE_LEN] {
        self.jewels
    }

    pub fn move_left(&mut self) {
        self.x -= 1;
    }

    pub fn move_right(&mut self) {
        self.x += 1;
    }

    pub fn move_down(&mut self) {
        self.y -= 1;
    }

    pub fn move_up(&mut self) {
        self.y += 1;
    }

    /// Cycles the jewels: the bottom one moves to the top,
    /// `[a, b, c] → [b, c, a]`. Three calls restore the original order.
    pub fn rotate(&mut self) {
        self.jewels.rotate_left(1);
    }

    /// Bottom, middle and top cells with their jewels.
    pub fn positions(&self) -> [PieceCell; PIECE_LEN] {
        std::array::from_fn(|i| PieceCell {
            x: self.x,
            y: self.y + i as i32,
            jewel: self.jewels[i],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_rejects_empty_and_out_of_range() {
        assert_eq!(Piece::new([1, 0, 2], 0, 0), Err(BoardError::InvalidJewel(0)));
        assert_eq!(Piece::new([1, 8, 2], 0, 0), Err(BoardError::InvalidJewel(8)));
        assert!(Piece::new([1, 7, 2], 0, 0).is_ok());
    }

    #[test]
    fn test_random_jewels_are_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let piece = Piece::random(&mut rng, 0, 0);
            assert!(piece.jewels().iter().all(|j| is_jewel(*j)));
        }
    }

    #[test]
    fn test_positions_stack_upwards() {
        let piece = Piece::new([1, 2, 3], 4, 5).unwrap();
        let cells = piece.positions();
        assert_eq!(cells[0], PieceCell { x: 4, y: 5, jewel: 1 });
        assert_eq!(cells[1], PieceCell { x: 4, y: 6, jewel: 2 });
        assert_eq!(cells[2], PieceCell { x: 4, y: 7, jewel: 3 });
    }

    #[test]
    fn test_rotate_moves_bottom_to_top() {
        let mut piece = Piece::new([1, 2, 3], 0, 0).unwrap();
        piece.rotate();
        assert_eq!(piece.jewels(), [2, 3, 1]);
    }

    #[test]
    fn test_moves_are_unchecked_translations() {
        let mut piece = Piece::new([1, 1, 1], 0, 0).unwrap();
        piece.move_left();
        piece.move_down();
        assert_eq!((piece.x(), piece.y()), (-1, -1));
        piece.move_right();
        piece.move_up();
        assert_eq!((piece.x(), piece.y()), (0, 0));
    }

    #[test]
    fn test_spawn_position_on_standard_grid() {
        assert_eq!(Piece::spawn_position(&Grid::standard()), (2, 9));
    }
}
