//! The per-player grid.
//!
//! Cells are stored in a flat, row-major `Vec` (`y * width + x`), row 0 at
//! the bottom. Everything outside `0..width` × `0..height` is "off-board":
//! reads return `None`, and rows at or above `height` count as open air so
//! a spawning piece may hang above the visible area.

use std::collections::BTreeSet;

use crate::{is_jewel, BoardError, Jewel, Piece, EMPTY, GRID_HEIGHT, GRID_WIDTH, MAX_JEWEL};

/// Upper bound on gravity/match passes after a lock-in.
pub const MAX_RESOLUTION_PASSES: u32 = 10;

/// Shortest run of identical jewels that clears.
const MIN_RUN: usize = 3;

/// Outcome of [`Grid::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Passes executed, including the final quiet one.
    pub passes: u32,
    /// Total cells cleared across all passes.
    pub cleared: usize,
    /// `false` if the pass limit stopped the loop while the board was
    /// still changing.
    pub settled: bool,
}

/// Board state for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Jewel>,
}

impl Grid {
    /// Creates an empty grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![EMPTY; width * height],
        }
    }

    /// Creates an empty 6×12 grid.
    pub fn standard() -> Self {
        Self::new(GRID_WIDTH, GRID_HEIGHT)
    }

    /// Builds a grid from rows listed bottom-first: `rows[0]` is row 0.
    ///
    /// # Errors
    /// [`BoardError::Ragged`] if the rows differ in width (or are empty),
    /// [`BoardError::InvalidJewel`] for any value above 7.
    pub fn from_rows(rows: &[&[Jewel]]) -> Result<Self, BoardError> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return Err(BoardError::Ragged);
        }
        let mut grid = Self::new(width, rows.len());
        for (y, row) in rows.iter().enumerate() {
            for (x, &jewel) in row.iter().enumerate() {
                grid.set(x as i32, y as i32, jewel)?;
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Returns the cell value, or `None` when off-board.
    pub fn get(&self, x: i32, y: i32) -> Option<Jewel> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Writes a cell.
    ///
    /// # Errors
    /// [`BoardError::OutOfBounds`] for off-board coordinates,
    /// [`BoardError::InvalidJewel`] for values above 7.
    pub fn set(&mut self, x: i32, y: i32, jewel: Jewel) -> Result<(), BoardError> {
        if jewel > MAX_JEWEL {
            return Err(BoardError::InvalidJewel(jewel));
        }
        let idx = self.index(x, y).ok_or(BoardError::OutOfBounds { x, y })?;
        self.cells[idx] = jewel;
        Ok(())
    }

    /// `true` only for an on-board, non-empty cell. Rows at or above the
    /// top are always open.
    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        matches!(self.get(x, y), Some(j) if j != EMPTY)
    }

    /// Checks whether `piece` may sit where it is.
    ///
    /// Fails when any cell leaves the column range or drops below row 0,
    /// or lands on an occupied visible cell. Cells above the top always pass.
    pub fn can_place(&self, piece: &Piece) -> bool {
        piece.positions().iter().all(|cell| {
            if cell.x < 0 || cell.x as usize >= self.width || cell.y < 0 {
                return false;
            }
            cell.y as usize >= self.height || !self.is_occupied(cell.x, cell.y)
        })
    }

    /// Writes the piece's visible cells into the grid. Cells above the
    /// top are dropped.
    pub fn place(&mut self, piece: &Piece) {
        for cell in piece.positions() {
            if let Some(idx) = self.index(cell.x, cell.y) {
                self.cells[idx] = cell.jewel;
            }
        }
    }

    /// Compacts every column towards row 0, keeping vertical order.
    /// Returns `true` if any cell changed.
    pub fn apply_gravity(&mut self) -> bool {
        let mut changed = false;
        for x in 0..self.width {
            let mut write_y = 0;
            for read_y in 0..self.height {
                let jewel = self.cells[read_y * self.width + x];
                if jewel == EMPTY {
                    continue;
                }
                if write_y != read_y {
                    self.cells[write_y * self.width + x] = jewel;
                    self.cells[read_y * self.width + x] = EMPTY;
                    changed = true;
                }
                write_y += 1;
            }
        }
        changed
    }

    /// Every cell belonging to a horizontal or vertical run of three or
    /// more identical jewels. Diagonals never match.
    pub fn find_matches(&self) -> BTreeSet<(usize, usize)> {
        let mut matches = BTreeSet::new();

        for y in 0..self.height {
            let row: Vec<Jewel> = (0..self.width).map(|x| self.cells[y * self.width + x]).collect();
            for (start, len) in runs(&row) {
                matches.extend((start..start + len).map(|x| (x, y)));
            }
        }

        for x in 0..self.width {
            let column: Vec<Jewel> =
                (0..self.height).map(|y| self.cells[y * self.width + x]).collect();
            for (start, len) in runs(&column) {
                matches.extend((start..start + len).map(|y| (x, y)));
            }
        }

        matches
    }

    /// Empties the given cells. Off-board coordinates are skipped.
    pub fn clear_matches<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        for (x, y) in cells {
            if x < self.width && y < self.height {
                self.cells[y * self.width + x] = EMPTY;
            }
        }
    }

    /// Runs gravity and match clearing until a pass changes nothing, or
    /// `max_passes` passes have run.
    pub fn resolve(&mut self, max_passes: u32) -> Resolution {
        let mut passes = 0;
        let mut cleared = 0;
        while passes < max_passes {
            passes += 1;
            let moved = self.apply_gravity();
            let matches = self.find_matches();
            if !matches.is_empty() {
                cleared += matches.len();
                self.clear_matches(matches);
            } else if !moved {
                return Resolution { passes, cleared, settled: true };
            }
        }
        Resolution { passes, cleared, settled: false }
    }

    /// Non-empty cells as `(x, y, jewel)`, row by row from the bottom.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, Jewel)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, j)| **j != EMPTY)
            .map(|(i, j)| (i % self.width, i / self.width, *j))
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells.fill(EMPTY);
    }

    /// Debug check of the cell-range invariant.
    pub fn is_consistent(&self) -> bool {
        self.cells.iter().all(|&j| j == EMPTY || is_jewel(j))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::standard()
    }
}

/// `(start, len)` of each run of at least [`MIN_RUN`] equal non-empty values.
fn runs(line: &[Jewel]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < line.len() {
        let jewel = line[start];
        let mut end = start + 1;
        while end < line.len() && line[end] == jewel {
            end += 1;
        }
        if jewel != EMPTY && end - start >= MIN_RUN {
            out.push((start, end - start));
        }
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(grid: &Grid, x: i32) -> Vec<Jewel> {
        (0..grid.height() as i32).map(|y| grid.get(x, y).unwrap()).collect()
    }

    #[test]
    fn test_new_grid_is_empty() {
        let grid = Grid::standard();
        assert_eq!(grid.width(), 6);
        assert_eq!(grid.height(), 12);
        assert_eq!(grid.occupied().count(), 0);
    }

    #[test]
    fn test_get_out_of_bounds() {
        let grid = Grid::new(3, 3);
        assert_eq!(grid.get(-1, 0), None);
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.get(0, 3), None);
        assert_eq!(grid.get(2, 2), Some(EMPTY));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut grid = Grid::new(3, 3);
        assert_eq!(grid.set(0, 0, 8), Err(BoardError::InvalidJewel(8)));
        assert_eq!(grid.set(5, 0, 1), Err(BoardError::OutOfBounds { x: 5, y: 0 }));
        assert!(grid.set(1, 1, 7).is_ok());
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_rows_above_top_are_never_occupied() {
        let mut grid = Grid::new(3, 3);
        grid.set(0, 2, 4).unwrap();
        assert!(grid.is_occupied(0, 2));
        assert!(!grid.is_occupied(0, 3));
        assert!(!grid.is_occupied(-1, 0));
    }

    #[test]
    fn test_from_rows_is_bottom_first() {
        let grid = Grid::from_rows(&[&[1, 0], &[0, 2]]).unwrap();
        assert_eq!(grid.get(0, 0), Some(1));
        assert_eq!(grid.get(1, 1), Some(2));
        assert_eq!(Grid::from_rows(&[&[1, 0], &[2]]), Err(BoardError::Ragged));
    }

    #[test]
    fn test_gravity_compacts_column() {
        let mut grid = Grid::from_rows(&[&[0], &[3], &[0], &[5], &[0]]).unwrap();
        assert!(grid.apply_gravity());
        assert_eq!(column(&grid, 0), vec![3, 5, 0, 0, 0]);
        assert!(!grid.apply_gravity());
    }

    #[test]
    fn test_runs_finds_long_runs_only() {
        assert_eq!(runs(&[2, 2, 2, 0, 3]), vec![(0, 3)]);
        assert_eq!(runs(&[1, 1, 0, 1, 1]), vec![]);
        assert_eq!(runs(&[4, 4, 4, 4, 4]), vec![(0, 5)]);
        assert_eq!(runs(&[0, 0, 0]), vec![]);
    }

    #[test]
    fn test_match_cells_shared_by_two_runs_reported_once() {
        // An L of 5s: row 0 x=0..3 and column 0 y=0..3.
        let grid = Grid::from_rows(&[&[5, 5, 5], &[5, 0, 0], &[5, 0, 0]]).unwrap();
        let matches = grid.find_matches();
        assert_eq!(matches.len(), 5);
        assert!(matches.contains(&(0, 0)));
    }

    #[test]
    fn test_resolve_chain_reaction() {
        // The vertical 1-1-1 clears, then the 2 above it drops into row 0
        // and completes 2-2-2.
        let mut grid = Grid::from_rows(&[
            &[2, 1, 2],
            &[0, 1, 0],
            &[0, 1, 0],
            &[0, 2, 0],
        ])
        .unwrap();
        let res = grid.resolve(MAX_RESOLUTION_PASSES);
        assert_eq!(res, Resolution { passes: 3, cleared: 6, settled: true });
        assert_eq!(grid.occupied().count(), 0);
    }

    #[test]
    fn test_resolve_drops_rows_after_clear() {
        let mut grid = Grid::from_rows(&[&[1, 1, 1], &[2, 3, 2]]).unwrap();
        let res = grid.resolve(MAX_RESOLUTION_PASSES);
        assert!(res.settled);
        assert_eq!(res.cleared, 3);
        assert_eq!(grid.get(1, 0), Some(3));
        assert_eq!(grid.get(1, 1), Some(EMPTY));
    }

    #[test]
    fn test_resolve_zero_passes_is_unsettled() {
        let mut grid = Grid::from_rows(&[&[0], &[1]]).unwrap();
        let res = grid.resolve(0);
        assert_eq!(res, Resolution { passes: 0, cleared: 0, settled: false });
    }

    #[test]
    fn test_resolve_quiet_board_takes_one_pass() {
        let mut grid = Grid::from_rows(&[&[1, 2, 3]]).unwrap();
        let res = grid.resolve(MAX_RESOLUTION_PASSES);
        assert_eq!(res, Resolution { passes: 1, cleared: 0, settled: true });
    }
}
