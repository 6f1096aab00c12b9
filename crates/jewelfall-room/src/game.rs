//! The two boards of a match and the rules that drive them.
//!
//! [`Match`] knows nothing about connections or broadcasting. The room
//! actor calls [`Match::tick_slot`] and [`Match::apply_input`] and turns
//! the results into events.

use jewelfall_board::{Grid, Piece, Resolution, MAX_RESOLUTION_PASSES};
use jewelfall_protocol::{Direction, JewelCell, Slot};
use rand::rngs::StdRng;

/// What one tick did to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTick {
    /// A new piece appeared at the spawn position. It does not fall this tick.
    Spawned,
    /// The active piece moved down one row.
    Fell,
    /// The active piece could not fall, was written into the grid and the
    /// board was resolved.
    Locked(Resolution),
    /// The spawn position is blocked. The slot has lost.
    ToppedOut,
}

#[derive(Debug, Clone, Default)]
struct SlotBoard {
    grid: Grid,
    piece: Option<Piece>,
}

/// Grid and active piece for both slots, plus the piece generator.
#[derive(Debug)]
pub struct Match {
    boards: [SlotBoard; 2],
    rng: StdRng,
}

impl Match {
    pub fn new(rng: StdRng) -> Self {
        Self {
            boards: Default::default(),
            rng,
        }
    }

    /// Empties both grids and spawns a fresh piece on each.
    pub fn reset(&mut self) {
        for board in &mut self.boards {
            board.grid.clear();
            board.piece = Some(Piece::spawn(&mut self.rng, &board.grid));
        }
    }

    /// Advances one slot by one tick.
    pub fn tick_slot(&mut self, slot: Slot) -> SlotTick {
        let board = &mut self.boards[slot.index()];

        let Some(piece) = board.piece.as_mut() else {
            let fresh = Piece::spawn(&mut self.rng, &board.grid);
            if !board.grid.can_place(&fresh) {
                return SlotTick::ToppedOut;
            }
            board.piece = Some(fresh);
            return SlotTick::Spawned;
        };

        piece.move_down();
        if board.grid.can_place(piece) {
            return SlotTick::Fell;
        }
        piece.move_up();
        board.grid.place(piece);
        board.piece = None;
        SlotTick::Locked(board.grid.resolve(MAX_RESOLUTION_PASSES))
    }

    /// Moves or rotates the slot's active piece. A move that does not fit
    /// is undone. Returns `false` when the slot has no active piece.
    pub fn apply_input(&mut self, slot: Slot, direction: Direction) -> bool {
        let board = &mut self.boards[slot.index()];
        let Some(piece) = board.piece.as_mut() else {
            return false;
        };

        match direction {
            Direction::Left => {
                piece.move_left();
                if !board.grid.can_place(piece) {
                    piece.move_right();
                }
            }
            Direction::Right => {
                piece.move_right();
                if !board.grid.can_place(piece) {
                    piece.move_left();
                }
            }
            Direction::Down => {
                piece.move_down();
                if !board.grid.can_place(piece) {
                    piece.move_up();
                }
            }
            Direction::Rotate => {
                piece.rotate();
                if !board.grid.can_place(piece) {
                    piece.rotate();
                    piece.rotate();
                }
            }
        }
        true
    }

    /// Every occupied cell of the slot's grid followed by the visible
    /// cells of its active piece.
    pub fn view(&self, slot: Slot) -> Vec<JewelCell> {
        let board = &self.boards[slot.index()];
        let height = board.grid.height() as i32;

        let settled = board.grid.occupied().map(|(x, y, jewel)| JewelCell {
            x,
            y,
            jewel_type: jewel,
        });
        let falling = board
            .piece
            .iter()
            .flat_map(|p| p.positions())
            .filter(|c| c.x >= 0 && (0..height).contains(&c.y))
            .map(|c| JewelCell {
                x: c.x as usize,
                y: c.y as usize,
                jewel_type: c.jewel,
            });
        settled.chain(falling).collect()
    }

    pub fn grid(&self, slot: Slot) -> &Grid {
        &self.boards[slot.index()].grid
    }

    pub fn piece(&self, slot: Slot) -> Option<&Piece> {
        self.boards[slot.index()].piece.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn grid_mut(&mut self, slot: Slot) -> &mut Grid {
        &mut self.boards[slot.index()].grid
    }

    #[cfg(test)]
    pub(crate) fn set_piece(&mut self, slot: Slot, piece: Option<Piece>) {
        self.boards[slot.index()].piece = piece;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jewelfall_board::GRID_HEIGHT;
    use rand::SeedableRng;

    fn seeded() -> Match {
        let mut game = Match::new(StdRng::seed_from_u64(11));
        game.reset();
        game
    }

    #[test]
    fn test_reset_spawns_on_both_slots() {
        let game = seeded();
        for slot in Slot::ALL {
            let piece = game.piece(slot).unwrap();
            assert_eq!((piece.x(), piece.y()), (2, 9));
            assert_eq!(game.view(slot).len(), 3);
        }
    }

    #[test]
    fn test_piece_falls_then_locks_on_floor() {
        let mut game = seeded();
        for _ in 0..GRID_HEIGHT - 3 {
            assert_eq!(game.tick_slot(Slot::One), SlotTick::Fell);
        }
        assert!(matches!(game.tick_slot(Slot::One), SlotTick::Locked(_)));
        assert!(game.piece(Slot::One).is_none());
        assert_eq!(game.grid(Slot::One).occupied().count(), 3);

        // The other slot is untouched.
        assert_eq!(game.piece(Slot::Two).unwrap().y(), 9);

        assert_eq!(game.tick_slot(Slot::One), SlotTick::Spawned);
        assert!(game.piece(Slot::One).is_some());
    }

    #[test]
    fn test_blocked_spawn_tops_out() {
        let mut game = seeded();
        game.set_piece(Slot::Two, None);
        game.grid_mut(Slot::Two).set(2, 9, 5).unwrap();
        assert_eq!(game.tick_slot(Slot::Two), SlotTick::ToppedOut);
        assert!(game.piece(Slot::Two).is_none());
    }

    #[test]
    fn test_lock_resolves_matches() {
        let mut game = seeded();
        game.grid_mut(Slot::One).set(0, 0, 4).unwrap();
        game.grid_mut(Slot::One).set(1, 0, 4).unwrap();
        game.set_piece(Slot::One, Some(Piece::new([4, 1, 2], 2, 0).unwrap()));

        let SlotTick::Locked(res) = game.tick_slot(Slot::One) else {
            panic!("expected lock");
        };
        assert!(res.settled);
        assert_eq!(res.cleared, 3);
        let left: Vec<_> = game.grid(Slot::One).occupied().collect();
        assert_eq!(left, vec![(2, 0, 1), (2, 1, 2)]);
    }

    #[test]
    fn test_horizontal_moves_stop_at_walls_and_jewels() {
        let mut game = seeded();
        for _ in 0..5 {
            game.apply_input(Slot::One, Direction::Left);
        }
        assert_eq!(game.piece(Slot::One).unwrap().x(), 0);

        game.grid_mut(Slot::One).set(1, 10, 3).unwrap();
        game.apply_input(Slot::One, Direction::Right);
        assert_eq!(game.piece(Slot::One).unwrap().x(), 0);
    }

    #[test]
    fn test_soft_drop_stops_at_floor() {
        let mut game = seeded();
        for _ in 0..20 {
            game.apply_input(Slot::Two, Direction::Down);
        }
        assert_eq!(game.piece(Slot::Two).unwrap().y(), 0);
    }

    #[test]
    fn test_rotate_cycles_jewels() {
        let mut game = seeded();
        let before = game.piece(Slot::One).unwrap().jewels();
        game.apply_input(Slot::One, Direction::Rotate);
        let after = game.piece(Slot::One).unwrap().jewels();
        assert_eq!(after, [before[1], before[2], before[0]]);
    }

    #[test]
    fn test_input_without_piece_is_ignored() {
        let mut game = seeded();
        game.set_piece(Slot::One, None);
        assert!(!game.apply_input(Slot::One, Direction::Left));
    }

    #[test]
    fn test_view_hides_cells_above_top() {
        let mut game = seeded();
        game.set_piece(Slot::One, Some(Piece::new([1, 2, 3], 4, 10).unwrap()));
        game.grid_mut(Slot::One).set(0, 0, 6).unwrap();
        let view = game.view(Slot::One);
        assert_eq!(
            view,
            vec![
                JewelCell { x: 0, y: 0, jewel_type: 6 },
                JewelCell { x: 4, y: 10, jewel_type: 1 },
                JewelCell { x: 4, y: 11, jewel_type: 2 },
            ]
        );
    }
}
