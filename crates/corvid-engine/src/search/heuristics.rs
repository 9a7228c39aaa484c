//! Killer move table and history heuristic for quiet move ordering.

use chess::{ChessMove, Color, Piece, Square};

use crate::search::negamax::MAX_PLY;

/// Killer slots per ply.
const KILLER_SLOTS: usize = 3;

/// Quiet moves that caused beta cutoffs, most recent first.
pub struct KillerTable {
    slots: [[Option<ChessMove>; KILLER_SLOTS]; MAX_PLY],
}

impl KillerTable {
    /// Create an empty killer table.
    pub fn new() -> Self {
        Self {
            slots: [[None; KILLER_SLOTS]; MAX_PLY],
        }
    }

    /// Store a killer move at the given ply.
    ///
    /// Moves `mv` to the front; if it was not already present the oldest
    /// slot is evicted.
    pub fn store(&mut self, ply: usize, mv: ChessMove) {
        if ply >= MAX_PLY {
            return;
        }
        let row = &mut self.slots[ply];
        let end = row
            .iter()
            .position(|&slot| slot == Some(mv))
            .unwrap_or(KILLER_SLOTS - 1);
        row[..=end].rotate_right(1);
        row[0] = Some(mv);
    }

    /// Recency rank of `mv` at `ply` (0 = most recent), if it is a killer.
    pub fn rank(&self, ply: usize, mv: ChessMove) -> Option<usize> {
        if ply >= MAX_PLY {
            return None;
        }
        self.slots[ply].iter().position(|&slot| slot == Some(mv))
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// History heuristic table, indexed by `[color][piece][to_square]`.
///
/// Cumulative `depth²` bonus for quiet moves that caused a beta cutoff.
pub struct HistoryTable {
    table: [[[u64; 64]; 6]; 2],
}

impl HistoryTable {
    /// Create a zeroed history table.
    pub fn new() -> Self {
        Self {
            table: [[[0; 64]; 6]; 2],
        }
    }

    /// Reward a quiet move that caused a beta cutoff at `depth`.
    pub fn reward(&mut self, color: Color, piece: Piece, to: Square, depth: u8) {
        let bonus = u64::from(depth) * u64::from(depth);
        let entry = &mut self.table[color.to_index()][piece.to_index()][to.to_index()];
        *entry = entry.saturating_add(bonus);
    }

    /// History score for a quiet move.
    pub fn score(&self, color: Color, piece: Piece, to: Square) -> u64 {
        self.table[color.to_index()][piece.to_index()][to.to_index()]
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}
