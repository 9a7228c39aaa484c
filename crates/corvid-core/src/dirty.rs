//! Piece placement deltas between a position and its parent.

use chess::{Color, Piece, Square};

/// Maximum number of placement changes a single move can produce
/// (capture-promotion: pawn removed, promoted piece added, victim removed).
const MAX_DIRTY_PIECES: usize = 3;

/// One placement change caused by a move.
///
/// `from == None` is a pure addition (promotion piece appearing),
/// `to == None` is a pure removal (captured piece, promoting pawn).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyPiece {
    /// Piece kind that changed placement.
    pub piece: Piece,
    /// Owner of the piece.
    pub color: Color,
    /// Square the piece left, if any.
    pub from: Option<Square>,
    /// Square the piece arrived on, if any.
    pub to: Option<Square>,
}

/// Fixed-capacity list of [`DirtyPiece`]s describing one move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyPieces {
    entries: [Option<DirtyPiece>; MAX_DIRTY_PIECES],
    len: usize,
}

impl DirtyPieces {
    /// An empty delta (root nodes, null transitions).
    pub const EMPTY: DirtyPieces = DirtyPieces {
        entries: [None; MAX_DIRTY_PIECES],
        len: 0,
    };

    /// Append a placement change.
    ///
    /// # Panics
    ///
    /// Panics if more than three changes are recorded, which no chess move produces.
    pub fn push(&mut self, dirty: DirtyPiece) {
        assert!(self.len < MAX_DIRTY_PIECES, "a move changes at most three placements");
        self.entries[self.len] = Some(dirty);
        self.len += 1;
    }

    /// Number of recorded changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return `true` if nothing changed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the recorded changes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DirtyPiece> {
        self.entries[..self.len].iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_iterate() {
        let mut dirty = DirtyPieces::EMPTY;
        assert!(dirty.is_empty());

        dirty.push(DirtyPiece {
            piece: Piece::Knight,
            color: Color::White,
            from: Some(Square::G1),
            to: Some(Square::F3),
        });
        dirty.push(DirtyPiece {
            piece: Piece::Pawn,
            color: Color::Black,
            from: Some(Square::F3),
            to: None,
        });

        assert_eq!(dirty.len(), 2);
        let pieces: Vec<Piece> = dirty.iter().map(|d| d.piece).collect();
        assert_eq!(pieces, vec![Piece::Knight, Piece::Pawn]);
    }

    #[test]
    #[should_panic(expected = "at most three")]
    fn fourth_entry_panics() {
        let mut dirty = DirtyPieces::EMPTY;
        let entry = DirtyPiece {
            piece: Piece::Pawn,
            color: Color::White,
            from: None,
            to: Some(Square::A2),
        };
        for _ in 0..4 {
            dirty.push(entry);
        }
    }
}
