//! Immutable-per-ply position with copy-make move application.

use std::fmt;
use std::str::FromStr;

use chess::{BitBoard, Board, ChessMove, Color, EMPTY, File, MoveGen, Piece, Rank, Square};

use crate::dirty::{DirtyPiece, DirtyPieces};
use crate::error::PositionError;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A chess position as seen by the search.
///
/// Wraps a [`chess::Board`] and adds the halfmove clock, which the board
/// type does not track. Copy-make: [`play`](Position::play) returns a new
/// position and leaves `self` untouched.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Position {
    board: Board,
    halfmove_clock: u16,
}

impl Position {
    /// Return the standard starting position.
    pub fn startpos() -> Position {
        Position {
            board: Board::default(),
            halfmove_clock: 0,
        }
    }

    /// Parse a position from FEN.
    ///
    /// The halfmove clock is read from the fifth field when present and
    /// defaults to 0 otherwise.
    pub fn from_fen(fen: &str) -> Result<Position, PositionError> {
        let board = Board::from_str(fen).map_err(|_| PositionError::InvalidFen {
            fen: fen.to_owned(),
        })?;

        let halfmove_clock = match fen.split_whitespace().nth(4) {
            Some(field) => field
                .parse()
                .map_err(|_| PositionError::InvalidHalfmoveClock {
                    found: field.to_owned(),
                })?,
            None => 0,
        };

        Ok(Position {
            board,
            halfmove_clock,
        })
    }

    /// The underlying board.
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Side to move.
    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Zobrist hash, including side to move, castling and en passant state.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.board.get_hash()
    }

    /// Plies since the last capture or pawn move.
    #[inline]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    /// Square of `color`'s king.
    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.board.king_square(color)
    }

    /// Bitboard of `color`'s pieces of kind `piece`.
    #[inline]
    pub fn pieces(&self, piece: Piece, color: Color) -> BitBoard {
        *self.board.pieces(piece) & *self.board.color_combined(color)
    }

    /// Piece kind on `sq`, if any.
    #[inline]
    pub fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.board.piece_on(sq)
    }

    /// Owner of the piece on `sq`, if any.
    #[inline]
    pub fn color_on(&self, sq: Square) -> Option<Color> {
        self.board.color_on(sq)
    }

    /// Total number of pieces on the board, kings included.
    #[inline]
    pub fn piece_count(&self) -> u32 {
        self.board.combined().popcnt()
    }

    /// Number of pieces on the board excluding both kings.
    #[inline]
    pub fn non_king_piece_count(&self) -> u32 {
        self.piece_count() - 2
    }

    /// Return `true` if either side still has a queen.
    #[inline]
    pub fn has_queens(&self) -> bool {
        *self.board.pieces(Piece::Queen) != EMPTY
    }

    /// Return `true` if the side to move is in check.
    #[inline]
    pub fn in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    /// All legal moves in this position.
    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    /// Return `true` if `mv` is an en passant capture.
    pub fn is_en_passant(&self, mv: ChessMove) -> bool {
        self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
            && self.board.piece_on(mv.get_dest()).is_none()
    }

    /// Piece captured by `mv`, if any.
    pub fn captured_piece(&self, mv: ChessMove) -> Option<Piece> {
        match self.board.piece_on(mv.get_dest()) {
            Some(victim) => Some(victim),
            None if self.is_en_passant(mv) => Some(Piece::Pawn),
            None => None,
        }
    }

    /// Return `true` if `mv` neither captures nor promotes.
    pub fn is_quiet(&self, mv: ChessMove) -> bool {
        mv.get_promotion().is_none() && self.captured_piece(mv).is_none()
    }

    /// Apply a legal move, returning the child position and the placement
    /// changes that separate it from `self`.
    ///
    /// If the source square is empty (not a legal move), `self` is returned
    /// unchanged with an empty delta.
    pub fn play(&self, mv: ChessMove) -> (Position, DirtyPieces) {
        let us = self.side_to_move();
        let them = !us;
        let src = mv.get_source();
        let dst = mv.get_dest();

        let Some(moving) = self.board.piece_on(src) else {
            return (*self, DirtyPieces::EMPTY);
        };
        let captured = self.board.piece_on(dst);

        let mut dirty = DirtyPieces::EMPTY;
        let file_distance = src.get_file().to_index().abs_diff(dst.get_file().to_index());

        if moving == Piece::King && file_distance == 2 {
            dirty.push(DirtyPiece {
                piece: Piece::King,
                color: us,
                from: Some(src),
                to: Some(dst),
            });

            let (rook_from, rook_to) = if dst.get_file().to_index() > src.get_file().to_index() {
                (File::H, File::F)
            } else {
                (File::A, File::D)
            };
            let rank = src.get_rank();
            dirty.push(DirtyPiece {
                piece: Piece::Rook,
                color: us,
                from: Some(Square::make_square(rank, rook_from)),
                to: Some(Square::make_square(rank, rook_to)),
            });
        } else if moving == Piece::Pawn && file_distance != 0 && captured.is_none() {
            // En passant: the victim stands beside the source, on the destination file.
            dirty.push(DirtyPiece {
                piece: Piece::Pawn,
                color: us,
                from: Some(src),
                to: Some(dst),
            });
            dirty.push(DirtyPiece {
                piece: Piece::Pawn,
                color: them,
                from: Some(Square::make_square(src.get_rank(), dst.get_file())),
                to: None,
            });
        } else {
            if let Some(victim) = captured {
                dirty.push(DirtyPiece {
                    piece: victim,
                    color: them,
                    from: Some(dst),
                    to: None,
                });
            }

            match mv.get_promotion() {
                Some(promoted) => {
                    dirty.push(DirtyPiece {
                        piece: Piece::Pawn,
                        color: us,
                        from: Some(src),
                        to: None,
                    });
                    dirty.push(DirtyPiece {
                        piece: promoted,
                        color: us,
                        from: None,
                        to: Some(dst),
                    });
                }
                None => dirty.push(DirtyPiece {
                    piece: moving,
                    color: us,
                    from: Some(src),
                    to: Some(dst),
                }),
            }
        }

        let halfmove_clock = if moving == Piece::Pawn || captured.is_some() {
            0
        } else {
            self.halfmove_clock.saturating_add(1)
        };

        let child = Position {
            board: self.board.make_move_new(mv),
            halfmove_clock,
        };
        (child, dirty)
    }

    /// Parse a move in UCI long algebraic notation and check it is legal here.
    pub fn parse_move(&self, text: &str) -> Result<ChessMove, PositionError> {
        let malformed = || PositionError::MalformedMove {
            text: text.to_owned(),
        };

        let bytes = text.as_bytes();
        if bytes.len() != 4 && bytes.len() != 5 {
            return Err(malformed());
        }

        let src = square_from_ascii(bytes[0], bytes[1]).ok_or_else(malformed)?;
        let dst = square_from_ascii(bytes[2], bytes[3]).ok_or_else(malformed)?;
        let promotion = match bytes.get(4) {
            None => None,
            Some(b'q') => Some(Piece::Queen),
            Some(b'r') => Some(Piece::Rook),
            Some(b'b') => Some(Piece::Bishop),
            Some(b'n') => Some(Piece::Knight),
            Some(_) => return Err(malformed()),
        };

        let mv = ChessMove::new(src, dst, promotion);
        if !self.board.legal(mv) {
            return Err(PositionError::IllegalMove {
                text: text.to_owned(),
                fen: self.to_string(),
            });
        }
        Ok(mv)
    }
}

/// Decode `b'e', b'4'` style coordinates.
fn square_from_ascii(file: u8, rank: u8) -> Option<Square> {
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    ))
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl FromStr for Position {
    type Err = PositionError;

    fn from_str(fen: &str) -> Result<Self, Self::Err> {
        Position::from_fen(fen)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.board)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position(\"{}\")", self.board)
    }
}
