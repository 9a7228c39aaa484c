//! Position collaborator for corvid: board state, move application, and the
//! per-move piece deltas consumed by the incremental evaluator.

mod dirty;
mod error;
mod position;

pub use dirty::{DirtyPiece, DirtyPieces};
pub use error::PositionError;
pub use position::{Position, STARTING_FEN};

pub use chess::{BitBoard, ChessMove, Color, Piece, Square};
