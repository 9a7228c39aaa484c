//! Tapered material and piece-square evaluation.
//!
//! Every term is a middlegame/endgame pair blended by the game phase
//! (remaining non-pawn material). Terms are computed from White's point of
//! view and negated for Black to move.

use chess::{ALL_COLORS, ALL_PIECES, Color, Piece};
use corvid_core::Position;

/// Middlegame / endgame pair.
type Term = (i32, i32);

/// Base material values indexed by [`Piece::to_index`].
///
/// | Piece  | mg  | eg  |
/// |--------|-----|-----|
/// | Pawn   | 100 | 120 |
/// | Knight | 320 | 310 |
/// | Bishop | 330 | 320 |
/// | Rook   | 500 | 520 |
/// | Queen  | 900 | 950 |
/// | King   |   0 |   0 |
const MATERIAL: [Term; 6] = [(100, 120), (320, 310), (330, 320), (500, 520), (900, 950), (0, 0)];

const BISHOP_PAIR: Term = (50, 60);

/// Phase weights: Knight=1, Bishop=1, Rook=2, Queen=4.
const PHASE_WEIGHT: [i32; 6] = [0, 1, 1, 2, 4, 0];

/// Phase of the starting position.
pub const MAX_PHASE: i32 = 24;

/// Steps from the nearest edge, summed over file and rank (0 in a corner, 6 in the centre).
#[inline]
fn centrality(sq: usize) -> i32 {
    let (file, rank) = ((sq % 8) as i32, (sq / 8) as i32);
    file.min(7 - file) + rank.min(7 - rank)
}

/// Positional bonus for `piece` on `sq`, given in its owner's frame
/// (rank 0 is the owner's back rank).
fn square_bonus(piece: Piece, sq: usize) -> Term {
    let rank = (sq / 8) as i32;
    let file = (sq % 8) as i32;
    let centre = centrality(sq);

    match piece {
        Piece::Pawn => {
            let central_file = i32::from((2..=5).contains(&file));
            (5 * (rank - 1) + 10 * central_file * i32::from(rank >= 3), 12 * (rank - 1))
        }
        Piece::Knight => (8 * centre - 20, 6 * centre - 18),
        Piece::Bishop => (4 * centre - 10, 4 * centre - 10),
        Piece::Rook => {
            if rank == 6 {
                (20, 15)
            } else {
                (0, 0)
            }
        }
        Piece::Queen => (2 * centre - 5, 4 * centre - 10),
        Piece::King => {
            let shelter = if rank == 0 { 20 } else { -(15 * rank).min(45) };
            (shelter, 8 * centre - 24)
        }
    }
}

/// Game phase in `0..=MAX_PHASE`, clamped so promotions cannot exceed it.
pub fn game_phase(position: &Position) -> i32 {
    let phase: i32 = ALL_PIECES
        .iter()
        .map(|&piece| {
            let count = position.board().pieces(piece).popcnt() as i32;
            PHASE_WEIGHT[piece.to_index()] * count
        })
        .sum();
    phase.min(MAX_PHASE)
}

fn side_terms(position: &Position, color: Color) -> Term {
    let (mut mg, mut eg) = (0, 0);
    let flip = if color == Color::White { 0 } else { 56 };

    for piece in ALL_PIECES {
        let (mat_mg, mat_eg) = MATERIAL[piece.to_index()];
        for sq in position.pieces(piece, color) {
            let (sq_mg, sq_eg) = square_bonus(piece, sq.to_index() ^ flip);
            mg += mat_mg + sq_mg;
            eg += mat_eg + sq_eg;
        }
    }

    if position.pieces(Piece::Bishop, color).popcnt() >= 2 {
        mg += BISHOP_PAIR.0;
        eg += BISHOP_PAIR.1;
    }

    (mg, eg)
}

/// Static evaluation in centipawns from the side to move's perspective.
pub fn evaluate(position: &Position) -> i32 {
    let (mut mg, mut eg) = (0, 0);
    for color in ALL_COLORS {
        let (side_mg, side_eg) = side_terms(position, color);
        let sign = if color == Color::White { 1 } else { -1 };
        mg += sign * side_mg;
        eg += sign * side_eg;
    }

    let phase = game_phase(position);
    let white_score = (mg * phase + eg * (MAX_PHASE - phase)) / MAX_PHASE;

    match position.side_to_move() {
        Color::White => white_score,
        Color::Black => -white_score,
    }
}
