//! King-bucketed feature index mapping for NNUE evaluation.
//!
//! Layout per perspective (736 inputs):
//! - Own pawns..queens:       `kind * 64 + sq`            (0..320)
//! - Own king, half-board:    `320 + 4 * rank + file`     (320..352)
//! - Opponent pawns..queens:  `352 + kind * 64 + sq`      (352..672)
//! - Opponent king:           `672 + sq`                  (672..736)
//!
//! Squares are file-mirrored when the perspective's king stands on files
//! e-h, so the own king always lands on files a-d, and rank-mirrored for
//! the Black perspective.

use chess::{ALL_COLORS, Color, Piece, Square};
use corvid_core::Position;

/// Number of network inputs per perspective.
pub const INPUTS: usize = 5 * 64 + 32 + 5 * 64 + 64;

const OWN_KING_OFFSET: usize = 5 * 64;
const THEIR_OFFSET: usize = 5 * 64 + 32;

const NON_KING_PIECES: [Piece; 5] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
];

/// Return `true` if `color`'s king stands on files a-d.
#[inline]
pub fn king_on_left_half(position: &Position, color: Color) -> bool {
    position.king_square(color).get_file().to_index() < 4
}

/// XOR mask applied to square indices for `perspective`.
#[inline]
fn flip_mask(position: &Position, perspective: Color) -> usize {
    let mut mask = 0;
    if !king_on_left_half(position, perspective) {
        mask |= 0b000111;
    }
    if perspective == Color::Black {
        mask |= 0b111000;
    }
    mask
}

#[inline]
fn own_king_bucket(relative: usize) -> usize {
    let (rank, file) = (relative / 8, relative % 8);
    debug_assert!(file < 4, "own king must be mirrored onto files a-d");
    4 * rank + file
}

/// Active feature indices of `position` seen from `perspective`.
pub fn position_features(position: &Position, perspective: Color) -> Vec<usize> {
    let mask = flip_mask(position, perspective);
    let mut features = Vec::with_capacity(32);

    for color in ALL_COLORS {
        let offset = if color == perspective { 0 } else { THEIR_OFFSET };

        for piece in NON_KING_PIECES {
            let base = offset + piece.to_index() * 64;
            for sq in position.pieces(piece, color) {
                features.push(base + (sq.to_index() ^ mask));
            }
        }

        let king = position.king_square(color).to_index() ^ mask;
        if color == perspective {
            features.push(OWN_KING_OFFSET + own_king_bucket(king));
        } else {
            features.push(THEIR_OFFSET + OWN_KING_OFFSET + king);
        }
    }

    features
}

/// Feature index of a single piece placement, mirrored according to
/// `position` (the node whose accumulator is being built).
///
/// Agrees with [`position_features`] for every piece on the board.
#[inline]
pub fn dirty_piece_feature_index(
    piece: Piece,
    color: Color,
    square: Square,
    position: &Position,
    perspective: Color,
) -> usize {
    let relative = square.to_index() ^ flip_mask(position, perspective);

    let mut index = if piece == Piece::King && color == perspective {
        OWN_KING_OFFSET + own_king_bucket(relative)
    } else {
        piece.to_index() * 64 + relative
    };

    if color != perspective {
        index += THEIR_OFFSET;
    }

    debug_assert!(index < INPUTS, "feature index {index} out of range");
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn inputs_is_736() {
        assert_eq!(INPUTS, 736);
    }

    #[test]
    fn startpos_has_32_distinct_features() {
        let p = Position::startpos();
        for perspective in ALL_COLORS {
            let mut features = sorted(position_features(&p, perspective));
            assert_eq!(features.len(), 32);
            features.dedup();
            assert_eq!(features.len(), 32, "features must be distinct");
            assert!(features.iter().all(|&f| f < INPUTS));
        }
    }

    #[test]
    fn full_and_per_piece_paths_agree() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "6k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1",
        ];

        for fen in fens {
            let p = pos(fen);
            for perspective in ALL_COLORS {
                let mut per_piece = Vec::new();
                for sq in *p.board().combined() {
                    let piece = p.piece_on(sq).unwrap();
                    let color = p.color_on(sq).unwrap();
                    per_piece.push(dirty_piece_feature_index(piece, color, sq, &p, perspective));
                }
                assert_eq!(
                    sorted(position_features(&p, perspective)),
                    sorted(per_piece),
                    "paths disagree for {fen} from {perspective:?}"
                );
            }
        }
    }

    #[test]
    fn file_mirror_when_king_on_right_half() {
        let right = pos("4k3/8/8/8/8/8/4P3/6K1 w - - 0 1");
        let left = pos("3k4/8/8/8/8/8/3P4/1K6 w - - 0 1");
        for perspective in ALL_COLORS {
            assert_eq!(
                sorted(position_features(&right, perspective)),
                sorted(position_features(&left, perspective)),
                "file-mirrored positions should share features from {perspective:?}"
            );
        }
    }

    #[test]
    fn black_perspective_is_rank_mirror_of_white() {
        let white = pos("4k3/8/8/8/8/8/4P3/6K1 w - - 0 1");
        let black = pos("6k1/4p3/8/8/8/8/8/4K3 b - - 0 1");
        assert_eq!(
            sorted(position_features(&white, Color::White)),
            sorted(position_features(&black, Color::Black)),
        );
    }
}
