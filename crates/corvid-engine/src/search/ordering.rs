//! Move ordering: PV move, TT move, MVV-LVA, killers, history.

use chess::{ChessMove, Piece};
use corvid_core::Position;

use crate::search::heuristics::{HistoryTable, KillerTable};

/// MVV-LVA scores indexed by `[victim][attacker]`.
///
/// Weights: Pawn=1, Knight=3, Bishop=3, Rook=5, Queen=9, King=0.
/// Formula: `victim_weight * 16 - attacker_weight`.
const MVV_LVA: [[i64; 6]; 6] = [
    // victim = Pawn (weight 1)
    [15, 13, 13, 11, 7, 16],
    // victim = Knight (weight 3)
    [47, 45, 45, 43, 39, 48],
    // victim = Bishop (weight 3)
    [47, 45, 45, 43, 39, 48],
    // victim = Rook (weight 5)
    [79, 77, 77, 75, 71, 80],
    // victim = Queen (weight 9)
    [143, 141, 141, 139, 135, 144],
    // victim = King (weight 0)
    [-1, -3, -3, -5, -9, 0],
];

// Key bands, highest searched first. Each band sits above everything the
// band below can produce.
const PV_MOVE: i64 = 1 << 62;
const TT_MOVE: i64 = 1 << 61;
const TACTICAL: i64 = 1 << 60;
const KILLER: i64 = 1 << 59;
const HISTORY_CAP: u64 = 1 << 58;

/// MVV-LVA plus promotion bonus. Only meaningful for captures and promotions.
pub fn tactical_score(position: &Position, mv: ChessMove) -> i64 {
    let mut score = 0;
    if let Some(victim) = position.captured_piece(mv) {
        let attacker = position.piece_on(mv.get_source()).unwrap_or(Piece::Pawn);
        score += MVV_LVA[victim.to_index()][attacker.to_index()];
    }
    if mv.get_promotion() == Some(Piece::Queen) {
        score += 150;
    }
    score
}

/// Incremental move picker using selection sort.
///
/// Yields moves in descending key order.
pub struct MovePicker {
    moves: Vec<ChessMove>,
    keys: Vec<i64>,
    cursor: usize,
}

impl MovePicker {
    /// Picker for the main search at `ply`.
    ///
    /// `pv_move` is the previous iteration's PV move for this node (already
    /// matched against the node's hash), `tt_move` the transposition move.
    pub fn new(
        position: &Position,
        moves: Vec<ChessMove>,
        ply: usize,
        pv_move: Option<ChessMove>,
        tt_move: Option<ChessMove>,
        killers: &KillerTable,
        history: &HistoryTable,
    ) -> Self {
        let stm = position.side_to_move();
        let keys = moves
            .iter()
            .map(|&mv| {
                if Some(mv) == pv_move {
                    PV_MOVE
                } else if Some(mv) == tt_move {
                    TT_MOVE
                } else if !position.is_quiet(mv) {
                    TACTICAL + tactical_score(position, mv)
                } else if let Some(rank) = killers.rank(ply, mv) {
                    KILLER - rank as i64
                } else {
                    let piece = position.piece_on(mv.get_source()).unwrap_or(Piece::Pawn);
                    history.score(stm, piece, mv.get_dest()).min(HISTORY_CAP) as i64
                }
            })
            .collect();

        Self {
            moves,
            keys,
            cursor: 0,
        }
    }

    /// Picker for quiescence search.
    ///
    /// Out of check only captures, en passant and promotions are kept; in
    /// check every evasion is kept, tactical ones first.
    pub fn new_qsearch(position: &Position, mut moves: Vec<ChessMove>, in_check: bool) -> Self {
        if !in_check {
            moves.retain(|&mv| !position.is_quiet(mv));
        }
        let keys = moves
            .iter()
            .map(|&mv| {
                if position.is_quiet(mv) {
                    0
                } else {
                    TACTICAL + tactical_score(position, mv)
                }
            })
            .collect();

        Self {
            moves,
            keys,
            cursor: 0,
        }
    }

    /// Yield the next highest-keyed move via selection sort.
    pub fn pick_next(&mut self) -> Option<ChessMove> {
        if self.cursor >= self.moves.len() {
            return None;
        }

        let mut best_idx = self.cursor;
        for i in (self.cursor + 1)..self.moves.len() {
            if self.keys[i] > self.keys[best_idx] {
                best_idx = i;
            }
        }

        self.moves.swap(self.cursor, best_idx);
        self.keys.swap(self.cursor, best_idx);

        let mv = self.moves[self.cursor];
        self.cursor += 1;
        Some(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{Color, Square};

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn mv(text: &str, position: &Position) -> ChessMove {
        position.parse_move(text).unwrap()
    }

    fn drain(mut picker: MovePicker) -> Vec<ChessMove> {
        std::iter::from_fn(|| picker.pick_next()).collect()
    }

    #[test]
    fn pawn_takes_queen_scores_higher_than_queen_takes_pawn() {
        assert!(
            MVV_LVA[Piece::Queen.to_index()][Piece::Pawn.to_index()]
                > MVV_LVA[Piece::Pawn.to_index()][Piece::Queen.to_index()]
        );
    }

    #[test]
    fn picker_yields_all_moves_in_starting_position() {
        let p = Position::startpos();
        let picker = MovePicker::new(
            &p,
            p.legal_moves(),
            0,
            None,
            None,
            &KillerTable::new(),
            &HistoryTable::new(),
        );
        assert_eq!(drain(picker).len(), 20);
    }

    #[test]
    fn pv_move_then_tt_move_come_first() {
        // Queen on d4 can take the e5 pawn, which would otherwise lead.
        let p = pos("4k3/8/8/4p3/3Q4/8/8/4K3 w - - 0 1");
        let pv = mv("e1f2", &p);
        let tt = mv("d4a4", &p);

        let order = drain(MovePicker::new(
            &p,
            p.legal_moves(),
            0,
            Some(pv),
            Some(tt),
            &KillerTable::new(),
            &HistoryTable::new(),
        ));
        assert_eq!(order[0], pv);
        assert_eq!(order[1], tt);
        assert_eq!(order[2], mv("d4e5", &p), "capture follows the hash moves");
    }

    #[test]
    fn captures_then_killers_then_history() {
        let p = pos("4k3/8/8/4p3/3Q4/8/8/4K3 w - - 0 1");
        let capture = mv("d4e5", &p);
        let older_killer = mv("e1d2", &p);
        let newer_killer = mv("e1d1", &p);
        let favoured_quiet = mv("d4a7", &p);

        let mut history = HistoryTable::new();
        history.reward(Color::White, Piece::Queen, Square::A7, 10);
        let mut killers = KillerTable::new();
        killers.store(2, older_killer);
        killers.store(2, newer_killer);
        // Killers from another ply do not count here.
        killers.store(3, mv("e1f1", &p));

        let order = drain(MovePicker::new(&p, p.legal_moves(), 2, None, None, &killers, &history));
        assert_eq!(order[0], capture);
        assert_eq!(order[1], newer_killer);
        assert_eq!(order[2], older_killer);
        assert_eq!(order[3], favoured_quiet);
    }

    #[test]
    fn mvv_lva_prefers_bigger_victim() {
        // Pawn on d4 can take a knight on c5 or a queen on e5.
        let p = pos("4k3/8/8/2n1q3/3P4/8/8/7K w - - 0 1");
        let order = drain(MovePicker::new_qsearch(&p, p.legal_moves(), false));
        assert_eq!(order, vec![mv("d4e5", &p), mv("d4c5", &p)]);
    }

    #[test]
    fn qsearch_picker_empty_on_starting_position() {
        let p = Position::startpos();
        let mut picker = MovePicker::new_qsearch(&p, p.legal_moves(), false);
        assert!(picker.pick_next().is_none());
    }

    #[test]
    fn qsearch_picker_includes_en_passant_and_promotions() {
        let p = pos("4k3/1P6/8/3pP3/8/8/8/4K3 w - d6 0 1");
        let order = drain(MovePicker::new_qsearch(&p, p.legal_moves(), false));
        assert_eq!(order[0], mv("b7b8q", &p), "queen promotion leads");
        assert!(order.contains(&mv("e5d6", &p)), "en passant is tactical");
        assert_eq!(order.len(), 5, "four promotions and one en passant capture");
    }

    #[test]
    fn qsearch_picker_keeps_all_evasions_in_check() {
        let p = pos("4k3/8/8/8/8/8/3q4/4K3 w - - 0 1");
        let all = p.legal_moves().len();
        let order = drain(MovePicker::new_qsearch(&p, p.legal_moves(), true));
        assert_eq!(order.len(), all);
        assert_eq!(order[0], mv("e1d2", &p), "capturing the checker comes first");
    }
}
