//! Negamax alpha-beta search with quiescence.

use chess::ChessMove;
use corvid_core::Position;

use crate::eval::Evaluator;
use crate::search::SearchStats;
use crate::search::control::SearchControl;
use crate::search::heuristics::{HistoryTable, KillerTable};
use crate::search::node::SearchNode;
use crate::search::ordering::MovePicker;
use crate::search::tt::{Bound, TranspositionTable};

/// Score representing an unreachable upper/lower bound.
pub const INF: i32 = 10_000_000;

/// Base score for checkmate (adjusted by ply for mate distance).
pub const MATE_SCORE: i32 = 1_000_000;

/// Maximum search depth (in plies) for array sizing and recursion limits.
pub const MAX_PLY: usize = 64;

/// Scores above this threshold indicate a forced mate.
pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY as i32;

/// Negamax alpha-beta search.
///
/// Returns the best score for the side to move. The principal variation is
/// collected into `ctx.pv`. When the search is stopped the return value is
/// meaningless and `ctx.aborted` is set.
pub(super) fn negamax(
    node: &SearchNode<'_>,
    depth: u8,
    mut alpha: i32,
    mut beta: i32,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    debug_assert!(alpha < beta, "empty window at ply {}", node.ply);

    let ply = node.ply;
    ctx.pv.clear_ply(ply);

    // Leaf node: drop into quiescence search
    if depth == 0 {
        return qsearch(node, alpha, beta, ctx);
    }

    ctx.stats.nodes += 1;

    if ctx.control.should_stop(ctx.stats.nodes) {
        ctx.aborted = true;
        return 0;
    }

    if !node.is_root() {
        if is_repetition(node, ctx.game_history) {
            return 0;
        }
        // Checkmate on the move that reaches the fifty-move mark still counts.
        if node.position.halfmove_clock() >= 100 {
            return if is_checkmate(&node.position) {
                -MATE_SCORE + ply as i32
            } else {
                0
            };
        }
    }

    let hash = node.position.hash();

    let mut tt_move = None;
    if let Some(entry) = ctx.tt.lookup(hash, ply) {
        ctx.stats.tt_hits += 1;
        tt_move = entry.best_move;
        // The root always searches so that it produces a PV move.
        if !node.is_root() && entry.depth >= depth {
            match entry.bound {
                Bound::Exact => return entry.score,
                Bound::LowerBound => alpha = alpha.max(entry.score),
                Bound::UpperBound => beta = beta.min(entry.score),
                Bound::None => {}
            }
            if alpha >= beta {
                return entry.score;
            }
        }
    }

    let moves = node.position.legal_moves();

    // No legal moves: checkmate or stalemate
    if moves.is_empty() {
        return if node.position.in_check() {
            -MATE_SCORE + ply as i32
        } else {
            0
        };
    }

    let pv_move = ctx.prev_pv.move_at(ply, hash);
    let mut picker = MovePicker::new(
        &node.position,
        moves,
        ply,
        pv_move,
        tt_move,
        &ctx.killers,
        &ctx.history,
    );

    let original_alpha = alpha;
    let mut best_score = -INF;
    let mut best_move = None;
    let mut searched = 0;

    while let Some(mv) = picker.pick_next() {
        let (child_position, dirty) = node.position.play(mv);
        let child = node.child(child_position, dirty);
        let score = -negamax(&child, depth - 1, -beta, -alpha, ctx);

        if ctx.aborted {
            return 0;
        }
        searched += 1;

        if score > best_score {
            best_score = score;
            best_move = Some(mv);
            if score > alpha {
                alpha = score;
                ctx.pv.update(ply, mv);
            }
        }

        if alpha >= beta {
            ctx.stats.fail_high += 1;
            if searched == 1 {
                ctx.stats.fail_high_first += 1;
            }
            if node.position.is_quiet(mv) {
                ctx.killers.store(ply, mv);
                if let Some(piece) = node.position.piece_on(mv.get_source()) {
                    ctx.history
                        .reward(node.position.side_to_move(), piece, mv.get_dest(), depth);
                }
            }
            break;
        }
    }

    let bound = if best_score >= beta {
        Bound::LowerBound
    } else if best_score <= original_alpha {
        Bound::UpperBound
    } else {
        Bound::Exact
    };

    // A fail-low has no meaningful best move; keep the previous hint.
    let store_move = if bound == Bound::UpperBound {
        tt_move
    } else {
        best_move
    };
    ctx.tt.store(hash, store_move, best_score, depth, bound, ply);

    best_score
}

/// Quiescence search: resolve captures and promotions before evaluating.
///
/// Out of check the side to move may stand pat; in check every evasion is
/// searched and having none is mate. Fail-hard.
fn qsearch(node: &SearchNode<'_>, mut alpha: i32, beta: i32, ctx: &mut SearchContext<'_>) -> i32 {
    debug_assert!(alpha < beta, "empty window at ply {}", node.ply);

    ctx.stats.nodes += 1;
    ctx.stats.qnodes += 1;

    if ctx.control.should_stop(ctx.stats.nodes) {
        ctx.aborted = true;
        return 0;
    }

    // Ply ceiling to prevent runaway recursion
    if node.ply >= MAX_PLY - 1 {
        return ctx.evaluate(node);
    }

    let in_check = node.position.in_check();
    let moves = node.position.legal_moves();

    if in_check && moves.is_empty() {
        return -MATE_SCORE + node.ply as i32;
    }
    if node.position.halfmove_clock() >= 100 {
        return 0;
    }

    if !in_check {
        // Stand-pat: the side to move can choose not to capture
        let stand_pat = ctx.evaluate(node);
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
    }

    let mut picker = MovePicker::new_qsearch(&node.position, moves, in_check);

    while let Some(mv) = picker.pick_next() {
        let (child_position, dirty) = node.position.play(mv);
        let child = node.child(child_position, dirty);
        let score = -qsearch(&child, -beta, -alpha, ctx);

        if ctx.aborted {
            return 0;
        }
        if score >= beta {
            return beta;
        }
        if score > alpha {
            alpha = score;
        }
    }

    alpha
}

/// Return `true` if `node`'s position occurred earlier with the same side
/// to move, either on the search path or in the game before the root.
fn is_repetition(node: &SearchNode<'_>, game_history: &[u64]) -> bool {
    let hash = node.position.hash();
    node.ancestors()
        .skip(1)
        .map(|ancestor| ancestor.position.hash())
        .chain(game_history.iter().rev().copied())
        .skip(1)
        .step_by(2)
        .any(|earlier| earlier == hash)
}

fn is_checkmate(position: &Position) -> bool {
    position.in_check() && position.legal_moves().is_empty()
}

/// Search `position` to `depth` with a full window from a fresh root node.
pub(super) fn search_root(position: &Position, depth: u8, ctx: &mut SearchContext<'_>) -> i32 {
    let root = SearchNode::root(*position);
    negamax(&root, depth, -INF, INF, ctx)
}

/// Triangular PV table for collecting principal variation lines.
///
/// Each row `ply` contains the PV continuation from that ply onward.
pub struct PvTable {
    moves: [[Option<ChessMove>; MAX_PLY]; MAX_PLY],
    len: [usize; MAX_PLY],
}

impl PvTable {
    /// Create an empty PV table.
    pub fn new() -> Self {
        Self {
            moves: [[None; MAX_PLY]; MAX_PLY],
            len: [0; MAX_PLY],
        }
    }

    /// Clear the PV line at `ply` (called at the top of each node).
    pub fn clear_ply(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.len[ply] = 0;
        }
    }

    /// Update the PV at `ply`: `pv[ply] = [mv] ++ pv[ply + 1]`, truncated
    /// at `MAX_PLY`.
    pub fn update(&mut self, ply: usize, mv: ChessMove) {
        if ply >= MAX_PLY {
            return;
        }

        self.moves[ply][0] = Some(mv);

        let child_ply = ply + 1;
        if child_ply < MAX_PLY {
            let copy_len = self.len[child_ply].min(MAX_PLY - 1 - ply);

            // Use split_at_mut for safe simultaneous borrow of two rows
            let (top, bottom) = self.moves.split_at_mut(child_ply);
            top[ply][1..1 + copy_len].copy_from_slice(&bottom[0][..copy_len]);

            self.len[ply] = 1 + copy_len;
        } else {
            self.len[ply] = 1;
        }
    }

    /// The principal variation from the root.
    pub fn root_line(&self) -> Vec<ChessMove> {
        self.moves[0][..self.len[0]].iter().flatten().copied().collect()
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Principal variation of the previous completed iteration, keyed by the
/// hash of the position each move was played from.
#[derive(Debug, Clone, Default)]
pub struct PrevPv {
    entries: Vec<(u64, ChessMove)>,
}

impl PrevPv {
    /// Replace the stored line by replaying `line` from `root`.
    pub fn rebuild(&mut self, root: &Position, line: &[ChessMove]) {
        self.entries.clear();
        let mut position = *root;
        for &mv in line {
            self.entries.push((position.hash(), mv));
            position = position.play(mv).0;
        }
    }

    /// The stored move for `ply`, if the position there hashes to `hash`.
    pub fn move_at(&self, ply: usize, hash: u64) -> Option<ChessMove> {
        match self.entries.get(ply) {
            Some(&(stored, mv)) if stored == hash => Some(mv),
            _ => None,
        }
    }
}

/// Search state threaded through negamax calls. One per thread.
pub(crate) struct SearchContext<'a> {
    /// Transposition table (shared, lockless).
    pub tt: &'a TranspositionTable,
    /// Search control (stop flag + limits).
    pub control: &'a SearchControl,
    /// Leaf evaluator.
    pub evaluator: &'a Evaluator,
    /// Check every NNUE evaluation against a from-scratch one.
    pub validate_nnue: bool,
    /// Hashes of the game positions before the root, oldest first.
    pub game_history: &'a [u64],
    /// Principal variation table for the running iteration.
    pub pv: PvTable,
    /// Line of the last completed iteration.
    pub prev_pv: PrevPv,
    /// Killer moves per ply.
    pub killers: KillerTable,
    /// Quiet move history.
    pub history: HistoryTable,
    /// Counters.
    pub stats: SearchStats,
    /// Set when the control asked the search to stop.
    pub aborted: bool,
}

impl<'a> SearchContext<'a> {
    /// Fresh per-thread state.
    pub fn new(
        tt: &'a TranspositionTable,
        control: &'a SearchControl,
        evaluator: &'a Evaluator,
        validate_nnue: bool,
        game_history: &'a [u64],
    ) -> Self {
        Self {
            tt,
            control,
            evaluator,
            validate_nnue,
            game_history,
            pv: PvTable::new(),
            prev_pv: PrevPv::default(),
            killers: KillerTable::new(),
            history: HistoryTable::new(),
            stats: SearchStats::default(),
            aborted: false,
        }
    }

    /// Static evaluation of `node` for the side to move.
    #[inline]
    fn evaluate(&mut self, node: &SearchNode<'_>) -> i32 {
        self.evaluator
            .evaluate(node, &mut self.stats.eval, self.validate_nnue)
    }
}
