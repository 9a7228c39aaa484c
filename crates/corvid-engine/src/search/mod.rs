//! Iterative-deepening search, move ordering and search state.

pub mod control;
pub mod heuristics;
pub mod negamax;
pub mod node;
pub mod ordering;
pub mod pool;
pub mod tt;

use std::time::Duration;

use chess::ChessMove;
use corvid_core::Position;
use tracing::{debug, info};

use crate::eval::Evaluator;
use crate::eval::nnue::EvalStats;
use control::SearchControl;
use negamax::{MAX_PLY, SearchContext};
use tt::{DEFAULT_ENTRIES, TranspositionTable};

/// Searcher-wide settings, fixed for the searcher's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Transposition table slots (rounded down to a power of two).
    pub tt_entries: usize,
    /// Search threads, including the main one.
    pub threads: usize,
    /// Check every incremental NNUE evaluation against a full recompute.
    pub validate_nnue: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tt_entries: DEFAULT_ENTRIES,
            threads: 1,
            validate_nnue: false,
        }
    }
}

/// Per-search budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLimits {
    /// Deepest iteration to run (clamped to `1..=MAX_PLY - 1`).
    pub depth: u8,
    /// Per-thread node budget.
    pub nodes: Option<u64>,
    /// Wall-clock budget.
    pub movetime: Option<Duration>,
}

impl SearchLimits {
    /// Depth-only limits.
    pub fn depth(depth: u8) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            depth: (MAX_PLY - 1) as u8,
            nodes: None,
            movetime: None,
        }
    }
}

/// Search counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes visited, quiescence nodes included.
    pub nodes: u64,
    /// Quiescence nodes visited.
    pub qnodes: u64,
    /// Hash-validated transposition table hits.
    pub tt_hits: u64,
    /// Beta cutoffs.
    pub fail_high: u64,
    /// Beta cutoffs caused by the first move searched.
    pub fail_high_first: u64,
    /// NNUE accumulator work.
    pub eval: EvalStats,
}

impl SearchStats {
    /// Sum of two counter sets.
    pub fn merged(self, other: SearchStats) -> SearchStats {
        SearchStats {
            nodes: self.nodes + other.nodes,
            qnodes: self.qnodes + other.qnodes,
            tt_hits: self.tt_hits + other.tt_hits,
            fail_high: self.fail_high + other.fail_high,
            fail_high_first: self.fail_high_first + other.fail_high_first,
            eval: self.eval.merged(other.eval),
        }
    }

    /// Share of cutoffs produced by the first move (move ordering quality).
    pub fn fail_high_first_ratio(&self) -> f64 {
        if self.fail_high == 0 {
            0.0
        } else {
            self.fail_high_first as f64 / self.fail_high as f64
        }
    }
}

/// Result of a search.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Best move of the deepest completed iteration. `None` if the root has
    /// no legal move or no iteration completed.
    pub best_move: Option<ChessMove>,
    /// Score in centipawns from the side to move's perspective.
    pub score: i32,
    /// Deepest completed iteration.
    pub depth: u8,
    /// Principal variation of that iteration.
    pub pv: Vec<ChessMove>,
    /// Counters, including aborted work.
    pub stats: SearchStats,
}

/// Space-separated UCI rendering of a move list.
pub fn format_pv(pv: &[ChessMove]) -> String {
    pv.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

/// Iterative-deepening searcher with transposition table.
pub struct Searcher {
    tt: TranspositionTable,
    evaluator: Evaluator,
    config: SearchConfig,
}

impl Searcher {
    /// Create a searcher with a fresh transposition table.
    pub fn new(config: SearchConfig, evaluator: Evaluator) -> Self {
        Self {
            tt: TranspositionTable::new(config.tt_entries),
            evaluator,
            config,
        }
    }

    /// Clear the transposition table (preserving the allocation).
    pub fn clear_tt(&self) {
        self.tt.clear();
    }

    /// Run iterative deepening from `position`.
    ///
    /// `history` holds the hashes of the game positions before `position`,
    /// oldest first, for repetition detection. `on_iter` is called after
    /// every completed iteration. Killer and history tables start empty on
    /// every call; the transposition table persists.
    ///
    /// With more than one thread, the control's stop flag is raised once the
    /// main thread finishes so that helpers wind down.
    pub fn search<F>(
        &self,
        position: &Position,
        limits: &SearchLimits,
        control: &SearchControl,
        history: &[u64],
        mut on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(&SearchResult),
    {
        // A depth of 0 still runs one iteration so that a move is reported.
        let max_depth = limits.depth.clamp(1, (MAX_PLY - 1) as u8);
        let report = |result: &SearchResult| {
            log_iteration(result);
            on_iter(result);
        };

        let result = if self.config.threads <= 1 {
            let mut ctx = SearchContext::new(
                &self.tt,
                control,
                &self.evaluator,
                self.config.validate_nnue,
                history,
            );
            iterative_deepening(&mut ctx, position, 1, max_depth, report)
        } else {
            pool::search_smp(
                &self.tt,
                &self.evaluator,
                &self.config,
                position,
                max_depth,
                control,
                history,
                report,
            )
        };

        info!(
            depth = result.depth,
            score = result.score,
            nodes = result.stats.nodes,
            best = %result.best_move.map_or_else(|| "(none)".to_owned(), |mv| mv.to_string()),
            elapsed_ms = control.elapsed().as_millis() as u64,
            "search finished"
        );

        result
    }
}

fn log_iteration(result: &SearchResult) {
    let stats = &result.stats;
    info!(
        depth = result.depth,
        score = result.score,
        nodes = stats.nodes,
        qnodes = stats.qnodes,
        tt_hits = stats.tt_hits,
        fh = stats.fail_high,
        fhf = stats.fail_high_first_ratio(),
        nn_updates = stats.eval.updates,
        nn_refreshes = stats.eval.refreshes,
        pv = %format_pv(&result.pv),
        "iteration complete"
    );
}

/// Iterations `start_depth..=max_depth` on one thread.
///
/// Returns the last completed iteration; an aborted iteration only
/// contributes its counters.
fn iterative_deepening<F>(
    ctx: &mut SearchContext<'_>,
    position: &Position,
    start_depth: u8,
    max_depth: u8,
    mut on_iter: F,
) -> SearchResult
where
    F: FnMut(&SearchResult),
{
    let mut result = SearchResult::default();

    for depth in start_depth..=max_depth {
        // Check soft limit before starting a new iteration
        if ctx.control.should_stop_iterating() {
            break;
        }

        let score = negamax::search_root(position, depth, ctx);

        // If search was aborted mid-iteration, discard this iteration's result
        if ctx.aborted {
            debug!(depth, nodes = ctx.stats.nodes, "iteration aborted");
            break;
        }

        let pv = ctx.pv.root_line();
        result.best_move = pv.first().copied();
        result.score = score;
        result.depth = depth;
        result.pv = pv;
        result.stats = ctx.stats;

        ctx.prev_pv.rebuild(position, &result.pv);
        on_iter(&result);

        // Checkmate or stalemate at the root: deeper iterations change nothing.
        if result.best_move.is_none() {
            break;
        }
    }

    result.stats = ctx.stats;
    result
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("tt", &self.tt)
            .field("evaluator", &self.evaluator)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(SearchConfig::default(), Evaluator::default())
    }
}
