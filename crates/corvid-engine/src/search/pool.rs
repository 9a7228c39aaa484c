//! Lazy SMP: helper threads sharing the transposition table.

use corvid_core::Position;
use tracing::debug;

use crate::eval::Evaluator;
use crate::search::control::SearchControl;
use crate::search::negamax::SearchContext;
use crate::search::tt::TranspositionTable;
use crate::search::{SearchConfig, SearchResult, SearchStats, iterative_deepening};

/// Run a Lazy SMP search with `config.threads` threads.
///
/// The calling thread is the main thread: it reports iterations through
/// `on_iter` and its last completed iteration is the result. Helpers run
/// silent iterative deepening that only feeds the shared table. Uses
/// `std::thread::scope`, so nothing needs to be reference counted.
#[allow(clippy::too_many_arguments)]
pub(super) fn search_smp<F>(
    tt: &TranspositionTable,
    evaluator: &Evaluator,
    config: &SearchConfig,
    position: &Position,
    max_depth: u8,
    control: &SearchControl,
    history: &[u64],
    on_iter: F,
) -> SearchResult
where
    F: FnMut(&SearchResult),
{
    let validate = config.validate_nnue;

    std::thread::scope(|s| {
        let helpers: Vec<_> = (1..config.threads)
            .map(|thread_id| {
                s.spawn(move || {
                    run_helper(
                        thread_id,
                        tt,
                        evaluator,
                        validate,
                        position,
                        max_depth,
                        control,
                        history,
                    )
                })
            })
            .collect();

        let mut ctx = SearchContext::new(tt, control, evaluator, validate, history);
        let mut result = iterative_deepening(&mut ctx, position, 1, max_depth, on_iter);

        // The main thread's result is final; helpers stop with it.
        control.stop();

        for handle in helpers {
            match handle.join() {
                Ok(stats) => result.stats = result.stats.merged(stats),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }

        result
    })
}

/// Silent helper thread. Returns its counters.
#[allow(clippy::too_many_arguments)]
fn run_helper(
    thread_id: usize,
    tt: &TranspositionTable,
    evaluator: &Evaluator,
    validate: bool,
    position: &Position,
    max_depth: u8,
    control: &SearchControl,
    history: &[u64],
) -> SearchStats {
    let mut ctx = SearchContext::new(tt, control, evaluator, validate, history);

    // Odd helpers skip depth 1 so threads diverge early.
    let start_depth = 1 + (thread_id % 2) as u8;

    let result = iterative_deepening(&mut ctx, position, start_depth, max_depth, |_| {});
    debug!(thread_id, depth = result.depth, nodes = result.stats.nodes, "helper finished");

    result.stats
}
