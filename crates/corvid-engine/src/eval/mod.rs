//! Static evaluation: a classical tapered evaluator and an incrementally
//! updated NNUE evaluator.

pub mod classical;
pub mod nnue;

use std::sync::Arc;

use corvid_core::Position;

use self::nnue::{EvalStats, Network};
use crate::search::node::SearchNode;

/// Evaluator used at the leaves of the search.
#[derive(Debug, Clone, Default)]
pub enum Evaluator {
    /// Tapered material and piece-square terms.
    #[default]
    Classical,
    /// Neural network with per-node accumulators.
    Nnue(Arc<Network>),
}

impl Evaluator {
    /// Score `node` from the side to move's perspective.
    ///
    /// The NNUE variant reuses accumulators along the node's parent chain and
    /// records its work in `stats`.
    pub fn evaluate(&self, node: &SearchNode<'_>, stats: &mut EvalStats, validate: bool) -> i32 {
        match self {
            Evaluator::Classical => classical::evaluate(&node.position),
            Evaluator::Nnue(network) => nnue::evaluate(network, node, stats, validate),
        }
    }

    /// Score `position` from scratch, without any node state.
    pub fn evaluate_position(&self, position: &Position) -> i32 {
        match self {
            Evaluator::Classical => classical::evaluate(position),
            Evaluator::Nnue(network) => nnue::evaluate_position(network, position),
        }
    }
}
