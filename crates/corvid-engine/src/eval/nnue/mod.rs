//! Incrementally updated NNUE evaluation.
//!
//! Every search node owns an [`EvalContext`] holding one accumulator per
//! perspective. Accumulators start dirty and are filled lazily on
//! evaluation, either from the closest ancestor with a clean accumulator
//! (replaying the dirty pieces in between) or by a full refresh when that
//! is cheaper or the perspective's king changed board half.

mod accumulator;
mod features;
mod network;

use std::ptr;

use chess::{ALL_COLORS, Color};
use corvid_core::{DirtyPieces, Position};

use crate::search::node::SearchNode;

pub use self::accumulator::Accumulator;
pub use self::features::{INPUTS, dirty_piece_feature_index, king_on_left_half, position_features};
pub use self::network::{HIDDEN, NUM_VARIANTS, Network, NetworkError};

/// Accumulator work counters for one search thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Accumulators derived from an ancestor.
    pub updates: u64,
    /// Accumulators rebuilt from scratch.
    pub refreshes: u64,
}

impl EvalStats {
    /// Sum of two counter sets.
    pub fn merged(self, other: EvalStats) -> EvalStats {
        EvalStats {
            updates: self.updates + other.updates,
            refreshes: self.refreshes + other.refreshes,
        }
    }
}

/// Per-node NNUE state.
#[derive(Debug, Clone)]
pub struct EvalContext {
    accumulators: [Accumulator; 2],
    dirty: [bool; 2],
    dirty_pieces: DirtyPieces,
    score: Option<i32>,
}

impl EvalContext {
    /// Fresh context for a node reached through `dirty_pieces`.
    pub fn new(dirty_pieces: DirtyPieces) -> Self {
        Self {
            accumulators: [Accumulator::ZERO; 2],
            dirty: [true; 2],
            dirty_pieces,
            score: None,
        }
    }

    /// Return `true` if the accumulator for `perspective` has not been computed.
    #[inline]
    pub fn is_dirty(&self, perspective: Color) -> bool {
        self.dirty[perspective.to_index()]
    }

    /// Placement changes relative to the parent node.
    #[inline]
    pub fn dirty_pieces(&self) -> &DirtyPieces {
        &self.dirty_pieces
    }

    /// Accumulator for `perspective`. Meaningless while dirty.
    #[inline]
    pub fn accumulator(&self, perspective: Color) -> &Accumulator {
        &self.accumulators[perspective.to_index()]
    }

    /// Cached network output, if evaluated.
    #[inline]
    pub fn cached_score(&self) -> Option<i32> {
        self.score
    }
}

/// Output head for `position`: queen presence and piece-count bucket.
pub fn network_variant(position: &Position) -> usize {
    const PIECE_COUNT_BUCKETS: usize = 8;
    let piece_bucket = (position.non_king_piece_count() as usize / 4).min(PIECE_COUNT_BUCKETS - 1);
    let queen_bucket = usize::from(position.has_queens());
    queen_bucket * PIECE_COUNT_BUCKETS + piece_bucket
}

/// Evaluate `position` from scratch, ignoring any node state.
///
/// Returns centipawns from the side to move's perspective.
pub fn evaluate_position(network: &Network, position: &Position) -> i32 {
    let stm = position.side_to_move();
    let own = network.refresh(&position_features(position, stm));
    let their = network.refresh(&position_features(position, !stm));
    network.run(&own, &their, network_variant(position))
}

/// Evaluate `node`, reusing ancestor accumulators where possible.
///
/// With `validate` set the cached score is ignored and the result is
/// checked against [`evaluate_position`].
pub fn evaluate(
    network: &Network,
    node: &SearchNode<'_>,
    stats: &mut EvalStats,
    validate: bool,
) -> i32 {
    if !validate && let Some(score) = node.eval.borrow().score {
        return score;
    }

    let position = &node.position;
    let refresh_cost = position.piece_count() as usize;

    for perspective in ALL_COLORS {
        let king_side = king_on_left_half(position, perspective);

        // Closest node on the path to the root with a usable accumulator.
        let mut update_cost = 0;
        let mut prev: Option<&SearchNode<'_>> = None;
        for ancestor in node.ancestors() {
            let ctx = ancestor.eval.borrow();

            update_cost += ctx.dirty_pieces.len();
            if update_cost > refresh_cost {
                break;
            }

            if king_on_left_half(&ancestor.position, perspective) != king_side {
                break;
            }

            if !ctx.is_dirty(perspective) {
                prev = Some(ancestor);
                break;
            }
        }

        match (prev, node.parent) {
            (Some(prev), _) if ptr::eq(prev, node) => {}
            (Some(prev), Some(parent))
                if !ptr::eq(prev, parent) && parent.eval.borrow().is_dirty(perspective) =>
            {
                // Fill the parent first so siblings can reuse it.
                update_accumulator(network, Some(prev), parent, perspective, stats);
                update_accumulator(network, Some(parent), node, perspective, stats);
            }
            _ => update_accumulator(network, prev, node, perspective, stats),
        }
    }

    let stm = position.side_to_move();
    let mut ctx = node.eval.borrow_mut();
    let output = network.run(
        &ctx.accumulators[stm.to_index()],
        &ctx.accumulators[(!stm).to_index()],
        network_variant(position),
    );

    if validate {
        let reference = evaluate_position(network, position);
        assert_eq!(output, reference, "incremental NNUE output diverged for {position}");
        if let Some(cached) = ctx.score {
            assert_eq!(cached, output, "cached NNUE output is stale for {position}");
        }
    }

    ctx.score = Some(output);
    output
}

fn update_accumulator(
    network: &Network,
    prev: Option<&SearchNode<'_>>,
    node: &SearchNode<'_>,
    perspective: Color,
    stats: &mut EvalStats,
) {
    debug_assert!(node.eval.borrow().is_dirty(perspective));

    let accumulator = match prev {
        Some(prev) => {
            debug_assert!(!ptr::eq(prev, node));
            let base = {
                let prev_ctx = prev.eval.borrow();
                assert!(
                    !prev_ctx.is_dirty(perspective),
                    "incremental update from a dirty accumulator"
                );
                prev_ctx.accumulators[perspective.to_index()]
            };

            let mut added = Vec::new();
            let mut removed = Vec::new();
            for ancestor in node.ancestors().take_while(|a| !ptr::eq(*a, prev)) {
                for dirty in ancestor.eval.borrow().dirty_pieces.iter() {
                    if let Some(to) = dirty.to {
                        added.push(dirty_piece_feature_index(
                            dirty.piece,
                            dirty.color,
                            to,
                            &node.position,
                            perspective,
                        ));
                    }
                    if let Some(from) = dirty.from {
                        removed.push(dirty_piece_feature_index(
                            dirty.piece,
                            dirty.color,
                            from,
                            &node.position,
                            perspective,
                        ));
                    }
                }
            }

            cancel_common(&mut added, &mut removed);
            stats.updates += 1;

            if added.is_empty() && removed.is_empty() {
                base
            } else {
                network.update(&base, &added, &removed)
            }
        }
        None => {
            stats.refreshes += 1;
            network.refresh(&position_features(&node.position, perspective))
        }
    };

    let mut ctx = node.eval.borrow_mut();
    ctx.accumulators[perspective.to_index()] = accumulator;
    ctx.dirty[perspective.to_index()] = false;
}

/// Drop every feature that appears in both lists (once per pairing).
fn cancel_common(added: &mut Vec<usize>, removed: &mut Vec<usize>) {
    let mut i = 0;
    while i < added.len() {
        match removed.iter().position(|&r| r == added[i]) {
            Some(j) => {
                added.swap_remove(i);
                removed.swap_remove(j);
            }
            None => i += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    /// Play `moves` from `node`, evaluating every node along the way in
    /// validation mode. Returns the stats accumulated along the line.
    fn play_line(net: &Network, node: &SearchNode<'_>, moves: &[&str], stats: &mut EvalStats) {
        let Some((first, rest)) = moves.split_first() else {
            return;
        };
        let mv = node.position.parse_move(first).unwrap();
        let (child_pos, dirty) = node.position.play(mv);
        let child = node.child(child_pos, dirty);
        let score = evaluate(net, &child, stats, true);
        assert_eq!(score, evaluate_position(net, &child.position));
        play_line(net, &child, rest, stats);
    }

    #[test]
    fn cancel_common_removes_pairs_once() {
        let mut added = vec![1, 2, 2, 3];
        let mut removed = vec![2, 4, 1];
        cancel_common(&mut added, &mut removed);
        added.sort_unstable();
        assert_eq!(added, vec![2, 3]);
        assert_eq!(removed, vec![4]);
    }

    #[test]
    fn variant_buckets() {
        assert_eq!(network_variant(&Position::startpos()), 8 + 7);
        assert_eq!(network_variant(&pos("4k3/8/8/8/8/8/8/4K2R w - - 0 1")), 0);
        assert_eq!(network_variant(&pos("4k3/8/8/8/8/8/PPPP4/3QK3 w - - 0 1")), 8 + 1);
    }

    #[test]
    fn root_refreshes_then_child_updates() {
        let net = Network::seeded(3);
        let mut stats = EvalStats::default();
        let root = SearchNode::root(Position::startpos());

        let root_score = evaluate(&net, &root, &mut stats, true);
        assert_eq!(root_score, evaluate_position(&net, &root.position));
        assert_eq!(stats, EvalStats { updates: 0, refreshes: 2 });

        let mv = root.position.parse_move("g1f3").unwrap();
        let (p, dirty) = root.position.play(mv);
        let child = root.child(p, dirty);
        evaluate(&net, &child, &mut stats, true);
        assert_eq!(stats, EvalStats { updates: 2, refreshes: 2 });
    }

    #[test]
    fn cached_score_skips_work() {
        let net = Network::seeded(3);
        let mut stats = EvalStats::default();
        let root = SearchNode::root(Position::startpos());

        let first = evaluate(&net, &root, &mut stats, false);
        let second = evaluate(&net, &root, &mut stats, false);
        assert_eq!(first, second);
        assert_eq!(stats.refreshes, 2, "second call must hit the cache");
        assert_eq!(root.eval.borrow().cached_score(), Some(first));
    }

    #[test]
    fn two_stage_update_fills_parent() {
        let net = Network::seeded(5);
        let mut stats = EvalStats::default();
        let root = SearchNode::root(Position::startpos());
        evaluate(&net, &root, &mut stats, true);

        let (p1, d1) = root.position.play(root.position.parse_move("e2e4").unwrap());
        let child = root.child(p1, d1);
        let (p2, d2) = child.position.play(child.position.parse_move("e7e5").unwrap());
        let grandchild = child.child(p2, d2);

        evaluate(&net, &grandchild, &mut stats, true);

        for perspective in ALL_COLORS {
            assert!(!child.eval.borrow().is_dirty(perspective), "parent should be filled");
        }
        assert_eq!(stats, EvalStats { updates: 4, refreshes: 2 });
        assert_eq!(
            *child.eval.borrow().accumulator(Color::White),
            net.refresh(&position_features(&child.position, Color::White))
        );
    }

    #[test]
    fn king_crossing_forces_refresh_for_that_side_only() {
        let net = Network::seeded(9);
        let mut stats = EvalStats::default();
        let root = SearchNode::root(pos("4k3/8/8/8/8/8/3P4/4K2R w - - 0 1"));
        evaluate(&net, &root, &mut stats, true);

        let (p, dirty) = root.position.play(root.position.parse_move("e1d1").unwrap());
        let child = root.child(p, dirty);
        evaluate(&net, &child, &mut stats, true);

        assert_eq!(stats, EvalStats { updates: 1, refreshes: 3 });
    }

    #[test]
    fn long_span_exceeds_refresh_cost() {
        let net = Network::seeded(11);
        let mut stats = EvalStats::default();
        let root = SearchNode::root(pos("k7/8/8/8/8/8/8/K6R w - - 0 1"));
        evaluate(&net, &root, &mut stats, true);

        let (p1, d1) = root.position.play(root.position.parse_move("h1h2").unwrap());
        let n1 = root.child(p1, d1);
        let (p2, d2) = n1.position.play(n1.position.parse_move("a8b8").unwrap());
        let n2 = n1.child(p2, d2);
        let (p3, d3) = n2.position.play(n2.position.parse_move("h2h3").unwrap());
        let n3 = n2.child(p3, d3);
        let (p4, d4) = n3.position.play(n3.position.parse_move("b8a8").unwrap());
        let n4 = n3.child(p4, d4);

        // Four single-piece deltas against a three-piece board.
        evaluate(&net, &n4, &mut stats, true);
        assert_eq!(stats, EvalStats { updates: 0, refreshes: 4 });
    }

    #[test]
    fn special_moves_stay_in_sync() {
        let net = Network::seeded(13);
        let mut stats = EvalStats::default();
        let root = SearchNode::root(pos("r3k2r/1P6/8/3pP3/8/8/6p1/R3K2R w KQkq d6 0 1"));
        evaluate(&net, &root, &mut stats, true);

        // En passant, castling on both wings (white's king changes half), capture-promotions.
        play_line(&net, &root, &["e5d6", "e8g8", "e1c1", "g2h1q", "b7a8q"], &mut stats);
        assert!(stats.refreshes > 2, "king crossings should trigger refreshes");
        assert!(stats.updates > 0);
    }
}
