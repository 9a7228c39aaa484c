//! Per-ply search frame linked to its parent.

use std::cell::RefCell;

use corvid_core::{DirtyPieces, Position};

use crate::eval::nnue::EvalContext;
use crate::search::negamax::MAX_PLY;

/// One node on the current search path.
///
/// Lives in the recursion frame that created it; `parent` borrows the
/// caller's frame, so the chain from any node back to the root is always
/// valid while the node exists.
pub struct SearchNode<'a> {
    /// Position at this node.
    pub position: Position,
    /// Caller's node, `None` at the root.
    pub parent: Option<&'a SearchNode<'a>>,
    /// Distance from the root.
    pub ply: usize,
    /// NNUE accumulators and the delta from `parent`.
    pub eval: RefCell<EvalContext>,
}

impl<'a> SearchNode<'a> {
    /// Root node of a search.
    pub fn root(position: Position) -> Self {
        Self {
            position,
            parent: None,
            ply: 0,
            eval: RefCell::new(EvalContext::new(DirtyPieces::EMPTY)),
        }
    }

    /// Child of `self` reached through a move producing `dirty_pieces`.
    pub fn child(&'a self, position: Position, dirty_pieces: DirtyPieces) -> SearchNode<'a> {
        debug_assert!(self.ply + 1 < MAX_PLY, "search path deeper than MAX_PLY");
        SearchNode {
            position,
            parent: Some(self),
            ply: self.ply + 1,
            eval: RefCell::new(EvalContext::new(dirty_pieces)),
        }
    }

    /// `self` followed by each ancestor up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &SearchNode<'a>> {
        std::iter::successors(Some(self), |node| node.parent)
    }

    /// Return `true` if `self` is the root of the search.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
