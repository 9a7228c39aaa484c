//! Search and evaluation for corvid.

pub mod eval;
pub mod search;

pub use eval::Evaluator;
pub use eval::nnue::{Network, NetworkError};
pub use search::control::SearchControl;
pub use search::negamax::{INF, MATE_SCORE, MATE_THRESHOLD, MAX_PLY};
pub use search::{SearchConfig, SearchLimits, SearchResult, SearchStats, Searcher, format_pv};
