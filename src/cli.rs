//! Command-line arguments.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use corvid_core::{Position, STARTING_FEN};
use corvid_engine::search::tt::DEFAULT_ENTRIES;
use corvid_engine::{SearchConfig, SearchLimits};

/// Search one chess position and print the best move.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    /// Starting position in FEN.
    #[arg(long, default_value = STARTING_FEN)]
    pub fen: String,

    /// Moves played from the starting position before searching, in UCI notation.
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    pub moves: Vec<String>,

    /// Deepest iteration to run.
    #[arg(long, default_value_t = 63, value_parser = clap::value_parser!(u8).range(1..=63))]
    pub depth: u8,

    /// Wall-clock budget in milliseconds.
    #[arg(long)]
    pub movetime: Option<u64>,

    /// Node budget per search thread.
    #[arg(long)]
    pub nodes: Option<u64>,

    /// Search threads, including the main one.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub threads: usize,

    /// Transposition table slots (rounded down to a power of two).
    #[arg(long, default_value_t = DEFAULT_ENTRIES)]
    pub hash_entries: usize,

    /// Evaluate with an NNUE network generated from this seed instead of
    /// the classical evaluator.
    #[arg(long)]
    pub nnue_seed: Option<u64>,

    /// Check every incremental NNUE evaluation against a full recompute.
    #[arg(long)]
    pub validate_nnue: bool,
}

impl Options {
    /// Budget for the search.
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            depth: self.depth,
            nodes: self.nodes,
            movetime: self.movetime.map(Duration::from_millis),
        }
    }

    /// Searcher settings.
    pub fn config(&self) -> SearchConfig {
        SearchConfig {
            tt_entries: self.hash_entries,
            threads: self.threads,
            validate_nnue: self.validate_nnue,
        }
    }

    /// Build the root position and the hashes of the positions before it.
    pub fn position(&self) -> Result<(Position, Vec<u64>)> {
        let mut position =
            Position::from_fen(&self.fen).with_context(|| format!("invalid FEN '{}'", self.fen))?;
        let mut history = Vec::with_capacity(self.moves.len());

        for text in &self.moves {
            let mv = position
                .parse_move(text)
                .with_context(|| format!("cannot play '{text}' in {position}"))?;
            history.push(position.hash());
            position = position.play(mv).0;
        }

        Ok((position, history))
    }
}
