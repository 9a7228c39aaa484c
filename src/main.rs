mod cli;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use clap::Parser;
use corvid_engine::{Evaluator, Network, SearchControl, Searcher, format_pv};
use tracing::{info, warn};

use crate::cli::Options;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let options = Options::parse();
    let (position, history) = options.position()?;
    let limits = options.limits();
    let config = options.config();

    if config.validate_nnue && options.nnue_seed.is_none() {
        warn!("--validate-nnue has no effect without --nnue-seed");
    }

    let evaluator = match options.nnue_seed {
        Some(seed) => Evaluator::Nnue(Arc::new(Network::seeded(seed))),
        None => Evaluator::Classical,
    };

    info!(
        fen = %position,
        threads = config.threads,
        tt_entries = config.tt_entries,
        nnue = options.nnue_seed.is_some(),
        "corvid starting"
    );

    let searcher = Searcher::new(config, evaluator);
    let control = SearchControl::from_limits(&limits, Arc::new(AtomicBool::new(false)));
    let result = searcher.search(&position, &limits, &control, &history, |_| {});

    match result.best_move {
        Some(best) => println!("bestmove {best}"),
        None => println!("bestmove (none)"),
    }
    println!("score {} depth {} nodes {}", result.score, result.depth, result.stats.nodes);
    println!("pv {}", format_pv(&result.pv));

    Ok(())
}
