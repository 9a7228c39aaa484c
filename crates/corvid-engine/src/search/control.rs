//! Search control: stop flag, time limits and node limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::search::SearchLimits;

/// Controls when a search should stop.
///
/// The stop flag is read at every node; the clock only every 2048 nodes.
/// Supports three kinds of limit, any of which may be absent:
/// - **hard** time limit: abort the running iteration
/// - **soft** time limit: do not start another iteration
/// - **node** limit: abort once a thread has visited that many nodes
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    start: Instant,
    soft_limit: Option<Duration>,
    hard_limit: Option<Duration>,
    node_limit: Option<u64>,
}

impl SearchControl {
    /// Control with no limits; only the external stop flag ends the search.
    pub fn new_infinite(stopped: Arc<AtomicBool>) -> Self {
        Self {
            stopped,
            start: Instant::now(),
            soft_limit: None,
            hard_limit: None,
            node_limit: None,
        }
    }

    /// Control with time limits; the clock starts immediately.
    pub fn new_timed(stopped: Arc<AtomicBool>, soft: Duration, hard: Duration) -> Self {
        Self {
            soft_limit: Some(soft),
            hard_limit: Some(hard),
            ..Self::new_infinite(stopped)
        }
    }

    /// Build control from search limits.
    ///
    /// A move time becomes the hard limit; the soft limit is half of it, so
    /// an iteration is not started when it is unlikely to finish.
    pub fn from_limits(limits: &SearchLimits, stopped: Arc<AtomicBool>) -> Self {
        let mut control = match limits.movetime {
            Some(movetime) => Self::new_timed(stopped, movetime / 2, movetime),
            None => Self::new_infinite(stopped),
        };
        control.node_limit = limits.nodes;
        control
    }

    /// Check whether the search should abort immediately.
    ///
    /// Returns `true` if the stop flag is set, the node limit is reached, or
    /// (every 2048 nodes) the hard limit has passed. Limits that fire set
    /// the stop flag so other threads see it.
    pub fn should_stop(&self, nodes: u64) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }

        if let Some(limit) = self.node_limit
            && nodes >= limit
        {
            self.stop();
            return true;
        }

        if nodes & 2047 != 0 {
            return false;
        }

        if let Some(hard) = self.hard_limit
            && self.elapsed() >= hard
        {
            self.stop();
            return true;
        }

        false
    }

    /// Check whether iterative deepening should start a new iteration.
    pub fn should_stop_iterating(&self) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }

        match self.soft_limit {
            Some(soft) => self.elapsed() >= soft,
            None => false,
        }
    }

    /// Raise the stop flag.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Return `true` once the stop flag has been raised.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Elapsed time since the control was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl std::fmt::Debug for SearchControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchControl")
            .field("stopped", &self.is_stopped())
            .field("soft_limit", &self.soft_limit)
            .field("hard_limit", &self.hard_limit)
            .field("node_limit", &self.node_limit)
            .finish()
    }
}
