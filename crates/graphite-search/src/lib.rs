//! Search drivers for Graphite.
//!
//! Two coupled drivers share the board, the evaluator, and the cooperative
//! [`StopFlag`]:
//!
//! - [`alphabeta`] - iterative-deepening PVS negamax with a lock-free
//!   transposition table, quiescence, and the usual pruning family
//! - [`mcts`] - a PUCT Monte-Carlo tree search with virtual-loss worker
//!   parallelism
//!
//! The [`time`] module turns clock information into per-move budgets, and
//! [`probes`] pins down the opening-book and tablebase collaborator
//! interfaces.

pub mod alphabeta;
pub mod mcts;
pub mod probes;
pub mod time;
pub mod tt;

mod ordering;

use graphite_core::Move;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Mate score magnitude; actual mate scores are `MATE - ply_to_mate`.
pub const MATE: i32 = 30_000;
/// Scores at or beyond this magnitude are mate scores.
pub const MATE_BOUND: i32 = MATE - 512;
/// Larger than any reachable score.
pub const INFINITY: i32 = 31_000;
/// Deepest ply the searchers will reach.
pub const MAX_PLY: usize = 128;
/// Cap on iterative-deepening depth.
pub const MAX_DEPTH: u32 = 64;

/// Search-related failures.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("transposition table allocation failed ({0} MiB requested)")]
    ResourceExhausted(usize),
}

/// Which driver answers `go`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDriver {
    AlphaBeta,
    Mcts,
}

/// Engine-wide configuration, owned by the caller and passed by reference
/// to the search entry points. There is no process-wide mutable state
/// besides the transposition table, which is itself an explicit resource.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Transposition table size in MiB.
    pub hash_mb: usize,
    /// Worker threads: Lazy SMP helpers for alpha-beta, simulation workers
    /// for MCTS.
    pub threads: usize,
    pub driver: SearchDriver,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hash_mb: 128,
            threads: 1,
            driver: SearchDriver::AlphaBeta,
        }
    }
}

/// Limits for one `go` request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchLimits {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u32>,
    pub movetime: Option<u64>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub infinite: bool,
}

impl SearchLimits {
    /// Limits for a fixed-depth search.
    pub fn depth(depth: u32) -> Self {
        SearchLimits {
            depth: Some(depth),
            ..Default::default()
        }
    }
}

/// Shared cooperative cancellation flag. Searches poll it every ~4096
/// nodes and at iteration boundaries; anyone holding a clone may set it.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Progress for one completed iteration (or the final MCTS summary).
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub depth: u32,
    pub score: i32,
    pub nodes: u64,
    pub elapsed_ms: u64,
    pub pv: Vec<Move>,
    pub hashfull: Option<u32>,
}

/// Final outcome of a search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// `None` when the position has no legal moves.
    pub best_move: Option<Move>,
    pub score: i32,
    pub nodes: u64,
    pub depth: u32,
    pub pv: Vec<Move>,
}

/// True for scores inside the mate window.
#[inline]
pub fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_BOUND
}

/// Signed full-move distance to mate for UCI `score mate` reporting, if
/// `score` is a mate score.
pub fn mate_distance(score: i32) -> Option<i32> {
    if !is_mate_score(score) {
        return None;
    }
    let plies = MATE - score.abs();
    let moves = (plies + 1) / 2;
    Some(if score > 0 { moves } else { -moves })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_distance_reporting() {
        assert_eq!(mate_distance(MATE - 1), Some(1));
        assert_eq!(mate_distance(MATE - 2), Some(1));
        assert_eq!(mate_distance(MATE - 3), Some(2));
        assert_eq!(mate_distance(-(MATE - 2)), Some(-1));
        assert_eq!(mate_distance(150), None);
        assert_eq!(mate_distance(-150), None);
    }

    #[test]
    fn stop_flag_is_shared() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_stopped());
        clone.stop();
        assert!(flag.is_stopped());
        flag.reset();
        assert!(!clone.is_stopped());
    }
}
