//! Iterative-deepening alpha-beta search.
//!
//! A PVS negamax with transposition table, quiescence, null-move and
//! futility pruning, late-move reductions, and killer/history ordering.
//! The driver deepens from depth 1 until the time budget, the node cap, a
//! stable mate score, or the depth limit ends the search. With
//! `config.threads > 1` identical Lazy SMP helpers run alongside the main
//! thread, sharing only the transposition table and the stop flag.

use crate::ordering::{mvv_lva, see, History, Killers};
use crate::time::{TimeBudget, TimeManager};
use crate::tt::{Bound, TranspositionTable};
use crate::{
    EngineConfig, SearchLimits, SearchReport, SearchResult, StopFlag, INFINITY, MATE, MATE_BOUND,
    MAX_DEPTH, MAX_PLY,
};
use graphite_board::{generate_captures, generate_legal, MoveList, Position};
use graphite_core::{Move, MoveFlag};
use graphite_eval::{Accumulator, Evaluator};
use std::time::Instant;

const NODE_POLL_MASK: u64 = 4095;
const RFP_MARGIN_PER_PLY: i32 = 80;
const FUTILITY_MARGIN_PER_PLY: i32 = 120;

/// Runs an alpha-beta search and returns the best move found.
///
/// `on_iteration` fires after every completed iterative-deepening depth
/// with the principal variation so far.
pub fn search(
    pos: &Position,
    evaluator: &Evaluator,
    tt: &TranspositionTable,
    config: &EngineConfig,
    limits: &SearchLimits,
    stop: &StopFlag,
    on_iteration: &mut dyn FnMut(&SearchReport),
) -> SearchResult {
    tt.new_generation();
    let budget = TimeManager::allocate(limits, pos.side_to_move());

    if config.threads > 1 {
        std::thread::scope(|scope| {
            for id in 1..config.threads {
                let mut helper =
                    Searcher::new(pos.clone(), evaluator, tt, stop.clone(), limits, TimeBudget::UNLIMITED);
                scope.spawn(move || {
                    tracing::trace!(id, "helper thread started");
                    helper.iterate(&mut |_| {});
                });
            }
            let mut main = Searcher::new(pos.clone(), evaluator, tt, stop.clone(), limits, budget);
            let result = main.iterate(on_iteration);
            // Helpers run until the shared flag falls.
            stop.stop();
            result
        })
    } else {
        let mut main = Searcher::new(pos.clone(), evaluator, tt, stop.clone(), limits, budget);
        main.iterate(on_iteration)
    }
}

/// Normalizes a mate score for storage: ply-independent distance from the
/// root is re-based to distance from this node.
fn to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score + ply as i32
    } else if score <= -MATE_BOUND {
        score - ply as i32
    } else {
        score
    }
}

/// Inverse of [`to_tt`].
fn from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score - ply as i32
    } else if score <= -MATE_BOUND {
        score + ply as i32
    } else {
        score
    }
}

/// Moves the highest-scored remaining move to `index`.
fn pick(moves: &mut MoveList, scores: &mut [i32], index: usize) {
    let mut best = index;
    for j in index + 1..moves.len() {
        if scores[j] > scores[best] {
            best = j;
        }
    }
    moves.swap(index, best);
    scores.swap(index, best);
}

/// One search thread: an owned position plus per-thread killers and
/// history. The transposition table and stop flag are the only state
/// shared between threads.
struct Searcher<'a> {
    pos: Position,
    evaluator: &'a Evaluator,
    tt: &'a TranspositionTable,
    stop: StopFlag,
    killers: Killers,
    history: History,
    accumulator: Option<Accumulator>,
    nodes: u64,
    started: Instant,
    budget: TimeBudget,
    node_cap: Option<u64>,
    max_depth: u32,
    root_history: usize,
}

impl<'a> Searcher<'a> {
    fn new(
        pos: Position,
        evaluator: &'a Evaluator,
        tt: &'a TranspositionTable,
        stop: StopFlag,
        limits: &SearchLimits,
        budget: TimeBudget,
    ) -> Self {
        let accumulator = evaluator.network().map(|net| {
            let mut acc = Accumulator::new();
            acc.refresh(net, &pos);
            acc
        });
        let root_history = pos.history_len();
        Searcher {
            pos,
            evaluator,
            tt,
            stop,
            killers: Killers::new(),
            history: History::new(),
            accumulator,
            nodes: 0,
            started: Instant::now(),
            budget,
            node_cap: limits.nodes,
            max_depth: limits.depth.unwrap_or(MAX_DEPTH).min(MAX_DEPTH),
            root_history,
        }
    }

    fn iterate(&mut self, on_iteration: &mut dyn FnMut(&SearchReport)) -> SearchResult {
        let mut result = SearchResult {
            best_move: None,
            score: 0,
            nodes: 0,
            depth: 0,
            pv: Vec::new(),
        };

        let root_moves = generate_legal(&mut self.pos);
        if root_moves.is_empty() {
            result.score = if self.pos.in_check() { -MATE } else { 0 };
            return result;
        }
        result.best_move = Some(root_moves[0]);

        let mut previous_mate = None;
        for depth in 1..=self.max_depth {
            let (score, best) = self.search_root(depth as i32);
            let aborted = self.stop.is_stopped();
            if aborted && depth > 1 {
                break;
            }
            if let Some(mv) = best {
                result.best_move = Some(mv);
                result.score = score;
                result.depth = depth;
                result.pv = self.extract_pv(depth);
                result.nodes = self.nodes;
                on_iteration(&SearchReport {
                    depth,
                    score,
                    nodes: self.nodes,
                    elapsed_ms: self.started.elapsed().as_millis() as u64,
                    pv: result.pv.clone(),
                    hashfull: Some(self.tt.hashfull()),
                });
                tracing::debug!(depth, score, nodes = self.nodes, "iteration complete");
            }
            if aborted {
                break;
            }

            // A mate score stable across two iterations will not change.
            if score.abs() >= MATE_BOUND {
                if previous_mate == Some(score) {
                    break;
                }
                previous_mate = Some(score);
            } else {
                previous_mate = None;
            }

            if let Some(cap) = self.node_cap {
                if self.nodes >= cap {
                    break;
                }
            }
            // Do not start an iteration that is unlikely to finish.
            if let Some(soft) = self.budget.soft {
                if self.started.elapsed() * 2 >= soft {
                    break;
                }
            }
        }

        result.nodes = self.nodes;
        result
    }

    /// Principal-variation search over the root moves with a full window.
    fn search_root(&mut self, depth: i32) -> (i32, Option<Move>) {
        let mut moves = generate_legal(&mut self.pos);
        let tt_move = self
            .tt
            .probe(self.pos.hash())
            .map(|e| e.mv)
            .unwrap_or(Move::NULL);
        let mut scores = self.score_moves(&moves, tt_move, 0);

        let mut alpha = -INFINITY;
        let beta = INFINITY;
        let mut best = None;

        for i in 0..moves.len() {
            pick(&mut moves, &mut scores, i);
            let mv = moves[i];

            self.make(mv);
            let score = if i == 0 {
                -self.negamax(depth - 1, 1, -beta, -alpha, true)
            } else {
                let zw = -self.negamax(depth - 1, 1, -alpha - 1, -alpha, true);
                if zw > alpha && !self.stop.is_stopped() {
                    -self.negamax(depth - 1, 1, -beta, -alpha, true)
                } else {
                    zw
                }
            };
            self.unmake(mv);

            if self.stop.is_stopped() && best.is_some() {
                break;
            }
            if score > alpha {
                alpha = score;
                best = Some(mv);
            }
        }

        if let Some(mv) = best {
            if !self.stop.is_stopped() {
                self.tt
                    .store(self.pos.hash(), mv, to_tt(alpha, 0), depth as u8, Bound::Exact);
            }
        }
        (alpha, best)
    }

    fn negamax(&mut self, depth: i32, ply: usize, mut alpha: i32, mut beta: i32, allow_null: bool) -> i32 {
        self.visit_node();
        if self.stop.is_stopped() {
            return 0;
        }

        // Draws by rule cut immediately.
        if self.pos.halfmove_clock() >= 100 {
            return 0;
        }
        let (repetitions, repeated_in_search) = self.pos.repetitions(self.root_history);
        if repeated_in_search || repetitions >= 2 {
            return 0;
        }

        if ply >= MAX_PLY {
            return self.evaluate();
        }

        let is_pv = beta - alpha > 1;

        // Checks extend the horizon by one ply, so a king under attack is
        // never left to stand-pat quiescence.
        let in_check = self.pos.in_check();
        let depth = if in_check { depth + 1 } else { depth };

        let key = self.pos.hash();
        let mut tt_move = Move::NULL;
        if let Some(entry) = self.tt.probe(key) {
            tt_move = entry.mv;
            if !is_pv && i32::from(entry.depth) >= depth {
                let score = from_tt(entry.score, ply);
                match entry.bound {
                    Bound::Exact => return score,
                    Bound::Lower => alpha = alpha.max(score),
                    Bound::Upper => beta = beta.min(score),
                }
                if alpha >= beta {
                    return score;
                }
            }
        }

        if depth <= 0 {
            return self.quiescence(alpha, beta, ply);
        }

        let mut futile = false;

        if !is_pv && !in_check {
            let static_eval = self.evaluate();

            // Reverse futility: a comfortable static margin over beta near
            // the horizon fails high without searching.
            if depth <= 6 && static_eval - RFP_MARGIN_PER_PLY * depth >= beta {
                return static_eval;
            }

            // Null move: hand over the turn and search reduced. Skipped
            // with only king and pawns, where zugzwang breaks the logic.
            if allow_null
                && depth >= 3
                && self.pos.has_non_pawn_material(self.pos.side_to_move())
            {
                let reduction = 2 + depth / 6;
                self.pos.make_null();
                let score = -self.negamax(depth - 1 - reduction, ply + 1, -beta, -beta + 1, false);
                self.pos.unmake_null();
                if self.stop.is_stopped() {
                    return 0;
                }
                if score >= beta {
                    return beta;
                }
            }

            futile = depth <= 3 && static_eval + FUTILITY_MARGIN_PER_PLY * depth <= alpha;
        }

        let mut moves = generate_legal(&mut self.pos);
        if moves.is_empty() {
            return if in_check { -MATE + ply as i32 } else { 0 };
        }
        let mut scores = self.score_moves(&moves, tt_move, ply);

        let us = self.pos.side_to_move();
        let original_alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = Move::NULL;

        for i in 0..moves.len() {
            pick(&mut moves, &mut scores, i);
            let mv = moves[i];
            let quiet = self.is_quiet(mv);

            // Futile quiets are skipped once some move has been searched.
            if futile && quiet && !best_move.is_null() {
                continue;
            }

            self.make(mv);
            let gives_check = self.pos.in_check();
            let score = if i == 0 {
                -self.negamax(depth - 1, ply + 1, -beta, -alpha, true)
            } else {
                // Late quiet moves search reduced with a zero window and
                // re-search on fail-high.
                let mut reduction = 0;
                if quiet && depth >= 3 && i >= 4 && !in_check && !gives_check {
                    reduction = (1 + i as i32 / 8 + depth / 8).min(depth - 2);
                }
                let mut s = -self.negamax(depth - 1 - reduction, ply + 1, -alpha - 1, -alpha, true);
                if s > alpha && reduction > 0 {
                    s = -self.negamax(depth - 1, ply + 1, -alpha - 1, -alpha, true);
                }
                if s > alpha && s < beta {
                    s = -self.negamax(depth - 1, ply + 1, -beta, -alpha, true);
                }
                s
            };
            self.unmake(mv);

            if self.stop.is_stopped() {
                return 0;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
            }
            if score > alpha {
                alpha = score;
                if alpha >= beta {
                    if quiet {
                        self.killers.store(ply, mv);
                        self.history.reward(us, mv, depth);
                    }
                    break;
                }
            }
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else if alpha > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.tt
            .store(key, best_move, to_tt(best_score, ply), depth as u8, bound);

        best_score
    }

    /// Captures-and-promotions search below the horizon, bounded by
    /// stand-pat pruning rather than depth.
    fn quiescence(&mut self, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        self.visit_node();
        if self.stop.is_stopped() {
            return 0;
        }
        if ply >= MAX_PLY {
            return self.evaluate();
        }

        let stand_pat = self.evaluate();
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let mut captures = MoveList::new();
        generate_captures(&self.pos, &mut captures);
        let mut scores: Vec<i32> = captures.iter().map(|&m| mvv_lva(&self.pos, m)).collect();

        for i in 0..captures.len() {
            pick(&mut captures, &mut scores, i);
            let mv = captures[i];

            // Exchanges that lose material are not worth resolving.
            if !mv.flag().is_promotion() && see(&self.pos, mv) < 0 {
                continue;
            }
            // The capture list is pseudo-legal; make_move rejects illegal
            // entries.
            if !self.make(mv) {
                continue;
            }
            let score = -self.quiescence(-beta, -alpha, ply + 1);
            self.unmake(mv);
            if self.stop.is_stopped() {
                return 0;
            }
            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }

    fn score_moves(&self, moves: &MoveList, tt_move: Move, ply: usize) -> Vec<i32> {
        let killers = self.killers.at(ply);
        let us = self.pos.side_to_move();
        moves
            .iter()
            .map(|&mv| {
                if mv == tt_move {
                    2_000_000
                } else if self.is_capture(mv) {
                    let base = mvv_lva(&self.pos, mv);
                    if see(&self.pos, mv) >= 0 {
                        1_000_000 + base
                    } else {
                        10_000 + base
                    }
                } else if mv.flag().is_promotion() {
                    900_000
                } else if mv == killers[0] {
                    800_000
                } else if mv == killers[1] {
                    790_000
                } else {
                    self.history.get(us, mv)
                }
            })
            .collect()
    }

    #[inline]
    fn is_capture(&self, mv: Move) -> bool {
        mv.flag() == MoveFlag::EnPassant || self.pos.piece_on(mv.to()).is_some()
    }

    #[inline]
    fn is_quiet(&self, mv: Move) -> bool {
        !self.is_capture(mv) && !mv.flag().is_promotion()
    }

    /// Follows transposition-table best moves from the root to rebuild the
    /// principal variation.
    fn extract_pv(&mut self, depth: u32) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut visited = Vec::new();
        for _ in 0..depth {
            let Some(entry) = self.tt.probe(self.pos.hash()) else {
                break;
            };
            if entry.mv.is_null() || visited.contains(&self.pos.hash()) {
                break;
            }
            let legal = generate_legal(&mut self.pos);
            if !legal.iter().any(|&m| m == entry.mv) {
                break;
            }
            visited.push(self.pos.hash());
            self.pos.make_move(entry.mv);
            pv.push(entry.mv);
        }
        for &mv in pv.iter().rev() {
            self.pos.unmake_move(mv);
        }
        pv
    }

    fn make(&mut self, mv: Move) -> bool {
        if let (Some(acc), Some(net)) = (self.accumulator.as_mut(), self.evaluator.network()) {
            acc.push(net, &self.pos, mv);
        }
        if self.pos.make_move(mv) {
            true
        } else {
            if let (Some(acc), Some(net)) = (self.accumulator.as_mut(), self.evaluator.network()) {
                acc.pop(net);
            }
            false
        }
    }

    fn unmake(&mut self, mv: Move) {
        self.pos.unmake_move(mv);
        if let (Some(acc), Some(net)) = (self.accumulator.as_mut(), self.evaluator.network()) {
            acc.pop(net);
        }
    }

    fn evaluate(&mut self) -> i32 {
        match &self.accumulator {
            Some(acc) => self.evaluator.evaluate_with(&self.pos, acc),
            None => self.evaluator.evaluate(&self.pos),
        }
    }

    /// Bumps the node counter; every 4096 nodes the deadlines and node cap
    /// are checked and the shared stop flag raised when exceeded.
    fn visit_node(&mut self) {
        self.nodes += 1;
        if self.nodes & NODE_POLL_MASK == 0 {
            if let Some(hard) = self.budget.hard {
                if self.started.elapsed() >= hard {
                    self.stop.stop();
                }
            }
            if let Some(cap) = self.node_cap {
                if self.nodes >= cap {
                    self.stop.stop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_scores_normalize_round_trip() {
        let root_score = MATE - 5;
        let stored = to_tt(root_score, 3);
        assert_eq!(stored, MATE - 2);
        assert_eq!(from_tt(stored, 3), root_score);

        let losing = -(MATE - 4);
        let stored = to_tt(losing, 2);
        assert_eq!(from_tt(stored, 2), losing);

        assert_eq!(to_tt(137, 9), 137);
        assert_eq!(from_tt(-137, 9), -137);
    }

    #[test]
    fn pick_selects_best_remaining() {
        let mut moves = MoveList::new();
        let a = Move::quiet(
            graphite_core::Square::A1,
            graphite_core::Square::A8,
        );
        let b = Move::quiet(
            graphite_core::Square::B1,
            graphite_core::Square::B8,
        );
        let c = Move::quiet(
            graphite_core::Square::C1,
            graphite_core::Square::C8,
        );
        moves.push(a);
        moves.push(b);
        moves.push(c);
        let mut scores = vec![5, 50, 10];
        pick(&mut moves, &mut scores, 0);
        assert_eq!(moves[0], b);
        pick(&mut moves, &mut scores, 1);
        assert_eq!(moves[1], c);
    }
}
