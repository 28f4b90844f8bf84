//! Monte-Carlo tree search with PUCT selection.
//!
//! The tree is an arena: every node is an index into one vector, parents
//! are indices, and children occupy a contiguous range written exactly
//! once at expansion. Visit counts and value sums are atomic, so worker
//! threads share the tree with a read lock and only take the write lock to
//! append children. Virtual loss steers concurrent workers apart during
//! the descent.

use crate::time::TimeManager;
use crate::{EngineConfig, SearchLimits, SearchReport, SearchResult, StopFlag};
use graphite_board::{generate_legal, Position};
use graphite_core::Move;
use graphite_eval::Evaluator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Exploration constant in the PUCT formula.
pub const C_PUCT: f32 = 1.41;
/// Visits temporarily added to a node while a worker is below it.
pub const VIRTUAL_LOSS: i64 = 3;
/// Assumed mean value of a never-visited child (first-play urgency).
const FPU: f32 = -0.2;
/// Scale for squashing centipawns into [-1, 1].
const VALUE_SCALE: f32 = 300.0;
/// Relative weight of the root prior noise.
const ROOT_NOISE: f64 = 0.25;

struct Node {
    mv: Move,
    parent: i32,
    prior: f32,
    /// Real visits plus any outstanding virtual losses.
    visits: AtomicI64,
    /// Sum of backed-up values, in 1/65536 units, from the point of view
    /// of the player who moved into this node.
    value: AtomicI64,
    children_start: AtomicU32,
    children_len: AtomicU32,
}

const VALUE_UNIT: f32 = 65_536.0;

impl Node {
    fn new(mv: Move, parent: i32, prior: f32) -> Self {
        Node {
            mv,
            parent,
            prior,
            visits: AtomicI64::new(0),
            value: AtomicI64::new(0),
            children_start: AtomicU32::new(0),
            children_len: AtomicU32::new(0),
        }
    }

    fn add_value(&self, v: f32) {
        self.value
            .fetch_add((v * VALUE_UNIT) as i64, Ordering::Relaxed);
    }

    fn mean_value(&self) -> f32 {
        let visits = self.visits.load(Ordering::Relaxed);
        if visits <= 0 {
            return FPU;
        }
        self.value.load(Ordering::Relaxed) as f32 / VALUE_UNIT / visits as f32
    }
}

/// Runs the MCTS driver and returns the most-visited root move.
pub fn search(
    pos: &Position,
    evaluator: &Evaluator,
    config: &EngineConfig,
    limits: &SearchLimits,
    stop: &StopFlag,
    on_done: &mut dyn FnMut(&SearchReport),
) -> SearchResult {
    let started = Instant::now();
    let budget = TimeManager::allocate(limits, pos.side_to_move());
    let deadline = budget.soft.map(|d| started + d);
    let simulation_cap = limits.nodes.unwrap_or(u64::MAX);

    let mut root_pos = pos.clone();
    let root_moves = generate_legal(&mut root_pos);
    if root_moves.is_empty() {
        return SearchResult {
            best_move: None,
            score: if root_pos.in_check() { -crate::MATE } else { 0 },
            nodes: 0,
            depth: 0,
            pv: Vec::new(),
        };
    }

    let tree = Tree::new(pos, evaluator);
    let simulations = AtomicU64::new(0);

    let workers = config.threads.max(1);
    std::thread::scope(|scope| {
        for id in 0..workers {
            let tree = &tree;
            let simulations = &simulations;
            let stop = stop.clone();
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(0xC0FFEE ^ id as u64);
                tracing::trace!(id, "mcts worker started");
                loop {
                    if stop.is_stopped() {
                        break;
                    }
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            break;
                        }
                    }
                    if simulations.fetch_add(1, Ordering::Relaxed) >= simulation_cap {
                        break;
                    }
                    tree.simulate(&mut rng);
                }
            });
        }
    });

    let (best_move, visits, mean) = tree.best_root_child();
    let nodes = simulations.load(Ordering::Relaxed).min(simulation_cap);
    let score = value_to_centipawns(mean);

    let report = SearchReport {
        depth: 1,
        score,
        nodes,
        elapsed_ms: started.elapsed().as_millis() as u64,
        pv: best_move.into_iter().collect(),
        hashfull: None,
    };
    on_done(&report);
    tracing::debug!(visits, score, nodes, "mcts finished");

    SearchResult {
        best_move,
        score,
        nodes,
        depth: 1,
        pv: report.pv,
    }
}

/// Squashes an evaluation into [-1, 1] for backup.
fn centipawns_to_value(cp: i32) -> f32 {
    (cp as f32 / VALUE_SCALE).tanh()
}

/// Inverse squash for reporting, clamped away from the asymptotes.
fn value_to_centipawns(v: f32) -> i32 {
    let v = v.clamp(-0.999, 0.999);
    (v.atanh() * VALUE_SCALE) as i32
}

struct Tree<'a> {
    nodes: RwLock<Vec<Node>>,
    root_pos: Position,
    root_history: usize,
    evaluator: &'a Evaluator,
}

impl<'a> Tree<'a> {
    fn new(pos: &Position, evaluator: &'a Evaluator) -> Self {
        Tree {
            nodes: RwLock::new(vec![Node::new(Move::NULL, -1, 1.0)]),
            root_pos: pos.clone(),
            root_history: pos.history_len(),
            evaluator,
        }
    }

    /// One iteration: select a leaf, expand and evaluate it, back the
    /// value up the path.
    fn simulate(&self, rng: &mut StdRng) {
        let mut pos = self.root_pos.clone();
        let mut path = vec![0usize];

        // Selection: descend while children exist, applying virtual loss
        // so other workers spread out.
        {
            let nodes = self.nodes.read().expect("tree lock poisoned");
            loop {
                let current = &nodes[*path.last().expect("path is never empty")];
                let len = current.children_len.load(Ordering::Acquire);
                if len == 0 {
                    break;
                }
                let start = current.children_start.load(Ordering::Acquire) as usize;
                let parent_visits = current.visits.load(Ordering::Relaxed).max(0) as f32;

                let mut best = start;
                let mut best_score = f32::NEG_INFINITY;
                for idx in start..start + len as usize {
                    let child = &nodes[idx];
                    let q = child.mean_value();
                    let n = child.visits.load(Ordering::Relaxed).max(0) as f32;
                    let u = C_PUCT * child.prior * parent_visits.sqrt() / (1.0 + n);
                    // A random epsilon breaks ties between equal children.
                    let score = q + u + rng.random_range(0.0_f32..1e-6);
                    if score > best_score {
                        best_score = score;
                        best = idx;
                    }
                }

                let chosen = &nodes[best];
                chosen.visits.fetch_add(VIRTUAL_LOSS, Ordering::Relaxed);
                chosen
                    .value
                    .fetch_add(-(VIRTUAL_LOSS as i64) * VALUE_UNIT as i64, Ordering::Relaxed);
                pos.make_move(chosen.mv);
                path.push(best);
            }
        }

        // Expansion and evaluation at the leaf.
        let leaf = *path.last().expect("path is never empty");
        let value = self.expand_and_evaluate(leaf, &mut pos, rng);

        self.backup(&path, value);
    }

    /// Evaluates the leaf position and, when non-terminal, appends its
    /// children exactly once. Returns the leaf value from the point of
    /// view of the player who moved into the leaf.
    fn expand_and_evaluate(&self, leaf: usize, pos: &mut Position, rng: &mut StdRng) -> f32 {
        // Draws by rule are terminal.
        let (repetitions, in_search) = pos.repetitions(self.root_history);
        if pos.halfmove_clock() >= 100 || in_search || repetitions >= 2 {
            return 0.0;
        }

        let moves = generate_legal(pos);
        if moves.is_empty() {
            // Checkmate is a loss for the side to move; the mover into
            // this node scores a win.
            return if pos.in_check() { 1.0 } else { 0.0 };
        }

        let value = centipawns_to_value(self.evaluator.evaluate(pos));

        let mut nodes = self.nodes.write().expect("tree lock poisoned");
        // Another worker may have expanded this leaf first; children are
        // appended exactly once.
        if nodes[leaf].children_len.load(Ordering::Acquire) == 0 {
            let at_root = leaf == 0;
            let uniform = 1.0 / moves.len() as f32;
            let mut priors: Vec<f32> = moves
                .iter()
                .map(|_| {
                    if at_root {
                        uniform * (1.0 + rng.random_range(0.0..ROOT_NOISE) as f32)
                    } else {
                        uniform
                    }
                })
                .collect();
            let total: f32 = priors.iter().sum();
            for p in &mut priors {
                *p /= total;
            }

            let start = nodes.len() as u32;
            for (&mv, &prior) in moves.iter().zip(&priors) {
                nodes.push(Node::new(mv, leaf as i32, prior));
            }
            nodes[leaf].children_start.store(start, Ordering::Release);
            nodes[leaf]
                .children_len
                .store(moves.len() as u32, Ordering::Release);
        }

        // The mover into the leaf sees the negated side-to-move value.
        -value
    }

    /// Adds the value up the path, flipping sign each ply, and retires the
    /// virtual losses taken during selection.
    fn backup(&self, path: &[usize], mut value: f32) {
        let nodes = self.nodes.read().expect("tree lock poisoned");
        for (i, &idx) in path.iter().enumerate().rev() {
            let node = &nodes[idx];
            let is_root = i == 0;
            if is_root {
                node.visits.fetch_add(1, Ordering::Relaxed);
            } else {
                // One real visit replaces the virtual loss.
                node.visits.fetch_add(1 - VIRTUAL_LOSS, Ordering::Relaxed);
                node.value
                    .fetch_add((VIRTUAL_LOSS as i64) * VALUE_UNIT as i64, Ordering::Relaxed);
            }
            node.add_value(value);
            value = -value;
        }
    }

    /// The root child with the most visits; mean value breaks ties.
    fn best_root_child(&self) -> (Option<Move>, i64, f32) {
        let nodes = self.nodes.read().expect("tree lock poisoned");
        let root = &nodes[0];
        let len = root.children_len.load(Ordering::Acquire) as usize;
        let start = root.children_start.load(Ordering::Acquire) as usize;

        let mut best: Option<(Move, i64, f32)> = None;
        for idx in start..start + len {
            let child = &nodes[idx];
            let visits = child.visits.load(Ordering::Relaxed);
            let mean = child.mean_value();
            let better = match best {
                None => true,
                Some((_, best_visits, best_mean)) => {
                    visits > best_visits || (visits == best_visits && mean > best_mean)
                }
            };
            if better {
                best = Some((child.mv, visits, mean));
            }
        }
        match best {
            Some((mv, visits, mean)) => (Some(mv), visits, mean),
            None => (None, 0, 0.0),
        }
    }
}
