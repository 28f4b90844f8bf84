//! The NNUE-style evaluation network.
//!
//! Fixed topology 768 -> 512 -> 512 -> 1: one-hot (piece, square) inputs,
//! two ReLU hidden layers, tanh output mapped to centipawns. The first
//! layer is affine over a sparse input, so instead of recomputing it per
//! position an [`Accumulator`] tracks the sum of first-layer columns for
//! the features currently on the board and is updated as moves are made
//! and unmade.

use graphite_board::Position;
use graphite_core::{Color, Move, MoveFlag, Piece, Square};
use std::path::Path;
use thiserror::Error;

/// Input features: 12 piece kinds times 64 squares.
pub const INPUT: usize = 768;
/// Width of both hidden layers.
pub const HIDDEN: usize = 512;

const TOTAL_FLOATS: usize = INPUT * HIDDEN + HIDDEN + HIDDEN * HIDDEN + HIDDEN + HIDDEN + 1;

/// Failures while loading a weight file.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to read weight file: {0}")]
    Io(#[from] std::io::Error),

    #[error("weight file truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
}

/// A loaded network.
///
/// Weight layout on disk is dense little-endian f32 in the order W1
/// (768x512, row per feature), b1 (512), W2 (512x512, row per input), b2
/// (512), W3 (512), b3 (1).
#[derive(Debug)]
pub struct Network {
    w1: Vec<f32>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: Vec<f32>,
    w3: Vec<f32>,
    b3: f32,
}

impl Network {
    /// Loads weights from a file.
    pub fn load(path: &Path) -> Result<Self, NetworkError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parses weights from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NetworkError> {
        let expected = TOTAL_FLOATS * 4;
        if bytes.len() < expected {
            return Err(NetworkError::Truncated {
                expected,
                got: bytes.len(),
            });
        }

        let mut floats = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));
        let mut take = |n: usize| -> Vec<f32> { floats.by_ref().take(n).collect() };

        let w1 = take(INPUT * HIDDEN);
        let b1 = take(HIDDEN);
        let w2 = take(HIDDEN * HIDDEN);
        let b2 = take(HIDDEN);
        let w3 = take(HIDDEN);
        let b3 = take(1)[0];

        Ok(Network {
            w1,
            b1,
            w2,
            b2,
            w3,
            b3,
        })
    }

    /// Feature index of a piece in the given perspective. The White view
    /// uses squares as-is; the Black view flips the board vertically and
    /// swaps piece colors, so either side's own pieces occupy the same
    /// feature block.
    #[inline]
    fn feature(perspective: Color, color: Color, piece: Piece, sq: Square) -> usize {
        match perspective {
            Color::White => (color.index() * 6 + piece.index()) * 64 + sq.index() as usize,
            Color::Black => {
                (color.opponent().index() * 6 + piece.index()) * 64 + sq.mirror().index() as usize
            }
        }
    }

    /// First-layer weight column for a feature.
    #[inline]
    fn column(&self, feature: usize) -> &[f32] {
        &self.w1[feature * HIDDEN..(feature + 1) * HIDDEN]
    }

    /// Evaluates a position from scratch. Convenient where no incremental
    /// accumulator is carried (e.g. MCTS leaves).
    pub fn evaluate(&self, pos: &Position) -> i32 {
        let mut acc = Accumulator::new();
        acc.refresh(self, pos);
        self.forward(&acc, pos.side_to_move())
    }

    /// Runs the dense layers over the accumulator for the given side to
    /// move and returns centipawns from that side's point of view.
    pub fn forward(&self, acc: &Accumulator, side_to_move: Color) -> i32 {
        let input = acc.perspective(side_to_move);

        let mut h1 = [0f32; HIDDEN];
        for i in 0..HIDDEN {
            h1[i] = (input[i] + self.b1[i]).max(0.0);
        }

        let mut h2 = [0f32; HIDDEN];
        for (i, &a) in h1.iter().enumerate() {
            if a == 0.0 {
                continue;
            }
            let row = &self.w2[i * HIDDEN..(i + 1) * HIDDEN];
            for j in 0..HIDDEN {
                h2[j] += a * row[j];
            }
        }

        let mut out = self.b3;
        for j in 0..HIDDEN {
            let activated = (h2[j] + self.b2[j]).max(0.0);
            out += activated * self.w3[j];
        }

        (out.tanh() * 100.0).round() as i32
    }
}

/// One feature placement or removal.
#[derive(Clone, Copy)]
struct FeatureOp {
    color: Color,
    piece: Piece,
    sq: Square,
    add: bool,
}

/// The feature ops of one move; at most four (castling).
#[derive(Clone, Copy)]
struct MoveDelta {
    ops: [Option<FeatureOp>; 4],
}

/// Running sums of first-layer columns for both perspectives, plus a
/// journal so every [`Accumulator::push`] can be reversed by
/// [`Accumulator::pop`].
///
/// Invariant: after any sequence of pushes and pops the sums equal what
/// [`Accumulator::refresh`] would produce on the current position.
pub struct Accumulator {
    views: [Vec<f32>; 2],
    journal: Vec<MoveDelta>,
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator {
            views: [vec![0.0; HIDDEN], vec![0.0; HIDDEN]],
            journal: Vec::new(),
        }
    }

    /// Rebuilds both perspectives from scratch and clears the journal.
    pub fn refresh(&mut self, net: &Network, pos: &Position) {
        for view in &mut self.views {
            view.iter_mut().for_each(|v| *v = 0.0);
        }
        self.journal.clear();
        for color in [Color::White, Color::Black] {
            for piece in Piece::ALL {
                for sq in pos.piece_bb(color, piece) {
                    self.apply(
                        net,
                        FeatureOp {
                            color,
                            piece,
                            sq,
                            add: true,
                        },
                    );
                }
            }
        }
    }

    /// Mirrors `mv` into the accumulator. `pos` is the position *before*
    /// the move is made. Handles captures, promotions, castling, and en
    /// passant, matching the board's make semantics.
    pub fn push(&mut self, net: &Network, pos: &Position, mv: Move) {
        let us = pos.side_to_move();
        let them = us.opponent();
        let from = mv.from();
        let to = mv.to();
        let flag = mv.flag();

        let piece = pos
            .piece_of(us, from)
            .expect("accumulator push: no piece on origin square");

        let mut ops = [None; 4];
        let mut n = 0;
        let mut record = |op: FeatureOp| {
            ops[n] = Some(op);
            n += 1;
        };

        record(FeatureOp {
            color: us,
            piece,
            sq: from,
            add: false,
        });
        record(FeatureOp {
            color: us,
            piece: flag.promotion().unwrap_or(piece),
            sq: to,
            add: true,
        });

        if flag == MoveFlag::EnPassant {
            record(FeatureOp {
                color: them,
                piece: Piece::Pawn,
                sq: to.offset(-us.pawn_push()),
                add: false,
            });
        } else if let Some(victim) = pos.piece_of(them, to) {
            record(FeatureOp {
                color: them,
                piece: victim,
                sq: to,
                add: false,
            });
        }

        if flag.is_castle() {
            let (rook_from, rook_to) = match (us, flag) {
                (Color::White, MoveFlag::CastleKingside) => (Square::H1, Square::F1),
                (Color::White, MoveFlag::CastleQueenside) => (Square::A1, Square::D1),
                (Color::Black, MoveFlag::CastleKingside) => (Square::H8, Square::F8),
                _ => (Square::A8, Square::D8),
            };
            record(FeatureOp {
                color: us,
                piece: Piece::Rook,
                sq: rook_from,
                add: false,
            });
            record(FeatureOp {
                color: us,
                piece: Piece::Rook,
                sq: rook_to,
                add: true,
            });
        }

        let delta = MoveDelta { ops };
        for op in delta.ops.into_iter().flatten() {
            self.apply(net, op);
        }
        self.journal.push(delta);
    }

    /// Reverses the most recent [`Accumulator::push`].
    pub fn pop(&mut self, net: &Network) {
        let delta = self.journal.pop().expect("accumulator pop without push");
        for op in delta.ops.into_iter().rev().flatten() {
            self.apply(
                net,
                FeatureOp {
                    add: !op.add,
                    ..op
                },
            );
        }
    }

    fn apply(&mut self, net: &Network, op: FeatureOp) {
        for perspective in [Color::White, Color::Black] {
            let feature = Network::feature(perspective, op.color, op.piece, op.sq);
            let column = net.column(feature);
            let view = &mut self.views[perspective.index()];
            if op.add {
                for (v, w) in view.iter_mut().zip(column) {
                    *v += w;
                }
            } else {
                for (v, w) in view.iter_mut().zip(column) {
                    *v -= w;
                }
            }
        }
    }

    /// The running sums seen from `color`'s perspective.
    #[inline]
    pub fn perspective(&self, color: Color) -> &[f32] {
        &self.views[color.index()]
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphite_board::generate_legal;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Builds a weight buffer with small pseudo-random values.
    fn test_weights(seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bytes = Vec::with_capacity(TOTAL_FLOATS * 4);
        for _ in 0..TOTAL_FLOATS {
            let w: f32 = rng.random_range(-0.05..0.05);
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        bytes
    }

    fn max_view_difference(a: &Accumulator, b: &Accumulator) -> f32 {
        let mut worst = 0f32;
        for color in [Color::White, Color::Black] {
            for (x, y) in a.perspective(color).iter().zip(b.perspective(color)) {
                worst = worst.max((x - y).abs());
            }
        }
        worst
    }

    #[test]
    fn short_file_is_rejected() {
        let bytes = test_weights(1);
        let err = Network::from_bytes(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, NetworkError::Truncated { .. }));
        assert!(Network::from_bytes(&[]).is_err());
    }

    #[test]
    fn full_file_loads() {
        let net = Network::from_bytes(&test_weights(2)).unwrap();
        let pos = Position::startpos();
        // Output is tanh-bounded centipawns.
        let cp = net.evaluate(&pos);
        assert!((-100..=100).contains(&cp));
    }

    #[test]
    fn perspectives_agree_on_mirrored_position() {
        // The starting position is symmetric, so both perspectives see the
        // same feature multiset and the evaluation is side-independent.
        let net = Network::from_bytes(&test_weights(3)).unwrap();
        let mut acc = Accumulator::new();
        let pos = Position::startpos();
        acc.refresh(&net, &pos);
        let white_view = net.forward(&acc, Color::White);
        let black_view = net.forward(&acc, Color::Black);
        assert_eq!(white_view, black_view);
    }

    #[test]
    fn incremental_updates_match_refresh() {
        let net = Network::from_bytes(&test_weights(4)).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let mut pos = Position::startpos();
        let mut acc = Accumulator::new();
        acc.refresh(&net, &pos);
        let mut played = Vec::new();

        for step in 0..10_000 {
            let undo = !played.is_empty() && rng.random_range(0..4) == 0;
            if undo {
                let mv = played.pop().unwrap();
                pos.unmake_move(mv);
                acc.pop(&net);
            } else {
                let moves = generate_legal(&mut pos);
                if moves.is_empty() || pos.halfmove_clock() >= 100 {
                    while let Some(mv) = played.pop() {
                        pos.unmake_move(mv);
                        acc.pop(&net);
                    }
                    continue;
                }
                let mv = moves[rng.random_range(0..moves.len())];
                acc.push(&net, &pos, mv);
                assert!(pos.make_move(mv));
                played.push(mv);
            }

            if step % 1000 == 0 {
                let mut fresh = Accumulator::new();
                fresh.refresh(&net, &pos);
                assert!(
                    max_view_difference(&acc, &fresh) < 1e-3,
                    "accumulator drifted at step {}",
                    step
                );
            }
        }

        let mut fresh = Accumulator::new();
        fresh.refresh(&net, &pos);
        assert!(max_view_difference(&acc, &fresh) < 1e-3);
    }
}
