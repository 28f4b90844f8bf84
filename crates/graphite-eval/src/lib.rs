//! Static evaluation for Graphite.
//!
//! [`Evaluator`] scores a position in centipawns from the side to move's
//! point of view, combining material, piece-square tables, pawn structure,
//! mobility, and king safety, with the game phase blending middlegame and
//! endgame terms. When a [`Network`] is loaded its output is blended into
//! the classical score, weighted toward the network as the game empties out.

mod eval;
mod network;
mod psqt;

pub use eval::{game_phase, material_balance, Evaluator, PHASE_MAX};
pub use network::{Accumulator, Network, NetworkError, HIDDEN, INPUT};
