//! Bitboard board representation and move generation for Graphite.
//!
//! This crate provides:
//! - [`Bitboard`] - a 64-bit set of squares with shift and scan operations
//! - Precomputed attack tables for leapers and magic bitboards for sliders
//! - [`Position`] - full game state with incremental make/unmake and
//!   Zobrist hashing backed by an undo stack
//! - Pseudo-legal, legal, and captures-only move generation
//! - Perft for move generator validation
//!
//! Squares are indexed a1 = 0 through h8 = 63; the twelve piece sets are
//! indexed `color * 6 + piece`.

mod attacks;
mod bitboard;
mod magics;
pub mod movegen;
pub mod perft;
mod position;
mod zobrist;

pub use attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
};
pub use bitboard::Bitboard;
pub use movegen::{generate_captures, generate_legal, generate_pseudo_legal, MoveList};
pub use position::{CastlingRights, Position};
pub use zobrist::ZOBRIST;
