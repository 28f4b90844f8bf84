//! Core types for the Graphite chess engine.
//!
//! Everything in this crate is board-representation agnostic:
//! - [`Color`] and [`Piece`] for piece identity
//! - [`Square`], [`File`], and [`Rank`] for coordinates
//! - [`Move`] and [`MoveFlag`], the 16-bit packed move encoding
//! - [`Fen`] parsing and validation

mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use color::Color;
pub use fen::{Fen, FenError};
pub use mov::{Move, MoveFlag};
pub use piece::Piece;
pub use square::{File, Rank, Square};
