//! The 16-bit packed move encoding.
//!
//! Bits 0-5 hold the origin square, bits 6-11 the destination, and the top
//! nibble a [`MoveFlag`] describing any special action. Make/unmake relies
//! on the flag rather than re-deriving it from the board, so the move
//! generator is responsible for setting it correctly.

use crate::{Piece, Square};
use std::fmt;

/// Special-action tag carried by every move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    Quiet = 0,
    DoublePush = 1,
    CastleKingside = 2,
    CastleQueenside = 3,
    EnPassant = 4,
    PromoteKnight = 5,
    PromoteBishop = 6,
    PromoteRook = 7,
    PromoteQueen = 8,
}

impl MoveFlag {
    /// The piece a promotion flag promotes to, if any.
    #[inline]
    pub const fn promotion(self) -> Option<Piece> {
        match self {
            MoveFlag::PromoteKnight => Some(Piece::Knight),
            MoveFlag::PromoteBishop => Some(Piece::Bishop),
            MoveFlag::PromoteRook => Some(Piece::Rook),
            MoveFlag::PromoteQueen => Some(Piece::Queen),
            _ => None,
        }
    }

    /// Promotion flag for a piece; `None` for non-promotable kinds.
    #[inline]
    pub const fn promoting_to(piece: Piece) -> Option<Self> {
        match piece {
            Piece::Knight => Some(MoveFlag::PromoteKnight),
            Piece::Bishop => Some(MoveFlag::PromoteBishop),
            Piece::Rook => Some(MoveFlag::PromoteRook),
            Piece::Queen => Some(MoveFlag::PromoteQueen),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self as u8 >= MoveFlag::PromoteKnight as u8
    }

    #[inline]
    pub const fn is_castle(self) -> bool {
        matches!(self, MoveFlag::CastleKingside | MoveFlag::CastleQueenside)
    }
}

/// A packed chess move.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u16);

impl Move {
    /// The null move, used as a sentinel; never legal.
    pub const NULL: Move = Move(0);

    /// Packs a move from its parts.
    #[inline]
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Self {
        Move((from.index() as u16) | ((to.index() as u16) << 6) | ((flag as u16) << 12))
    }

    /// A quiet move or plain capture.
    #[inline]
    pub const fn quiet(from: Square, to: Square) -> Self {
        Move::new(from, to, MoveFlag::Quiet)
    }

    #[inline]
    pub const fn from(self) -> Square {
        Square::from_index((self.0 & 0x3F) as u8)
    }

    #[inline]
    pub const fn to(self) -> Square {
        Square::from_index(((self.0 >> 6) & 0x3F) as u8)
    }

    #[inline]
    pub const fn flag(self) -> MoveFlag {
        match self.0 >> 12 {
            1 => MoveFlag::DoublePush,
            2 => MoveFlag::CastleKingside,
            3 => MoveFlag::CastleQueenside,
            4 => MoveFlag::EnPassant,
            5 => MoveFlag::PromoteKnight,
            6 => MoveFlag::PromoteBishop,
            7 => MoveFlag::PromoteRook,
            8 => MoveFlag::PromoteQueen,
            _ => MoveFlag::Quiet,
        }
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The raw 16-bit encoding, used by the transposition table.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Rebuilds a move from its raw encoding.
    #[inline]
    pub const fn from_raw(bits: u16) -> Self {
        Move(bits)
    }

    /// Long-algebraic notation: "e2e4", "e7e8q", or "0000" for null.
    pub fn to_uci(self) -> String {
        if self.is_null() {
            return "0000".to_string();
        }
        let promo = match self.flag() {
            MoveFlag::PromoteKnight => "n",
            MoveFlag::PromoteBishop => "b",
            MoveFlag::PromoteRook => "r",
            MoveFlag::PromoteQueen => "q",
            _ => "",
        };
        format!("{}{}{}", self.from(), self.to(), promo)
    }

    /// Parses long-algebraic notation.
    ///
    /// The result carries at most a promotion flag; castling, en passant
    /// and double-push flags can only be recovered by matching against the
    /// legal moves of a position.
    pub fn from_uci(s: &str) -> Option<Self> {
        if s == "0000" {
            return Some(Move::NULL);
        }
        if s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let flag = match s.as_bytes().get(4).copied() {
            None => MoveFlag::Quiet,
            Some(b'n') | Some(b'N') => MoveFlag::PromoteKnight,
            Some(b'b') | Some(b'B') => MoveFlag::PromoteBishop,
            Some(b'r') | Some(b'R') => MoveFlag::PromoteRook,
            Some(b'q') | Some(b'Q') => MoveFlag::PromoteQueen,
            Some(_) => return None,
        };
        Some(Move::new(from, to, flag))
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({})", self.to_uci())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}
