//! Piece kinds.

use crate::Color;

/// The six piece kinds, ordered by conventional value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Piece {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl Piece {
    /// All piece kinds in index order.
    pub const ALL: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    /// Array index (0-5).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Material value in centipawns. Kings carry none.
    #[inline]
    pub const fn value(self) -> i32 {
        match self {
            Piece::Pawn => 100,
            Piece::Knight => 320,
            Piece::Bishop => 330,
            Piece::Rook => 500,
            Piece::Queen => 900,
            Piece::King => 0,
        }
    }

    /// Contribution to the game-phase scalar (24 = opening, 0 = endgame).
    #[inline]
    pub const fn phase_weight(self) -> i32 {
        match self {
            Piece::Knight | Piece::Bishop => 1,
            Piece::Rook => 2,
            Piece::Queen => 4,
            Piece::Pawn | Piece::King => 0,
        }
    }

    /// FEN character for this piece of the given color.
    pub const fn to_fen_char(self, color: Color) -> char {
        let c = match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parses a FEN character; uppercase is White.
    pub const fn from_fen_char(c: char) -> Option<(Piece, Color)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let piece = match c.to_ascii_lowercase() {
            'p' => Piece::Pawn,
            'n' => Piece::Knight,
            'b' => Piece::Bishop,
            'r' => Piece::Rook,
            'q' => Piece::Queen,
            'k' => Piece::King,
            _ => return None,
        };
        Some((piece, color))
    }
}

impl std::fmt::Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Piece::Pawn => "Pawn",
            Piece::Knight => "Knight",
            Piece::Bishop => "Bishop",
            Piece::Rook => "Rook",
            Piece::Queen => "Queen",
            Piece::King => "King",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fen_chars_round_trip() {
        for piece in Piece::ALL {
            for color in [Color::White, Color::Black] {
                let c = piece.to_fen_char(color);
                assert_eq!(Piece::from_fen_char(c), Some((piece, color)));
            }
        }
        assert_eq!(Piece::from_fen_char('x'), None);
    }

    #[test]
    fn material_values() {
        assert_eq!(Piece::Pawn.value(), 100);
        assert_eq!(Piece::Knight.value(), 320);
        assert_eq!(Piece::Bishop.value(), 330);
        assert_eq!(Piece::Rook.value(), 500);
        assert_eq!(Piece::Queen.value(), 900);
        assert_eq!(Piece::King.value(), 0);
    }

    #[test]
    fn phase_weights_sum_to_full_board() {
        // 4 minor pieces + 2 rooks + 1 queen per side = 24 total.
        let per_side = 2 * Piece::Knight.phase_weight()
            + 2 * Piece::Bishop.phase_weight()
            + 2 * Piece::Rook.phase_weight()
            + Piece::Queen.phase_weight();
        assert_eq!(2 * per_side, 24);
    }
}
