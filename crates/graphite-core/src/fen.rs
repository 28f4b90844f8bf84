//! FEN (Forsyth-Edwards Notation) parsing.
//!
//! [`Fen`] validates and splits the six fields; the board crate turns the
//! validated fields into its bitboard representation.

use thiserror::Error;

/// Reasons a FEN string can be rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 6 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid piece placement: {0}")]
    Placement(String),

    #[error("invalid side to move: expected 'w' or 'b', got '{0}'")]
    SideToMove(String),

    #[error("invalid castling rights: {0}")]
    Castling(String),

    #[error("invalid en passant square: {0}")]
    EnPassant(String),

    #[error("invalid halfmove clock: {0}")]
    HalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    FullmoveNumber(String),
}

/// A validated FEN, split into its six fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    /// Ranks 8 down to 1, '/'-separated.
    pub placement: String,
    /// 'w' or 'b'.
    pub side_to_move: char,
    /// Subset of "KQkq", or "-".
    pub castling: String,
    /// Target square such as "e3", or "-".
    pub en_passant: String,
    /// Halfmove clock for the fifty-move rule.
    pub halfmove_clock: u32,
    /// Fullmove number, starting at 1.
    pub fullmove_number: u32,
}

impl Fen {
    /// The standard starting position.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Parses and validates a six-field FEN string.
    pub fn parse(input: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = input.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::FieldCount(fields.len()));
        }

        Self::check_placement(fields[0])?;

        let side_to_move = match fields[1] {
            "w" => 'w',
            "b" => 'b',
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        Self::check_castling(fields[2])?;
        Self::check_en_passant(fields[3])?;

        let halfmove_clock = fields[4]
            .parse::<u32>()
            .map_err(|_| FenError::HalfmoveClock(fields[4].to_string()))?;
        let fullmove_number = fields[5]
            .parse::<u32>()
            .map_err(|_| FenError::FullmoveNumber(fields[5].to_string()))?;

        Ok(Fen {
            placement: fields[0].to_string(),
            side_to_move,
            castling: fields[2].to_string(),
            en_passant: fields[3].to_string(),
            halfmove_clock,
            fullmove_number,
        })
    }

    fn check_placement(placement: &str) -> Result<(), FenError> {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::Placement(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }
        for (i, rank) in ranks.iter().enumerate() {
            let mut squares = 0u32;
            for c in rank.chars() {
                if let Some(d) = c.to_digit(10) {
                    if d == 0 || d > 8 {
                        return Err(FenError::Placement(format!(
                            "bad skip count '{}' in rank {}",
                            c,
                            8 - i
                        )));
                    }
                    squares += d;
                } else if "pnbrqkPNBRQK".contains(c) {
                    squares += 1;
                } else {
                    return Err(FenError::Placement(format!(
                        "unexpected character '{}' in rank {}",
                        c,
                        8 - i
                    )));
                }
            }
            if squares != 8 {
                return Err(FenError::Placement(format!(
                    "rank {} covers {} squares",
                    8 - i,
                    squares
                )));
            }
        }
        Ok(())
    }

    fn check_castling(castling: &str) -> Result<(), FenError> {
        if castling == "-" {
            return Ok(());
        }
        if castling.is_empty() || castling.len() > 4 {
            return Err(FenError::Castling(castling.to_string()));
        }
        for c in castling.chars() {
            if !"KQkq".contains(c) {
                return Err(FenError::Castling(format!("unexpected character '{}'", c)));
            }
        }
        Ok(())
    }

    fn check_en_passant(ep: &str) -> Result<(), FenError> {
        if ep == "-" {
            return Ok(());
        }
        let bytes = ep.as_bytes();
        let valid = bytes.len() == 2
            && (b'a'..=b'h').contains(&bytes[0])
            && (bytes[1] == b'3' || bytes[1] == b'6');
        if valid {
            Ok(())
        } else {
            Err(FenError::EnPassant(ep.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_startpos() {
        let fen = Fen::parse(Fen::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, 'w');
        assert_eq!(fen.castling, "KQkq");
        assert_eq!(fen.en_passant, "-");
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(Fen::parse("only three fields"), Err(FenError::FieldCount(3)));
    }

    #[test]
    fn rejects_bad_side() {
        let err = Fen::parse("8/8/8/8/8/8/8/8 x - - 0 1");
        assert!(matches!(err, Err(FenError::SideToMove(_))));
    }

    #[test]
    fn rejects_short_rank() {
        let err = Fen::parse("8/8/8/8/8/8/8/7 w - - 0 1");
        assert!(matches!(err, Err(FenError::Placement(_))));
    }

    #[test]
    fn rejects_bad_piece_char() {
        let err = Fen::parse("8/8/8/8/8/8/8/7x w - - 0 1");
        assert!(matches!(err, Err(FenError::Placement(_))));
    }

    #[test]
    fn rejects_bad_castling() {
        let err = Fen::parse("8/8/8/8/8/8/8/8 w KX - 0 1");
        assert!(matches!(err, Err(FenError::Castling(_))));
    }

    #[test]
    fn rejects_bad_en_passant() {
        let err = Fen::parse("8/8/8/8/8/8/8/8 w - e4 0 1");
        assert!(matches!(err, Err(FenError::EnPassant(_))));
        let err = Fen::parse("8/8/8/8/8/8/8/8 w - zz 0 1");
        assert!(matches!(err, Err(FenError::EnPassant(_))));
    }

    #[test]
    fn rejects_bad_clocks() {
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - - x 1"),
            Err(FenError::HalfmoveClock(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - - 0 x"),
            Err(FenError::FullmoveNumber(_))
        ));
    }

    #[test]
    fn accepts_en_passant_targets() {
        assert!(Fen::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").is_ok());
    }
}
