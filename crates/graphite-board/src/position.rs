//! Full position state with incremental make/unmake.
//!
//! [`Position`] keeps twelve piece bitboards (indexed `color * 6 + piece`),
//! cached per-color unions and total occupancy, castling rights, the
//! en-passant target, both move clocks, and a Zobrist hash that is updated
//! incrementally by every mutation. Every [`Position::make_move`] pushes an
//! undo record so the exact prior state can be restored.

use crate::attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks,
};
use crate::{Bitboard, ZOBRIST};
use graphite_core::{Color, Fen, FenError, Move, MoveFlag, Piece, Square};

/// The four castling-right bits: WK = 1, WQ = 2, BK = 4, BQ = 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;

    #[inline]
    pub const fn new(bits: u8) -> Self {
        CastlingRights(bits & 0b1111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn kingside(self, color: Color) -> bool {
        let bit = match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        };
        self.0 & bit != 0
    }

    #[inline]
    pub const fn queenside(self, color: Color) -> bool {
        let bit = match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        };
        self.0 & bit != 0
    }
}

/// Rights bits cleared whenever a move touches the given square. Covers
/// king moves, rook moves, and captures on a rook's home square.
const fn rights_cleared_by() -> [u8; 64] {
    let mut table = [0u8; 64];
    table[Square::E1.index() as usize] =
        CastlingRights::WHITE_KINGSIDE | CastlingRights::WHITE_QUEENSIDE;
    table[Square::H1.index() as usize] = CastlingRights::WHITE_KINGSIDE;
    table[Square::A1.index() as usize] = CastlingRights::WHITE_QUEENSIDE;
    table[Square::E8.index() as usize] =
        CastlingRights::BLACK_KINGSIDE | CastlingRights::BLACK_QUEENSIDE;
    table[Square::H8.index() as usize] = CastlingRights::BLACK_KINGSIDE;
    table[Square::A8.index() as usize] = CastlingRights::BLACK_QUEENSIDE;
    table
}

const RIGHTS_CLEARED_BY: [u8; 64] = rights_cleared_by();

/// State needed to rewind one move.
#[derive(Debug, Clone, Copy)]
struct Undo {
    mv: Move,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    hash: u64,
    captured: Option<Piece>,
}

/// A chess position.
#[derive(Debug, Clone)]
pub struct Position {
    pieces: [Bitboard; 12],
    by_color: [Bitboard; 2],
    occupied: Bitboard,
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    hash: u64,
    undo_stack: Vec<Undo>,
}

#[inline]
const fn slot(color: Color, piece: Piece) -> usize {
    color.index() * 6 + piece.index()
}

impl Position {
    /// The standard starting position.
    pub fn startpos() -> Self {
        Self::from_fen(Fen::STARTPOS).expect("startpos FEN is valid")
    }

    /// Builds a position from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut position = Position {
            pieces: [Bitboard::EMPTY; 12],
            by_color: [Bitboard::EMPTY; 2],
            occupied: Bitboard::EMPTY,
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            undo_stack: Vec::new(),
        };
        position.set_from_fen(fen)?;
        Ok(position)
    }

    /// Replaces the position with the one described by `fen`.
    ///
    /// Occupancy and the Zobrist hash are recomputed from scratch and the
    /// undo stack is cleared. On error the position is left unchanged.
    pub fn set_from_fen(&mut self, fen: &str) -> Result<(), FenError> {
        let parsed = Fen::parse(fen)?;

        let mut pieces = [Bitboard::EMPTY; 12];
        for (rank_idx, rank_str) in parsed.placement.split('/').enumerate() {
            let rank = 7 - rank_idx as u8;
            let mut file = 0u8;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as u8;
                } else if let Some((piece, color)) = Piece::from_fen_char(c) {
                    let sq = Square::from_index(rank * 8 + file);
                    pieces[slot(color, piece)].set(sq);
                    file += 1;
                }
            }
        }

        for color in [Color::White, Color::Black] {
            if pieces[slot(color, Piece::King)].count() != 1 {
                return Err(FenError::Placement(format!(
                    "expected exactly one {} king",
                    color
                )));
            }
        }
        let pawns = pieces[slot(Color::White, Piece::Pawn)] | pieces[slot(Color::Black, Piece::Pawn)];
        if (pawns & (Bitboard::RANK_1 | Bitboard::RANK_8)).any() {
            return Err(FenError::Placement("pawn on a back rank".to_string()));
        }

        self.pieces = pieces;
        self.by_color = [Bitboard::EMPTY; 2];
        for piece in Piece::ALL {
            self.by_color[0] |= pieces[slot(Color::White, piece)];
            self.by_color[1] |= pieces[slot(Color::Black, piece)];
        }
        self.occupied = self.by_color[0] | self.by_color[1];

        self.side_to_move = if parsed.side_to_move == 'w' {
            Color::White
        } else {
            Color::Black
        };

        let mut rights = 0u8;
        for c in parsed.castling.chars() {
            match c {
                'K' => rights |= CastlingRights::WHITE_KINGSIDE,
                'Q' => rights |= CastlingRights::WHITE_QUEENSIDE,
                'k' => rights |= CastlingRights::BLACK_KINGSIDE,
                'q' => rights |= CastlingRights::BLACK_QUEENSIDE,
                _ => {}
            }
        }
        self.castling = CastlingRights::new(rights);

        self.en_passant = if parsed.en_passant == "-" {
            None
        } else {
            Square::from_algebraic(&parsed.en_passant)
        };
        self.halfmove_clock = parsed.halfmove_clock;
        self.fullmove_number = parsed.fullmove_number;

        self.hash = self.recomputed_hash();
        self.undo_stack.clear();
        Ok(())
    }

    /// Serializes the position; the inverse of [`Position::from_fen`].
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let sq = Square::from_index(rank * 8 + file);
                match self.piece_on(sq) {
                    Some((piece, color)) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side_to_move == Color::White { 'w' } else { 'b' });

        fen.push(' ');
        if self.castling.bits() == 0 {
            fen.push('-');
        } else {
            for (bit, c) in [
                (CastlingRights::WHITE_KINGSIDE, 'K'),
                (CastlingRights::WHITE_QUEENSIDE, 'Q'),
                (CastlingRights::BLACK_KINGSIDE, 'k'),
                (CastlingRights::BLACK_QUEENSIDE, 'q'),
            ] {
                if self.castling.bits() & bit != 0 {
                    fen.push(c);
                }
            }
        }

        fen.push(' ');
        match self.en_passant {
            Some(sq) => fen.push_str(&sq.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        fen
    }

    // ---- accessors -------------------------------------------------------

    #[inline]
    pub fn piece_bb(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces[slot(color, piece)]
    }

    #[inline]
    pub fn color_bb(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.occupied
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// The incrementally maintained Zobrist hash.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The piece and color on `sq`, if occupied.
    pub fn piece_on(&self, sq: Square) -> Option<(Piece, Color)> {
        let color = if self.by_color[0].contains(sq) {
            Color::White
        } else if self.by_color[1].contains(sq) {
            Color::Black
        } else {
            return None;
        };
        self.piece_of(color, sq).map(|p| (p, color))
    }

    /// The piece of `color` on `sq`, if any.
    pub fn piece_of(&self, color: Color, sq: Square) -> Option<Piece> {
        for piece in Piece::ALL {
            if self.pieces[slot(color, piece)].contains(sq) {
                return Some(piece);
            }
        }
        None
    }

    /// The king square of `color`.
    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces[slot(color, Piece::King)]
            .first()
            .expect("position holds one king per side")
    }

    /// True if `color` has any piece besides king and pawns.
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let minors_and_majors = self.by_color[color.index()]
            & !(self.piece_bb(color, Piece::Pawn) | self.piece_bb(color, Piece::King));
        minors_and_majors.any()
    }

    // ---- attack tests ----------------------------------------------------

    /// True if `by` attacks `sq` in the current position.
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        // Pawns: look outward with the defender's attack pattern.
        if (pawn_attacks(sq, by.opponent()) & self.piece_bb(by, Piece::Pawn)).any() {
            return true;
        }
        if (knight_attacks(sq) & self.piece_bb(by, Piece::Knight)).any() {
            return true;
        }
        if (king_attacks(sq) & self.piece_bb(by, Piece::King)).any() {
            return true;
        }
        let diagonal = self.piece_bb(by, Piece::Bishop) | self.piece_bb(by, Piece::Queen);
        if (bishop_attacks(sq, self.occupied) & diagonal).any() {
            return true;
        }
        let orthogonal = self.piece_bb(by, Piece::Rook) | self.piece_bb(by, Piece::Queen);
        (rook_attacks(sq, self.occupied) & orthogonal).any()
    }

    /// True if the side to move is in check.
    #[inline]
    pub fn in_check(&self) -> bool {
        self.is_attacked(self.king_square(self.side_to_move), self.side_to_move.opponent())
    }

    /// All pieces of either color attacking `sq` through the supplied
    /// occupancy. Used by static exchange evaluation, which peels attackers
    /// off the board as it goes.
    pub fn attackers_to(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        let mut attackers = Bitboard::EMPTY;
        attackers |= pawn_attacks(sq, Color::Black) & self.piece_bb(Color::White, Piece::Pawn);
        attackers |= pawn_attacks(sq, Color::White) & self.piece_bb(Color::Black, Piece::Pawn);
        attackers |= knight_attacks(sq)
            & (self.piece_bb(Color::White, Piece::Knight)
                | self.piece_bb(Color::Black, Piece::Knight));
        attackers |= king_attacks(sq)
            & (self.piece_bb(Color::White, Piece::King) | self.piece_bb(Color::Black, Piece::King));
        let diagonal = self.piece_bb(Color::White, Piece::Bishop)
            | self.piece_bb(Color::Black, Piece::Bishop)
            | self.piece_bb(Color::White, Piece::Queen)
            | self.piece_bb(Color::Black, Piece::Queen);
        attackers |= bishop_attacks(sq, occupied) & diagonal;
        let orthogonal = self.piece_bb(Color::White, Piece::Rook)
            | self.piece_bb(Color::Black, Piece::Rook)
            | self.piece_bb(Color::White, Piece::Queen)
            | self.piece_bb(Color::Black, Piece::Queen);
        attackers |= rook_attacks(sq, occupied) & orthogonal;
        attackers & occupied
    }

    // ---- make / unmake ---------------------------------------------------

    /// Applies `mv`, updating every cached field incrementally.
    ///
    /// Returns `false` and restores the prior state when the move would
    /// leave the mover's own king attacked; this makes it safe to drive
    /// from pseudo-legal move lists. Calling it with a move whose origin
    /// square holds no piece of the side to move is a programmer error.
    pub fn make_move(&mut self, mv: Move) -> bool {
        let us = self.side_to_move;
        let them = us.opponent();
        let from = mv.from();
        let to = mv.to();
        let flag = mv.flag();

        let piece = self
            .piece_of(us, from)
            .unwrap_or_else(|| panic!("make_move: no {} piece on {}", us, from));

        let captured = if flag == MoveFlag::EnPassant {
            Some(Piece::Pawn)
        } else {
            self.piece_of(them, to)
        };

        self.undo_stack.push(Undo {
            mv,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
            captured,
        });

        if let Some(ep) = self.en_passant.take() {
            self.hash ^= ZOBRIST.en_passant(ep);
        }

        if let Some(victim) = captured {
            let victim_sq = if flag == MoveFlag::EnPassant {
                to.offset(-us.pawn_push())
            } else {
                to
            };
            self.remove_piece(them, victim, victim_sq);
        }

        self.remove_piece(us, piece, from);
        self.put_piece(us, flag.promotion().unwrap_or(piece), to);

        match flag {
            MoveFlag::CastleKingside | MoveFlag::CastleQueenside => {
                let (rook_from, rook_to) = rook_castle_squares(us, flag);
                self.remove_piece(us, Piece::Rook, rook_from);
                self.put_piece(us, Piece::Rook, rook_to);
            }
            MoveFlag::DoublePush => {
                let ep = from.offset(us.pawn_push());
                self.en_passant = Some(ep);
                self.hash ^= ZOBRIST.en_passant(ep);
            }
            _ => {}
        }

        let cleared = RIGHTS_CLEARED_BY[from.index() as usize] | RIGHTS_CLEARED_BY[to.index() as usize];
        if self.castling.bits() & cleared != 0 {
            let old = self.castling.bits();
            self.castling = CastlingRights::new(old & !cleared);
            self.hash ^= ZOBRIST.castling(old) ^ ZOBRIST.castling(self.castling.bits());
        }

        if piece == Piece::Pawn || captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if us == Color::Black {
            self.fullmove_number += 1;
        }

        self.side_to_move = them;
        self.hash ^= ZOBRIST.side();

        if self.is_attacked(self.king_square(us), them) {
            self.unmake_move(mv);
            return false;
        }
        true
    }

    /// Reverts the most recent [`Position::make_move`], which must have
    /// been `mv`.
    pub fn unmake_move(&mut self, mv: Move) {
        let undo = self.undo_stack.pop().expect("unmake_move without make_move");
        debug_assert_eq!(undo.mv, mv, "unmake_move out of order");

        let us = self.side_to_move.opponent();
        let them = self.side_to_move;
        let from = mv.from();
        let to = mv.to();
        let flag = mv.flag();

        self.side_to_move = us;
        if us == Color::Black {
            self.fullmove_number -= 1;
        }

        let arrived = self
            .piece_of(us, to)
            .expect("unmake_move: mover's piece missing from target square");
        self.remove_piece(us, arrived, to);
        let original = if flag.is_promotion() { Piece::Pawn } else { arrived };
        self.put_piece(us, original, from);

        if flag.is_castle() {
            let (rook_from, rook_to) = rook_castle_squares(us, flag);
            self.remove_piece(us, Piece::Rook, rook_to);
            self.put_piece(us, Piece::Rook, rook_from);
        }

        if let Some(victim) = undo.captured {
            let victim_sq = if flag == MoveFlag::EnPassant {
                to.offset(-us.pawn_push())
            } else {
                to
            };
            self.put_piece(them, victim, victim_sq);
        }

        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
    }

    /// Passes the turn without moving; used by null-move pruning.
    pub fn make_null(&mut self) {
        self.undo_stack.push(Undo {
            mv: Move::NULL,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
            captured: None,
        });
        if let Some(ep) = self.en_passant.take() {
            self.hash ^= ZOBRIST.en_passant(ep);
        }
        self.halfmove_clock += 1;
        self.side_to_move = self.side_to_move.opponent();
        self.hash ^= ZOBRIST.side();
    }

    /// Reverts the most recent [`Position::make_null`].
    pub fn unmake_null(&mut self) {
        let undo = self.undo_stack.pop().expect("unmake_null without make_null");
        debug_assert!(undo.mv.is_null(), "unmake_null out of order");
        self.side_to_move = self.side_to_move.opponent();
        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
    }

    // ---- history ---------------------------------------------------------

    /// Number of moves recorded since the last FEN load.
    #[inline]
    pub fn history_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Counts earlier occurrences of the current position, scanning no
    /// further back than the halfmove clock allows. Also reports whether
    /// any occurrence lies at or beyond `root` (a value previously taken
    /// from [`Position::history_len`]), i.e. inside the current search.
    pub fn repetitions(&self, root: usize) -> (u32, bool) {
        let len = self.undo_stack.len();
        let limit = len.saturating_sub(self.halfmove_clock as usize);
        let mut count = 0;
        let mut since_root = false;
        for i in (limit..len).rev() {
            if self.undo_stack[i].hash == self.hash {
                count += 1;
                if i >= root {
                    since_root = true;
                }
            }
        }
        (count, since_root)
    }

    /// Recomputes the Zobrist hash from scratch. The incremental hash must
    /// always agree with this.
    pub fn recomputed_hash(&self) -> u64 {
        let mut hash = 0u64;
        for color in [Color::White, Color::Black] {
            for piece in Piece::ALL {
                for sq in self.pieces[slot(color, piece)] {
                    hash ^= ZOBRIST.piece(color, piece, sq);
                }
            }
        }
        if self.side_to_move == Color::Black {
            hash ^= ZOBRIST.side();
        }
        hash ^= ZOBRIST.castling(self.castling.bits());
        if let Some(ep) = self.en_passant {
            hash ^= ZOBRIST.en_passant(ep);
        }
        hash
    }

    // ---- internals -------------------------------------------------------

    #[inline]
    fn put_piece(&mut self, color: Color, piece: Piece, sq: Square) {
        self.pieces[slot(color, piece)].set(sq);
        self.by_color[color.index()].set(sq);
        self.occupied.set(sq);
        self.hash ^= ZOBRIST.piece(color, piece, sq);
    }

    #[inline]
    fn remove_piece(&mut self, color: Color, piece: Piece, sq: Square) {
        self.pieces[slot(color, piece)].clear(sq);
        self.by_color[color.index()].clear(sq);
        self.occupied.clear(sq);
        self.hash ^= ZOBRIST.piece(color, piece, sq);
    }
}

/// Rook origin and destination for a castling move of `color`.
#[inline]
fn rook_castle_squares(color: Color, flag: MoveFlag) -> (Square, Square) {
    match (color, flag) {
        (Color::White, MoveFlag::CastleKingside) => (Square::H1, Square::F1),
        (Color::White, MoveFlag::CastleQueenside) => (Square::A1, Square::D1),
        (Color::Black, MoveFlag::CastleKingside) => (Square::H8, Square::F8),
        (Color::Black, MoveFlag::CastleQueenside) => (Square::A8, Square::D8),
        _ => unreachable!("not a castling flag"),
    }
}

impl PartialEq for Position {
    /// Positions compare by board state; move history is not identity.
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
            && self.side_to_move == other.side_to_move
            && self.castling == other.castling
            && self.en_passant == other.en_passant
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
    }
}

impl Eq for Position {}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn startpos_invariants() {
        let pos = Position::startpos();
        assert_eq!(pos.occupied().count(), 32);
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.castling(), CastlingRights::ALL);
        assert_eq!(pos.hash(), pos.recomputed_hash());
        assert_eq!(pos.king_square(Color::White), Square::E1);
        assert_eq!(pos.king_square(Color::Black), Square::E8);
    }

    #[test]
    fn fen_round_trip() {
        for fen in [
            Fen::STARTPOS,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w - - 12 34",
        ] {
            let pos = Position::from_fen(fen).unwrap();
            assert_eq!(pos.to_fen(), fen);
        }
    }

    #[test]
    fn fen_rejects_missing_king() {
        assert!(Position::from_fen("8/8/8/8/8/8/8/K7 w - - 0 1").is_err());
        assert!(Position::from_fen("kk6/8/8/8/8/8/8/K7 w - - 0 1").is_err());
    }

    #[test]
    fn fen_rejects_back_rank_pawn() {
        assert!(Position::from_fen("P3k3/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
    }

    #[test]
    fn set_from_fen_clears_history() {
        let mut pos = Position::startpos();
        assert!(pos.make_move(Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePush)));
        assert_eq!(pos.history_len(), 1);
        pos.set_from_fen(Fen::STARTPOS).unwrap();
        assert_eq!(pos.history_len(), 0);
    }

    #[test]
    fn make_unmake_restores_exactly() {
        let mut pos = Position::startpos();
        let snapshot = pos.clone();
        let mv = Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePush);
        assert!(pos.make_move(mv));
        assert_eq!(pos.en_passant(), Some(sq("e3")));
        assert_eq!(pos.hash(), pos.recomputed_hash());
        pos.unmake_move(mv);
        assert_eq!(pos, snapshot);
        assert_eq!(pos.hash(), snapshot.hash());
    }

    #[test]
    fn capture_and_restore() {
        let mut pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2")
                .unwrap();
        let snapshot = pos.clone();
        let mv = Move::quiet(sq("e4"), sq("d5"));
        assert!(pos.make_move(mv));
        assert_eq!(pos.piece_on(sq("d5")), Some((Piece::Pawn, Color::White)));
        assert_eq!(pos.halfmove_clock(), 0);
        pos.unmake_move(mv);
        assert_eq!(pos, snapshot);
        assert_eq!(pos.hash(), snapshot.hash());
    }

    #[test]
    fn en_passant_capture_removes_bypassed_pawn() {
        let mut pos =
            Position::from_fen("rnbqkbnr/pppp1ppp/8/4pP2/8/8/PPPPP1PP/RNBQKBNR w KQkq e6 0 3")
                .unwrap();
        let snapshot = pos.clone();
        let mv = Move::new(sq("f5"), sq("e6"), MoveFlag::EnPassant);
        assert!(pos.make_move(mv));
        assert_eq!(pos.piece_on(sq("e5")), None);
        assert_eq!(pos.piece_on(sq("e6")), Some((Piece::Pawn, Color::White)));
        assert_eq!(pos.hash(), pos.recomputed_hash());
        pos.unmake_move(mv);
        assert_eq!(pos, snapshot);
    }

    #[test]
    fn promotion_replaces_pawn() {
        let mut pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mv = Move::new(sq("a7"), sq("a8"), MoveFlag::PromoteQueen);
        assert!(pos.make_move(mv));
        assert_eq!(pos.piece_on(sq("a8")), Some((Piece::Queen, Color::White)));
        assert!(pos.piece_bb(Color::White, Piece::Pawn).is_empty());
        pos.unmake_move(mv);
        assert_eq!(pos.piece_on(sq("a7")), Some((Piece::Pawn, Color::White)));
        assert!(pos.piece_bb(Color::White, Piece::Queen).is_empty());
    }

    #[test]
    fn castling_moves_rook_and_clears_rights() {
        let mut pos =
            Position::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let snapshot = pos.clone();
        let mv = Move::new(Square::E1, Square::G1, MoveFlag::CastleKingside);
        assert!(pos.make_move(mv));
        assert_eq!(pos.piece_on(Square::G1), Some((Piece::King, Color::White)));
        assert_eq!(pos.piece_on(Square::F1), Some((Piece::Rook, Color::White)));
        assert!(!pos.castling().kingside(Color::White));
        assert!(!pos.castling().queenside(Color::White));
        assert!(pos.castling().kingside(Color::Black));
        assert_eq!(pos.hash(), pos.recomputed_hash());
        pos.unmake_move(mv);
        assert_eq!(pos, snapshot);
        assert_eq!(pos.hash(), snapshot.hash());
    }

    #[test]
    fn rook_capture_clears_opponent_rights() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = Move::quiet(Square::H1, Square::H8);
        assert!(pos.make_move(mv));
        // Mover's kingside right goes with the rook leaving h1, the
        // opponent's with the rook captured on h8.
        assert!(!pos.castling().kingside(Color::White));
        assert!(!pos.castling().kingside(Color::Black));
        assert!(pos.castling().queenside(Color::White));
        assert!(pos.castling().queenside(Color::Black));
    }

    #[test]
    fn illegal_move_is_rewound() {
        // The e2 knight is absolutely pinned by the e3 rook.
        let mut pos = Position::from_fen("4k3/8/8/8/8/4r3/4N3/4K3 w - - 0 1").unwrap();
        let bad = Move::quiet(sq("e2"), sq("c3"));
        assert!(!pos.make_move(bad));
        assert_eq!(pos.to_fen(), "4k3/8/8/8/8/4r3/4N3/4K3 w - - 0 1");
        assert_eq!(pos.hash(), pos.recomputed_hash());
        assert_eq!(pos.history_len(), 0);
    }

    #[test]
    fn null_move_round_trip() {
        let mut pos =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
                .unwrap();
        let snapshot = pos.clone();
        pos.make_null();
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.en_passant(), None);
        assert_eq!(pos.hash(), pos.recomputed_hash());
        pos.unmake_null();
        assert_eq!(pos, snapshot);
        assert_eq!(pos.hash(), snapshot.hash());
    }

    #[test]
    fn attack_tests() {
        let pos = Position::startpos();
        assert!(pos.is_attacked(sq("e3"), Color::White));
        assert!(!pos.is_attacked(sq("e4"), Color::White));
        assert!(!pos.in_check());

        let check =
            Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        assert!(check.in_check());
    }

    #[test]
    fn repetition_detection() {
        let mut pos = Position::startpos();
        let out = [
            Move::quiet(sq("g1"), sq("f3")),
            Move::quiet(sq("g8"), sq("f6")),
            Move::quiet(sq("f3"), sq("g1")),
            Move::quiet(sq("f6"), sq("g8")),
        ];
        for mv in out {
            assert!(pos.make_move(mv));
        }
        // Back to the starting position once.
        let (count, since) = pos.repetitions(0);
        assert_eq!(count, 1);
        assert!(since);
        for mv in out {
            assert!(pos.make_move(mv));
        }
        let (count, _) = pos.repetitions(0);
        assert_eq!(count, 2);
    }

    #[test]
    fn fullmove_counter() {
        let mut pos = Position::startpos();
        assert!(pos.make_move(Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePush)));
        assert_eq!(pos.fullmove_number(), 1);
        assert!(pos.make_move(Move::new(sq("e7"), sq("e5"), MoveFlag::DoublePush)));
        assert_eq!(pos.fullmove_number(), 2);
    }

    #[test]
    fn has_non_pawn_material_flags() {
        let kp = Position::from_fen("4k3/4p3/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        assert!(!kp.has_non_pawn_material(Color::White));
        assert!(!kp.has_non_pawn_material(Color::Black));
        let knight = Position::from_fen("4k3/8/8/8/8/8/4P3/1N2K3 w - - 0 1").unwrap();
        assert!(knight.has_non_pawn_material(Color::White));
        assert!(!knight.has_non_pawn_material(Color::Black));
    }
}
