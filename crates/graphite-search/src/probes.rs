//! Opening-book and endgame-tablebase probe contracts.
//!
//! Both collaborators live outside this crate; their on-disk formats are
//! not part of the engine. The engine only depends on these probe
//! interfaces, consulted before a search starts. Probes are advisory: a
//! miss (or absent collaborator) simply falls through to the search.

use graphite_board::{generate_legal, Position};
use graphite_core::Move;

/// Pieces on the board at or below which tablebase probes apply.
pub const TABLEBASE_MEN: u32 = 5;

/// An opening book keyed by Zobrist hash.
pub trait OpeningBook: Send + Sync {
    /// Weighted candidate moves for a position; empty when out of book.
    fn lookup(&self, hash: u64) -> Vec<(Move, u32)>;
}

/// An endgame tablebase.
pub trait Tablebase: Send + Sync {
    /// Win/draw/loss value from the side to move's perspective, if the
    /// position is covered.
    fn probe_wdl(&self, pos: &Position) -> Option<i32>;

    /// Best root move and distance-to-zeroing, if covered.
    fn probe_root(&self, pos: &Position) -> Option<(Move, u32)>;
}

/// Consults the book first, then the tablebase (only at or below
/// [`TABLEBASE_MEN`] pieces). Any returned move is validated against the
/// legal moves of the position.
pub fn consult(
    book: Option<&dyn OpeningBook>,
    tablebase: Option<&dyn Tablebase>,
    pos: &Position,
) -> Option<Move> {
    let mut probe_pos = pos.clone();
    let legal = generate_legal(&mut probe_pos);
    let is_legal = |mv: Move| legal.iter().any(|&m| m == mv);

    if let Some(book) = book {
        let candidates = book.lookup(pos.hash());
        if let Some(&(mv, _)) = candidates.iter().max_by_key(|(_, weight)| *weight) {
            if is_legal(mv) {
                return Some(mv);
            }
        }
    }

    if let Some(tablebase) = tablebase {
        if pos.occupied().count() <= TABLEBASE_MEN {
            if let Some((mv, _)) = tablebase.probe_root(pos) {
                if is_legal(mv) {
                    return Some(mv);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphite_core::Square;
    use std::collections::HashMap;

    struct MapBook(HashMap<u64, Vec<(Move, u32)>>);

    impl OpeningBook for MapBook {
        fn lookup(&self, hash: u64) -> Vec<(Move, u32)> {
            self.0.get(&hash).cloned().unwrap_or_default()
        }
    }

    struct OneMoveTablebase(Move);

    impl Tablebase for OneMoveTablebase {
        fn probe_wdl(&self, _pos: &Position) -> Option<i32> {
            Some(2)
        }
        fn probe_root(&self, _pos: &Position) -> Option<(Move, u32)> {
            Some((self.0, 1))
        }
    }

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn book_hit_picks_heaviest_legal_move() {
        let pos = Position::startpos();
        let e4 = Move::new(sq("e2"), sq("e4"), graphite_core::MoveFlag::DoublePush);
        let nf3 = Move::quiet(sq("g1"), sq("f3"));
        let mut map = HashMap::new();
        map.insert(pos.hash(), vec![(nf3, 10), (e4, 90)]);
        let book = MapBook(map);

        assert_eq!(consult(Some(&book), None, &pos), Some(e4));
    }

    #[test]
    fn book_miss_falls_through() {
        let pos = Position::startpos();
        let book = MapBook(HashMap::new());
        assert_eq!(consult(Some(&book), None, &pos), None);
    }

    #[test]
    fn illegal_book_move_is_rejected() {
        let pos = Position::startpos();
        let bogus = Move::quiet(sq("e2"), sq("e5"));
        let mut map = HashMap::new();
        map.insert(pos.hash(), vec![(bogus, 100)]);
        let book = MapBook(map);
        assert_eq!(consult(Some(&book), None, &pos), None);
    }

    #[test]
    fn tablebase_only_consulted_at_low_material() {
        let mv = Move::quiet(sq("a1"), sq("a8"));
        let tb = OneMoveTablebase(mv);

        // Four men: probed.
        let few = Position::from_fen("6k1/5pp1/8/8/8/8/8/R6K w - - 0 1").unwrap();
        assert_eq!(few.occupied().count(), 5);
        assert_eq!(consult(None, Some(&tb), &few), Some(mv));

        // Full board: not probed.
        let full = Position::startpos();
        assert_eq!(consult(None, Some(&tb), &full), None);
    }
}
