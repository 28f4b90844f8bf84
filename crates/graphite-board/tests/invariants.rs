//! Global position invariants, exercised by random legal-move walks.

use graphite_board::{generate_legal, Bitboard, Position};
use graphite_core::{Color, Piece};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn assert_invariants(pos: &Position, context: &str) {
    // Exactly one king per side.
    assert_eq!(pos.piece_bb(Color::White, Piece::King).count(), 1, "{}", context);
    assert_eq!(pos.piece_bb(Color::Black, Piece::King).count(), 1, "{}", context);

    // Occupancy equals the union of all twelve piece sets, and no square
    // is claimed by two sets.
    let mut union = Bitboard::EMPTY;
    let mut total = 0;
    for color in [Color::White, Color::Black] {
        for piece in Piece::ALL {
            let bb = pos.piece_bb(color, piece);
            union |= bb;
            total += bb.count();
        }
    }
    assert_eq!(union, pos.occupied(), "{}", context);
    assert_eq!(total, pos.occupied().count(), "{}", context);

    // Incremental hash agrees with a from-scratch fold.
    assert_eq!(pos.hash(), pos.recomputed_hash(), "{}", context);

    // FEN round-trips.
    let fen = pos.to_fen();
    let reparsed = Position::from_fen(&fen).unwrap();
    assert_eq!(&reparsed, pos, "{}", context);
    assert_eq!(reparsed.hash(), pos.hash(), "{}", context);
}

/// Walks random legal moves, unmaking a random suffix now and then, and
/// checks every invariant at each step.
#[test]
fn random_walk_preserves_invariants() {
    let mut rng = StdRng::seed_from_u64(0x9E37_79B9);
    let mut pos = Position::startpos();
    let mut played = Vec::new();

    for step in 0..2_000 {
        let moves = generate_legal(&mut pos);
        if moves.is_empty() || pos.halfmove_clock() >= 100 {
            // Game over; rewind everything and keep walking.
            while let Some(mv) = played.pop() {
                pos.unmake_move(mv);
            }
            continue;
        }

        let mv = moves[rng.random_range(0..moves.len())];
        assert!(pos.make_move(mv));
        played.push(mv);
        assert_invariants(&pos, &format!("after {} at step {}", mv, step));

        // Occasionally back out a few moves to exercise unmake.
        if rng.random_range(0..8) == 0 {
            let n = rng.random_range(0..=played.len().min(6));
            for _ in 0..n {
                let mv = played.pop().unwrap();
                pos.unmake_move(mv);
                assert_invariants(&pos, &format!("after unmaking {} at step {}", mv, step));
            }
        }
    }
}

#[test]
fn full_rewind_restores_start() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut pos = Position::startpos();
    let start_fen = pos.to_fen();
    let start_hash = pos.hash();
    let mut played = Vec::new();

    for _ in 0..300 {
        let moves = generate_legal(&mut pos);
        if moves.is_empty() {
            break;
        }
        let mv = moves[rng.random_range(0..moves.len())];
        assert!(pos.make_move(mv));
        played.push(mv);
    }
    while let Some(mv) = played.pop() {
        pos.unmake_move(mv);
    }
    assert_eq!(pos.to_fen(), start_fen);
    assert_eq!(pos.hash(), start_hash);
    assert_eq!(pos.history_len(), 0);
}
