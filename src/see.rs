//! Static Exchange Evaluation: iterative attacker swap-off on a
//! single square, with x-ray attackers re-derived from scratch after each
//! removal rather than maintained incrementally.

use crate::board::attacks::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::board::{BitBoard, Board, ChessMove, Color, Piece, Square};
use crate::pst::MVV_VALUE;
use crate::types::Score;

fn attackers_to(board: &Board, sq: Square, occupied: BitBoard) -> BitBoard {
    let mut attackers = BitBoard(0);
    attackers |= knight_attacks(sq) & board.pieces(Piece::Knight);
    attackers |= king_attacks(sq) & board.pieces(Piece::King);
    attackers |= pawn_attacks(Color::White, sq) & board.pieces(Piece::Pawn) & board.color_combined(Color::Black);
    attackers |= pawn_attacks(Color::Black, sq) & board.pieces(Piece::Pawn) & board.color_combined(Color::White);
    let diag = bishop_attacks(sq, occupied) & (board.pieces(Piece::Bishop) | board.pieces(Piece::Queen));
    let orth = rook_attacks(sq, occupied) & (board.pieces(Piece::Rook) | board.pieces(Piece::Queen));
    attackers |= diag & occupied;
    attackers |= orth & occupied;
    attackers & occupied
}

fn least_valuable_attacker(board: &Board, attackers: BitBoard, side: Color) -> Option<(Square, Piece)> {
    let ours = attackers & board.color_combined(side);
    if ours.is_empty() {
        return None;
    }
    for piece in Piece::ALL {
        let candidates = ours & board.pieces(piece);
        if !candidates.is_empty() {
            let sq = Square::new(candidates.0.trailing_zeros() as u8);
            return Some((sq, piece));
        }
    }
    None
}

fn piece_value(piece: Piece) -> Score {
    MVV_VALUE[piece.to_index()]
}

/// Static exchange evaluation for a capture: the net material swing (from
/// the mover's perspective) after both sides trade on the destination
/// square with their least valuable attacker, in order. Non-captures and
/// en passant aren't modeled — callers filter those out before calling.
pub fn see(board: &Board, mv: ChessMove) -> Score {
    let to = mv.get_dest();
    let from = mv.get_source();

    let Some(victim) = board.piece_on(to) else {
        return 0;
    };
    let Some(attacker) = board.piece_on(from) else {
        return 0;
    };

    let mut occupied = board.combined();
    occupied &= !BitBoard::from_square(from);

    // A promoting capture nets the victim plus the promoted piece's gain
    // over the pawn that made the capture, and the attacker that now sits
    // on `to` is the promoted piece, not the pawn, for the rest of the swap.
    let promoted = mv.get_promotion();
    let attacker_value = promoted.map(piece_value).unwrap_or_else(|| piece_value(attacker));
    let promotion_gain = promoted.map(|p| piece_value(p) - piece_value(attacker)).unwrap_or(0);

    let mut gains = [0 as Score; 32];
    let mut depth = 0usize;
    gains[0] = piece_value(victim) + promotion_gain;

    let mut side = !board.side_to_move();
    let mut attackers = attackers_to(board, to, occupied);
    let mut last_attacker_value = attacker_value;

    loop {
        let Some((sq, piece)) = least_valuable_attacker(board, attackers, side) else {
            break;
        };
        depth += 1;
        if depth >= gains.len() {
            break;
        }
        gains[depth] = last_attacker_value - gains[depth - 1];
        last_attacker_value = piece_value(piece);
        occupied &= !BitBoard::from_square(sq);
        attackers = attackers_to(board, to, occupied) & occupied;
        side = !side;
    }

    while depth > 0 {
        gains[depth - 1] = -((-gains[depth - 1]).max(gains[depth]));
        depth -= 1;
    }

    gains[0]
}

/// True when a capture wins material or trades evenly or better (`see >= 0`).
pub fn see_ge(board: &Board, mv: ChessMove, threshold: Score) -> bool {
    see(board, mv) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn free_pawn_capture_is_positive() {
        crate::board::init();
        // White rook takes an undefended black pawn.
        let board = Board::from_str("4k3/8/8/3p4/8/8/8/R3K3 w - - 0 1").unwrap();
        let mv = ChessMove::new(Square::new(0), Square::new(27), None);
        assert!(see(&board, mv) > 0);
    }

    #[test]
    fn losing_queen_for_pawn_is_negative() {
        crate::board::init();
        // White queen captures a pawn defended by a rook: loses the queen for a pawn.
        let board = Board::from_str("4k3/8/8/3p4/8/8/8/Q3K2r w - - 0 1").unwrap();
        let mv = ChessMove::new(Square::new(0), Square::new(27), None);
        assert!(see(&board, mv) < 0);
    }

    #[test]
    fn see_ge_threshold_respects_sign() {
        crate::board::init();
        let board = Board::from_str("4k3/8/8/3p4/8/8/8/R3K3 w - - 0 1").unwrap();
        let mv = ChessMove::new(Square::new(0), Square::new(27), None);
        assert!(see_ge(&board, mv, 0));
        assert!(!see_ge(&board, mv, 10_000));
    }
}
