use std::str::FromStr;

use anthracite::board::{Board, MoveGen};
use anthracite::search::{search, SearchState};
use anthracite::types::{SCORE_MATE, MAX_PLY};

fn silent_state() -> SearchState {
    let mut s = SearchState::new();
    s.silent = true;
    s
}

#[test]
fn search_is_deterministic_given_a_fresh_table() {
    anthracite::board::init();
    let board = Board::default();

    let mut a = silent_state();
    let result_a = search(&board, &mut a, 4);

    let mut b = silent_state();
    let result_b = search(&board, &mut b, 4);

    assert_eq!(result_a.best_move, result_b.best_move);
    assert_eq!(result_a.score, result_b.score);
}

#[test]
fn best_move_is_always_legal() {
    anthracite::board::init();
    let positions = [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    ];

    for fen in positions {
        let board = Board::from_str(fen).unwrap();
        let mut state = silent_state();
        let result = search(&board, &mut state, 4);
        let best = result.best_move.expect("position should have a legal move");
        assert!(board.legal(best), "search returned illegal move {} for {}", best, fen);
    }
}

#[test]
fn finds_checkmate_in_one() {
    anthracite::board::init();
    // Scholar's-mate pattern: Qxf7 is mate.
    let board = Board::from_str("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4").unwrap();
    let mut state = silent_state();
    let result = search(&board, &mut state, 3);
    assert!(result.score.abs() >= SCORE_MATE - MAX_PLY as i32, "expected a mate score, got {}", result.score);
}

#[test]
fn detects_stalemate_as_draw() {
    anthracite::board::init();
    let board = Board::from_str("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
    let mut state = silent_state();
    let result = search(&board, &mut state, 3);
    assert_eq!(result.score, 0);
}

#[test]
fn threefold_repetition_is_scored_as_draw() {
    anthracite::board::init();
    let board = Board::default();
    let mut state = silent_state();
    // Pretend we've already seen this exact position twice before.
    state.position_history.push(board.get_hash());
    state.position_history.push(board.get_hash());
    let result = search(&board, &mut state, 3);
    assert_eq!(result.score, 0);
}

#[test]
fn quiet_startpos_search_does_not_lose_material_in_its_pv() {
    anthracite::board::init();
    let board = Board::default();
    let mut state = silent_state();
    let result = search(&board, &mut state, 5);
    assert!(result.score.abs() < 200, "startpos eval should stay near equal, got {}", result.score);
}

#[test]
fn search_respects_an_already_tripped_stop_flag() {
    anthracite::board::init();
    let board = Board::default();
    let mut state = silent_state();
    state.stop.store(true, std::sync::atomic::Ordering::SeqCst);
    let result = search(&board, &mut state, 10);
    // A pre-tripped stop flag still has to return *some* legal move from
    // the first, shallowest iteration rather than panicking or hanging.
    assert!(result.best_move.is_none() || board.legal(result.best_move.unwrap()));
}

#[test]
fn deeper_search_never_returns_fewer_nodes_than_a_shallower_one() {
    anthracite::board::init();
    let board = Board::default();

    let mut shallow = silent_state();
    let shallow_result = search(&board, &mut shallow, 2);

    let mut deep = silent_state();
    let deep_result = search(&board, &mut deep, 4);

    assert!(deep_result.nodes >= shallow_result.nodes);
}

#[test]
fn resizing_the_hash_table_does_not_panic() {
    anthracite::board::init();
    let mut state = silent_state();
    state.resize_tt(1);
    let board = Board::default();
    let result = search(&board, &mut state, 3);
    assert!(result.best_move.is_some());
}

#[test]
fn won_kp_vs_k_endgame_scores_clearly_better_for_the_pawn_side() {
    anthracite::board::init();
    let board = Board::from_str("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
    let mut state = silent_state();
    let result = search(&board, &mut state, 10);
    assert!(result.score >= 400, "expected a clearly winning score, got {}", result.score);
}

#[test]
fn stop_flag_tripped_mid_search_halts_promptly() {
    anthracite::board::init();
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    let board = Board::default();
    let mut state = silent_state();
    let stop = Arc::clone(&state.stop);

    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::SeqCst);
    });

    let started = Instant::now();
    let result = search(&board, &mut state, MAX_PLY as u8);
    let elapsed = started.elapsed();
    handle.join().unwrap();

    assert!(result.best_move.is_some());
    assert!(elapsed < Duration::from_millis(500), "search took {:?} to notice the stop flag", elapsed);
}

#[test]
fn mate_in_one_is_found_among_legal_moves_for_side_to_move() {
    anthracite::board::init();
    let board = Board::from_str("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
    let mut state = silent_state();
    let result = search(&board, &mut state, 3);
    let best = result.best_move.unwrap();
    let legal_moves: Vec<_> = MoveGen::new_legal(&board).collect();
    assert!(legal_moves.contains(&best));
}
