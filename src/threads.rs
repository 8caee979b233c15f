//! Lazy-SMP thread coordination. One main thread drives
//! iterative deepening and reporting; `Threads - 1` helper threads run the
//! same search with independent move-ordering state, sharing the
//! transposition table, the stop flag, and the node counter with the primary.
//!
//! The table is atomic-packed (see `tt.rs`) so it's `Sync` without any
//! locking or `unsafe`: every helper clones the primary's `Arc` rather than
//! building its own table, and readers re-validate every field they load, so
//! racing writers from different threads just look like an ordinary miss or
//! stale hit, never a crash.
use std::sync::atomic::Ordering;
use std::thread;

use crate::board::Board;
use crate::search::{self, SearchState};
use crate::types::SearchResult;

/// Runs `threads` copies of the search in parallel and returns the main
/// thread's result with node counts from every helper folded in. Helper
/// threads search to a depth offset by `i % 3` and a distinct root-move
/// seed so they don't all converge on identical lines, and don't report
/// `info` lines or influence the reported PV.
pub fn search_parallel(board: &Board, primary: &mut SearchState, threads: usize, max_depth: u8) -> SearchResult {
    if threads <= 1 {
        return search::search(board, primary, max_depth);
    }

    let shared_stop = primary.stop.clone();
    let board_copy = *board;

    let helpers: Vec<_> = (1..threads)
        .map(|i| {
            let mut helper_state = SearchState::new_with_hash(primary.hash_mb);
            helper_state.tt = primary.tt.clone();
            helper_state.stop = shared_stop.clone();
            helper_state.silent = true;
            helper_state.root_seed = i as u64;
            let depth_offset = (i % 3) as u8;
            let helper_depth = max_depth.saturating_add(depth_offset);
            thread::spawn(move || search::search(&board_copy, &mut helper_state, helper_depth))
        })
        .collect();

    let mut result = search::search(board, primary, max_depth);

    shared_stop.store(true, Ordering::SeqCst);
    for h in helpers {
        if let Ok(helper_result) = h.join() {
            result.nodes += helper_result.nodes;
        }
    }

    result
}
