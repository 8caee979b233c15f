//! UCI front-end. Reads commands from stdin, drives one `SearchState`
//! across the game, and reports through the search module's `Reporter` so
//! `info`/`bestmove` formatting lives in exactly one place.

use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::board::{Board, ChessMove, File, Piece, Rank, Square};
use crate::book::Book;
use crate::search::SearchState;
use crate::threads;
use crate::time_manager::{self, GoTime};
use crate::types::{EngineConfig, DEFAULT_DEPTH};

pub fn run(mut config: EngineConfig) {
    let stdin = io::stdin();

    let mut board = Board::default();
    let mut search_state: Option<SearchState> = Some(SearchState::new_with_hash(config.hash_mb));
    let mut stop_flag: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
    let mut search_thread: Option<thread::JoinHandle<SearchState>> = None;
    let mut position_history: Vec<u64> = Vec::new();
    let mut book: Option<Book> = None;

    if let Some(ref path) = config.syzygy_path {
        if let Some(ref mut ss) = search_state {
            ss.load_syzygy(path);
        }
    }
    if config.own_book {
        if let Some(ref path) = config.book_file {
            book = Book::load(path).ok();
        }
    }

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        match tokens[0] {
            "uci" => {
                println!("id name anthracite");
                println!("id author the anthracite developers");
                println!("option name Hash type spin default 64 min 1 max 4096");
                println!("option name Threads type spin default 1 min 1 max 256");
                println!("option name MoveOverhead type spin default 30 min 0 max 5000");
                println!("option name Contempt type spin default 0 min -100 max 100");
                println!("option name MultiPV type spin default 1 min 1 max 1");
                println!("option name SyzygyPath type string default <empty>");
                println!("option name OwnBook type check default false");
                println!("option name BookFile type string default <empty>");
                println!("option name BookLearning type check default false");
                println!("option name BookRandom type check default false");
                println!("option name Style_Aggression type spin default 0 min 0 max 100");
                println!("option name Style_Risk type spin default 0 min 0 max 100");
                println!("option name Style_Activity type spin default 0 min 0 max 100");
                println!("uciok");
            }
            "isready" => {
                wait_for_search(&mut search_thread, &mut search_state);
                println!("readyok");
            }
            "ucinewgame" => {
                wait_for_search(&mut search_thread, &mut search_state);
                board = Board::default();
                position_history.clear();
                if let Some(ref mut ss) = search_state {
                    ss.tt.clear();
                }
            }
            "position" => {
                wait_for_search(&mut search_thread, &mut search_state);
                parse_position(&tokens, &mut board, &mut position_history);
            }
            "go" => {
                wait_for_search(&mut search_thread, &mut search_state);

                let (go_time, depth) = parse_go(&tokens);

                if config.own_book {
                    if let Some(mv) = book.as_ref().and_then(|b| book_move(b, &board)) {
                        println!("bestmove {}", mv);
                        continue;
                    }
                }

                if let Some(ref ss) = search_state {
                    if let Some(ref syzygy) = ss.syzygy {
                        if let Some(root) = syzygy.probe_root(&board) {
                            println!("bestmove {}", root.uci_move);
                            continue;
                        }
                    }
                }

                let max_depth = depth.unwrap_or(DEFAULT_DEPTH);
                let mut ss = search_state.take().expect("search state missing");
                ss.reset();
                ss.position_history = position_history.clone();
                ss.contempt = config.contempt;
                ss.budget = time_manager::compute_budget(
                    &go_time,
                    board.side_to_move(),
                    board.phase(),
                    0,
                    0,
                    config.move_overhead_ms,
                );

                stop_flag = ss.stop.clone();
                let threads_n = config.threads;
                let board_copy = board;

                search_thread = Some(thread::spawn(move || {
                    let _ = threads::search_parallel(&board_copy, &mut ss, threads_n, max_depth);
                    ss
                }));
            }
            "stop" => {
                stop_flag.store(true, Ordering::SeqCst);
                wait_for_search(&mut search_thread, &mut search_state);
            }
            "setoption" => {
                wait_for_search(&mut search_thread, &mut search_state);
                if let Some(ref mut ss) = search_state {
                    parse_setoption(&tokens, &mut config, ss, &mut book);
                }
            }
            "quit" => {
                stop_flag.store(true, Ordering::SeqCst);
                wait_for_search(&mut search_thread, &mut search_state);
                break;
            }
            "d" | "print" => {
                println!("{}", board);
            }
            _ => {}
        }
    }
}

/// Wait for a running search thread to finish and recover the `SearchState`.
fn wait_for_search(handle: &mut Option<thread::JoinHandle<SearchState>>, state: &mut Option<SearchState>) {
    if let Some(h) = handle.take() {
        match h.join() {
            Ok(ss) => *state = Some(ss),
            Err(_) => *state = Some(SearchState::new()),
        }
    }
}

/// Picks a book move. `BookRandom` is accepted but not yet honored — this
/// always plays the highest-weighted move (see DESIGN.md).
fn book_move(book: &Book, board: &Board) -> Option<ChessMove> {
    let candidates = book.probe(board.get_hash());
    let best = crate::book::best_move(&candidates)?;
    let (from, to, promo) = crate::book::decode_move(best.polyglot_move);
    let src = Square::new(from);
    let dst = Square::new(to);
    let promotion = match promo {
        Some(1) => Some(Piece::Knight),
        Some(2) => Some(Piece::Bishop),
        Some(3) => Some(Piece::Rook),
        Some(4) => Some(Piece::Queen),
        _ => None,
    };
    let mv = ChessMove::new(src, dst, promotion);
    if board.legal(mv) {
        Some(mv)
    } else {
        None
    }
}

fn parse_go(tokens: &[&str]) -> (GoTime, Option<u8>) {
    let mut go = GoTime::default();
    let mut depth: Option<u8> = None;
    let mut i = 1;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                if i < tokens.len() {
                    depth = tokens[i].parse().ok();
                }
            }
            "movetime" => {
                i += 1;
                if i < tokens.len() {
                    go.movetime = tokens[i].parse().ok();
                }
            }
            "wtime" => {
                i += 1;
                if i < tokens.len() {
                    go.wtime = tokens[i].parse().ok();
                }
            }
            "btime" => {
                i += 1;
                if i < tokens.len() {
                    go.btime = tokens[i].parse().ok();
                }
            }
            "winc" => {
                i += 1;
                if i < tokens.len() {
                    go.winc = tokens[i].parse().ok();
                }
            }
            "binc" => {
                i += 1;
                if i < tokens.len() {
                    go.binc = tokens[i].parse().ok();
                }
            }
            "movestogo" => {
                i += 1;
                if i < tokens.len() {
                    go.movestogo = tokens[i].parse().ok();
                }
            }
            "infinite" => {
                go.infinite = true;
            }
            // Ponder mode and explicit search-move restriction are accepted
            // syntactically but not yet acted on.
            "ponder" => {}
            "searchmoves" => {
                while i + 1 < tokens.len() && tokens[i + 1].len() >= 4 && tokens[i + 1].as_bytes()[0].is_ascii_lowercase() {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    (go, depth)
}

fn parse_position(tokens: &[&str], board: &mut Board, history: &mut Vec<u64>) {
    if tokens.len() < 2 {
        return;
    }

    let mut idx = 1;

    if tokens[idx] == "startpos" {
        *board = Board::default();
        idx += 1;
    } else if tokens[idx] == "fen" {
        idx += 1;
        let mut fen_parts: Vec<&str> = Vec::new();
        while idx < tokens.len() && tokens[idx] != "moves" && fen_parts.len() < 6 {
            fen_parts.push(tokens[idx]);
            idx += 1;
        }
        if fen_parts.len() >= 4 {
            let fen_str = fen_parts.join(" ");
            match Board::from_str(&fen_str) {
                Ok(b) => *board = b,
                Err(_) => return,
            }
        } else {
            return;
        }
    } else {
        return;
    }

    history.clear();
    history.push(board.get_hash());

    if idx < tokens.len() && tokens[idx] == "moves" {
        idx += 1;
        for &move_str in &tokens[idx..] {
            if let Some(m) = parse_uci_move(board, move_str) {
                *board = board.make_move_new(m);
                history.push(board.get_hash());
            }
        }
    }
}

/// Parse a UCI move string directly into squares + optional promotion piece.
/// Zero heap allocations (no move generation/string comparison).
fn parse_uci_move(board: &Board, move_str: &str) -> Option<ChessMove> {
    if move_str.len() < 4 {
        return None;
    }
    let bytes = move_str.as_bytes();

    let src_file = bytes[0].wrapping_sub(b'a');
    let src_rank = bytes[1].wrapping_sub(b'1');
    let dst_file = bytes[2].wrapping_sub(b'a');
    let dst_rank = bytes[3].wrapping_sub(b'1');

    if src_file >= 8 || src_rank >= 8 || dst_file >= 8 || dst_rank >= 8 {
        return None;
    }

    let src = Square::make_square(Rank::from_index(src_rank as usize), File::from_index(src_file as usize));
    let dst = Square::make_square(Rank::from_index(dst_rank as usize), File::from_index(dst_file as usize));

    let promo = if move_str.len() >= 5 {
        match bytes[4] {
            b'q' => Some(Piece::Queen),
            b'r' => Some(Piece::Rook),
            b'b' => Some(Piece::Bishop),
            b'n' => Some(Piece::Knight),
            _ => None,
        }
    } else {
        None
    };

    let mv = ChessMove::new(src, dst, promo);
    if board.legal(mv) {
        Some(mv)
    } else {
        None
    }
}

fn parse_setoption(tokens: &[&str], config: &mut EngineConfig, state: &mut SearchState, book: &mut Option<Book>) {
    let name_idx = tokens.iter().position(|&t| t == "name");
    let value_idx = tokens.iter().position(|&t| t == "value");

    let Some(ni) = name_idx else { return };
    let name: String = match value_idx {
        Some(vi) => tokens[ni + 1..vi].join(" "),
        None => tokens[ni + 1..].join(" "),
    };
    let value: String = value_idx.map(|vi| tokens[vi + 1..].join(" ")).unwrap_or_default();

    match name.to_lowercase().as_str() {
        "hash" => {
            if let Ok(mb) = value.parse::<usize>() {
                config.hash_mb = mb.clamp(1, 4096);
                state.resize_tt(config.hash_mb);
            }
        }
        "threads" => {
            if let Ok(n) = value.parse::<usize>() {
                config.threads = n.clamp(1, 256);
            }
        }
        "moveoverhead" => {
            if let Ok(ms) = value.parse::<u64>() {
                config.move_overhead_ms = ms;
            }
        }
        "contempt" => {
            if let Ok(c) = value.parse::<i32>() {
                config.contempt = c.clamp(-100, 100);
            }
        }
        "multipv" => {
            if let Ok(n) = value.parse::<usize>() {
                if n > 1 {
                    println!("info string MultiPV > 1 is not supported, clamping to 1");
                }
                config.multi_pv = n.clamp(1, 1);
            }
        }
        "syzygypath" => {
            if value.is_empty() || value == "<empty>" {
                config.syzygy_path = None;
                state.syzygy = None;
            } else {
                config.syzygy_path = Some(value.clone());
                state.load_syzygy(&value);
            }
        }
        "ownbook" => {
            config.own_book = value.eq_ignore_ascii_case("true");
            if config.own_book && book.is_none() {
                if let Some(ref path) = config.book_file {
                    *book = Book::load(path).ok();
                }
            }
        }
        "bookfile" => {
            config.book_file = if value.is_empty() { None } else { Some(value.clone()) };
            if config.own_book {
                *book = config.book_file.as_ref().and_then(|p| Book::load(p).ok());
            }
        }
        "booklearning" => {
            config.book_learning = value.eq_ignore_ascii_case("true");
        }
        "bookrandom" => {
            config.book_random = value.eq_ignore_ascii_case("true");
        }
        "style_aggression" => {
            if let Ok(v) = value.parse::<u8>() {
                config.style_weights.aggression = v.min(100);
            }
        }
        "style_risk" => {
            if let Ok(v) = value.parse::<u8>() {
                config.style_weights.risk = v.min(100);
            }
        }
        "style_activity" => {
            if let Ok(v) = value.parse::<u8>() {
                config.style_weights.activity = v.min(100);
            }
        }
        _ => {}
    }
}
