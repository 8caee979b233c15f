use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::board::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece};

use crate::caches::{EvalCache, MaterialCache, PawnCache};
use crate::evaluation::evaluate;
use crate::history::{bonus, ButterflyHistory, CaptureHistory, ContinuationHistory, CounterMoveTable, Killers};
use crate::movegen::{order_captures, ContinuationContext, MovePicker};
use crate::see::see;
use crate::syzygy::SyzygyProber;
use crate::time_manager::TimeBudget;
use crate::tt::{TTFlag, TranspositionTable};
use crate::types::{Score, SearchResult, DEFAULT_HASH_MB, MAX_PLY, SCORE_INFINITY, SCORE_MATE};

/// A move one ply back, carried through recursion so quiet moves can be
/// scored against counter-move and follow-up history without a global stack.
type MoveContext = Option<(Piece, usize)>;

/// Decouples `info`/`bestmove` formatting from the search loop so the UCI
/// front-end and benches/tests can supply different sinks for the same
/// iterative deepener.
pub trait Reporter {
    fn info(&mut self, depth: u8, seldepth: u8, score: Score, nodes: u64, nps: u64, time_ms: u64, hashfull: u32, pv: &[ChessMove]);
    fn best_move(&mut self, mv: Option<ChessMove>, ponder: Option<ChessMove>);
}

pub struct UciReporter;

impl Reporter for UciReporter {
    fn info(&mut self, depth: u8, seldepth: u8, score: Score, nodes: u64, nps: u64, time_ms: u64, hashfull: u32, pv: &[ChessMove]) {
        let pv_str: String = pv.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(" ");
        println!(
            "info depth {} seldepth {} {} nodes {} nps {} time {} hashfull {} pv {}",
            depth, seldepth, format_score(score), nodes, nps, time_ms, hashfull, pv_str
        );
    }

    fn best_move(&mut self, mv: Option<ChessMove>, _ponder: Option<ChessMove>) {
        match mv {
            Some(m) => println!("bestmove {}", m),
            None => println!("bestmove 0000"),
        }
    }
}

struct NullReporter;

impl Reporter for NullReporter {
    fn info(&mut self, _: u8, _: u8, _: Score, _: u64, _: u64, _: u64, _: u32, _: &[ChessMove]) {}
    fn best_move(&mut self, _: Option<ChessMove>, _: Option<ChessMove>) {}
}

/// Mutable state shared across one search's recursion.
pub struct SearchState {
    pub nodes: u64,
    pub seldepth: u8,
    pub start_time: Instant,
    pub stop: Arc<AtomicBool>,
    pub budget: TimeBudget,
    pub hash_mb: usize,
    pub silent: bool,
    /// Score assigned to a draw from the side-to-move's perspective; negative
    /// means "avoid draws", positive means "steer toward them".
    pub contempt: Score,
    /// Non-zero in Lazy-SMP helper threads: perturbs which root move gets
    /// tried first, so helpers diverge from the main thread's tree instead
    /// of re-exploring it in lockstep.
    pub root_seed: u64,

    pub tt: Arc<TranspositionTable>,
    pub pawn_cache: PawnCache,
    pub eval_cache: EvalCache,
    pub material_cache: MaterialCache,

    pub butterfly: ButterflyHistory,
    pub counter_move_hist: ContinuationHistory,
    pub followup_hist: ContinuationHistory,
    pub capture_hist: CaptureHistory,
    pub killers: Killers,
    pub counter_moves: CounterMoveTable,

    pub syzygy: Option<SyzygyProber>,
    pub root_best_move: Option<ChessMove>,
    pub root_ponder_move: Option<ChessMove>,
    pub position_history: Vec<u64>,

    score_history: Vec<Score>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::new_with_hash(DEFAULT_HASH_MB)
    }

    pub fn new_with_hash(mb: usize) -> Self {
        Self {
            nodes: 0,
            seldepth: 0,
            start_time: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
            budget: TimeBudget::unbounded(),
            hash_mb: mb,
            silent: false,
            contempt: 0,
            root_seed: 0,
            tt: Arc::new(TranspositionTable::new(mb)),
            pawn_cache: PawnCache::new(),
            eval_cache: EvalCache::new(),
            material_cache: MaterialCache::new(),
            butterfly: ButterflyHistory::new(),
            counter_move_hist: ContinuationHistory::new(),
            followup_hist: ContinuationHistory::new(),
            capture_hist: CaptureHistory::new(),
            killers: Killers::new(),
            counter_moves: CounterMoveTable::new(),
            syzygy: None,
            root_best_move: None,
            root_ponder_move: None,
            position_history: Vec::new(),
            score_history: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.nodes = 0;
        self.seldepth = 0;
        self.stop.store(false, Ordering::SeqCst);
        self.killers.clear();
        self.start_time = Instant::now();
        self.tt.new_search();
        self.root_best_move = None;
        self.root_ponder_move = None;
        self.score_history.clear();
    }

    /// Called once per iterative-deepening depth to keep history tables from
    /// growing stale across the game, not just within one search.
    fn decay_history(&mut self) {
        self.butterfly.decay();
        self.counter_move_hist.decay();
        self.followup_hist.decay();
        self.capture_hist.decay();
    }

    pub fn resize_tt(&mut self, mb: usize) {
        self.hash_mb = mb;
        self.tt = Arc::new(TranspositionTable::new(mb));
    }

    pub fn load_syzygy(&mut self, path: &str) {
        self.syzygy = SyzygyProber::new(path);
    }

    fn check_time(&self) {
        if self.budget.hard_ms != u64::MAX {
            let elapsed = self.start_time.elapsed().as_millis() as u64;
            if elapsed >= self.budget.hard_ms {
                self.stop.store(true, Ordering::Relaxed);
            }
        }
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Score volatility over the last few completed depths: used by the
    /// time manager to grant more time to an unstable position.
    fn volatility(&self) -> Score {
        if self.score_history.len() < 2 {
            return 0;
        }
        let window = &self.score_history[self.score_history.len().saturating_sub(4)..];
        let max = window.iter().copied().max().unwrap_or(0);
        let min = window.iter().copied().min().unwrap_or(0);
        max - min
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract principal variation by following TT hash moves, with a
/// seen-hash guard against move-repeating cycles in a corrupted/aliased TT.
fn extract_pv(board: &Board, tt: &TranspositionTable, max_moves: usize) -> Vec<ChessMove> {
    let mut pv = Vec::new();
    let mut current_board = *board;
    let mut seen: Vec<u64> = Vec::new();

    for i in 0..max_moves {
        let hash = current_board.get_hash();
        if seen.contains(&hash) {
            break;
        }
        seen.push(hash);

        let Some(entry) = tt.probe(hash, i) else { break };
        let Some(mv) = entry.best_move else { break };
        if !current_board.legal(mv) {
            break;
        }
        pv.push(mv);
        current_board = current_board.make_move_new(mv);
    }

    pv
}

pub fn format_score(score: Score) -> String {
    if score.abs() >= SCORE_MATE - MAX_PLY as Score {
        let mate_ply = SCORE_MATE - score.abs();
        let mate_moves = (mate_ply + 1) / 2;
        if score > 0 {
            format!("score mate {}", mate_moves)
        } else {
            format!("score mate -{}", mate_moves)
        }
    } else {
        format!("score cp {}", score)
    }
}

/// Iterative deepening driver. Reports through `state.silent`-gated
/// `UciReporter`/`NullReporter`, runs an aspiration window around the
/// previous iteration's score once depth 5 is reached, and widens on fail.
pub fn search(board: &Board, state: &mut SearchState, max_depth: u8) -> SearchResult {
    if state.silent {
        iterative_deepen(board, state, max_depth, &mut NullReporter)
    } else {
        iterative_deepen(board, state, max_depth, &mut UciReporter)
    }
}

pub fn iterative_deepen(
    board: &Board,
    state: &mut SearchState,
    max_depth: u8,
    reporter: &mut dyn Reporter,
) -> SearchResult {
    let mut best_move: Option<ChessMove> = None;
    let mut best_score: Score = -SCORE_INFINITY;

    for depth in 1..=max_depth {
        state.nodes = 0;
        state.seldepth = 0;
        state.root_best_move = None;
        state.decay_history();

        let score = if depth >= 5 && !state.score_history.is_empty() {
            aspiration_search(board, state, depth, *state.score_history.last().unwrap())
        } else {
            search_node(board, state, depth, 0, -SCORE_INFINITY, SCORE_INFINITY, true, true, None, None, None)
        };

        if state.is_stopped() {
            if best_move.is_none() {
                best_move = state.root_best_move;
            }
            break;
        }

        best_score = score;
        state.score_history.push(score);
        if let Some(mv) = state.root_best_move {
            best_move = Some(mv);
        }

        let elapsed_ms = state.start_time.elapsed().as_millis().max(1) as u64;
        let nps = state.nodes * 1000 / elapsed_ms;
        let pv = extract_pv(board, &state.tt, depth as usize);

        reporter.info(depth, state.seldepth, best_score, state.nodes, nps, elapsed_ms, state.tt.hashfull(), &pv);

        if state.budget.soft_ms != u64::MAX {
            let elapsed = state.start_time.elapsed().as_millis() as u64;
            if elapsed > state.budget.soft_ms {
                break;
            }
        }

        if best_score.abs() >= SCORE_MATE - MAX_PLY as Score {
            break;
        }
    }

    reporter.best_move(best_move, state.root_ponder_move);

    SearchResult { best_move, ponder_move: state.root_ponder_move, score: best_score, depth: max_depth, nodes: state.nodes }
}

/// Narrow window around the previous score, widening symmetrically (then
/// falling back to a full window) whenever the search fails outside it.
fn aspiration_search(board: &Board, state: &mut SearchState, depth: u8, prev_score: Score) -> Score {
    let mut window: Score = 25;
    let mut alpha = (prev_score - window).max(-SCORE_INFINITY);
    let mut beta = (prev_score + window).min(SCORE_INFINITY);

    loop {
        let score = search_node(board, state, depth, 0, alpha, beta, true, true, None, None, None);
        if state.is_stopped() {
            return score;
        }
        if score <= alpha {
            alpha = (alpha - window).max(-SCORE_INFINITY);
            window *= 2;
        } else if score >= beta {
            beta = (beta + window).min(SCORE_INFINITY);
            window *= 2;
        } else {
            return score;
        }
        if window > 1000 {
            return search_node(board, state, depth, 0, -SCORE_INFINITY, SCORE_INFINITY, true, true, None, None, None);
        }
    }
}

fn static_eval(board: &Board, state: &mut SearchState) -> Score {
    if let Some(cached) = state.eval_cache.probe(board) {
        return cached;
    }
    let pawn_term = state.pawn_cache.score(board);
    let oriented_pawn_term = if board.side_to_move() == Color::White { pawn_term } else { -pawn_term };
    let score = evaluate(board) + oriented_pawn_term;
    state.eval_cache.store(board, score);
    score
}

fn has_non_pawn_material(board: &Board, side: Color, state: &mut SearchState) -> bool {
    let mask = state.material_cache.non_pawn_material_mask(board);
    let bit = match side {
        Color::White => 1,
        Color::Black => 2,
    };
    mask & bit != 0
}

/// LMR reduction: base `floor(0.77 + ln(depth) * ln(move_index) / 2.25)`,
/// adjusted down for PV nodes and history-favored moves, up for
/// history-disfavored ones, then clamped to `0..=depth-2`.
#[allow(clippy::too_many_arguments)]
fn lmr_reduction(depth: u8, move_index: usize, is_pv: bool, butterfly_score: Score, continuation_score: Score) -> u8 {
    if depth < 3 || move_index < 1 {
        return 0;
    }
    let base = 0.77 + (depth as f64).ln() * (move_index as f64).ln() / 2.25;
    let mut r = base.max(0.0) as i32;

    if is_pv {
        r -= 1;
    }
    if butterfly_score >= 1000 {
        r -= 2;
    } else if butterfly_score >= 500 {
        r -= 1;
    } else if butterfly_score <= -500 {
        r += 2;
    } else if butterfly_score <= -200 {
        r += 1;
    }
    if depth >= 5 {
        if continuation_score >= 800 {
            r -= 1;
        } else if continuation_score <= -400 {
            r += 1;
        }
    }

    r.clamp(0, depth.saturating_sub(2) as i32) as u8
}

/// Fail-soft negamax with alpha-beta pruning, TT, and the family of
/// depth/selectivity tricks.
#[allow(clippy::too_many_arguments)]
fn search_node(
    board: &Board,
    state: &mut SearchState,
    depth: u8,
    ply: usize,
    mut alpha: Score,
    mut beta: Score,
    is_pv: bool,
    can_null: bool,
    prev_move: MoveContext,
    prev2_move: MoveContext,
    excluded: Option<ChessMove>,
) -> Score {
    state.nodes += 1;
    if ply > state.seldepth as usize {
        state.seldepth = ply as u8;
    }
    if state.nodes & 2047 == 0 {
        state.check_time();
    }
    if state.is_stopped() {
        return 0;
    }

    // Mate-distance pruning: no line through this node can beat a shorter
    // mate than one already proven, so the window can only shrink.
    alpha = alpha.max(-SCORE_MATE + ply as Score);
    beta = beta.min(SCORE_MATE - ply as Score - 1);
    if alpha >= beta {
        return alpha;
    }

    match board.status() {
        BoardStatus::Checkmate => return -SCORE_MATE + ply as Score,
        BoardStatus::Stalemate => return state.contempt,
        _ => {}
    }

    let hash = board.get_hash();

    if depth == 0 {
        return quiescence(board, state, ply, alpha, beta);
    }

    if ply > 0 {
        if state.position_history.contains(&hash) || board.halfmove_clock() >= 100 || board.has_insufficient_material() {
            return state.contempt;
        }
    }

    let in_check = !board.checkers().is_empty();

    let mut tt_move: Option<ChessMove> = None;
    let mut tt_score: Score = 0;
    let mut tt_depth: u8 = 0;
    let mut tt_bound: TTFlag = TTFlag::UpperBound;
    let mut have_tt_entry = false;
    if excluded.is_none() {
        if let Some(result) = state.tt.probe(hash, ply) {
            tt_move = result.best_move;
            tt_score = result.score;
            tt_depth = result.depth;
            tt_bound = result.bound;
            have_tt_entry = true;
            if result.depth >= depth && !is_pv {
                if let Some(score) = TranspositionTable::usable_score(&result, alpha, beta) {
                    return score;
                }
            }
        }
    }

    // Helper threads perturb root move ordering with a seed so they explore
    // a different line first instead of retracing the main thread's PV.
    if ply == 0 && tt_move.is_none() && state.root_seed != 0 {
        let moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
        if !moves.is_empty() {
            tt_move = Some(moves[(state.root_seed as usize) % moves.len()]);
        }
    }

    if ply > 0 {
        if let Some(ref syzygy) = state.syzygy {
            if let Some(score) = syzygy.probe_wdl(board) {
                return score;
            }
        }
    }

    let eval = if in_check { -SCORE_INFINITY } else { static_eval(board, state) };

    // Reverse futility pruning: so far ahead of beta that only a very
    // strong reply could close the gap, so trust the static eval.
    if !is_pv && !in_check && depth <= 8 {
        let margin = 80 * depth as Score;
        if eval - margin >= beta {
            return eval;
        }
    }

    // Razoring: so far below alpha that only quiescence can confirm
    // there's no tactical save; if it agrees, cut.
    if !is_pv && !in_check && depth <= 3 {
        let margin = 300;
        if eval + margin <= alpha {
            let q = quiescence(board, state, ply, alpha, beta);
            if q <= alpha {
                return q;
            }
        }
    }

    // Null-move pruning, guarded against zugzwang by requiring non-pawn
    // material. Verified with a reduced re-search for deep, large cutoffs
    // where a zugzwang-driven false fail-high is more likely.
    if can_null && !is_pv && !in_check && depth >= 3 && ply > 0 && has_non_pawn_material(board, board.side_to_move(), state) {
        if let Some(null_board) = board.null_move() {
            let mut r = 3 + depth / 6;
            if eval - beta > 50 {
                r += 1;
            }
            if eval - beta > 200 {
                r += 1;
            }
            if board.phase() < 64 {
                r = r.saturating_sub(1);
            }
            r = r.clamp(1, depth.saturating_sub(1).max(1));
            let reduced_depth = depth.saturating_sub(r);
            state.position_history.push(hash);
            let score = -search_node(&null_board, state, reduced_depth, ply + 1, -beta, -beta + 1, false, false, None, None, None);
            state.position_history.pop();

            if state.is_stopped() {
                return 0;
            }
            if score >= beta {
                if depth < 12 {
                    return beta;
                }
                let verify = search_node(board, state, depth.saturating_sub(4), ply, alpha, beta, false, false, prev_move, prev2_move, None);
                if verify >= beta {
                    return beta;
                }
            }
        }
    }

    // ProbCut: a capture whose SEE already clears beta by a healthy margin
    // is worth confirming with a cheap reduced-depth search before doing
    // full-depth work on it.
    if !is_pv && !in_check && depth >= 5 {
        let probcut_margin: Score = 100;
        let see_threshold = beta - eval + probcut_margin;
        let mut probcut_picker = MovePicker::new(tt_move, [None, None], None);
        let probcut_ctx = ContinuationContext { prev: prev_move, prev2: prev2_move };
        while let Some(mv) = probcut_picker.next(
            board,
            &state.butterfly,
            &state.counter_move_hist,
            &state.followup_hist,
            &state.capture_hist,
            probcut_ctx,
        ) {
            let is_capture = board.piece_on(mv.get_dest()).is_some() || board.en_passant() == Some(mv.get_dest());
            if !is_capture {
                continue;
            }
            if see(board, mv) < see_threshold {
                continue;
            }
            let nb = board.make_move_new(mv);
            state.position_history.push(hash);
            let score = -search_node(&nb, state, depth - 4, ply + 1, -beta, -beta + 1, false, true, prev_move, prev2_move, None);
            state.position_history.pop();
            if state.is_stopped() {
                return 0;
            }
            if score >= beta {
                return score;
            }
        }
    }

    // Multi-cut: if several of the first few moves independently fail high
    // on a shallow search, the node is almost certainly a cut-node, so cut
    // it without searching the rest.
    if !is_pv && !in_check && depth >= 7 {
        let mut picker = MovePicker::new(tt_move, state.killers.get(ply), None);
        let ctx = ContinuationContext { prev: prev_move, prev2: prev2_move };
        let mut fail_highs = 0u8;
        let mut tried = 0u8;
        state.position_history.push(hash);
        while tried < 4 {
            let Some(mv) = picker.next(board, &state.butterfly, &state.counter_move_hist, &state.followup_hist, &state.capture_hist, ctx)
            else {
                break;
            };
            tried += 1;
            let nb = board.make_move_new(mv);
            let score = -search_node(&nb, state, depth - 3, ply + 1, -beta, -beta + 1, false, true, prev_move, prev2_move, None);
            if state.is_stopped() {
                state.position_history.pop();
                return 0;
            }
            if score >= beta {
                fail_highs += 1;
                if fail_highs >= 2 {
                    break;
                }
            }
        }
        state.position_history.pop();
        if fail_highs >= 2 {
            return beta;
        }
    }

    // Internal iterative deepening: no hash move to order by, so do a
    // shallow search first purely to populate one via the TT.
    if tt_move.is_none() && depth >= 6 && is_pv {
        search_node(board, state, depth - 2, ply, alpha, beta, true, true, prev_move, prev2_move, None);
        if let Some(result) = state.tt.probe(hash, ply) {
            tt_move = result.best_move;
        }
    }

    let killers = state.killers.get(ply);
    let counter_move = prev_move.and_then(|(p, t)| state.counter_moves.get(p, t));
    let mut picker = MovePicker::new(tt_move, killers, counter_move);
    let ctx = ContinuationContext { prev: prev_move, prev2: prev2_move };

    // Singular extension precondition: the TT move looks forced if nothing
    // in the TT itself contradicts it (no upper bound) and it was searched
    // to nearly this depth already. Verified against the field once the TT
    // move is actually reached in the loop below.
    let singular_candidate = excluded.is_none()
        && have_tt_entry
        && depth >= 8
        && tt_bound != TTFlag::UpperBound
        && tt_depth >= depth.saturating_sub(3)
        && tt_move.is_some();

    state.position_history.push(hash);

    let mut best_score = -SCORE_INFINITY;
    let mut best_move: Option<ChessMove> = None;
    let original_alpha = alpha;
    let mut move_num = 0usize;
    let mut quiets_tried: Vec<ChessMove> = Vec::new();

    while let Some(mv) = picker.next(board, &state.butterfly, &state.counter_move_hist, &state.followup_hist, &state.capture_hist, ctx) {
        if excluded == Some(mv) {
            continue;
        }
        let is_capture = board.piece_on(mv.get_dest()).is_some() || board.en_passant() == Some(mv.get_dest());
        let moved_piece = board.piece_on(mv.get_source()).unwrap_or(Piece::Pawn);
        let gives_check = {
            let nb = board.make_move_new(mv);
            !nb.checkers().is_empty()
        };

        let not_mated = best_score > -SCORE_MATE + MAX_PLY as Score;

        // Late move pruning: this deep into the quiet move list at shallow
        // depth in a non-PV node, a loud rescue from here is unlikely.
        if !is_pv && !in_check && !is_capture && !gives_check && depth <= 7 {
            let lmp_limit = 3 + 2 * depth as usize * depth as usize;
            if move_num > lmp_limit && not_mated {
                move_num += 1;
                continue;
            }
        }

        // SEE pruning: a quiet or losing capture that can't recoup a
        // depth-scaled material deficit isn't worth searching this shallow.
        if !is_pv && !in_check && !gives_check && !is_capture && depth <= 4 {
            if see(board, mv) < -50 * depth as Score && not_mated {
                move_num += 1;
                continue;
            }
        }
        if !is_pv && depth <= 6 && is_capture && !in_check {
            if see(board, mv) < -100 * depth as Score && not_mated {
                move_num += 1;
                continue;
            }
        }

        // Futility pruning: quiet non-first moves whose eval ceiling still
        // can't reach alpha aren't worth searching. Margin widens in the
        // opening/middlegame and narrows in the endgame, where eval is less
        // reliably pessimistic about a quiet move's upside.
        if !is_pv && !in_check && !is_capture && !gives_check && depth <= 4 && move_num > 0 {
            let phase_scalar = if board.phase() < 64 {
                1.2
            } else if board.phase() > 200 {
                0.8
            } else {
                1.0
            };
            let futility_margin = ((100.0 + 150.0 * depth as f64) * phase_scalar) as Score;
            if eval + futility_margin <= alpha && not_mated {
                move_num += 1;
                continue;
            }
        }

        let new_board = board.make_move_new(mv);
        let new_prev = Some((moved_piece, mv.get_dest().to_index()));

        // Singular extension: if the TT move is the only move that holds up
        // against a narrow window centered on its own score, it's forced —
        // extend the line instead of trusting a one-move-wide search.
        let mut singular_extension = 0u8;
        if singular_candidate && Some(mv) == tt_move {
            let s_beta = tt_score - 3 * depth as Score;
            let singular_depth = depth / 2;
            state.position_history.pop();
            let s_score = search_node(board, state, singular_depth, ply, s_beta - 1, s_beta, false, true, prev_move, prev2_move, tt_move);
            state.position_history.push(hash);
            if s_score < s_beta {
                singular_extension = 1;
            }
        }

        let is_recapture = depth < 8 && prev_move.map(|(_, to)| to) == Some(mv.get_dest().to_index());

        // Extensions: checks, pawn pushes to the seventh/second rank, and
        // recaptures on the parent's destination square, additive and
        // capped so they can't runaway-extend a single line forever.
        let mut extension = 0u8;
        if gives_check {
            extension += 1;
        }
        if moved_piece == Piece::Pawn {
            let rank = mv.get_dest().to_index() / 8;
            if rank == 1 || rank == 6 {
                extension += 1;
            }
        }
        if is_recapture {
            extension += 1;
        }
        extension += singular_extension;
        extension = extension.min(2);

        let child_depth = depth - 1 + extension;
        let score;

        let do_lmr = move_num >= 3 && depth >= 3 && !is_capture && !in_check && !gives_check && extension == 0;

        if do_lmr {
            let butterfly_score = state.butterfly.get(board.side_to_move(), mv.get_source().to_index(), mv.get_dest().to_index());
            let continuation_score = prev_move
                .map(|(pp, pt)| state.counter_move_hist.get(pp, pt, moved_piece, mv.get_dest().to_index()))
                .unwrap_or(0);
            let r = lmr_reduction(depth, move_num, is_pv, butterfly_score, continuation_score);
            let reduced = child_depth.saturating_sub(r).max(1);
            let mut s = -search_node(&new_board, state, reduced, ply + 1, -alpha - 1, -alpha, false, true, new_prev, prev_move, None);
            if s > alpha && reduced < child_depth {
                s = -search_node(&new_board, state, child_depth, ply + 1, -alpha - 1, -alpha, false, true, new_prev, prev_move, None);
            }
            score = s;
        } else if move_num > 0 {
            let mut s = -search_node(&new_board, state, child_depth, ply + 1, -alpha - 1, -alpha, false, true, new_prev, prev_move, None);
            if s > alpha && s < beta {
                s = -search_node(&new_board, state, child_depth, ply + 1, -beta, -alpha, true, true, new_prev, prev_move, None);
            }
            score = s;
        } else {
            score = -search_node(&new_board, state, child_depth, ply + 1, -beta, -alpha, is_pv, true, new_prev, prev_move, None);
        }

        if state.is_stopped() {
            state.position_history.pop();
            return best_score.max(-SCORE_INFINITY);
        }

        if !is_capture {
            quiets_tried.push(mv);
        }

        if score > best_score {
            best_score = score;
            best_move = Some(mv);
            if ply == 0 {
                state.root_best_move = Some(mv);
            }
        }

        if score > alpha {
            alpha = score;
        }

        if alpha >= beta {
            if !is_capture {
                state.killers.push(ply, mv);
                if let Some((pp, pt)) = prev_move {
                    state.counter_moves.set(pp, pt, mv);
                }
                let b = bonus(depth);
                state.butterfly.update(board.side_to_move(), mv.get_source().to_index(), mv.get_dest().to_index(), b);
                if let Some((pp, pt)) = prev_move {
                    state.counter_move_hist.update(pp, pt, moved_piece, mv.get_dest().to_index(), b);
                }
                if let Some((pp, pt)) = prev2_move {
                    state.followup_hist.update(pp, pt, moved_piece, mv.get_dest().to_index(), b);
                }
                // Malus every quiet move tried before the one that cut: they
                // had their chance and didn't refute the position.
                for failed in quiets_tried.iter().take(quiets_tried.len().saturating_sub(1)) {
                    state.butterfly.update(board.side_to_move(), failed.get_source().to_index(), failed.get_dest().to_index(), -b);
                }
            } else if let Some(victim) = board.piece_on(mv.get_dest()) {
                state.capture_hist.update(moved_piece, mv.get_dest().to_index(), victim, bonus(depth));
            }
            break;
        }

        move_num += 1;
    }

    state.position_history.pop();

    if move_num == 0 && best_move.is_none() {
        if excluded.is_some() {
            // Only the excluded TT move was legal: no alternative to compare
            // against, which is as singular as a position can get.
            return alpha;
        }
        // MovePicker yielded nothing: no legal moves (already handled by
        // board.status() above for the common cases, kept as a guard).
        return if in_check { -SCORE_MATE + ply as Score } else { state.contempt };
    }

    let flag = if best_score >= beta {
        TTFlag::LowerBound
    } else if best_score <= original_alpha {
        TTFlag::UpperBound
    } else {
        TTFlag::Exact
    };

    if excluded.is_none() {
        state.tt.store(hash, depth, best_score, eval, flag, best_move, ply);
    }

    best_score
}

/// Quiescence search: captures only (all evasions when in check), with
/// SEE and delta pruning to keep the tree from exploding near the horizon.
fn quiescence(board: &Board, state: &mut SearchState, ply: usize, mut alpha: Score, beta: Score) -> Score {
    state.nodes += 1;
    if ply > state.seldepth as usize {
        state.seldepth = ply as u8;
    }

    if ply >= MAX_PLY {
        return static_eval(board, state);
    }

    let hash = board.get_hash();
    if let Some(result) = state.tt.probe(hash, ply) {
        if let Some(score) = TranspositionTable::usable_score(&result, alpha, beta) {
            return score;
        }
    }

    let in_check = !board.checkers().is_empty();

    if in_check {
        let mut best_score: Score = -SCORE_INFINITY;
        let killers = state.killers.get(ply);
        let mut picker = MovePicker::new(None, killers, None);
        let ctx = ContinuationContext::default();
        let mut any_move = false;

        while let Some(mv) = picker.next(board, &state.butterfly, &state.counter_move_hist, &state.followup_hist, &state.capture_hist, ctx) {
            any_move = true;
            let new_board = board.make_move_new(mv);
            let score = -quiescence(&new_board, state, ply + 1, -beta, -alpha);

            if state.is_stopped() {
                return best_score;
            }
            if score > best_score {
                best_score = score;
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                return best_score;
            }
        }

        if !any_move {
            return -SCORE_MATE + ply as Score;
        }
        return best_score;
    }

    let stand_pat = static_eval(board, state);
    let mut best_score = stand_pat;

    if stand_pat >= beta {
        return best_score;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }

    let captures = order_captures(board);
    const DELTA_MARGIN: Score = 200;

    for scored in &captures {
        if scored.score < 0 {
            continue; // losing capture, SEE-pruned
        }
        if stand_pat + scored.score + DELTA_MARGIN < alpha {
            continue; // delta pruning: can't possibly raise alpha
        }

        let new_board = board.make_move_new(scored.mv);
        let score = -quiescence(&new_board, state, ply + 1, -beta, -alpha);

        if state.is_stopped() {
            return best_score;
        }
        if score > best_score {
            best_score = score;
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            return best_score;
        }
    }

    best_score
}
