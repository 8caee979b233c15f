//! Staged, resumable move picker: TT move, good captures,
//! killers, counter-move, remaining quiets, then bad captures. Each call to
//! `next()` advances a small state machine rather than sorting everything
//! up front — cheap when a beta cutoff ends the list early.

use arrayvec::ArrayVec;

use crate::board::{BitBoard, Board, ChessMove, MoveGen, Piece, EMPTY};
use crate::history::{score_quiet, ButterflyHistory, CaptureHistory, ContinuationHistory};
use crate::pst::MVV_VALUE;
use crate::see::see;
use crate::types::Score;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    TTMove,
    GenerateCaptures,
    GoodCaptures,
    Killer1,
    Killer2,
    CounterMove,
    GenerateQuiets,
    Quiets,
    BadCaptures,
    Done,
}

pub struct ScoredMove {
    pub mv: ChessMove,
    pub score: Score,
}

/// Continuation context (piece/to of the previous one and two plies), used
/// to score quiet moves against counter-move and follow-up history.
#[derive(Clone, Copy, Default)]
pub struct ContinuationContext {
    pub prev: Option<(Piece, usize)>,
    pub prev2: Option<(Piece, usize)>,
}

pub struct MovePicker {
    stage: Stage,
    tt_move: Option<ChessMove>,
    killer1: Option<ChessMove>,
    killer2: Option<ChessMove>,
    counter: Option<ChessMove>,
    good_captures: ArrayVec<ScoredMove, 64>,
    bad_captures: ArrayVec<ScoredMove, 64>,
    quiets: ArrayVec<ScoredMove, 220>,
    cursor: usize,
    yielded: ArrayVec<ChessMove, 256>,
}

impl MovePicker {
    pub fn new(
        tt_move: Option<ChessMove>,
        killers: [Option<ChessMove>; 2],
        counter: Option<ChessMove>,
    ) -> Self {
        Self {
            stage: Stage::TTMove,
            tt_move,
            killer1: killers[0],
            killer2: killers[1],
            counter,
            good_captures: ArrayVec::new(),
            bad_captures: ArrayVec::new(),
            quiets: ArrayVec::new(),
            cursor: 0,
            yielded: ArrayVec::new(),
        }
    }

    fn already_yielded(&self, mv: ChessMove) -> bool {
        self.yielded.contains(&mv)
    }

    fn mark_yielded(&mut self, mv: ChessMove) {
        if !self.yielded.is_full() {
            self.yielded.push(mv);
        }
    }

    fn generate_captures(&mut self, board: &Board, capture_hist: &CaptureHistory) {
        let mut movegen = MoveGen::new_legal(board);
        let targets = board.color_combined(!board.side_to_move());
        movegen.set_iterator_mask(targets);

        for mv in &mut movegen {
            if self.already_yielded(mv) {
                continue;
            }
            let see_score = see(board, mv);
            let victim = board.piece_on(mv.get_dest());
            let attacker = board.piece_on(mv.get_source());
            let hist_bonus = match (attacker, victim) {
                (Some(a), Some(v)) => capture_hist.get(a, mv.get_dest().to_index(), v) / 100,
                _ => 0,
            };
            let score = see_score * 64 + hist_bonus;
            let scored = ScoredMove { mv, score };
            if see_score >= 0 {
                let _ = self.good_captures.try_push(scored);
            } else {
                let _ = self.bad_captures.try_push(scored);
            }
        }

        if let Some(ep_sq) = board.en_passant() {
            movegen.set_iterator_mask(BitBoard::from_square(ep_sq));
            for mv in &mut movegen {
                if self.already_yielded(mv) {
                    continue;
                }
                let score = MVV_VALUE[0] * 64;
                let _ = self.good_captures.try_push(ScoredMove { mv, score });
            }
        }

        self.good_captures.sort_unstable_by(|a, b| b.score.cmp(&a.score));
        self.bad_captures.sort_unstable_by(|a, b| b.score.cmp(&a.score));
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_quiets(
        &mut self,
        board: &Board,
        butterfly: &ButterflyHistory,
        counter_hist: &ContinuationHistory,
        followup_hist: &ContinuationHistory,
        ctx: ContinuationContext,
    ) {
        let mut movegen = MoveGen::new_legal(board);
        movegen.set_iterator_mask(!EMPTY);
        let side = board.side_to_move();

        for mv in &mut movegen {
            if self.already_yielded(mv) {
                continue;
            }
            let score = if mv.get_promotion().is_some() {
                9_000
            } else if let Some(piece) = board.piece_on(mv.get_source()) {
                score_quiet(
                    butterfly,
                    counter_hist,
                    followup_hist,
                    side,
                    mv.get_source().to_index(),
                    mv.get_dest().to_index(),
                    piece,
                    ctx.prev,
                    ctx.prev2,
                )
            } else {
                0
            };
            let _ = self.quiets.try_push(ScoredMove { mv, score });
        }

        self.quiets.sort_unstable_by(|a, b| b.score.cmp(&a.score));
    }

    /// Advance to the next move. `board.legal` re-validates candidates
    /// pulled from outside normal generation (TT move, killers, counter).
    #[allow(clippy::too_many_arguments)]
    pub fn next(
        &mut self,
        board: &Board,
        butterfly: &ButterflyHistory,
        counter_hist: &ContinuationHistory,
        followup_hist: &ContinuationHistory,
        capture_hist: &CaptureHistory,
        ctx: ContinuationContext,
    ) -> Option<ChessMove> {
        loop {
            match self.stage {
                Stage::TTMove => {
                    self.stage = Stage::GenerateCaptures;
                    if let Some(mv) = self.tt_move {
                        if board.legal(mv) {
                            self.mark_yielded(mv);
                            return Some(mv);
                        }
                    }
                }
                Stage::GenerateCaptures => {
                    self.generate_captures(board, capture_hist);
                    self.cursor = 0;
                    self.stage = Stage::GoodCaptures;
                }
                Stage::GoodCaptures => {
                    if self.cursor < self.good_captures.len() {
                        let mv = self.good_captures[self.cursor].mv;
                        self.cursor += 1;
                        self.mark_yielded(mv);
                        return Some(mv);
                    }
                    self.cursor = 0;
                    self.stage = Stage::Killer1;
                }
                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    if let Some(mv) = self.killer1 {
                        if !self.already_yielded(mv) && board.legal(mv) && board.piece_on(mv.get_dest()).is_none() {
                            self.mark_yielded(mv);
                            return Some(mv);
                        }
                    }
                }
                Stage::Killer2 => {
                    self.stage = Stage::CounterMove;
                    if let Some(mv) = self.killer2 {
                        if !self.already_yielded(mv) && board.legal(mv) && board.piece_on(mv.get_dest()).is_none() {
                            self.mark_yielded(mv);
                            return Some(mv);
                        }
                    }
                }
                Stage::CounterMove => {
                    self.stage = Stage::GenerateQuiets;
                    if let Some(mv) = self.counter {
                        if !self.already_yielded(mv) && board.legal(mv) && board.piece_on(mv.get_dest()).is_none() {
                            self.mark_yielded(mv);
                            return Some(mv);
                        }
                    }
                }
                Stage::GenerateQuiets => {
                    self.generate_quiets(board, butterfly, counter_hist, followup_hist, ctx);
                    self.cursor = 0;
                    self.stage = Stage::Quiets;
                }
                Stage::Quiets => {
                    if self.cursor < self.quiets.len() {
                        let mv = self.quiets[self.cursor].mv;
                        self.cursor += 1;
                        return Some(mv);
                    }
                    self.cursor = 0;
                    self.stage = Stage::BadCaptures;
                }
                Stage::BadCaptures => {
                    if self.cursor < self.bad_captures.len() {
                        let mv = self.bad_captures[self.cursor].mv;
                        self.cursor += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }
}

/// Generates only capture moves for quiescence search, ordered by SEE.
pub fn order_captures(board: &Board) -> ArrayVec<ScoredMove, 64> {
    let mut scored: ArrayVec<ScoredMove, 64> = ArrayVec::new();

    let mut movegen = MoveGen::new_legal(board);
    let targets = board.color_combined(!board.side_to_move());
    movegen.set_iterator_mask(targets);

    for mv in &mut movegen {
        let score = see(board, mv);
        let _ = scored.try_push(ScoredMove { mv, score });
    }

    if let Some(ep_sq) = board.en_passant() {
        movegen.set_iterator_mask(BitBoard::from_square(ep_sq));
        for mv in &mut movegen {
            let score = MVV_VALUE[0];
            let _ = scored.try_push(ScoredMove { mv, score });
        }
    }

    scored.sort_unstable_by(|a, b| b.score.cmp(&a.score));
    scored
}
