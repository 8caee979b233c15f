use crate::board::ChessMove;

pub type Score = i32;

pub const SCORE_INFINITY: Score = 32_000;
pub const SCORE_MATE: Score = 30_000;
pub const SCORE_DRAW: Score = 0;
pub const MAX_PLY: usize = 128;
pub const DEFAULT_DEPTH: u8 = 64;
pub const DEFAULT_HASH_MB: usize = 64;
pub const HISTORY_MAX: Score = 16_384;
pub const MAX_BONUS: Score = 1_600;

/// Score for being mated in `ply` plies from the current search root.
#[inline]
pub fn mate_in(ply: i32) -> Score {
    SCORE_MATE - ply
}

/// True when `score` is close enough to `SCORE_MATE` that it should be
/// treated as a forced mate rather than a material evaluation.
#[inline]
pub fn is_mate_score(score: Score) -> bool {
    score.abs() >= SCORE_MATE - MAX_PLY as Score
}

pub struct EngineConfig {
    pub hash_mb: usize,
    pub threads: usize,
    pub move_overhead_ms: u64,
    pub contempt: Score,
    pub multi_pv: usize,
    pub syzygy_path: Option<String>,
    pub own_book: bool,
    pub book_file: Option<String>,
    pub book_learning: bool,
    pub book_random: bool,
    pub style_weights: StyleWeights,
}

/// Extensible family of `Style_*` UCI options. Each is a 0..100
/// dial; the search core clamps and reports them back via `option` but does
/// not interpret them itself — that's an external tuner's job.
#[derive(Clone, Debug, Default)]
pub struct StyleWeights {
    pub aggression: u8,
    pub risk: u8,
    pub activity: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_mb: DEFAULT_HASH_MB,
            threads: 1,
            move_overhead_ms: 30,
            contempt: 0,
            multi_pv: 1,
            syzygy_path: None,
            own_book: false,
            book_file: None,
            book_learning: false,
            book_random: false,
            style_weights: StyleWeights::default(),
        }
    }
}

pub struct SearchResult {
    pub best_move: Option<ChessMove>,
    pub ponder_move: Option<ChessMove>,
    pub score: Score,
    pub depth: u8,
    pub nodes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_in_decreases_with_ply() {
        assert!(mate_in(1) > mate_in(3));
    }

    #[test]
    fn mate_score_detection() {
        assert!(is_mate_score(SCORE_MATE - 5));
        assert!(is_mate_score(-(SCORE_MATE - 5)));
        assert!(!is_mate_score(500));
    }
}
