//! Small direct-mapped auxiliary caches: pawn structure,
//! full static eval, and per-side non-pawn material. Each is overwrite-on-
//! collision — a miss just means recomputing, never a correctness problem.

use std::sync::LazyLock;

use crate::board::{Board, Color, Piece, ALL_SQUARES};
use crate::types::Score;

const PAWN_CACHE_BITS: usize = 14;
const EVAL_CACHE_BITS: usize = 16;

struct CacheKeys {
    pawn_salt: u64,
    eval_salt: u64,
    material_salt: u64,
}

static KEYS: LazyLock<CacheKeys> = LazyLock::new(|| {
    let mut rng = XorShift64(0x9E3779B97F4A7C15);
    CacheKeys { pawn_salt: rng.next(), eval_salt: rng.next(), material_salt: rng.next() }
});

struct XorShift64(u64);

impl XorShift64 {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[derive(Clone, Copy, Default)]
struct PawnEntry {
    key: u64,
    score: Score,
}

/// Direct-mapped pawn structure cache, keyed on a board's Zobrist hash
/// salted so it never collides with the main transposition table's index.
pub struct PawnCache {
    entries: Vec<PawnEntry>,
    mask: usize,
}

impl PawnCache {
    pub fn new() -> Self {
        let size = 1usize << PAWN_CACHE_BITS;
        Self { entries: vec![PawnEntry::default(); size], mask: size - 1 }
    }

    fn key_for(board: &Board) -> u64 {
        board.get_hash() ^ KEYS.pawn_salt
    }

    pub fn probe(&self, board: &Board) -> Option<Score> {
        let key = Self::key_for(board);
        let entry = &self.entries[key as usize & self.mask];
        if entry.key == key { Some(entry.score) } else { None }
    }

    pub fn store(&mut self, board: &Board, score: Score) {
        let key = Self::key_for(board);
        self.entries[key as usize & self.mask] = PawnEntry { key, score };
    }

    pub fn clear(&mut self) {
        self.entries.fill(PawnEntry::default());
    }

    /// Cached doubled/isolated pawn penalty, white-relative. Computed once
    /// per distinct position and reused for as long as the pawn-bearing
    /// squares don't change (a piece-only move keeps the same cache line).
    pub fn score(&mut self, board: &Board) -> Score {
        if let Some(cached) = self.probe(board) {
            return cached;
        }
        let score = pawn_structure_score(board);
        self.store(board, score);
        score
    }
}

impl Default for PawnCache {
    fn default() -> Self {
        Self::new()
    }
}

fn pawn_structure_score(board: &Board) -> Score {
    let mut white_files = [0u8; 8];
    let mut black_files = [0u8; 8];
    for sq in ALL_SQUARES {
        if board.piece_on(sq) != Some(Piece::Pawn) {
            continue;
        }
        let file = sq.file().to_index();
        match board.color_on(sq) {
            Some(Color::White) => white_files[file] += 1,
            Some(Color::Black) => black_files[file] += 1,
            None => {}
        }
    }
    file_penalty(&white_files) - file_penalty(&black_files)
}

/// Doubled pawns cost 15cp per pawn past the first on a file; a file with no
/// pawn on either neighboring file is isolated and costs 10cp per pawn.
fn file_penalty(files: &[u8; 8]) -> Score {
    let mut penalty: Score = 0;
    for f in 0..8usize {
        let count = files[f] as Score;
        if count == 0 {
            continue;
        }
        if count > 1 {
            penalty -= 15 * (count - 1);
        }
        let left = if f > 0 { files[f - 1] } else { 0 };
        let right = if f < 7 { files[f + 1] } else { 0 };
        if left == 0 && right == 0 {
            penalty -= 10 * count;
        }
    }
    penalty
}

#[derive(Clone, Copy, Default)]
struct EvalEntry {
    key: u64,
    score: Score,
}

/// Direct-mapped whole-position static eval cache, read by quiescence's
/// stand-pat and by the alpha-beta node's static eval before pruning.
pub struct EvalCache {
    entries: Vec<EvalEntry>,
    mask: usize,
}

impl EvalCache {
    pub fn new() -> Self {
        let size = 1usize << EVAL_CACHE_BITS;
        Self { entries: vec![EvalEntry::default(); size], mask: size - 1 }
    }

    fn key_for(board: &Board) -> u64 {
        board.get_hash() ^ KEYS.eval_salt
    }

    pub fn probe(&self, board: &Board) -> Option<Score> {
        let key = Self::key_for(board);
        let entry = &self.entries[key as usize & self.mask];
        if entry.key == key { Some(entry.score) } else { None }
    }

    pub fn store(&mut self, board: &Board, score: Score) {
        let key = Self::key_for(board);
        self.entries[key as usize & self.mask] = EvalEntry { key, score };
    }

    pub fn clear(&mut self) {
        self.entries.fill(EvalEntry::default());
    }
}

impl Default for EvalCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks up the combined non-pawn material count for a side, used by
/// null-move pruning's zugzwang guard. Small enough that it is really just
/// a memoized function, but keyed the same way as the other caches so all
/// three share the texture of "hash the position, salt it, probe a table".
pub struct MaterialCache {
    entries: Vec<EvalEntry>,
    mask: usize,
}

impl MaterialCache {
    pub fn new() -> Self {
        let size = 1usize << PAWN_CACHE_BITS;
        Self { entries: vec![EvalEntry::default(); size], mask: size - 1 }
    }

    fn key_for(board: &Board) -> u64 {
        board.get_hash() ^ KEYS.material_salt
    }

    pub fn probe(&self, board: &Board) -> Option<Score> {
        let key = Self::key_for(board);
        let entry = &self.entries[key as usize & self.mask];
        if entry.key == key { Some(entry.score) } else { None }
    }

    pub fn store(&mut self, board: &Board, score: Score) {
        let key = Self::key_for(board);
        self.entries[key as usize & self.mask] = EvalEntry { key, score };
    }

    pub fn clear(&mut self) {
        self.entries.fill(EvalEntry::default());
    }

    /// Per-side non-pawn material presence, packed as bit 0 = white, bit 1 =
    /// black, used by null-move pruning's zugzwang guard.
    pub fn non_pawn_material_mask(&mut self, board: &Board) -> Score {
        if let Some(cached) = self.probe(board) {
            return cached;
        }
        let pawns_and_king = board.pieces(Piece::Pawn) | board.pieces(Piece::King);
        let mut mask: Score = 0;
        if !(board.color_combined(Color::White) & !pawns_and_king).is_empty() {
            mask |= 1;
        }
        if !(board.color_combined(Color::Black) & !pawns_and_king).is_empty() {
            mask |= 2;
        }
        self.store(board, mask);
        mask
    }
}

impl Default for MaterialCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn pawn_cache_roundtrip() {
        crate::board::init();
        let mut cache = PawnCache::new();
        let board = Board::default();
        assert!(cache.probe(&board).is_none());
        cache.store(&board, 42);
        assert_eq!(cache.probe(&board), Some(42));
    }

    #[test]
    fn eval_cache_roundtrip() {
        crate::board::init();
        let mut cache = EvalCache::new();
        let board = Board::default();
        cache.store(&board, -17);
        assert_eq!(cache.probe(&board), Some(-17));
    }

    #[test]
    fn clear_evicts_everything() {
        crate::board::init();
        let mut cache = EvalCache::new();
        let board = Board::default();
        cache.store(&board, 5);
        cache.clear();
        assert!(cache.probe(&board).is_none());
    }
}
