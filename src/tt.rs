//! Transposition table: 4-way clustered, lock-free
//! best-effort hash. Readers re-validate every field before trusting it —
//! a stale or colliding read just looks like a miss, never a crash. Entries
//! are packed into a pair of `AtomicU64` words per slot so the table can be
//! wrapped in an `Arc` and shared by every search thread without a lock:
//! concurrent readers and writers only ever race on individual word-sized
//! loads/stores, and a torn read across the two words just looks like a
//! miss or a stale hit, never undefined behavior.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::board::ChessMove;
use crate::types::{Score, MAX_PLY, SCORE_MATE};

pub const CLUSTER_SIZE: usize = 4;
const MIN_CLUSTERS: usize = 256; // 1024 entries minimum
const MATE_BOUND: Score = SCORE_MATE - MAX_PLY as Score;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TTFlag {
    Exact,
    LowerBound, // Beta cutoff (score >= beta)
    UpperBound, // Failed low (score <= alpha)
}

impl TTFlag {
    fn to_bits(self) -> u64 {
        match self {
            TTFlag::Exact => 0,
            TTFlag::LowerBound => 1,
            TTFlag::UpperBound => 2,
        }
    }

    fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => TTFlag::Exact,
            1 => TTFlag::LowerBound,
            _ => TTFlag::UpperBound,
        }
    }
}

/// Decoded view of a slot: `key_lo:32, move:16, score:16` in the first
/// word and `static_eval:16, depth:8, bound:2, age:6` in the second.
#[derive(Clone, Copy)]
struct TTEntry {
    key_lo: u32,
    mv: ChessMove,
    score: i16,
    static_eval: i16,
    depth: u8,
    bound: TTFlag,
    age: u8,
}

impl Default for TTEntry {
    fn default() -> Self {
        Self {
            key_lo: 0,
            mv: ChessMove::null(),
            score: 0,
            static_eval: 0,
            depth: 0,
            bound: TTFlag::UpperBound,
            age: 0,
        }
    }
}

impl TTEntry {
    fn is_empty(&self) -> bool {
        self.key_lo == 0 && self.depth == 0
    }

    fn encode(self) -> (u64, u64) {
        let lo = (self.key_lo as u64) | ((self.mv.raw() as u64) << 32) | ((self.score as u16 as u64) << 48);
        let hi = (self.static_eval as u16 as u64)
            | ((self.depth as u64) << 16)
            | (self.bound.to_bits() << 24)
            | ((self.age as u64) << 26);
        (lo, hi)
    }

    fn decode(lo: u64, hi: u64) -> Self {
        Self {
            key_lo: lo as u32,
            mv: ChessMove::from_raw((lo >> 32) as u16),
            score: (lo >> 48) as u16 as i16,
            static_eval: hi as u16 as i16,
            depth: ((hi >> 16) & 0xFF) as u8,
            bound: TTFlag::from_bits(hi >> 24),
            age: ((hi >> 26) & 0xFF) as u8,
        }
    }
}

/// One atomically-packed slot. Writers store the low word then the high
/// word; a reader that lands between the two sees either the old or the new
/// entry's `key_lo`, never a mix that still matches it, since `key_lo`
/// lives entirely in the low word.
#[derive(Default)]
struct AtomicEntry {
    lo: AtomicU64,
    hi: AtomicU64,
}

impl AtomicEntry {
    fn load(&self) -> TTEntry {
        let lo = self.lo.load(Ordering::Relaxed);
        let hi = self.hi.load(Ordering::Relaxed);
        TTEntry::decode(lo, hi)
    }

    fn store(&self, entry: TTEntry) {
        let (lo, hi) = entry.encode();
        self.lo.store(lo, Ordering::Relaxed);
        self.hi.store(hi, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.lo.store(0, Ordering::Relaxed);
        self.hi.store(0, Ordering::Relaxed);
    }
}

pub struct ProbeResult {
    pub best_move: Option<ChessMove>,
    pub score: Score,
    pub static_eval: Score,
    pub depth: u8,
    pub bound: TTFlag,
}

pub struct TranspositionTable {
    clusters: Vec<[AtomicEntry; CLUSTER_SIZE]>,
    mask: usize,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Create a new TT sized in megabytes. Cluster count is rounded to the
    /// next power of two so indexing is a mask, not a modulo.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let cluster_count = (bytes / 64).next_power_of_two().max(MIN_CLUSTERS);
        let clusters = (0..cluster_count).map(|_| std::array::from_fn(|_| AtomicEntry::default())).collect();
        Self { clusters, mask: cluster_count - 1, generation: AtomicU8::new(0) }
    }

    /// Upper bits pick the cluster, lower 32 bits verify the slot — keeps
    /// the index and the verification tag decorrelated.
    fn cluster_index(&self, key: u64) -> usize {
        ((key >> 32) as usize) & self.mask
    }

    /// Bump the search generation. Call once per `go`.
    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for cluster in self.clusters.iter() {
            for slot in cluster.iter() {
                slot.clear();
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Scan the bucket for a matching `key_lo`. Mate scores come back
    /// re-based to `ply` so callers never see root-relative distances.
    pub fn probe(&self, key: u64, ply: usize) -> Option<ProbeResult> {
        let key_lo = key as u32;
        let cluster = &self.clusters[self.cluster_index(key)];
        for slot in cluster.iter() {
            let entry = slot.load();
            if !entry.is_empty() && entry.key_lo == key_lo {
                return Some(ProbeResult {
                    best_move: if entry.mv.is_null() { None } else { Some(entry.mv) },
                    score: normalize_on_probe(entry.score as Score, ply),
                    static_eval: entry.static_eval as Score,
                    depth: entry.depth,
                    bound: entry.bound,
                });
            }
        }
        None
    }

    /// Whether a probed entry's bound justifies a non-PV cutoff at this window.
    pub fn usable_score(result: &ProbeResult, alpha: Score, beta: Score) -> Option<Score> {
        match result.bound {
            TTFlag::Exact => Some(result.score),
            TTFlag::LowerBound if result.score >= beta => Some(result.score),
            TTFlag::UpperBound if result.score <= alpha => Some(result.score),
            _ => None,
        }
    }

    pub fn store(
        &self,
        key: u64,
        depth: u8,
        score: Score,
        static_eval: Score,
        bound: TTFlag,
        best_move: Option<ChessMove>,
        ply: usize,
    ) {
        let key_lo = key as u32;
        let stored_score =
            normalize_on_store(score, ply).clamp(i16::MIN as Score, i16::MAX as Score) as i16;
        let static_eval = static_eval.clamp(i16::MIN as Score, i16::MAX as Score) as i16;
        let mv = best_move.unwrap_or_else(ChessMove::null);
        let generation = self.generation.load(Ordering::Relaxed);
        let cluster = &self.clusters[self.cluster_index(key)];

        if let Some(slot) = cluster.iter().find(|s| {
            let e = s.load();
            !e.is_empty() && e.key_lo == key_lo
        }) {
            let existing = slot.load();
            // A shallower non-exact write never clobbers a deeper exact one.
            if existing.bound == TTFlag::Exact && bound != TTFlag::Exact && depth < existing.depth {
                return;
            }
            if depth >= existing.depth {
                slot.store(TTEntry { key_lo, mv, score: stored_score, static_eval, depth, bound, age: generation });
            }
            return;
        }

        let worst = cluster
            .iter()
            .min_by_key(|s| replacement_score(&s.load(), generation))
            .expect("cluster is never empty");
        worst.store(TTEntry { key_lo, mv, score: stored_score, static_eval, depth, bound, age: generation });
    }

    /// No portable prefetch intrinsic exists on stable Rust; kept as a
    /// documented no-op hook so callers can issue it right after
    /// `make_move_new`, ready for a future `core::arch` intrinsic.
    pub fn prefetch(&self, _key: u64) {}

    /// Per-mille fill of the sampled first 1000 clusters, current generation only.
    pub fn hashfull(&self) -> u32 {
        let sampled = self.clusters.len().min(1000);
        if sampled == 0 {
            return 0;
        }
        let generation = self.generation.load(Ordering::Relaxed);
        let filled: usize = self.clusters[..sampled]
            .iter()
            .flat_map(|c| c.iter())
            .map(|s| s.load())
            .filter(|e| !e.is_empty() && e.age == generation)
            .count();
        ((filled as u64 * 1000) / (sampled as u64 * CLUSTER_SIZE as u64)) as u32
    }
}

fn replacement_score(entry: &TTEntry, generation: u8) -> i32 {
    if entry.is_empty() {
        return i32::MIN;
    }
    let age_distance = generation.wrapping_sub(entry.age) as i32;
    entry.depth as i32 * 4 + if entry.bound == TTFlag::Exact { 16 } else { 0 } - age_distance * 2
}

fn normalize_on_store(score: Score, ply: usize) -> Score {
    if score >= MATE_BOUND {
        score + ply as Score
    } else if score <= -MATE_BOUND {
        score - ply as Score
    } else {
        score
    }
}

fn normalize_on_probe(score: Score, ply: usize) -> Score {
    if score >= MATE_BOUND {
        score - ply as Score
    } else if score <= -MATE_BOUND {
        score + ply as Score
    } else {
        score
    }
}
