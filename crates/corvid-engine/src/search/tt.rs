//! Lockless always-replace transposition table.
//!
//! Two `AtomicU64` words per entry (16 bytes).
//!
//! ## Bit layout
//!
//! ```text
//! data (u64):
//!   bits 63-32: score  (i32, node-relative for mate scores)
//!   bits 25-24: bound  (2 bits)
//!   bits 23-16: depth  (8 bits)
//!   bits 15-0:  move   (bit 15 = present, 14-12 promotion, 11-6 dest, 5-0 source)
//!
//! word0 = hash ^ data
//! word1 = data
//! ```
//!
//! ## Torn-write detection
//!
//! On lookup, `word0 ^ word1` must reproduce the full 64-bit lookup hash.
//! A slot owned by another position, or one whose two words come from two
//! different concurrent writers, fails the check and is reported as a miss.
//!
//! All atomic accesses use `Relaxed` ordering.

use std::sync::atomic::{AtomicU64, Ordering};

use chess::{ALL_SQUARES, ChessMove, Piece};

use crate::search::negamax::MATE_THRESHOLD;

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

/// Default number of entries (64 MB of slots).
pub const DEFAULT_ENTRIES: usize = 4 * 1024 * 1024;

/// Bound type stored in a TT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Empty slot.
    None = 0,
    /// The stored score is exact.
    Exact = 1,
    /// The stored score is a lower bound (failed high).
    LowerBound = 2,
    /// The stored score is an upper bound (failed low).
    UpperBound = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0x03 {
            1 => Bound::Exact,
            2 => Bound::LowerBound,
            3 => Bound::UpperBound,
            _ => Bound::None,
        }
    }
}

/// Result of a successful TT lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    /// Best move found when the entry was written.
    pub best_move: Option<ChessMove>,
    /// Score, already converted back to root-relative form.
    pub score: i32,
    /// Remaining depth the entry was searched to.
    pub depth: u8,
    /// How `score` relates to the true value.
    pub bound: Bound,
}

/// Convert a search score to TT-storable form.
///
/// Mate scores are stored as distance from the node instead of distance
/// from the root, so they stay valid when the position is reached again
/// along a path of different length.
pub fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

/// Reverse of [`score_to_tt`].
pub fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

const MOVE_PRESENT: u64 = 1 << 15;

fn encode_move(mv: Option<ChessMove>) -> u64 {
    let Some(mv) = mv else {
        return 0;
    };
    let promotion = match mv.get_promotion() {
        None => 0,
        Some(Piece::Knight) => 1,
        Some(Piece::Bishop) => 2,
        Some(Piece::Rook) => 3,
        Some(_) => 4,
    };
    MOVE_PRESENT
        | (promotion << 12)
        | ((mv.get_dest().to_index() as u64) << 6)
        | mv.get_source().to_index() as u64
}

fn decode_move(bits: u64) -> Option<ChessMove> {
    if bits & MOVE_PRESENT == 0 {
        return None;
    }
    let source = ALL_SQUARES[(bits & 0x3F) as usize];
    let dest = ALL_SQUARES[((bits >> 6) & 0x3F) as usize];
    let promotion = match (bits >> 12) & 0x07 {
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => None,
    };
    Some(ChessMove::new(source, dest, promotion))
}

fn pack(best_move: Option<ChessMove>, score: i32, depth: u8, bound: Bound) -> u64 {
    ((score as u32 as u64) << 32)
        | ((bound as u64) << 24)
        | ((depth as u64) << 16)
        | encode_move(best_move)
}

/// One logical TT slot.
struct AtomicEntry {
    word0: AtomicU64,
    word1: AtomicU64,
}

impl AtomicEntry {
    const fn new() -> Self {
        Self {
            word0: AtomicU64::new(0),
            word1: AtomicU64::new(0),
        }
    }

    /// Load the data word if the slot belongs to `hash` and is intact.
    fn load(&self, hash: u64) -> Option<u64> {
        let w0 = self.word0.load(Ordering::Relaxed);
        let w1 = self.word1.load(Ordering::Relaxed);
        if w0 ^ w1 != hash {
            return None;
        }
        Some(w1)
    }

    fn store(&self, hash: u64, data: u64) {
        self.word0.store(hash ^ data, Ordering::Relaxed);
        self.word1.store(data, Ordering::Relaxed);
    }
}

/// Fixed-capacity transposition table shared by all search threads.
///
/// All method receivers are `&self`; writers never block readers.
pub struct TranspositionTable {
    entries: Box<[AtomicEntry]>,
    /// `capacity - 1`; capacity is a power of two.
    mask: u64,
}

impl TranspositionTable {
    /// Create a table with `entries` slots, rounded down to a power of two.
    pub fn new(entries: usize) -> Self {
        let capacity = if entries.is_power_of_two() {
            entries
        } else {
            (entries.next_power_of_two() >> 1).max(1)
        };

        let entries: Box<[AtomicEntry]> = (0..capacity).map(|_| AtomicEntry::new()).collect();

        Self {
            entries,
            mask: (capacity - 1) as u64,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Zero every slot.
    pub fn clear(&self) {
        for entry in self.entries.iter() {
            entry.word0.store(0, Ordering::Relaxed);
            entry.word1.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    fn slot(&self, hash: u64) -> &AtomicEntry {
        &self.entries[(hash & self.mask) as usize]
    }

    /// Look up `hash`. Returns `None` on an empty slot, a slot owned by a
    /// different position, or a torn entry.
    pub fn lookup(&self, hash: u64, ply: usize) -> Option<TtEntry> {
        let data = self.slot(hash).load(hash)?;

        let bound = Bound::from_bits(data >> 24);
        if bound == Bound::None {
            return None;
        }

        Some(TtEntry {
            best_move: decode_move(data & 0xFFFF),
            score: score_from_tt((data >> 32) as u32 as i32, ply),
            depth: ((data >> 16) & 0xFF) as u8,
            bound,
        })
    }

    /// Write an entry, unconditionally replacing whatever the slot held.
    pub fn store(
        &self,
        hash: u64,
        best_move: Option<ChessMove>,
        score: i32,
        depth: u8,
        bound: Bound,
        ply: usize,
    ) {
        let data = pack(best_move, score_to_tt(score, ply), depth, bound);
        self.slot(hash).store(hash, data);
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Square;

    fn e2e4() -> ChessMove {
        ChessMove::new(Square::E2, Square::E4, None)
    }

    #[test]
    fn atomic_entry_is_16_bytes() {
        assert_eq!(std::mem::size_of::<AtomicEntry>(), 16);
    }

    #[test]
    fn capacity_rounds_down_to_power_of_two() {
        assert_eq!(TranspositionTable::new(1024).capacity(), 1024);
        assert_eq!(TranspositionTable::new(1500).capacity(), 1024);
        assert_eq!(TranspositionTable::new(1).capacity(), 1);
    }

    #[test]
    fn store_and_lookup_roundtrip() {
        let tt = TranspositionTable::new(1024);
        let hash: u64 = 0xDEAD_BEEF_1234_5678;

        tt.store(hash, Some(e2e4()), -150, 5, Bound::Exact, 0);

        let entry = tt.lookup(hash, 0).expect("should find stored entry");
        assert_eq!(entry.best_move, Some(e2e4()));
        assert_eq!(entry.score, -150);
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.bound, Bound::Exact);
    }

    #[test]
    fn promotion_and_missing_move_roundtrip() {
        let tt = TranspositionTable::new(1024);
        let promo = ChessMove::new(Square::E7, Square::D8, Some(Piece::Knight));

        tt.store(1, Some(promo), 12, 3, Bound::LowerBound, 0);
        assert_eq!(tt.lookup(1, 0).unwrap().best_move, Some(promo));

        tt.store(2, None, 7, 1, Bound::UpperBound, 0);
        let entry = tt.lookup(2, 0).unwrap();
        assert_eq!(entry.best_move, None);
        assert_eq!(entry.bound, Bound::UpperBound);
    }

    #[test]
    fn lookup_miss_on_empty_table() {
        let tt = TranspositionTable::new(1024);
        assert!(tt.lookup(0x1234_5678_9ABC_DEF0, 0).is_none());
        assert!(tt.lookup(0, 0).is_none(), "zeroed slot must not match hash 0");
    }

    #[test]
    fn always_replace_overwrites_deeper_entry() {
        let tt = TranspositionTable::new(1024);
        let hash: u64 = 0x1111_2222_3333_4444;
        let d2d4 = ChessMove::new(Square::D2, Square::D4, None);

        tt.store(hash, Some(e2e4()), 100, 20, Bound::Exact, 0);
        tt.store(hash, Some(d2d4), 30, 1, Bound::UpperBound, 0);

        let entry = tt.lookup(hash, 0).unwrap();
        assert_eq!(entry.best_move, Some(d2d4));
        assert_eq!(entry.depth, 1);
        assert_eq!(entry.score, 30);
    }

    #[test]
    fn colliding_hash_evicts_and_misses() {
        let tt = TranspositionTable::new(1024);
        let first: u64 = 0xAAAA_0000_0000_0042;
        let second: u64 = 0xBBBB_0000_0000_0042;

        tt.store(first, Some(e2e4()), 10, 4, Bound::Exact, 0);
        tt.store(second, None, 20, 4, Bound::Exact, 0);

        assert!(tt.lookup(first, 0).is_none(), "overwritten slot must not answer for the old key");
        assert_eq!(tt.lookup(second, 0).unwrap().score, 20);
    }

    #[test]
    fn mate_score_adjustment_roundtrip() {
        let mate_score = 1_000_000 - 3;
        assert_eq!(score_from_tt(score_to_tt(mate_score, 5), 5), mate_score);
        assert_eq!(score_from_tt(score_to_tt(-mate_score, 7), 7), -mate_score);
        assert_eq!(score_from_tt(score_to_tt(150, 10), 10), 150);
    }

    #[test]
    fn mate_score_is_node_relative() {
        let tt = TranspositionTable::new(1024);
        // Mate found 3 plies below a node that sat at ply 4.
        tt.store(99, None, 1_000_000 - 7, 6, Bound::Exact, 4);
        // Reached again at ply 2: still mate 3 plies below the node.
        assert_eq!(tt.lookup(99, 2).unwrap().score, 1_000_000 - 5);
    }

    #[test]
    fn clear_removes_all_entries() {
        let tt = TranspositionTable::new(1024);
        let hash: u64 = 0xAAAA_BBBB_CCCC_DDDD;

        tt.store(hash, Some(e2e4()), 100, 5, Bound::Exact, 0);
        assert!(tt.lookup(hash, 0).is_some());

        tt.clear();
        assert!(tt.lookup(hash, 0).is_none());
    }

    #[test]
    fn torn_write_reads_as_miss() {
        let tt = TranspositionTable::new(1024);
        let hash: u64 = 0xDEAD_BEEF_1234_5678;

        tt.store(hash, Some(e2e4()), 100, 5, Bound::Exact, 0);
        assert!(tt.lookup(hash, 0).is_some());

        // Simulate a second writer that only got as far as word1.
        let entry = tt.slot(hash);
        let other = pack(None, -999, 9, Bound::LowerBound);
        entry.word1.store(other, Ordering::Relaxed);

        assert!(tt.lookup(hash, 0).is_none(), "mixed words must not validate");
    }

    #[test]
    fn concurrent_stress_never_returns_foreign_data() {
        use std::thread;

        let tt = TranspositionTable::new(1 << 10);

        thread::scope(|s| {
            for t in 0..8u64 {
                let tt = &tt;
                s.spawn(move || {
                    for i in 0u64..10_000 {
                        let hash = t
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(i.wrapping_mul(2862933555777941757))
                            ^ 0xDEAD_BEEF_CAFE_F00D;
                        // Score is derived from the hash so any hit can be verified.
                        let score = (hash % 10_000) as i32;
                        tt.store(hash, Some(e2e4()), score, 5, Bound::Exact, 0);
                        if let Some(entry) = tt.lookup(hash, 0) {
                            assert_eq!(entry.score, score);
                            assert_eq!(entry.best_move, Some(e2e4()));
                        }
                    }
                });
            }
        });
    }
}
