//! Block synchronization and group assembly
//!
//! RDS transmits 26-bit blocks: 16 data bits followed by a
//! 10-bit check word. The check word is the remainder of the
//! data modulo the generator polynomial
//!
//! ```txt
//! g(x) = x^10 + x^8 + x^7 + x^5 + x^4 + x^3 + 1
//! ```
//!
//! XOR'd with an *offset word* that identifies the block's
//! position within the group. Because each offset word is
//! shorter than g(x), the syndrome of an error-free block is
//! its offset word.
//!
//! The [`BlockStream`] searches every bit position for a
//! valid block. Sync is acquired once two valid blocks are
//! found at a spacing consistent with their offsets. After
//! that, a block is read every 26 bits. Blocks which fail
//! their check are counted as errors, not corrected. Sync is
//! dropped when too many of the recent blocks are bad.

use std::collections::VecDeque;

use arraydeque::ArrayDeque;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::group::{Group, Offset};

/// Bits per block, including the check word
pub const BITS_PER_BLOCK: u64 = 26;

/// Generator polynomial, including the x^10 term
const POLY: u32 = 0x5B9;

/// Width of the check word
const CHECK_BITS: u32 = 10;

const BLOCK_MASK: u32 = (1 << BITS_PER_BLOCK) - 1;

/// Size of the block error history window
const ERROR_WINDOW: usize = 50;

/// Drop sync when more than this many blocks in the window are bad
const MAX_ERRORS_TO_KEEP_SYNC: usize = 45;

/// Longest gap between two blocks that may be used to acquire sync
const MAX_SYNC_SEARCH_BLOCKS: u64 = 3;

/// Number of valid blocks remembered while searching for sync
const SYNC_CANDIDATES: usize = 8;

/// Offset word XOR'd onto each block's check word
pub(crate) fn offset_word(offset: Offset) -> u16 {
    match offset {
        Offset::A => 0x0FC,
        Offset::B => 0x198,
        Offset::C => 0x168,
        Offset::CPrime => 0x350,
        Offset::D => 0x1B4,
    }
}

/// Offset identified by a block's syndrome, if any
fn offset_for_syndrome(syndrome: u16) -> Option<Offset> {
    [
        Offset::A,
        Offset::B,
        Offset::C,
        Offset::CPrime,
        Offset::D,
    ]
    .into_iter()
    .find(|ofs| offset_word(*ofs) == syndrome)
}

/// Remainder of the 26-bit `block` modulo g(x)
pub(crate) fn calc_syndrome(block: u32) -> u16 {
    let mut reg = block & BLOCK_MASK;
    for bit in (CHECK_BITS..BITS_PER_BLOCK as u32).rev() {
        if reg & (1 << bit) != 0 {
            reg ^= POLY << (bit - CHECK_BITS);
        }
    }
    (reg & ((1 << CHECK_BITS) - 1)) as u16
}

/// Encode `data` as a 26-bit block with the given offset
#[cfg(test)]
pub(crate) fn encode_block(data: u16, offset: Offset) -> u32 {
    let shifted = (data as u32) << CHECK_BITS;
    let check = calc_syndrome(shifted) ^ offset_word(offset);
    shifted | check as u32
}

// A valid block seen while searching for sync
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SyncCandidate {
    bitcount: u64,
    offset: Offset,
}

/// Converts a stream of bits into RDS groups
///
/// Push bits, most significant first, with
/// [`push_bit()`](#method.push_bit). Whenever
/// [`has_group_ready()`](#method.has_group_ready) is true,
/// a completed group may be taken with
/// [`pop_group()`](#method.pop_group).
#[derive(Clone, Debug)]
pub struct BlockStream {
    // last 26 bits received, most recent in the LSb
    shift_register: u32,

    // lifetime total bits received
    bitcount: u64,

    // bits until the next block boundary, when in sync
    bits_until_next_block: u64,

    // position of the next block, when in sync
    expected_offset: Offset,

    // valid blocks seen while searching
    candidates: ArrayDeque<SyncCandidate, SYNC_CANDIDATES, arraydeque::Wrapping>,

    is_in_sync: bool,

    // true for each recent block that failed
    error_history: ArrayDeque<bool, ERROR_WINDOW, arraydeque::Wrapping>,

    bits_since_sync_lost: u64,

    current_group: Group,

    ready_groups: VecDeque<Group>,
}

impl BlockStream {
    /// New block synchronizer, searching for sync
    pub fn new() -> Self {
        Self {
            shift_register: 0,
            bitcount: 0,
            bits_until_next_block: 0,
            expected_offset: Offset::A,
            candidates: ArrayDeque::default(),
            is_in_sync: false,
            error_history: ArrayDeque::default(),
            bits_since_sync_lost: 0,
            current_group: Group::new(),
            ready_groups: VecDeque::new(),
        }
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Process one received bit
    pub fn push_bit(&mut self, bit: bool) {
        self.shift_register = ((self.shift_register << 1) | bit as u32) & BLOCK_MASK;
        self.bitcount += 1;

        if !self.is_in_sync {
            self.bits_since_sync_lost += 1;
            if self.bitcount >= BITS_PER_BLOCK {
                self.search_sync();
            }
            return;
        }

        self.bits_until_next_block -= 1;
        if self.bits_until_next_block == 0 {
            self.bits_until_next_block = BITS_PER_BLOCK;
            self.read_block();
        }
    }

    /// True if a completed group is waiting
    pub fn has_group_ready(&self) -> bool {
        !self.ready_groups.is_empty()
    }

    /// Take the oldest completed group
    ///
    /// Returns an empty group if none is ready.
    pub fn pop_group(&mut self) -> Group {
        self.ready_groups.pop_front().unwrap_or_default()
    }

    /// Take the group currently being assembled
    ///
    /// The group is returned even if it is incomplete. The
    /// next block read will begin a new group. The returned
    /// group is empty if no blocks have been read into it.
    pub fn flush_current_group(&mut self) -> Group {
        std::mem::take(&mut self.current_group)
    }

    /// Count of bits received since sync was last lost
    ///
    /// Zero while in sync.
    pub fn num_bits_since_sync_lost(&self) -> u64 {
        if self.is_in_sync {
            0
        } else {
            self.bits_since_sync_lost
        }
    }

    /// Is the block synchronization acquired?
    pub fn is_in_sync(&self) -> bool {
        self.is_in_sync
    }

    // Look for a valid block ending at the current bit
    fn search_sync(&mut self) {
        let offset = match offset_for_syndrome(calc_syndrome(self.shift_register)) {
            Some(ofs) => ofs,
            None => return,
        };

        let here = SyncCandidate {
            bitcount: self.bitcount,
            offset,
        };

        let is_consistent = self.candidates.iter().any(|prev| {
            let distance = here.bitcount - prev.bitcount;
            let blocks = distance / BITS_PER_BLOCK;
            distance % BITS_PER_BLOCK == 0
                && blocks <= MAX_SYNC_SEARCH_BLOCKS
                && (prev.offset.index() + blocks as usize) % 4 == offset.index()
        });

        if is_consistent {
            self.acquire_sync(offset);
        } else {
            self.candidates.push_back(here);
        }
    }

    fn acquire_sync(&mut self, offset: Offset) {
        debug!(
            "blockstream: acquired sync at bit {} on block {:?}",
            self.bitcount, offset
        );
        self.is_in_sync = true;
        self.candidates.clear();
        self.error_history.clear();
        self.bits_until_next_block = BITS_PER_BLOCK;

        // the block that completed sync is the first block read.
        // Earlier blocks of its group were missed.
        self.current_group = Group::new();
        for _ in 0..offset.index() {
            self.current_group.mark_error();
        }
        self.expected_offset = offset;
        self.read_block();
    }

    fn drop_sync(&mut self) {
        debug!(
            "blockstream: lost sync at bit {} ({} of last {} blocks bad)",
            self.bitcount,
            self.error_history.iter().filter(|err| **err).count(),
            ERROR_WINDOW
        );
        self.is_in_sync = false;
        self.bits_since_sync_lost = 0;
        self.candidates.clear();
        self.error_history.clear();
        self.finish_group();
    }

    // Read the block ending at the current bit
    fn read_block(&mut self) {
        let expected = self.expected_offset;
        let data = (self.shift_register >> CHECK_BITS) as u16;
        let received = offset_for_syndrome(calc_syndrome(self.shift_register));

        // a block A always begins a new group
        if expected.index() == 0 {
            self.finish_group();
        }

        let is_error = match received {
            Some(ofs) if expected.accepts(ofs) => {
                self.current_group.set_block(ofs, data);
                false
            }
            _ => {
                self.current_group.mark_error();
                true
            }
        };
        self.error_history.push_back(is_error);

        if expected == Offset::D {
            self.finish_group();
        }
        self.expected_offset = expected.next();

        let num_errors = self.error_history.iter().filter(|err| **err).count();
        if self.error_history.is_full() && num_errors > MAX_ERRORS_TO_KEEP_SYNC {
            self.drop_sync();
        }
    }

    // Queue the current group if any block was read into it,
    // even if every one of those blocks was bad
    fn finish_group(&mut self) {
        let group = std::mem::take(&mut self.current_group);
        if !group.is_empty() || group.num_errors() > 0 {
            self.ready_groups.push_back(group);
        }
    }
}

impl Default for BlockStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode four blocks as a stream of 104 bits
///
/// Missing blocks are sent as all-zero data with a
/// deliberately corrupt check word.
#[cfg(test)]
pub(crate) fn encode_group_bits(blocks: [Option<u16>; 4], version_b: bool) -> Vec<bool> {
    let offsets = [
        Offset::A,
        Offset::B,
        if version_b { Offset::CPrime } else { Offset::C },
        Offset::D,
    ];
    let mut out = Vec::with_capacity(4 * BITS_PER_BLOCK as usize);
    for (block, ofs) in blocks.iter().zip(offsets.iter()) {
        let word = match block {
            Some(data) => encode_block(*data, *ofs),
            None => encode_block(0, *ofs) ^ 0x1,
        };
        for bit in (0..BITS_PER_BLOCK).rev() {
            out.push(word & (1 << bit) != 0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_all(bs: &mut BlockStream, bits: &[bool]) -> Vec<Group> {
        let mut out = vec![];
        for &bit in bits {
            bs.push_bit(bit);
            while bs.has_group_ready() {
                out.push(bs.pop_group());
            }
        }
        out
    }

    #[test]
    fn test_syndrome() {
        // an error-free block's syndrome is its offset word
        for ofs in [Offset::A, Offset::B, Offset::C, Offset::CPrime, Offset::D] {
            for data in [0x0000u16, 0x6201, 0xffff, 0x2037] {
                let block = encode_block(data, ofs);
                assert_eq!(offset_word(ofs), calc_syndrome(block));
                assert_eq!(Some(ofs), offset_for_syndrome(calc_syndrome(block)));
            }
        }

        // single bit errors are always detected
        let block = encode_block(0x6201, Offset::A);
        for bit in 0..BITS_PER_BLOCK {
            let corrupt = block ^ (1 << bit);
            assert_ne!(Some(Offset::A), offset_for_syndrome(calc_syndrome(corrupt)));
        }
    }

    #[test]
    fn test_acquire_and_read() {
        let mut bs = BlockStream::new();
        let mut bits = vec![false, true, true, false, true];
        for _ in 0..3 {
            bits.extend(encode_group_bits(
                [Some(0x6201), Some(0x0408), Some(0x2037), Some(0x2020)],
                false,
            ));
        }

        let groups = push_all(&mut bs, &bits);
        assert!(bs.is_in_sync());
        assert_eq!(0, bs.num_bits_since_sync_lost());

        // sync is acquired on block B of the first group, so
        // the first group is partial. Its block A was valid but
        // read before sync.
        assert_eq!(3, groups.len());
        assert_eq!(
            &[None, Some(0x0408), Some(0x2037), Some(0x2020)],
            groups[0].blocks()
        );
        assert_eq!(1, groups[0].num_errors());
        for group in &groups[1..] {
            assert_eq!("6201 0408 2037 2020", group.to_string());
            assert_eq!(0, group.num_errors());
        }
    }

    #[test]
    fn test_block_errors() {
        let mut bs = BlockStream::new();
        let mut bits = encode_group_bits(
            [Some(0x6201), Some(0x0408), Some(0x2037), Some(0x2020)],
            false,
        );
        bits.extend(encode_group_bits(
            [Some(0x6201), None, Some(0x2037), None],
            false,
        ));
        bits.extend(encode_group_bits(
            [Some(0x6201), Some(0x2800), Some(0x6201), Some(0x4142)],
            true,
        ));

        let groups = push_all(&mut bs, &bits);
        assert_eq!(3, groups.len());
        assert_eq!("6201 ---- 2037 ----", groups[1].to_string());
        assert_eq!(2, groups[1].num_errors());
        assert_eq!(0, groups[2].num_errors());
        assert_eq!(Some(0x6201), groups[2].pi());
    }

    #[test]
    fn test_flush_partial() {
        let mut bs = BlockStream::new();
        let mut bits = encode_group_bits(
            [Some(0x6201), Some(0x0408), Some(0x2037), Some(0x2020)],
            false,
        );
        // two blocks of the next group
        bits.extend(
            encode_group_bits(
                [Some(0x6201), Some(0x0409), Some(0x2037), Some(0x2020)],
                false,
            )
            .into_iter()
            .take(2 * BITS_PER_BLOCK as usize),
        );

        let groups = push_all(&mut bs, &bits);
        assert_eq!(1, groups.len());

        let partial = bs.flush_current_group();
        assert_eq!("6201 0409 ---- ----", partial.to_string());
        assert!(bs.flush_current_group().is_empty());
    }

    #[test]
    fn test_lose_sync() {
        let mut bs = BlockStream::new();
        let mut bits = vec![];
        for _ in 0..2 {
            bits.extend(encode_group_bits(
                [Some(0x6201), Some(0x0408), Some(0x2037), Some(0x2020)],
                false,
            ));
        }
        push_all(&mut bs, &bits);
        assert!(bs.is_in_sync());

        // alternating bits never form a valid block
        let noise: Vec<bool> = (0..(BITS_PER_BLOCK as usize * 60))
            .map(|i| i % 2 == 0)
            .collect();
        let lost = push_all(&mut bs, &noise);
        assert!(!bs.is_in_sync());

        // sync holds for 46 bad blocks. Every group read in that
        // time is reported, with all of its blocks in error. The
        // last one is cut short when sync drops.
        assert_eq!(12, lost.len());
        for group in &lost[..11] {
            assert!(group.is_empty());
            assert_eq!(4, group.num_errors());
        }
        assert!(lost[11].is_empty());
        assert_eq!(2, lost[11].num_errors());
        assert!(bs.num_bits_since_sync_lost() > 0);
        assert!(bs.num_bits_since_sync_lost() < noise.len() as u64);

        bs.reset();
        assert_eq!(0, bs.num_bits_since_sync_lost());
        bs.push_bit(true);
        assert_eq!(1, bs.num_bits_since_sync_lost());
    }
}
