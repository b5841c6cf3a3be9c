//! RDS groups
//!
//! A [`Group`] is the unit of decoded RDS data. It carries up to
//! four 16-bit blocks:
//!
//! ```txt
//! +---------+---------+----------+---------+
//! | A: PI   | B: type | C or C'  | D       |
//! +---------+---------+----------+---------+
//! ```
//!
//! Blocks which were not received, or which failed their check
//! word, are missing. Each missing block counts as one error.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Number of blocks in a group
pub const BLOCKS_PER_GROUP: usize = 4;

/// RDS bit rate, in bits per second
pub const BITS_PER_SECOND: f64 = 1187.5;

/// Block position within a group
///
/// Each position is identified on the air by its offset
/// word. The third block is sent with offset C in version A
/// groups and with offset C' in version B groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Offset {
    A,
    B,
    C,
    CPrime,
    D,
}

impl Offset {
    /// Index of this block within the group, from `0` to `3`
    pub fn index(&self) -> usize {
        match self {
            Offset::A => 0,
            Offset::B => 1,
            Offset::C | Offset::CPrime => 2,
            Offset::D => 3,
        }
    }

    /// Offset expected for the block after this one
    ///
    /// Block C and C' are interchangeable in position, so the
    /// block following `B` is reported as `C`.
    pub fn next(&self) -> Offset {
        match self {
            Offset::A => Offset::B,
            Offset::B => Offset::C,
            Offset::C | Offset::CPrime => Offset::D,
            Offset::D => Offset::A,
        }
    }

    /// True if a block received with `other` may stand in this position
    pub fn accepts(&self, other: Offset) -> bool {
        self.index() == other.index()
    }
}

/// Group version
///
/// Version B groups repeat the PI code in block C'.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
pub enum GroupVersion {
    A,
    B,
}

/// Group type and version, like `0A` or `2B`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupType {
    number: u8,
    version: GroupVersion,
}

impl GroupType {
    /// Decode the group type from the contents of block B
    pub fn from_block_b(block: u16) -> Self {
        let version = if block & 0x0800 == 0 {
            GroupVersion::A
        } else {
            GroupVersion::B
        };
        Self {
            number: (block >> 12) as u8,
            version,
        }
    }

    /// Group type number, from `0` to `15`
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Group version
    pub fn version(&self) -> GroupVersion {
        self.version
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.version)
    }
}

/// Error parsing a group from its hex representation
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupParseErr {
    /// The line does not have four blocks of four hex digits
    #[error("invalid hex group: expected four blocks like \"6201 0408 2037 2020\"")]
    Malformed,

    /// Every block is missing
    #[error("invalid hex group: no blocks present")]
    NoBlocks,
}

/// A received RDS group
///
/// Groups are produced by the
/// [block synchronizer](crate::BlockStream) or parsed from
/// hex text. The [`Channel`](crate::Channel) annotates them
/// with a receive time and a block error rate.
///
/// `Display` prints the raw hex form, with `----` for each
/// missing block:
///
/// ```
/// use rdsrx::Group;
///
/// let group: Group = "6201 0408 ---- 2020".parse().unwrap();
/// assert_eq!(Some(0x6201), group.pi());
/// assert_eq!(1, group.num_errors());
/// assert_eq!("6201 0408 ---- 2020", group.to_string());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    blocks: [Option<u16>; BLOCKS_PER_GROUP],
    c_prime: bool,
    num_errors: u8,
    rx_time: Option<DateTime<Utc>>,
    bler: Option<f32>,
}

impl Group {
    /// An empty group, with no blocks
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from blocks
    ///
    /// Every missing block counts as an error.
    pub fn from_blocks(blocks: [Option<u16>; BLOCKS_PER_GROUP]) -> Self {
        let num_errors = blocks.iter().filter(|b| b.is_none()).count() as u8;
        Self {
            blocks,
            num_errors,
            ..Self::default()
        }
    }

    /// Store a correctly-received block
    pub(crate) fn set_block(&mut self, offset: Offset, data: u16) {
        self.blocks[offset.index()] = Some(data);
        if offset == Offset::CPrime {
            self.c_prime = true;
        }
    }

    /// Count a block which was lost or failed its check word
    pub(crate) fn mark_error(&mut self) {
        self.num_errors = u8::min(self.num_errors + 1, BLOCKS_PER_GROUP as u8);
    }

    /// Block at `index`, if it was received
    pub fn block(&self, index: usize) -> Option<u16> {
        self.blocks.get(index).copied().flatten()
    }

    /// All blocks
    pub fn blocks(&self) -> &[Option<u16>; BLOCKS_PER_GROUP] {
        &self.blocks
    }

    /// True if no block was received
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Option::is_none)
    }

    /// Number of blocks in error, from `0` to `4`
    pub fn num_errors(&self) -> u8 {
        self.num_errors
    }

    /// Group type, if block B was received
    pub fn group_type(&self) -> Option<GroupType> {
        self.block(1).map(GroupType::from_block_b)
    }

    /// Programme identification code
    ///
    /// Read from block A. If block A was lost, version B
    /// groups still carry the code in block C'.
    pub fn pi(&self) -> Option<u16> {
        self.block(0).or_else(|| {
            let is_version_b = self
                .group_type()
                .map(|gt| gt.version() == GroupVersion::B)
                .unwrap_or(false);
            if self.c_prime || is_version_b {
                self.block(2)
            } else {
                None
            }
        })
    }

    /// True if the group carries a PI code
    pub fn has_pi(&self) -> bool {
        self.pi().is_some()
    }

    /// Receive time, if stamped
    pub fn rx_time(&self) -> Option<DateTime<Utc>> {
        self.rx_time
    }

    /// True if the group has a receive time
    pub fn has_time(&self) -> bool {
        self.rx_time.is_some()
    }

    /// Set the receive time
    pub fn set_rx_time(&mut self, time: DateTime<Utc>) {
        self.rx_time = Some(time);
    }

    /// Average block error rate as of this group, in percent
    pub fn bler(&self) -> Option<f32> {
        self.bler
    }

    /// Annotate with an average block error rate, in percent
    pub fn set_bler(&mut self, percent: f32) {
        self.bler = Some(percent);
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match block {
                Some(data) => write!(f, "{:04X}", data)?,
                None => f.write_str("----")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Group {
    type Err = GroupParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^\s*([0-9A-Fa-f]{4}|-{4})(\s+([0-9A-Fa-f]{4}|-{4})){3}\s*$")
                    .expect("bad hex group regexp");
        }

        if !RE.is_match(s) {
            return Err(GroupParseErr::Malformed);
        }

        let mut blocks = [None; BLOCKS_PER_GROUP];
        for (out, word) in blocks.iter_mut().zip(s.split_whitespace()) {
            *out = u16::from_str_radix(word, 16).ok();
        }

        let group = Group::from_blocks(blocks);
        if group.is_empty() {
            Err(GroupParseErr::NoBlocks)
        } else {
            Ok(group)
        }
    }
}
