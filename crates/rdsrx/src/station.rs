//! Per-station group interpretation
//!
//! A [`Station`] holds everything that has been decoded for
//! one PI code. When the channel confirms a new PI code, it
//! builds a new `Station` and discards the old one.
//!
//! Only the group header, the programme service name (group
//! 0) and radiotext (group 2) are decoded. Other group types
//! are reported by type.

use std::io::{self, Write};

use serde::Serialize;

use crate::builder::ChannelOptions;
use crate::clock::format_time;
use crate::group::{Group, GroupType, GroupVersion};

/// Length of the programme service name
const PS_LENGTH: usize = 8;

/// Radiotext length for version A groups
const RT_LENGTH_A: usize = 64;

/// Radiotext length for version B groups
const RT_LENGTH_B: usize = 32;

/// Marks the end of a radiotext message shorter than the maximum
const RT_END_MARKER: u8 = 0x0D;

/// Decoded state for one station
#[derive(Clone, Debug)]
pub struct Station {
    pi: Option<u16>,
    channel_index: u32,
    bler: bool,
    timestamp: bool,
    time_format: String,
    ps: SegmentedText<PS_LENGTH>,
    radiotext: SegmentedText<RT_LENGTH_A>,
    radiotext_ab: Option<bool>,
    radiotext_version: Option<GroupVersion>,
}

impl Station {
    /// New station with nothing decoded
    ///
    /// `pi` is the confirmed PI code, if one is known.
    pub fn new(options: &ChannelOptions, channel_index: u32, pi: Option<u16>) -> Self {
        Self {
            pi,
            channel_index,
            bler: options.bler(),
            timestamp: options.timestamp(),
            time_format: options.time_format().to_owned(),
            ps: SegmentedText::new(PS_LENGTH),
            radiotext: SegmentedText::new(RT_LENGTH_A),
            radiotext_ab: None,
            radiotext_version: None,
        }
    }

    /// The PI code this station was created for
    pub fn pi(&self) -> Option<u16> {
        self.pi
    }

    /// Programme service name, once completely received
    pub fn ps(&self) -> Option<String> {
        self.ps.complete()
    }

    /// Radiotext, once completely received
    pub fn radiotext(&self) -> Option<String> {
        self.radiotext
            .complete()
            .map(|rt| rt.trim_end().to_owned())
    }

    /// Decode `group` and print it to `out` as one JSON line
    ///
    /// Groups without block B carry no decodable data; they
    /// are printed with just their PI, if one is known.
    pub fn update_and_print<W>(&mut self, group: &Group, out: &mut W) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        let pi = group.pi().or(self.pi);
        let mut record = Record {
            pi: pi.map(|pi| format!("0x{:04X}", pi)),
            ..Record::default()
        };

        if let Some(block_b) = group.block(1) {
            let group_type = GroupType::from_block_b(block_b);
            record.group = Some(group_type.to_string());
            record.tp = Some(block_b & 0x0400 != 0);
            record.prog_type = Some(((block_b >> 5) & 0x1F) as u8);

            match group_type.number() {
                0 => {
                    self.decode_ps(group, block_b);
                    record.ps = self.ps();
                }
                2 => {
                    self.decode_radiotext(group, group_type.version(), block_b);
                    record.radiotext = self.radiotext();
                }
                _ => {}
            }
        } else if pi.is_none() {
            return Ok(());
        }

        if self.bler {
            record.bler = group.bler().map(|pct| pct.round() as u8);
        }
        if self.timestamp {
            record.rx_time = group
                .rx_time()
                .map(|tm| format_time(&tm, &self.time_format));
        }
        if self.channel_index != 0 {
            record.channel = Some(self.channel_index);
        }

        let line = serde_json::to_string(&record).map_err(io::Error::from)?;
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()
    }

    // Group 0A/0B: two characters of the PS name in block D
    fn decode_ps(&mut self, group: &Group, block_b: u16) {
        if let Some(block_d) = group.block(3) {
            let segment = (block_b & 0x3) as usize;
            self.ps.update(segment * 2, &block_d.to_be_bytes());
        }
    }

    // Group 2A: four characters in blocks C and D
    // Group 2B: two characters in block D
    fn decode_radiotext(&mut self, group: &Group, version: GroupVersion, block_b: u16) {
        let ab = block_b & 0x10 != 0;
        if self.radiotext_ab != Some(ab) || self.radiotext_version != Some(version) {
            let length = match version {
                GroupVersion::A => RT_LENGTH_A,
                GroupVersion::B => RT_LENGTH_B,
            };
            self.radiotext = SegmentedText::new(length);
            self.radiotext_ab = Some(ab);
            self.radiotext_version = Some(version);
        }

        let segment = (block_b & 0xF) as usize;
        match (version, group.block(2), group.block(3)) {
            (GroupVersion::A, Some(block_c), Some(block_d)) => {
                let [c0, c1] = block_c.to_be_bytes();
                let [d0, d1] = block_d.to_be_bytes();
                self.radiotext.update(segment * 4, &[c0, c1, d0, d1]);
            }
            (GroupVersion::B, _, Some(block_d)) => {
                self.radiotext.update(segment * 2, &block_d.to_be_bytes());
            }
            _ => {}
        }
    }
}

/// One JSON output line
#[derive(Clone, Debug, Default, Serialize)]
struct Record {
    #[serde(skip_serializing_if = "Option::is_none")]
    pi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prog_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radiotext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bler: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rx_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<u32>,
}

/// Text which is transmitted a few characters at a time
///
/// The text is complete once every segment up to its end
/// has been received. The end is either the full length or
/// an end-of-message marker.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SegmentedText<const N: usize> {
    chars: [u8; N],
    received: [bool; N],
    length: usize,
    end: Option<usize>,
}

impl<const N: usize> SegmentedText<N> {
    // `length` is capped at N
    fn new(length: usize) -> Self {
        Self {
            chars: [b' '; N],
            received: [false; N],
            length: usize::min(length, N),
            end: None,
        }
    }

    fn update(&mut self, position: usize, chars: &[u8]) {
        for (i, &ch) in chars.iter().enumerate() {
            let pos = position + i;
            if pos >= self.length {
                break;
            }
            if ch == RT_END_MARKER {
                self.end = Some(pos);
            }
            self.chars[pos] = ch;
            self.received[pos] = true;
        }
    }

    fn complete(&self) -> Option<String> {
        let end = self.end.unwrap_or(self.length);
        if !self.received[..end].iter().all(|rx| *rx) {
            return None;
        }

        Some(
            self.chars[..end]
                .iter()
                .map(|&ch| {
                    if ch.is_ascii_graphic() || ch == b' ' {
                        ch as char
                    } else {
                        ' '
                    }
                })
                .collect(),
        )
    }
}
