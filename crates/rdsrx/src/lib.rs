//! # rdsrx: RDS Channel Receiver
//!
//! This crate turns demodulated
//! [Radio Data System](https://en.wikipedia.org/wiki/Radio_Data_System)
//! (RDS) bits into a stream of timestamped, decoded groups for
//! one receive channel.
//!
//! RDS is a 1187.5 bit/s data channel carried on a 57 kHz
//! subcarrier of an FM broadcast. Data is sent in *groups* of
//! four 26-bit blocks. Recovering the bits from the FM
//! multiplex signal is beyond the scope of this crate.
//!
//! ## Example
//!
//! ```
//! use rdsrx::{ChannelBuilder, OutputType};
//!
//! # let some_bit_source = || std::iter::repeat(false).take(1000);
//! let stdout = std::io::stdout();
//! let mut channel = ChannelBuilder::new()
//!     .with_output_type(OutputType::Json)  // or OutputType::Hex
//!     .with_bler(true)                     // report block error rate
//!     .build(stdout.lock());
//!
//! for bit in some_bit_source() {
//!     channel.process_bit(bit).expect("stdout closed");
//! }
//!
//! // print anything still being assembled
//! channel.flush().expect("stdout closed");
//! ```
//!
//! Each group passes through the [`Channel`]:
//!
//! 1. The [`BlockStream`] synchronizes to block boundaries and
//!    assembles groups. Blocks which fail their check word are
//!    counted as errors.
//!
//! 2. The group is stamped with its receive time. Bits may be
//!    submitted in [buffers](BitBuffer) with a capture time, in
//!    which case each group's time is back-dated to its last
//!    bit. Receive times never run backwards.
//!
//! 3. The PI code identifies the station. A new PI code must be
//!    received twice in a row before it replaces the current
//!    station (see [`CachedPi`]), at which point everything
//!    decoded for the old station is discarded.
//!
//! 4. The group is printed as hex or handed to the
//!    [`Station`] for decoding.
//!
//! Pre-decoded groups can be parsed from hex and submitted
//! directly with [`Channel::process_group()`].

mod average;
mod blockstream;
mod builder;
mod cachedpi;
mod channel;
mod clock;
mod group;
mod station;

pub use average::{RunningAverage, BLER_WINDOW};
pub use blockstream::{BlockStream, BITS_PER_BLOCK};
pub use builder::{ChannelBuilder, ChannelOptions, OutputType, DEFAULT_TIME_FORMAT};
pub use cachedpi::{CachedPi, PiStatus};
pub use channel::{BitBuffer, Channel};
pub use clock::{backdate, format_time, is_valid_time_format, Clock, ManualClock, SystemClock};
pub use group::{
    Group, GroupParseErr, GroupType, GroupVersion, Offset, BITS_PER_SECOND, BLOCKS_PER_GROUP,
};
pub use station::Station;
