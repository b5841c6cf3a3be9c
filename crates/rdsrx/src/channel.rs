//! One RDS receive channel
//!
//! A [`Channel`] represents one FM multiplex: a single
//! frequency, or one channel of a multi-channel recording.
//! The station on the channel may change at any time, due to
//! retuning or propagation.
//!
//! The channel accepts single bits, buffers of bits, or
//! already-assembled groups. Don't mix these on one channel.
//! Each group, however it arrives, is:
//!
//! 1. stamped with a receive time which never runs backwards;
//! 2. annotated with the running block error rate;
//! 3. checked for a change of PI code, which replaces the
//!    [`Station`] once confirmed; and
//! 4. printed, either as raw hex or via the `Station`.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::average::RunningAverage;
use crate::blockstream::BlockStream;
use crate::builder::{ChannelOptions, OutputType};
use crate::cachedpi::{CachedPi, PiStatus};
use crate::clock::{backdate, format_time, Clock};
use crate::group::{Group, BITS_PER_SECOND};
use crate::station::Station;

/// A run of received bits
///
/// `time_received` is the time at which the *last* bit of
/// `bits` was captured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitBuffer {
    pub bits: Vec<bool>,
    pub time_received: DateTime<Utc>,
}

impl BitBuffer {
    /// Bits captured, ending at `time_received`
    pub fn new(bits: Vec<bool>, time_received: DateTime<Utc>) -> Self {
        Self {
            bits,
            time_received,
        }
    }
}

/// RDS receive channel
///
/// Create with a [`ChannelBuilder`](crate::ChannelBuilder).
/// Output is written to `W`, which is flushed after every
/// group. Receive times are taken from the clock `C`.
#[derive(Debug)]
pub struct Channel<W, C>
where
    W: Write,
    C: Clock,
{
    options: ChannelOptions,
    output: W,
    clock: C,
    block_stream: BlockStream,
    cached_pi: CachedPi,
    station: Station,
    bler_average: RunningAverage,
    last_group_rx_time: Option<DateTime<Utc>>,
}

impl<W, C> Channel<W, C>
where
    W: Write,
    C: Clock,
{
    /// New channel
    ///
    /// If `pi` is given, it is treated as confirmed and the
    /// station is created for it.
    pub fn new(options: ChannelOptions, pi: Option<u16>, output: W, clock: C) -> Self {
        let cached_pi = match pi {
            Some(pi) => CachedPi::with_confirmed(pi),
            None => CachedPi::new(),
        };
        let station = Station::new(&options, options.channel_index(), pi);

        Self {
            options,
            output,
            clock,
            block_stream: BlockStream::new(),
            cached_pi,
            station,
            bler_average: RunningAverage::new(),
            last_group_rx_time: None,
        }
    }

    /// Process one demodulated bit
    ///
    /// Groups completed by this bit are stamped with the
    /// current time.
    pub fn process_bit(&mut self, bit: bool) -> io::Result<()> {
        self.block_stream.push_bit(bit);
        while self.block_stream.has_group_ready() {
            let group = self.block_stream.pop_group();
            self.process_group(group)?;
        }
        Ok(())
    }

    /// Process a buffer of demodulated bits
    ///
    /// Each group completed within the buffer is stamped with
    /// the buffer's receive time, less the time it took to
    /// receive the bits that follow the group's last bit.
    pub fn process_buffer(&mut self, buffer: &BitBuffer) -> io::Result<()> {
        for (i, &bit) in buffer.bits.iter().enumerate() {
            self.block_stream.push_bit(bit);
            while self.block_stream.has_group_ready() {
                let mut group = self.block_stream.pop_group();
                group.set_rx_time(backdate(buffer.time_received, buffer.bits.len(), i));
                self.process_group(group)?;
            }
        }
        Ok(())
    }

    /// Handle `group` as if it was just received
    ///
    /// Empty groups still count toward the block error rate,
    /// but are not printed. Errors are returned only if the
    /// output cannot be written.
    pub fn process_group(&mut self, mut group: Group) -> io::Result<()> {
        if self.options.timestamp() && !group.has_time() {
            group.set_rx_time(self.clock.now());
        }
        self.enforce_monotonic_time(&mut group);

        if self.options.bler() {
            self.bler_average
                .push(group.num_errors() as f32 / crate::group::BLOCKS_PER_GROUP as f32);
            group.set_bler(100.0f32 * self.bler_average.average());
        }

        if group.is_empty() {
            return Ok(());
        }

        // A change of PI discards everything known about the
        // station, so the change must be repeated to count
        if let Some(pi) = group.pi() {
            match self.cached_pi.observe(pi) {
                PiStatus::ChangeConfirmed => {
                    debug!(
                        "channel {}: PI changed to {:04X}",
                        self.options.channel_index(),
                        pi
                    );
                    let station =
                        Station::new(&self.options, self.options.channel_index(), Some(pi));
                    self.station = station;
                }
                PiStatus::SpuriousChange | PiStatus::NoChange => {}
            }
        }

        match self.options.output_type() {
            OutputType::Hex => self.print_hex(&group),
            OutputType::Json => self.station.update_and_print(&group, &mut self.output),
        }
    }

    /// Process the group still being assembled
    ///
    /// Call once at the end of input so that a partially
    /// received final group is not lost.
    pub fn flush(&mut self) -> io::Result<()> {
        let last_group = self.block_stream.flush_current_group();
        if !last_group.is_empty() {
            self.process_group(last_group)?;
        }
        Ok(())
    }

    /// Approximate time since block sync was lost
    ///
    /// Derived from the number of bits received without sync.
    /// Not suitable for measurement.
    pub fn seconds_since_carrier_lost(&self) -> f32 {
        (self.block_stream.num_bits_since_sync_lost() as f64 / BITS_PER_SECOND) as f32
    }

    /// Current time, from the channel's clock
    ///
    /// Use this to stamp a [`BitBuffer`] as it is captured.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Forget the confirmed PI code
    ///
    /// The current station is kept until a new PI code is
    /// confirmed.
    pub fn reset_pi(&mut self) {
        self.cached_pi.reset();
    }

    /// Confirmed PI code, if any
    pub fn pi(&self) -> Option<u16> {
        self.cached_pi.get()
    }

    /// The current station
    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Which channel of a multi-channel input this is
    pub fn channel_index(&self) -> u32 {
        self.options.channel_index()
    }

    /// Channel options
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Receive time of the last group stamped
    pub fn last_group_rx_time(&self) -> Option<DateTime<Utc>> {
        self.last_group_rx_time
    }

    /// Consume the channel, returning its output
    pub fn into_output(self) -> W {
        self.output
    }

    // Sources which run faster than real time make receive
    // times run backwards. Hold the time at the last value
    // instead.
    fn enforce_monotonic_time(&mut self, group: &mut Group) {
        let time = match group.rx_time() {
            Some(time) => time,
            None => return,
        };

        match self.last_group_rx_time {
            Some(last) if time < last => group.set_rx_time(last),
            _ => self.last_group_rx_time = Some(time),
        }
    }

    fn print_hex(&mut self, group: &Group) -> io::Result<()> {
        write!(self.output, "{}", group)?;
        if self.options.timestamp() {
            if let Some(time) = group.rx_time() {
                write!(
                    self.output,
                    " {}",
                    format_time(&time, self.options.time_format())
                )?;
            }
        }
        self.output.write_all(b"\n")?;
        self.output.flush()
    }
}
