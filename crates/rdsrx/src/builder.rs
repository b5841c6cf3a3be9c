use std::io::Write;

use crate::channel::Channel;
use crate::clock::{Clock, SystemClock};

/// Default receive time format
///
/// ISO 8601 with microseconds, like
/// `2024-03-01T12:00:00.000000+00:00`.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// How decoded groups are printed
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum OutputType {
    /// Undecoded blocks, one group per line
    ///
    /// Blocks are printed as four hex digits. Missing blocks
    /// are printed as `----`.
    Hex,

    /// One JSON object per group, with decoded station data
    #[default]
    Json,
}

/// Per-channel output options
///
/// Shared by the [`Channel`] and the
/// [`Station`](crate::Station) that it drives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOptions {
    output_type: OutputType,
    timestamp: bool,
    time_format: String,
    bler: bool,
    channel_index: u32,
}

impl ChannelOptions {
    /// Output format
    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// True if groups are printed with their receive time
    pub fn timestamp(&self) -> bool {
        self.timestamp
    }

    /// chrono `strftime` format for receive times
    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// True if groups are annotated with the block error rate
    pub fn bler(&self) -> bool {
        self.bler
    }

    /// Which channel of a multi-channel input this is
    pub fn channel_index(&self) -> u32 {
        self.channel_index
    }
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            output_type: OutputType::default(),
            timestamp: false,
            time_format: DEFAULT_TIME_FORMAT.to_owned(),
            bler: false,
            channel_index: 0,
        }
    }
}

/// Builds an RDS receive [`Channel`]
///
/// The defaults print interpreted JSON with no receive
/// times and no error rates.
///
/// ```
/// use rdsrx::{ChannelBuilder, OutputType};
///
/// let mut out: Vec<u8> = vec![];
/// let mut channel = ChannelBuilder::new()
///     .with_output_type(OutputType::Hex)
///     .build(&mut out);
///
/// channel.process_group("6201 0408 2037 2020".parse().unwrap()).unwrap();
/// drop(channel);
/// assert_eq!("6201 0408 2037 2020\n", String::from_utf8(out).unwrap());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelBuilder {
    options: ChannelOptions,
    pi: Option<u16>,
}

impl ChannelBuilder {
    /// New channel with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a channel which writes to `output`
    ///
    /// The channel samples the system clock for receive times.
    pub fn build<W>(&self, output: W) -> Channel<W, SystemClock>
    where
        W: Write,
    {
        self.build_with_clock(output, SystemClock)
    }

    /// Build a channel which writes to `output` and reads time from `clock`
    pub fn build_with_clock<W, C>(&self, output: W, clock: C) -> Channel<W, C>
    where
        W: Write,
        C: Clock,
    {
        Channel::new(self.options.clone(), self.pi, output, clock)
    }

    /// Output format
    pub fn with_output_type(&mut self, output_type: OutputType) -> &mut Self {
        self.options.output_type = output_type;
        self
    }

    /// Stamp and print receive times
    ///
    /// Times are printed in UTC with the given chrono
    /// `strftime` format. See [`DEFAULT_TIME_FORMAT`].
    pub fn with_timestamp(&mut self, enable: bool, time_format: &str) -> &mut Self {
        self.options.timestamp = enable;
        self.options.time_format = time_format.to_owned();
        self
    }

    /// Annotate groups with the average block error rate
    pub fn with_bler(&mut self, enable: bool) -> &mut Self {
        self.options.bler = enable;
        self
    }

    /// Channel number, for multi-channel inputs
    pub fn with_channel_index(&mut self, index: u32) -> &mut Self {
        self.options.channel_index = index;
        self
    }

    /// Start with a known PI code
    ///
    /// The code is treated as already confirmed. A different
    /// code must still be received twice to replace it.
    pub fn with_pi(&mut self, pi: u16) -> &mut Self {
        self.pi = Some(pi);
        self
    }

    /// Options for the channel
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::str::FromStr;

    use strum::IntoEnumIterator;

    #[test]
    fn test_output_type_names() {
        for ot in OutputType::iter() {
            assert_eq!(ot, OutputType::from_str(&ot.to_string()).unwrap());
        }
        assert_eq!(OutputType::Hex, OutputType::from_str("hex").unwrap());
        assert!(OutputType::from_str("xml").is_err());
    }

    #[test]
    fn test_builder() {
        let mut builder = ChannelBuilder::new();
        builder
            .with_output_type(OutputType::Hex)
            .with_timestamp(true, "%s")
            .with_bler(true)
            .with_channel_index(2)
            .with_pi(0x6201);

        let opts = builder.options();
        assert_eq!(OutputType::Hex, opts.output_type());
        assert!(opts.timestamp());
        assert_eq!("%s", opts.time_format());
        assert!(opts.bler());
        assert_eq!(2, opts.channel_index());

        let channel = builder.build(Vec::<u8>::new());
        assert_eq!(Some(0x6201), channel.pi());
        assert_eq!(2, channel.channel_index());
    }
}
