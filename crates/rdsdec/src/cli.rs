use std::fmt::Display;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};

use rdsrx::{is_valid_time_format, OutputType, DEFAULT_TIME_FORMAT};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts demodulated RDS data, either as ASCII bits ("0" and "1") or as hex groups, and prints each received group as JSON or as hex.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts demodulated RDS data, either as ASCII bits ("0" and "1") or as hex groups, and prints each received group as JSON or as hex.

With --input bits, all characters other than "0" and "1" are ignored. The decoder synchronizes to the RDS block structure and assembles groups on its own.

With --input hex, each line holds one group of four blocks, with "----" for a missing block:

    6201 0408 2037 2020
    6201 ---- 2037 2020

Hex output uses the same format, so a recording can be decoded once and replayed later:

    rdsdec --output hex < bits.txt > groups.txt
    rdsdec --input hex < groups.txt

A new PI code must be received twice in a row before the decoder accepts it and discards the previous station's data.
"#;

const ADVANCED: &str = "Advanced Options";

/// Input data format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// ASCII "0" and "1" characters
    Bits,
    /// One group per line, as four hex blocks
    Hex,
}

/// Output data format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One group per line, as four hex blocks
    Hex,
    /// One JSON object per group
    Json,
}

impl From<OutputFormat> for OutputType {
    fn from(fmt: OutputFormat) -> Self {
        match fmt {
            OutputFormat::Hex => OutputType::Hex,
            OutputFormat::Json => OutputType::Json,
        }
    }
}

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log messages
    #[arg(short, long)]
    pub quiet: bool,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InputFormat::Bits)]
    pub input: InputFormat,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Input file (or "-" for stdin)
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// Print the receive time of each group
    #[arg(short, long)]
    pub timestamp: bool,

    /// Receive time format (chrono strftime, UTC)
    #[arg(long, default_value_t = DEFAULT_TIME_FORMAT.to_string())]
    #[arg(value_parser = parse_time_format)]
    pub time_format: String,

    /// Print the average block error rate (percent)
    #[arg(short = 'E', long)]
    pub bler: bool,

    /// Channel number to report, for multi-channel sources
    #[arg(long, default_value_t = 0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub channel: u32,

    /// Assume this PI code (hex) is already confirmed
    #[arg(long, value_parser = parse_pi)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub pi: Option<u16>,

    /// Forget the PI code after losing sync for this long (s)
    #[arg(long, default_value_t = 10.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub carrier_timeout: f32,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }
}

fn parse_time_format(s: &str) -> Result<String, String> {
    if is_valid_time_format(s) {
        Ok(s.to_owned())
    } else {
        Err(format!("\"{}\" is not a valid strftime format", s))
    }
}

fn parse_pi(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|_| format!("\"{}\" is not a hex PI code", s))
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "rdsdec", "-i", "hex", "-o", "hex", "-t", "-E", "--pi", "0x6201",
        ])
        .expect("bad args");
        assert_eq!(InputFormat::Hex, args.input);
        assert_eq!(OutputType::Hex, OutputType::from(args.output));
        assert!(args.timestamp);
        assert!(args.bler);
        assert_eq!(Some(0x6201), args.pi);
        assert!(args.input_is_stdin());
        assert_eq!(DEFAULT_TIME_FORMAT, args.time_format);

        let args = Args::try_parse_from(["rdsdec"]).expect("bad args");
        assert_eq!(InputFormat::Bits, args.input);
        assert_eq!(OutputFormat::Json, args.output);
        assert_eq!(None, args.pi);

        assert!(Args::try_parse_from(["rdsdec", "--time-format", "%Q"]).is_err());
        assert!(Args::try_parse_from(["rdsdec", "--pi", "xyz"]).is_err());
    }

    #[test]
    fn test_parse_pi() {
        assert_eq!(Ok(0x6201), parse_pi("6201"));
        assert_eq!(Ok(0xabcd), parse_pi("0XABCD"));
        assert!(parse_pi("12345").is_err());
    }
}
