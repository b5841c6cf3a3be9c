//! Input processing
//!
//! Reads the input to exhaustion and feeds it to the
//! [`Channel`]:
//!
//! * **bits**: every chunk read from the input becomes one
//!   [`BitBuffer`], stamped with the time it was read. Groups
//!   are back-dated from there.
//!
//! * **hex**: every line is parsed as one [`Group`] and stamped
//!   with the time it was read. Bad lines are skipped.
//!
//! When block sync has been lost for longer than the
//! `--carrier-timeout`, the PI code is forgotten so that the
//! next station is acquired cleanly.

use std::io::{BufRead, Write};

use anyhow::Context;
use log::{info, warn};

use rdsrx::{BitBuffer, Channel, Clock, Group};

use crate::cli::{Args, InputFormat};

/// Run the decoder until `input` is exhausted
///
/// The channel is flushed at the end of input.
pub fn run<W, C, R>(args: &Args, channel: &mut Channel<W, C>, input: &mut R) -> anyhow::Result<()>
where
    W: Write,
    C: Clock,
    R: BufRead + ?Sized,
{
    match args.input {
        InputFormat::Bits => run_bits(args, channel, input)?,
        InputFormat::Hex => run_hex(channel, input)?,
    }

    channel.flush().context("unable to write output")?;
    Ok(())
}

fn run_bits<W, C, R>(args: &Args, channel: &mut Channel<W, C>, input: &mut R) -> anyhow::Result<()>
where
    W: Write,
    C: Clock,
    R: BufRead + ?Sized,
{
    loop {
        let chunk = input.fill_buf().context("unable to read input")?;
        if chunk.is_empty() {
            return Ok(());
        }

        let bits: Vec<bool> = chunk.iter().filter_map(|ch| ascii_bit(*ch)).collect();
        let consumed = chunk.len();
        input.consume(consumed);

        if bits.is_empty() {
            continue;
        }

        let captured = channel.now();
        channel
            .process_buffer(&BitBuffer::new(bits, captured))
            .context("unable to write output")?;
        check_carrier(args, channel);
    }
}

fn run_hex<W, C, R>(channel: &mut Channel<W, C>, input: &mut R) -> anyhow::Result<()>
where
    W: Write,
    C: Clock,
    R: BufRead + ?Sized,
{
    for (lineno, line) in input.lines().enumerate() {
        let line = line.context("unable to read input")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.parse::<Group>() {
            Ok(group) => channel
                .process_group(group)
                .context("unable to write output")?,
            Err(err) => warn!("input line {}: {}", lineno + 1, err),
        }
    }
    Ok(())
}

// Forget the station once the carrier has been gone for a while
fn check_carrier<W, C>(args: &Args, channel: &mut Channel<W, C>)
where
    W: Write,
    C: Clock,
{
    let lost_secs = channel.seconds_since_carrier_lost();
    if channel.pi().is_some() && lost_secs > args.carrier_timeout {
        info!(
            "no block sync for {:.1} s; waiting for a new PI code",
            lost_secs
        );
        channel.reset_pi();
    }
}

fn ascii_bit(ch: u8) -> Option<bool> {
    match ch {
        b'0' => Some(false),
        b'1' => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use rdsrx::{ChannelBuilder, ManualClock, OutputType};

    // 0A group "6201 0408 2037 2020" as ASCII bits
    fn group_bits() -> String {
        const BLOCKS: [u32; 4] = [
            (0x6201 << 10) | 0x1b5,
            (0x0408 << 10) | 0x1eb,
            (0x2037 << 10) | 0x229,
            (0x2020 << 10) | 0x0dc,
        ];
        let mut out = String::new();
        for block in BLOCKS {
            for bit in (0..26).rev() {
                out.push(if block & (1 << bit) != 0 { '1' } else { '0' });
            }
            out.push('\n');
        }
        out
    }

    fn run_with(argv: &[&str], input: &str) -> Vec<String> {
        let args = Args::try_parse_from(argv).expect("bad args");
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let mut builder = ChannelBuilder::new();
        builder
            .with_output_type(OutputType::from(args.output))
            .with_timestamp(args.timestamp, &args.time_format);
        if let Some(pi) = args.pi {
            builder.with_pi(pi);
        }

        let mut out: Vec<u8> = vec![];
        let mut channel = builder.build_with_clock(&mut out, &clock);
        run(&args, &mut channel, &mut input.as_bytes()).expect("run failed");
        drop(channel);

        String::from_utf8(out)
            .expect("not utf-8")
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_hex_replay() {
        let input = "# comment\n6201 0408 2037 2020\n\nnot a group\n6201 ---- 2037 2020\n";
        assert_eq!(
            vec!["6201 0408 2037 2020", "6201 ---- 2037 2020"],
            run_with(&["rdsdec", "-i", "hex", "-o", "hex"], input)
        );
    }

    #[test]
    fn test_bits() {
        let input = group_bits().repeat(3);
        assert_eq!(
            vec![
                "---- 0408 2037 2020",
                "6201 0408 2037 2020",
                "6201 0408 2037 2020",
            ],
            run_with(&["rdsdec", "-o", "hex"], &input)
        );
    }

    #[test]
    fn test_bits_capture_time() {
        // one read of 312 bits, captured at 12:00:00. The first
        // group ends 208 bits (175 ms) before that.
        let input = group_bits().repeat(3);
        let out = run_with(&["rdsdec", "-o", "hex", "-t", "--time-format", "%s"], &input);
        assert_eq!(
            vec![
                "---- 0408 2037 2020 1709294399",
                "6201 0408 2037 2020 1709294399",
                "6201 0408 2037 2020 1709294400",
            ],
            out
        );
    }

    #[test]
    fn test_bits_json() {
        let input = group_bits().repeat(2);
        let out = run_with(&["rdsdec", "--pi", "6201"], &input);
        assert_eq!(2, out.len());
        assert_eq!(
            "{\"pi\":\"0x6201\",\"group\":\"0A\",\"tp\":true,\"prog_type\":0}",
            out[1]
        );
    }

    #[test]
    fn test_ascii_bit() {
        assert_eq!(Some(false), ascii_bit(b'0'));
        assert_eq!(Some(true), ascii_bit(b'1'));
        assert_eq!(None, ascii_bit(b'\n'));
    }
}
