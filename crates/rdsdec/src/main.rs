use std::io;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{info, warn, LevelFilter};

use rdsrx::ChannelBuilder;

mod app;
mod cli;

use cli::{Args, CliError, InputFormat};

fn main() {
    match rdsdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn rdsdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // file setup: locks stdin in case we need it
    let stdin = io::stdin();
    let stdin_handle = stdin.lock();
    let mut inbuf = file_setup(&args, stdin_handle)?;

    // create the decoder
    let mut builder = ChannelBuilder::new();
    builder
        .with_output_type(args.output.into())
        .with_timestamp(args.timestamp, &args.time_format)
        .with_bler(args.bler)
        .with_channel_index(args.channel);
    if let Some(pi) = args.pi {
        builder.with_pi(pi);
    }

    let stdout = io::stdout();
    let mut channel = builder.build(stdout.lock());

    app::run(&args, &mut channel, &mut inbuf)?;
    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("rdsrx", log_filter)
            .filter_module("rdsdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn file_setup<'stdin>(
    args: &Args,
    stdin: std::io::StdinLock<'stdin>,
) -> Result<Box<dyn io::BufRead + 'stdin>, anyhow::Error> {
    if args.input_is_stdin() {
        info!("RDS decoder reading standard input");
        if !is_terminal(&std::io::stdin()) {
            Ok(Box::new(io::BufReader::new(stdin)))
        } else if args.input == InputFormat::Hex {
            warn!("reading hex groups from a terminal; end input with Ctrl-D");
            Ok(Box::new(io::BufReader::new(stdin)))
        } else {
            Err(anyhow!(
                "cowardly refusing to read bits from a terminal.

Pipe the output of an RDS demodulator into this program, or use
--input hex to type in groups."
            ))
        }
    } else {
        info!("RDS decoder reading file: \"{}\"", &args.file);
        Ok(Box::new(io::BufReader::new(
            std::fs::File::open(&args.file)
                .with_context(|| format!("Unable to open --file \"{}\"", args.file))?,
        )))
    }
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
