// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line front end for the pcodec pipeline:
//!
//! ```text
//! pcodec <in|-> <out|-> encode|decode <stage> [opt[=val]...] [# encode|decode <stage> [opt[=val]...]]*
//! ```
//!
//! Argument parsing, usage text, and humanized timing/size output live here, outside the core
//! crate; everything that actually moves bits lives in `pcodec_core`.

use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info};

use pcodec_core::errors::{Error, ErrorKind, Result};
use pcodec_core::io::{BitBuffer, FileHandle, FileMemoryBuffer, Mode};
use pcodec_core::{registry, Direction, Pipeline, StageInvocation, StageOptions};

const FILE_BUFFER_CAPACITY: usize = 64 * 1024;
const MAX_STAGES: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "pcodec", version, about = "Pipelined bit-granular compression toolkit", after_help = registry_help())]
struct Cli {
    /// Raise the log level: -v for info, -vv for debug (overridden by RUST_LOG).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// `<in|-> <out|-> encode|decode <stage> [opt[=val]...] [# encode|decode <stage> [opt[=val]...]]*`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn registry_help() -> String {
    let mut text = String::from("Stages:\n");
    for desc in registry::list() {
        text.push_str(&format!("  {:<10} {}\n", desc.name, desc.description));
        for opt in desc.options {
            text.push_str(&format!("      {}\n", opt.name));
        }
    }
    text
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(default_level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder.init();
}

fn parse_direction(token: &str) -> Result<Direction> {
    match token {
        "encode" => Ok(Direction::Encode),
        "decode" => Ok(Direction::Decode),
        other => Err(Error::new(ErrorKind::InvalidFormat, format!("expected `encode` or `decode`, found `{}`", other))),
    }
}

/// Parses the trailing `encode|decode <stage> [opt[=val]...] [# ...]*` grammar into configured
/// stage invocations, validating each option against the stage's own table as it goes.
fn parse_stages(tokens: &[String]) -> Result<Vec<StageInvocation>> {
    let mut stages = Vec::new();
    let mut rest = tokens;

    loop {
        if stages.len() >= MAX_STAGES {
            return Err(Error::new(ErrorKind::InvalidFormat, format!("pipeline exceeds the maximum of {} chained stages", MAX_STAGES)));
        }

        let (direction_tok, after_direction) = rest
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::InvalidFormat, "expected `encode` or `decode`, found end of arguments"))?;
        let direction = parse_direction(direction_tok)?;

        let (stage_name, after_name) = after_direction
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::InvalidFormat, "expected a stage name after `encode`/`decode`"))?;
        let desc = registry::lookup(stage_name)?;

        let mut options = StageOptions::default();
        let mut cursor = 0;
        while cursor < after_name.len() && after_name[cursor] != "#" {
            let token = &after_name[cursor];
            let (name, value) = match token.split_once('=') {
                Some((n, v)) => (n, Some(v)),
                None => (token.as_str(), None),
            };
            pcodec_core::stage::options::apply_option(desc.options, &mut options, name, value)?;
            cursor += 1;
        }

        stages.push(StageInvocation::new(desc.name, direction, options));

        if cursor == after_name.len() {
            rest = &[];
            break;
        }
        rest = &after_name[cursor + 1..];
        if rest.is_empty() {
            return Err(Error::new(ErrorKind::InvalidFormat, "expected another stage invocation after `#`"));
        }
    }

    if stages.is_empty() {
        return Err(Error::new(ErrorKind::InvalidFormat, "no stages specified"));
    }
    Ok(stages)
}

fn open_input(path: &str) -> Result<BitBuffer> {
    let fmb = if path == "-" {
        FileMemoryBuffer::init_file(FileHandle::Stdin(io::stdin()), Mode::Reading, FILE_BUFFER_CAPACITY)?
    } else {
        let file = File::open(path)?;
        FileMemoryBuffer::init_file(FileHandle::File(file), Mode::Reading, FILE_BUFFER_CAPACITY)?
    };
    Ok(BitBuffer::init(fmb))
}

fn open_output(path: &str) -> Result<BitBuffer> {
    // `-` selects stdout unconditionally and skips opening a file, unlike the fallthrough this
    // toolkit is deliberately not reproducing.
    let fmb = if path == "-" {
        FileMemoryBuffer::init_file(FileHandle::Stdout(io::stdout()), Mode::Writing, FILE_BUFFER_CAPACITY)?
    } else {
        let file = File::create(path)?;
        FileMemoryBuffer::init_file(FileHandle::File(file), Mode::Writing, FILE_BUFFER_CAPACITY)?
    };
    Ok(BitBuffer::init(fmb))
}

fn humanize_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", n, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.args.len() < 2 {
        return Err(Error::new(ErrorKind::InvalidFormat, "expected <in> <out> followed by a pipeline"));
    }
    let in_path = &cli.args[0];
    let out_path = &cli.args[1];
    let stages = parse_stages(&cli.args[2..])?;

    info!("running {} stage(s): {} -> {}", stages.len(), in_path, out_path);

    let mut input = open_input(in_path)?;
    let mut output = open_output(out_path)?;

    let pipeline = Pipeline::new(stages);
    pipeline.run(&mut input, &mut output).map_err(|e| Error::wrap(ErrorKind::LibraryCall, "pipeline execution failed", e))
}

/// File sizes for the human-readable summary, queried after the run closes both handles (`-`
/// reports 0 since stdio isn't a sized file).
fn byte_counts(in_path: &str, out_path: &str) -> (u64, u64) {
    let size_of = |path: &str| if path == "-" { 0 } else { std::fs::metadata(path).map(|m| m.len()).unwrap_or(0) };
    (size_of(in_path), size_of(out_path))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let start = Instant::now();
    match run(&cli) {
        Ok(()) => {
            let elapsed = start.elapsed();
            if cli.args.len() >= 2 {
                let (in_bytes, out_bytes) = byte_counts(&cli.args[0], &cli.args[1]);
                info!("done in {:.3}s: {} in, {} out", elapsed.as_secs_f64(), humanize_bytes(in_bytes), humanize_bytes(out_bytes));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::from(err.exit_code().unsigned_abs() as u8)
        }
    }
}
