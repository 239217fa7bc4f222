//! Tristream Recorder
//!
//! Captures depth, infrared and color streams into preallocated RAM for a
//! fixed duration, then dumps every frame to disk.

mod app;
mod estimate;

use clap::Parser;
use std::path::PathBuf;

/// Tristream - record synchronized depth, infrared and color streams
#[derive(Parser, Debug)]
#[command(name = "tristream")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory session dumps are created under
    #[arg(short = 's', long, default_value = "dump/")]
    dump_path: PathBuf,

    /// Seconds to capture
    #[arg(short = 'n', long, default_value_t = tristream_capture::DEFAULT_SECONDS_TO_CAPTURE)]
    num_sec: u32,

    /// Capture into RAM only and write nothing
    #[arg(short, long)]
    dry_run: bool,

    /// Debug logging, one line per written file
    #[arg(short, long)]
    verbose: bool,

    /// Dump without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Color frame rate of the simulated sensor (15 or 30)
    #[arg(long, default_value_t = 30, value_parser = parse_color_fps)]
    color_fps: u32,
}

fn parse_color_fps(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(fps @ (15 | 30)) => Ok(fps),
        _ => Err(format!("color fps must be 15 or 30, got {value}")),
    }
}

fn main() {
    let args = Args::parse();

    let recorder = app::Recorder::new()
        .with_dump_path(args.dump_path)
        .with_seconds(args.num_sec)
        .with_color_fps(args.color_fps)
        .with_dry_run(args.dry_run)
        .with_assume_yes(args.yes)
        .with_verbose(args.verbose);

    if let Err(e) = recorder.run() {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["tristream"]).unwrap();
        assert_eq!(args.dump_path, PathBuf::from("dump/"));
        assert_eq!(args.num_sec, 60);
        assert_eq!(args.color_fps, 30);
        assert!(!args.dry_run && !args.verbose && !args.yes);
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from(["tristream", "-s", "out", "-n", "5", "-d", "-v", "-y"])
            .unwrap();
        assert_eq!(args.dump_path, PathBuf::from("out"));
        assert_eq!(args.num_sec, 5);
        assert!(args.dry_run && args.verbose && args.yes);
    }

    #[test]
    fn test_color_fps_is_validated() {
        assert!(Args::try_parse_from(["tristream", "--color-fps", "15"]).is_ok());
        assert!(Args::try_parse_from(["tristream", "--color-fps", "24"]).is_err());
    }
}
