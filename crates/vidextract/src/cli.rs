use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrEngineChoice {
    /// Use tesseract when available, fall back to the mock engine.
    Auto,
    Tesseract,
    Mock,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CodecPolicy {
    /// Remux without re-encoding (fast, keyframe-aligned cuts).
    Copy,
    /// Re-encode for frame-accurate cuts.
    Reencode,
}

/// Tracks which values actually came from the command line, so the config
/// file can fill in everything the user left at its default.
#[derive(Debug, Default)]
pub struct CliSources {
    pub ocr_engine_from_cli: bool,
    pub codec_from_cli: bool,
    pub confidence_floor_from_cli: bool,
    pub tolerance_frames_from_cli: bool,
    pub batch_pad_secs_from_cli: bool,
    pub batch_output_name_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            ocr_engine_from_cli: value_from_cli(matches, "ocr_engine"),
            codec_from_cli: value_from_cli(matches, "codec"),
            confidence_floor_from_cli: value_from_cli(matches, "confidence_floor"),
            tolerance_frames_from_cli: value_from_cli(matches, "tolerance_frames"),
            batch_pad_secs_from_cli: value_from_cli(matches, "batch_pad_secs"),
            batch_output_name_from_cli: value_from_cli(matches, "batch_output_name"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

#[derive(Debug, Parser)]
#[command(
    name = "vidextract",
    about = "Locate a frame range by its burned-in overlay timestamps and extract it",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Overlay timestamp of the first frame to keep
    #[arg(long = "start", value_name = "TIMESTAMP")]
    pub start: Option<String>,

    /// Overlay timestamp of the last frame to keep
    #[arg(long = "end", value_name = "TIMESTAMP")]
    pub end: Option<String>,

    /// Output path for the extracted clip
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Timestamp grammar to use instead of trying each in priority order
    #[arg(long = "format", value_name = "GRAMMAR")]
    pub format: Option<String>,

    /// Overlay region: top-right:300x50, px:X,Y,W,H or frac:X,Y,W,H
    #[arg(long = "region", value_name = "SPEC")]
    pub region: Option<String>,

    /// Preferred OCR engine
    #[arg(long = "ocr-engine", value_enum, default_value_t = OcrEngineChoice::Auto)]
    pub ocr_engine: OcrEngineChoice,

    /// Path to the tesseract executable
    #[arg(long = "tesseract-cmd", value_name = "PATH")]
    pub tesseract_cmd: Option<PathBuf>,

    /// Recognitions below this confidence are treated as unreadable (0.0-1.0)
    #[arg(long = "confidence-floor", default_value_t = 0.6)]
    pub confidence_floor: f32,

    /// Search window width handed to the dense resolve pass
    #[arg(
        long = "tolerance-frames",
        default_value_t = 4,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub tolerance_frames: u64,

    /// How the extracted range is written
    #[arg(long = "codec", value_enum, default_value_t = CodecPolicy::Copy)]
    pub codec: CodecPolicy,

    /// Lock decoding to a specific backend implementation
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Print the list of available decoding backends
    #[arg(long = "list-backends")]
    pub list_backends: bool,

    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Process every rangetime.txt under this directory instead of --start/--end
    #[arg(long = "batch", value_name = "DIR")]
    pub batch: Option<PathBuf>,

    /// Seconds of padding applied around each batch interval
    #[arg(long = "batch-pad-secs", default_value_t = 60.0)]
    pub batch_pad_secs: f64,

    /// File name for clips written next to each range file
    #[arg(long = "batch-output-name", default_value = "snippet.mkv")]
    pub batch_output_name: String,

    /// Input video path
    pub input: Option<PathBuf>,
}
