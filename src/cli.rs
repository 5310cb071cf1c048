use clap::Parser;
use std::path::PathBuf;

/// Slideshow cache runner: plays through files like a slideshow would,
/// warming neighbors and loading each slide through the cache.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Files in slideshow order
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Decode width hint (viewport width in pixels)
    #[arg(short = 'w', long = "width", value_name = "PX")]
    pub width: Option<u32>,

    /// Number of passes over the sequence (second pass shows cache hits)
    #[arg(short = 'p', long = "passes", value_name = "N", default_value_t = 1)]
    pub passes: usize,

    /// Override decoded stills kept in memory
    #[arg(long = "still-bound", value_name = "N")]
    pub still_bound: Option<usize>,

    /// Override animated images kept in memory
    #[arg(long = "animated-bound", value_name = "N")]
    pub animated_bound: Option<usize>,

    /// Decode worker threads (default: 3/4 of CPUs)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Disable neighbor preloading
    #[arg(long = "no-preload")]
    pub no_preload: bool,

    /// Frames to pull from each animation
    #[arg(long = "frames", value_name = "N", default_value_t = 3)]
    pub frames: usize,

    /// Enable logging to file (default: slidecache.log in the data dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
