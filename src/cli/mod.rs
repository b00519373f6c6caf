use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::dispatch::DispatchStrategy;
use crate::runner::DispatchMode;

#[derive(Parser)]
#[command(
    name = "harvester",
    about = "SRT Harvester - list every upload of YouTube channels and request SRT captions for them",
    version,
    long_about = "Walks the uploads playlist of one or many YouTube channels through the YouTube Data API and sends one caption request per video to the SRT webhook. Failures are isolated per video and per channel and reported in a JSON summary."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one channel's uploads and optionally request SRT captions
    Channel {
        /// YouTube channel id (usually UC followed by 22 characters)
        #[arg(value_name = "CHANNEL_ID")]
        channel_id: String,

        #[command(flatten)]
        options: BatchOptions,
    },

    /// Process many channels one after another
    Batch {
        /// Channel id to process (repeatable)
        #[arg(long = "channel", value_name = "CHANNEL_ID")]
        channels: Vec<String>,

        /// Text/CSV file with one channel id per line (first column)
        #[arg(long, value_name = "FILE")]
        channels_file: Option<PathBuf>,

        #[command(flatten)]
        options: BatchOptions,
    },

    /// Send a caption request for a single video
    Srt {
        /// YouTube video id
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,

        /// Only check for cached captions, never trigger generation
        #[arg(long, conflicts_with = "strategy")]
        fetch_only: bool,

        /// Request strategy (defaults to the configured one)
        #[arg(long, value_enum)]
        strategy: Option<DispatchStrategy>,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Options shared by the channel and batch commands
#[derive(Args, Debug, Clone)]
pub struct BatchOptions {
    /// Only fetch the N most recent videos (all videos when omitted)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_videos: Option<u64>,

    /// Which videos get an SRT request: none, all, or a number of most recent videos
    #[arg(long = "srt", value_name = "MODE", default_value = "none")]
    pub dispatch_mode: DispatchMode,

    /// Request strategy (defaults to the configured one)
    #[arg(long, value_enum)]
    pub strategy: Option<DispatchStrategy>,

    /// Directory for exports and the run summary
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not write per-channel video lists and SRT results
    #[arg(long)]
    pub no_export: bool,
}

impl BatchOptions {
    pub fn max_videos(&self) -> Option<usize> {
        self.max_videos.map(|n| n as usize)
    }
}
