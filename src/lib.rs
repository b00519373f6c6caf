//! SRT Harvester - enumerate YouTube channel uploads and request SRT captions in bulk
//!
//! The library walks a channel's uploads playlist page by page, then drives one caption
//! request per discovered video against a captioning webhook. Failures are isolated per
//! video and per channel and folded into a run summary.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod output;
pub mod runner;
pub mod utils;

pub use catalog::{CatalogApi, CatalogEnumerator, VideoRecord};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use coordinator::{Coordinator, Interrupt, InterruptHandle, RunSettings, RunSummary};
pub use dispatch::{CaptionDispatcher, DispatchOutcome, DispatchStrategy, FailureReason, SrtDispatcher};
pub use runner::{ChannelInfo, ChannelProcessor, ChannelResult, ChannelRunner, DispatchMode, SrtRequestResult};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the harvester
#[derive(thiserror::Error, Debug)]
pub enum HarvesterError {
    #[error("YouTube API quota exceeded or access forbidden: {0}")]
    QuotaExceeded(String),

    #[error("Catalog request failed with HTTP {status}: {body}")]
    CatalogHttp { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Invalid channel list: {0}")]
    ChannelList(String),
}
