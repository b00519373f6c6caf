use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::dispatch::DispatchStrategy;
use crate::runner::{ChannelInfo, ChannelProcessor, ChannelResult, DispatchMode};

/// Sending half of a run interrupt
#[derive(Debug)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

impl InterruptHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observed by the coordinator; once triggered no further channels are attempted
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    pub fn pair() -> (InterruptHandle, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptHandle { tx }, Interrupt { rx })
    }

    /// An interrupt that never fires
    pub fn never() -> Interrupt {
        Self::pair().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the interrupt fires; pends forever if its handle is dropped first
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// The knobs a batch run was started with, recorded in its summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub max_videos: Option<usize>,
    pub dispatch_mode: DispatchMode,
    pub strategy: DispatchStrategy,
    /// Where the channel ids came from, e.g. `file:channels.txt`
    pub channel_source: String,
}

impl RunSettings {
    pub fn new(max_videos: Option<usize>, dispatch_mode: DispatchMode, channel_source: impl Into<String>) -> Self {
        Self {
            max_videos,
            dispatch_mode,
            strategy: DispatchStrategy::Direct,
            channel_source: channel_source.into(),
        }
    }

    pub fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel_info: ChannelInfo,
    pub video_count: usize,
    pub srt_request_count: usize,
    pub srt_success_count: usize,
    pub srt_failure_count: usize,
    pub failed_video_ids: Vec<String>,
}

impl From<&ChannelResult> for ChannelSummary {
    fn from(result: &ChannelResult) -> Self {
        Self {
            channel_info: result.channel_info.clone(),
            video_count: result.videos.len(),
            srt_request_count: result.srt_results.len(),
            srt_success_count: result.success_count(),
            srt_failure_count: result.failure_count(),
            failed_video_ids: result.failed_video_ids(),
        }
    }
}

/// What a batch run achieved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub channels_found: usize,
    pub channels_processed: usize,
    pub channels_failed: Vec<String>,
    pub interrupted: bool,
    pub settings: RunSettings,
    pub channels: Vec<ChannelSummary>,
    pub total_videos: usize,
    pub total_srt_requests: usize,
}

impl RunSummary {
    pub fn build(
        settings: &RunSettings,
        channels_found: usize,
        results: &[ChannelResult],
        channels_failed: Vec<String>,
        elapsed_seconds: f64,
        interrupted: bool,
    ) -> Self {
        let channels: Vec<ChannelSummary> = results.iter().map(ChannelSummary::from).collect();

        Self {
            timestamp: Utc::now(),
            elapsed_seconds,
            channels_found,
            channels_processed: results.len(),
            channels_failed,
            interrupted,
            settings: settings.clone(),
            total_videos: channels.iter().map(|c| c.video_count).sum(),
            total_srt_requests: channels.iter().map(|c| c.srt_request_count).sum(),
            channels,
        }
    }

    /// Whether anything worth persisting happened
    pub fn has_activity(&self) -> bool {
        self.channels_processed > 0 || !self.channels_failed.is_empty()
    }
}

/// Everything a batch run produced
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub results: Vec<ChannelResult>,
}

enum ChannelStep {
    Done(Option<ChannelResult>),
    Failed(anyhow::Error),
    Interrupted,
}

/// Runs channels one after another, isolating failures
pub struct Coordinator<P> {
    processor: P,
    channel_delay: Duration,
    interrupt: Interrupt,
}

impl<P: ChannelProcessor> Coordinator<P> {
    pub fn new(processor: P) -> Self {
        Self {
            processor,
            channel_delay: Duration::from_secs(5),
            interrupt: Interrupt::never(),
        }
    }

    pub fn with_channel_delay(mut self, delay: Duration) -> Self {
        self.channel_delay = delay;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub async fn run_all(&self, channel_ids: &[String], settings: &RunSettings) -> RunSummary {
        self.run(channel_ids, settings).await.summary
    }

    /// Process every channel in order and keep the per-channel results
    pub async fn run(&self, channel_ids: &[String], settings: &RunSettings) -> RunReport {
        let started = Instant::now();
        let total = channel_ids.len();
        let mut interrupt = self.interrupt.clone();
        let mut results = Vec::new();
        let mut failed = Vec::new();
        let mut interrupted = false;

        tracing::info!(
            "Starting batch of {} channels (max videos: {}, srt mode: {}, strategy: {})",
            total,
            settings.max_videos.map_or_else(|| "all".to_string(), |n| n.to_string()),
            settings.dispatch_mode,
            settings.strategy
        );

        for (i, channel_id) in channel_ids.iter().enumerate() {
            if interrupt.is_triggered() {
                interrupted = true;
                break;
            }

            tracing::info!("Processing channel {}/{}: {}", i + 1, total, channel_id);

            let step = tokio::select! {
                biased;
                _ = interrupt.triggered() => ChannelStep::Interrupted,
                outcome = self.processor.process_channel(channel_id, settings.max_videos, settings.dispatch_mode) => {
                    match outcome {
                        Ok(result) => ChannelStep::Done(result),
                        Err(e) => ChannelStep::Failed(e),
                    }
                }
            };

            match step {
                ChannelStep::Done(Some(result)) => {
                    tracing::info!("Channel {} processed", channel_id);
                    results.push(result);
                }
                ChannelStep::Done(None) => {
                    tracing::warn!("Channel {} failed: no videos fetched", channel_id);
                    failed.push(channel_id.clone());
                }
                ChannelStep::Failed(e) => {
                    tracing::warn!("Channel {} failed: {:#}", channel_id, e);
                    failed.push(channel_id.clone());
                }
                ChannelStep::Interrupted => {
                    tracing::warn!("Interrupted while processing {}; {} channels completed", channel_id, results.len());
                    interrupted = true;
                    break;
                }
            }

            if i + 1 < total && !self.channel_delay.is_zero() {
                tracing::info!("Waiting {:?} before the next channel", self.channel_delay);
                tokio::select! {
                    biased;
                    _ = interrupt.triggered() => {
                        tracing::warn!("Interrupted; {} channels completed", results.len());
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.channel_delay) => {}
                }
            }
        }

        let summary = RunSummary::build(
            settings,
            total,
            &results,
            failed,
            started.elapsed().as_secs_f64(),
            interrupted,
        );

        tracing::info!(
            "Batch finished: {}/{} channels processed, {} failed, {} videos, {} SRT requests",
            summary.channels_processed,
            summary.channels_found,
            summary.channels_failed.len(),
            summary.total_videos,
            summary.total_srt_requests
        );

        RunReport { summary, results }
    }
}
