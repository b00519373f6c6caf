use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{CatalogApi, CatalogEnumerator, VideoRecord};
use crate::dispatch::{CaptionDispatcher, DispatchOutcome, DispatchStrategy};
use crate::output::Exporter;
use crate::utils::truncate_title;
use crate::Result;

/// Identity of a channel being processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    /// Placeholder name built from the id; no metadata lookup is made
    pub name: String,
}

impl ChannelInfo {
    pub fn from_id(channel_id: &str) -> Self {
        let prefix: String = channel_id.chars().take(8).collect();
        Self {
            id: channel_id.to_string(),
            name: format!("Channel_{}", prefix),
        }
    }
}

/// How many of a channel's enumerated videos receive a caption request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DispatchMode {
    #[default]
    None,
    All,
    /// Only the first N videos in catalog order, i.e. the N most recent
    Limit(usize),
}

impl DispatchMode {
    /// Number of videos to dispatch out of `available`
    pub fn cap(&self, available: usize) -> usize {
        match self {
            DispatchMode::None => 0,
            DispatchMode::All => available,
            DispatchMode::Limit(n) => (*n).min(available),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "skip" => Ok(DispatchMode::None),
            "all" => Ok(DispatchMode::All),
            "test" => Ok(DispatchMode::Limit(10)),
            "limited" => Ok(DispatchMode::Limit(50)),
            "ask" => Err("interactive mode is not supported; use none, all or a number".to_string()),
            other => match other.parse::<usize>() {
                Ok(0) => Ok(DispatchMode::None),
                Ok(n) => Ok(DispatchMode::Limit(n)),
                Err(_) => Err(format!("invalid dispatch mode '{}': expected none, all or a number", s)),
            },
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::None => write!(f, "none"),
            DispatchMode::All => write!(f, "all"),
            DispatchMode::Limit(n) => write!(f, "{}", n),
        }
    }
}

impl From<DispatchMode> for String {
    fn from(mode: DispatchMode) -> Self {
        mode.to_string()
    }
}

impl TryFrom<String> for DispatchMode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Outcome of the caption request for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrtRequestResult {
    pub channel_id: String,
    pub channel_name: String,
    /// 1-based position in the dispatched batch
    pub sequence_index: usize,
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    pub outcome: DispatchOutcome,
}

/// Everything produced for one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel_info: ChannelInfo,
    pub videos: Vec<VideoRecord>,
    pub srt_results: Vec<SrtRequestResult>,
}

impl ChannelResult {
    pub fn success_count(&self) -> usize {
        self.srt_results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.srt_results.len() - self.success_count()
    }

    pub fn failed_video_ids(&self) -> Vec<String> {
        self.srt_results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| r.video_id.clone())
            .collect()
    }
}

/// Anything that can turn a channel id into a `ChannelResult`.
///
/// `Ok(None)` means the channel produced no videos; `Err` is an unexpected failure. The
/// coordinator records both as failed channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelProcessor: Send + Sync {
    async fn process_channel(
        &self,
        channel_id: &str,
        max_videos: Option<usize>,
        mode: DispatchMode,
    ) -> Result<Option<ChannelResult>>;
}

/// Enumerates one channel and dispatches caption requests for its videos
pub struct ChannelRunner<C, D> {
    enumerator: CatalogEnumerator<C>,
    dispatcher: D,
    strategy: DispatchStrategy,
    request_delay: Duration,
    exporter: Option<Exporter>,
    show_progress: bool,
}

impl<C: CatalogApi, D: CaptionDispatcher> ChannelRunner<C, D> {
    pub fn new(enumerator: CatalogEnumerator<C>, dispatcher: D) -> Self {
        Self {
            enumerator,
            dispatcher,
            strategy: DispatchStrategy::Direct,
            request_delay: Duration::from_secs(1),
            exporter: None,
            show_progress: false,
        }
    }

    pub fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_exporter(mut self, exporter: Exporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    /// Process one channel; `None` when no videos could be fetched
    pub async fn run_channel(
        &self,
        channel_id: &str,
        max_videos: Option<usize>,
        mode: DispatchMode,
    ) -> Option<ChannelResult> {
        let channel_info = ChannelInfo::from_id(channel_id);
        match max_videos {
            Some(max) => tracing::info!("Fetching up to {} recent videos for {} ({})", max, channel_id, channel_info.name),
            None => tracing::info!("Fetching all videos for {} ({})", channel_id, channel_info.name),
        }

        let videos = self.enumerator.enumerate(channel_id, max_videos).await;
        if videos.is_empty() {
            tracing::warn!(
                "No videos fetched for channel {}: wrong id, no public uploads, exhausted quota or network trouble",
                channel_id
            );
            return None;
        }

        if let (Some(newest), Some(oldest)) = (videos.first(), videos.last()) {
            tracing::info!(
                "Fetched {} videos for {} (newest: {}, oldest: {})",
                videos.len(),
                channel_id,
                truncate_title(&newest.title, 50),
                truncate_title(&oldest.title, 50)
            );
        }

        let srt_results = self.dispatch_videos(&channel_info, &videos, mode).await;

        let result = ChannelResult {
            channel_info,
            videos,
            srt_results,
        };

        if let Some(exporter) = &self.exporter {
            match exporter.export_channel(&result) {
                Ok(paths) => {
                    for path in paths {
                        tracing::info!("Saved {}", path.display());
                    }
                }
                Err(e) => tracing::error!("Failed to export channel {}: {:#}", result.channel_info.id, e),
            }
        }

        Some(result)
    }

    async fn dispatch_videos(
        &self,
        channel_info: &ChannelInfo,
        videos: &[VideoRecord],
        mode: DispatchMode,
    ) -> Vec<SrtRequestResult> {
        let count = mode.cap(videos.len());
        if count == 0 {
            tracing::info!("Skipping SRT requests for {}", channel_info.name);
            return Vec::new();
        }

        tracing::info!(
            "Requesting SRT for {} of {} videos of {} (strategy: {}, delay: {:?})",
            count,
            videos.len(),
            channel_info.name,
            self.strategy,
            self.request_delay
        );

        let progress = self.progress_bar(count);
        let mut results = Vec::with_capacity(count);
        let mut failures = 0usize;

        for (i, video) in videos.iter().take(count).enumerate() {
            let sequence_index = i + 1;
            progress.set_message(truncate_title(&video.title, 40));

            let outcome = self.strategy.run(&self.dispatcher, &video.video_id).await;
            if outcome.is_success() {
                tracing::debug!("[{}/{}] {} {}", sequence_index, count, video.video_id, outcome.describe());
            } else {
                failures += 1;
                tracing::warn!("[{}/{}] SRT request failed for {}: {}", sequence_index, count, video.video_id, outcome.describe());
            }

            results.push(SrtRequestResult {
                channel_id: channel_info.id.clone(),
                channel_name: channel_info.name.clone(),
                sequence_index,
                video_id: video.video_id.clone(),
                title: video.title.clone(),
                published_at: video.published_at.clone(),
                outcome,
            });
            progress.inc(1);

            if sequence_index < count && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        progress.finish_with_message(format!("{} ok, {} failed", count - failures, failures));
        tracing::info!(
            "SRT requests for {} done: {} succeeded, {} failed",
            channel_info.name,
            count - failures,
            failures
        );

        results
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress
    }
}

#[async_trait]
impl<C: CatalogApi, D: CaptionDispatcher> ChannelProcessor for ChannelRunner<C, D> {
    async fn process_channel(
        &self,
        channel_id: &str,
        max_videos: Option<usize>,
        mode: DispatchMode,
    ) -> Result<Option<ChannelResult>> {
        Ok(self.run_channel(channel_id, max_videos, mode).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PlaylistPage;
    use crate::dispatch::{FailureReason, MockCaptionDispatcher};
    use crate::output::ExportFormat;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use serde_json::json;

    const CHANNEL: &str = "UCxxxxxxxxxxxxxxxxxxxxxx";

    /// Single-page catalog
    struct StaticCatalog(Vec<VideoRecord>);

    #[async_trait]
    impl CatalogApi for StaticCatalog {
        async fn uploads_playlist_id(&self, _channel_id: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn playlist_page(&self, _playlist_id: &str, _page_size: u32, _page_token: Option<String>) -> Result<PlaylistPage> {
            Ok(PlaylistPage {
                items: self.0.clone(),
                next_page_token: None,
            })
        }
    }

    fn videos(n: usize) -> Vec<VideoRecord> {
        (1..=n)
            .map(|i| VideoRecord {
                video_id: format!("video{}", i),
                title: format!("Episode {}", n + 1 - i),
                published_at: format!("2024-03-{:02}T12:00:00Z", 20 - i),
            })
            .collect()
    }

    fn ok() -> DispatchOutcome {
        DispatchOutcome::Success { payload: json!({"status": "success"}) }
    }

    fn runner(catalog: Vec<VideoRecord>, dispatcher: MockCaptionDispatcher) -> ChannelRunner<StaticCatalog, MockCaptionDispatcher> {
        let enumerator = CatalogEnumerator::new(StaticCatalog(catalog), 50, Duration::ZERO);
        ChannelRunner::new(enumerator, dispatcher).with_request_delay(Duration::ZERO)
    }

    #[test]
    fn test_channel_info_name_from_id() {
        let info = ChannelInfo::from_id("UCMUnInmOkrWN4gof9KlhNmQ");
        assert_eq!(info.id, "UCMUnInmOkrWN4gof9KlhNmQ");
        assert_eq!(info.name, "Channel_UCMUnInm");
        assert_eq!(ChannelInfo::from_id("UCab").name, "Channel_UCab");
    }

    #[test]
    fn test_dispatch_mode_parsing() {
        assert_eq!("none".parse::<DispatchMode>(), Ok(DispatchMode::None));
        assert_eq!("skip".parse::<DispatchMode>(), Ok(DispatchMode::None));
        assert_eq!("ALL".parse::<DispatchMode>(), Ok(DispatchMode::All));
        assert_eq!("25".parse::<DispatchMode>(), Ok(DispatchMode::Limit(25)));
        assert_eq!("test".parse::<DispatchMode>(), Ok(DispatchMode::Limit(10)));
        assert_eq!("limited".parse::<DispatchMode>(), Ok(DispatchMode::Limit(50)));
        assert_eq!("0".parse::<DispatchMode>(), Ok(DispatchMode::None));
        assert!("ask".parse::<DispatchMode>().is_err());
        assert!("lots".parse::<DispatchMode>().is_err());
    }

    #[test]
    fn test_dispatch_mode_serializes_as_string() {
        assert_eq!(serde_json::to_value(DispatchMode::Limit(10)).unwrap(), json!("10"));
        assert_eq!(serde_json::to_value(DispatchMode::All).unwrap(), json!("all"));
        let parsed: DispatchMode = serde_json::from_value(json!("none")).unwrap();
        assert_eq!(parsed, DispatchMode::None);
    }

    #[test]
    fn test_dispatch_mode_cap() {
        assert_eq!(DispatchMode::None.cap(7), 0);
        assert_eq!(DispatchMode::All.cap(7), 7);
        assert_eq!(DispatchMode::Limit(3).cap(7), 3);
        assert_eq!(DispatchMode::Limit(30).cap(7), 7);
    }

    #[tokio::test]
    async fn test_limit_and_dispatch_all_most_recent() {
        let mut dispatcher = MockCaptionDispatcher::new();
        dispatcher.expect_dispatch().times(2).returning(|_, _| ok());

        let result = runner(videos(3), dispatcher)
            .run_channel(CHANNEL, Some(2), DispatchMode::All)
            .await
            .unwrap();

        assert_eq!(result.videos.len(), 2);
        assert_eq!(result.videos[0].video_id, "video1");
        assert_eq!(result.srt_results.len(), 2);
        assert_eq!(
            result.srt_results.iter().map(|r| r.sequence_index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(result.channel_info.name, "Channel_UCxxxxxx");
        assert!(result.srt_results.iter().all(|r| r.channel_id == CHANNEL));
    }

    #[tokio::test]
    async fn test_http_error_is_recorded_and_batch_continues() {
        let mut dispatcher = MockCaptionDispatcher::new();
        dispatcher
            .expect_dispatch()
            .with(eq("abc123"), eq(false))
            .returning(|_, _| DispatchOutcome::Failure {
                reason: FailureReason::HttpError,
                message: "HTTP 500".to_string(),
                http_status: Some(500),
                raw_body: Some("boom".to_string()),
            });
        dispatcher
            .expect_dispatch()
            .with(eq("def456"), eq(false))
            .returning(|_, _| ok());

        let catalog = vec![
            VideoRecord { video_id: "abc123".into(), title: "Broken".into(), published_at: "2024-01-02T00:00:00Z".into() },
            VideoRecord { video_id: "def456".into(), title: "Fine".into(), published_at: "2024-01-01T00:00:00Z".into() },
        ];
        let result = runner(catalog, dispatcher)
            .run_channel(CHANNEL, None, DispatchMode::All)
            .await
            .unwrap();

        match &result.srt_results[0].outcome {
            DispatchOutcome::Failure { reason, http_status, .. } => {
                assert_eq!(*reason, FailureReason::HttpError);
                assert_eq!(*http_status, Some(500));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(result.srt_results[1].outcome.is_success());
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failed_video_ids(), vec!["abc123".to_string()]);
    }

    #[tokio::test]
    async fn test_mode_none_skips_dispatch() {
        let mut dispatcher = MockCaptionDispatcher::new();
        dispatcher.expect_dispatch().never();

        let result = runner(videos(5), dispatcher)
            .run_channel(CHANNEL, None, DispatchMode::None)
            .await
            .unwrap();

        assert_eq!(result.videos.len(), 5);
        assert!(result.srt_results.is_empty());
    }

    #[tokio::test]
    async fn test_numeric_cap_dispatches_first_videos_in_order() {
        let mut seq = Sequence::new();
        let mut dispatcher = MockCaptionDispatcher::new();
        for id in ["video1", "video2"] {
            dispatcher
                .expect_dispatch()
                .with(eq(id), eq(false))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| ok());
        }

        let result = runner(videos(5), dispatcher)
            .run_channel(CHANNEL, None, DispatchMode::Limit(2))
            .await
            .unwrap();

        assert_eq!(result.videos.len(), 5);
        assert_eq!(result.srt_results.len(), 2);
    }

    #[tokio::test]
    async fn test_result_count_matches_mode_cap() {
        for mode in [DispatchMode::None, DispatchMode::All, DispatchMode::Limit(2), DispatchMode::Limit(9)] {
            let mut dispatcher = MockCaptionDispatcher::new();
            dispatcher.expect_dispatch().returning(|_, _| ok());

            let result = runner(videos(4), dispatcher)
                .run_channel(CHANNEL, None, mode)
                .await
                .unwrap();
            assert_eq!(result.srt_results.len(), mode.cap(result.videos.len()));
            assert!(result.srt_results.len() <= result.videos.len());
        }
    }

    #[tokio::test]
    async fn test_empty_catalog_is_channel_failure() {
        let mut dispatcher = MockCaptionDispatcher::new();
        dispatcher.expect_dispatch().never();

        let outcome = runner(Vec::new(), dispatcher)
            .process_channel(CHANNEL, None, DispatchMode::All)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_probe_strategy_is_used_when_configured() {
        let mut dispatcher = MockCaptionDispatcher::new();
        dispatcher
            .expect_dispatch()
            .with(eq("video1"), eq(true))
            .times(1)
            .returning(|_, _| DispatchOutcome::Success { payload: json!({"status": "cached"}) });

        let result = runner(videos(1), dispatcher)
            .with_strategy(DispatchStrategy::ProbeThenGenerate)
            .run_channel(CHANNEL, None, DispatchMode::All)
            .await
            .unwrap();
        assert_eq!(result.success_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_dispatches_not_after_last() {
        let mut dispatcher = MockCaptionDispatcher::new();
        dispatcher.expect_dispatch().times(3).returning(|_, _| ok());

        let runner = runner(videos(3), dispatcher).with_request_delay(Duration::from_secs(1));
        let started = tokio::time::Instant::now();
        runner.run_channel(CHANNEL, None, DispatchMode::All).await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_exporter_writes_channel_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = MockCaptionDispatcher::new();
        dispatcher.expect_dispatch().returning(|_, _| ok());

        let exporter = Exporter::new(dir.path(), vec![ExportFormat::Txt, ExportFormat::Csv]);
        runner(videos(2), dispatcher)
            .with_exporter(exporter)
            .run_channel(CHANNEL, None, DispatchMode::All)
            .await
            .unwrap();

        let names: Vec<String> = fs_err::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n.starts_with("Channel_UCxxxxxx_UCxxxxxxxxxxxxxxxxxxxxxx_all_video_ids_") && n.ends_with(".txt")));
        assert!(names.iter().any(|n| n.ends_with(".csv")));
        assert!(names.iter().any(|n| n.contains("_srt_results_")));
    }
}
