use anyhow::{Context, Result};
use serde::Serialize;

use crate::catalog::VideoRecord;
use crate::coordinator::RunSummary;
use crate::runner::SrtRequestResult;

/// One video id per line
pub fn videos_as_txt(videos: &[VideoRecord]) -> String {
    let mut output = String::new();
    for video in videos {
        output.push_str(&video.video_id);
        output.push('\n');
    }
    output
}

pub fn videos_as_json(videos: &[VideoRecord]) -> Result<String> {
    serde_json::to_string_pretty(videos).context("Failed to serialize videos as JSON")
}

/// Watch page of a video
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

#[derive(Serialize)]
struct CsvRow<'a> {
    index: usize,
    video_id: &'a str,
    title: &'a str,
    published_at: &'a str,
    link: String,
}

/// `index,video_id,title,published_at,link` with a header row; `index` is 1-based
pub fn videos_as_csv(videos: &[VideoRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (i, video) in videos.iter().enumerate() {
        writer.serialize(CsvRow {
            index: i + 1,
            video_id: &video.video_id,
            title: &video.title,
            published_at: &video.published_at,
            link: watch_url(&video.video_id),
        })?;
    }
    if videos.is_empty() {
        writer.write_record(["index", "video_id", "title", "published_at", "link"])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn srt_results_as_json(results: &[SrtRequestResult]) -> Result<String> {
    serde_json::to_string_pretty(results).context("Failed to serialize SRT results as JSON")
}

pub fn summary_as_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("Failed to serialize run summary")
}
