use anyhow::{Context, Result};
use console::style;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::coordinator::RunSummary;
use crate::runner::ChannelResult;
use crate::utils::{format_duration, sanitize_filename};
use crate::HarvesterError;

pub mod formatters;

pub use formatters::*;

/// File formats for per-channel video lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One video id per line
    Txt,
    /// Full records as JSON
    Json,
    /// Full records as CSV
    Csv,
}

/// Writes channel exports and run summaries into one directory
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    formats: Vec<ExportFormat>,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>, formats: Vec<ExportFormat>) -> Self {
        Self {
            output_dir: output_dir.into(),
            formats,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(HarvesterError::Export(format!(
                "{} exists and is not a directory",
                self.output_dir.display()
            ))
            .into());
        }
        fs_err::create_dir_all(&self.output_dir).context("Failed to create output directory")?;
        Ok(())
    }

    fn write(&self, filename: String, content: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(filename);
        fs_err::write(&path, content)?;
        Ok(path)
    }

    /// Save the video list in every configured format, plus SRT results when any exist
    pub fn export_channel(&self, result: &ChannelResult) -> Result<Vec<PathBuf>> {
        self.ensure_dir()?;

        let safe_name = export_stem(result);
        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut written = Vec::new();

        for format in &self.formats {
            let path = match format {
                ExportFormat::Txt => self.write(
                    format!("{}_all_video_ids_{}.txt", safe_name, timestamp),
                    &videos_as_txt(&result.videos),
                )?,
                ExportFormat::Json => self.write(
                    format!("{}_all_videos_{}.json", safe_name, timestamp),
                    &videos_as_json(&result.videos)?,
                )?,
                ExportFormat::Csv => self.write(
                    format!("{}_all_videos_{}.csv", safe_name, timestamp),
                    &videos_as_csv(&result.videos)?,
                )?,
            };
            written.push(path);
        }

        if !result.srt_results.is_empty() {
            written.push(self.write(
                format!("{}_srt_results_{}.json", safe_name, timestamp),
                &srt_results_as_json(&result.srt_results)?,
            )?);
        }

        Ok(written)
    }

    /// Save the run summary as `multi_channel_summary_<unix ts>.json`
    pub fn save_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        self.ensure_dir()?;
        self.write(
            format!("multi_channel_summary_{}.json", summary.timestamp.timestamp()),
            &summary_as_json(summary)?,
        )
    }
}

/// `<name>_<full channel id>`, filesystem safe
fn export_stem(result: &ChannelResult) -> String {
    let info = &result.channel_info;
    sanitize_filename(&format!("{}_{}", info.name, info.id)).replace(' ', "_")
}

/// Print the outcome of a single channel
pub fn print_channel_result(result: &ChannelResult) {
    println!();
    println!("{} {} ({})", style("Channel:").bold(), result.channel_info.id, result.channel_info.name);
    println!("  Videos fetched: {}", result.videos.len());
    if let (Some(newest), Some(oldest)) = (result.videos.first(), result.videos.last()) {
        println!("  Newest: {} ({})", newest.title, newest.published_at.get(..10).unwrap_or(&newest.published_at));
        println!("  Oldest: {} ({})", oldest.title, oldest.published_at.get(..10).unwrap_or(&oldest.published_at));
    }
    if !result.srt_results.is_empty() {
        println!(
            "  SRT requests: {} ({} ok, {} failed)",
            result.srt_results.len(),
            style(result.success_count()).green(),
            style(result.failure_count()).red()
        );
        for id in result.failed_video_ids() {
            println!("    {} {}", style("✗").red(), id);
        }
    }
}

/// Print the final statistics of a batch run
pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", style("Batch Summary:").bold());
    println!("  Channels processed: {}/{}", summary.channels_processed, summary.channels_found);
    println!("  Channels failed: {}", style(summary.channels_failed.len()).red());
    println!("  Total videos: {}", summary.total_videos);
    println!("  Total SRT requests: {}", summary.total_srt_requests);
    println!("  Elapsed: {}", format_duration(summary.elapsed_seconds));
    if summary.interrupted {
        println!("  {}", style("Run was interrupted before all channels were attempted").yellow());
    }

    if !summary.channels_failed.is_empty() {
        println!("\n{}", style("Failed channels:").red().bold());
        for id in &summary.channels_failed {
            println!("  ✗ {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VideoRecord;
    use crate::coordinator::RunSettings;
    use crate::runner::{ChannelInfo, DispatchMode};

    fn channel_result() -> ChannelResult {
        ChannelResult {
            channel_info: ChannelInfo::from_id("UCxxxxxxxxxxxxxxxxxxxxxx"),
            videos: vec![VideoRecord {
                video_id: "aaa111".to_string(),
                title: "Only".to_string(),
                published_at: "2024-01-01T00:00:00Z".to_string(),
            }],
            srt_results: Vec::new(),
        }
    }

    #[test]
    fn test_export_without_srt_results() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path().join("out"), vec![ExportFormat::Txt, ExportFormat::Json, ExportFormat::Csv]);

        let paths = exporter.export_channel(&channel_result()).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.exists()));
        assert_eq!(fs_err::read_to_string(&paths[0]).unwrap(), "aaa111\n");
    }

    #[test]
    fn test_channels_with_shared_prefix_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), vec![ExportFormat::Txt]);

        let mut first = channel_result();
        first.channel_info = ChannelInfo::from_id("UCabcdefAAAAAAAAAAAAAAAA");
        let mut second = channel_result();
        second.channel_info = ChannelInfo::from_id("UCabcdefBBBBBBBBBBBBBBBB");
        assert_eq!(first.channel_info.name, second.channel_info.name);

        let first_paths = exporter.export_channel(&first).unwrap();
        let second_paths = exporter.export_channel(&second).unwrap();
        assert_ne!(first_paths[0], second_paths[0]);
        assert!(first_paths[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Channel_UCabcdef_UCabcdefAAAAAAAAAAAAAAAA_all_video_ids_"));
        assert_eq!(fs_err::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_export_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs_err::write(&file, "x").unwrap();

        let exporter = Exporter::new(&file, vec![ExportFormat::Txt]);
        let err = exporter.export_channel(&channel_result()).unwrap_err();
        assert!(matches!(err.downcast_ref::<HarvesterError>(), Some(HarvesterError::Export(_))));
    }

    #[test]
    fn test_save_summary_names_file_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), Vec::new());
        let settings = RunSettings::new(Some(50), DispatchMode::All, "args");
        let summary = RunSummary::build(&settings, 2, &[channel_result()], vec!["UCfailed".to_string()], 1.5, false);

        let path = exporter.save_summary(&summary).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, format!("multi_channel_summary_{}.json", summary.timestamp.timestamp()));

        let value: serde_json::Value = serde_json::from_str(&fs_err::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["channels_failed"][0], "UCfailed");
        assert_eq!(value["settings"]["dispatch_mode"], "all");
    }
}
