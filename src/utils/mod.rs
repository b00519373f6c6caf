use anyhow::{Context, Result};
use std::path::Path;

use crate::HarvesterError;

/// Header cells that may head a channel id column
const CHANNEL_LIST_HEADERS: &[&str] = &["channel_id", "channel id", "youtube_channel_id", "id"];

/// Whether an id has the usual `UC` + 22 character shape
pub fn looks_like_channel_id(id: &str) -> bool {
    id.len() == 24 && id.starts_with("UC")
}

/// Parse a channel list: one id per line, first cell of comma or tab separated rows.
///
/// Blank lines, `#` comments and a leading header row are ignored. Ids that do not look
/// like channel ids are skipped with a warning.
pub fn parse_channel_list(content: &str) -> Vec<String> {
    let mut ids = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let cell = line
            .split([',', '\t'])
            .next()
            .unwrap_or("")
            .trim()
            .trim_matches('"');
        if cell.is_empty() || cell.starts_with('#') {
            continue;
        }
        if i == 0 && CHANNEL_LIST_HEADERS.contains(&cell.to_lowercase().as_str()) {
            continue;
        }
        if looks_like_channel_id(cell) {
            ids.push(cell.to_string());
        } else {
            tracing::warn!("Skipping invalid channel id on line {}: {}", i + 1, cell);
        }
    }

    ids
}

/// Read a channel list from disk; an empty result is an error
pub fn load_channel_list(path: &Path) -> Result<Vec<String>> {
    let content = fs_err::read_to_string(path).context("Failed to read channel list")?;
    let ids = parse_channel_list(&content);
    if ids.is_empty() {
        return Err(HarvesterError::ChannelList(format!("no valid channel ids in {}", path.display())).into());
    }
    Ok(ids)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, spaces, hyphens, underscores, and dots
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                _ => '_',
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Shorten a title to `max_chars` characters, appending "..." when cut
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let mut short: String = title.chars().take(max_chars).collect();
    short.push_str("...");
    short
}
