use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::DispatchStrategy;
use crate::output::ExportFormat;
use crate::HarvesterError;

/// Environment variable that overrides `youtube.api_key`
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Largest page the playlistItems endpoint will return
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// YouTube Data API settings
    pub youtube: YoutubeConfig,

    /// Caption webhook settings
    pub srt: SrtConfig,

    /// Multi-channel batch settings
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    /// API key; the YOUTUBE_API_KEY environment variable wins when set
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the Data API
    pub base_url: String,

    /// Items requested per playlist page (1-50)
    pub page_size: u32,

    /// Pause between page requests in milliseconds
    pub page_delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_catalog_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrtConfig {
    /// Caption webhook URL
    pub endpoint: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Pause between per-video requests in milliseconds
    pub request_delay_ms: u64,

    /// Whether to probe the cache before asking for generation
    pub strategy: DispatchStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Pause between channels in seconds
    pub channel_delay_secs: u64,

    /// Where exports and summaries are written
    pub output_dir: Option<PathBuf>,

    /// Per-channel export formats
    pub export_formats: Vec<ExportFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube: YoutubeConfig {
                api_key: String::new(),
                base_url: "https://www.googleapis.com/youtube/v3".to_string(),
                page_size: MAX_PAGE_SIZE,
                page_delay_ms: 100,
                timeout_secs: default_catalog_timeout_secs(),
            },
            srt: SrtConfig {
                endpoint: "https://lic.deepsrt.cc/webhook/get-srt-from-provider".to_string(),
                timeout_secs: 30,
                request_delay_ms: 1000,
                strategy: DispatchStrategy::Direct,
            },
            batch: BatchConfig {
                channel_delay_secs: 5,
                output_dir: None,
                export_formats: vec![ExportFormat::Txt, ExportFormat::Json, ExportFormat::Csv],
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content)
                .context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save_to(&config_path).await?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            config
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.youtube.api_key = key.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the given path
    pub async fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let mut persisted = self.clone();
        // keys supplied through the environment stay out of the file
        persisted.youtube.api_key.clear();

        let content = serde_yaml::to_string(&persisted)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("srt-harvester").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.youtube.page_size == 0 || self.youtube.page_size > MAX_PAGE_SIZE {
            return Err(HarvesterError::Config(format!(
                "youtube.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.youtube.page_size
            ))
            .into());
        }

        if self.youtube.timeout_secs == 0 {
            return Err(HarvesterError::Config("youtube.timeout_secs must be positive".to_string()).into());
        }

        if self.srt.timeout_secs == 0 {
            return Err(HarvesterError::Config("srt.timeout_secs must be positive".to_string()).into());
        }

        for (name, value) in [("srt.endpoint", &self.srt.endpoint), ("youtube.base_url", &self.youtube.base_url)] {
            url::Url::parse(value)
                .map_err(|e| HarvesterError::Config(format!("{} is not a valid URL ({}): {}", name, e, value)))?;
        }

        Ok(())
    }

    /// Fail unless a YouTube API key is available
    pub fn require_api_key(&self) -> Result<&str> {
        if self.youtube.api_key.is_empty() {
            return Err(HarvesterError::Config(format!(
                "YouTube API key missing: set {} or youtube.api_key in the config file",
                API_KEY_ENV
            ))
            .into());
        }
        Ok(&self.youtube.api_key)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.youtube.page_delay_ms)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.youtube.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.srt.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.srt.request_delay_ms)
    }

    pub fn channel_delay(&self) -> Duration {
        Duration::from_secs(self.batch.channel_delay_secs)
    }

    /// Output directory, defaulting to the working directory
    pub fn output_dir(&self) -> PathBuf {
        self.batch
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  YouTube API: {}", self.youtube.base_url);
        println!(
            "  API Key: {}",
            if self.youtube.api_key.is_empty() { "(not set)" } else { "(set)" }
        );
        println!("  Page Size: {}", self.youtube.page_size);
        println!("  YouTube Timeout: {}s", self.youtube.timeout_secs);
        println!("  SRT Endpoint: {}", self.srt.endpoint);
        println!("  SRT Timeout: {}s", self.srt.timeout_secs);
        println!("  SRT Strategy: {}", self.srt.strategy);
        println!("  Request Delay: {}ms", self.srt.request_delay_ms);
        println!("  Channel Delay: {}s", self.batch.channel_delay_secs);
        println!("  Output Dir: {}", self.output_dir().display());
    }
}
