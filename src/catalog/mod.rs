use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod youtube;

pub use youtube::YoutubeDataApi;

use crate::config::Config;
use crate::{HarvesterError, Result};

/// One upload as listed in a channel's uploads playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    /// ISO-8601 timestamp as returned by the API
    pub published_at: String,
}

/// A single page of playlist items plus the cursor for the next one
#[derive(Debug, Clone, Default)]
pub struct PlaylistPage {
    pub items: Vec<VideoRecord>,
    pub next_page_token: Option<String>,
}

/// Remote catalog of channel uploads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Resolve a channel to its uploads playlist. `Ok(None)` means the channel does not exist.
    async fn uploads_playlist_id(&self, channel_id: &str) -> Result<Option<String>>;

    /// Fetch one page of a playlist
    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<PlaylistPage>;
}

/// Derive the uploads playlist without a network call: `UCxxxx` -> `UUxxxx`
pub fn uploads_playlist_for(channel_id: &str) -> Option<String> {
    channel_id
        .strip_prefix("UC")
        .map(|rest| format!("UU{}", rest))
}

/// Walks a channel's uploads playlist page by page
pub struct CatalogEnumerator<C> {
    api: C,
    page_size: u32,
    page_delay: Duration,
}

impl<C: CatalogApi> CatalogEnumerator<C> {
    pub fn new(api: C, page_size: u32, page_delay: Duration) -> Self {
        Self {
            api,
            page_size,
            page_delay,
        }
    }

    pub fn from_config(api: C, config: &Config) -> Self {
        Self::new(api, config.youtube.page_size, config.page_delay())
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    /// List a channel's uploads, newest first, stopping once `max_count` records are collected.
    ///
    /// Never fails: an unknown channel yields an empty list and a failed page request yields
    /// whatever was collected before it.
    pub async fn enumerate(&self, channel_id: &str, max_count: Option<usize>) -> Vec<VideoRecord> {
        let Some(playlist_id) = self.resolve_playlist(channel_id).await else {
            return Vec::new();
        };

        tracing::info!("Uploads playlist for channel {}: {}", channel_id, playlist_id);
        self.enumerate_playlist(&playlist_id, max_count).await
    }

    async fn resolve_playlist(&self, channel_id: &str) -> Option<String> {
        if let Some(playlist_id) = uploads_playlist_for(channel_id) {
            return Some(playlist_id);
        }

        match self.api.uploads_playlist_id(channel_id).await {
            Ok(Some(playlist_id)) => Some(playlist_id),
            Ok(None) => {
                tracing::warn!("Channel not found: {}", channel_id);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to resolve uploads playlist for {}: {:#}", channel_id, e);
                None
            }
        }
    }

    /// Follow the page cursor of one playlist
    pub async fn enumerate_playlist(&self, playlist_id: &str, max_count: Option<usize>) -> Vec<VideoRecord> {
        let mut videos = Vec::new();
        if max_count == Some(0) {
            return videos;
        }

        let mut page_token: Option<String> = None;
        let mut request_count = 0usize;

        loop {
            if request_count > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let page = match self
                .api
                .playlist_page(playlist_id, self.page_size, page_token.take())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    match e.downcast_ref::<HarvesterError>() {
                        Some(HarvesterError::QuotaExceeded(_)) => tracing::warn!(
                            "Quota exhausted while listing {}; keeping {} videos: {:#}",
                            playlist_id,
                            videos.len(),
                            e
                        ),
                        _ => tracing::warn!(
                            "Page request failed for {}; keeping {} videos: {:#}",
                            playlist_id,
                            videos.len(),
                            e
                        ),
                    }
                    break;
                }
            };
            request_count += 1;

            for item in page.items {
                videos.push(item);
                if max_count.is_some_and(|max| videos.len() >= max) {
                    tracing::info!("Reached video limit of {} for {}", videos.len(), playlist_id);
                    return videos;
                }
            }

            tracing::debug!("Fetched {} videos after {} requests", videos.len(), request_count);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(
            "Fetched {} videos from {} using {} requests",
            videos.len(),
            playlist_id,
            request_count
        );
        videos
    }
}
