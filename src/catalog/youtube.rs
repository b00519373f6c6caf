use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{CatalogApi, PlaylistPage, VideoRecord};
use crate::config::Config;
use crate::{HarvesterError, Result};

/// Response of `playlistItems.list`
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Deserialize)]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
    #[serde(rename = "contentDetails")]
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    #[serde(default)]
    title: String,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemContentDetails {
    #[serde(rename = "videoId")]
    video_id: String,
}

/// Response of `channels.list` with `part=contentDetails`
#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    #[serde(rename = "contentDetails")]
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

impl From<PlaylistItem> for VideoRecord {
    fn from(item: PlaylistItem) -> Self {
        VideoRecord {
            video_id: item.content_details.video_id,
            title: item.snippet.title,
            published_at: item.snippet.published_at,
        }
    }
}

/// YouTube Data API v3 client for channel uploads
pub struct YoutubeDataApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl YoutubeDataApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for the YouTube API")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Self::new(config.youtube.base_url.clone(), api_key, config.catalog_timeout())
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, resource))
            .with_context(|| format!("Invalid YouTube API base URL: {}", self.base_url))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().copied())
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("{} request failed", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::FORBIDDEN {
                return Err(HarvesterError::QuotaExceeded(body).into());
            }
            return Err(HarvesterError::CatalogHttp {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode {} response", what))
    }
}

#[async_trait]
impl CatalogApi for YoutubeDataApi {
    async fn uploads_playlist_id(&self, channel_id: &str) -> Result<Option<String>> {
        let url = self.endpoint("channels", &[("part", "contentDetails"), ("id", channel_id)])?;
        tracing::debug!("Resolving uploads playlist for channel {}", channel_id);

        let response: ChannelListResponse = self.get_json(url, "channels.list").await?;
        Ok(response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.content_details.related_playlists.uploads))
    }

    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<PlaylistPage> {
        let max_results = page_size.to_string();
        let mut params = vec![
            ("part", "contentDetails,snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token.as_deref() {
            params.push(("pageToken", token));
        }
        let url = self.endpoint("playlistItems", &params)?;

        let response: PlaylistItemListResponse = self.get_json(url, "playlistItems.list").await?;
        Ok(PlaylistPage {
            items: response.items.into_iter().map(VideoRecord::from).collect(),
            next_page_token: response.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}
