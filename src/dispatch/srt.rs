use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;

use super::{classify_response, CaptionDispatcher, DispatchOutcome, FailureReason};
use crate::config::Config;
use crate::Result;

/// JSON body accepted by the caption webhook
#[derive(Debug, Serialize)]
struct SrtRequestBody<'a> {
    youtube_id: &'a str,
    /// The webhook expects the literal strings "true" / "false"
    fetch_only: &'static str,
}

/// HTTP client for the caption webhook
pub struct SrtDispatcher {
    client: reqwest::Client,
    endpoint: String,
}

impl SrtDispatcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for caption requests")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.srt.endpoint.clone(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_failure(err: &reqwest::Error) -> DispatchOutcome {
        if err.is_timeout() {
            DispatchOutcome::failure(FailureReason::Timeout, "Request timed out")
        } else {
            DispatchOutcome::failure(FailureReason::TransportError, format!("Request failed: {}", err))
        }
    }
}

#[async_trait]
impl CaptionDispatcher for SrtDispatcher {
    async fn dispatch(&self, video_id: &str, probe_only: bool) -> DispatchOutcome {
        let body = SrtRequestBody {
            youtube_id: video_id,
            fetch_only: if probe_only { "true" } else { "false" },
        };

        tracing::debug!("POST {} youtube_id={} fetch_only={}", self.endpoint, video_id, body.fetch_only);

        let response = match self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Self::transport_failure(&e),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => classify_response(status, &text),
            Err(e) => Self::transport_failure(&e),
        }
    }
}
