use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod srt;

pub use srt::SrtDispatcher;

/// Status string the webhook returns when a probe finds nothing cached
pub const CACHE_MISS_STATUS: &str = "not cached";

/// Why a single caption request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    TransportError,
    HttpError,
    UnknownError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::TransportError => "transport_error",
            FailureReason::HttpError => "http_error",
            FailureReason::UnknownError => "unknown_error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one caption request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// HTTP 200 with the webhook's JSON body passed through untouched
    Success { payload: Value },

    Failure {
        reason: FailureReason,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_body: Option<String>,
    },
}

impl DispatchOutcome {
    pub fn failure(reason: FailureReason, message: impl Into<String>) -> Self {
        DispatchOutcome::Failure {
            reason,
            message: message.into(),
            http_status: None,
            raw_body: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            DispatchOutcome::Success { .. } => None,
            DispatchOutcome::Failure { reason, .. } => Some(*reason),
        }
    }

    /// True when a probe came back 200 but reported no cached captions
    pub fn is_cache_miss(&self) -> bool {
        match self {
            DispatchOutcome::Success { payload } => {
                payload.get("status").and_then(Value::as_str) == Some(CACHE_MISS_STATUS)
            }
            DispatchOutcome::Failure { .. } => false,
        }
    }

    /// Short human readable description for logs and console output
    pub fn describe(&self) -> String {
        match self {
            DispatchOutcome::Success { payload } => match payload.get("status").and_then(Value::as_str) {
                Some(status) => format!("ok ({})", status),
                None => "ok".to_string(),
            },
            DispatchOutcome::Failure { reason, message, .. } => format!("{}: {}", reason, message),
        }
    }
}

/// Classify a completed HTTP exchange with the caption webhook
pub fn classify_response(status: u16, body: &str) -> DispatchOutcome {
    if status != 200 {
        return DispatchOutcome::Failure {
            reason: FailureReason::HttpError,
            message: format!("HTTP {}", status),
            http_status: Some(status),
            raw_body: Some(body.to_string()),
        };
    }

    match serde_json::from_str::<Value>(body) {
        Ok(payload) => DispatchOutcome::Success { payload },
        Err(e) => DispatchOutcome::Failure {
            reason: FailureReason::UnknownError,
            message: format!("Invalid JSON in response: {}", e),
            http_status: Some(status),
            raw_body: Some(body.to_string()),
        },
    }
}

/// Sends one caption request for one video.
///
/// Implementations never fail: every problem is reported as a `DispatchOutcome::Failure`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionDispatcher: Send + Sync {
    async fn dispatch(&self, video_id: &str, probe_only: bool) -> DispatchOutcome;
}

/// How a caller turns one video into caption requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Ask for generation straight away
    #[default]
    Direct,
    /// Probe the cache first and only generate on a cache miss
    ProbeThenGenerate,
}

impl DispatchStrategy {
    pub async fn run<D>(&self, dispatcher: &D, video_id: &str) -> DispatchOutcome
    where
        D: CaptionDispatcher + ?Sized,
    {
        match self {
            DispatchStrategy::Direct => dispatcher.dispatch(video_id, false).await,
            DispatchStrategy::ProbeThenGenerate => {
                let probe = dispatcher.dispatch(video_id, true).await;
                if probe.is_cache_miss() {
                    tracing::debug!("Cache miss for {}, requesting generation", video_id);
                    dispatcher.dispatch(video_id, false).await
                } else {
                    probe
                }
            }
        }
    }
}

impl std::fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchStrategy::Direct => write!(f, "direct"),
            DispatchStrategy::ProbeThenGenerate => write!(f, "probe_then_generate"),
        }
    }
}
