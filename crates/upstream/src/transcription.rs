//! Transcription provider payloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::transport::{UpstreamRequest, UpstreamResponse};

/// Transcription strategy requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptMode {
    #[default]
    Auto,
    Whisper,
    Hybrid,
}

impl TranscriptMode {
    /// Parses a caller-supplied mode, falling back to `Auto`.
    pub fn sanitize(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "whisper" => Self::Whisper,
            "hybrid" => Self::Hybrid,
            _ => Self::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Whisper => "whisper",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for TranscriptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body sent to the transcription provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRequest {
    pub video_id: String,
    pub mode: TranscriptMode,
    pub language: String,
}

impl TranscriptRequest {
    pub fn to_upstream(&self, url: &str, api_key: &str, timeout: Duration) -> UpstreamRequest {
        UpstreamRequest::post(url, timeout)
            .bearer(api_key)
            .json(serde_json::json!({
                "video_id": self.video_id,
                "mode": self.mode,
                "language": self.language,
            }))
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    transcript: Option<String>,
}

/// Extracts the transcript from a 2xx response, if the payload has one.
pub fn parse_transcript(response: &UpstreamResponse) -> Option<String> {
    response
        .json::<TranscriptResponse>()
        .ok()
        .and_then(|r| r.transcript)
}
