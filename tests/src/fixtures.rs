//! Test fixtures: provider payloads and configuration.

use gateway_core::{GatewayConfig, RotationMode};
use serde_json::{json, Value};

pub const TRANSCRIPTION_KEYS: [&str; 3] = ["tk-primary", "tk-second", "tk-third"];
pub const AI_KEY: &str = "ai-key-1";
pub const YOUTUBE_KEY: &str = "yt-key-1";

/// Gateway config with a full set of test credentials.
pub fn gateway_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.credentials.transcription = TRANSCRIPTION_KEYS.iter().map(|k| k.to_string()).collect();
    config.credentials.ai = vec![AI_KEY.to_string()];
    config.credentials.youtube = vec![YOUTUBE_KEY.to_string()];
    config.credentials.rotation = RotationMode::FixedWithFallback;
    config
}

/// Transcription provider success body.
pub fn transcript_body(text: &str) -> Value {
    json!({ "transcript": text })
}

/// Chat completion success body.
pub fn completion_body(text: &str) -> Value {
    json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": text } }
        ]
    })
}

/// Video metadata body with one item.
pub fn video_body(id: &str, title: &str) -> Value {
    json!({
        "items": [{
            "id": id,
            "snippet": { "title": title, "channelTitle": "Channel" },
            "contentDetails": { "duration": "PT4M13S" },
            "statistics": { "viewCount": "1024" }
        }]
    })
}

/// Video metadata body with no items.
pub fn empty_video_body() -> Value {
    json!({ "items": [] })
}

/// A transcript without any of the default suspicious terms.
pub fn sample_transcript() -> &'static str {
    "Welcome back to the channel. Today we look at sourdough starters, \
     how often to feed them, and what a healthy rise looks like."
}
