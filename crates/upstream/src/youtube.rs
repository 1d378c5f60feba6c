//! Video metadata provider payloads.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transport::{UpstreamRequest, UpstreamResponse};

/// Parts requested for every video lookup.
pub const VIDEO_PARTS: &str = "snippet,contentDetails,statistics";

/// One video item as returned by the metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub snippet: serde_json::Value,
    #[serde(default)]
    pub content_details: serde_json::Value,
    #[serde(default)]
    pub statistics: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoData>,
}

/// Builds the lookup. The metadata provider takes its key as a query parameter.
pub fn video_request(url: &str, video_id: &str, api_key: &str, timeout: Duration) -> UpstreamRequest {
    UpstreamRequest::get(url, timeout)
        .query("part", VIDEO_PARTS)
        .query("id", video_id)
        .query("key", api_key)
}

/// Parsed list response.
#[derive(Debug, PartialEq)]
pub enum VideoLookup {
    Found(VideoData),
    /// Well-formed response with no items
    NotFound,
    /// Body did not match the expected shape
    Malformed,
}

pub fn parse_video(response: &UpstreamResponse) -> VideoLookup {
    match response.json::<VideoListResponse>() {
        Ok(list) => match list.items.into_iter().next() {
            Some(item) => VideoLookup::Found(item),
            None => VideoLookup::NotFound,
        },
        Err(_) => VideoLookup::Malformed,
    }
}
