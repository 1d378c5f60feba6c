//! Gateway endpoints: transcripts, descriptions, and video metadata.
//!
//! Requests are screened by the security filter before the license is
//! resolved, so a blocked caller never reaches the license service. The
//! license key may come from the body or from headers; the body wins.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use gateway_core::limits::MAX_AUDIT_RESOURCE_ID_LEN;
use gateway_core::CallerContext;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use validator::Validate;

use crate::extractors::{resolve_tenant, HeaderLicenseKey, Origin, ScreenedBody};
use crate::response::{ApiError, DescriptionResponse, TranscriptResponse, VideoResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TranscriptBody {
    #[validate(length(max = 100))]
    pub video_id: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub mode: Option<String>,
    #[serde(default)]
    #[validate(length(max = 16))]
    pub lang: Option<String>,
    #[serde(default)]
    pub license_key: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DescriptionBody {
    pub transcript: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub license_key: Option<String>,
}

fn parse_body<T>(body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
    parsed
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(parsed)
}

/// POST /v1/transcript
pub async fn transcript_handler(
    State(state): State<AppState>,
    header_key: HeaderLicenseKey,
    Origin(origin): Origin,
    ScreenedBody(body): ScreenedBody,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let request: TranscriptBody = parse_body(&body)?;
    let tenant = resolve_tenant(&state, header_key.or_body(request.license_key.as_deref())).await?;
    let ctx = CallerContext::new(tenant)
        .with_origin(origin)
        .with_body_size(body.len());

    let defaults = &state.gateway.config().upstream;
    let mode = request.mode.as_deref().unwrap_or("auto");
    let lang = request.lang.as_deref().unwrap_or(&defaults.default_language);

    debug!(video_id = %request.video_id, mode = mode, "Transcript requested");

    let transcript = state
        .gateway
        .get_transcript(&request.video_id, mode, lang, &ctx)
        .await?;

    Ok(Json(TranscriptResponse {
        success: true,
        transcript,
    }))
}

/// POST /v1/description
pub async fn description_handler(
    State(state): State<AppState>,
    header_key: HeaderLicenseKey,
    Origin(origin): Origin,
    ScreenedBody(body): ScreenedBody,
) -> Result<Json<DescriptionResponse>, ApiError> {
    let request: DescriptionBody = parse_body(&body)?;
    let tenant = resolve_tenant(&state, header_key.or_body(request.license_key.as_deref())).await?;
    let ctx = CallerContext::new(tenant)
        .with_origin(origin)
        .with_body_size(body.len());

    let description = state
        .gateway
        .generate_description(
            &request.transcript,
            request.title.as_deref().unwrap_or(""),
            request.custom_prompt.as_deref(),
            &ctx,
        )
        .await?;

    Ok(Json(DescriptionResponse {
        success: true,
        description,
    }))
}

/// GET /v1/videos/:video_id
pub async fn video_handler(
    State(state): State<AppState>,
    header_key: HeaderLicenseKey,
    Origin(origin): Origin,
    Path(video_id): Path<String>,
) -> Result<Json<VideoResponse>, ApiError> {
    if video_id.chars().count() > MAX_AUDIT_RESOURCE_ID_LEN {
        return Err(ApiError::bad_request("video_id is too long"));
    }
    state.gateway.screen_request(&video_id, 0, &origin).await?;
    let tenant = resolve_tenant(&state, header_key.0).await?;
    let ctx = CallerContext::new(tenant).with_origin(origin);

    let video = state.gateway.get_youtube_video_data(&video_id, &ctx).await?;

    Ok(Json(VideoResponse {
        success: true,
        video,
    }))
}
