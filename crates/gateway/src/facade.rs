//! The gateway's public operations.
//!
//! Every upstream-facing operation runs the same pipeline:
//! security filter → rate limit → cache lookup → orchestrated upstream call
//! → cache store → audit. Filter and limiter rejections short-circuit and
//! leave a security event instead of an audit record.

use gateway_core::limits::MAX_AUDIT_TITLE_LEN;
use gateway_core::{
    sanitize_text_field, truncate_chars, AuditRecord, AuditSink, CallerContext, Clock,
    CredentialKind, Endpoint, EndpointClass, EndpointStats, Error, GatewayConfig, KvStore,
    RequestOrigin, Result, Tenant,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tracing::{debug, info, instrument};
use upstream::{
    parse_completion, parse_transcript, parse_video, video_request, ChatCompletionRequest,
    ChatMessage, TranscriptMode, TranscriptRequest, Transport, VideoData, VideoLookup,
};

use crate::audit::AuditLog;
use crate::cache::{cache_key, CacheOperation, CacheScope, ResponseCache};
use crate::key_pool::KeyPool;
use crate::rate_limit::RateLimiter;
use crate::retry::{Execution, Orchestrator, RetryPolicy};
use crate::security::{RequestDescriptor, SecurityFilter};

/// Backends a gateway is built on.
#[derive(Clone)]
pub struct GatewayDeps {
    pub store: Arc<dyn KvStore>,
    pub audit_sink: Arc<dyn AuditSink>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
}

/// Tracks in-flight calls and latency for one facade operation.
struct CallGuard {
    started: Instant,
}

impl CallGuard {
    fn start() -> Self {
        metrics().gateway_calls.inc();
        metrics().in_flight_calls.inc();
        Self {
            started: Instant::now(),
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        metrics().in_flight_calls.dec();
        metrics()
            .gateway_latency_ms
            .observe(self.started.elapsed().as_millis() as u64);
    }
}

pub struct Gateway {
    config: GatewayConfig,
    transcription_keys: KeyPool,
    ai_keys: KeyPool,
    youtube_keys: KeyPool,
    cache: ResponseCache,
    limiter: RateLimiter,
    security: SecurityFilter,
    audit: Arc<AuditLog>,
    orchestrator: Orchestrator,
    clock: Arc<dyn Clock>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, deps: GatewayDeps) -> Result<Self> {
        config.validate()?;

        let audit = Arc::new(AuditLog::new(
            deps.audit_sink,
            deps.clock.clone(),
            config.audit.enabled,
        ));

        let gateway = Self {
            transcription_keys: KeyPool::from_config(
                CredentialKind::Transcription,
                &config.credentials,
                deps.store.clone(),
            ),
            ai_keys: KeyPool::from_config(CredentialKind::Ai, &config.credentials, deps.store.clone()),
            youtube_keys: KeyPool::from_config(
                CredentialKind::Youtube,
                &config.credentials,
                deps.store.clone(),
            ),
            cache: ResponseCache::new(deps.store.clone(), config.cache.enabled),
            limiter: RateLimiter::new(deps.store, config.rate_limits.clone(), audit.clone()),
            security: SecurityFilter::new(&config.security, audit.clone()),
            orchestrator: Orchestrator::new(deps.transport, deps.clock.clone()),
            clock: deps.clock,
            audit,
            config,
        };

        info!(
            transcription_keys = gateway.transcription_keys.len(),
            ai_keys = gateway.ai_keys.len(),
            youtube_keys = gateway.youtube_keys.len(),
            rotation = ?gateway.transcription_keys.mode(),
            cache = gateway.config.cache.enabled,
            rate_limits = gateway.config.rate_limits.enabled,
            "Gateway initialized"
        );

        Ok(gateway)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Fetches a transcript, cache first, with retries and key failover.
    #[instrument(skip(self, ctx), fields(tenant = %ctx.tenant.id))]
    pub async fn get_transcript(
        &self,
        video_id: &str,
        mode: &str,
        lang: &str,
        ctx: &CallerContext,
    ) -> Result<String> {
        let _guard = CallGuard::start();
        let payload = json!({ "video_id": video_id, "mode": mode, "lang": lang }).to_string();
        self.screen(&payload, ctx).await?;

        let video_id = sanitize_text_field(video_id);
        if video_id.is_empty() {
            return Err(self.security.reject_invalid("video_id is required", &ctx.origin).await);
        }
        let mode = TranscriptMode::sanitize(mode);
        let lang = match sanitize_text_field(lang) {
            l if l.is_empty() => self.config.upstream.default_language.clone(),
            l => l,
        };

        self.admit(Endpoint::Transcript, &video_id, ctx).await?;

        let key = cache_key(CacheOperation::Transcript, &video_id, &[mode.as_str(), &lang]);
        if let Some(transcript) = self.cache.get::<String>(&key).await {
            self.audit_cache_hit(Endpoint::Transcript, &video_id, transcript.len(), ctx)
                .await;
            return Ok(transcript);
        }

        let selection = match self.transcription_keys.checkout().await {
            Ok(selection) => selection,
            Err(e) => return Err(self.audit_failure(Endpoint::Transcript, &video_id, 0, e, ctx).await),
        };

        let upstream = &self.config.upstream;
        let request = TranscriptRequest {
            video_id: video_id.clone(),
            mode,
            language: lang,
        };
        let timeout = Duration::from_secs(upstream.transcript_timeout_secs);

        let exec = self
            .orchestrator
            .execute(
                &selection,
                RetryPolicy::new(
                    self.config.retry.transcript_max_attempts,
                    self.config.retry.backoff_unit(),
                ),
                |credential| {
                    Ok(request.to_upstream(&upstream.transcription_url, credential.secret(), timeout))
                },
                |response| {
                    parse_transcript(response).ok_or_else(|| {
                        Error::upstream(502, "Invalid response from transcription service")
                    })
                },
            )
            .await;

        let transcript = self.finish(Endpoint::Transcript, &video_id, exec, ctx, |t| t.len()).await?;
        self.cache
            .put(&key, &transcript, self.config.cache.transcript_ttl())
            .await;
        Ok(transcript)
    }

    /// Generates a description from a transcript. Never cached, one attempt.
    #[instrument(skip(self, transcript, custom_prompt, ctx), fields(tenant = %ctx.tenant.id))]
    pub async fn generate_description(
        &self,
        transcript: &str,
        title: &str,
        custom_prompt: Option<&str>,
        ctx: &CallerContext,
    ) -> Result<String> {
        let _guard = CallGuard::start();
        let payload = json!({
            "transcript": transcript,
            "title": title,
            "custom_prompt": custom_prompt,
        })
        .to_string();
        self.screen(&payload, ctx).await?;

        if transcript.trim().is_empty() {
            return Err(self.security.reject_invalid("transcript is required", &ctx.origin).await);
        }
        let title = sanitize_text_field(title);
        let resource_id = truncate_chars(&title, MAX_AUDIT_TITLE_LEN);

        self.admit(Endpoint::AiDescription, &resource_id, ctx).await?;

        let selection = match self.ai_keys.checkout().await {
            Ok(selection) => selection,
            Err(e) => {
                return Err(self
                    .audit_failure(Endpoint::AiDescription, &resource_id, 0, e, ctx)
                    .await)
            }
        };

        let upstream = &self.config.upstream;
        let system_prompt = custom_prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&upstream.default_system_prompt);
        let request = ChatCompletionRequest {
            model: upstream.ai_model.clone(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(format!(
                    "Title: {}\n\nTranscript:\n{}",
                    title,
                    transcript.trim()
                )),
            ],
            temperature: upstream.ai_temperature,
            max_tokens: upstream.ai_max_tokens,
        };
        let timeout = Duration::from_secs(upstream.ai_timeout_secs);

        let exec = self
            .orchestrator
            .execute(
                &selection,
                RetryPolicy::single(),
                |credential| Ok(request.to_upstream(&upstream.ai_url, credential.secret(), timeout)?),
                |response| {
                    parse_completion(response)
                        .ok_or_else(|| Error::upstream(502, "No response from AI provider"))
                },
            )
            .await;

        self.finish(Endpoint::AiDescription, &resource_id, exec, ctx, |d| d.len())
            .await
    }

    /// Looks up video metadata, cache first, one attempt.
    #[instrument(skip(self, ctx), fields(tenant = %ctx.tenant.id))]
    pub async fn get_youtube_video_data(
        &self,
        video_id: &str,
        ctx: &CallerContext,
    ) -> Result<VideoData> {
        let _guard = CallGuard::start();
        let payload = json!({ "video_id": video_id }).to_string();
        self.screen(&payload, ctx).await?;

        let video_id = sanitize_text_field(video_id);
        if video_id.is_empty() {
            return Err(self.security.reject_invalid("video_id is required", &ctx.origin).await);
        }

        self.admit(Endpoint::YoutubeData, &video_id, ctx).await?;

        let key = cache_key(CacheOperation::YoutubeData, &video_id, &[]);
        if let Some(video) = self.cache.get::<VideoData>(&key).await {
            self.audit_cache_hit(Endpoint::YoutubeData, &video_id, encoded_len(&video), ctx)
                .await;
            return Ok(video);
        }

        let selection = match self.youtube_keys.checkout().await {
            Ok(selection) => selection,
            Err(e) => return Err(self.audit_failure(Endpoint::YoutubeData, &video_id, 0, e, ctx).await),
        };

        let upstream = &self.config.upstream;
        let timeout = Duration::from_secs(upstream.youtube_timeout_secs);

        let exec = self
            .orchestrator
            .execute(
                &selection,
                RetryPolicy::single(),
                |credential| {
                    Ok(video_request(&upstream.youtube_url, &video_id, credential.secret(), timeout))
                },
                |response| match parse_video(response) {
                    VideoLookup::Found(video) => Ok(video),
                    VideoLookup::NotFound => Err(Error::not_found(format!("video {}", video_id))),
                    VideoLookup::Malformed => Err(Error::upstream(
                        502,
                        "Invalid response from video metadata service",
                    )),
                },
            )
            .await;

        let video = self
            .finish(Endpoint::YoutubeData, &video_id, exec, ctx, encoded_len)
            .await?;
        self.cache
            .put(&key, &video, self.config.cache.youtube_ttl())
            .await;
        Ok(video)
    }

    /// Applies a license-service rate limit class for a tenant.
    pub async fn check_rate_limit(
        &self,
        tenant: &Tenant,
        class: EndpointClass,
        origin: &RequestOrigin,
    ) -> Result<u64> {
        self.limiter.check_and_increment(tenant, class, origin).await
    }

    /// Screens a raw request before the caller is identified.
    ///
    /// `payload` may be empty when the body was too large to read.
    pub async fn screen_request(
        &self,
        payload: &str,
        body_size: usize,
        origin: &RequestOrigin,
    ) -> Result<()> {
        self.security
            .validate(RequestDescriptor {
                body_size,
                payload,
                origin,
            })
            .await
    }

    /// Operator cache invalidation.
    pub async fn clear_cache(&self, scope: CacheScope) -> Result<u64> {
        self.cache.clear(scope).await
    }

    /// Per-endpoint stats over the trailing stats window.
    pub async fn performance_stats(&self) -> Result<Vec<EndpointStats>> {
        self.audit.stats(self.config.audit.stats_window_hours).await
    }

    async fn screen(&self, payload: &str, ctx: &CallerContext) -> Result<()> {
        self.security
            .validate(RequestDescriptor {
                body_size: ctx.body_size.unwrap_or(payload.len()),
                payload,
                origin: &ctx.origin,
            })
            .await
    }

    /// Counts the call against the tenant's quota.
    ///
    /// Quota rejections leave a security event. Any other failure is an
    /// admitted call that failed, so it is audited.
    async fn admit(&self, endpoint: Endpoint, resource_id: &str, ctx: &CallerContext) -> Result<()> {
        match self
            .limiter
            .check_and_increment(&ctx.tenant, EndpointClass::Gateway, &ctx.origin)
            .await
        {
            Ok(_) => Ok(()),
            Err(e @ Error::RateLimitExceeded { .. }) => Err(e),
            Err(e) => Err(self.audit_failure(endpoint, resource_id, 0, e, ctx).await),
        }
    }

    fn record(&self, endpoint: Endpoint, resource_id: &str, ctx: &CallerContext) -> AuditRecord {
        AuditRecord::new(
            Some(&ctx.tenant.id),
            endpoint,
            resource_id,
            &ctx.origin,
            self.clock.now(),
        )
    }

    async fn audit_cache_hit(
        &self,
        endpoint: Endpoint,
        resource_id: &str,
        size: usize,
        ctx: &CallerContext,
    ) {
        debug!(endpoint = %endpoint, resource = %resource_id, "Served from cache");
        let record = self
            .record(endpoint, resource_id, ctx)
            .response_size(size as u64)
            .cache_hit(true);
        self.audit.record_call(record).await;
    }

    async fn audit_failure(
        &self,
        endpoint: Endpoint,
        resource_id: &str,
        attempts: u32,
        error: Error,
        ctx: &CallerContext,
    ) -> Error {
        metrics().gateway_errors.inc();
        let record = self
            .record(endpoint, resource_id, ctx)
            .status(error.http_status())
            .attempts(attempts);
        self.audit.record_call(record).await;
        error
    }

    /// Audits the terminal state of an orchestrated call.
    async fn finish<T, F>(
        &self,
        endpoint: Endpoint,
        resource_id: &str,
        exec: Execution<T>,
        ctx: &CallerContext,
        size_of: F,
    ) -> Result<T>
    where
        F: Fn(&T) -> usize,
    {
        match exec.outcome {
            Ok(value) => {
                let record = self
                    .record(endpoint, resource_id, ctx)
                    .status(exec.status.unwrap_or(200))
                    .response_size(size_of(&value) as u64)
                    .attempts(exec.attempts);
                self.audit.record_call(record).await;
                Ok(value)
            }
            Err(e) => Err(self
                .audit_failure(endpoint, resource_id, exec.attempts, e, ctx)
                .await),
        }
    }
}

fn encoded_len(video: &VideoData) -> usize {
    serde_json::to_string(video).map_or(0, |s| s.len())
}
