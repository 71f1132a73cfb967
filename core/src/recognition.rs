//! Photo-to-record pipeline: credential check, shared rate limit, base64
//! encoding, remote call with per-attempt timeout and linear backoff,
//! response validation, record construction.
//!
//! A remote failure that survives the retry budget is always surfaced to the
//! caller. There is no fallback to a locally chosen record.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Local;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::gemini::{self, GenerateRequest};
use crate::models::{Food, NewFood};

const RECOGNIZED_ID_PREFIX: &str = "food";
const SESSION_IMAGE_SCHEME: &str = "session-image://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub api_key: Option<String>,
    pub max_requests_per_window: u32,
    pub window: Duration,
    pub timeout: Duration,
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_requests_per_window: 50,
            window: Duration::from_millis(60_000),
            timeout: Duration::from_millis(30_000),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1_000),
        }
    }
}

/// Failure of a single remote attempt. Every variant counts against the
/// retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    /// Body or candidate text that is not the expected JSON at all.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Parseable JSON with missing or invalid fields.
    #[error("invalid response shape: {0}")]
    Shape(String),
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("no API key configured for the inference service (set GEMINI_API_KEY)")]
    MissingCredentials,
    #[error("image is empty")]
    EmptyImage,
    #[error("recognition rate limit reached; try again in {}s", retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },
    #[error("food recognition failed after {attempts} attempt(s): {source}")]
    RemoteCallFailed {
        attempts: u32,
        #[source]
        source: AttemptError,
    },
    #[error("food recognition returned an invalid response after {attempts} attempt(s): {reason}")]
    InvalidResponseShape { attempts: u32, reason: String },
}

impl RecognitionError {
    fn from_final_attempt(attempts: u32, err: AttemptError) -> Self {
        match err {
            AttemptError::Shape(reason) => Self::InvalidResponseShape { attempts, reason },
            source => Self::RemoteCallFailed { attempts, source },
        }
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

pub struct InferenceRequest {
    pub api_key: String,
    pub body: GenerateRequest,
}

/// Transport to the remote inference service. Returns the raw response body
/// on a success status; everything else is an `AttemptError`.
pub trait VisionTransport: Send + Sync {
    fn generate(
        &self,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<String, AttemptError>> + Send;
}

impl<T: VisionTransport> VisionTransport for Arc<T> {
    fn generate(
        &self,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<String, AttemptError>> + Send {
        (**self).generate(request)
    }
}

#[derive(Debug)]
struct RateWindow {
    count: u32,
    started: Instant,
}

/// Fixed-window request counter shared by every call of a pipeline.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(RateWindow {
                count: 0,
                started: Instant::now(),
            }),
        }
    }

    /// Check and take one slot under a single lock. On refusal, returns how
    /// long until the current window ends.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now.saturating_duration_since(state.started);
        if elapsed > self.window {
            state.count = 0;
            state.started = now;
        }
        if state.count >= self.max_requests {
            let elapsed = now.saturating_duration_since(state.started);
            return Err(self.window.saturating_sub(elapsed));
        }
        state.count += 1;
        Ok(())
    }

    /// Slots taken in the current window.
    #[must_use]
    pub fn used(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }
}

/// Process-lifetime registry behind `Food::image_url` handles.
#[derive(Debug, Default)]
pub struct SessionImages {
    images: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl SessionImages {
    pub fn register(&self, bytes: Arc<[u8]>) -> String {
        let handle = format!("{SESSION_IMAGE_SCHEME}{}", Uuid::new_v4());
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone(), bytes);
        handle
    }

    #[must_use]
    pub fn get(&self, handle: &str) -> Option<Arc<[u8]>> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Recognizer<T> {
    transport: T,
    config: RecognitionConfig,
    limiter: Arc<RateLimiter>,
    images: Arc<SessionImages>,
}

impl<T: VisionTransport> Recognizer<T> {
    pub fn new(transport: T, config: RecognitionConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.max_requests_per_window,
            config.window,
        ));
        Self {
            transport,
            config,
            limiter,
            images: Arc::new(SessionImages::default()),
        }
    }

    /// Share a limiter with other pipelines instead of owning a fresh one.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn session_images(&self) -> &Arc<SessionImages> {
        &self.images
    }

    /// Turn image bytes into a validated, freshly stamped record.
    ///
    /// One rate-limit slot is consumed per call, however many attempts the
    /// retry loop makes.
    pub async fn recognize(&self, image: &[u8]) -> Result<Food, RecognitionError> {
        let api_key = match self.config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(RecognitionError::MissingCredentials),
        };
        if image.is_empty() {
            return Err(RecognitionError::EmptyImage);
        }
        if let Err(retry_after) = self.limiter.try_acquire() {
            warn!(retry_after_ms = duration_ms(retry_after), "Recognition rate limited");
            return Err(RecognitionError::RateLimited { retry_after });
        }

        let mime_type = gemini::sniff_mime_type(image);
        let request = InferenceRequest {
            api_key,
            body: GenerateRequest::for_image(BASE64.encode(image), mime_type),
        };

        let new_food = self.call_with_retry(&request).await?;

        let mut food = new_food.into_food(RECOGNIZED_ID_PREFIX, Local::now());
        food.image_url = Some(self.images.register(Arc::from(image)));
        info!(id = %food.id, name = %food.name, "Recognized food");
        Ok(food)
    }

    async fn call_with_retry(&self, request: &InferenceRequest) -> Result<NewFood, RecognitionError> {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            debug!(attempt, max_attempts, "Sending recognition request");
            match self.attempt(request).await {
                Ok(food) => return Ok(food),
                Err(err) if attempt >= max_attempts => {
                    error!(attempts = attempt, error = %err, "Recognition retries exhausted");
                    return Err(RecognitionError::from_final_attempt(attempt, err));
                }
                Err(err) => {
                    let delay = self.config.retry_base_delay * attempt;
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = duration_ms(delay),
                        error = %err,
                        "Recognition attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, request: &InferenceRequest) -> Result<NewFood, AttemptError> {
        let body = tokio::time::timeout(self.config.timeout, self.transport.generate(request))
            .await
            .map_err(|_| AttemptError::Timeout(self.config.timeout))??;
        let payload = gemini::extract_payload(&body)?;
        gemini::validate_payload(&payload)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    const OATMEAL: &str = r#"{"name":"Oatmeal","calories":158,"carbs":27,"protein":6,"fat":3.2,"servingSize":"1 cup cooked (234g)"}"#;

    fn fenced_reply(json: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": format!("```json\n{json}\n```") }] } }]
        })
        .to_string()
    }

    fn server_error() -> AttemptError {
        AttemptError::Status {
            status: 503,
            body: "overloaded".to_string(),
        }
    }

    /// Replays scripted replies in order, then repeats the last one.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<String, AttemptError>>>,
        last: Mutex<Option<Result<String, AttemptError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<String, AttemptError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
            }
        }

        fn always(reply: Result<String, AttemptError>) -> Self {
            Self::new(vec![reply])
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl VisionTransport for ScriptedTransport {
        async fn generate(&self, request: &InferenceRequest) -> Result<String, AttemptError> {
            assert!(!request.api_key.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(reply) = next {
                *last = Some(reply);
            }
            last.clone().expect("script must not be empty")
        }
    }

    struct HangingTransport {
        calls: AtomicU32,
    }

    impl VisionTransport for HangingTransport {
        async fn generate(&self, _request: &InferenceRequest) -> Result<String, AttemptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn config() -> RecognitionConfig {
        RecognitionConfig {
            api_key: Some("test-key".to_string()),
            ..RecognitionConfig::default()
        }
    }

    fn recognizer(script: ScriptedTransport) -> (Recognizer<Arc<ScriptedTransport>>, Arc<ScriptedTransport>) {
        let transport = Arc::new(script);
        (Recognizer::new(Arc::clone(&transport), config()), transport)
    }

    const IMAGE: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];

    #[tokio::test(start_paused = true)]
    async fn test_recognize_success_builds_record() {
        let (rec, transport) = recognizer(ScriptedTransport::always(Ok(fenced_reply(OATMEAL))));

        let food = rec.recognize(IMAGE).await.unwrap();
        assert_eq!(food.name, "Oatmeal");
        assert!((food.calories - 158.0).abs() < f64::EPSILON);
        assert_eq!(food.serving_size, "1 cup cooked (234g)");
        assert!(food.id.starts_with("food_"));
        assert_eq!(transport.calls(), 1);

        let handle = food.image_url.as_deref().unwrap();
        assert!(handle.starts_with("session-image://"));
        assert_eq!(rec.session_images().get(handle).unwrap().as_ref(), IMAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognize_accepts_direct_payload() {
        let (rec, _) = recognizer(ScriptedTransport::always(Ok(OATMEAL.to_string())));
        assert_eq!(rec.recognize(IMAGE).await.unwrap().name, "Oatmeal");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognize_succeeds_on_third_attempt() {
        let (rec, transport) = recognizer(ScriptedTransport::new(vec![
            Err(AttemptError::Network("connection reset".to_string())),
            Err(server_error()),
            Ok(fenced_reply(OATMEAL)),
        ]));

        let start = Instant::now();
        let food = rec.recognize(IMAGE).await.unwrap();
        assert_eq!(food.name, "Oatmeal");
        assert_eq!(transport.calls(), 3);
        // 1s after attempt 1, 2s after attempt 2
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(rec.rate_limiter().used(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognize_exhausts_retries() {
        let (rec, transport) = recognizer(ScriptedTransport::always(Err(server_error())));

        let start = Instant::now();
        let err = rec.recognize(IMAGE).await.unwrap_err();
        match err {
            RecognitionError::RemoteCallFailed { attempts, source } => {
                assert_eq!(attempts, 4);
                assert_eq!(source, server_error());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.calls(), 4);
        assert_eq!(rec.rate_limiter().used(), 1);
        // 1s + 2s + 3s of backoff
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert!(start.elapsed() < Duration::from_secs(7));
        assert!(rec.session_images().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_is_retried() {
        let bad = r#"{"name":"Oatmeal","calories":"lots","carbs":27,"protein":6,"fat":3.2,"servingSize":"1 cup"}"#;
        let (rec, transport) = recognizer(ScriptedTransport::new(vec![
            Ok(fenced_reply(bad)),
            Ok(fenced_reply(OATMEAL)),
        ]));
        assert_eq!(rec.recognize(IMAGE).await.unwrap().name, "Oatmeal");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_bad_shape_is_invalid_response_shape() {
        let bad = r#"{"name":"","calories":1,"carbs":1,"protein":1,"fat":1,"servingSize":"1"}"#;
        let (rec, transport) = recognizer(ScriptedTransport::always(Ok(fenced_reply(bad))));
        let err = rec.recognize(IMAGE).await.unwrap_err();
        assert!(matches!(
            err,
            RecognitionError::InvalidResponseShape { attempts: 4, .. }
        ));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_prose_is_remote_call_failed() {
        let (rec, _) = recognizer(ScriptedTransport::always(Ok(fenced_reply("looks tasty"))));
        let err = rec.recognize(IMAGE).await.unwrap_err();
        assert!(matches!(
            err,
            RecognitionError::RemoteCallFailed {
                source: AttemptError::Malformed(_),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let transport = HangingTransport {
            calls: AtomicU32::new(0),
        };
        let rec = Recognizer::new(
            transport,
            RecognitionConfig {
                max_retries: 1,
                ..config()
            },
        );
        let start = Instant::now();
        let err = rec.recognize(IMAGE).await.unwrap_err();
        assert!(matches!(
            err,
            RecognitionError::RemoteCallFailed {
                attempts: 2,
                source: AttemptError::Timeout(_)
            }
        ));
        assert_eq!(rec.transport.calls.load(Ordering::SeqCst), 2);
        // two 30s timeouts plus one 1s backoff
        assert!(start.elapsed() >= Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credentials_fails_fast() {
        let transport = Arc::new(ScriptedTransport::always(Ok(OATMEAL.to_string())));
        for key in [None, Some(String::new()), Some("   ".to_string())] {
            let rec = Recognizer::new(
                Arc::clone(&transport),
                RecognitionConfig {
                    api_key: key,
                    ..RecognitionConfig::default()
                },
            );
            let err = rec.recognize(IMAGE).await.unwrap_err();
            assert!(matches!(err, RecognitionError::MissingCredentials));
            assert_eq!(rec.rate_limiter().used(), 0);
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_image_rejected() {
        let (rec, transport) = recognizer(ScriptedTransport::always(Ok(OATMEAL.to_string())));
        assert!(matches!(
            rec.recognize(&[]).await.unwrap_err(),
            RecognitionError::EmptyImage
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_blocks_without_network_call() {
        let (rec, transport) = recognizer(ScriptedTransport::always(Ok(OATMEAL.to_string())));

        for _ in 0..50 {
            rec.recognize(IMAGE).await.unwrap();
        }
        assert_eq!(transport.calls(), 50);

        let err = rec.recognize(IMAGE).await.unwrap_err();
        let retry_after = err.retry_after().unwrap();
        assert!(retry_after <= Duration::from_secs(60));
        assert!(retry_after > Duration::ZERO);
        assert_eq!(transport.calls(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_window_resets() {
        let limiter = RateLimiter::new(2, Duration::from_millis(60_000));
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(30_000)).await;
        assert_eq!(
            limiter.try_acquire().unwrap_err(),
            Duration::from_millis(30_000)
        );

        tokio::time::advance(Duration::from_millis(30_001)).await;
        assert!(limiter.try_acquire().is_ok());
        assert_eq!(limiter.used(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_rate_limiter_across_pipelines() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let (a, _) = recognizer(ScriptedTransport::always(Ok(OATMEAL.to_string())));
        let (b, b_transport) = recognizer(ScriptedTransport::always(Ok(OATMEAL.to_string())));
        let a = a.with_rate_limiter(Arc::clone(&limiter));
        let b = b.with_rate_limiter(Arc::clone(&limiter));

        a.recognize(IMAGE).await.unwrap();
        assert!(matches!(
            b.recognize(IMAGE).await.unwrap_err(),
            RecognitionError::RateLimited { .. }
        ));
        assert_eq!(b_transport.calls(), 0);
    }

    #[test]
    fn test_session_images_register_and_get() {
        let images = SessionImages::default();
        assert!(images.is_empty());
        let jpeg = images.register(Arc::from(&b"jpeg"[..]));
        let png = images.register(Arc::from(&b"png"[..]));
        assert_ne!(jpeg, png);
        assert_eq!(images.len(), 2);
        assert_eq!(images.get(&jpeg).unwrap().as_ref(), b"jpeg");
        assert!(images.get("session-image://missing").is_none());
    }

    #[test]
    fn test_default_config() {
        let cfg = RecognitionConfig::default();
        assert_eq!(cfg.max_requests_per_window, 50);
        assert_eq!(cfg.window, Duration::from_millis(60_000));
        assert_eq!(cfg.timeout, Duration::from_millis(30_000));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_base_delay, Duration::from_millis(1_000));
        assert!(cfg.api_key.is_none());
    }
}
