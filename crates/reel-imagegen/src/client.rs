//! Image source HTTP client.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reel_models::{FrameRequest, Resolution};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ImageGenError, ImageGenResult};
use crate::types::FrameImage;

pub const DEFAULT_IMAGE_SOURCE_URL: &str = "https://image.pollinations.ai";

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for the image source client.
#[derive(Debug, Clone)]
pub struct ImageSourceConfig {
    /// Base URL of the image service
    pub base_url: String,
    /// Optional bearer token
    pub api_token: Option<String>,
    /// Per-call timeout
    pub timeout: Duration,
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Backoff for the first retry, doubled each attempt
    pub retry_base_delay: Duration,
    /// Upper bound for any single backoff, including Retry-After
    pub retry_max_delay: Duration,
    /// Client-side request budget; 0 disables the limiter
    pub requests_per_second: u32,
    /// Ask the service to omit its watermark
    pub nologo: bool,
}

impl Default for ImageSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IMAGE_SOURCE_URL.to_string(),
            api_token: None,
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(10),
            requests_per_second: 0,
            nologo: true,
        }
    }
}

impl ImageSourceConfig {
    /// Create config from environment variables.
    ///
    /// Unset variables keep their defaults; a variable that is set but does
    /// not parse is an error naming the variable.
    pub fn from_env() -> ImageGenResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup, such as a parsed `.env` map.
    pub fn from_lookup<F>(lookup: F) -> ImageGenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            base_url: lookup("IMAGE_SOURCE_URL").unwrap_or(defaults.base_url),
            api_token: lookup("IMAGE_SOURCE_TOKEN"),
            timeout: Duration::from_secs(parse_var(&lookup, "IMAGE_SOURCE_TIMEOUT_SECS", defaults.timeout.as_secs())?),
            max_retries: parse_var(&lookup, "IMAGE_SOURCE_RETRIES", defaults.max_retries)?,
            retry_base_delay: Duration::from_millis(parse_var(
                &lookup,
                "IMAGE_SOURCE_RETRY_BASE_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )?),
            retry_max_delay: Duration::from_millis(parse_var(
                &lookup,
                "IMAGE_SOURCE_RETRY_MAX_MS",
                defaults.retry_max_delay.as_millis() as u64,
            )?),
            requests_per_second: parse_var(&lookup, "IMAGE_SOURCE_RPS", defaults.requests_per_second)?,
            nologo: defaults.nologo,
        })
    }

    /// Reject configurations that could never produce a request.
    pub fn validate(&self) -> ImageGenResult<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ImageGenError::invalid_config(format!("IMAGE_SOURCE_URL is not a valid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ImageGenError::invalid_config(format!(
                "IMAGE_SOURCE_URL must be http or https, got {}",
                url.scheme()
            )));
        }
        if let Some(token) = &self.api_token {
            if token.trim().is_empty() {
                return Err(ImageGenError::invalid_config("IMAGE_SOURCE_TOKEN is set but empty"));
            }
        }
        if self.timeout.is_zero() {
            return Err(ImageGenError::invalid_config("timeout must be greater than zero"));
        }
        if self.retry_base_delay > self.retry_max_delay {
            return Err(ImageGenError::invalid_config(
                "retry base delay exceeds retry max delay",
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> ImageGenResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|raw| !raw.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ImageGenError::invalid_config(format!("{} has invalid value {:?}: {}", key, raw, e))),
    }
}

/// Client for the prompt-to-image service.
pub struct ImageSourceClient {
    http: Client,
    config: ImageSourceConfig,
    limiter: Option<DirectLimiter>,
}

impl ImageSourceClient {
    /// Create a new client after validating the configuration.
    pub fn new(config: ImageSourceConfig) -> ImageGenResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ImageGenError::Network)?;

        let limiter = NonZeroU32::new(config.requests_per_second)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self { http, config, limiter })
    }

    /// Create from environment variables.
    pub fn from_env() -> ImageGenResult<Self> {
        Self::new(ImageSourceConfig::from_env()?)
    }

    pub fn config(&self) -> &ImageSourceConfig {
        &self.config
    }

    /// Build the upstream URL for one frame.
    ///
    /// The prompt is percent-encoded as a single path segment, so `/`, `?`,
    /// `#` and `&` in user text can never alter the path or query.
    pub fn frame_url(&self, request: &FrameRequest, resolution: Resolution) -> ImageGenResult<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let encoded = urlencoding::encode(&request.prompt);
        let mut url = Url::parse(&format!("{}/prompt/{}", base, encoded))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("seed", &request.seed.to_string())
                .append_pair("width", &resolution.width.to_string())
                .append_pair("height", &resolution.height.to_string());
            if self.config.nologo {
                query.append_pair("nologo", "true");
            }
        }

        Ok(url)
    }

    /// Fetch the image for one frame, retrying transient failures.
    pub async fn fetch_frame(
        &self,
        request: &FrameRequest,
        resolution: Resolution,
    ) -> ImageGenResult<FrameImage> {
        let url = self.frame_url(request, resolution)?;

        debug!(frame_index = request.index, "Requesting frame from {}", url.path());

        self.with_retry(request.index, || self.fetch_once(&url)).await
    }

    async fn fetch_once(&self, url: &Url) -> ImageGenResult<FrameImage> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let mut builder = self.http.get(url.clone());
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ImageGenError::from_reqwest(e, self.config.timeout))?;

        let response = check_status(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageGenError::from_reqwest(e, self.config.timeout))?;

        FrameImage::from_bytes(bytes.to_vec())
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, frame_index: u32, operation: F) -> ImageGenResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ImageGenResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt, &e);
                    warn!(
                        frame_index,
                        "Frame request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, attempt: u32, error: &ImageGenError) -> Duration {
        let exponential = self
            .config
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt));

        let delay = match error {
            ImageGenError::RateLimited {
                retry_after: Some(after),
            } => *after,
            _ => exponential,
        };

        delay.min(self.config.retry_max_delay)
    }
}

async fn check_status(response: Response) -> ImageGenResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ImageGenError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(200).collect();
    Err(ImageGenError::Status {
        status: status.as_u16(),
        body,
    })
}
