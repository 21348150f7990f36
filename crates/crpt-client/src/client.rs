//! HTTP client for the "create document" endpoint.
//!
//! Every submission first takes a slot from the shared [`RateLimiter`], so
//! clones of one client (or clients built with the same limiter) never
//! exceed the configured request rate together.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crpt_limiter::RateLimiter;

use crate::config::Config;
use crate::document::Document;
use crate::error::ClientResult;

const SIGNATURE_HEADER: &str = "Signature";
const JSON_UTF8: &str = "application/json;charset=UTF-8";

/// What the server answered.
///
/// Any status is a successful exchange; interpreting 4xx/5xx is up to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub status: u16,
    pub body: String,
}

impl Submission {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Rate-limited CRPT API client.
///
/// Wraps a [`reqwest::Client`] configured with the user-agent and timeout
/// from [`Config`], and an `Arc<RateLimiter>` allowing
/// `request_limit` requests per `time_unit`.
#[derive(Debug, Clone)]
pub struct CrptClient {
    http: Client,
    api_url: String,
    limiter: Arc<RateLimiter>,
}

impl CrptClient {
    /// Create a client with its own limiter built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: &Config) -> ClientResult<Self> {
        config.validate()?;
        let limiter = RateLimiter::new(config.request_limit, config.window())?;
        Self::with_limiter(config, Arc::new(limiter))
    }

    /// Create a client that shares an existing limiter.
    pub fn with_limiter(config: &Config, limiter: Arc<RateLimiter>) -> ClientResult<Self> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(concat!("crpt/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Submit a document, waiting as long as it takes for a rate-limit slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or the HTTP
    /// exchange fails. Non-2xx responses are returned as a [`Submission`].
    pub async fn create_document(
        &self,
        document: &Document,
        signature: &str,
    ) -> ClientResult<Submission> {
        // Serialize before taking a slot so a bad payload never burns one.
        let body = serde_json::to_string(document)?;
        self.limiter.acquire().await?;
        self.post(body, signature).await
    }

    /// Submit a document, giving up if no slot frees within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Limiter`](crate::ClientError::Limiter) if the
    /// wait times out (nothing was sent), otherwise as
    /// [`create_document`](Self::create_document).
    pub async fn create_document_within(
        &self,
        document: &Document,
        signature: &str,
        timeout: Duration,
    ) -> ClientResult<Submission> {
        let body = serde_json::to_string(document)?;
        self.limiter.acquire_timeout(timeout).await?;
        self.post(body, signature).await
    }

    async fn post(&self, body: String, signature: &str) -> ClientResult<Submission> {
        log::debug!("POST {} ({} bytes)", self.api_url, body.len());

        let response = self
            .http
            .post(&self.api_url)
            .header(SIGNATURE_HEADER, signature)
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        log::info!("{} answered {}", self.api_url, status);

        Ok(Submission { status, body })
    }
}
