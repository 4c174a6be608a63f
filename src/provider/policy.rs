//! Failure classification and the retry schedule for provider calls.
//!
//! Permanent account problems (key, billing, verification) fail on the first
//! attempt; rate limits, 5xx and network blips are retried within a fixed
//! budget, size by size.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt;
use std::time::Duration;

use crate::config::RetryPolicyConfig;
use crate::models::{ImagePayload, ImageSize, ProviderImageResponse};
use crate::provider::transport::{RawResponse, TransportError};

const VERIFICATION_MARKER: &str = "must be verified";
const BILLING_MARKER: &str = "billing_hard_limit_reached";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationErrorKind {
    InvalidKey,
    Forbidden,
    BillingLimit,
    Timeout,
    RateLimited,
    UpstreamServerError,
    UpstreamClientError,
    NoImageReturned,
    Network,
}

impl GenerationErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationErrorKind::RateLimited
                | GenerationErrorKind::UpstreamServerError
                | GenerationErrorKind::Network
        )
    }
}

/// A classified generation failure. Only this module builds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError {
    kind: GenerationErrorKind,
    status: u16,
    message: String,
}

impl GenerationError {
    fn new(kind: GenerationErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> GenerationErrorKind {
        self.kind
    }

    /// HTTP status the endpoint answers with.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn exhausted(last_cause: Option<&GenerationError>) -> Self {
        let mut message =
            "OpenAI request timed out quickly (fast-fail). Try again or use gradient fallback.".to_string();
        if let Some(cause) = last_cause {
            message.push_str(&format!(" Last failure: {}", cause.message));
        }
        Self::new(GenerationErrorKind::Timeout, 504, message)
    }

    pub(crate) fn no_image() -> Self {
        Self::new(GenerationErrorKind::NoImageReturned, 502, "No image returned from OpenAI")
    }

    pub(crate) fn download_failed(detail: impl fmt::Display) -> Self {
        Self::new(
            GenerationErrorKind::Network,
            502,
            format!("Could not download generated image: {}", detail),
        )
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for GenerationError {}

/// What one provider outcome means, before the retry budget is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Image(ImagePayload),
    Transient(GenerationError),
    Permanent(GenerationError),
}

/// What the retry loop does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Succeed(ImagePayload),
    Retry { after: Duration, cause: GenerationError },
    FailFast(GenerationError),
}

pub fn classify(outcome: &Result<RawResponse, TransportError>) -> Classification {
    let response = match outcome {
        Ok(response) => response,
        Err(e) if e.is_transient() => {
            return Classification::Transient(GenerationError::new(
                GenerationErrorKind::Network,
                502,
                format!("Network error reaching OpenAI: {}", e),
            ))
        }
        Err(e) => {
            return Classification::Permanent(GenerationError::new(
                GenerationErrorKind::Network,
                502,
                format!("Network error reaching OpenAI: {}", e),
            ))
        }
    };

    let status = response.status;
    let body = response.text();
    let lowered = body.to_lowercase();

    if status == 401 {
        return Classification::Permanent(GenerationError::new(
            GenerationErrorKind::InvalidKey,
            401,
            "Invalid or missing API key",
        ));
    }
    if status == 403 && lowered.contains(VERIFICATION_MARKER) {
        return Classification::Permanent(GenerationError::new(
            GenerationErrorKind::Forbidden,
            403,
            "Org not verified for gpt-image-1 yet. Verify in OpenAI dashboard and retry.",
        ));
    }
    if status == 402 || lowered.contains(BILLING_MARKER) {
        return Classification::Permanent(GenerationError::new(
            GenerationErrorKind::BillingLimit,
            402,
            "OpenAI billing hard limit reached on this account.",
        ));
    }
    if status == 429 {
        return Classification::Transient(GenerationError::new(
            GenerationErrorKind::RateLimited,
            429,
            "OpenAI rate limited the request (429)",
        ));
    }
    if (500..600).contains(&status) {
        return Classification::Transient(GenerationError::new(
            GenerationErrorKind::UpstreamServerError,
            status,
            format!("OpenAI server error {}", status),
        ));
    }
    if !response.is_success() {
        return Classification::Permanent(GenerationError::new(
            GenerationErrorKind::UpstreamClientError,
            status.max(400),
            format!("OpenAI error {}: {}", status, body),
        ));
    }

    match extract_payload(&response.body) {
        Some(payload) => Classification::Image(payload),
        None => Classification::Permanent(GenerationError::no_image()),
    }
}

/// First usable image of a 2xx body: inline base64 wins over a URL.
fn extract_payload(body: &[u8]) -> Option<ImagePayload> {
    let parsed: ProviderImageResponse = serde_json::from_slice(body).ok()?;
    let first = parsed.data.into_iter().next()?;

    if let Some(b64) = first.b64_json.filter(|s| !s.is_empty()) {
        return BASE64
            .decode(b64.as_bytes())
            .ok()
            .filter(|bytes| !bytes.is_empty())
            .map(ImagePayload::Inline);
    }
    first
        .url
        .filter(|u| !u.is_empty())
        .map(ImagePayload::Remote)
}

/// One planned provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    pub size: ImageSize,
    pub delay_before: Duration,
}

/// Ordered attempts for one request: sizes outer, attempts inner.
#[derive(Debug, Clone)]
pub struct RetryPlan {
    attempts: Vec<RetryAttempt>,
}

impl RetryPlan {
    pub fn new(requested: ImageSize, config: &RetryPolicyConfig) -> Self {
        let mut sizes = vec![requested];
        for size in &config.fallback_sizes {
            if !sizes.contains(size) {
                sizes.push(*size);
            }
        }
        Self::for_sizes(&sizes, config)
    }

    pub fn for_sizes(sizes: &[ImageSize], config: &RetryPolicyConfig) -> Self {
        let per_size = config.max_attempts_per_size.max(1);
        let mut attempts = Vec::with_capacity(sizes.len() * per_size as usize);
        for size in sizes {
            for attempt_number in 1..=per_size {
                attempts.push(RetryAttempt {
                    attempt_number,
                    size: *size,
                    delay_before: config.base_delay * (attempt_number - 1),
                });
            }
        }
        Self { attempts }
    }

    pub fn attempts(&self) -> &[RetryAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// Combines a classification with what is left of the plan.
///
/// `next` is the attempt that would follow; `None` means the budget is spent.
pub fn decide(classification: Classification, next: Option<&RetryAttempt>) -> Decision {
    match classification {
        Classification::Image(payload) => Decision::Succeed(payload),
        Classification::Permanent(error) => Decision::FailFast(error),
        Classification::Transient(cause) => match next {
            Some(attempt) => Decision::Retry {
                after: attempt.delay_before,
                cause,
            },
            None => Decision::FailFast(GenerationError::exhausted(Some(&cause))),
        },
    }
}
