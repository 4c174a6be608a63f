//! The generation endpoint, independent of any HTTP framework.
//!
//! `handle` walks one request through validation, generation and response
//! mapping; the server module only translates to and from actix types.

use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    logger::RequestTimer,
    models::{GenerationRequest, HealthReport, ImageSize, KeyCheckReport},
    provider::{GenerationError, ProviderClient},
};

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET,POST,OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

const KEY_CHECK_METHODS: &str = "GET,OPTIONS";

/// Failures the endpoint answers without consulting the provider, plus
/// classified provider failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Missing OPENAI_API_KEY env var")]
    MissingCredential,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("{}", .0.message())]
    Generation(GenerationError),
}

impl ServiceError {
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::MissingCredential => 500,
            ServiceError::MethodNotAllowed => 405,
            ServiceError::Generation(e) => e.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl EndpointResponse {
    fn new(status: u16) -> Self {
        Self {
            status,
            headers: CORS_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Vec::new(),
        }
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        match self.headers.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.into(),
            None => self.headers.push((name.to_string(), value.into())),
        }
        self
    }

    fn json<T: serde::Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            body,
            ..Self::new(status).header("Content-Type", "application/json")
        }
    }

    fn text(status: u16, message: impl Into<String>) -> Self {
        Self {
            body: message.into().into_bytes(),
            ..Self::new(status).header("Content-Type", "text/plain; charset=utf-8")
        }
    }

    fn from_error(error: &ServiceError) -> Self {
        Self::text(error.status(), error.to_string())
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone)]
pub struct GenerationEndpoint {
    provider: ProviderClient,
}

impl GenerationEndpoint {
    pub fn new(provider: ProviderClient) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            ok: true,
            has_key: self.provider.has_key(),
            allowed_sizes: ImageSize::allowed(),
            note: Some("POST to generate; responds fast to avoid client timeouts.".to_string()),
        }
    }

    pub async fn handle(&self, method: &str, body: &[u8]) -> EndpointResponse {
        let request_id = Uuid::new_v4().to_string();
        let method = method.to_ascii_uppercase();

        match method.as_str() {
            "OPTIONS" => return EndpointResponse::new(204),
            "GET" => return EndpointResponse::json(200, &self.health()),
            "POST" => {}
            other => {
                log::warn!("[req:{}] Rejected {} request", request_id, other);
                return EndpointResponse::from_error(&ServiceError::MethodNotAllowed);
            }
        }

        if !self.provider.has_key() {
            log::error!("[req:{}] No provider credential configured", request_id);
            return EndpointResponse::from_error(&ServiceError::MissingCredential);
        }

        let _timer = RequestTimer::new(&request_id, "image generation");
        let started = Instant::now();
        let request = GenerationRequest::from_body(body);
        log::info!(
            "[req:{}] Generating {} image",
            request_id,
            request.resolved_size()
        );

        match self.provider.image().generate(&request).await {
            Ok(png) => {
                let elapsed = started.elapsed().as_millis().to_string();
                EndpointResponse {
                    body: png,
                    ..EndpointResponse::new(200)
                        .header("Content-Type", "image/png")
                        .header("Cache-Control", "no-store")
                        .header("X-Elapsed", elapsed)
                }
            }
            Err(error) => {
                log::warn!("[req:{}] Answering {}: {}", request_id, error.status(), error.message());
                EndpointResponse::from_error(&ServiceError::Generation(error))
            }
        }
    }

    /// Key diagnostics. Answers 200 for every GET, success or not.
    pub async fn handle_key_check(&self, method: &str) -> EndpointResponse {
        let response = match method.to_ascii_uppercase().as_str() {
            "OPTIONS" => EndpointResponse::new(204),
            "GET" => {
                let report: KeyCheckReport = self.provider.check_key().await;
                EndpointResponse::json(200, &report)
            }
            _ => EndpointResponse::from_error(&ServiceError::MethodNotAllowed),
        };
        response.header("Access-Control-Allow-Methods", KEY_CHECK_METHODS)
    }
}
