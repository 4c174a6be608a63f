//! Client-side lookup of the generation endpoint.
//!
//! The endpoint's location is treated as possibly stale: the first path that
//! answers a health probe is cached, and a 404 on that path later triggers one
//! re-discovery.

use async_trait::async_trait;
use reqwest::{header, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{
    endpoint::GenerationEndpoint,
    models::GenerationRequest,
    provider::transport::{map_reqwest_error, RawResponse, TransportError},
};

pub const DEFAULT_CANDIDATES: [&str; 4] = [
    "/.netlify/functions/image-gen",
    "/.netlify/functions/openai-image",
    "/.netlify/functions/img-gen",
    LOCAL_PATH,
];

/// Path the bundled server mounts the generation endpoint on.
pub const LOCAL_PATH: &str = "/api/image";

/// How the client reaches candidate endpoints.
#[async_trait]
pub trait EndpointGateway: Send + Sync {
    /// Health probe: `GET`, true on any 2xx.
    async fn probe(&self, path: &str) -> bool;

    async fn post_json(&self, path: &str, body: &GenerationRequest) -> Result<RawResponse, TransportError>;
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl EndpointGateway for HttpGateway {
    async fn probe(&self, path: &str) -> bool {
        let result = self
            .client
            .get(self.url(path))
            .header(header::CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await;
        matches!(result, Ok(response) if response.status().is_success())
    }

    async fn post_json(&self, path: &str, body: &GenerationRequest) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(RawResponse::new(status, bytes.to_vec()))
    }
}

/// Serves one path from an in-process [`GenerationEndpoint`], for callers
/// that hold the provider credential themselves.
pub struct LocalGateway {
    endpoint: GenerationEndpoint,
    path: String,
}

impl LocalGateway {
    pub fn new(endpoint: GenerationEndpoint) -> Self {
        Self::at(endpoint, LOCAL_PATH)
    }

    pub fn at(endpoint: GenerationEndpoint, path: impl Into<String>) -> Self {
        Self {
            endpoint,
            path: path.into(),
        }
    }
}

#[async_trait]
impl EndpointGateway for LocalGateway {
    async fn probe(&self, path: &str) -> bool {
        path == self.path && (200..300).contains(&self.endpoint.handle("GET", b"").await.status)
    }

    async fn post_json(&self, path: &str, body: &GenerationRequest) -> Result<RawResponse, TransportError> {
        if path != self.path {
            return Ok(RawResponse::new(404, b"Not Found".to_vec()));
        }
        let payload = serde_json::to_vec(body).map_err(|e| TransportError::Other(e.to_string()))?;
        let response = self.endpoint.handle("POST", &payload).await;
        Ok(RawResponse::new(response.status, response.body))
    }
}

/// The one cached endpoint path, if any.
#[derive(Debug, Default, Clone)]
pub struct EndpointRegistry {
    cached: Option<String>,
}

impl EndpointRegistry {
    pub fn get(&self) -> Option<&str> {
        self.cached.as_deref()
    }

    fn set(&mut self, path: &str) {
        self.cached = Some(path.to_string());
    }

    fn invalidate(&mut self) {
        self.cached = None;
    }
}

pub struct EndpointDiscovery {
    gateway: Arc<dyn EndpointGateway>,
    candidates: Vec<String>,
    registry: Mutex<EndpointRegistry>,
}

impl EndpointDiscovery {
    pub fn new(gateway: Arc<dyn EndpointGateway>) -> Self {
        Self::with_candidates(gateway, DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_candidates(gateway: Arc<dyn EndpointGateway>, candidates: Vec<String>) -> Self {
        Self {
            gateway,
            candidates,
            registry: Mutex::new(EndpointRegistry::default()),
        }
    }

    pub fn cached(&self) -> Option<String> {
        self.registry
            .lock()
            .ok()
            .and_then(|r| r.get().map(|s| s.to_string()))
    }

    fn remember(&self, path: Option<&str>) {
        if let Ok(mut registry) = self.registry.lock() {
            match path {
                Some(path) => registry.set(path),
                None => registry.invalidate(),
            }
        }
    }

    /// Probes every candidate in order. `None` is a normal outcome.
    pub async fn discover(&self) -> Option<String> {
        for candidate in &self.candidates {
            if self.gateway.probe(candidate).await {
                log::info!("AI endpoint: {}", candidate);
                self.remember(Some(candidate));
                return Some(candidate.clone());
            }
            log::debug!("No endpoint at {}", candidate);
        }
        log::warn!("No AI endpoint found among {} candidates", self.candidates.len());
        self.remember(None);
        None
    }

    /// Cached endpoint, or a fresh discovery when nothing is cached.
    pub async fn resolve(&self) -> Option<String> {
        match self.cached() {
            Some(path) => Some(path),
            None => self.discover().await,
        }
    }

    /// Posts to the resolved endpoint; a 404 there re-discovers once and, if
    /// a different endpoint turns up, retries the request on it.
    pub async fn post(&self, body: &GenerationRequest) -> Result<Option<(String, RawResponse)>, TransportError> {
        let endpoint = match self.resolve().await {
            Some(endpoint) => endpoint,
            None => return Ok(None),
        };

        log::info!("POST {}", endpoint);
        let response = self.gateway.post_json(&endpoint, body).await?;
        if response.status != 404 {
            return Ok(Some((endpoint, response)));
        }

        log::warn!("{} answered 404, re-discovering", endpoint);
        match self.discover().await {
            Some(fresh) if fresh != endpoint => {
                log::info!("Retrying on {}", fresh);
                let retry = self.gateway.post_json(&fresh, body).await?;
                Ok(Some((fresh, retry)))
            }
            _ => Ok(Some((endpoint, response))),
        }
    }
}

/// What a generation attempt produced, from the client's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    Image { bytes: Vec<u8>, endpoint: String },
    /// Temporary unavailability: billing, verification, upstream timeout,
    /// network failure, or no endpoint at all.
    Unavailable {
        status: Option<u16>,
        detail: String,
        endpoint: Option<String>,
    },
    Failed {
        status: u16,
        detail: String,
        endpoint: String,
    },
}

const RECOVERABLE_STATUSES: [u16; 3] = [402, 403, 504];

/// Drives generation requests through discovery, one at a time.
pub struct GenerationClient {
    discovery: EndpointDiscovery,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GenerationClient {
    pub fn new(discovery: EndpointDiscovery) -> Self {
        Self {
            discovery,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn discovery(&self) -> &EndpointDiscovery {
        &self.discovery
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn set_busy(&self, busy: bool) {
        self.in_flight.store(busy, Ordering::Release);
    }

    /// `None` when another request is already running.
    pub async fn generate(&self, request: &GenerationRequest) -> Option<ClientOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Generation already in flight, ignoring duplicate request");
            return None;
        }
        let _guard = InFlight(&self.in_flight);

        let outcome = match self.discovery.post(request).await {
            Ok(None) => ClientOutcome::Unavailable {
                status: None,
                detail: "No function endpoint detected".to_string(),
                endpoint: None,
            },
            Err(e) => ClientOutcome::Unavailable {
                status: None,
                detail: format!("Network error calling the image function: {}", e),
                endpoint: self.discovery.cached(),
            },
            Ok(Some((endpoint, response))) if response.is_success() => ClientOutcome::Image {
                bytes: response.body,
                endpoint,
            },
            Ok(Some((endpoint, response))) if RECOVERABLE_STATUSES.contains(&response.status) => {
                ClientOutcome::Unavailable {
                    status: Some(response.status),
                    detail: response.text(),
                    endpoint: Some(endpoint),
                }
            }
            Ok(Some((endpoint, response))) => ClientOutcome::Failed {
                status: response.status,
                detail: response.text(),
                endpoint,
            },
        };
        Some(outcome)
    }
}
