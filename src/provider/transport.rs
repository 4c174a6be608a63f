use async_trait::async_trait;
use reqwest::{header, redirect, Client, Method};
use std::time::Duration;
use thiserror::Error;

/// Status and body of a completed upstream exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub location: Option<String>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            location: None,
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            body: Vec::new(),
            location: Some(location.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Upstream request timeout after {0:?}")]
    Timeout(Duration),
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),
    #[error("Upstream transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Network blips and deadlines are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Unreachable(_))
    }
}

/// One outbound provider request.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub method: Method,
    pub host: String,
    pub path: String,
    pub json_body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ProviderCall {
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            json_body: None,
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.json_body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.headers
            .push((header::AUTHORIZATION.as_str().to_string(), format!("Bearer {}", token)));
        self
    }

    /// Bare hosts get `https://`; hosts that already carry a scheme are kept.
    pub fn url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}{}", self.host.trim_end_matches('/'), self.path)
        } else {
            format!("https://{}{}", self.host, self.path)
        }
    }
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Issues one request. The deadline runs from request start and covers the
    /// whole body; on expiry the request is dropped.
    async fn call(&self, call: ProviderCall) -> Result<RawResponse, TransportError>;

    /// Downloads `url`, following at most one redirect.
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<RawResponse, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        // Redirects are followed by hand so the hop count stays at one.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get_once(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<RawResponse, TransportError> {
    let status = response.status().as_u16();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    Ok(RawResponse {
        status,
        body: body.to_vec(),
        location,
    })
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(Duration::ZERO)
    } else if e.is_connect() || e.is_request() {
        TransportError::Unreachable(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// Resolves a `Location` header against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> String {
    match reqwest::Url::parse(base).and_then(|b| b.join(location)) {
        Ok(url) => url.to_string(),
        Err(_) => location.to_string(),
    }
}

#[async_trait]
impl ProviderTransport for ReqwestTransport {
    async fn call(&self, call: ProviderCall) -> Result<RawResponse, TransportError> {
        let url = call.url();
        let mut builder = self.client.request(call.method.clone(), &url);
        for (name, value) in &call.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &call.json_body {
            builder = builder.json(body);
        }

        log::debug!("{} {} (deadline {:?})", call.method, url, call.timeout);

        let exchange = async {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            read_response(response).await
        };

        match tokio::time::timeout(call.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(call.timeout)),
        }
    }

    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<RawResponse, TransportError> {
        let download = async {
            let first = self.get_once(url).await?;
            if !first.is_redirect() {
                return Ok(first);
            }
            let next = match &first.location {
                Some(location) => resolve_location(url, location),
                None => return Ok(first),
            };
            log::debug!("Following redirect {} -> {}", url, next);
            // Whatever the second hop answers is final, redirect or not.
            self.get_once(&next).await
        };

        match tokio::time::timeout(timeout, download).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}
