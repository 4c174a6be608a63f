use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

use crate::{
    config::{ProviderConfig, RetryPolicyConfig},
    models::{GenerationRequest, ImagePayload},
    provider::{
        policy::{self, Decision, GenerationError, RetryPlan},
        transport::{ProviderCall, ProviderTransport},
    },
};

pub const GENERATIONS_PATH: &str = "/v1/images/generations";

#[derive(Clone)]
pub struct ImageClient {
    transport: Arc<dyn ProviderTransport>,
    provider: ProviderConfig,
    retry: RetryPolicyConfig,
}

impl ImageClient {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        provider: ProviderConfig,
        retry: RetryPolicyConfig,
    ) -> Self {
        Self {
            transport,
            provider,
            retry,
        }
    }

    /// Runs the request through the retry plan and returns PNG bytes.
    ///
    /// Calls are strictly sequential: each attempt waits for the previous
    /// outcome. The caller checks for a missing key before getting here.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let prompt = request.prompt_or_default();
        let plan = RetryPlan::new(request.resolved_size(), &self.retry);
        let api_key = self.provider.api_key.as_deref().unwrap_or_default();

        log::info!(
            "Generating image with model {} ({} planned attempts)",
            self.provider.model,
            plan.len()
        );

        let attempts = plan.attempts();
        for (index, attempt) in attempts.iter().enumerate() {
            if !attempt.delay_before.is_zero() {
                tokio::time::sleep(attempt.delay_before).await;
            }

            let call = ProviderCall::new(
                Method::POST,
                self.provider.host.as_str(),
                GENERATIONS_PATH,
                self.retry.provider_timeout,
            )
            .with_bearer(api_key)
            .with_json(json!({
                "model": self.provider.model,
                "prompt": prompt,
                "size": attempt.size.as_str(),
                "n": 1
            }));

            log::debug!(
                "Provider attempt {} for size {}",
                attempt.attempt_number,
                attempt.size
            );
            let outcome = self.transport.call(call).await;
            if let Ok(response) = &outcome {
                log::debug!("Provider answered {}", response.status);
            }

            match policy::decide(policy::classify(&outcome), attempts.get(index + 1)) {
                Decision::Succeed(image) => return self.resolve(image).await,
                Decision::FailFast(error) => {
                    log::error!("Image generation failed: {}", error);
                    return Err(error);
                }
                Decision::Retry { after, cause } => {
                    log::warn!(
                        "Transient provider failure on {} attempt {}: {} (next try in {}ms)",
                        attempt.size,
                        attempt.attempt_number,
                        cause.message(),
                        after.as_millis()
                    );
                }
            }
        }

        // Only reachable with an empty plan.
        Err(GenerationError::exhausted(None))
    }

    async fn resolve(&self, image: ImagePayload) -> Result<Vec<u8>, GenerationError> {
        match image {
            ImagePayload::Inline(bytes) => Ok(bytes),
            ImagePayload::Remote(url) => {
                log::debug!("Downloading generated image from {}", url);
                let response = self
                    .transport
                    .fetch_bytes(&url, self.retry.download_timeout)
                    .await
                    .map_err(GenerationError::download_failed)?;
                if !response.is_success() {
                    return Err(GenerationError::download_failed(format!(
                        "status {}",
                        response.status
                    )));
                }
                if response.body.is_empty() {
                    return Err(GenerationError::no_image());
                }
                Ok(response.body)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ImageSize;
    use crate::provider::policy::GenerationErrorKind;
    use crate::provider::transport::{RawResponse, TransportError};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted provider: replies are consumed in order, the last one repeats.
    pub(crate) struct ScriptedTransport {
        replies: Mutex<Vec<Result<RawResponse, TransportError>>>,
        downloads: Mutex<Vec<Result<RawResponse, TransportError>>>,
        pub calls: Mutex<Vec<ProviderCall>>,
        pub fetched: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(replies: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                downloads: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                fetched: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn always(status: u16, body: &str) -> Self {
            Self::new(vec![Ok(RawResponse::new(status, body.as_bytes().to_vec()))])
        }

        pub(crate) fn with_downloads(self, downloads: Vec<Result<RawResponse, TransportError>>) -> Self {
            *self.downloads.lock().unwrap() = downloads;
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub(crate) fn sizes_requested(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| c.json_body.as_ref())
                .filter_map(|b| b.get("size").and_then(|s| s.as_str()).map(String::from))
                .collect()
        }
    }

    fn next_reply(queue: &Mutex<Vec<Result<RawResponse, TransportError>>>) -> Result<RawResponse, TransportError> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue
                .first()
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted reply".into())))
        }
    }

    #[async_trait]
    impl ProviderTransport for ScriptedTransport {
        async fn call(&self, call: ProviderCall) -> Result<RawResponse, TransportError> {
            self.calls.lock().unwrap().push(call);
            next_reply(&self.replies)
        }

        async fn fetch_bytes(&self, url: &str, _timeout: Duration) -> Result<RawResponse, TransportError> {
            self.fetched.lock().unwrap().push(url.to_string());
            next_reply(&self.downloads)
        }
    }

    pub(crate) fn inline_png_body(bytes: &[u8]) -> String {
        format!(r#"{{"data":[{{"b64_json":"{}"}}]}}"#, BASE64.encode(bytes))
    }

    pub(crate) fn fast_retry() -> RetryPolicyConfig {
        RetryPolicyConfig::default().with_base_delay(Duration::ZERO)
    }

    fn client(transport: Arc<ScriptedTransport>, retry: RetryPolicyConfig) -> ImageClient {
        ImageClient::new(transport, ProviderConfig::new().with_api_key("sk-test"), retry)
    }

    #[tokio::test]
    async fn inline_image_on_first_call() {
        let transport = Arc::new(ScriptedTransport::always(200, &inline_png_body(b"PNG")));
        let bytes = client(transport.clone(), fast_retry())
            .generate(&GenerationRequest::new("ocean waves"))
            .await
            .unwrap();
        assert_eq!(bytes, b"PNG");
        assert_eq!(transport.call_count(), 1);

        let calls = transport.calls.lock().unwrap();
        let body = calls[0].json_body.as_ref().unwrap();
        assert_eq!(body["model"], "gpt-image-1");
        assert_eq!(body["prompt"], "ocean waves");
        assert_eq!(body["size"], "1024x1024");
        assert_eq!(body["n"], 1);
        assert_eq!(calls[0].path, GENERATIONS_PATH);
    }

    #[tokio::test]
    async fn unauthorized_is_never_retried() {
        let transport = Arc::new(ScriptedTransport::always(401, "bad key"));
        let err = client(transport.clone(), fast_retry())
            .generate(&GenerationRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::InvalidKey);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn verification_required_short_circuits() {
        let transport = Arc::new(ScriptedTransport::always(403, "organization must be verified"));
        let err = client(transport.clone(), fast_retry())
            .generate(&GenerationRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::Forbidden);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn server_errors_walk_every_size_then_time_out() {
        let transport = Arc::new(ScriptedTransport::always(500, "boom"));
        let retry = fast_retry().with_fallback_sizes(vec![ImageSize::Landscape, ImageSize::Square]);
        let err = client(transport.clone(), retry)
            .generate(&GenerationRequest::new("x").with_size(ImageSize::Landscape))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::Timeout);
        assert_eq!(err.status(), 504);
        assert_eq!(
            transport.sizes_requested(),
            vec!["1536x1024", "1536x1024", "1024x1024", "1024x1024"]
        );
    }

    #[tokio::test]
    async fn server_error_respects_max_attempts() {
        let transport = Arc::new(ScriptedTransport::always(503, ""));
        let retry = fast_retry().with_max_attempts(3).with_fallback_sizes(vec![]);
        let err = client(transport.clone(), retry)
            .generate(&GenerationRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::Timeout);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn recovers_after_a_rate_limit() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(RawResponse::new(429, "slow down")),
            Err(TransportError::Unreachable("reset".into())),
            Ok(RawResponse::new(200, inline_png_body(b"OK"))),
        ]));
        let retry = fast_retry().with_fallback_sizes(vec![ImageSize::Square]);
        let bytes = client(transport.clone(), retry)
            .generate(&GenerationRequest::new("x").with_size(ImageSize::Portrait))
            .await
            .unwrap();
        assert_eq!(bytes, b"OK");
        assert_eq!(
            transport.sizes_requested(),
            vec!["1024x1536", "1024x1536", "1024x1024"]
        );
    }

    #[tokio::test]
    async fn url_payload_is_downloaded() {
        let transport = Arc::new(
            ScriptedTransport::always(200, r#"{"data":[{"url":"https://cdn.example.com/i.png"}]}"#)
                .with_downloads(vec![Ok(RawResponse::new(200, b"REMOTE".to_vec()))]),
        );
        let bytes = client(transport.clone(), fast_retry())
            .generate(&GenerationRequest::default())
            .await
            .unwrap();
        assert_eq!(bytes, b"REMOTE");
        assert_eq!(
            transport.fetched.lock().unwrap().as_slice(),
            ["https://cdn.example.com/i.png".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_download_is_a_network_error() {
        let transport = Arc::new(
            ScriptedTransport::always(200, r#"{"data":[{"url":"https://cdn.example.com/i.png"}]}"#)
                .with_downloads(vec![Err(TransportError::Timeout(Duration::from_secs(6)))]),
        );
        let err = client(transport.clone(), fast_retry())
            .generate(&GenerationRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::Network);
        assert_eq!(transport.call_count(), 1);
    }
}
