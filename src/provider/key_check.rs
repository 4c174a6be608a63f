use reqwest::Method;
use std::time::Duration;

use crate::{
    config::ProviderConfig,
    models::KeyCheckReport,
    provider::transport::{ProviderCall, ProviderTransport},
};

pub const MODELS_PATH: &str = "/v1/models";
const KEY_CHECK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Probes `/v1/models` with the configured key. Never fails: every outcome,
/// including transport errors, is folded into the report.
pub async fn check_key(transport: &dyn ProviderTransport, provider: &ProviderConfig) -> KeyCheckReport {
    let api_key = match provider.api_key.as_deref() {
        Some(key) => key,
        None => {
            return KeyCheckReport {
                ok: false,
                has_key: false,
                reason: Some("Missing OPENAI_API_KEY env var.".to_string()),
                ..Default::default()
            }
        }
    };

    let call = ProviderCall::new(Method::GET, provider.host.as_str(), MODELS_PATH, KEY_CHECK_TIMEOUT)
        .with_bearer(api_key);

    match transport.call(call).await {
        Ok(response) => {
            let parsed: Option<serde_json::Value> = serde_json::from_slice(&response.body).ok();
            let ok = response.status == 200
                && parsed
                    .as_ref()
                    .and_then(|v| v.get("data"))
                    .map_or(false, |d| d.is_array());
            let error = if ok {
                None
            } else {
                Some(
                    parsed
                        .as_ref()
                        .and_then(|v| v.get("error").cloned())
                        .unwrap_or_else(|| serde_json::Value::String(response.text())),
                )
            };

            log::info!("Key check answered {} (ok: {})", response.status, ok);
            KeyCheckReport {
                ok,
                has_key: true,
                http_status: Some(response.status),
                error,
                key_looks_like: Some(api_key.starts_with("sk-")),
                key_length: Some(api_key.len()),
                note: Some(
                    "If httpStatus is 401, your key is invalid. If 403, org/account lacks access."
                        .to_string(),
                ),
                ..Default::default()
            }
        }
        Err(e) => {
            log::warn!("Key check could not reach the provider: {}", e);
            KeyCheckReport {
                ok: false,
                has_key: true,
                http_status: Some(0),
                error: Some(serde_json::Value::String(e.to_string())),
                note: Some("Network error reaching OpenAI.".to_string()),
                ..Default::default()
            }
        }
    }
}
