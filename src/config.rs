use std::env;
use std::time::Duration;

use crate::models::ImageSize;

pub const DEFAULT_PROVIDER_HOST: &str = "api.openai.com";
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub host: String,
    pub model: String,
}

/// Timeouts and retry budget for one generation request.
///
/// Replaces the per-handler constants: every endpoint variant is this struct
/// with different numbers.
#[derive(Debug, Clone)]
pub struct RetryPolicyConfig {
    pub provider_timeout: Duration,
    pub download_timeout: Duration,
    pub max_attempts_per_size: u32,
    pub base_delay: Duration,
    pub fallback_sizes: Vec<ImageSize>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub retry: RetryPolicyConfig,
    pub server: ServerConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            api_key: None,
            host: DEFAULT_PROVIDER_HOST.to_string(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        // An empty key is as good as none.
        let api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let host = env::var("OPENAI_API_HOST").unwrap_or_else(|_| DEFAULT_PROVIDER_HOST.to_string());
        let model = env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string());

        ProviderConfig {
            api_key,
            host,
            model,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn has_key(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.is_empty())
    }
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        RetryPolicyConfig {
            provider_timeout: Duration::from_millis(9000),
            download_timeout: Duration::from_millis(6000),
            max_attempts_per_size: 2,
            base_delay: Duration::from_millis(700),
            fallback_sizes: vec![ImageSize::Square],
        }
    }
}

impl RetryPolicyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        let fallback_sizes = env::var("FALLBACK_SIZES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|s| ImageSize::parse(s.trim()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or(defaults.fallback_sizes);

        RetryPolicyConfig {
            provider_timeout: millis("PROVIDER_TIMEOUT_MS", defaults.provider_timeout),
            download_timeout: millis("DOWNLOAD_TIMEOUT_MS", defaults.download_timeout),
            max_attempts_per_size: env::var("MAX_ATTEMPTS_PER_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts_per_size),
            base_delay: millis("RETRY_BASE_DELAY_MS", defaults.base_delay),
            fallback_sizes,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts_per_size = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_fallback_sizes(mut self, sizes: Vec<ImageSize>) -> Self {
        self.fallback_sizes = sizes;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8888,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        ServerConfig {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: ProviderConfig::default(),
            retry: RetryPolicyConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Self {
        match dotenv::dotenv() {
            Ok(path) => log::debug!(".env loaded from {}", path.display()),
            Err(_) => log::debug!("No .env file found, using process environment"),
        }

        Config {
            provider: ProviderConfig::from_env(),
            retry: RetryPolicyConfig::from_env(),
            server: ServerConfig::from_env(),
        }
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicyConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }
}
