pub mod image_client;
pub mod key_check;
pub mod policy;
pub mod transport;

use crate::{
    config::{ProviderConfig, RetryPolicyConfig},
    error::{Result, StudioError},
    models::KeyCheckReport,
};
use std::sync::Arc;

pub use image_client::ImageClient;
pub use policy::{GenerationError, GenerationErrorKind};
pub use transport::{ProviderTransport, RawResponse, ReqwestTransport, TransportError};

/// Entry point to the image-generation provider.
#[derive(Clone)]
pub struct ProviderClient {
    transport: Arc<dyn ProviderTransport>,
    provider: ProviderConfig,
    image_client: ImageClient,
}

impl ProviderClient {
    pub fn new(provider: ProviderConfig, retry: RetryPolicyConfig) -> Result<Self> {
        let transport = ReqwestTransport::new()
            .map_err(|e| StudioError::ConfigError(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self::with_transport(Arc::new(transport), provider, retry))
    }

    pub fn with_transport(
        transport: Arc<dyn ProviderTransport>,
        provider: ProviderConfig,
        retry: RetryPolicyConfig,
    ) -> Self {
        Self {
            image_client: ImageClient::new(transport.clone(), provider.clone(), retry),
            transport,
            provider,
        }
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }

    pub fn has_key(&self) -> bool {
        self.provider.has_key()
    }

    pub async fn check_key(&self) -> KeyCheckReport {
        key_check::check_key(self.transport.as_ref(), &self.provider).await
    }
}
