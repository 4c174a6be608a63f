pub mod compositor;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod logger;
pub mod models;
pub mod provider;
#[cfg(feature = "server")]
pub mod server;
pub mod studio;
pub mod youtube;

pub use compositor::{CompositorState, CosmicTextEngine, FitMode, TextAlign};
pub use config::{Config, ProviderConfig, RetryPolicyConfig, ServerConfig};
pub use discovery::{EndpointDiscovery, GenerationClient, HttpGateway, LocalGateway};
pub use endpoint::{EndpointResponse, GenerationEndpoint, ServiceError};
pub use error::{Result, StudioError};
pub use models::{GenerationRequest, ImageSize};
pub use provider::{GenerationError, GenerationErrorKind, ProviderClient};
pub use studio::{Control, GenerationOutcome, Studio};
