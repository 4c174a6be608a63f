use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PROMPT: &str = "high-contrast abstract ocean waves, vivid, cinematic lighting";

/// Output sizes the provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1024x1536")]
    Portrait,
    #[serde(rename = "1536x1024")]
    Landscape,
    #[serde(rename = "auto")]
    Auto,
}

impl ImageSize {
    pub const ALL: [ImageSize; 4] = [
        ImageSize::Square,
        ImageSize::Portrait,
        ImageSize::Landscape,
        ImageSize::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Portrait => "1024x1536",
            ImageSize::Landscape => "1536x1024",
            ImageSize::Auto => "auto",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.as_str() == raw)
    }

    pub fn allowed() -> Vec<String> {
        Self::ALL.iter().map(|s| s.as_str().to_string()).collect()
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        ImageSize::Square
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a `POST` to the generation endpoint. Both fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            size: None,
        }
    }

    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = Some(size.as_str().to_string());
        self
    }

    /// Malformed or non-object JSON is treated as `{}`. Each field is read on
    /// its own; a non-string value counts as absent.
    pub fn from_body(body: &[u8]) -> Self {
        let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
        let field = |name: &str| value.get(name).and_then(|v| v.as_str()).map(String::from);
        Self {
            prompt: field("prompt"),
            size: field("size"),
        }
    }

    pub fn prompt_or_default(&self) -> &str {
        match self.prompt.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => DEFAULT_PROMPT,
        }
    }

    /// Unrecognized sizes fall back silently to the default.
    pub fn resolved_size(&self) -> ImageSize {
        self.size
            .as_deref()
            .and_then(ImageSize::parse)
            .unwrap_or_default()
    }
}

/// Body of a successful provider image response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderImageResponse {
    #[serde(default)]
    pub data: Vec<ProviderImageDatum>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderImageDatum {
    pub b64_json: Option<String>,
    pub url: Option<String>,
}

/// Where the image bytes of a successful provider response live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Inline(Vec<u8>),
    Remote(String),
}
