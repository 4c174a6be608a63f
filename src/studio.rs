//! Editing session: control events in, frames and PNG exports out.

use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    compositor::{
        self, apply_palette, Color, CompositorState, FitMode, Palette, TextAlign, TextEngine,
    },
    discovery::{ClientOutcome, GenerationClient},
    error::{Result, StudioError},
    models::{GenerationRequest, ImageSize, DEFAULT_PROMPT},
    provider::ProviderTransport,
    youtube,
};

/// Slider bounds for the pixel controls; values outside are clamped.
pub const TITLE_SIZE_RANGE: (u32, u32) = (24, 200);
pub const SUBTITLE_SIZE_RANGE: (u32, u32) = (16, 120);
pub const STROKE_WIDTH_RANGE: (u32, u32) = (0, 24);

/// One user edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Title(String),
    Subtitle(String),
    TitleSize(u32),
    SubtitleSize(u32),
    StrokeWidth(u32),
    Shadow(bool),
    Align(TextAlign),
    Fit(FitMode),
    PrimaryColor(Color),
    SecondaryColor(Color),
    TextColor(Color),
}

/// What happened to the background after a generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Applied {
        endpoint: String,
    },
    /// The image service was unavailable; a prompt palette replaced the
    /// background so editing can continue.
    FallbackApplied {
        status: Option<u16>,
        detail: String,
        endpoint: Option<String>,
        palette: Palette,
    },
    /// The request was refused for a reason a palette cannot paper over.
    /// The background is unchanged.
    Failed {
        status: u16,
        detail: String,
        endpoint: String,
    },
}

impl GenerationOutcome {
    /// User-facing summary.
    pub fn notice(&self) -> String {
        match self {
            GenerationOutcome::Applied { endpoint } => {
                format!("AI background applied (endpoint: {})", endpoint)
            }
            GenerationOutcome::FallbackApplied {
                status: Some(status),
                detail,
                endpoint,
                ..
            } => format!(
                "AI image unavailable right now (status {}).\n{}\n(Endpoint: {})\nUsing a styled gradient instead so you can keep designing.",
                status,
                detail,
                endpoint.as_deref().unwrap_or("none")
            ),
            GenerationOutcome::FallbackApplied { detail, .. } => format!(
                "Could not reach the image function.\n{}\nUsing a styled gradient instead so you can continue.",
                detail
            ),
            GenerationOutcome::Failed {
                status,
                detail,
                endpoint,
            } => format!(
                "Could not generate an AI background.\nServer responded {}: {}\n(Endpoint tried: {})",
                status, detail, endpoint
            ),
        }
    }
}

pub struct Studio {
    state: CompositorState,
    engine: Arc<dyn TextEngine>,
    generator: Option<Arc<GenerationClient>>,
    downloader: Option<Arc<dyn ProviderTransport>>,
    download_timeout: Duration,
    frame: Option<RgbaImage>,
}

impl Studio {
    pub fn new(engine: Arc<dyn TextEngine>) -> Self {
        Self {
            state: CompositorState::default(),
            engine,
            generator: None,
            downloader: None,
            download_timeout: Duration::from_secs(6),
            frame: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<GenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Transport used for YouTube thumbnail downloads.
    pub fn with_downloader(mut self, downloader: Arc<dyn ProviderTransport>, timeout: Duration) -> Self {
        self.downloader = Some(downloader);
        self.download_timeout = timeout;
        self
    }

    pub fn state(&self) -> &CompositorState {
        &self.state
    }

    pub fn apply(&mut self, control: Control) {
        log::debug!("Control: {:?}", control);
        let state = &mut self.state;
        match control {
            Control::Title(title) => state.title = title,
            Control::Subtitle(subtitle) => state.subtitle = subtitle,
            Control::TitleSize(px) => state.title_size_px = px.clamp(TITLE_SIZE_RANGE.0, TITLE_SIZE_RANGE.1),
            Control::SubtitleSize(px) => {
                state.subtitle_size_px = px.clamp(SUBTITLE_SIZE_RANGE.0, SUBTITLE_SIZE_RANGE.1)
            }
            Control::StrokeWidth(px) => state.stroke_width_px = px.clamp(STROKE_WIDTH_RANGE.0, STROKE_WIDTH_RANGE.1),
            Control::Shadow(on) => state.shadow_on = on,
            Control::Align(align) => state.text_align = align,
            Control::Fit(fit) => state.background_fit = fit,
            Control::PrimaryColor(c) => state.primary_color = c,
            Control::SecondaryColor(c) => state.secondary_color = c,
            Control::TextColor(c) => state.text_color = c,
        }
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.frame = None;
    }

    /// Current frame, redrawn only after a change.
    pub fn frame(&mut self) -> &RgbaImage {
        let state = &self.state;
        let engine = self.engine.as_ref();
        self.frame.get_or_insert_with(|| compositor::render(state, engine))
    }

    /// Decodes an uploaded image as the background. On failure the current
    /// background stays.
    pub fn load_background_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        log::info!("Background loaded ({}x{})", image.width(), image.height());
        self.state.background_image = Some(image);
        self.invalidate();
        Ok(())
    }

    pub fn load_logo_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        log::info!("Logo loaded ({}x{})", image.width(), image.height());
        self.state.logo_image = Some(image);
        self.invalidate();
        Ok(())
    }

    pub fn clear_logo(&mut self) {
        self.state.logo_image = None;
        self.invalidate();
    }

    /// Uses the largest available thumbnail of a YouTube video as the
    /// background and returns its URL.
    pub async fn load_youtube(&mut self, input: &str) -> Result<String> {
        let video_id = youtube::extract_video_id(input).ok_or_else(|| {
            StudioError::RequestError("Please paste a full YouTube URL or a valid 11-char video ID.".to_string())
        })?;
        let downloader = self
            .downloader
            .clone()
            .ok_or_else(|| StudioError::ConfigError("No downloader configured".to_string()))?;

        let mut last_error = String::from("no candidates");
        for url in youtube::thumbnail_candidates(&video_id) {
            match downloader.fetch_bytes(&url, self.download_timeout).await {
                Ok(response) if response.is_success() => match image::load_from_memory(&response.body) {
                    Ok(image) => {
                        log::info!("YouTube thumbnail loaded from {}", url);
                        self.state.background_image = Some(image.to_rgba8());
                        self.invalidate();
                        return Ok(url);
                    }
                    Err(e) => last_error = format!("{}: {}", url, e),
                },
                Ok(response) => last_error = format!("{}: HTTP {}", url, response.status),
                Err(e) => last_error = format!("{}: {}", url, e),
            }
            log::debug!("Thumbnail candidate failed: {}", last_error);
        }

        log::warn!("No YouTube thumbnail for {} ({})", video_id, last_error);
        Err(StudioError::ResponseError(
            "Could not load YouTube thumbnail. Try another video, upload a screenshot, or use AI Generate.".to_string(),
        ))
    }

    /// Requests an AI background. Blank prompts use the default prompt.
    ///
    /// Returns `StudioError::Busy` while another request is running.
    pub async fn generate_background(&mut self, prompt: &str, size: ImageSize) -> Result<GenerationOutcome> {
        let generator = self
            .generator
            .clone()
            .ok_or_else(|| StudioError::ConfigError("No generation client configured".to_string()))?;
        let prompt = if prompt.trim().is_empty() {
            DEFAULT_PROMPT
        } else {
            prompt
        };
        let request = GenerationRequest::new(prompt).with_size(size);

        let outcome = generator.generate(&request).await.ok_or(StudioError::Busy)?;
        let outcome = match outcome {
            ClientOutcome::Image { bytes, endpoint } => match image::load_from_memory(&bytes) {
                Ok(image) => {
                    self.state.background_image = Some(image.to_rgba8());
                    GenerationOutcome::Applied { endpoint }
                }
                Err(e) => self.fallback(prompt, None, format!("Could not decode the generated image: {}", e), Some(endpoint)),
            },
            ClientOutcome::Unavailable {
                status,
                detail,
                endpoint,
            } => self.fallback(prompt, status, detail, endpoint),
            ClientOutcome::Failed {
                status,
                detail,
                endpoint,
            } => {
                log::warn!("Generation failed with {} at {}", status, endpoint);
                GenerationOutcome::Failed {
                    status,
                    detail,
                    endpoint,
                }
            }
        };
        self.invalidate();
        Ok(outcome)
    }

    fn fallback(&mut self, prompt: &str, status: Option<u16>, detail: String, endpoint: Option<String>) -> GenerationOutcome {
        let palette = apply_palette(&mut self.state, prompt);
        log::info!("Using {} palette instead of an AI background", palette.name);
        GenerationOutcome::FallbackApplied {
            status,
            detail,
            endpoint,
            palette,
        }
    }

    /// Reachable endpoint after a fresh probe, if any.
    pub async fn test_endpoint(&self) -> Option<String> {
        match &self.generator {
            Some(generator) => generator.discovery().discover().await,
            None => None,
        }
    }

    /// Renders and encodes the current frame. Returns the download file name
    /// and the PNG bytes.
    pub fn export_png(&mut self) -> Result<(String, Vec<u8>)> {
        let name = compositor::export_file_name(chrono::Utc::now());
        let bytes = compositor::encode_png(self.frame())?;
        Ok((name, bytes))
    }

    /// Writes the export into `dir` and returns the file path.
    pub fn export_to(&mut self, dir: &Path) -> Result<PathBuf> {
        let (name, bytes) = self.export_png()?;
        let path = dir.join(name);
        std::fs::write(&path, bytes)?;
        log::info!("Exported {}", path.display());
        Ok(path)
    }
}
