//! Pure rendering of a [`CompositorState`] into a 1280×720 frame.

pub mod color;
pub mod geometry;
pub mod palette;
pub mod render;
pub mod state;
pub mod text;

pub use color::Color;
pub use geometry::{fit_rect, FitMode, FitRect};
pub use palette::{apply_palette, palette_for, Palette};
pub use render::render;
pub use state::{CompositorState, TextAlign};
pub use text::{wrap_text, CosmicTextEngine, FontSpec, TextEngine, TextMetrics};

use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::error::Result;

pub const CANVAS_WIDTH: u32 = 1280;
pub const CANVAS_HEIGHT: u32 = 720;

/// Encodes a rendered frame as PNG.
pub fn encode_png(frame: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    frame.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// `thumbnail-<unix millis>.png`
pub fn export_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("thumbnail-{}.png", now.timestamp_millis())
}
