//! Text measurement, greedy wrapping and glyph rasterization.
//!
//! Rendering goes through cosmic-text with the system font database; the
//! wrapping algorithm only needs `TextMetrics`, so it can be driven by any
//! measurer.

use cosmic_text::{Attrs, Buffer, Color as GlyphColor, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use image::{GrayImage, Luma};
use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};

/// Font request for one block of text.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub size_px: f32,
    pub bold: bool,
}

impl FontSpec {
    pub fn bold(size_px: f32) -> Self {
        Self { size_px, bold: true }
    }

    /// Distance between consecutive baselines.
    pub fn line_height(&self) -> u32 {
        (self.size_px * 1.05).round().max(1.0) as u32
    }
}

pub trait TextMetrics {
    /// Advance width of `text` in pixels.
    fn measure(&self, text: &str, font: &FontSpec) -> f32;
}

pub trait TextEngine: TextMetrics + Send + Sync {
    /// Coverage mask of one line: `measure` wide (rounded up) and
    /// `line_height` tall, surrounded by `margin` empty pixels on every side.
    fn rasterize(&self, text: &str, font: &FontSpec, margin: u32) -> GrayImage;
}

/// Greedy word wrap on whitespace.
///
/// No line exceeds `max_width` unless it is a single word that is wider on
/// its own; such a word is kept whole. Blank input yields no lines.
pub fn wrap_text<M: TextMetrics + ?Sized>(metrics: &M, text: &str, max_width: f32, font: &FontSpec) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", line, word)
        };
        if metrics.measure(&candidate, font) <= max_width {
            line = candidate;
        } else {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            line = word.to_string();
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

static FONT_SYSTEM: Lazy<Mutex<FontSystem>> = Lazy::new(|| Mutex::new(FontSystem::new()));
static SWASH_CACHE: Lazy<Mutex<SwashCache>> = Lazy::new(|| Mutex::new(SwashCache::new()));

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-layout leaves the font cache usable.
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// System-font text engine backed by cosmic-text.
#[derive(Debug, Default, Clone, Copy)]
pub struct CosmicTextEngine;

impl CosmicTextEngine {
    pub fn new() -> Self {
        Self
    }

    fn layout(font_system: &mut FontSystem, text: &str, font: &FontSpec) -> Buffer {
        let metrics = Metrics::new(font.size_px, font.line_height() as f32);
        let mut buffer = Buffer::new(font_system, metrics);
        buffer.set_size(font_system, None, None);

        let mut attrs = Attrs::new().family(Family::SansSerif);
        if font.bold {
            attrs = attrs.weight(Weight::BOLD);
        }
        buffer.set_text(font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(font_system, false);
        buffer
    }

    fn width_of(buffer: &Buffer) -> f32 {
        buffer
            .layout_runs()
            .flat_map(|run| run.glyphs.iter().map(|g| g.x + g.w))
            .fold(0.0f32, f32::max)
    }
}

impl TextMetrics for CosmicTextEngine {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        let mut font_system = lock(&FONT_SYSTEM);
        let buffer = Self::layout(&mut font_system, text, font);
        Self::width_of(&buffer)
    }
}

impl TextEngine for CosmicTextEngine {
    fn rasterize(&self, text: &str, font: &FontSpec, margin: u32) -> GrayImage {
        let mut font_system = lock(&FONT_SYSTEM);
        let mut swash_cache = lock(&SWASH_CACHE);
        let buffer = Self::layout(&mut font_system, text, font);

        let width = (Self::width_of(&buffer).ceil().max(1.0) as u32).saturating_add(margin.saturating_mul(2));
        let height = font.line_height().saturating_add(margin.saturating_mul(2));
        let mut mask = GrayImage::new(width, height);

        buffer.draw(
            &mut font_system,
            &mut swash_cache,
            GlyphColor::rgb(255, 255, 255),
            |x, y, w, h, color| {
                let coverage = color.a();
                if coverage == 0 {
                    return;
                }
                for dy in 0..h as i32 {
                    for dx in 0..w as i32 {
                        let px = x + dx + margin as i32;
                        let py = y + dy + margin as i32;
                        if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                            continue;
                        }
                        let cell = mask.get_pixel_mut(px as u32, py as u32);
                        cell.0[0] = cell.0[0].max(coverage);
                    }
                }
            },
        );
        mask
    }
}

/// Grows a coverage mask by `radius` pixels (separable max filter).
pub fn dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let (w, h) = mask.dimensions();
    let r = radius as i64;

    let mut horizontal = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let lo = (x as i64 - r).max(0) as u32;
            let hi = (x as i64 + r).min(w as i64 - 1) as u32;
            let peak = (lo..=hi).map(|sx| mask.get_pixel(sx, y).0[0]).max().unwrap_or(0);
            horizontal.put_pixel(x, y, Luma([peak]));
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let lo = (y as i64 - r).max(0) as u32;
        let hi = (y as i64 + r).min(h as i64 - 1) as u32;
        for x in 0..w {
            let peak = (lo..=hi).map(|sy| horizontal.get_pixel(x, sy).0[0]).max().unwrap_or(0);
            out.put_pixel(x, y, Luma([peak]));
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Deterministic stand-in for a real font: every character advances
    /// `0.6 × size`, and non-space characters fill a block.
    #[derive(Debug, Default, Clone, Copy)]
    pub(crate) struct BlockTextEngine;

    impl TextMetrics for BlockTextEngine {
        fn measure(&self, text: &str, font: &FontSpec) -> f32 {
            text.chars().count() as f32 * font.size_px * 0.6
        }
    }

    impl TextEngine for BlockTextEngine {
        fn rasterize(&self, text: &str, font: &FontSpec, margin: u32) -> GrayImage {
            let advance = font.size_px * 0.6;
            let width = self.measure(text, font).ceil().max(1.0) as u32 + margin * 2;
            let height = font.line_height() + margin * 2;
            let mut mask = GrayImage::new(width, height);
            let top = margin + (font.size_px * 0.15) as u32;
            let bottom = margin + (font.size_px * 0.85) as u32;
            for (i, ch) in text.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let left = margin + (i as f32 * advance) as u32;
                let right = margin + (i as f32 * advance + font.size_px * 0.5) as u32;
                for y in top..bottom.min(height) {
                    for x in left..right.min(width) {
                        mask.put_pixel(x, y, Luma([255]));
                    }
                }
            }
            mask
        }
    }
}
