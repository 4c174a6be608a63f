use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};

use super::color::{blend_over, Color};
use super::geometry::{fit_rect, FitMode, FitRect};
use super::state::{CompositorState, TextAlign};
use super::text::{dilate, wrap_text, FontSpec, TextEngine};
use super::{CANVAS_HEIGHT, CANVAS_WIDTH};

const PADDING: f32 = 64.0;
const BAND_TOP: f32 = 0.55;
const BAND_ALPHA: f32 = 0.35;
const TITLE_TOP: f32 = 0.58;
const SUBTITLE_GAP: f32 = 16.0;
const SHADOW_BLUR: f32 = 16.0;
const SHADOW_OFFSET: (i64, i64) = (2, 4);
const LOGO_BOX: u32 = 200;
const LOGO_ORIGIN: i64 = 24;

/// Draws one frame. The same state and engine always give the same pixels.
pub fn render(state: &CompositorState, engine: &dyn TextEngine) -> RgbaImage {
    let mut canvas = RgbaImage::new(CANVAS_WIDTH, CANVAS_HEIGHT);
    let width = CANVAS_WIDTH as f32;
    let height = CANVAS_HEIGHT as f32;

    // The gradient also fills any letterbox left by a contained background.
    paint_gradient(&mut canvas, state.secondary_color, state.primary_color);
    if let Some(background) = &state.background_image {
        let rect = fit_rect(
            background.width() as f64,
            background.height() as f64,
            width as f64,
            height as f64,
            state.background_fit,
        );
        draw_image(&mut canvas, background, &rect, rect.dx.round() as i64, rect.dy.round() as i64);
    }

    let band_top = (height * BAND_TOP).round() as u32;
    for y in band_top..CANVAS_HEIGHT {
        for x in 0..CANVAS_WIDTH {
            blend_over(canvas.get_pixel_mut(x, y), Color::BLACK, BAND_ALPHA);
        }
    }

    let text_width = width - PADDING * 2.0;
    let title_font = FontSpec::bold(state.title_size_px as f32);
    let title_lines = wrap_text(engine, &state.title, text_width, &title_font);
    let mut next_y = draw_lines(&mut canvas, state, engine, &title_lines, height * TITLE_TOP, &title_font);

    if !state.subtitle.trim().is_empty() {
        let subtitle_font = FontSpec::bold(state.subtitle_size_px as f32);
        let subtitle_lines = wrap_text(engine, &state.subtitle, text_width, &subtitle_font);
        next_y = draw_lines(
            &mut canvas,
            state,
            engine,
            &subtitle_lines,
            next_y + SUBTITLE_GAP,
            &subtitle_font,
        );
    }
    log::trace!("Text block ends at y={:.1}", next_y);

    if let Some(logo) = &state.logo_image {
        let rect = fit_rect(
            logo.width() as f64,
            logo.height() as f64,
            LOGO_BOX as f64,
            LOGO_BOX as f64,
            FitMode::Contain,
        );
        draw_image(&mut canvas, logo, &rect, LOGO_ORIGIN, LOGO_ORIGIN);
    }

    canvas
}

fn paint_gradient(canvas: &mut RgbaImage, top: Color, bottom: Color) {
    let height = canvas.height() as f32;
    for y in 0..canvas.height() {
        let color = top.lerp(bottom, (y as f32 + 0.5) / height).to_rgba();
        for x in 0..canvas.width() {
            canvas.put_pixel(x, y, color);
        }
    }
}

/// Crops `rect`'s source region, scales it to the destination size and
/// alpha-composites it at `(x, y)`.
fn draw_image(canvas: &mut RgbaImage, source: &RgbaImage, rect: &FitRect, x: i64, y: i64) {
    let sx = rect.sx.round().max(0.0) as u32;
    let sy = rect.sy.round().max(0.0) as u32;
    let sw = (rect.s_width.round() as u32).min(source.width().saturating_sub(sx));
    let sh = (rect.s_height.round() as u32).min(source.height().saturating_sub(sy));
    let dw = rect.d_width.round() as u32;
    let dh = rect.d_height.round() as u32;
    if sw == 0 || sh == 0 || dw == 0 || dh == 0 {
        return;
    }

    let cropped = imageops::crop_imm(source, sx, sy, sw, sh).to_image();
    let scaled = if (sw, sh) == (dw, dh) {
        cropped
    } else {
        imageops::resize(&cropped, dw, dh, FilterType::Triangle)
    };
    imageops::overlay(canvas, &scaled, x, y);
}

/// Draws wrapped lines from `start_y` down and returns the y after the last.
fn draw_lines(
    canvas: &mut RgbaImage,
    state: &CompositorState,
    engine: &dyn TextEngine,
    lines: &[String],
    start_y: f32,
    font: &FontSpec,
) -> f32 {
    let canvas_width = CANVAS_WIDTH as f32;
    let line_height = font.line_height() as f32;
    let stroke_radius = state.stroke_width_px.div_ceil(2);
    // Room for the stroke plus three sigma of shadow blur.
    let margin = stroke_radius + (SHADOW_BLUR * 1.5).ceil() as u32 + 4;

    let mut y = start_y;
    for line in lines {
        let line_width = engine.measure(line, font);
        let x = match state.text_align {
            TextAlign::Left => PADDING,
            TextAlign::Center => (canvas_width - line_width) / 2.0,
            TextAlign::Right => canvas_width - PADDING - line_width,
        };

        let fill = engine.rasterize(line, font, margin);
        let stroke = (state.stroke_width_px > 0).then(|| dilate(&fill, stroke_radius));
        let origin_x = x.round() as i64 - margin as i64;
        let origin_y = y.round() as i64 - margin as i64;

        if state.shadow_on {
            let silhouette = stroke.as_ref().unwrap_or(&fill);
            let shadow = imageops::blur(silhouette, SHADOW_BLUR / 2.0);
            paint_mask(
                canvas,
                &shadow,
                origin_x + SHADOW_OFFSET.0,
                origin_y + SHADOW_OFFSET.1,
                Color::BLACK,
            );
        }
        if let Some(stroke) = &stroke {
            paint_mask(canvas, stroke, origin_x, origin_y, state.secondary_color);
        }
        paint_mask(canvas, &fill, origin_x, origin_y, state.text_color);

        y += line_height;
    }
    y
}

fn paint_mask(canvas: &mut RgbaImage, mask: &GrayImage, origin_x: i64, origin_y: i64, color: Color) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    for (mx, my, coverage) in mask.enumerate_pixels() {
        let coverage = coverage.0[0];
        if coverage == 0 {
            continue;
        }
        let x = origin_x + mx as i64;
        let y = origin_y + my as i64;
        if x < 0 || y < 0 || x >= cw || y >= ch {
            continue;
        }
        blend_over(canvas.get_pixel_mut(x as u32, y as u32), color, coverage as f32 / 255.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::text::testing::BlockTextEngine;
    use image::Rgba;

    fn plain_state() -> CompositorState {
        CompositorState {
            shadow_on: false,
            stroke_width_px: 0,
            ..CompositorState::default()
        }
    }

    fn expected_band_pixel(state: &CompositorState, y: u32) -> Rgba<u8> {
        let t = (y as f32 + 0.5) / CANVAS_HEIGHT as f32;
        let mut px = state.secondary_color.lerp(state.primary_color, t).to_rgba();
        blend_over(&mut px, Color::BLACK, BAND_ALPHA);
        px
    }

    #[test]
    fn rendering_is_deterministic() {
        let state = CompositorState::default();
        let a = render(&state, &BlockTextEngine);
        let b = render(&state, &BlockTextEngine);
        assert_eq!(a.dimensions(), (1280, 720));
        assert!(a == b);
    }

    #[test]
    fn gradient_runs_secondary_to_primary() {
        let state = plain_state();
        let frame = render(&state, &BlockTextEngine);
        let top = frame.get_pixel(640, 0);
        let expected = state.secondary_color.lerp(state.primary_color, 0.5 / 720.0).to_rgba();
        assert_eq!(*top, expected);
        assert_eq!(*frame.get_pixel(1279, 719), expected_band_pixel(&state, 719));
    }

    #[test]
    fn band_darkens_lower_canvas_only() {
        let state = CompositorState {
            title: String::new(),
            subtitle: String::new(),
            ..plain_state()
        };
        let frame = render(&state, &BlockTextEngine);
        // Band starts at round(720 * 0.55) = 396.
        let above = state.secondary_color.lerp(state.primary_color, 395.5 / 720.0).to_rgba();
        assert_eq!(*frame.get_pixel(10, 395), above);
        assert_eq!(*frame.get_pixel(10, 396), expected_band_pixel(&state, 396));
    }

    #[test]
    fn title_fill_lands_at_the_padding() {
        let state = plain_state();
        let frame = render(&state, &BlockTextEngine);
        // First glyph block: x 64..124, y 418+18..418+102.
        assert_eq!(*frame.get_pixel(70, 470), Rgba([255, 255, 255, 255]));
        assert_ne!(*frame.get_pixel(60, 470), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn stroke_uses_secondary_colour() {
        let state = CompositorState {
            stroke_width_px: 8,
            ..plain_state()
        };
        let frame = render(&state, &BlockTextEngine);
        assert_eq!(*frame.get_pixel(61, 470), state.secondary_color.to_rgba());
        assert_eq!(*frame.get_pixel(70, 470), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn shadow_darkens_below_the_text() {
        let base = plain_state();
        let shadowed = CompositorState {
            shadow_on: true,
            ..plain_state()
        };
        let without = render(&base, &BlockTextEngine);
        let with = render(&shadowed, &BlockTextEngine);
        // Just below the first glyph block.
        let (x, y) = (90, 522);
        assert!(with.get_pixel(x, y).0[0] < without.get_pixel(x, y).0[0]);
    }

    #[test]
    fn center_alignment_centres_each_line() {
        let state = CompositorState {
            title: "AB".to_string(),
            title_size_px: 100,
            subtitle: String::new(),
            text_align: TextAlign::Center,
            ..plain_state()
        };
        let frame = render(&state, &BlockTextEngine);
        // Line is 120px wide, so it starts at x = 580.
        let y = 418 + 40;
        assert_eq!(*frame.get_pixel(585, y), Rgba([255, 255, 255, 255]));
        assert_ne!(*frame.get_pixel(575, y), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn subtitle_follows_title_and_blank_subtitle_is_skipped() {
        let with_subtitle = CompositorState {
            title: "A".to_string(),
            title_size_px: 100,
            subtitle: "M".to_string(),
            ..plain_state()
        };
        let blank = CompositorState {
            subtitle: "   ".to_string(),
            ..with_subtitle.clone()
        };
        // Title ends at 417.6 + 105; subtitle starts 16px lower, glyph rows 547..586.
        let white = Rgba([255, 255, 255, 255]);
        assert_eq!(*render(&with_subtitle, &BlockTextEngine).get_pixel(70, 565), white);
        assert_ne!(*render(&blank, &BlockTextEngine).get_pixel(70, 565), white);
    }

    #[test]
    fn cover_background_fills_the_canvas() {
        let green = Rgba([0, 255, 0, 255]);
        // 4:3 source is cropped to the middle 1280x720 band.
        let state = CompositorState {
            background_image: Some(RgbaImage::from_pixel(1280, 960, green)),
            ..plain_state()
        };
        let frame = render(&state, &BlockTextEngine);
        assert_eq!(*frame.get_pixel(0, 0), green);
        assert_eq!(*frame.get_pixel(1279, 100), green);
    }

    #[test]
    fn contained_background_letterboxes_over_gradient() {
        let red = Rgba([255, 0, 0, 255]);
        let state = CompositorState {
            background_image: Some(RgbaImage::from_pixel(360, 720, red)),
            background_fit: FitMode::Contain,
            ..plain_state()
        };
        let frame = render(&state, &BlockTextEngine);
        // 360x720 centred: x 460..820.
        assert_eq!(*frame.get_pixel(640, 100), red);
        assert_ne!(*frame.get_pixel(100, 100), red);
    }

    #[test]
    fn logo_is_contained_at_the_corner() {
        let blue = Rgba([0, 0, 255, 255]);
        let state = CompositorState {
            logo_image: Some(RgbaImage::from_pixel(200, 100, blue)),
            ..plain_state()
        };
        let frame = render(&state, &BlockTextEngine);
        // 200x100 at (24, 24).
        assert_eq!(*frame.get_pixel(24, 24), blue);
        assert_eq!(*frame.get_pixel(223, 123), blue);
        assert_ne!(*frame.get_pixel(100, 130), blue);
        assert_ne!(*frame.get_pixel(230, 50), blue);
    }
}
