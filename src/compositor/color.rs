use image::Rgba;
use std::fmt;
use std::str::FromStr;

/// Opaque sRGB colour, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Accepts `#rrggbb`, `rrggbb` and the short `#rgb` form.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Some(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => None,
        }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }

    /// Linear interpolation, `t` clamped to `[0, 1]`.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::rgb(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s).ok_or_else(|| format!("invalid colour '{}'", s))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Source-over of `color` at `alpha` onto an opaque destination pixel.
pub fn blend_over(dst: &mut Rgba<u8>, color: Color, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let a = ((alpha * 255.0).round() as u16).min(255);
    let inv = 255 - a;
    let mix = |src: u8, dst: u8| ((u16::from(src) * a + u16::from(dst) * inv + 127) / 255) as u8;
    dst.0[0] = mix(color.r, dst.0[0]);
    dst.0[1] = mix(color.g, dst.0[1]);
    dst.0[2] = mix(color.b, dst.0[2]);
    dst.0[3] = 255;
}
