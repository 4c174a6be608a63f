use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::color::Color;
use super::geometry::FitMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl FromStr for TextAlign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(TextAlign::Left),
            "center" | "centre" => Ok(TextAlign::Center),
            "right" => Ok(TextAlign::Right),
            other => Err(format!("unknown alignment '{}'", other)),
        }
    }
}

impl fmt::Display for TextAlign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        };
        f.write_str(name)
    }
}

/// Everything the compositor needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorState {
    pub primary_color: Color,
    pub secondary_color: Color,
    pub text_color: Color,
    pub title: String,
    pub subtitle: String,
    pub title_size_px: u32,
    pub subtitle_size_px: u32,
    pub stroke_width_px: u32,
    pub shadow_on: bool,
    pub text_align: TextAlign,
    pub background_fit: FitMode,
    pub background_image: Option<RgbaImage>,
    pub logo_image: Option<RgbaImage>,
}

impl Default for CompositorState {
    fn default() -> Self {
        Self {
            primary_color: Color::rgb(0x0e, 0xa5, 0xe9),
            secondary_color: Color::rgb(0x1e, 0x29, 0x3b),
            text_color: Color::WHITE,
            title: "How to Build a Thumbnail Generator".to_string(),
            subtitle: "Step-by-step in 10 minutes".to_string(),
            title_size_px: 120,
            subtitle_size_px: 56,
            stroke_width_px: 8,
            shadow_on: true,
            text_align: TextAlign::Left,
            background_fit: FitMode::Cover,
            background_image: None,
            logo_image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_starter_design() {
        let state = CompositorState::default();
        assert_eq!(state.primary_color.to_string(), "#0ea5e9");
        assert_eq!(state.secondary_color.to_string(), "#1e293b");
        assert_eq!(state.text_color.to_string(), "#ffffff");
        assert_eq!(state.title_size_px, 120);
        assert_eq!(state.subtitle_size_px, 56);
        assert_eq!(state.stroke_width_px, 8);
        assert!(state.shadow_on);
        assert_eq!(state.text_align, TextAlign::Left);
        assert_eq!(state.background_fit, FitMode::Cover);
        assert!(state.background_image.is_none() && state.logo_image.is_none());
    }

    #[test]
    fn alignment_parses() {
        assert_eq!("Center".parse::<TextAlign>(), Ok(TextAlign::Center));
        assert_eq!(" right ".parse::<TextAlign>(), Ok(TextAlign::Right));
        assert!("justify".parse::<TextAlign>().is_err());
        assert_eq!(TextAlign::Center.to_string(), "center");
    }
}
