use super::color::Color;
use super::state::CompositorState;

/// A keyword-triggered colour pair used when no generated background is
/// available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub name: &'static str,
    pub primary: Color,
    pub secondary: Color,
}

struct PaletteRule {
    keywords: &'static [&'static str],
    palette: Palette,
}

// Order matters: the first rule with a matching keyword wins, and the first
// rule doubles as the default.
const RULES: [PaletteRule; 5] = [
    PaletteRule {
        keywords: &["cyber", "neon", "punk"],
        palette: Palette {
            name: "cyber",
            primary: Color::rgb(0xff, 0x00, 0x6e),
            secondary: Color::rgb(0x3a, 0x0c, 0xa3),
        },
    },
    PaletteRule {
        keywords: &["ocean", "wave", "blue"],
        palette: Palette {
            name: "ocean",
            primary: Color::rgb(0x0e, 0xa5, 0xe9),
            secondary: Color::rgb(0x08, 0x2f, 0x49),
        },
    },
    PaletteRule {
        keywords: &["forest", "green", "nature"],
        palette: Palette {
            name: "forest",
            primary: Color::rgb(0x22, 0xc5, 0x5e),
            secondary: Color::rgb(0x06, 0x4e, 0x3b),
        },
    },
    PaletteRule {
        keywords: &["sunset", "orange", "gold"],
        palette: Palette {
            name: "sunset",
            primary: Color::rgb(0xf5, 0x9e, 0x0b),
            secondary: Color::rgb(0x7c, 0x2d, 0x12),
        },
    },
    PaletteRule {
        keywords: &["pink", "magenta", "rose"],
        palette: Palette {
            name: "pink",
            primary: Color::rgb(0xec, 0x48, 0x99),
            secondary: Color::rgb(0x83, 0x18, 0x43),
        },
    },
];

/// Picks the palette for a prompt. Matching is case-insensitive substring.
pub fn palette_for(prompt: &str) -> Palette {
    let prompt = prompt.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| prompt.contains(k)))
        .unwrap_or(&RULES[0])
        .palette
}

/// Sets the palette colours and drops the background so the gradient shows.
pub fn apply_palette(state: &mut CompositorState, prompt: &str) -> Palette {
    let palette = palette_for(prompt);
    state.primary_color = palette.primary;
    state.secondary_color = palette.secondary;
    state.background_image = None;
    palette
}
