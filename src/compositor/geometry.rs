use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a source image maps onto a fixed-size destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    #[default]
    Cover,
    Contain,
    Stretch,
}

impl FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            "stretch" => Ok(FitMode::Stretch),
            other => Err(format!("unknown fit mode '{}'", other)),
        }
    }
}

/// Source rectangle `s*` drawn into destination rectangle `d*`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    pub sx: f64,
    pub sy: f64,
    pub s_width: f64,
    pub s_height: f64,
    pub dx: f64,
    pub dy: f64,
    pub d_width: f64,
    pub d_height: f64,
}

impl FitRect {
    fn full(sw: f64, sh: f64, dw: f64, dh: f64) -> Self {
        Self {
            sx: 0.0,
            sy: 0.0,
            s_width: sw,
            s_height: sh,
            dx: 0.0,
            dy: 0.0,
            d_width: dw,
            d_height: dh,
        }
    }
}

pub fn fit_rect(sw: f64, sh: f64, dw: f64, dh: f64, mode: FitMode) -> FitRect {
    // Degenerate sizes have no aspect ratio to honour.
    if mode == FitMode::Stretch || sw <= 0.0 || sh <= 0.0 || dw <= 0.0 || dh <= 0.0 {
        return FitRect::full(sw, sh, dw, dh);
    }

    // Cross-multiplied so equal aspect ratios compare exactly.
    let source_span = sw * dh;
    let dest_span = sh * dw;
    if source_span == dest_span {
        return FitRect::full(sw, sh, dw, dh);
    }
    let source_wider = source_span > dest_span;

    match mode {
        FitMode::Cover => {
            if source_wider {
                // Crop left and right.
                let s_width = sh * dw / dh;
                FitRect {
                    sx: (sw - s_width) / 2.0,
                    s_width,
                    ..FitRect::full(sw, sh, dw, dh)
                }
            } else {
                let s_height = sw * dh / dw;
                FitRect {
                    sy: (sh - s_height) / 2.0,
                    s_height,
                    ..FitRect::full(sw, sh, dw, dh)
                }
            }
        }
        FitMode::Contain => {
            if source_wider {
                // Pad top and bottom.
                let d_height = dw * sh / sw;
                FitRect {
                    dy: (dh - d_height) / 2.0,
                    d_height,
                    ..FitRect::full(sw, sh, dw, dh)
                }
            } else {
                let d_width = dh * sw / sh;
                FitRect {
                    dx: (dw - d_width) / 2.0,
                    d_width,
                    ..FitRect::full(sw, sh, dw, dh)
                }
            }
        }
        FitMode::Stretch => FitRect::full(sw, sh, dw, dh),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_uses_both_full_rects() {
        for (sw, sh, dw, dh) in [(100.0, 50.0, 200.0, 100.0), (7.0, 900.0, 1280.0, 720.0), (1.0, 1.0, 3.0, 9.0)] {
            assert_eq!(fit_rect(sw, sh, dw, dh, FitMode::Stretch), FitRect::full(sw, sh, dw, dh));
        }
    }

    #[test]
    fn contain_tall_source_pads_horizontally() {
        let r = fit_rect(100.0, 200.0, 200.0, 100.0, FitMode::Contain);
        assert_eq!(r.dx, 75.0);
        assert_eq!(r.dy, 0.0);
        assert_eq!(r.d_width.round(), 50.0);
        assert_eq!(r.d_height.round(), 100.0);
        assert_eq!((r.sx, r.sy, r.s_width, r.s_height), (0.0, 0.0, 100.0, 200.0));
    }

    #[test]
    fn contain_wide_source_pads_vertically() {
        let r = fit_rect(400.0, 100.0, 200.0, 100.0, FitMode::Contain);
        assert_eq!(r.d_width, 200.0);
        assert_eq!(r.d_height, 50.0);
        assert_eq!(r.dy, 25.0);
    }

    #[test]
    fn cover_wide_source_crops_width() {
        let r = fit_rect(400.0, 100.0, 200.0, 100.0, FitMode::Cover);
        assert_eq!(r.s_width.round(), 200.0);
        assert_eq!(r.s_height.round(), 100.0);
        assert_eq!(r.sx, 100.0);
        assert_eq!((r.dx, r.dy, r.d_width, r.d_height), (0.0, 0.0, 200.0, 100.0));
    }

    #[test]
    fn cover_tall_source_crops_height() {
        let r = fit_rect(100.0, 400.0, 200.0, 100.0, FitMode::Cover);
        assert_eq!(r.s_width, 100.0);
        assert_eq!(r.s_height, 50.0);
        assert_eq!(r.sy, 175.0);
    }

    #[test]
    fn equal_aspect_is_a_full_fit_in_every_mode() {
        for mode in [FitMode::Cover, FitMode::Contain] {
            let r = fit_rect(640.0, 360.0, 1280.0, 720.0, mode);
            assert_eq!(r, FitRect::full(640.0, 360.0, 1280.0, 720.0));
        }
    }

    #[test]
    fn fit_mode_parses_case_insensitively() {
        assert_eq!("Contain".parse::<FitMode>(), Ok(FitMode::Contain));
        assert!("zoom".parse::<FitMode>().is_err());
    }
}
