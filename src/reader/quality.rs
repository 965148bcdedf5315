use std::fmt::{Display, Formatter};

use image::GrayImage;
use imageproc::filter::laplacian_filter;

pub const DEFAULT_SHARPNESS_THRESHOLD: f64 = 100.0;
pub const DARK_BRIGHTNESS: f64 = 60.0;
pub const BRIGHT_BRIGHTNESS: f64 = 200.0;

// Sharpness
//------------------------------------------------------------------------------

/// Variance of the 4-neighbour Laplacian response. Higher is sharper; a flat image scores 0.
pub fn sharpness(img: &GrayImage) -> f64 {
    if img.width() < 3 || img.height() < 3 {
        return 0.0;
    }

    let lap = laplacian_filter(img);
    let n = lap.as_raw().len() as f64;
    let (sum, sq_sum) = lap.as_raw().iter().fold((0.0, 0.0), |(sum, sq_sum), &v| {
        let v = v as f64;
        (sum + v, sq_sum + v * v)
    });

    let mean = sum / n;
    (sq_sum / n - mean * mean).max(0.0)
}

// Brightness
//------------------------------------------------------------------------------

/// Mean luma in 0..=255. An empty image reports 0.
pub fn brightness(img: &GrayImage) -> f64 {
    let px = img.as_raw();
    if px.is_empty() {
        return 0.0;
    }
    px.iter().map(|&p| p as u64).sum::<u64>() as f64 / px.len() as f64
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LightingWarning {
    TooDark,
    TooBright,
}

impl Display for LightingWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooDark => f.write_str("image too dark"),
            Self::TooBright => f.write_str("image too bright"),
        }
    }
}

/// Hint for the capture layer. Never gates decoding.
pub fn lighting_warning(brightness: f64) -> Option<LightingWarning> {
    if brightness < DARK_BRIGHTNESS {
        Some(LightingWarning::TooDark)
    } else if brightness > BRIGHT_BRIGHTNESS {
        Some(LightingWarning::TooBright)
    } else {
        None
    }
}
