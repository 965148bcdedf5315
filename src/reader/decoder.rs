use std::fmt::{Display, Formatter};

use image::GrayImage;
use rqrr::PreparedImage;
use rxing::{helpers::detect_in_luma, BarcodeFormat};
use tracing::debug;

use super::text::decode_text;
use crate::common::{BoundingBox, DecodeResult};

/// Smallest side a version 1 symbol can occupy at one pixel per module.
pub const MIN_SYMBOL_DIM: u32 = 21;

// Decoder back-ends
//------------------------------------------------------------------------------

/// The two QR engines the search can use. Both are pure and report failure as an empty list.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Decoder {
    /// Multi-symbol reader from `rqrr`.
    Primary,
    /// ZXing's single-symbol QR reader from `rxing`.
    Fallback,
}

impl Decoder {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }

    pub fn decode(&self, img: &GrayImage) -> Vec<DecodeResult> {
        match self {
            Self::Primary => decode_primary(img),
            Self::Fallback => decode_fallback(img),
        }
    }
}

impl Display for Decoder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn too_small(img: &GrayImage) -> bool {
    img.width() < MIN_SYMBOL_DIM || img.height() < MIN_SYMBOL_DIM
}

// Primary
//------------------------------------------------------------------------------

/// Decodes every grid rqrr finds, in detection order. Grids failing error correction or
/// both text decodings are skipped.
pub fn decode_primary(img: &GrayImage) -> Vec<DecodeResult> {
    if too_small(img) {
        return Vec::new();
    }

    let (w, h) = img.dimensions();
    let mut prepared = PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
        img.get_pixel(x as u32, y as u32)[0]
    });

    prepared
        .detect_grids()
        .into_iter()
        .enumerate()
        .filter_map(|(i, grid)| {
            let mut bytes = Vec::new();
            if let Err(e) = grid.decode_to(&mut bytes) {
                debug!(grid = i, error = ?e, "Skipping undecodable grid");
                return None;
            }

            let Some(payload) = decode_text(&bytes) else {
                debug!(grid = i, "Skipping grid with undecodable text");
                return None;
            };

            let corners = grid.bounds.iter().map(|p| (p.x as f64, p.y as f64));
            let bounding_box = BoundingBox::enclosing(corners, w, h)?;
            Some(DecodeResult::new(payload, bounding_box))
        })
        .collect()
}

// Fallback
//------------------------------------------------------------------------------

/// Single-symbol decode. The box encloses the reported points when they form at least a
/// quadrilateral, otherwise it covers the whole image.
pub fn decode_fallback(img: &GrayImage) -> Vec<DecodeResult> {
    if too_small(img) {
        return Vec::new();
    }

    let (w, h) = img.dimensions();
    match detect_in_luma(img.as_raw().clone(), w, h, Some(BarcodeFormat::QR_CODE)) {
        Ok(res) => {
            let points = res.getPoints();
            let bounding_box = if points.len() >= 4 {
                let pts = points.iter().map(|p| (p.x as f64, p.y as f64));
                BoundingBox::enclosing(pts, w, h).unwrap_or(BoundingBox::full(w, h))
            } else {
                BoundingBox::full(w, h)
            };
            vec![DecodeResult::new(res.getText().to_string(), bounding_box)]
        }
        Err(e) => {
            debug!(error = ?e, "Fallback decoder found nothing");
            Vec::new()
        }
    }
}
