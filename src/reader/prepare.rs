use std::fmt::{Display, Formatter};

use image::{DynamicImage, GrayImage, Luma};
use imageproc::{
    contrast::{equalize_histogram, stretch_contrast},
    filter::{gaussian_blur_f32, median_filter},
    geometric_transformations::{rotate_about_center, Interpolation},
    stats::percentile,
};

use super::quality::{sharpness, DEFAULT_SHARPNESS_THRESHOLD};

// Local window of the adaptive threshold is (2 * radius + 1) squared
const THRESHOLD_RADIUS: u32 = 5;
const THRESHOLD_OFFSET: i64 = 2;

// Sigma of the 5x5 Gaussian kernel
const AUTOFOCUS_SIGMA: f32 = 1.1;
const DENOISE_SIGMA: f32 = 0.8;

// Percentiles mapped to 0 and 255 by the contrast stretch
const STRETCH_LOW: u8 = 1;
const STRETCH_HIGH: u8 = 99;

// Filters need at least a 3x3 neighbourhood
const MIN_FILTER_DIM: u32 = 3;

// Variant kind
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum VariantKind {
    /// Plain luma conversion.
    Grayscale,
    /// Blur then equalize, standing in for lens autofocus on blurry frames.
    Autofocus,
    /// Global histogram equalization.
    Equalized,
    /// Linear stretch of the 1st..99th luma percentile onto 0..255.
    Stretched,
    /// Local mean binarization, for glare and uneven lighting.
    Thresholded,
    /// Median filter plus a light blur, for sensor noise.
    Denoised,
}

impl VariantKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Autofocus => "autofocus",
            Self::Equalized => "equalized",
            Self::Stretched => "stretched",
            Self::Thresholded => "thresholded",
            Self::Denoised => "denoised",
        }
    }

    pub fn apply(&self, gray: &GrayImage) -> GrayImage {
        if gray.width() < MIN_FILTER_DIM || gray.height() < MIN_FILTER_DIM {
            return gray.clone();
        }
        match self {
            Self::Grayscale => gray.clone(),
            Self::Autofocus => equalize_histogram(&gaussian_blur_f32(gray, AUTOFOCUS_SIGMA)),
            Self::Equalized => equalize_histogram(gray),
            Self::Stretched => stretch_percentiles(gray, STRETCH_LOW, STRETCH_HIGH),
            Self::Thresholded => adaptive_threshold(gray, THRESHOLD_RADIUS, THRESHOLD_OFFSET),
            Self::Denoised => gaussian_blur_f32(&median_filter(gray, 1, 1), DENOISE_SIGMA),
        }
    }
}

impl Display for VariantKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Variant generator
//------------------------------------------------------------------------------

/// Produces the fixed-order sequence of preprocessed images tried by the search.
#[derive(Debug, Clone, Copy)]
pub struct VariantGenerator {
    sharpness_threshold: f64,
}

impl Default for VariantGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SHARPNESS_THRESHOLD)
    }
}

impl VariantGenerator {
    pub fn new(sharpness_threshold: f64) -> Self {
        Self { sharpness_threshold }
    }

    pub fn sharpness_threshold(&self) -> f64 {
        self.sharpness_threshold
    }

    /// Variant order for an image of the given sharpness. The autofocus variant is only
    /// included for blurry images and comes right after the plain conversion.
    pub fn plan(&self, sharpness: f64) -> Vec<VariantKind> {
        let mut kinds = vec![VariantKind::Grayscale];
        if sharpness < self.sharpness_threshold {
            kinds.push(VariantKind::Autofocus);
        }
        kinds.extend([
            VariantKind::Equalized,
            VariantKind::Stretched,
            VariantKind::Thresholded,
            VariantKind::Denoised,
        ]);
        kinds
    }

    pub fn generate(&self, img: &DynamicImage) -> Variants {
        self.generate_gray(img.to_luma8())
    }

    /// Variants are computed lazily, one per call to `next`.
    pub fn generate_gray(&self, gray: GrayImage) -> Variants {
        let sharpness = sharpness(&gray);
        let kinds = self.plan(sharpness);
        Variants { gray, sharpness, kinds: kinds.into_iter() }
    }
}

// Iterator over variants
//------------------------------------------------------------------------------

pub struct Variants {
    gray: GrayImage,
    sharpness: f64,
    kinds: std::vec::IntoIter<VariantKind>,
}

impl Variants {
    pub fn source(&self) -> &GrayImage {
        &self.gray
    }

    pub fn sharpness(&self) -> f64 {
        self.sharpness
    }

    /// Remaining variant kinds, without computing them.
    pub fn kinds(&self) -> &[VariantKind] {
        self.kinds.as_slice()
    }
}

impl Iterator for Variants {
    type Item = (VariantKind, GrayImage);

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.kinds.next()?;
        Some((kind, kind.apply(&self.gray)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.kinds.size_hint()
    }
}

// Rotation
//------------------------------------------------------------------------------

/// Rotates about the centre, filling uncovered corners with white so the quiet zone survives.
/// Zero degrees returns the image untouched.
pub fn rotate(gray: &GrayImage, degrees: i32) -> GrayImage {
    if degrees == 0 || gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let theta = (degrees as f32).to_radians();
    rotate_about_center(gray, theta, Interpolation::Bilinear, Luma([255]))
}

// Point operations
//------------------------------------------------------------------------------

fn stretch_percentiles(gray: &GrayImage, low: u8, high: u8) -> GrayImage {
    let (lo, hi) = (percentile(gray, low), percentile(gray, high));
    if hi <= lo {
        return gray.clone();
    }
    stretch_contrast(gray, lo, hi, 0, 255)
}

// Mean of the (2r+1)^2 window around each pixel, clipped at the borders, from an integral image.
// Pixels brighter than mean - offset turn white, the rest black.
fn adaptive_threshold(gray: &GrayImage, radius: u32, offset: i64) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let px = gray.as_raw();

    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += px[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let r = radius as usize;
    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        let (y0, y1) = (y.saturating_sub(r), (y + r + 1).min(h));
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(r), (x + r + 1).min(w));
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((y1 - y0) * (x1 - x0)) as i64;

            let p = px[y * w + x] as i64;
            let val = if p * count > sum as i64 - offset * count { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([val]));
        }
    }
    out
}
