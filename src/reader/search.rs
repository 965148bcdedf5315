use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use image::{DynamicImage, GrayImage};
use tracing::{debug, info};

use super::{
    decoder::Decoder,
    prepare::{rotate, VariantGenerator, VariantKind},
    quality::{brightness, lighting_warning, LightingWarning, DEFAULT_SHARPNESS_THRESHOLD},
};
use crate::common::{DecodeResult, ScanError, ScanResult};

pub const DEFAULT_MAX_ATTEMPTS: usize = 12;
pub const DEFAULT_ROTATIONS: [i32; 5] = [0, 5, -5, 10, -10];

// Search options
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    max_attempts: usize,
    rotations: Vec<i32>,
    sharpness_threshold: f64,
    decoders: Vec<Decoder>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rotations: DEFAULT_ROTATIONS.to_vec(),
            sharpness_threshold: DEFAULT_SHARPNESS_THRESHOLD,
            decoders: vec![Decoder::Primary, Decoder::Fallback],
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on (variant, rotation) pairs evaluated per search.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Rotation angles in degrees, tried in order for every variant.
    pub fn rotations(mut self, rotations: &[i32]) -> Self {
        self.rotations = rotations.to_vec();
        self
    }

    /// Images with a Laplacian variance below this get the autofocus variant.
    pub fn sharpness_threshold(mut self, threshold: f64) -> Self {
        self.sharpness_threshold = threshold;
        self
    }

    /// Decoders handed each attempt, in order. The first one to read a symbol wins.
    pub fn decoders(mut self, decoders: &[Decoder]) -> Self {
        self.decoders = decoders.to_vec();
        self
    }

    /// Whether to try the fallback decoder after the primary one fails.
    pub fn fallback(self, enabled: bool) -> Self {
        if enabled {
            self.decoders(&[Decoder::Primary, Decoder::Fallback])
        } else {
            self.decoders(&[Decoder::Primary])
        }
    }

    pub fn get_max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn get_rotations(&self) -> &[i32] {
        &self.rotations
    }

    pub fn get_decoders(&self) -> &[Decoder] {
        &self.decoders
    }
}

// Method
//------------------------------------------------------------------------------

/// The combination that produced the first successful decode. Displays as
/// `decoder:variant:degrees`, e.g. `fallback:equalized:-5`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Method {
    pub decoder: Decoder,
    pub variant: VariantKind,
    pub rotation: i32,
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.decoder, self.variant, self.rotation)
    }
}

// Search outcome
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<DecodeResult>,
    pub attempts: usize,
    pub elapsed: Duration,
    pub method_used: Option<Method>,
    /// Distinct variants in the order they were first attempted.
    pub variants_tried: Vec<VariantKind>,
    pub sharpness: f64,
    pub brightness: f64,
}

impl SearchOutcome {
    fn new(sharpness: f64, brightness: f64) -> Self {
        Self {
            results: Vec::new(),
            attempts: 0,
            elapsed: Duration::ZERO,
            method_used: None,
            variants_tried: Vec::new(),
            sharpness,
            brightness,
        }
    }

    pub fn is_success(&self) -> bool {
        self.method_used.is_some()
    }

    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.payload.as_str())
    }

    pub fn lighting_warning(&self) -> Option<LightingWarning> {
        lighting_warning(self.brightness)
    }

    /// Decoded symbols, or [`ScanError::DecodeExhausted`] when nothing was read.
    pub fn into_result(self) -> ScanResult<Vec<DecodeResult>> {
        if self.is_success() {
            Ok(self.results)
        } else {
            Err(ScanError::DecodeExhausted { attempts: self.attempts })
        }
    }
}

// Recognition search
//------------------------------------------------------------------------------

/// Bounded search over variants x rotations x decoders, stopping at the first decode.
///
/// Each (variant, rotation) pair is one attempt and is handed to the primary decoder, then to
/// the fallback. Variants come from [`VariantGenerator`] in a fixed order, so the same image
/// always yields the same method and attempt count.
#[derive(Debug, Clone, Default)]
pub struct RecognitionSearch {
    options: SearchOptions,
    generator: VariantGenerator,
}

impl RecognitionSearch {
    pub fn new(options: SearchOptions) -> Self {
        let generator = VariantGenerator::new(options.sharpness_threshold);
        Self { options, generator }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn search(&self, img: &DynamicImage) -> SearchOutcome {
        self.search_gray(img.to_luma8())
    }

    /// Searches an encoded image (PNG, JPEG, BMP ...). Unreadable bytes give an exhausted
    /// outcome with no attempts.
    pub fn search_encoded(&self, bytes: &[u8]) -> SearchOutcome {
        match image::load_from_memory(bytes) {
            Ok(img) => self.search(&img),
            Err(e) => {
                debug!(error = %e, "Unreadable image");
                SearchOutcome::new(0.0, 0.0)
            }
        }
    }

    pub fn search_gray(&self, gray: GrayImage) -> SearchOutcome {
        self.search_gray_with(gray, |decoder, img| decoder.decode(img))
    }

    pub(crate) fn search_gray_with<F>(&self, gray: GrayImage, mut decode: F) -> SearchOutcome
    where
        F: FnMut(Decoder, &GrayImage) -> Vec<DecodeResult>,
    {
        let start = Instant::now();
        let is_empty = gray.width() == 0 || gray.height() == 0;
        let brightness = brightness(&gray);
        let mut variants = self.generator.generate_gray(gray);
        let mut outcome = SearchOutcome::new(variants.sharpness(), brightness);

        if is_empty || self.options.rotations.is_empty() || self.options.decoders.is_empty() {
            outcome.elapsed = start.elapsed();
            return outcome;
        }

        let max_attempts = self.options.max_attempts;
        'search: while outcome.attempts < max_attempts {
            let Some((variant, img)) = variants.next() else {
                break;
            };
            outcome.variants_tried.push(variant);

            for &rotation in &self.options.rotations {
                if outcome.attempts >= max_attempts {
                    break 'search;
                }
                outcome.attempts += 1;

                let rotated = rotate(&img, rotation);
                for &decoder in &self.options.decoders {
                    let results = decode(decoder, &rotated);
                    if !results.is_empty() {
                        outcome.method_used = Some(Method { decoder, variant, rotation });
                        outcome.results = results;
                        break 'search;
                    }
                }
                debug!(attempt = outcome.attempts, %variant, rotation, "No symbol decoded");
            }
        }

        outcome.elapsed = start.elapsed();
        match &outcome.method_used {
            Some(method) => info!(
                %method,
                attempts = outcome.attempts,
                symbols = outcome.results.len(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "QR decoded"
            ),
            None => debug!(
                attempts = outcome.attempts,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Search exhausted"
            ),
        }
        outcome
    }
}
