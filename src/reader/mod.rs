//! QR symbol recognition under poor capture conditions.
//!
//! [`RecognitionSearch`] feeds preprocessed variants of a photo ([`prepare`]) at a few small
//! rotations to two independent decoders ([`Decoder`]) and stops at the first symbol read.

pub mod decoder;
pub mod prepare;
pub mod quality;
pub mod search;
mod text;

pub use decoder::{decode_fallback, decode_primary, Decoder};
pub use prepare::{rotate, VariantGenerator, VariantKind, Variants};
pub use quality::{brightness, lighting_warning, sharpness, LightingWarning};
pub use search::{Method, RecognitionSearch, SearchOptions, SearchOutcome};
pub use text::decode_text;
