use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Bounding box
//------------------------------------------------------------------------------

/// Axis aligned rectangle in pixel coordinates of the searched image.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering an entire `width` x `height` image.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Smallest rectangle enclosing every point, clamped to the image. Returns `None` for an
    /// empty point set.
    pub fn enclosing<I>(points: I, img_w: u32, img_h: u32) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut pts = points.into_iter().peekable();
        pts.peek()?;

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in pts {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let clamp = |v: f64, hi: u32| v.round().clamp(0.0, hi as f64) as u32;
        let (x0, y0) = (clamp(min_x, img_w), clamp(min_y, img_h));
        let (x1, y1) = (clamp(max_x, img_w), clamp(max_y, img_h));
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }
}

// Decode result
//------------------------------------------------------------------------------

/// One decoded QR symbol.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DecodeResult {
    pub payload: String,
    pub bounding_box: BoundingBox,
}

impl DecodeResult {
    pub fn new(payload: String, bounding_box: BoundingBox) -> Self {
        Self { payload, bounding_box }
    }
}

// Source
//------------------------------------------------------------------------------

/// Where a receipt image came from.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Camera,
    CameraManual,
    Upload,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Camera, Source::CameraManual, Source::Upload];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::CameraManual => "camera_manual",
            Self::Upload => "upload",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|src| src.as_str() == s)
            .ok_or_else(|| format!("unknown source {s:?}, expected camera, camera_manual or upload"))
    }
}
