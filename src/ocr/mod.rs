mod engine;
mod geom;

use anyhow::Result;
use image::RgbImage;

pub use engine::{TesseractDetector, list_tesseract_languages};
pub use geom::{BoundingBox, PaddedBox, bounding_box, padded_box};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Four corners as reported by a detector, in any winding order.
pub type Quad = [Point; 4];

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DetectionResult {
    pub bbox: Quad,
    pub text: String,
    pub confidence: f32,
}

impl DetectionResult {
    pub fn new(bbox: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            text: text.into(),
            confidence,
        }
    }

    pub fn from_rect(x: f32, y: f32, w: f32, h: f32, text: impl Into<String>, confidence: f32) -> Self {
        Self::new(
            [
                Point::new(x, y),
                Point::new(x + w, y),
                Point::new(x + w, y + h),
                Point::new(x, y + h),
            ],
            text,
            confidence,
        )
    }
}

pub trait TextDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionResult>>;
}
