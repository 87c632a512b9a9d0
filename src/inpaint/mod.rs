mod telea;

use anyhow::Result;
use image::{GrayImage, Luma, RgbImage};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ocr::PaddedBox;

pub use telea::TeleaInpainter;

pub const DEFAULT_RADIUS: u32 = 7;
const MASK_ON: u8 = 255;

pub trait Inpainter: Send + Sync {
    /// Fills every pixel where `mask` is non-zero. Must not touch `image`.
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32) -> Result<RgbImage>;
}

pub fn build_mask(width: u32, height: u32, boxes: &[PaddedBox]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for region in boxes {
        let x_end = region.x1.min(width.saturating_sub(1));
        let y_end = region.y1.min(height.saturating_sub(1));
        if width == 0 || height == 0 || region.x0 > x_end || region.y0 > y_end {
            continue;
        }
        for y in region.y0..=y_end {
            for x in region.x0..=x_end {
                mask.put_pixel(x, y, Luma([MASK_ON]));
            }
        }
    }
    mask
}

#[derive(Clone)]
pub struct TextRemover {
    inpainter: Arc<dyn Inpainter>,
    radius: u32,
}

impl TextRemover {
    pub fn new(inpainter: Arc<dyn Inpainter>, radius: u32) -> Self {
        Self { inpainter, radius }
    }

    /// Returns a new image with the boxed regions filled in. Any inpainting
    /// failure degrades to an untouched copy.
    pub fn remove(&self, image: &RgbImage, boxes: &[PaddedBox]) -> RgbImage {
        if boxes.is_empty() {
            return image.clone();
        }
        let (width, height) = image.dimensions();
        let mask = build_mask(width, height, boxes);
        debug!(
            "inpainting {} region(s) with radius {}",
            boxes.len(),
            self.radius
        );
        match self.inpainter.inpaint(image, &mask, self.radius) {
            Ok(clean) if clean.dimensions() == (width, height) => clean,
            Ok(clean) => {
                warn!(
                    "inpainter returned {}x{} for a {}x{} image; keeping original",
                    clean.width(),
                    clean.height(),
                    width,
                    height
                );
                image.clone()
            }
            Err(err) => {
                warn!("text removal failed; keeping original: {err:#}");
                image.clone()
            }
        }
    }
}
