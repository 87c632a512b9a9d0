mod parse;
mod preprocess;
mod tesseract;
mod text;

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use std::io::Write;
use tracing::debug;

use crate::ocr::{DetectionResult, TextDetector};

pub use tesseract::list_tesseract_languages;

/// Runs the `tesseract` CLI on a preprocessed copy of the image and reports
/// one detection per text line, in source-image coordinates.
#[derive(Debug, Clone)]
pub struct TesseractDetector {
    languages: String,
    psm: u32,
}

impl TesseractDetector {
    pub fn new(languages: impl Into<String>, psm: u32) -> Self {
        Self {
            languages: languages.into(),
            psm,
        }
    }
}

impl TextDetector for TesseractDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionResult>> {
        let (width, _) = image.dimensions();
        let scale = preprocess::ocr_scale(width);
        let languages = tesseract::resolve_languages(&self.languages)?;
        let prepared = preprocess::preprocess_for_ocr(image, scale);

        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        DynamicImage::ImageLuma8(prepared)
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        let tsv = tesseract::run_tsv(tmp.path(), &languages, self.psm)?;
        let lines = parse::parse_tsv_lines(&tsv);
        debug!("tesseract returned {} line(s) at scale {}", lines.len(), scale);

        let factor = scale.max(1) as f32;
        Ok(lines
            .into_iter()
            .map(|line| {
                DetectionResult::from_rect(
                    line.bbox.x as f32 / factor,
                    line.bbox.y as f32 / factor,
                    line.bbox.w as f32 / factor,
                    line.bbox.h as f32 / factor,
                    line.text,
                    (line.conf / 100.0).clamp(0.0, 1.0),
                )
            })
            .collect())
    }
}
