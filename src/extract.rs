use image::RgbImage;
use tracing::{debug, info, warn};

use crate::elements::{
    DEFAULT_COLOR, DEFAULT_FONT, DetectedBox, FontWeight, Position, TextElement,
    placeholder_element,
};
use crate::ocr::{DetectionResult, PaddedBox, TextDetector, bounding_box, padded_box};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.20;
pub const DEFAULT_PADDING: u32 = 3;
const MIN_FONT_SIZE: u32 = 20;
const MAX_FONT_SIZE: u32 = 72;

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub min_confidence: f32,
    pub padding: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            padding: DEFAULT_PADDING,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub elements: Vec<TextElement>,
    /// Regions to erase. Empty when the placeholder was synthesized.
    pub removal_boxes: Vec<PaddedBox>,
}

pub fn extract_elements(
    detector: &dyn TextDetector,
    image: &RgbImage,
    options: &ExtractOptions,
) -> Extraction {
    let (width, height) = image.dimensions();
    let detections = match detector.detect(image) {
        Ok(detections) => detections,
        Err(err) => {
            warn!("text detection failed, using placeholder: {err:#}");
            Vec::new()
        }
    };
    debug!("detector returned {} result(s)", detections.len());

    let retained = detections
        .into_iter()
        .filter(|detection| detection.confidence >= options.min_confidence)
        .collect::<Vec<_>>();
    if retained.is_empty() {
        info!("no confident text found; offering placeholder");
        return Extraction {
            elements: vec![placeholder_element(width, height)],
            removal_boxes: Vec::new(),
        };
    }

    let elements = retained
        .iter()
        .enumerate()
        .map(|(idx, detection)| element_from_detection(idx as u32 + 1, detection))
        .collect::<Vec<_>>();
    let removal_boxes = retained
        .iter()
        .map(|detection| padded_box(&detection.bbox, options.padding, width, height))
        .collect();
    info!("extracted {} text element(s)", elements.len());
    Extraction {
        elements,
        removal_boxes,
    }
}

fn element_from_detection(id: u32, detection: &DetectionResult) -> TextElement {
    let bbox = bounding_box(&detection.bbox);
    let size = estimate_font_size(bbox.h);
    let x = bbox.x.floor() as i32;
    let y = bbox.y.floor() as i32;
    TextElement {
        id,
        text: detection.text.trim().to_string(),
        position: Position {
            x,
            y: (bbox.y + bbox.h).floor() as i32,
        },
        font: DEFAULT_FONT.to_string(),
        size,
        color: DEFAULT_COLOR.to_string(),
        weight: FontWeight::for_size(size),
        confidence: Some((detection.confidence * 100.0).round() / 100.0),
        is_placeholder: false,
        bbox: Some(DetectedBox {
            x,
            y,
            width: bbox.w.floor() as i32,
            height: bbox.h.floor() as i32,
        }),
    }
}

pub fn estimate_font_size(height: f32) -> u32 {
    let estimate = (height * 0.9).round();
    if estimate.is_nan() {
        return MIN_FONT_SIZE;
    }
    (estimate.max(0.0) as u32).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    struct FixedDetector(Vec<DetectionResult>);

    impl TextDetector for FixedDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectionResult>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl TextDetector for FailingDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectionResult>> {
            Err(anyhow!("engine crashed"))
        }
    }

    fn blank(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb([30, 30, 30]))
    }

    #[test]
    fn empty_detection_yields_centered_placeholder() {
        let extraction =
            extract_elements(&FixedDetector(vec![]), &blank(400, 300), &ExtractOptions::default());
        assert!(extraction.removal_boxes.is_empty());
        assert_eq!(extraction.elements.len(), 1);
        let element = &extraction.elements[0];
        assert!(element.is_placeholder);
        assert_eq!(element.position, Position { x: 200, y: 150 });
    }

    #[test]
    fn detector_failure_behaves_like_no_text() {
        let extraction =
            extract_elements(&FailingDetector, &blank(40, 20), &ExtractOptions::default());
        assert!(extraction.removal_boxes.is_empty());
        assert_eq!(extraction.elements[0].position, Position { x: 20, y: 10 });
    }

    #[test]
    fn single_detection_maps_to_element() {
        let detector = FixedDetector(vec![DetectionResult::from_rect(
            10.0, 10.0, 100.0, 30.0, "HELLO", 0.9,
        )]);
        let extraction = extract_elements(&detector, &blank(200, 100), &ExtractOptions::default());
        assert_eq!(extraction.elements.len(), 1);
        let element = &extraction.elements[0];
        assert_eq!(element.id, 1);
        assert_eq!(element.text, "HELLO");
        assert_eq!(element.position, Position { x: 10, y: 40 });
        assert_eq!(element.size, 27);
        assert_eq!(element.weight, FontWeight::Normal);
        assert_eq!(element.confidence, Some(0.9));
        assert!(!element.is_placeholder);
        assert_eq!(
            extraction.removal_boxes,
            vec![PaddedBox {
                x0: 7,
                y0: 7,
                x1: 113,
                y1: 43
            }]
        );
    }

    #[test]
    fn low_confidence_results_never_appear() {
        let detector = FixedDetector(vec![
            DetectionResult::from_rect(0.0, 0.0, 50.0, 20.0, "noise", 0.19),
            DetectionResult::from_rect(0.0, 40.0, 50.0, 20.0, " keep ", 0.2),
            DetectionResult::from_rect(0.0, 80.0, 50.0, 20.0, "also", 0.556),
        ]);
        let extraction = extract_elements(&detector, &blank(100, 120), &ExtractOptions::default());
        let texts = extraction
            .elements
            .iter()
            .map(|element| (element.id, element.text.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(texts, vec![(1, "keep"), (2, "also")]);
        assert_eq!(extraction.elements[1].confidence, Some(0.56));
        assert_eq!(extraction.removal_boxes.len(), 2);
    }

    #[test]
    fn all_results_below_threshold_fall_back() {
        let detector = FixedDetector(vec![DetectionResult::from_rect(
            0.0, 0.0, 10.0, 10.0, "x", 0.05,
        )]);
        let extraction = extract_elements(&detector, &blank(10, 10), &ExtractOptions::default());
        assert!(extraction.elements[0].is_placeholder);
    }

    #[test]
    fn font_size_is_clamped() {
        assert_eq!(estimate_font_size(200.0), 72);
        assert_eq!(estimate_font_size(5.0), 20);
        assert_eq!(estimate_font_size(50.0), 45);
        assert_eq!(FontWeight::for_size(estimate_font_size(50.0)), FontWeight::Bold);
    }
}
