use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::captions;
use crate::data::{self, DataAttachment};
use crate::elements::TextElement;
use crate::extract::{Extraction, extract_elements};
use crate::inpaint::{Inpainter, TeleaInpainter, TextRemover};
use crate::ocr::{TesseractDetector, TextDetector};
use crate::overlay::{Compositor, FontBook};
use crate::prompts;
use crate::providers::{self, ImageOracle, PollinationsImage, TextOracle};
use crate::settings::Settings;
use crate::variations::{Variation, VariationGenerator};

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub original: RgbImage,
    /// The upload with detected text painted out. Identical to `original`
    /// when only the placeholder was offered.
    pub clean: RgbImage,
    pub elements: Vec<TextElement>,
    pub width: u32,
    pub height: u32,
}

/// Owns every service handle the pipeline needs. Built once, then shared
/// read-only between requests.
pub struct Editor {
    settings: Settings,
    detector: Arc<dyn TextDetector>,
    remover: TextRemover,
    compositor: Compositor,
    variations: VariationGenerator,
    text_oracle: Option<Arc<dyn TextOracle>>,
}

impl Editor {
    pub fn new(
        settings: Settings,
        detector: Arc<dyn TextDetector>,
        inpainter: Arc<dyn Inpainter>,
        fonts: FontBook,
        text_oracle: Option<Arc<dyn TextOracle>>,
        image_oracle: Option<Arc<dyn ImageOracle>>,
    ) -> Self {
        let compositor = Compositor::new(fonts, settings.outline_radius);
        let variations = VariationGenerator::new(
            compositor.clone(),
            text_oracle.clone(),
            image_oracle,
            settings.variation_options(),
        );
        Self {
            remover: TextRemover::new(inpainter, settings.removal_radius),
            detector,
            compositor,
            variations,
            text_oracle,
            settings,
        }
    }

    /// Wires the bundled services: tesseract detection, the built-in
    /// inpainter, system plus bundled fonts, and the configured oracles.
    pub fn from_settings(
        settings: Settings,
        model_arg: Option<&str>,
        key: Option<&str>,
    ) -> Result<Self> {
        let fonts = FontBook::load(settings.font_path.as_deref().map(Path::new))
            .with_context(|| "failed to load fonts")?;

        let model_arg = model_arg.or(settings.oracle_model.as_deref());
        let text_oracle =
            providers::resolve_provider_selection(&settings.oracle_provider, model_arg, key)?
                .and_then(|selection| {
                    let oracle = providers::build_text_oracle(&selection, key);
                    match &oracle {
                        Some(_) => info!("text oracle: {}", selection.provider.as_str()),
                        None => warn!(
                            "no API key for {}; text oracle disabled",
                            selection.provider.as_str()
                        ),
                    }
                    oracle
                });
        let image_oracle: Option<Arc<dyn ImageOracle>> = if settings.image_oracle_enabled() {
            Some(Arc::new(PollinationsImage::new()))
        } else {
            None
        };

        let detector = Arc::new(TesseractDetector::new(
            settings.detection_languages.clone(),
            settings.detection_psm,
        ));
        Ok(Self::new(
            settings,
            detector,
            Arc::new(TeleaInpainter),
            fonts,
            text_oracle,
            image_oracle,
        ))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Decodes the upload, extracts editable text and erases it from the
    /// pixels. Only an undecodable upload is an error.
    pub fn upload(&self, attachment: &DataAttachment) -> Result<UploadOutcome> {
        let original = data::decode_image(attachment)?;
        let (width, height) = original.dimensions();
        info!("processing {}x{} upload ({})", width, height, attachment.mime);

        let Extraction {
            elements,
            removal_boxes,
        } = extract_elements(
            self.detector.as_ref(),
            &original,
            &self.settings.extract_options(),
        );
        let clean = self.remover.remove(&original, &removal_boxes);
        Ok(UploadOutcome {
            original,
            clean,
            elements,
            width,
            height,
        })
    }

    pub fn render_preview(&self, image: &RgbImage, elements: &[TextElement]) -> Result<RgbImage> {
        self.compositor.render(image, elements)
    }

    pub async fn generate(
        &self,
        image: &RgbImage,
        elements: &[TextElement],
        style: Option<&str>,
    ) -> Vec<Variation> {
        self.variations.generate(image, elements, style).await
    }

    pub async fn suggest_captions(&self, image: &RgbImage) -> Result<Vec<String>> {
        let prompt = prompts::meme_captions_prompt(captions::MAX_CAPTIONS)?;
        let attachment = DataAttachment::png(image)?;
        Ok(captions::suggest_captions(
            self.text_oracle.as_deref(),
            prompt,
            attachment,
            self.settings.oracle_timeout(),
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::FAILURE_FALLBACK;
    use crate::ocr::DetectionResult;
    use image::{GrayImage, Rgb};

    struct OneWord;

    impl TextDetector for OneWord {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectionResult>> {
            Ok(vec![DetectionResult::from_rect(
                10.0, 10.0, 100.0, 30.0, "HELLO", 0.9,
            )])
        }
    }

    struct Blind;

    impl TextDetector for Blind {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectionResult>> {
            Ok(Vec::new())
        }
    }

    /// Paints masked pixels red so the erased area is easy to find.
    struct RedFill;

    impl Inpainter for RedFill {
        fn inpaint(&self, image: &RgbImage, mask: &GrayImage, _radius: u32) -> Result<RgbImage> {
            let mut out = image.clone();
            for (pixel, flag) in out.pixels_mut().zip(mask.pixels()) {
                if flag.0[0] > 0 {
                    *pixel = Rgb([255, 0, 0]);
                }
            }
            Ok(out)
        }
    }

    fn editor(detector: Arc<dyn TextDetector>) -> Editor {
        Editor::new(
            Settings::default(),
            detector,
            Arc::new(RedFill),
            FontBook::bundled(),
            None,
            None,
        )
    }

    fn upload_of(image: &RgbImage) -> DataAttachment {
        DataAttachment::png(image).unwrap()
    }

    #[test]
    fn blank_upload_gets_placeholder_and_untouched_image() {
        let image = RgbImage::from_pixel(400, 300, Rgb([30, 60, 90]));
        let outcome = editor(Arc::new(Blind)).upload(&upload_of(&image)).unwrap();
        assert_eq!((outcome.width, outcome.height), (400, 300));
        assert_eq!(outcome.elements.len(), 1);
        assert!(outcome.elements[0].is_placeholder);
        assert_eq!(outcome.clean, image);
        assert_eq!(outcome.original, image);
    }

    #[test]
    fn detected_text_is_erased_with_padding() {
        let image = RgbImage::from_pixel(200, 100, Rgb([250, 250, 250]));
        let outcome = editor(Arc::new(OneWord)).upload(&upload_of(&image)).unwrap();
        assert_eq!(outcome.elements[0].text, "HELLO");
        assert_eq!(outcome.clean.get_pixel(7, 7), &Rgb([255, 0, 0]));
        assert_eq!(outcome.clean.get_pixel(113, 43), &Rgb([255, 0, 0]));
        assert_eq!(outcome.clean.get_pixel(6, 6), &Rgb([250, 250, 250]));
        assert_eq!(outcome.clean.get_pixel(114, 44), &Rgb([250, 250, 250]));
    }

    #[test]
    fn undecodable_upload_is_an_error() {
        let attachment = DataAttachment {
            bytes: b"definitely not a picture".to_vec(),
            mime: "image/png".to_string(),
            name: None,
        };
        assert!(editor(Arc::new(Blind)).upload(&attachment).is_err());
    }

    #[test]
    fn preview_without_elements_is_identical() {
        let image = RgbImage::from_fn(20, 10, |x, y| Rgb([x as u8, y as u8, 7]));
        let preview = editor(Arc::new(Blind)).render_preview(&image, &[]).unwrap();
        assert_eq!(preview, image);
    }

    #[tokio::test]
    async fn captions_fall_back_without_oracle() {
        let image = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let captions = editor(Arc::new(Blind)).suggest_captions(&image).await.unwrap();
        assert_eq!(captions, FAILURE_FALLBACK.map(str::to_string).to_vec());
    }

    #[tokio::test]
    async fn generate_honors_configured_count() {
        let mut settings = Settings::default();
        settings.variation_count = 2;
        let editor = Editor::new(
            settings,
            Arc::new(Blind),
            Arc::new(RedFill),
            FontBook::bundled(),
            None,
            None,
        );
        let image = RgbImage::from_pixel(16, 16, Rgb([100, 100, 100]));
        let variations = editor.generate(&image, &[], None).await;
        assert_eq!(variations.len(), 2);
    }
}
