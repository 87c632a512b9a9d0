mod filters;
mod guidance;

use anyhow::{Result, anyhow};
use futures_util::{StreamExt, stream};
use image::{DynamicImage, RgbImage, imageops};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::DataAttachment;
use crate::elements::TextElement;
use crate::overlay::Compositor;
use crate::prompts;
use crate::providers::{ImageOracle, TextOracle};

pub use filters::{FilterStep, Kernel, apply_steps};
pub use guidance::steps_from_guidance;

pub const MAX_VARIATIONS: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const MIN_STYLE_CHARS: usize = 4;
const GENERATED_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleMode {
    /// Ask the image oracle for a new picture in the requested style.
    #[default]
    Background,
    /// Ask the text oracle how to filter the existing picture.
    Guidance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationSource {
    Local,
    Oracle,
    Fallback,
}

impl VariationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariationSource::Local => "local",
            VariationSource::Oracle => "oracle",
            VariationSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug)]
pub struct Variation {
    pub id: u32,
    pub effect: String,
    pub description: String,
    pub result: Result<(RgbImage, VariationSource)>,
}

#[derive(Debug, Clone)]
pub struct VariationOptions {
    pub count: usize,
    pub style_mode: StyleMode,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for VariationOptions {
    fn default() -> Self {
        Self {
            count: MAX_VARIATIONS,
            style_mode: StyleMode::default(),
            concurrency: num_cpus::get().max(1),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    id: u32,
    effect: String,
    description: String,
    prompt_suffix: Option<&'static str>,
    recipe: Vec<FilterStep>,
}

fn local_recipe(index: usize) -> (&'static str, &'static str, Vec<FilterStep>) {
    match index {
        0 => (
            "Enhanced Colors",
            "Vibrant colors with enhanced contrast",
            vec![
                FilterStep::Color(1.3),
                FilterStep::Contrast(1.2),
                FilterStep::Brightness(1.1),
            ],
        ),
        1 => (
            "Artistic Filter",
            "Stylized artistic look",
            vec![
                FilterStep::Kernel(Kernel::Smooth),
                FilterStep::Color(1.4),
                FilterStep::Sharpness(0.8),
            ],
        ),
        _ => (
            "Professional",
            "Clean professional look",
            vec![
                FilterStep::Kernel(Kernel::Sharpen),
                FilterStep::Contrast(1.15),
                FilterStep::Brightness(1.05),
            ],
        ),
    }
}

const STYLED_EFFECTS: [(&str, &str); MAX_VARIATIONS] = [
    ("Modern", ", modern professional design, high quality, 4k"),
    ("Vibrant", ", vibrant colorful artistic design, beautiful"),
    ("Minimalist", ", minimalist clean elegant design, simple"),
];

/// A style directive counts only when it has more than three characters.
pub fn normalize_style(style: Option<&str>) -> Option<&str> {
    style
        .map(str::trim)
        .filter(|style| style.chars().count() >= MIN_STYLE_CHARS)
}

fn plan_slots(count: usize, style: Option<&str>) -> Vec<Slot> {
    let count = count.clamp(1, MAX_VARIATIONS);
    (0..count)
        .map(|index| {
            let (name, description, recipe) = local_recipe(index);
            match style {
                None => Slot {
                    id: index as u32 + 1,
                    effect: name.to_string(),
                    description: description.to_string(),
                    prompt_suffix: None,
                    recipe,
                },
                Some(style) => {
                    let (label, suffix) = STYLED_EFFECTS[index];
                    Slot {
                        id: index as u32 + 1,
                        effect: format!("{style} - {label}"),
                        description: format!("{label} style with {style}"),
                        prompt_suffix: Some(suffix),
                        recipe,
                    }
                }
            }
        })
        .collect()
}

pub struct VariationGenerator {
    compositor: Compositor,
    text_oracle: Option<Arc<dyn TextOracle>>,
    image_oracle: Option<Arc<dyn ImageOracle>>,
    options: VariationOptions,
}

impl VariationGenerator {
    pub fn new(
        compositor: Compositor,
        text_oracle: Option<Arc<dyn TextOracle>>,
        image_oracle: Option<Arc<dyn ImageOracle>>,
        options: VariationOptions,
    ) -> Self {
        Self {
            compositor,
            text_oracle,
            image_oracle,
            options,
        }
    }

    /// Produces one variation per slot, in slot order. A failing slot is
    /// reported in place; the others still complete.
    pub async fn generate(
        &self,
        base: &RgbImage,
        elements: &[TextElement],
        style: Option<&str>,
    ) -> Vec<Variation> {
        let style = normalize_style(style);
        let slots = plan_slots(self.options.count, style);
        let texts = elements
            .iter()
            .map(|element| element.text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        info!(
            "generating {} variation(s){}",
            slots.len(),
            style
                .map(|style| format!(" for style '{style}'"))
                .unwrap_or_default()
        );

        let base = Arc::new(base.clone());
        let elements: Arc<[TextElement]> = elements.into();
        stream::iter(slots)
            .map(|slot| {
                let texts = &texts;
                let base = &base;
                let elements = &elements;
                async move {
                    let result = self.run_slot(&slot, base, elements, style, texts).await;
                    if let Err(err) = &result {
                        warn!("variation {} '{}' failed: {err:#}", slot.id, slot.effect);
                    }
                    Variation {
                        id: slot.id,
                        effect: slot.effect,
                        description: slot.description,
                        result,
                    }
                }
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await
    }

    /// Oracle waits happen here; filtering and text rendering run on the
    /// blocking pool so slots overlap their pixel work too.
    async fn run_slot(
        &self,
        slot: &Slot,
        base: &Arc<RgbImage>,
        elements: &Arc<[TextElement]>,
        style: Option<&str>,
        texts: &[String],
    ) -> Result<(RgbImage, VariationSource)> {
        let (backdrop, source) = match (style, slot.prompt_suffix) {
            (Some(style), Some(suffix)) => {
                self.styled_backdrop(slot, base, style, suffix, texts).await?
            }
            _ => (Backdrop::Filtered(slot.recipe.clone()), VariationSource::Local),
        };
        let compositor = self.compositor.clone();
        let base = Arc::clone(base);
        let elements = Arc::clone(elements);
        let composed = tokio::task::spawn_blocking(move || {
            compositor.render(&backdrop.realize(&base), &elements)
        })
        .await
        .map_err(|err| anyhow!("render task for variation {} failed: {err}", slot.id))??;
        Ok((composed, source))
    }

    async fn styled_backdrop(
        &self,
        slot: &Slot,
        base: &RgbImage,
        style: &str,
        suffix: &str,
        texts: &[String],
    ) -> Result<(Backdrop, VariationSource)> {
        let attempt = match self.options.style_mode {
            StyleMode::Background => self.background(style, suffix, texts).await?,
            StyleMode::Guidance => self.guidance(slot, base, style, suffix, texts).await?,
        };
        match attempt {
            Ok(backdrop) => Ok((backdrop, VariationSource::Oracle)),
            Err(reason) => {
                warn!("variation {} falls back to local filters: {reason:#}", slot.id);
                Ok((Backdrop::Filtered(slot.recipe.clone()), VariationSource::Fallback))
            }
        }
    }

    /// Outer error: the slot itself failed. Inner error: the oracle was
    /// unusable and the slot should fall back.
    async fn background(
        &self,
        style: &str,
        suffix: &str,
        texts: &[String],
    ) -> Result<Result<Backdrop>> {
        let Some(oracle) = &self.image_oracle else {
            return Ok(Err(anyhow!("no image oracle configured")));
        };
        let prompt = prompts::background_prompt(style, suffix, texts)?;
        debug!("background prompt: {}", prompt);
        let request = oracle.generate_image(prompt, GENERATED_SIZE, GENERATED_SIZE);
        match tokio::time::timeout(self.options.timeout, request).await {
            Ok(Ok(image)) => Ok(Ok(Backdrop::Generated(image))),
            Ok(Err(err)) => Ok(Err(err)),
            Err(_) => Ok(Err(anyhow!("image oracle timed out"))),
        }
    }

    async fn guidance(
        &self,
        slot: &Slot,
        base: &RgbImage,
        style: &str,
        suffix: &str,
        texts: &[String],
    ) -> Result<Result<Backdrop>> {
        let Some(oracle) = &self.text_oracle else {
            return Ok(Err(anyhow!("no text oracle configured")));
        };
        let prompt = prompts::edit_guidance_prompt(style, suffix, &slot.effect, texts)?;
        let attachment = DataAttachment::png(base)?;
        let request = oracle.generate_text(prompt, Some(attachment));
        let reply = match tokio::time::timeout(self.options.timeout, request).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => reply,
            Ok(Ok(_)) => return Ok(Err(anyhow!("text oracle returned nothing"))),
            Ok(Err(err)) => return Ok(Err(err)),
            Err(_) => return Ok(Err(anyhow!("text oracle timed out"))),
        };
        debug!("guidance for variation {}: {}", slot.id, reply);
        match steps_from_guidance(&slot.effect, &reply) {
            Some(steps) => Ok(Ok(Backdrop::Filtered(steps))),
            None => Ok(Err(anyhow!("guidance did not name any adjustment"))),
        }
    }
}

/// What a slot draws its text over, before any pixel work is done.
enum Backdrop {
    /// Oracle output, scaled to the base size when realized.
    Generated(DynamicImage),
    Filtered(Vec<FilterStep>),
}

impl Backdrop {
    fn realize(self, base: &RgbImage) -> RgbImage {
        match self {
            Backdrop::Generated(image) => {
                let (width, height) = base.dimensions();
                imageops::resize(&image.to_rgb8(), width, height, imageops::FilterType::Lanczos3)
            }
            Backdrop::Filtered(steps) => apply_steps(base, &steps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Position, TextElement};
    use crate::overlay::{DEFAULT_OUTLINE_RADIUS, FontBook};
    use crate::providers::OracleFuture;
    use image::Rgb;

    struct FailingImages;

    impl ImageOracle for FailingImages {
        fn generate_image(&self, _prompt: String, _w: u32, _h: u32) -> OracleFuture<DynamicImage> {
            Box::pin(async { Err(anyhow!("503 service unavailable")) })
        }
    }

    struct SolidImages(Rgb<u8>);

    impl ImageOracle for SolidImages {
        fn generate_image(&self, _prompt: String, w: u32, h: u32) -> OracleFuture<DynamicImage> {
            let color = self.0;
            Box::pin(async move { Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, color))) })
        }
    }

    struct Advisor(&'static str);

    impl TextOracle for Advisor {
        fn generate_text(&self, _prompt: String, image: Option<DataAttachment>) -> OracleFuture<String> {
            let reply = self.0.to_string();
            Box::pin(async move {
                if image.is_none() {
                    return Err(anyhow!("expected the base image"));
                }
                Ok(reply)
            })
        }
    }

    fn generator(
        count: usize,
        mode: StyleMode,
        text: Option<Arc<dyn TextOracle>>,
        images: Option<Arc<dyn ImageOracle>>,
    ) -> VariationGenerator {
        VariationGenerator::new(
            compositor(),
            text,
            images,
            VariationOptions {
                count,
                style_mode: mode,
                concurrency: 2,
                timeout: Duration::from_secs(5),
            },
        )
    }

    fn compositor() -> Compositor {
        Compositor::new(FontBook::bundled(), DEFAULT_OUTLINE_RADIUS)
    }

    fn base() -> RgbImage {
        RgbImage::from_fn(24, 16, |x, y| Rgb([(x * 10) as u8, (y * 12) as u8, 90]))
    }

    fn hello() -> Vec<TextElement> {
        vec![TextElement {
            id: 1,
            text: "HELLO".to_string(),
            position: Position { x: 2, y: 12 },
            ..TextElement::default()
        }]
    }

    #[tokio::test]
    async fn local_mode_uses_fixed_menu() {
        let variations = generator(3, StyleMode::Background, None, None)
            .generate(&base(), &hello(), None)
            .await;
        let effects = variations
            .iter()
            .map(|variation| variation.effect.as_str())
            .collect::<Vec<_>>();
        assert_eq!(effects, vec!["Enhanced Colors", "Artistic Filter", "Professional"]);
        for variation in &variations {
            let (image, source) = variation.result.as_ref().unwrap();
            assert_eq!(image.dimensions(), (24, 16));
            assert_eq!(*source, VariationSource::Local);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn parallel_slots_keep_slot_order() {
        let variations = generator(3, StyleMode::Background, None, None)
            .generate(&base(), &hello(), None)
            .await;
        let ids = variations.iter().map(|variation| variation.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);
        for (index, variation) in variations.iter().enumerate() {
            let (_, _, recipe) = local_recipe(index);
            let expected = compositor()
                .render(&apply_steps(&base(), &recipe), &hello())
                .unwrap();
            assert_eq!(variation.result.as_ref().unwrap().0, expected);
        }
    }

    #[tokio::test]
    async fn two_variant_config_yields_two_distinct_entries() {
        let variations = generator(2, StyleMode::Background, None, None)
            .generate(&base(), &hello(), Some("  "))
            .await;
        assert_eq!(variations.len(), 2);
        assert_ne!(variations[0].effect, variations[1].effect);
        assert_eq!(variations[0].id, 1);
        assert_eq!(variations[1].id, 2);
        assert!(variations.iter().all(|variation| variation.result.is_ok()));
    }

    #[tokio::test]
    async fn count_is_clamped() {
        let many = generator(9, StyleMode::Background, None, None)
            .generate(&base(), &[], None)
            .await;
        assert_eq!(many.len(), 3);
        let none = generator(0, StyleMode::Background, None, None)
            .generate(&base(), &[], None)
            .await;
        assert_eq!(none.len(), 1);
    }

    #[tokio::test]
    async fn oracle_failure_falls_back_to_local_recipe() {
        let images: Arc<dyn ImageOracle> = Arc::new(FailingImages);
        let variations = generator(3, StyleMode::Background, None, Some(images))
            .generate(&base(), &hello(), Some("sunset beach"))
            .await;
        assert_eq!(variations.len(), 3);
        assert_eq!(variations[0].effect, "sunset beach - Modern");
        assert_eq!(variations[2].description, "Minimalist style with sunset beach");
        for (index, variation) in variations.iter().enumerate() {
            let (image, source) = variation.result.as_ref().unwrap();
            assert_eq!(*source, VariationSource::Fallback);
            let (_, _, recipe) = local_recipe(index);
            let expected = compositor()
                .render(&apply_steps(&base(), &recipe), &hello())
                .unwrap();
            assert_eq!(*image, expected);
        }
    }

    #[tokio::test]
    async fn background_is_resized_to_base() {
        let images: Arc<dyn ImageOracle> = Arc::new(SolidImages(Rgb([5, 200, 5])));
        let variations = generator(1, StyleMode::Background, None, Some(images))
            .generate(&base(), &[], Some("forest"))
            .await;
        let (image, source) = variations[0].result.as_ref().unwrap();
        assert_eq!(*source, VariationSource::Oracle);
        assert_eq!(image.dimensions(), (24, 16));
        assert_eq!(image.get_pixel(12, 8), &Rgb([5, 200, 5]));
    }

    #[tokio::test]
    async fn guidance_reply_drives_filters() {
        let text: Arc<dyn TextOracle> = Arc::new(Advisor(r#"{"brightness": 0.5}"#));
        let variations = generator(2, StyleMode::Guidance, Some(text), None)
            .generate(&base(), &[], Some("night city"))
            .await;
        for variation in &variations {
            let (image, source) = variation.result.as_ref().unwrap();
            assert_eq!(*source, VariationSource::Oracle);
            assert_eq!(*image, apply_steps(&base(), &[FilterStep::Brightness(0.5)]));
        }
    }

    #[tokio::test]
    async fn short_styles_are_ignored() {
        assert_eq!(normalize_style(Some(" abc ")), None);
        assert_eq!(normalize_style(Some(" abcd ")), Some("abcd"));
        let variations = generator(1, StyleMode::Background, None, None)
            .generate(&base(), &[], Some("abc"))
            .await;
        assert_eq!(variations[0].effect, "Enhanced Colors");
    }
}
