use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, format_description};
use tracing::info;

pub mod captions;
pub mod data;
mod editor;
pub mod elements;
pub mod extract;
pub mod inpaint;
pub mod logging;
pub mod ocr;
pub mod overlay;
pub mod prompts;
pub mod providers;
mod server;
pub mod settings;
pub mod variations;

pub use editor::{Editor, UploadOutcome};
pub use elements::{FontWeight, Position, TextElement};
pub use server::run_server;
pub use variations::{StyleMode, Variation, VariationSource};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data: Option<String>,
    /// JSON array of text elements that replaces the detected ones.
    pub texts: Option<String>,
    pub style: Option<String>,
    pub extract_only: bool,
    pub preview: bool,
    pub captions: bool,
    pub out_dir: String,
    pub server: Option<String>,
    pub settings_path: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub show_ocr_languages: bool,
}

#[derive(Serialize)]
struct ExtractReport<'a> {
    width: u32,
    height: u32,
    detected_texts: &'a [TextElement],
}

pub async fn run(config: Config, stdin_image: Option<Vec<u8>>) -> Result<String> {
    if config.show_ocr_languages {
        return Ok(ocr::list_tesseract_languages()?.join("\n"));
    }

    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let editor = Editor::from_settings(settings, config.model.as_deref(), config.key.as_deref())?;

    if let Some(addr) = config.server {
        run_server(editor, addr).await?;
        return Ok(String::new());
    }

    let attachment = match (config.data.as_deref(), stdin_image) {
        (Some(path), _) => data::load_attachment(Path::new(path))?,
        (None, Some(bytes)) if !bytes.is_empty() => data::load_attachment_from_bytes(bytes, None)?,
        _ => return Err(anyhow!("no image provided; use --data or pipe an image to stdin")),
    };
    let outcome = editor.upload(&attachment)?;

    if config.extract_only {
        let report = ExtractReport {
            width: outcome.width,
            height: outcome.height,
            detected_texts: &outcome.elements,
        };
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    if config.captions {
        let captions = editor.suggest_captions(&outcome.original).await?;
        return Ok(captions.join("\n"));
    }

    let elements = match config.texts.as_deref() {
        Some(raw) => parse_texts(raw)?,
        None => outcome.elements.clone(),
    };
    let out_dir = PathBuf::from(&config.out_dir);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output directory: {}", out_dir.display()))?;
    let stamp = timestamp();

    if config.preview {
        let preview = editor.render_preview(&outcome.clean, &elements)?;
        let path = out_dir.join(format!("preview_{}.png", stamp));
        save_png(&preview, &path)?;
        return Ok(path.display().to_string());
    }

    let variations = editor
        .generate(&outcome.clean, &elements, config.style.as_deref())
        .await;
    let mut lines = Vec::new();
    for variation in variations {
        match variation.result {
            Ok((image, source)) => {
                let path = out_dir.join(format!("variation_{}_{}.png", stamp, variation.id));
                save_png(&image, &path)?;
                lines.push(format!(
                    "{}\t{}\t{}\t{}",
                    variation.id,
                    variation.effect,
                    source.as_str(),
                    path.display()
                ));
            }
            Err(err) => {
                lines.push(format!(
                    "{}\t{}\terror: {:#}",
                    variation.id, variation.effect, err
                ));
            }
        }
    }
    Ok(lines.join("\n"))
}

fn parse_texts(raw: &str) -> Result<Vec<TextElement>> {
    serde_json::from_str(raw).with_context(|| "failed to parse --texts as a JSON array of text elements")
}

fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    let bytes = data::encode_png(image)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write image: {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn timestamp() -> String {
    let format = format_description::parse("[year][month][day]_[hour][minute][second]");
    match format {
        Ok(format) => OffsetDateTime::now_utc()
            .format(&format)
            .unwrap_or_else(|_| "unknown".to_string()),
        Err(_) => "unknown".to_string(),
    }
}
