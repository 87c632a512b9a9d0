use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct DataAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

impl DataAttachment {
    pub fn png(image: &RgbImage) -> Result<Self> {
        Ok(Self {
            bytes: encode_png(image)?,
            mime: PNG_MIME.to_string(),
            name: None,
        })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

pub fn load_attachment(path: &Path) -> Result<DataAttachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read data file: {}", path.display()))?;
    let mime = detect_image_mime(&bytes, Some(path))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    Ok(DataAttachment { bytes, mime, name })
}

pub fn load_attachment_from_bytes(bytes: Vec<u8>, name: Option<&str>) -> Result<DataAttachment> {
    let mime = detect_image_mime(&bytes, name.map(Path::new))?;
    Ok(DataAttachment {
        bytes,
        mime,
        name: name.map(|value| value.to_string()),
    })
}

pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    infer::get(bytes).map(|kind| kind.mime_type().to_string())
}

fn detect_image_mime(bytes: &[u8], path: Option<&Path>) -> Result<String> {
    if let Some(detected) = sniff_mime(bytes) {
        if !detected.starts_with("image/") {
            return Err(anyhow!("expected image data (detected '{}')", detected));
        }
        return Ok(detected);
    }

    if let Some(mime) = extension_lower(path).as_deref().and_then(mime_from_extension) {
        return Ok(mime.to_string());
    }

    Err(anyhow!(
        "unable to detect image type for '{}'",
        path.map(|value| value.display().to_string())
            .unwrap_or_else(|| "upload".to_string())
    ))
}

fn extension_lower(path: Option<&Path>) -> Option<String> {
    path.and_then(|path| path.extension())
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some(PNG_MIME),
        "jpg" | "jpeg" => Some(JPEG_MIME),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        _ => None,
    }
}

/// Decodes uploaded bytes into an RGB raster. Alpha is dropped.
pub fn decode_image(attachment: &DataAttachment) -> Result<RgbImage> {
    let format = ImageFormat::from_mime_type(&attachment.mime);
    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(&attachment.bytes, format),
        None => image::load_from_memory(&attachment.bytes),
    }
    .with_context(|| format!("failed to decode image ({})", attachment.mime))?;
    Ok(decoded.to_rgb8())
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut buffer, ImageFormat::Png)
        .with_context(|| "failed to encode png")?;
    Ok(buffer.into_inner())
}

pub fn to_data_uri(image: &RgbImage) -> Result<String> {
    let bytes = encode_png(image)?;
    Ok(format!("data:{};base64,{}", PNG_MIME, BASE64.encode(bytes)))
}

/// Accepts either a `data:<mime>;base64,<payload>` URI or a bare base64 payload.
pub fn from_data_uri(value: &str) -> Result<DataAttachment> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("image data is empty"));
    }
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| anyhow!("malformed data uri"))?;
            if !header.ends_with(";base64") {
                return Err(anyhow!("data uri must be base64 encoded"));
            }
            payload
        }
        None => trimmed,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .with_context(|| "failed to decode base64 image data")?;
    load_attachment_from_bytes(bytes, None)
}
