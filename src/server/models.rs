use serde::{Deserialize, Serialize};

use crate::elements::TextElement;
use crate::variations::VariationSource;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct UploadRequest {
    pub(crate) image_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    pub(crate) success: bool,
    /// The upload re-encoded as PNG, text still present.
    pub(crate) original_data: String,
    /// The cleaned image the editor canvas starts from.
    pub(crate) image_data: String,
    pub(crate) detected_texts: Vec<TextElement>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct RenderRequest {
    pub(crate) image_data: Option<String>,
    pub(crate) texts: Vec<TextElement>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreviewResponse {
    pub(crate) success: bool,
    pub(crate) preview_data: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct GenerateRequest {
    pub(crate) image_data: Option<String>,
    pub(crate) texts: Vec<TextElement>,
    pub(crate) style_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateResponse {
    pub(crate) success: bool,
    pub(crate) variations: Vec<VariationEntry>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum VariationEntry {
    Image {
        id: u32,
        image_data: String,
        description: String,
        effect: String,
        source: VariationSource,
        width: u32,
        height: u32,
    },
    Failed {
        id: u32,
        error: String,
        effect: String,
    },
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct CaptionRequest {
    pub(crate) image_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CaptionResponse {
    pub(crate) success: bool,
    pub(crate) captions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
