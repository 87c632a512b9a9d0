use image::RgbImage;
use tracing::warn;

use crate::data::{self, DataAttachment};
use crate::editor::Editor;
use crate::variations::Variation;

use super::models::{
    CaptionRequest, CaptionResponse, GenerateRequest, GenerateResponse, PreviewResponse,
    RenderRequest, UploadRequest, UploadResponse, VariationEntry,
};

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: axum::http::StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::internal(format!("{err:#}"))
    }
}

fn attachment_from(image_data: Option<String>) -> Result<DataAttachment, ServerError> {
    let Some(image_data) = image_data.filter(|value| !value.trim().is_empty()) else {
        return Err(ServerError::bad_request("No image provided"));
    };
    data::from_data_uri(&image_data).map_err(|err| ServerError::bad_request(format!("{err:#}")))
}

fn image_from(image_data: Option<String>) -> Result<RgbImage, ServerError> {
    let attachment = attachment_from(image_data)?;
    data::decode_image(&attachment).map_err(|err| ServerError::bad_request(format!("{err:#}")))
}

pub(crate) fn upload_request(
    editor: &Editor,
    request: UploadRequest,
) -> Result<UploadResponse, ServerError> {
    let attachment = attachment_from(request.image_data)?;
    let outcome = editor
        .upload(&attachment)
        .map_err(|err| ServerError::bad_request(format!("{err:#}")))?;
    Ok(UploadResponse {
        success: true,
        original_data: data::to_data_uri(&outcome.original)?,
        image_data: data::to_data_uri(&outcome.clean)?,
        detected_texts: outcome.elements,
        width: outcome.width,
        height: outcome.height,
    })
}

pub(crate) fn render_request(
    editor: &Editor,
    request: RenderRequest,
) -> Result<PreviewResponse, ServerError> {
    let image = image_from(request.image_data)?;
    let preview = editor.render_preview(&image, &request.texts)?;
    Ok(PreviewResponse {
        success: true,
        preview_data: data::to_data_uri(&preview)?,
        width: preview.width(),
        height: preview.height(),
    })
}

pub(crate) async fn generate_request(
    editor: &Editor,
    request: GenerateRequest,
) -> Result<GenerateResponse, ServerError> {
    let image = image_from(request.image_data)?;
    let variations = editor
        .generate(&image, &request.texts, request.style_prompt.as_deref())
        .await;
    Ok(GenerateResponse {
        success: true,
        variations: variations.into_iter().map(variation_entry).collect(),
    })
}

pub(crate) async fn caption_request(
    editor: &Editor,
    request: CaptionRequest,
) -> Result<CaptionResponse, ServerError> {
    let image = image_from(request.image_data)?;
    let captions = editor.suggest_captions(&image).await?;
    Ok(CaptionResponse {
        success: true,
        captions,
    })
}

fn variation_entry(variation: Variation) -> VariationEntry {
    let Variation {
        id,
        effect,
        description,
        result,
    } = variation;
    let encoded = result.and_then(|(image, source)| {
        data::to_data_uri(&image).map(|uri| (uri, source, image.width(), image.height()))
    });
    match encoded {
        Ok((image_data, source, width, height)) => VariationEntry::Image {
            id,
            image_data,
            description,
            effect,
            source,
            width,
            height,
        },
        Err(err) => {
            warn!("reporting variation {} as failed: {err:#}", id);
            VariationEntry::Failed {
                id,
                error: format!("Error: {err:#}"),
                effect,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crate::variations::VariationSource;

    #[test]
    fn failed_slot_keeps_id_and_effect() {
        let entry = variation_entry(Variation {
            id: 2,
            effect: "Artistic Filter".to_string(),
            description: "Stylized artistic look".to_string(),
            result: Err(anyhow!("boom")),
        });
        insta::assert_json_snapshot!(entry, @r#"
        {
          "id": 2,
          "error": "Error: boom",
          "effect": "Artistic Filter"
        }
        "#);
    }

    #[test]
    fn successful_slot_carries_png_data_uri() {
        let entry = variation_entry(Variation {
            id: 1,
            effect: "Enhanced Colors".to_string(),
            description: "Vibrant colors with enhanced contrast".to_string(),
            result: Ok((RgbImage::new(3, 2), VariationSource::Local)),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["source"], "local");
        assert_eq!(json["width"], 3);
        assert_eq!(json["height"], 2);
        assert!(
            json["image_data"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
    }

    #[test]
    fn missing_image_is_a_bad_request() {
        let err = image_from(None).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        let err = image_from(Some("data:image/png;base64,@@@".to_string())).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
