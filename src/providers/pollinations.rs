use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use reqwest::Url;
use serde_json::json;

use super::openai::user_message;
use super::{ImageOracle, OracleFuture, TextOracle};
use crate::data::DataAttachment;

const IMAGE_BASE_URL: &str = "https://image.pollinations.ai/prompt/";
const TEXT_URL: &str = "https://text.pollinations.ai/";
pub(crate) const DEFAULT_IMAGE_MODEL: &str = "flux";
pub(crate) const DEFAULT_TEXT_MODEL: &str = "openai";

/// Key-less image generation endpoint.
#[derive(Debug, Clone)]
pub struct PollinationsImage {
    model: String,
}

impl Default for PollinationsImage {
    fn default() -> Self {
        Self::new()
    }
}

impl PollinationsImage {
    pub fn new() -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub(crate) fn request_url(&self, prompt: &str, width: u32, height: u32) -> Result<Url> {
        let mut url = Url::parse(IMAGE_BASE_URL).with_context(|| "invalid image endpoint")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("image endpoint cannot take a path"))?
            .pop_if_empty()
            .push(prompt);
        url.query_pairs_mut()
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("model", &self.model)
            .append_pair("nologo", "true")
            .append_pair("enhance", "true");
        Ok(url)
    }
}

impl ImageOracle for PollinationsImage {
    fn generate_image(&self, prompt: String, width: u32, height: u32) -> OracleFuture<DynamicImage> {
        let url = self.request_url(&prompt, width, height);
        Box::pin(async move {
            let url = url?;
            let response = reqwest::get(url)
                .await
                .with_context(|| "failed to reach Pollinations image API")?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(anyhow!("Pollinations image API error ({}): {}", status, text));
            }
            let bytes = response
                .bytes()
                .await
                .with_context(|| "failed to read Pollinations image body")?;
            image::load_from_memory(&bytes).with_context(|| "failed to decode generated image")
        })
    }
}

/// Key-less chat endpoint; answers with plain text.
#[derive(Debug, Clone)]
pub struct PollinationsText {
    model: String,
}

impl Default for PollinationsText {
    fn default() -> Self {
        Self::new()
    }
}

impl PollinationsText {
    pub fn new() -> Self {
        Self {
            model: DEFAULT_TEXT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }
}

impl TextOracle for PollinationsText {
    fn generate_text(&self, prompt: String, image: Option<DataAttachment>) -> OracleFuture<String> {
        let model = self.model.clone();
        Box::pin(async move {
            let body = json!({
                "messages": [user_message(&prompt, image.as_ref())],
                "model": model
            });
            let response = reqwest::Client::new()
                .post(TEXT_URL)
                .json(&body)
                .send()
                .await
                .with_context(|| "failed to reach Pollinations text API")?;
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!("Pollinations text API error ({}): {}", status, text));
            }
            if text.trim().is_empty() {
                return Err(anyhow!("empty text returned from Pollinations"));
            }
            Ok(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_percent_encoded_into_the_path() {
        let url = PollinationsImage::new()
            .request_url("sunset beach, vibrant colorful artistic design", 1024, 1024)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://image.pollinations.ai/prompt/sunset%20beach,%20vibrant%20colorful%20artistic%20design?width=1024&height=1024&model=flux&nologo=true&enhance=true"
        );
    }

    #[test]
    fn slashes_in_prompts_stay_in_one_segment() {
        let url = PollinationsImage::new().request_url("a/b", 8, 8).unwrap();
        assert!(url.path().ends_with("/prompt/a%2Fb"));
    }
}
