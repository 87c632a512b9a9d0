use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::{OracleFuture, TextOracle, format_error_parts};
use crate::data::DataAttachment;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub(crate) const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct Gemini {
    key: String,
    model: String,
}

impl Gemini {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
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

impl TextOracle for Gemini {
    fn generate_text(&self, prompt: String, image: Option<DataAttachment>) -> OracleFuture<String> {
        let provider = self.clone();
        Box::pin(async move {
            let client = reqwest::Client::new();
            let url = format!("{}/{}:generateContent", BASE_URL, provider.model);
            let body = request_body(&prompt, image.as_ref());

            let response = client
                .post(&url)
                .header("x-goog-api-key", provider.key.clone())
                .json(&body)
                .send()
                .await
                .with_context(|| "failed to reach Gemini")?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_text_response(&text);
            }
            Err(anyhow!(
                "Gemini API error ({}): {}",
                status,
                extract_gemini_error(&text).unwrap_or(text)
            ))
        })
    }
}

fn request_body(prompt: &str, image: Option<&DataAttachment>) -> serde_json::Value {
    let mut parts = vec![json!({"text": prompt})];
    if let Some(data) = image {
        parts.push(json!({
            "inline_data": {
                "data": data.to_base64(),
                "mime_type": data.mime
            }
        }));
    }
    json!({
        "contents": [
            {
                "parts": parts,
                "role": "user"
            }
        ]
    })
}

fn extract_text_response(text: &str) -> Result<String> {
    let payload: GeminiResponse =
        serde_json::from_str(text).with_context(|| "failed to parse Gemini response JSON")?;
    let candidate = payload
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .ok_or_else(|| anyhow!("no candidate returned from Gemini"))?;

    let joined = candidate
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if joined.trim().is_empty() {
        return Err(anyhow!("empty text returned from Gemini"));
    }
    Ok(joined)
}

fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    struct GeminiError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i32>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(
        error.message,
        error.status,
        error.code.map(|value| value.to_string()),
    ))
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}
