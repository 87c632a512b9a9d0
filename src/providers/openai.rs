use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::{OracleFuture, TextOracle, format_error_parts};
use crate::data::DataAttachment;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
}

impl OpenAI {
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

impl TextOracle for OpenAI {
    fn generate_text(&self, prompt: String, image: Option<DataAttachment>) -> OracleFuture<String> {
        let provider = self.clone();
        Box::pin(async move {
            let client = reqwest::Client::new();
            let url = format!("{}/chat/completions", base_url());
            let body = json!({
                "messages": [user_message(&prompt, image.as_ref())],
                "model": provider.model
            });

            let response = client
                .post(&url)
                .bearer_auth(provider.key.clone())
                .json(&body)
                .send()
                .await
                .with_context(|| "failed to reach OpenAI")?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_text_response(&text);
            }
            Err(anyhow!(
                "OpenAI API error ({}): {}",
                status,
                extract_openai_error(&text).unwrap_or(text)
            ))
        })
    }
}

fn base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

/// Chat-completions user message; also accepted by the Pollinations text API.
pub(super) fn user_message(prompt: &str, image: Option<&DataAttachment>) -> serde_json::Value {
    let mut content = vec![json!({"text": prompt, "type": "text"})];
    if let Some(data) = image {
        let url = format!("data:{};base64,{}", data.mime, data.to_base64());
        content.push(json!({"image_url": {"url": url}, "type": "image_url"}));
    }
    json!({"content": content, "role": "user"})
}

fn extract_text_response(text: &str) -> Result<String> {
    let payload: OpenAIResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let content = payload
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("no text returned from OpenAI"))?;
    Ok(content)
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(error.message, error.kind, error.code))
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    #[test]
    fn message_content_is_returned() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/openai_chat_response.json"
        ));
        let text = extract_text_response(payload).unwrap();
        assert!(text.starts_with("{\"brightness\": 1.1"));
    }

    #[test]
    fn null_content_is_an_error() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(extract_text_response(body).is_err());
        assert!(extract_text_response("not json").is_err());
    }

    #[test]
    fn error_body_is_summarized() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            extract_openai_error(body).unwrap(),
            "Incorrect API key provided | type: invalid_request_error | code: invalid_api_key"
        );
    }

    #[test]
    fn image_travels_as_data_url() {
        let image = DataAttachment {
            bytes: vec![1, 2, 3],
            mime: "image/png".to_string(),
            name: None,
        };
        assert_json_snapshot!(user_message("describe", Some(&image)), @r#"
        {
          "content": [
            {
              "text": "describe",
              "type": "text"
            },
            {
              "image_url": {
                "url": "data:image/png;base64,AQID"
              },
              "type": "image_url"
            }
          ],
          "role": "user"
        }
        "#);
    }
}
