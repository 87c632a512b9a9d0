use anyhow::{Result, anyhow};
use image::DynamicImage;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::data::DataAttachment;

mod gemini;
mod openai;
mod pollinations;

pub use gemini::Gemini;
pub use openai::OpenAI;
pub use pollinations::{PollinationsImage, PollinationsText};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
    Pollinations,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Pollinations => "pollinations",
        }
    }

    pub fn needs_key(&self) -> bool {
        !matches!(self, ProviderKind::Pollinations)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSelection {
    pub provider: ProviderKind,
    pub requested_model: Option<String>,
}

pub type OracleFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Multimodal text generation: a prompt plus an optional image in, text out.
pub trait TextOracle: Send + Sync {
    fn generate_text(&self, prompt: String, image: Option<DataAttachment>) -> OracleFuture<String>;
}

/// Prompt in, raster out. The result may not match the requested size.
pub trait ImageOracle: Send + Sync {
    fn generate_image(&self, prompt: String, width: u32, height: u32) -> OracleFuture<DynamicImage>;
}

#[derive(Debug, Clone)]
pub enum ProviderImpl {
    OpenAI(OpenAI),
    Gemini(Gemini),
    Pollinations(PollinationsText),
}

impl TextOracle for ProviderImpl {
    fn generate_text(&self, prompt: String, image: Option<DataAttachment>) -> OracleFuture<String> {
        match self {
            ProviderImpl::OpenAI(provider) => provider.generate_text(prompt, image),
            ProviderImpl::Gemini(provider) => provider.generate_text(prompt, image),
            ProviderImpl::Pollinations(provider) => provider.generate_text(prompt, image),
        }
    }
}

pub fn build_provider(provider: ProviderKind, key: String, model: String) -> ProviderImpl {
    match provider {
        ProviderKind::OpenAI => ProviderImpl::OpenAI(OpenAI::new(key).with_model(model)),
        ProviderKind::Gemini => ProviderImpl::Gemini(Gemini::new(key).with_model(model)),
        ProviderKind::Pollinations => {
            ProviderImpl::Pollinations(PollinationsText::new().with_model(model))
        }
    }
}

/// Builds the text oracle for a selection, or `None` when no key is available.
pub fn build_text_oracle(
    selection: &ProviderSelection,
    override_key: Option<&str>,
) -> Option<Arc<dyn TextOracle>> {
    let key = if selection.provider.needs_key() {
        resolve_key(selection.provider, override_key).ok()?
    } else {
        String::new()
    };
    let model = selection.requested_model.clone().unwrap_or_default();
    Some(Arc::new(build_provider(selection.provider, key, model)))
}

/// `name` comes from settings: `auto`, `none`, a provider name or `provider:model`.
pub fn resolve_provider_selection(
    name: &str,
    model_arg: Option<&str>,
    override_key: Option<&str>,
) -> Result<Option<ProviderSelection>> {
    if let Some(model) = model_arg {
        return parse_model_arg(model).map(Some);
    }
    match name.trim().to_lowercase().as_str() {
        "none" | "off" => Ok(None),
        "" | "auto" => Ok(Some(default_provider_selection(override_key))),
        other => parse_model_arg(other).map(Some),
    }
}

pub fn resolve_key(provider: ProviderKind, override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key {
        return Ok(key.to_string());
    }

    match provider {
        ProviderKind::OpenAI => get_env("OPENAI_API_KEY"),
        ProviderKind::Gemini => get_env("GEMINI_API_KEY").or_else(|| get_env("GOOGLE_API_KEY")),
        ProviderKind::Pollinations => Some(String::new()),
    }
    .ok_or_else(|| anyhow!("API key not found for provider {}", provider.as_str()))
}

fn default_provider_selection(override_key: Option<&str>) -> ProviderSelection {
    let provider = if get_env("GEMINI_API_KEY").is_some() || get_env("GOOGLE_API_KEY").is_some() {
        ProviderKind::Gemini
    } else if get_env("OPENAI_API_KEY").is_some() || override_key.is_some() {
        ProviderKind::OpenAI
    } else {
        ProviderKind::Pollinations
    };
    ProviderSelection {
        provider,
        requested_model: None,
    }
}

fn parse_model_arg(model_arg: &str) -> Result<ProviderSelection> {
    let raw = model_arg.trim();
    if raw.is_empty() {
        return Err(anyhow!("model argument is empty"));
    }

    let lower = raw.to_lowercase();
    if let Some(provider) = provider_from_name(&lower) {
        return Ok(ProviderSelection {
            provider,
            requested_model: None,
        });
    }

    if let Some((provider, model)) = parse_provider_model_pair(raw) {
        return Ok(ProviderSelection {
            provider,
            requested_model: model,
        });
    }

    Err(anyhow!(
        "unable to infer provider from model '{}'. Use provider:model (openai:, gemini:, pollinations:)",
        raw
    ))
}

fn parse_provider_model_pair(input: &str) -> Option<(ProviderKind, Option<String>)> {
    let (provider_part, model_part) = input.split_once(':')?;
    let provider = provider_from_name(&provider_part.to_lowercase())?;
    let model = if model_part.trim().is_empty() {
        None
    } else {
        Some(model_part.trim().to_string())
    };
    Some((provider, model))
}

fn provider_from_name(name: &str) -> Option<ProviderKind> {
    match name {
        "openai" => Some(ProviderKind::OpenAI),
        "gemini" | "google" => Some(ProviderKind::Gemini),
        "pollinations" | "free" => Some(ProviderKind::Pollinations),
        _ => None,
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

pub(crate) fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = code
        && !code.trim().is_empty()
    {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_model_pairs_are_parsed() {
        let selection = resolve_provider_selection("auto", Some("gemini:gemini-2.0-flash"), None)
            .unwrap()
            .unwrap();
        assert_eq!(selection.provider, ProviderKind::Gemini);
        assert_eq!(selection.requested_model.as_deref(), Some("gemini-2.0-flash"));

        let selection = resolve_provider_selection("openai", None, None).unwrap().unwrap();
        assert_eq!(selection.provider, ProviderKind::OpenAI);
        assert_eq!(selection.requested_model, None);
    }

    #[test]
    fn none_disables_the_oracle() {
        assert!(resolve_provider_selection("none", None, None).unwrap().is_none());
    }

    #[test]
    fn unknown_providers_are_rejected() {
        assert!(resolve_provider_selection("claude:opus", None, None).is_err());
        assert!(resolve_provider_selection("auto", Some("  "), None).is_err());
    }

    #[test]
    fn pollinations_needs_no_key() {
        let selection = ProviderSelection {
            provider: ProviderKind::Pollinations,
            requested_model: None,
        };
        assert!(build_text_oracle(&selection, None).is_some());
        assert_eq!(resolve_key(ProviderKind::OpenAI, Some("sk-test")).unwrap(), "sk-test");
    }

    #[test]
    fn error_parts_are_joined() {
        assert_eq!(
            format_error_parts(Some("bad".into()), Some("invalid".into()), None),
            "bad | type: invalid"
        );
        assert_eq!(format_error_parts(None, Some(" ".into()), None), "unknown error");
    }
}
