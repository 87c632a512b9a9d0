use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extract::{DEFAULT_MIN_CONFIDENCE, DEFAULT_PADDING, ExtractOptions};
use crate::inpaint::DEFAULT_RADIUS;
use crate::overlay::DEFAULT_OUTLINE_RADIUS;
use crate::variations::{DEFAULT_TIMEOUT, MAX_VARIATIONS, StyleMode, VariationOptions};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const DEFAULT_PSM: u32 = 11;
const DEFAULT_MAX_UPLOAD_MB: u64 = 16;
// Room for the JSON envelope and text elements around the image data URI.
const REQUEST_BODY_SLACK: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub detection_languages: String,
    pub detection_psm: u32,
    pub min_confidence: f32,
    pub removal_padding: u32,
    pub removal_radius: u32,
    pub font_path: Option<String>,
    pub outline_radius: u32,
    pub variation_count: usize,
    pub style_mode: StyleMode,
    pub concurrency: Option<usize>,
    pub oracle_provider: String,
    pub oracle_model: Option<String>,
    pub image_provider: String,
    pub oracle_timeout_secs: u64,
    pub max_upload_mb: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detection_languages: "eng".to_string(),
            detection_psm: DEFAULT_PSM,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            removal_padding: DEFAULT_PADDING,
            removal_radius: DEFAULT_RADIUS,
            font_path: None,
            outline_radius: DEFAULT_OUTLINE_RADIUS,
            variation_count: MAX_VARIATIONS,
            style_mode: StyleMode::default(),
            concurrency: None,
            oracle_provider: "auto".to_string(),
            oracle_model: None,
            image_provider: "pollinations".to_string(),
            oracle_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    detection: Option<DetectionSettings>,
    removal: Option<RemovalSettings>,
    render: Option<RenderSettings>,
    variations: Option<VariationSettings>,
    oracle: Option<OracleSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectionSettings {
    languages: Option<String>,
    psm: Option<u32>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct RemovalSettings {
    padding: Option<u32>,
    radius: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_path: Option<String>,
    outline_radius: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct VariationSettings {
    count: Option<usize>,
    style_mode: Option<StyleMode>,
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OracleSettings {
    provider: Option<String>,
    model: Option<String>,
    image: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    max_upload_mb: Option<u64>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(detection) = incoming.detection {
            if let Some(languages) = detection.languages
                && !languages.trim().is_empty()
            {
                self.detection_languages = languages;
            }
            if let Some(psm) = detection.psm {
                self.detection_psm = psm;
            }
            if let Some(threshold) = detection.min_confidence
                && (0.0..=1.0).contains(&threshold)
            {
                self.min_confidence = threshold;
            }
        }
        if let Some(removal) = incoming.removal {
            if let Some(padding) = removal.padding {
                self.removal_padding = padding;
            }
            if let Some(radius) = removal.radius
                && radius > 0
            {
                self.removal_radius = radius;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(path) = render.font_path
                && !path.trim().is_empty()
            {
                self.font_path = Some(path);
            }
            if let Some(radius) = render.outline_radius {
                self.outline_radius = radius;
            }
        }
        if let Some(variations) = incoming.variations {
            if let Some(count) = variations.count {
                self.variation_count = count.clamp(1, MAX_VARIATIONS);
            }
            if let Some(mode) = variations.style_mode {
                self.style_mode = mode;
            }
            if let Some(concurrency) = variations.concurrency
                && concurrency > 0
            {
                self.concurrency = Some(concurrency);
            }
        }
        if let Some(oracle) = incoming.oracle {
            if let Some(provider) = oracle.provider
                && !provider.trim().is_empty()
            {
                self.oracle_provider = provider;
            }
            if let Some(model) = oracle.model
                && !model.trim().is_empty()
            {
                self.oracle_model = Some(model);
            }
            if let Some(image) = oracle.image
                && !image.trim().is_empty()
            {
                self.image_provider = image;
            }
            if let Some(timeout) = oracle.timeout_secs
                && timeout > 0
            {
                self.oracle_timeout_secs = timeout;
            }
        }
        if let Some(server) = incoming.server
            && let Some(limit) = server.max_upload_mb
            && limit > 0
        {
            self.max_upload_mb = limit;
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            min_confidence: self.min_confidence,
            padding: self.removal_padding,
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn variation_options(&self) -> VariationOptions {
        VariationOptions {
            count: self.variation_count,
            style_mode: self.style_mode,
            concurrency: self.concurrency.unwrap_or_else(num_cpus::get).max(1),
            timeout: self.oracle_timeout(),
        }
    }

    /// Largest HTTP request body accepted. Images arrive base64 encoded
    /// inside JSON, so the limit covers the encoded size of `max_upload_mb`.
    pub fn request_body_limit(&self) -> usize {
        let raw = self.max_upload_mb.saturating_mul(1024 * 1024);
        let encoded = raw.div_ceil(3).saturating_mul(4);
        usize::try_from(encoded.saturating_add(REQUEST_BODY_SLACK)).unwrap_or(usize::MAX)
    }

    pub fn image_oracle_enabled(&self) -> bool {
        !matches!(
            self.image_provider.trim().to_lowercase().as_str(),
            "none" | "off"
        )
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".llm-image-text-editor"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_built_in_defaults() {
        let mut settings = Settings::default();
        settings.merge_toml(DEFAULT_SETTINGS_TOML).unwrap();
        let defaults = Settings::default();
        assert_eq!(settings.detection_languages, defaults.detection_languages);
        assert_eq!(settings.detection_psm, 11);
        assert_eq!(settings.min_confidence, 0.20);
        assert_eq!(settings.removal_padding, 3);
        assert_eq!(settings.removal_radius, 7);
        assert_eq!(settings.outline_radius, 2);
        assert_eq!(settings.variation_count, 3);
        assert_eq!(settings.style_mode, StyleMode::Background);
        assert_eq!(settings.oracle_timeout(), Duration::from_secs(120));
        assert!(settings.image_oracle_enabled());
        assert_eq!(settings.font_path, None);
        assert_eq!(settings.oracle_model, None);
        assert_eq!(settings.max_upload_mb, 16);
    }

    #[test]
    fn body_limit_fits_a_full_size_upload_after_base64() {
        let mut settings = Settings::default();
        let sixteen_mb = 16 * 1024 * 1024;
        assert!(settings.request_body_limit() >= sixteen_mb / 3 * 4 + 32);
        assert!(settings.request_body_limit() > 2 * 1024 * 1024);

        settings.merge_toml("[server]\nmax_upload_mb = 0").unwrap();
        assert_eq!(settings.max_upload_mb, 16);
        settings.merge_toml("[server]\nmax_upload_mb = 3").unwrap();
        assert_eq!(settings.request_body_limit(), 4 * 1024 * 1024 + 1024 * 1024);
    }

    #[test]
    fn later_layers_override_and_invalid_values_are_ignored() {
        let mut settings = Settings::default();
        settings
            .merge_toml(
                r#"
                [detection]
                min_confidence = 1.5
                languages = "eng+jpn"
                [variations]
                count = 7
                style_mode = "guidance"
                concurrency = 0
                [oracle]
                model = "gemini:gemini-2.0-flash"
                image = "none"
                timeout_secs = 0
                "#,
            )
            .unwrap();
        assert_eq!(settings.min_confidence, 0.20);
        assert_eq!(settings.detection_languages, "eng+jpn");
        assert_eq!(settings.variation_count, 3);
        assert_eq!(settings.style_mode, StyleMode::Guidance);
        assert_eq!(settings.concurrency, None);
        assert!(!settings.image_oracle_enabled());
        assert_eq!(settings.oracle_model.as_deref(), Some("gemini:gemini-2.0-flash"));
        assert_eq!(settings.oracle_timeout_secs, 120);

        settings.merge_toml("[variations]\ncount = 2").unwrap();
        assert_eq!(settings.variation_options().count, 2);
        assert_eq!(settings.style_mode, StyleMode::Guidance);
    }

    #[test]
    fn unknown_style_mode_is_a_parse_error() {
        let mut settings = Settings::default();
        assert!(settings.merge_toml("[variations]\nstyle_mode = \"psychedelic\"").is_err());
    }
}
