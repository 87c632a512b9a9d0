use serde::Deserialize;

use super::filters::{FilterStep, Kernel};

const MIN_FACTOR: f32 = 0.5;
const MAX_FACTOR: f32 = 2.0;

#[derive(Debug, Default, Deserialize)]
struct GuidancePayload {
    brightness: Option<f32>,
    contrast: Option<f32>,
    color: Option<f32>,
    sharpness: Option<f32>,
    #[serde(default)]
    blur: bool,
}

/// Turns an edit-guidance reply into filter steps. JSON wins; keyword
/// matching against `effect` and the reply is the fallback.
pub fn steps_from_guidance(effect: &str, reply: &str) -> Option<Vec<FilterStep>> {
    steps_from_json(reply).or_else(|| steps_from_keywords(effect, reply))
}

fn steps_from_json(reply: &str) -> Option<Vec<FilterStep>> {
    let payload = extract_json_object(reply)
        .and_then(|raw| serde_json::from_str::<GuidancePayload>(raw).ok())?;
    let clamp = |value: Option<f32>| {
        value
            .filter(|factor| factor.is_finite())
            .map(|factor| factor.clamp(MIN_FACTOR, MAX_FACTOR))
    };

    let mut steps = Vec::new();
    if let Some(factor) = clamp(payload.brightness) {
        steps.push(FilterStep::Brightness(factor));
    }
    if let Some(factor) = clamp(payload.contrast) {
        steps.push(FilterStep::Contrast(factor));
    }
    if let Some(factor) = clamp(payload.color) {
        steps.push(FilterStep::Color(factor));
    }
    if let Some(factor) = clamp(payload.sharpness) {
        steps.push(FilterStep::Sharpness(factor));
    }
    if payload.blur {
        steps.push(FilterStep::Blur);
    }
    if steps.is_empty() { None } else { Some(steps) }
}

fn steps_from_keywords(effect: &str, reply: &str) -> Option<Vec<FilterStep>> {
    let effect = effect.to_lowercase();
    let reply = reply.to_lowercase();
    if effect.contains("vibrant") || reply.contains("color") || reply.contains("vibrant") {
        return Some(vec![FilterStep::Color(1.5), FilterStep::Contrast(1.3)]);
    }
    if effect.contains("modern") || reply.contains("professional") || reply.contains("modern") {
        return Some(vec![
            FilterStep::Kernel(Kernel::Sharpen),
            FilterStep::Contrast(1.2),
        ]);
    }
    if effect.contains("minimalist") || reply.contains("clean") || reply.contains("minimalist") {
        return Some(vec![FilterStep::Brightness(1.15), FilterStep::Contrast(0.9)]);
    }
    None
}

/// Finds a JSON object in a reply that may wrap it in a code fence or prose.
fn extract_json_object(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.rsplit_once("```").map(|(body, _)| body.trim()))
        .unwrap_or(trimmed);
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&unfenced[start..=end])
}
