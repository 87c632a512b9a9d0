use anyhow::{Context, Result, anyhow};
use tera::{Context as TeraContext, Tera};

include!(concat!(env!("OUT_DIR"), "/embedded_prompts.rs"));

fn render(name: &str, context: &TeraContext) -> Result<String> {
    let template = embedded_prompt(name).ok_or_else(|| {
        anyhow!(
            "prompt template '{}' not found (available: {})",
            name,
            PROMPT_NAMES.join(", ")
        )
    })?;
    Tera::one_off(template, context, false)
        .with_context(|| format!("failed to render prompt '{}'", name))
}

pub fn meme_captions_prompt(count: usize) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("count", &count);
    render("meme_captions", &context)
}

pub fn edit_guidance_prompt(style: &str, suffix: &str, effect: &str, texts: &[String]) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("style", style);
    context.insert("suffix", suffix);
    context.insert("effect", effect);
    context.insert("texts", texts);
    render("edit_guidance", &context)
}

pub fn background_prompt(style: &str, suffix: &str, texts: &[String]) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("style", style);
    context.insert("suffix", suffix);
    context.insert("texts", texts);
    render("background", &context)
}
