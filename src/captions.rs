use std::time::Duration;
use tracing::{info, warn};

use crate::data::DataAttachment;
use crate::providers::TextOracle;

pub const MAX_CAPTIONS: usize = 5;
const MIN_CAPTIONS: usize = 3;
const NUMBERING: &[char] = &['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', '-', ')', ' ', '*', '•'];

/// Used when the oracle answered but produced too few usable lines.
pub const SPARSE_FALLBACK: [&str; 5] = [
    "When you see it...",
    "Me trying to adult",
    "Nobody:\nAbsolutely nobody:\nMe:",
    "It really do be like that sometimes",
    "This is fine 🔥",
];

/// Used when the oracle is unavailable, failed or timed out.
pub const FAILURE_FALLBACK: [&str; 5] = [
    "That face you make when...",
    "Me: *exists*\nEveryone:",
    "POV: You just realized",
    "When the teacher says 'Get into groups'",
    "Expectation vs Reality",
];

pub fn parse_captions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > 3)
        .map(|line| line.trim_start_matches(NUMBERING).to_string())
        .filter(|line| !line.is_empty())
        .take(MAX_CAPTIONS)
        .collect()
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|caption| caption.to_string()).collect()
}

pub async fn suggest_captions(
    oracle: Option<&dyn TextOracle>,
    prompt: String,
    image: DataAttachment,
    timeout: Duration,
) -> Vec<String> {
    let Some(oracle) = oracle else {
        warn!("no text oracle configured; using fallback captions");
        return owned(&FAILURE_FALLBACK);
    };
    match tokio::time::timeout(timeout, oracle.generate_text(prompt, Some(image))).await {
        Ok(Ok(reply)) => {
            let captions = parse_captions(&reply);
            if captions.len() >= MIN_CAPTIONS {
                info!("generated {} caption(s)", captions.len());
                captions
            } else {
                warn!("oracle returned {} usable caption(s); using fallback", captions.len());
                owned(&SPARSE_FALLBACK)
            }
        }
        Ok(Err(err)) => {
            warn!("caption generation failed: {err:#}");
            owned(&FAILURE_FALLBACK)
        }
        Err(_) => {
            warn!("caption generation timed out after {:?}", timeout);
            owned(&FAILURE_FALLBACK)
        }
    }
}
