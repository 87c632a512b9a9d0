use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

const OCR_DPI: u32 = 300;

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    // First line is the "List of available languages" banner.
    Ok(stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect())
}

/// Resolves the configured languages against what tesseract has installed.
/// When the installed list cannot be read, the request is passed through.
pub(super) fn resolve_languages(requested: &str) -> Result<String> {
    match list_tesseract_languages() {
        Ok(available) => select_languages(requested, &available),
        Err(err) => {
            debug!("cannot list tesseract languages: {err:#}");
            let requested = requested.trim();
            if requested.is_empty() {
                return Err(anyhow!("detection languages are empty"));
            }
            Ok(requested.to_string())
        }
    }
}

fn select_languages(requested: &str, available: &[String]) -> Result<String> {
    let (chosen, missing): (Vec<&str>, Vec<&str>) = requested
        .split(['+', ',', ' '])
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .partition(|lang| available.iter().any(|value| value == lang));

    if chosen.is_empty() {
        if missing.is_empty() {
            return Err(anyhow!("detection languages are empty"));
        }
        return Err(anyhow!(
            "detection language(s) not installed: {} (installed: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "skipping detection language(s) not installed: {}",
            missing.join(", ")
        );
    }
    Ok(chosen.join("+"))
}

/// Runs tesseract on `path` and returns its TSV report.
pub(super) fn run_tsv(path: &Path, languages: &str, psm: u32) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .args(["-l", languages])
        .args(["--oem", "1"])
        .args(["--psm", &psm.to_string()])
        .args(["--dpi", &OCR_DPI.to_string()])
        .arg("tsv")
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract exited with {}: {}", output.status, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
