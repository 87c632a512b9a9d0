use std::io::{self, IsTerminal, Read};

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "llm-image-text-editor",
    version,
    about = "Strip text from images and re-render it over styled variations"
)]
struct Cli {
    /// Image to edit (reads stdin when omitted)
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// JSON array of text elements to draw instead of the detected ones
    #[arg(short = 't', long = "texts")]
    texts: Option<String>,

    /// Style directive for the variations (e.g. "sunset beach")
    #[arg(short = 's', long = "style")]
    style: Option<String>,

    /// Print the detected text elements as JSON and exit
    #[arg(long = "extract-only")]
    extract_only: bool,

    /// Render a single preview of the text over the cleaned image
    #[arg(short = 'p', long = "preview")]
    preview: bool,

    /// Suggest meme captions for the image and exit
    #[arg(short = 'c', long = "captions")]
    captions: bool,

    /// Output directory for generated images
    #[arg(short = 'o', long = "out", default_value = "generated")]
    out: String,

    /// Serve the JSON API on this address (e.g. 127.0.0.1:5000)
    #[arg(long = "server")]
    server: Option<String>,

    /// Model name or provider:model for the text oracle (e.g. gemini:MODEL_ID)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Show installed tesseract languages and exit
    #[arg(long = "show-ocr-languages")]
    show_ocr_languages: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    llm_image_text_editor::logging::init(cli.verbose)?;

    let needs_image = cli.data.is_none() && cli.server.is_none() && !cli.show_ocr_languages;
    let stdin_image = if needs_image && !io::stdin().is_terminal() {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let output = llm_image_text_editor::run(
        llm_image_text_editor::Config {
            data: cli.data,
            texts: cli.texts,
            style: cli.style,
            extract_only: cli.extract_only,
            preview: cli.preview,
            captions: cli.captions,
            out_dir: cli.out,
            server: cli.server,
            settings_path: cli.read_settings,
            model: cli.model,
            key: cli.key,
            show_ocr_languages: cli.show_ocr_languages,
        },
        stdin_image,
    )
    .await?;

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
