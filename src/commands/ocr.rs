use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::backend::{BackendClient, DetMode, OcrRequest, OcrVersion, Settings};
use crate::commands::write_output_file;
use crate::config;
use crate::logging::{self, LogArgs};
use crate::render::{describe_ocr_request, word_table};
use crate::session::{ImageSelection, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OcrOutput {
    Text,
    Json,
}

#[derive(Debug, Args, Clone)]
pub struct OcrArgs {
    /// Image to upload and recognize
    #[arg(required_unless_present = "sample", conflicts_with = "sample")]
    pub image: Option<PathBuf>,
    /// Recognize the sample image shipped with the backend
    #[arg(long)]
    pub sample: bool,
    /// Recognition engine; defaults to the backend setting
    #[arg(long = "engine", value_enum)]
    pub engine: Option<OcrVersion>,
    /// Text layout: sp (vertical), hp (horizontal) or auto
    #[arg(long, value_enum)]
    pub det_mode: Option<DetMode>,
    /// Detect whole text lines instead of single characters
    #[arg(long)]
    pub line: bool,
    /// Longest image side sent to the recognizer, in pixels
    #[arg(long)]
    pub image_size: Option<u32>,
    /// Skip image preprocessing
    #[arg(long)]
    pub no_preprocess: bool,
    #[arg(long)]
    pub no_deskew: bool,
    #[arg(long)]
    pub no_contrast: bool,
    #[arg(long)]
    pub no_denoise: bool,
    #[arg(long)]
    pub no_sharpen: bool,
    #[arg(long)]
    pub binarize: bool,
    #[arg(long, value_enum, default_value = "text")]
    pub output: OcrOutput,
    /// Write the recognized text to this file
    #[arg(long)]
    pub save_text: Option<PathBuf>,
    /// OCR backend URL
    #[arg(long)]
    pub backend: Option<String>,
    #[command(flatten)]
    pub log: LogArgs,
}

/// Stored settings overridden by the command-line flags.
fn build_request(args: &OcrArgs, settings: &Settings, selection: &ImageSelection) -> OcrRequest {
    let preprocess = settings.preprocess_enabled && !args.no_preprocess;
    let mut options = settings.preprocess_options();
    options.auto_deskew &= !args.no_deskew;
    options.enhance_contrast &= !args.no_contrast;
    options.noise_reduction &= !args.no_denoise;
    options.sharpen &= !args.no_sharpen;
    options.binarize |= args.binarize;

    OcrRequest {
        image_path: selection.image_path.clone(),
        full_path: selection.full_path.clone(),
        image_id: selection.image_id.clone(),
        det_mode: args.det_mode.unwrap_or_else(|| settings.det_mode()),
        char_ocr: settings.char_ocr && !args.line,
        image_size: args.image_size.unwrap_or(settings.image_size),
        version: args.engine.unwrap_or_else(|| settings.version()),
        preprocess,
        preprocess_options: options.gated(preprocess),
        is_default_image: selection.is_sample(),
    }
}

pub async fn run(args: OcrArgs) -> Result<(), String> {
    logging::init(args.log);
    let backend = BackendClient::new(config::backend_url(args.backend.as_deref()));

    let settings = match backend.settings().await {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("could not load backend settings, using defaults: {err}");
            Settings::default()
        }
    };

    let mut session = Session::new();
    let selection = match &args.image {
        Some(path) if !args.sample => backend
            .upload_image(path)
            .await
            .map(ImageSelection::from)
            .map_err(|err| format!("Upload failed: {err}"))?,
        _ => ImageSelection::sample(),
    };
    session.select_image(selection.clone());

    let request = build_request(&args, &settings, &selection);
    if !args.log.quiet {
        for line in describe_ocr_request(&request) {
            eprintln!("{line}");
        }
    }

    let response = backend
        .run_ocr(&request)
        .await
        .map_err(|err| format!("Recognition failed: {err}"))?;
    session.record_ocr(&response);

    if session.ocr_text().is_empty() {
        log::warn!("no text recognized in {}", selection.image_path);
    }
    if let Some(path) = &args.save_text {
        write_output_file(path, session.ocr_text())?;
    }

    match args.output {
        OcrOutput::Json => println!(
            "{}",
            serde_json::to_string_pretty(&response).map_err(|err| err.to_string())?
        ),
        OcrOutput::Text => {
            println!("{}", session.ocr_text());
            if !response.words_data.is_empty() && !args.log.quiet {
                println!();
                print!(
                    "{}",
                    word_table(&response.words_data, io::stdout().is_terminal())
                );
            }
        }
    }
    Ok(())
}
