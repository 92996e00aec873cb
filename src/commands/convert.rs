use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use tokio::io::AsyncReadExt;

use crate::backend::{BackendClient, ConversionType};
use crate::config;
use crate::logging::{self, LogArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Script {
    Traditional,
    Simplified,
}

impl From<Script> for ConversionType {
    fn from(script: Script) -> Self {
        match script {
            Script::Traditional => ConversionType::S2t,
            Script::Simplified => ConversionType::T2s,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    /// Target script
    #[arg(long, value_enum)]
    pub to: Script,
    /// Text to convert; read from --file or stdin when omitted
    #[arg(conflicts_with = "file")]
    pub text: Option<String>,
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// OCR backend URL
    #[arg(long)]
    pub backend: Option<String>,
    #[command(flatten)]
    pub log: LogArgs,
}

async fn read_text(args: &ConvertArgs) -> Result<String, String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    if let Some(path) = &args.file {
        return tokio::fs::read_to_string(path)
            .await
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()));
    }
    if io::stdin().is_terminal() {
        return Ok(String::new());
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .map_err(|err| format!("Failed to read text from stdin: {err}"))?;
    Ok(text)
}

pub async fn run(args: ConvertArgs) -> Result<(), String> {
    logging::init(args.log);
    let text = read_text(&args).await?;
    if text.trim().is_empty() {
        return Err("No text to convert.".to_string());
    }

    let conversion = ConversionType::from(args.to);
    let backend = BackendClient::new(config::backend_url(args.backend.as_deref()));
    log::debug!(
        "converting {} characters to {}",
        text.chars().count(),
        conversion.target_name()
    );

    let response = backend
        .convert_text(&text, conversion)
        .await
        .map_err(|err| format!("Conversion failed: {err}"))?;
    println!("{}", response.converted_text);
    Ok(())
}
