use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use crate::backend::{BackendClient, HistoryRecord};
use crate::commands::write_output_file;
use crate::config;
use crate::logging::{self, LogArgs};
use crate::render::history_table;

#[derive(Debug, Args, Clone)]
pub struct HistoryArgs {
    #[command(subcommand)]
    command: HistorySubcommand,
    /// OCR backend URL
    #[arg(long, global = true)]
    backend: Option<String>,
    #[command(flatten)]
    log: LogArgs,
}

#[derive(Debug, Subcommand, Clone)]
enum HistorySubcommand {
    /// List past recognitions, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show the text of one record
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    Delete { id: String },
    /// Delete every record
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Save a record's image and text
    Download {
        id: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| err.to_string())
}

/// File name for the downloaded image, keeping the stored extension.
fn image_file_name(record: &HistoryRecord) -> String {
    let extension = Path::new(&record.image_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("jpg");
    format!("record-{}.{extension}", record.id)
}

async fn download(backend: &BackendClient, id: &str, dir: &Path) -> Result<(), String> {
    let record = backend
        .history_record(id)
        .await
        .map_err(|err| format!("Failed to load history record '{id}': {err}"))?;

    let text_path = dir.join(format!("record-{}.txt", record.id));
    write_output_file(&text_path, &record.ocr_text)?;
    println!("{}", text_path.display());

    if record.image_path.is_empty() {
        log::warn!("record {id} has no stored image");
        return Ok(());
    }
    let bytes = backend
        .fetch_asset(&record.image_path)
        .await
        .map_err(|err| format!("Failed to download image: {err}"))?;
    let image_path = dir.join(image_file_name(&record));
    tokio::fs::write(&image_path, &bytes)
        .await
        .map_err(|err| format!("Failed to write '{}': {err}", image_path.display()))?;
    log::info!("saved {} bytes to {}", bytes.len(), image_path.display());
    println!("{}", image_path.display());
    Ok(())
}

pub async fn run(args: HistoryArgs) -> Result<(), String> {
    logging::init(args.log);
    let backend = BackendClient::new(config::backend_url(args.backend.as_deref()));

    match args.command {
        HistorySubcommand::List { limit, json } => {
            let mut entries = backend.history().await.map_err(|err| err.to_string())?;
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
            if json {
                println!("{}", to_json(&entries)?);
            } else if entries.is_empty() {
                println!("no history records");
            } else {
                print!("{}", history_table(&entries));
            }
        }
        HistorySubcommand::Show { id, json } => {
            let record = backend
                .history_record(&id)
                .await
                .map_err(|err| err.to_string())?;
            if json {
                println!("{}", to_json(&record.redacted())?);
            } else {
                println!("#{}  {}  {}", record.id, record.created_date, record.original_filename);
                println!();
                println!("{}", record.ocr_text);
            }
        }
        HistorySubcommand::Delete { id } => {
            let status = backend
                .delete_history_record(&id)
                .await
                .map_err(|err| err.to_string())?;
            println!("{}", status.message);
        }
        HistorySubcommand::Clear { yes } => {
            if !yes {
                return Err("Refusing to clear history without --yes.".to_string());
            }
            let status = backend.clear_history().await.map_err(|err| err.to_string())?;
            println!("{}", status.message);
        }
        HistorySubcommand::Download { id, dir } => download(&backend, &id, &dir).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn record(image_path: &str) -> HistoryRecord {
        HistoryRecord {
            id: "20240101120000".to_string(),
            timestamp: String::new(),
            created_date: String::new(),
            original_filename: String::new(),
            image_path: image_path.to_string(),
            ocr_text: String::new(),
            ocr_result: Value::Null,
            settings: Value::Null,
        }
    }

    #[test]
    fn image_name_keeps_stored_extension() {
        assert_eq!(
            image_file_name(&record("static/history/20240101120000.png")),
            "record-20240101120000.png"
        );
        assert_eq!(image_file_name(&record("noext")), "record-20240101120000.jpg");
    }
}
