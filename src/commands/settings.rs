use clap::{Args, Subcommand};

use crate::backend::{BackendClient, DetMode, OcrVersion, Settings};
use crate::config;
use crate::logging::{self, LogArgs};

#[derive(Debug, Args, Clone)]
pub struct SettingsArgs {
    #[command(subcommand)]
    command: SettingsSubcommand,
    /// OCR backend URL
    #[arg(long, global = true)]
    backend: Option<String>,
    #[command(flatten)]
    log: LogArgs,
}

#[derive(Debug, Subcommand, Clone)]
enum SettingsSubcommand {
    /// Print the recognition settings stored by the backend
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Change stored settings; unspecified ones are kept
    Set(SettingsUpdate),
}

#[derive(Debug, Args, Clone, Default)]
struct SettingsUpdate {
    #[arg(long, value_enum)]
    engine: Option<OcrVersion>,
    #[arg(long, value_enum)]
    det_mode: Option<DetMode>,
    #[arg(long)]
    image_size: Option<u32>,
    #[arg(long)]
    char_ocr: Option<bool>,
    #[arg(long)]
    preprocess: Option<bool>,
    #[arg(long)]
    auto_deskew: Option<bool>,
    #[arg(long)]
    enhance_contrast: Option<bool>,
    #[arg(long)]
    reduce_noise: Option<bool>,
    #[arg(long)]
    sharpen: Option<bool>,
    #[arg(long)]
    api_token: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

impl SettingsUpdate {
    fn apply(self, settings: &mut Settings) {
        if let Some(engine) = self.engine {
            settings.version = engine.as_str().to_string();
        }
        if let Some(det_mode) = self.det_mode {
            settings.det_mode = det_mode.as_str().to_string();
        }
        if let Some(size) = self.image_size {
            settings.image_size = size;
        }
        if let Some(flag) = self.char_ocr {
            settings.char_ocr = flag;
        }
        if let Some(flag) = self.preprocess {
            settings.preprocess_enabled = flag;
        }
        if let Some(flag) = self.auto_deskew {
            settings.auto_deskew = flag;
        }
        if let Some(flag) = self.enhance_contrast {
            settings.enhance_contrast = flag;
        }
        if let Some(flag) = self.reduce_noise {
            settings.reduce_noise = flag;
        }
        if let Some(flag) = self.sharpen {
            settings.sharpen = flag;
        }
        if let Some(token) = self.api_token {
            settings.api_token = token;
        }
        if let Some(email) = self.email {
            settings.email = email;
        }
    }
}

fn print_settings(settings: &Settings) {
    println!("engine:            {}", settings.version().as_str());
    println!("det_mode:          {}", settings.det_mode().as_str());
    println!("image_size:        {}", settings.image_size);
    println!("char_ocr:          {}", settings.char_ocr);
    println!("preprocess:        {}", settings.preprocess_enabled);
    println!("auto_deskew:       {}", settings.auto_deskew);
    println!("enhance_contrast:  {}", settings.enhance_contrast);
    println!("reduce_noise:      {}", settings.reduce_noise);
    println!("sharpen:           {}", settings.sharpen);
    println!(
        "api_token:         {}",
        if settings.api_token.is_empty() { "unset" } else { "set" }
    );
}

pub async fn run(args: SettingsArgs) -> Result<(), String> {
    logging::init(args.log);
    let backend = BackendClient::new(config::backend_url(args.backend.as_deref()));
    let mut settings = backend.settings().await.map_err(|err| err.to_string())?;

    match args.command {
        SettingsSubcommand::Show { json } => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&settings.redacted())
                        .map_err(|err| err.to_string())?
                );
            } else {
                print_settings(&settings);
            }
        }
        SettingsSubcommand::Set(update) => {
            update.apply(&mut settings);
            let status = backend
                .save_settings(&settings)
                .await
                .map_err(|err| err.to_string())?;
            log::debug!("settings saved: {}", status.status);
            println!("{}", status.message);
        }
    }
    Ok(())
}
