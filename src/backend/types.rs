use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stands in for secrets in printed output.
pub const REDACTED: &str = "***";

/// Image identifier handed out by the upload endpoint.
///
/// Uploads get sequential numbers; the bundled sample uses a fixed name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageId {
    Number(u64),
    Name(String),
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub image_path: String,
    pub full_path: String,
    pub image_id: ImageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OcrVersion {
    /// Standard recognition.
    #[default]
    Default,
    /// Reading-order optimized recognition.
    Beta,
    /// Baidu general OCR.
    Baidu,
}

impl OcrVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Beta => "beta",
            Self::Baidu => "baidu",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(Self::Default),
            "beta" => Some(Self::Beta),
            "baidu" => Some(Self::Baidu),
            _ => None,
        }
    }
}

/// Text layout direction used for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetMode {
    /// Vertical columns.
    #[default]
    Sp,
    /// Horizontal lines.
    Hp,
    Auto,
}

impl DetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sp => "sp",
            Self::Hp => "hp",
            Self::Auto => "auto",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sp" => Some(Self::Sp),
            "hp" => Some(Self::Hp),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub auto_deskew: bool,
    pub enhance_contrast: bool,
    pub noise_reduction: bool,
    pub sharpen: bool,
    pub binarize: bool,
}

impl PreprocessOptions {
    /// Options as sent when preprocessing is toggled; all off when disabled.
    pub fn gated(self, enabled: bool) -> Self {
        if enabled { self } else { Self::default() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrRequest {
    pub image_path: String,
    pub full_path: String,
    pub image_id: ImageId,
    pub det_mode: DetMode,
    pub char_ocr: bool,
    pub image_size: u32,
    pub version: OcrVersion,
    pub preprocess: bool,
    pub preprocess_options: PreprocessOptions,
    pub is_default_image: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrData {
    #[serde(default)]
    pub text_lines: Vec<TextLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub det_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    #[serde(default)]
    pub data: Option<OcrData>,
}

/// Confidence bucket shown next to each recognized character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    Good,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_percent(percent: u32) -> Self {
        if percent >= 80 {
            Self::Good
        } else if percent >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// One recognized character with its crop and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordData {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl WordData {
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round().max(0.0) as u32
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_percent(self.confidence_percent())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub ocr_result: OcrResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_image: Option<String>,
    #[serde(default)]
    pub words_data: Vec<WordData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessed_image: Option<String>,
}

impl OcrResponse {
    pub fn text_lines(&self) -> &[TextLine] {
        self.ocr_result
            .data
            .as_ref()
            .map(|data| data.text_lines.as_slice())
            .unwrap_or_default()
    }

    /// Recognized lines joined with newlines.
    pub fn text(&self) -> String {
        self.text_lines()
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionType {
    /// Simplified to traditional.
    #[serde(rename = "s2t")]
    S2t,
    /// Traditional to simplified.
    #[serde(rename = "t2s")]
    T2s,
}

impl ConversionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S2t => "s2t",
            Self::T2s => "t2s",
        }
    }

    pub fn target_name(self) -> &'static str {
        match self {
            Self::S2t => "traditional",
            Self::T2s => "simplified",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertResponse {
    pub converted_text: String,
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub conversion_type: Option<ConversionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub created_date: String,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default)]
    pub preview_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub created_date: String,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub ocr_text: String,
    #[serde(default)]
    pub ocr_result: Value,
    #[serde(default)]
    pub settings: Value,
}

impl HistoryRecord {
    /// Copy safe to print: the settings snapshot has its API token masked.
    pub fn redacted(&self) -> Self {
        let mut record = self.clone();
        if let Some(token) = record
            .settings
            .get_mut("api_token")
            .filter(|token| token.as_str().is_some_and(|value| !value.is_empty()))
        {
            *token = Value::String(REDACTED.to_string());
        }
        record
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Recognition settings stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_token: String,
    pub email: String,
    pub det_mode: String,
    pub image_size: u32,
    pub char_ocr: bool,
    pub return_position: bool,
    pub return_choices: bool,
    pub version: String,
    pub preprocess_enabled: bool,
    pub auto_deskew: bool,
    pub enhance_contrast: bool,
    pub reduce_noise: bool,
    pub sharpen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            email: String::new(),
            det_mode: DetMode::Sp.as_str().to_string(),
            image_size: 1024,
            char_ocr: true,
            return_position: true,
            return_choices: true,
            version: OcrVersion::Default.as_str().to_string(),
            preprocess_enabled: true,
            auto_deskew: true,
            enhance_contrast: true,
            reduce_noise: true,
            sharpen: true,
        }
    }
}

impl Settings {
    /// Copy safe to print, with the API token masked.
    pub fn redacted(&self) -> Self {
        let mut settings = self.clone();
        if !settings.api_token.is_empty() {
            settings.api_token = REDACTED.to_string();
        }
        settings
    }

    pub fn det_mode(&self) -> DetMode {
        DetMode::parse(&self.det_mode).unwrap_or_default()
    }

    pub fn version(&self) -> OcrVersion {
        OcrVersion::parse(&self.version).unwrap_or_default()
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            auto_deskew: self.auto_deskew,
            enhance_contrast: self.enhance_contrast,
            noise_reduction: self.reduce_noise,
            sharpen: self.sharpen,
            binarize: false,
        }
    }
}
