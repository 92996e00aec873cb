use std::fmt::Write;

use owo_colors::OwoColorize;
use pulldown_cmark::{Options, Parser, html};

use crate::backend::{ConfidenceLevel, DetMode, HistoryEntry, OcrRequest, OcrVersion, WordData};

/// Renders an assistant reply as an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

fn level_label(level: ConfidenceLevel, color: bool) -> String {
    let label = level.as_str();
    if !color {
        return label.to_string();
    }
    match level {
        ConfidenceLevel::Good => label.green().to_string(),
        ConfidenceLevel::Medium => label.yellow().to_string(),
        ConfidenceLevel::Low => label.red().to_string(),
    }
}

/// Per-character recognition table: index, character, confidence.
pub fn word_table(words: &[WordData], color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>4}  {:<4}  {:>5}  level", "#", "char", "conf");
    for (index, word) in words.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<4}  {:>4}%  {}",
            index + 1,
            word.text,
            word.confidence_percent(),
            level_label(word.confidence_level(), color)
        );
    }
    out
}

pub fn history_table(entries: &[HistoryEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "#{}  {}  {}  {}",
            entry.id,
            entry.created_date,
            entry.original_filename,
            entry.preview_text.replace('\n', " ")
        );
    }
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Human-readable summary of the recognition parameters.
pub fn describe_ocr_request(request: &OcrRequest) -> Vec<String> {
    let version = match request.version {
        OcrVersion::Default => "standard",
        OcrVersion::Beta => "reading-order optimized",
        OcrVersion::Baidu => "Baidu OCR",
    };
    let layout = match request.det_mode {
        DetMode::Sp => "vertical",
        DetMode::Hp => "horizontal",
        DetMode::Auto => "auto",
    };
    let detection = if request.char_ocr {
        "single characters"
    } else {
        "text lines"
    };

    let mut lines = vec![
        "recognition parameters:".to_string(),
        format!("- version: {version}"),
        format!("- layout: {layout}"),
        format!("- detection: {detection}"),
        format!("- image size: {}px", request.image_size),
        format!("- preprocessing: {}", if request.preprocess { "on" } else { "off" }),
    ];

    if request.preprocess {
        let options = request.preprocess_options;
        lines.push(format!("  - auto deskew: {}", yes_no(options.auto_deskew)));
        lines.push(format!("  - enhance contrast: {}", yes_no(options.enhance_contrast)));
        lines.push(format!("  - noise reduction: {}", yes_no(options.noise_reduction)));
        lines.push(format!("  - sharpen: {}", yes_no(options.sharpen)));
        lines.push(format!("  - binarize: {}", yes_no(options.binarize)));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ImageId, PreprocessOptions};

    #[test]
    fn markdown_headings_and_emphasis_become_html() {
        let html = markdown_to_html("## 译文\n\n**学而**时习之");
        assert!(html.contains("<h2>译文</h2>"));
        assert!(html.contains("<strong>学而</strong>时习之"));
    }

    #[test]
    fn markdown_renders_partial_input() {
        let html = markdown_to_html("- 子曰\n- 学而");
        assert!(html.contains("<li>子曰</li>"));
        assert!(markdown_to_html("**未完").contains("**未完"));
    }

    #[test]
    fn word_table_lists_percent_and_level() {
        let words = vec![
            WordData {
                text: "仁".to_string(),
                confidence: 0.93,
                image: None,
            },
            WordData {
                text: "義".to_string(),
                confidence: 0.42,
                image: None,
            },
        ];
        let table = word_table(&words, false);
        let rows: Vec<&str> = table.lines().collect();

        assert_eq!(rows.len(), 3);
        assert!(rows[1].contains("仁") && rows[1].contains("93%") && rows[1].ends_with("good"));
        assert!(rows[2].contains("42%") && rows[2].ends_with("low"));

        let colored = word_table(&words, true);
        assert!(colored.contains("\u{1b}["));
    }

    #[test]
    fn preprocess_details_only_when_enabled() {
        let mut request = OcrRequest {
            image_path: "a.jpg".to_string(),
            full_path: "a.jpg".to_string(),
            image_id: ImageId::Number(1),
            det_mode: DetMode::Sp,
            char_ocr: true,
            image_size: 1024,
            version: OcrVersion::Beta,
            preprocess: false,
            preprocess_options: PreprocessOptions::default(),
            is_default_image: false,
        };
        let lines = describe_ocr_request(&request);
        assert_eq!(lines.len(), 6);
        assert!(lines.contains(&"- layout: vertical".to_string()));

        request.preprocess = true;
        assert_eq!(describe_ocr_request(&request).len(), 11);
    }
}
