use clap::ValueEnum;

pub const BASE_SYSTEM_PROMPT: &str = "你是一个专业的古文文献助手，擅长分析、翻译和解释古代中文文献。";

const CONTEXT_HEADER: &str = "\n\n当前需要分析的古文内容：\n";

/// Builds the system prompt, attaching the recognized text when there is any.
pub fn system_prompt(base: Option<&str>, context: &str) -> String {
    let mut prompt = base.unwrap_or(BASE_SYSTEM_PROMPT).to_string();
    if !context.trim().is_empty() {
        prompt.push_str(CONTEXT_HEADER);
        prompt.push_str(context);
    }
    prompt
}

/// Canned requests about the recognized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuickAction {
    Analyze,
    Translate,
    Explain,
    Background,
}

impl QuickAction {
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Analyze => "请分析这段古文的结构与用词。",
            Self::Translate => "请翻译这段古文为现代汉语。",
            Self::Explain => "请逐句解释这段古文的意思。",
            Self::Background => "请提供这段古文的背景信息或出处。",
        }
    }

    /// Maps an interactive `/command` to its action.
    pub fn from_command(command: &str) -> Option<Self> {
        match command.trim().trim_start_matches('/') {
            "analyze" => Some(Self::Analyze),
            "translate" => Some(Self::Translate),
            "explain" => Some(Self::Explain),
            "background" => Some(Self::Background),
            _ => None,
        }
    }
}
