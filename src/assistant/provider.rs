use std::env;
use std::str::FromStr;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assistant::stream::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Deepseek,
    Openai,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Deepseek, Provider::Openai];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deepseek => "deepseek",
            Self::Openai => "openai",
        }
    }

    pub fn supported_values() -> String {
        Self::ALL
            .iter()
            .map(|provider| provider.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Ok(Self::Deepseek),
            "openai" => Ok(Self::Openai),
            _ => Err(()),
        }
    }
}

pub fn endpoint(provider: Provider) -> &'static str {
    match provider {
        Provider::Deepseek => "https://api.deepseek.com/v1/chat/completions",
        Provider::Openai => "https://api.openai.com/v1/chat/completions",
    }
}

pub fn api_key_env(provider: Provider) -> &'static str {
    match provider {
        Provider::Deepseek => "DEEPSEEK_API_KEY",
        Provider::Openai => "OPENAI_API_KEY",
    }
}

pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Deepseek => "deepseek-chat",
        Provider::Openai => "gpt-4o-mini",
    }
}

/// Reads the provider key, treating blank values as unset.
pub fn api_key_from_env(provider: Provider) -> Option<String> {
    env::var(api_key_env(provider))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AskOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: Some(4000),
            timeout_secs: None,
            retries: 0,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AskResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{key_env} is not set in the environment")]
    MissingApiKey {
        provider: Provider,
        key_env: &'static str,
    },
    #[error("{} request failed: {source}", provider.as_str())]
    Request {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
    #[error("{} API error {status}: {body}", provider.as_str())]
    Api {
        provider: Provider,
        status: StatusCode,
        body: String,
    },
    #[error("{} response did not contain message content", provider.as_str())]
    EmptyResponse { provider: Provider },
    #[error("Please enter a question or request.")]
    EmptyMessage,
    #[error("{} reply stream failed: {source}", provider.as_str())]
    Stream {
        provider: Provider,
        #[source]
        source: StreamError,
    },
}

impl AssistantError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Stream {
                source: StreamError::Cancelled,
                ..
            }
        )
    }
}
