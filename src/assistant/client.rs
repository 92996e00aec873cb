use std::env;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::assistant::chat_runtime::{RequestFailure, RetryPolicy, post_chat};
use crate::assistant::provider::{
    AskOptions, AskResponse, AssistantError, ChatMessage, Provider, Usage, api_key_env,
    api_key_from_env, endpoint,
};
use crate::assistant::stream::{self, Assembled};

/// Overrides the provider's chat-completions URL.
pub const ASSISTANT_URL_ENV: &str = "GJ_ASSISTANT_URL";

/// Chat-completions URL for `provider`, honoring [`ASSISTANT_URL_ENV`].
pub fn resolve_endpoint(provider: Provider) -> String {
    env::var(ASSISTANT_URL_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| endpoint(provider).to_string())
}

/// One chat-completions call: who answers, what they see, how they sample.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub options: AskOptions,
}

impl ChatRequest {
    /// Messages as sent on the wire, system prompt first.
    pub fn wire_messages(&self) -> Vec<ChatMessage> {
        self.system
            .iter()
            .map(|system| ChatMessage::system(system.clone()))
            .chain(self.messages.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Chat-completions client for OpenAI-compatible providers.
#[derive(Debug, Clone)]
pub struct ChatClient {
    provider: Provider,
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint: resolve_endpoint(provider),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Builds a client from the provider's API-key variable.
    pub fn from_env(provider: Provider) -> Result<Self, AssistantError> {
        let api_key = api_key_from_env(provider).ok_or(AssistantError::MissingApiKey {
            provider,
            key_env: api_key_env(provider),
        })?;
        Ok(Self::new(provider, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        request: &ChatRequest,
        streaming: bool,
    ) -> Result<reqwest::Response, AssistantError> {
        let provider = self.provider;
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: request.wire_messages(),
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            stream: streaming,
        };

        log::debug!(
            "sending {} messages to {} (model={}, stream={streaming})",
            payload.messages.len(),
            provider.as_str(),
            request.model
        );

        post_chat(
            &self.http,
            &self.endpoint,
            &self.api_key,
            &payload,
            RetryPolicy {
                timeout_secs: request.options.timeout_secs,
                retries: request.options.retries,
                base_delay_ms: request.options.retry_delay_ms,
                streaming,
            },
        )
        .await
        .map_err(|failure| match failure {
            RequestFailure::Request(source) => AssistantError::Request { provider, source },
            RequestFailure::Api { status, body } => AssistantError::Api {
                provider,
                status,
                body,
            },
        })
    }

    /// Waits for the whole reply.
    pub async fn complete(&self, request: &ChatRequest) -> Result<AskResponse, AssistantError> {
        let provider = self.provider;
        let response = self.send(request, false).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|source| AssistantError::Request { provider, source })?;
        let content = body
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.is_empty())
            .ok_or(AssistantError::EmptyResponse { provider })?;
        let usage = body.usage.map(|usage| Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        });

        Ok(AskResponse { content, usage })
    }

    /// Streams the reply, handing each fragment to `on_delta` as it arrives.
    ///
    /// A transport failure mid-stream discards what was received so far.
    pub async fn complete_streaming<F>(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_delta: F,
    ) -> Result<Assembled, AssistantError>
    where
        F: FnMut(&str),
    {
        let provider = self.provider;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AssistantError::Stream {
                    provider,
                    source: stream::StreamError::Cancelled,
                });
            }
            response = self.send(request, true) => response?,
        };

        let assembled = stream::assemble_until_cancelled(response.bytes_stream(), cancel, on_delta)
            .await
            .map_err(|source| AssistantError::Stream { provider, source })?;

        log::debug!(
            "{} reply assembled: {} deltas, {} skipped, ended by {}",
            provider.as_str(),
            assembled.deltas,
            assembled.skipped,
            assembled.termination.as_str()
        );
        Ok(assembled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_messages_put_system_prompt_first() {
        let request = ChatRequest {
            model: "deepseek-chat".to_string(),
            system: Some("sys".to_string()),
            messages: vec![ChatMessage::user("问"), ChatMessage::assistant("答")],
            options: AskOptions::default(),
        };

        let wire = request.wire_messages();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0], ChatMessage::system("sys"));
        assert_eq!(wire[2], ChatMessage::assistant("答"));
    }

    #[test]
    fn wire_messages_without_system_prompt() {
        let request = ChatRequest {
            model: "deepseek-chat".to_string(),
            system: None,
            messages: vec![ChatMessage::user("问")],
            options: AskOptions::default(),
        };

        assert_eq!(request.wire_messages(), vec![ChatMessage::user("问")]);
    }
}
