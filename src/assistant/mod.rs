//! Reading assistant backed by an LLM chat-completions API.
//!
//! The assistant answers questions about recognized classical Chinese text.
//! Replies are normally streamed and assembled by [`stream`].

pub(crate) mod chat_runtime;
/// Chat-completions client.
pub mod client;
/// System prompt and canned requests.
pub mod prompts;
/// Providers, messages, and errors.
pub mod provider;
/// Incremental assembly of streamed replies.
pub mod stream;

pub use client::{ChatClient, ChatRequest};
pub use provider::{AskOptions, AskResponse, AssistantError, ChatMessage, Provider, Role};
pub use stream::{Assembled, StreamError, Termination};
