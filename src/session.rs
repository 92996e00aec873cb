//! Per-run application state.
//!
//! A [`Session`] is created when a command starts, mutated as the user
//! selects images, runs recognition, and talks to the assistant, and dropped
//! when the command ends. Nothing here outlives the process.

use tokio_util::sync::CancellationToken;

use crate::assistant::prompts::system_prompt;
use crate::assistant::{
    AskOptions, AskResponse, Assembled, AssistantError, ChatClient, ChatMessage, ChatRequest, Role,
};
use crate::backend::{ImageId, OcrResponse, UploadResponse};

const SAMPLE_IMAGE_PATH: &str = "static/images/placeholder.jpg";
const SAMPLE_FULL_PATH: &str = "TheFirst/static/images/placeholder.jpg";
const SAMPLE_IMAGE_ID: &str = "default_sample";

/// Image currently selected for recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSelection {
    pub image_path: String,
    pub full_path: String,
    pub image_id: ImageId,
}

impl ImageSelection {
    /// The sample image shipped with the backend.
    pub fn sample() -> Self {
        Self {
            image_path: SAMPLE_IMAGE_PATH.to_string(),
            full_path: SAMPLE_FULL_PATH.to_string(),
            image_id: ImageId::Name(SAMPLE_IMAGE_ID.to_string()),
        }
    }

    pub fn is_sample(&self) -> bool {
        self.image_id == ImageId::Name(SAMPLE_IMAGE_ID.to_string())
    }
}

impl From<UploadResponse> for ImageSelection {
    fn from(upload: UploadResponse) -> Self {
        Self {
            image_path: upload.image_path,
            full_path: upload.full_path,
            image_id: upload.image_id,
        }
    }
}

/// Model and sampling settings applied to every assistant turn.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    /// Replaces the default system prompt; recognized text is still attached.
    pub system: Option<String>,
    pub options: AskOptions,
}

#[derive(Debug, Default)]
pub struct Session {
    selection: Option<ImageSelection>,
    ocr_text: String,
    transcript: Vec<ChatMessage>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_image(&mut self, selection: ImageSelection) {
        log::info!("selected image {} ({})", selection.image_id, selection.image_path);
        self.selection = Some(selection);
        self.ocr_text.clear();
    }

    pub fn selection(&self) -> Option<&ImageSelection> {
        self.selection.as_ref()
    }

    /// Records a recognition result; its text becomes the assistant context.
    pub fn record_ocr(&mut self, response: &OcrResponse) {
        self.ocr_text = response.text();
    }

    pub fn set_ocr_text(&mut self, text: impl Into<String>) {
        self.ocr_text = text.into();
    }

    pub fn ocr_text(&self) -> &str {
        &self.ocr_text
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn clear_chat(&mut self) {
        self.transcript.clear();
    }

    /// Starts a turn: appends the question and an empty reply placeholder.
    ///
    /// Returns the messages to send, which exclude the placeholder.
    pub fn begin_turn(&mut self, message: &str) -> Result<Vec<ChatMessage>, AssistantError> {
        if message.trim().is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        self.transcript.push(ChatMessage::user(message));
        let request = self.transcript.clone();
        self.transcript.push(ChatMessage::assistant(String::new()));
        Ok(request)
    }

    fn placeholder_mut(&mut self) -> Option<&mut ChatMessage> {
        self.transcript
            .last_mut()
            .filter(|entry| entry.role == Role::Assistant)
    }

    /// Partial reply of the turn in progress.
    pub fn pending_reply(&self) -> Option<&str> {
        self.transcript
            .last()
            .filter(|entry| entry.role == Role::Assistant)
            .map(|entry| entry.content.as_str())
    }

    pub fn append_delta(&mut self, delta: &str) {
        if let Some(entry) = self.placeholder_mut() {
            entry.content.push_str(delta);
        }
    }

    pub fn complete_turn(&mut self, content: String) {
        if let Some(entry) = self.placeholder_mut() {
            entry.content = content;
        }
    }

    /// Drops the reply placeholder of a failed turn; the question stays.
    pub fn abort_turn(&mut self) {
        if self.placeholder_mut().is_some() {
            self.transcript.pop();
        }
    }

    fn chat_request(&self, settings: &TurnSettings, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: settings.model.clone(),
            system: Some(system_prompt(settings.system.as_deref(), &self.ocr_text)),
            messages,
            options: settings.options,
        }
    }

    /// Runs one streamed turn; `on_delta` sees every fragment as it lands.
    pub async fn ask_streaming<F>(
        &mut self,
        client: &ChatClient,
        settings: &TurnSettings,
        message: &str,
        cancel: &CancellationToken,
        mut on_delta: F,
    ) -> Result<Assembled, AssistantError>
    where
        F: FnMut(&str),
    {
        let messages = self.begin_turn(message)?;
        let request = self.chat_request(settings, messages);

        let result = client
            .complete_streaming(&request, cancel, |delta: &str| {
                self.append_delta(delta);
                on_delta(delta);
            })
            .await;

        match result {
            Ok(assembled) => {
                self.complete_turn(assembled.content.clone());
                Ok(assembled)
            }
            Err(err) => {
                self.abort_turn();
                Err(err)
            }
        }
    }

    /// Runs one turn without streaming.
    pub async fn ask(
        &mut self,
        client: &ChatClient,
        settings: &TurnSettings,
        message: &str,
    ) -> Result<AskResponse, AssistantError> {
        let messages = self.begin_turn(message)?;
        let request = self.chat_request(settings, messages);

        match client.complete(&request).await {
            Ok(response) => {
                self.complete_turn(response.content.clone());
                Ok(response)
            }
            Err(err) => {
                self.abort_turn();
                Err(err)
            }
        }
    }

    /// Request that [`Session::ask_streaming`] would send, without sending it.
    pub fn preview_request(&self, settings: &TurnSettings, message: &str) -> ChatRequest {
        let mut messages = self.transcript.clone();
        messages.push(ChatMessage::user(message));
        self.chat_request(settings, messages)
    }
}
