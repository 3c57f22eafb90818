//! Test utilities for gemma-chat
//!
//! This module provides a scripted stand-in for the completion primitive and
//! small helpers for building test inputs.

use crate::attachments::ImageAttachment;
use crate::error::{GemmaChatError, Result};
use crate::providers::{CompletionResponse, Provider};
use crate::session::{GenerationRequest, Role, SamplingPolicy};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};

/// Smallest byte string the image sniffer recognizes as PNG
pub const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Create a PNG attachment for tests
pub fn png_attachment() -> ImageAttachment {
    ImageAttachment::from_bytes(PNG_HEADER.to_vec()).expect("PNG header should be recognized")
}

/// Provider with a fixed prompt to reply mapping
///
/// Replies are keyed by the text of the last user turn in the request.
/// Unmapped prompts get `"Reply to: {text}"`. Every call is recorded, and a
/// gated provider blocks each call until [`ScriptedProvider::release`].
///
/// # Examples
///
/// ```ignore
/// use gemma_chat::test_utils::ScriptedProvider;
///
/// let provider = ScriptedProvider::new().with_reply("Hi", "Hello!");
/// ```
pub struct ScriptedProvider {
    replies: Mutex<HashMap<String, String>>,
    failure: Option<String>,
    gate: Option<Semaphore>,
    entered: Notify,
    calls: Mutex<Vec<(GenerationRequest, SamplingPolicy)>>,
}

impl ScriptedProvider {
    /// Create a provider that answers every prompt
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            failure: None,
            gate: None,
            entered: Notify::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider whose every call fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    /// Map a user prompt to a fixed reply
    pub fn with_reply(self, prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .insert(prompt.into(), reply.into());
        self
    }

    /// Block every call until `release` is called once per call
    pub fn gated(self) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..self
        }
    }

    /// Let one blocked (or future) call proceed
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Wait until a call has reached the provider
    pub async fn wait_until_called(&self) {
        self.entered.notified().await;
    }

    /// Requests received so far, in call order
    pub fn calls(&self) -> Vec<(GenerationRequest, SamplingPolicy)> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        request: &GenerationRequest,
        sampling: &SamplingPolicy,
    ) -> Result<CompletionResponse> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((request.clone(), *sampling));
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }

        if let Some(message) = &self.failure {
            return Err(GemmaChatError::Provider(message.clone()).into());
        }

        let prompt = request
            .turns()
            .iter()
            .rev()
            .find(|turn| turn.role() == Role::User)
            .map(|turn| turn.text().to_string())
            .unwrap_or_default();
        let reply = self
            .replies
            .lock()
            .expect("replies lock poisoned")
            .get(&prompt)
            .cloned()
            .unwrap_or_else(|| format!("Reply to: {}", prompt));

        Ok(CompletionResponse::new(reply))
    }

    fn get_current_model(&self) -> Result<String> {
        Ok("scripted".to_string())
    }
}
