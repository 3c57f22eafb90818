use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};

use gemma_chat::error::{GemmaChatError, Result};
use gemma_chat::providers::{CompletionResponse, Provider};
use gemma_chat::session::{
    ConversationSession, GenerationRequest, Modality, Role, SamplingPolicy, SessionOptions,
};
use gemma_chat::ImageAttachment;

/// Completion stub answering from a fixed prompt to reply mapping
///
/// Replies are keyed by the last user turn's text; unmapped prompts get
/// `"Echo: {text}"`. A gated stub holds every call until `release`.
#[allow(dead_code)]
#[derive(Default)]
pub struct StubProvider {
    replies: HashMap<String, String>,
    fail_with: Option<String>,
    gate: Option<Semaphore>,
    entered: Notify,
    prompts: Mutex<Vec<String>>,
    samplings: Mutex<Vec<SamplingPolicy>>,
}

#[allow(dead_code)]
impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, prompt: &str, reply: &str) -> Self {
        self.replies.insert(prompt.to_string(), reply.to_string());
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub async fn wait_until_called(&self) {
        self.entered.notified().await;
    }

    /// Serialized prompts received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn samplings(&self) -> Vec<SamplingPolicy> {
        self.samplings.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn complete(
        &self,
        request: &GenerationRequest,
        sampling: &SamplingPolicy,
    ) -> Result<CompletionResponse> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.prompt().to_string());
        self.samplings.lock().unwrap().push(*sampling);
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if let Some(message) = &self.fail_with {
            return Err(GemmaChatError::Provider(message.clone()).into());
        }

        let text = request
            .turns()
            .iter()
            .rev()
            .find(|turn| turn.role() == Role::User)
            .map(|turn| turn.text().to_string())
            .unwrap_or_default();
        let reply = self
            .replies
            .get(&text)
            .cloned()
            .unwrap_or_else(|| format!("Echo: {}", text));
        Ok(CompletionResponse::new(reply))
    }

    fn get_current_model(&self) -> Result<String> {
        Ok("stub-gemma".to_string())
    }
}

#[allow(dead_code)]
pub fn session_with(
    provider: &Arc<StubProvider>,
    multi_turn: bool,
    modality: Modality,
) -> ConversationSession {
    let options = SessionOptions {
        multi_turn,
        modality,
        ..SessionOptions::default()
    };
    ConversationSession::new(provider.clone(), options).expect("valid session options")
}

#[allow(dead_code)]
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01";

#[allow(dead_code)]
pub fn png_image() -> ImageAttachment {
    ImageAttachment::from_bytes(PNG_BYTES.to_vec()).expect("PNG bytes recognized")
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
