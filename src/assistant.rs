//! Document assistant: text analysis, image description, and summaries
//!
//! Every helper goes through one [`ConversationSession`], so in a multi-turn
//! session later questions can refer back to an analyzed document.

use crate::attachments::ImageAttachment;
use crate::documents::{self, DocumentFormat};
use crate::error::{GemmaChatError, Result};
use crate::session::ConversationSession;
use std::path::Path;

/// Instruction used by [`DocumentAssistant::process_text`] when none is given
pub const DEFAULT_TEXT_INSTRUCTION: &str = "Please analyze the following text and provide insights:";

/// Prompt used by [`DocumentAssistant::analyze_image`] when none is given
pub const DEFAULT_IMAGE_PROMPT: &str = "Please analyze this image and describe what you see:";

/// Documents longer than this many characters are summarized in parts
pub const SUMMARY_CHUNK_CHARS: usize = 10_000;

const SHORT_SUMMARY_INSTRUCTION: &str = "Please summarize this document:";
const COMBINE_SUMMARY_INSTRUCTION: &str = "The following are summaries of different parts of a document. \
     Please provide a coherent overall summary:";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp"];

/// Session-backed helper for text and image documents
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use gemma_chat::assistant::DocumentAssistant;
/// use gemma_chat::config::OllamaConfig;
/// use gemma_chat::providers::OllamaProvider;
/// use gemma_chat::session::{ConversationSession, SessionOptions};
///
/// # async fn example() -> gemma_chat::error::Result<()> {
/// let provider = Arc::new(OllamaProvider::new(OllamaConfig::default())?);
/// let session = ConversationSession::new(provider, SessionOptions::default())?;
/// let assistant = DocumentAssistant::new(session);
/// println!("{}", assistant.summarize_document("README.md").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DocumentAssistant {
    session: ConversationSession,
}

impl DocumentAssistant {
    /// Wrap a session
    pub fn new(session: ConversationSession) -> Self {
        Self { session }
    }

    /// Underlying session
    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Send `text` preceded by an instruction
    ///
    /// # Errors
    ///
    /// Propagates session errors from `send_message`
    pub async fn process_text(&self, text: &str, instruction: Option<&str>) -> Result<String> {
        let instruction = instruction.unwrap_or(DEFAULT_TEXT_INSTRUCTION);
        self.session
            .send_message(format!("{}\n\n{}", instruction, text), Vec::new())
            .await
    }

    /// Ask the model about an image
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedModality` on a text-only session, or other session
    /// errors from `send_message`
    pub async fn analyze_image(&self, image: ImageAttachment, prompt: Option<&str>) -> Result<String> {
        let prompt = prompt.unwrap_or(DEFAULT_IMAGE_PROMPT);
        self.session.send_message(prompt, vec![image]).await
    }

    /// Summarize a text, PDF, or DOCX document, or describe an image file
    ///
    /// Text longer than [`SUMMARY_CHUNK_CHARS`] is summarized part by part,
    /// then the part summaries are combined in a final call.
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Document` for unsupported or empty documents,
    /// `GemmaChatError::Io` if the file cannot be read, or session errors
    pub async fn summarize_document(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            let image = ImageAttachment::from_path(path)?;
            return self.analyze_image(image, None).await;
        }

        if DocumentFormat::from_path(path).is_none() {
            return Err(GemmaChatError::Document(format!(
                "Unsupported file format: {}",
                if extension.is_empty() {
                    path.display().to_string()
                } else {
                    format!(".{}", extension)
                }
            ))
            .into());
        }

        let text = documents::extract_text(path).await?;
        if text.trim().is_empty() {
            return Err(GemmaChatError::Document(format!(
                "Could not extract text from {}",
                path.display()
            ))
            .into());
        }

        let chunks = split_chunks(&text, SUMMARY_CHUNK_CHARS);
        if chunks.len() == 1 {
            return self
                .process_text(&text, Some(SHORT_SUMMARY_INSTRUCTION))
                .await;
        }

        let total = chunks.len();
        let mut summaries = Vec::with_capacity(total);
        for (idx, chunk) in chunks.iter().enumerate() {
            tracing::info!("Summarizing part {}/{} of {}", idx + 1, total, path.display());
            let instruction = format!(
                "This is part {} of {} of a document. Please summarize this section:",
                idx + 1,
                total
            );
            summaries.push(self.process_text(chunk, Some(&instruction)).await?);
        }

        self.process_text(&summaries.join("\n\n"), Some(COMBINE_SUMMARY_INSTRUCTION))
            .await
    }
}

/// Split `text` into pieces of at most `size` characters, on char boundaries
fn split_chunks(text: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() || chunks.is_empty() {
        chunks.push(&text[start..]);
    }
    chunks
}
