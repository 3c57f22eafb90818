//! Topic expert: a conversation primed to answer as an authority on one topic
//!
//! The role-setting message is sent as the first user turn, so it stays in
//! the window for every later question of a multi-turn session.

use crate::error::{GemmaChatError, Result};
use crate::session::ConversationSession;
use std::path::Path;

/// Chat session specialized on a single topic
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use gemma_chat::config::OllamaConfig;
/// use gemma_chat::expert::TopicExpert;
/// use gemma_chat::providers::OllamaProvider;
/// use gemma_chat::session::{ConversationSession, SessionOptions};
///
/// # async fn example() -> gemma_chat::error::Result<()> {
/// let provider = Arc::new(OllamaProvider::new(OllamaConfig::default())?);
/// let session = ConversationSession::new(provider, SessionOptions::default())?;
/// let expert = TopicExpert::new(session, "astronomy", None);
/// expert.prime().await?;
/// println!("{}", expert.ask("Why is Mars red?").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TopicExpert {
    session: ConversationSession,
    topic: String,
    knowledge: Option<String>,
}

impl TopicExpert {
    /// Wrap a session; call [`TopicExpert::prime`] before asking questions
    pub fn new(
        session: ConversationSession,
        topic: impl Into<String>,
        knowledge: Option<String>,
    ) -> Self {
        Self {
            session,
            topic: topic.into(),
            knowledge: knowledge.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Topic of expertise
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Background knowledge included in the priming message
    pub fn knowledge(&self) -> Option<&str> {
        self.knowledge.as_deref()
    }

    /// Underlying session
    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Role-setting message sent as the first turn
    pub fn priming_message(&self) -> String {
        let mut message = format!(
            "I want you to act as an expert on {topic}. \
             Please respond to all questions as if you are a leading authority on this subject. \
             Keep your answers focused on {topic}.",
            topic = self.topic
        );
        if let Some(knowledge) = &self.knowledge {
            message.push_str("\n\nHere's some specialized knowledge you have:\n");
            message.push_str(knowledge);
        }
        message
    }

    /// Send the role-setting message and return the model's acknowledgement
    ///
    /// # Errors
    ///
    /// Propagates session errors from `send_message`
    pub async fn prime(&self) -> Result<String> {
        tracing::info!(topic = %self.topic, "Priming topic expert");
        self.session
            .send_message(self.priming_message(), Vec::new())
            .await
    }

    /// Ask the expert a question
    ///
    /// # Errors
    ///
    /// Propagates session errors from `send_message`
    pub async fn ask(&self, question: impl Into<String>) -> Result<String> {
        self.session.send_message(question, Vec::new()).await
    }

    /// Clear the conversation and prime the expert again
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentOperation` while a question is in flight, or the
    /// priming failure
    pub async fn reset(&self) -> Result<String> {
        self.session.reset()?;
        self.prime().await
    }
}

/// Read a knowledge file for [`TopicExpert::new`]
///
/// # Errors
///
/// Returns `GemmaChatError::Io` if the file cannot be read
pub fn load_knowledge(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let knowledge = std::fs::read_to_string(path).map_err(GemmaChatError::Io)?;
    tracing::debug!(
        "Loaded {} characters of knowledge from {}",
        knowledge.chars().count(),
        path.display()
    );
    Ok(knowledge)
}
