//! Stateful multi-turn session over a stateless completion provider
//!
//! A [`ConversationSession`] records every turn, frames the prompt for each
//! call, and allows at most one call in flight. It takes `&self` everywhere so
//! one session can be shared behind an `Arc`; overlapping calls fail fast with
//! [`GemmaChatError::ConcurrentOperation`] instead of interleaving history.

use super::history::{ConversationHistory, Turn};
use super::prompt;
use super::sampling::SamplingPolicy;
use crate::attachments::ImageAttachment;
use crate::error::{GemmaChatError, Result};
use crate::providers::Provider;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Input modalities the configured model variant accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Text prompts only; image attachments are rejected
    #[default]
    TextOnly,
    /// Text plus image attachments
    Multimodal,
}

impl Modality {
    /// Returns true if image attachments are accepted
    pub fn accepts_images(&self) -> bool {
        matches!(self, Self::Multimodal)
    }
}

/// Per-session behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Include prior turns in each request
    pub multi_turn: bool,
    /// Sampling policy applied to every call
    pub sampling: SamplingPolicy,
    /// Whether the model variant accepts images
    pub modality: Modality,
    /// Token budget for the request window; `None` sends the full history
    pub max_context_tokens: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            multi_turn: true,
            sampling: SamplingPolicy::Greedy,
            modality: Modality::TextOnly,
            max_context_tokens: None,
        }
    }
}

impl SessionOptions {
    /// Checks option invariants
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Config` for an invalid sampling temperature
    /// or a zero context budget
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        if self.max_context_tokens == Some(0) {
            return Err(GemmaChatError::Config(
                "max_context_tokens must be greater than 0".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Turn-level state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No call in flight; `send_message` and `reset` are accepted
    Idle,
    /// A provider call is in flight
    AwaitingResponse,
}

/// Exclusive claim on a session's single in-flight slot, released on drop
struct TurnSlot {
    busy: Arc<AtomicBool>,
}

impl TurnSlot {
    fn claim(busy: &Arc<AtomicBool>) -> std::result::Result<Self, GemmaChatError> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GemmaChatError::ConcurrentOperation)?;
        Ok(Self {
            busy: Arc::clone(busy),
        })
    }
}

impl Drop for TurnSlot {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

fn read_history(history: &RwLock<ConversationHistory>) -> RwLockReadGuard<'_, ConversationHistory> {
    history.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_history(
    history: &RwLock<ConversationHistory>,
) -> RwLockWriteGuard<'_, ConversationHistory> {
    history.write().unwrap_or_else(PoisonError::into_inner)
}

/// Multi-turn chat session
///
/// The provider is shared and not owned: many sessions may hold clones of the
/// same `Arc<dyn Provider>` and run in parallel. The history belongs to this
/// session alone.
///
/// Provider calls run on a spawned tokio task, so `send_message` must be
/// called from within a tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use gemma_chat::config::OllamaConfig;
/// use gemma_chat::providers::OllamaProvider;
/// use gemma_chat::session::{ConversationSession, SessionOptions};
///
/// # async fn example() -> gemma_chat::error::Result<()> {
/// let provider = Arc::new(OllamaProvider::new(OllamaConfig::default())?);
/// let session = ConversationSession::new(provider, SessionOptions::default())?;
///
/// let reply = session.send_message("Tell me about Paris.", Vec::new()).await?;
/// println!("{}", reply);
/// assert_eq!(session.history().len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct ConversationSession {
    id: Uuid,
    provider: Arc<dyn Provider>,
    options: SessionOptions,
    history: Arc<RwLock<ConversationHistory>>,
    busy: Arc<AtomicBool>,
}

impl ConversationSession {
    /// Creates a session with an empty history
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Config` if `options` are invalid
    pub fn new(provider: Arc<dyn Provider>, options: SessionOptions) -> Result<Self> {
        options.validate()?;
        let id = Uuid::new_v4();
        debug!(session = %id, ?options, "Created conversation session");
        Ok(Self {
            id,
            provider,
            options,
            history: Arc::new(RwLock::new(ConversationHistory::new())),
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Unique identifier used in log records
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Options this session was created with
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Shared provider handle
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Current turn state
    pub fn state(&self) -> SessionState {
        if self.busy.load(Ordering::Acquire) {
            SessionState::AwaitingResponse
        } else {
            SessionState::Idle
        }
    }

    /// Sends a user message and waits for the model's reply
    ///
    /// The user turn is recorded before the provider is called. The model
    /// turn is recorded only when the call succeeds.
    ///
    /// If the returned future is dropped early, the provider call still runs
    /// to completion and the session stays [`SessionState::AwaitingResponse`]
    /// until it does; a reply that arrives is still recorded.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `text` is empty or whitespace (history unchanged)
    /// - `UnsupportedModality` if images are sent to a text-only session
    ///   (history unchanged)
    /// - `ConcurrentOperation` if another call is in flight (history unchanged)
    /// - `Generation` if the provider fails (user turn kept, no model turn)
    pub async fn send_message(
        &self,
        text: impl Into<String>,
        attachments: Vec<ImageAttachment>,
    ) -> Result<String> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(GemmaChatError::InvalidInput("message text is empty".to_string()).into());
        }
        if !attachments.is_empty() && !self.options.modality.accepts_images() {
            return Err(GemmaChatError::UnsupportedModality(format!(
                "{} image attachment(s) sent to a text-only session",
                attachments.len()
            ))
            .into());
        }

        let slot = TurnSlot::claim(&self.busy)?;

        let request = {
            let mut history = write_history(&self.history);
            history.push(Turn::user_with_images(text, attachments));
            prompt::build_request(&history, &self.options)
        };

        debug!(
            session = %self.id,
            turns = request.turns().len(),
            images = request.images().count(),
            prompt_chars = request.prompt().len(),
            sampling = %self.options.sampling,
            "Submitting generation request"
        );

        let provider = Arc::clone(&self.provider);
        let history = Arc::clone(&self.history);
        let sampling = self.options.sampling;
        let session_id = self.id;

        let call = tokio::spawn(async move {
            let _slot = slot;
            let response = provider.complete(&request, &sampling).await?;
            let reply = prompt::parse_reply(&response.text);
            write_history(&history).push(Turn::model(reply.clone()));
            if let Some(usage) = response.usage {
                debug!(
                    session = %session_id,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Generation complete"
                );
            }
            Ok::<_, anyhow::Error>(reply)
        });

        match call.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(cause)) => {
                warn!(session = %self.id, "Generation failed: {:#}", cause);
                Err(GemmaChatError::generation(cause).into())
            }
            Err(join_error) => {
                warn!(session = %self.id, "Generation task aborted: {}", join_error);
                Err(GemmaChatError::generation(anyhow::anyhow!(
                    "generation task aborted: {}",
                    join_error
                ))
                .into())
            }
        }
    }

    /// Clears the history
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentOperation` while a call is in flight
    pub fn reset(&self) -> Result<()> {
        let _slot = TurnSlot::claim(&self.busy)?;
        write_history(&self.history).clear();
        info!(session = %self.id, "Conversation history reset");
        Ok(())
    }

    /// Snapshot of the recorded turns
    pub fn history(&self) -> ConversationHistory {
        read_history(&self.history).clone()
    }

    /// Number of recorded turns
    pub fn turn_count(&self) -> usize {
        read_history(&self.history).len()
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("state", &self.state())
            .field("turns", &self.turn_count())
            .finish()
    }
}
