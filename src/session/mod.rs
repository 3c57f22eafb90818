//! Conversation sessions over a stateless completion provider
//!
//! This module layers a stateful chat abstraction on top of
//! [`Provider`](crate::providers::Provider):
//!
//! - `history`: turns and the append-only conversation history
//! - `sampling`: greedy or temperature-scaled sampling policy
//! - `prompt`: Gemma turn framing and request assembly
//! - `core`: the [`ConversationSession`] state machine

pub mod core;
pub mod history;
pub mod prompt;
pub mod sampling;

pub use self::core::{ConversationSession, Modality, SessionOptions, SessionState};
pub use history::{ConversationHistory, Role, Turn};
pub use prompt::{build_request, format_prompt, parse_reply, GenerationRequest};
pub use sampling::SamplingPolicy;
