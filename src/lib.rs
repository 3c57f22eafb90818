//! gemma-chat - Multi-turn conversations with Gemma 3 models
//!
//! This library turns a stateless "prompt in, text out" completion call into
//! a stateful chat: it keeps the turn history, frames prompts with Gemma's
//! turn delimiters, and attaches images to turns for multimodal models.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: `ConversationSession`, history, prompt framing, and sampling
//! - `providers`: the completion primitive and its Gemini and Ollama backends
//! - `attachments`: image handles attached to user turns
//! - `expert` and `assistant`: task helpers layered on a session
//! - `documents`: text extraction from text, PDF, and DOCX files
//! - `server`: HTTP adapter keyed by conversation id
//! - `config`, `error`, `cli`, `commands`: configuration, errors, and the CLI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gemma_chat::{providers, Config, ConversationSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let provider = providers::create_provider(&config.provider.provider_type, &config.provider)?;
//!     let session = ConversationSession::new(Arc::from(provider), config.session.to_options())?;
//!     println!("{}", session.send_message("Tell me about Paris.", Vec::new()).await?);
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod attachments;
pub mod cli;
pub mod commands;
pub mod config;
pub mod documents;
pub mod error;
pub mod expert;
pub mod providers;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use attachments::ImageAttachment;
pub use config::Config;
pub use error::{GemmaChatError, Result};
pub use providers::Provider;
pub use session::{ConversationSession, SamplingPolicy, SessionOptions};

#[cfg(test)]
pub mod test_utils;
