//! Conversation turns and the append-only history that holds them

use crate::attachments::ImageAttachment;
use serde::{Deserialize, Serialize};

/// Speaker of a turn
///
/// The string forms are the role names used inside the Gemma turn delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Message written by the caller
    User,
    /// Reply produced by the model
    Model,
}

impl Role {
    /// Role name as it appears after `<start_of_turn>`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation
///
/// Fields are private: once a turn is recorded it cannot be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
    attachments: Vec<ImageAttachment>,
}

impl Turn {
    /// Creates a text-only user turn
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::session::{Role, Turn};
    ///
    /// let turn = Turn::user("Tell me about Paris.");
    /// assert_eq!(turn.role(), Role::User);
    /// assert!(turn.attachments().is_empty());
    /// ```
    pub fn user(text: impl Into<String>) -> Self {
        Self::user_with_images(text, Vec::new())
    }

    /// Creates a user turn carrying image attachments
    pub fn user_with_images(text: impl Into<String>, attachments: Vec<ImageAttachment>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            attachments,
        }
    }

    /// Creates a model turn
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Speaker of this turn
    pub fn role(&self) -> Role {
        self.role
    }

    /// Message text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attached images, in the order they were supplied
    pub fn attachments(&self) -> &[ImageAttachment] {
        &self.attachments
    }
}

/// Ordered, append-only sequence of turns owned by one session
///
/// Outside the crate the history is read-only; the session appends to it and
/// clears it wholesale on reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Creates an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// All turns in insertion order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Iterates over turns in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// Number of recorded turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if no turn has been recorded
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
