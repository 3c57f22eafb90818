//! Gemma turn framing and generation request assembly
//!
//! This is the only place prompts are formatted. Each turn is wrapped as
//!
//! ```text
//! <start_of_turn>{role}
//! {text}<end_of_turn>
//! ```
//!
//! and the prompt ends with an unterminated `<start_of_turn>model` line that
//! marks where generation begins. Image attachments are announced with one
//! `<start_of_image>` marker each, ahead of the turn text.

use super::core::SessionOptions;
use super::history::{ConversationHistory, Role, Turn};
use crate::attachments::ImageAttachment;

/// Opens a turn; followed by the role name and a newline
pub const START_OF_TURN: &str = "<start_of_turn>";
/// Closes a turn; followed by a newline
pub const END_OF_TURN: &str = "<end_of_turn>";
/// Placeholder for one attached image inside a turn
pub const START_OF_IMAGE: &str = "<start_of_image>";

/// Approximate prompt tokens consumed by one Gemma 3 image
const IMAGE_TOKEN_ESTIMATE: usize = 256;

/// Prompt payload for one call to the completion primitive
///
/// Carries both forms a backend may need: the serialized prompt string and
/// the structured turns it was built from. Built fresh for every call and
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    turns: Vec<Turn>,
}

impl GenerationRequest {
    /// Builds a request from the turns to include, in order
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::session::{GenerationRequest, Turn};
    ///
    /// let request = GenerationRequest::new(vec![Turn::user("Hi")]);
    /// assert_eq!(
    ///     request.prompt(),
    ///     "<start_of_turn>user\nHi<end_of_turn>\n<start_of_turn>model\n"
    /// );
    /// ```
    pub fn new(turns: Vec<Turn>) -> Self {
        let prompt = format_prompt(&turns);
        Self { prompt, turns }
    }

    /// Serialized prompt with turn delimiters
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Turns included in this request
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Images of the included turns, in prompt order
    pub fn images(&self) -> impl Iterator<Item = &ImageAttachment> {
        self.turns.iter().flat_map(|turn| turn.attachments().iter())
    }
}

/// Formats turns into a Gemma prompt ending with the open model-turn marker
pub fn format_prompt<'a>(turns: impl IntoIterator<Item = &'a Turn>) -> String {
    let mut prompt = String::new();
    for turn in turns {
        push_turn(&mut prompt, turn);
    }
    push_generation_marker(&mut prompt);
    prompt
}

fn push_turn(out: &mut String, turn: &Turn) {
    out.push_str(START_OF_TURN);
    out.push_str(turn.role().as_str());
    out.push('\n');
    for _ in turn.attachments() {
        out.push_str(START_OF_IMAGE);
    }
    out.push_str(turn.text());
    out.push_str(END_OF_TURN);
    out.push('\n');
}

fn push_generation_marker(out: &mut String) {
    out.push_str(START_OF_TURN);
    out.push_str(Role::Model.as_str());
    out.push('\n');
}

/// Estimates token count with a characters / 4 heuristic
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

fn turn_cost(turn: &Turn) -> usize {
    let mut framed = String::new();
    push_turn(&mut framed, turn);
    estimate_tokens(&framed) + turn.attachments().len() * IMAGE_TOKEN_ESTIMATE
}

/// Builds the request for the most recent turn of `history`
///
/// Single-turn sessions send only the last turn. Multi-turn sessions send the
/// whole history, or with a `max_context_tokens` budget, the longest suffix
/// that starts on a user turn and fits. The last turn is always included.
pub fn build_request(history: &ConversationHistory, options: &SessionOptions) -> GenerationRequest {
    let turns = history.turns();
    let Some(last) = turns.len().checked_sub(1) else {
        return GenerationRequest::new(Vec::new());
    };

    let start = if !options.multi_turn {
        last
    } else if let Some(budget) = options.max_context_tokens {
        let mut used = estimate_tokens("<start_of_turn>model\n") + turn_cost(&turns[last]);
        let mut start = last;
        for idx in (0..last).rev() {
            used += turn_cost(&turns[idx]);
            if used > budget {
                break;
            }
            if turns[idx].role() == Role::User {
                start = idx;
            }
        }
        if start > 0 {
            tracing::debug!(
                "Context budget {} tokens: dropped {} oldest turns from request",
                budget,
                start
            );
        }
        start
    } else {
        0
    };

    GenerationRequest::new(turns[start..].to_vec())
}

/// Decodes raw model output into reply text
///
/// Output is cut at the first `<end_of_turn>` if the backend echoed it, and
/// surrounding whitespace is trimmed.
pub fn parse_reply(raw: &str) -> String {
    let text = match raw.find(END_OF_TURN) {
        Some(end) => &raw[..end],
        None => raw,
    };
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Modality, SamplingPolicy};

    fn options(multi_turn: bool, max_context_tokens: Option<usize>) -> SessionOptions {
        SessionOptions {
            multi_turn,
            sampling: SamplingPolicy::Greedy,
            modality: Modality::Multimodal,
            max_context_tokens,
        }
    }

    fn history(texts: &[&str]) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for (idx, text) in texts.iter().enumerate() {
            if idx % 2 == 0 {
                history.push(Turn::user(*text));
            } else {
                history.push(Turn::model(*text));
            }
        }
        history
    }

    fn png() -> ImageAttachment {
        ImageAttachment::from_bytes(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec()).unwrap()
    }

    #[test]
    fn test_format_single_user_turn() {
        let prompt = format_prompt(&[Turn::user("Write a short poem about artificial intelligence.")]);
        assert_eq!(
            prompt,
            "<start_of_turn>user\nWrite a short poem about artificial intelligence.<end_of_turn>\n<start_of_turn>model\n"
        );
    }

    #[test]
    fn test_format_multi_turn() {
        let turns = vec![
            Turn::user("Tell me about Paris."),
            Turn::model("Paris is the capital of France."),
            Turn::user("What attractions?"),
        ];
        assert_eq!(
            format_prompt(&turns),
            "<start_of_turn>user\nTell me about Paris.<end_of_turn>\n\
             <start_of_turn>model\nParis is the capital of France.<end_of_turn>\n\
             <start_of_turn>user\nWhat attractions?<end_of_turn>\n\
             <start_of_turn>model\n"
        );
    }

    #[test]
    fn test_format_empty_is_generation_marker_only() {
        assert_eq!(format_prompt(std::iter::empty()), "<start_of_turn>model\n");
    }

    #[test]
    fn test_image_markers_precede_text() {
        let turn = Turn::user_with_images("Compare these.", vec![png(), png()]);
        assert_eq!(
            format_prompt(&[turn]),
            "<start_of_turn>user\n<start_of_image><start_of_image>Compare these.<end_of_turn>\n<start_of_turn>model\n"
        );
    }

    #[test]
    fn test_request_images_in_prompt_order() {
        let request = GenerationRequest::new(vec![
            Turn::user_with_images("a", vec![png()]),
            Turn::model("b"),
            Turn::user_with_images("c", vec![png()]),
        ]);
        assert_eq!(request.images().count(), 2);
    }

    #[test]
    fn test_build_request_multi_turn_includes_all() {
        let history = history(&["one", "two", "three"]);
        let request = build_request(&history, &options(true, None));
        assert_eq!(request.turns().len(), 3);
        assert!(request.prompt().contains("one"));
        assert!(request.prompt().contains("two"));
    }

    #[test]
    fn test_build_request_single_turn_only_current() {
        let history = history(&["one", "two", "three"]);
        let request = build_request(&history, &options(false, None));
        assert_eq!(request.turns(), &[Turn::user("three")]);
        assert!(!request.prompt().contains("one"));
    }

    #[test]
    fn test_build_request_budget_drops_oldest_exchanges() {
        let long = "x".repeat(400);
        let history = history(&[&long, &long, "recent question", "recent answer", "now"]);
        let request = build_request(&history, &options(true, Some(60)));
        assert_eq!(request.turns().len(), 3);
        assert_eq!(request.turns()[0].text(), "recent question");
        assert_eq!(request.turns()[0].role(), Role::User);
    }

    #[test]
    fn test_build_request_budget_keeps_current_turn_even_if_too_large() {
        let huge = "y".repeat(10_000);
        let history = history(&["hi", "hello", &huge]);
        let request = build_request(&history, &options(true, Some(10)));
        assert_eq!(request.turns().len(), 1);
        assert_eq!(request.turns()[0].text(), huge);
    }

    #[test]
    fn test_build_request_window_never_starts_on_model_turn() {
        let history = history(&["q1", &"a".repeat(200), "q2"]);
        // Room for the model turn but not for q1: window must start at q2.
        let request = build_request(&history, &options(true, Some(75)));
        assert_eq!(request.turns().len(), 1);
        assert_eq!(request.turns()[0].text(), "q2");
    }

    #[test]
    fn test_build_request_empty_history() {
        let request = build_request(&ConversationHistory::new(), &options(true, None));
        assert!(request.turns().is_empty());
    }

    #[test]
    fn test_parse_reply_drops_newline_after_model_header() {
        assert_eq!(parse_reply("\nParis is the capital."), "Paris is the capital.");
        assert_eq!(parse_reply("\n\n  Bonjour<end_of_turn>"), "Bonjour");
    }

    #[test]
    fn test_parse_reply_strips_end_of_turn() {
        assert_eq!(parse_reply("Hello there!<end_of_turn>\n"), "Hello there!");
        assert_eq!(parse_reply("  plain reply \n"), "plain reply");
        assert_eq!(parse_reply("a<end_of_turn>b<end_of_turn>"), "a");
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
