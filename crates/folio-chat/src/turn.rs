//! Conversation turns and the context trimming applied before sending them.

use serde::{Deserialize, Serialize};

/// Turns kept for providers that accept a structured message list.
pub const MESSAGE_CONTEXT_TURNS: usize = 10;
/// Turns kept for providers that take a single prompt transcript.
pub const PROMPT_CONTEXT_TURNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The last `limit` turns, oldest first.
#[must_use]
pub fn recent(turns: &[ChatTurn], limit: usize) -> &[ChatTurn] {
    &turns[turns.len().saturating_sub(limit)..]
}

/// `Human:`/`Assistant:` transcript ending with an open assistant line, for
/// text-generation endpoints.
#[must_use]
pub fn dialogue_prompt(turns: &[ChatTurn]) -> String {
    let mut lines: Vec<String> = recent(turns, PROMPT_CONTEXT_TURNS)
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                ChatRole::System => "System",
                ChatRole::User => "Human",
                ChatRole::Assistant => "Assistant",
            };
            format!("{speaker}: {}", turn.content)
        })
        .collect();
    lines.push("Assistant:".to_string());
    lines.join("\n")
}

/// `role: content` transcript for completion endpoints.
#[must_use]
pub fn role_prompt(turns: &[ChatTurn]) -> String {
    recent(turns, PROMPT_CONTEXT_TURNS)
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}
