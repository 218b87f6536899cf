use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ProviderError;

/// Identifier of a supported chat backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
    /// A Hugging Face text-generation endpoint.
    Llama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Ollama,
        ProviderKind::Llama,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Llama => "llama",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ProviderKind::OpenAi => 0,
            ProviderKind::Anthropic => 1,
            ProviderKind::Gemini => 2,
            ProviderKind::Ollama => 3,
            ProviderKind::Llama => 4,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            "ollama" => Ok(ProviderKind::Ollama),
            "llama" | "huggingface" => Ok(ProviderKind::Llama),
            _ => Err(ProviderError::UnknownProvider(s.trim().to_string())),
        }
    }
}
