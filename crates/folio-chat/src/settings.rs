//! Per-provider configuration, read when a provider is first constructed.

use std::env::VarError;
use std::fmt;

use folio_core::{ConfigError, EnvReader};
use sha2::{Digest, Sha256};

use crate::kind::ProviderKind;

pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Everything needed to construct one provider client.
#[derive(Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// Base URL, or the full generation endpoint for [`ProviderKind::Llama`].
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderSettings {
    /// Reads the settings for `kind` through `lookup`.
    ///
    /// | Provider  | Key (required)      | Endpoint           | Model          |
    /// |-----------|---------------------|--------------------|----------------|
    /// | openai    | `OPENAI_API_KEY`    | `OPENAI_BASE_URL`  | `OPENAI_MODEL` |
    /// | anthropic | `ANTHROPIC_API_KEY` | `ANTHROPIC_BASE_URL` | `ANTHROPIC_MODEL` |
    /// | gemini    | `GEMINI_API_KEY`    | `GEMINI_BASE_URL`  | `GEMINI_MODEL` |
    /// | ollama    | none                | `OLLAMA_BASE_URL`  | `OLLAMA_MODEL` |
    /// | llama     | `HUGGINGFACE_TOKEN` (optional) | `LLAMA_API_URL` (required) | `LLAMA_MODEL` |
    ///
    /// `MAX_TOKENS`, `TEMPERATURE` and `LLM_TIMEOUT` apply to all providers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup<F>(kind: ProviderKind, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let env = EnvReader::new(lookup);
        let max_tokens = env.parse("MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let temperature = env.parse("TEMPERATURE", DEFAULT_TEMPERATURE)?;
        let timeout_secs = env.parse("LLM_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidEnvVar {
                var: "TEMPERATURE".to_string(),
                reason: "must be between 0.0 and 2.0".to_string(),
            });
        }

        let (endpoint, api_key, model) = match kind {
            ProviderKind::OpenAi => (
                env.or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                Some(env.require("OPENAI_API_KEY")?),
                env.or_default("OPENAI_MODEL", "gpt-3.5-turbo"),
            ),
            ProviderKind::Anthropic => (
                env.or_default("ANTHROPIC_BASE_URL", "https://api.anthropic.com/v1"),
                Some(env.require("ANTHROPIC_API_KEY")?),
                env.or_default("ANTHROPIC_MODEL", "claude-3-haiku-20240307"),
            ),
            ProviderKind::Gemini => (
                env.or_default(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta",
                ),
                Some(env.require("GEMINI_API_KEY")?),
                env.or_default("GEMINI_MODEL", "gemini-pro"),
            ),
            ProviderKind::Ollama => (
                env.or_default("OLLAMA_BASE_URL", "http://localhost:11434"),
                None,
                env.or_default("OLLAMA_MODEL", "llama2"),
            ),
            ProviderKind::Llama => (
                env.require("LLAMA_API_URL")?,
                env.optional("HUGGINGFACE_TOKEN"),
                env.or_default("LLAMA_MODEL", "llama"),
            ),
        };

        Ok(Self {
            kind,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens,
            temperature,
            timeout_secs,
        })
    }

    /// Hex SHA-256 over model, endpoint, timeout and token budget.
    ///
    /// Identifies the configuration a handle was built from without
    /// revealing the credential.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.model.as_bytes());
        hasher.update([0]);
        hasher.update(self.endpoint.as_bytes());
        hasher.update([0]);
        hasher.update(self.timeout_secs.to_be_bytes());
        hasher.update(self.max_tokens.to_be_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
