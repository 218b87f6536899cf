use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{require_key, HttpTransport};
use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::provider::{ChatProvider, ChatReply};
use crate::settings::ProviderSettings;
use crate::turn::{recent, ChatTurn, MESSAGE_CONTEXT_TURNS};

/// OpenAI-compatible `POST {base}/chat/completions`.
pub struct OpenAiProvider {
    http: HttpTransport,
    settings: ProviderSettings,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// [`ProviderError::Unavailable`] if no API key is configured.
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        require_key(&settings)?;
        Ok(Self {
            http: HttpTransport::new(&settings)?,
            settings,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<ChatReply, ProviderError> {
        let body = CompletionRequest {
            model: &self.settings.model,
            messages: recent(turns, MESSAGE_CONTEXT_TURNS)
                .iter()
                .map(|turn| Message {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let request = self
            .http
            .client()
            .post(format!("{}/chat/completions", self.settings.endpoint))
            .bearer_auth(require_key(&self.settings)?)
            .json(&body);
        let response: CompletionResponse = self.http.send_json("chat/completions", request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedReply {
                provider: "openai",
                detail: "no choices in response".to_string(),
            })?;

        Ok(ChatReply {
            text: text.trim().to_string(),
            provider: ProviderKind::OpenAi,
            model: response.model.unwrap_or_else(|| self.settings.model.clone()),
            tokens_used: response.usage.and_then(|u| u.total_tokens),
        })
    }
}
