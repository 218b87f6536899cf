use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{require_key, token_sum, HttpTransport};
use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::provider::{ChatProvider, ChatReply};
use crate::settings::ProviderSettings;
use crate::turn::{recent, ChatRole, ChatTurn, MESSAGE_CONTEXT_TURNS};

const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API, `POST {base}/messages`.
pub struct AnthropicProvider {
    http: HttpTransport,
    settings: ProviderSettings,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl AnthropicProvider {
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
impl ChatProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<ChatReply, ProviderError> {
        let context = recent(turns, MESSAGE_CONTEXT_TURNS);
        // System turns travel in the top-level `system` field.
        let system: Vec<&str> = context
            .iter()
            .filter(|t| t.role == ChatRole::System)
            .map(|t| t.content.as_str())
            .collect();
        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: (!system.is_empty()).then(|| system.join("\n")),
            messages: context
                .iter()
                .filter(|t| t.role != ChatRole::System)
                .map(|t| Message {
                    role: t.role.as_str(),
                    content: &t.content,
                })
                .collect(),
        };

        let request = self
            .http
            .client()
            .post(format!("{}/messages", self.settings.endpoint))
            .header("x-api-key", require_key(&self.settings)?)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        let response: MessagesResponse = self.http.send_json("messages", request).await?;

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(ProviderError::MalformedReply {
                provider: "anthropic",
                detail: "no text content in response".to_string(),
            });
        }

        Ok(ChatReply {
            text: text.trim().to_string(),
            provider: ProviderKind::Anthropic,
            model: response.model.unwrap_or_else(|| self.settings.model.clone()),
            tokens_used: response
                .usage
                .and_then(|u| token_sum(&[u.input_tokens, u.output_tokens])),
        })
    }
}
