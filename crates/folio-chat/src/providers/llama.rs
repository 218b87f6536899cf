use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::HttpTransport;
use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::provider::{ChatProvider, ChatReply};
use crate::settings::ProviderSettings;
use crate::turn::{dialogue_prompt, ChatTurn};

/// A Hugging Face text-generation endpoint at `LLAMA_API_URL`.
pub struct LlamaProvider {
    http: HttpTransport,
    settings: ProviderSettings,
}

#[derive(Serialize)]
struct GenerationRequest {
    inputs: String,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Parameters {
    max_new_tokens: u32,
    temperature: f32,
    do_sample: bool,
    return_full_text: bool,
}

/// Inference endpoints answer either with a list or a single object.
#[derive(Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Many(Vec<Generated>),
    One(Generated),
}

#[derive(Deserialize)]
struct Generated {
    generated_text: String,
}

impl LlamaProvider {
    /// # Errors
    ///
    /// [`ProviderError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            http: HttpTransport::new(&settings)?,
            settings,
        })
    }
}

#[async_trait]
impl ChatProvider for LlamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Llama
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<ChatReply, ProviderError> {
        let body = GenerationRequest {
            inputs: dialogue_prompt(turns),
            parameters: Parameters {
                max_new_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
                do_sample: true,
                return_full_text: false,
            },
        };

        let mut request = self.http.client().post(&self.settings.endpoint).json(&body);
        if let Some(token) = &self.settings.api_key {
            request = request.bearer_auth(token);
        }
        let response: GenerationResponse = self.http.send_json("generate", request).await?;

        let text = match response {
            GenerationResponse::Many(items) => items.into_iter().next().map(|g| g.generated_text),
            GenerationResponse::One(item) => Some(item.generated_text),
        }
        .ok_or_else(|| ProviderError::MalformedReply {
            provider: "llama",
            detail: "empty generation list".to_string(),
        })?;

        Ok(ChatReply {
            text: text.trim().to_string(),
            provider: ProviderKind::Llama,
            model: self.settings.model.clone(),
            tokens_used: None,
        })
    }
}
