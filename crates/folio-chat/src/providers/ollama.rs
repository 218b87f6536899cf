use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::HttpTransport;
use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::provider::{ChatProvider, ChatReply};
use crate::settings::ProviderSettings;
use crate::turn::{role_prompt, ChatTurn};

/// A local Ollama server, `POST {base}/api/generate` without streaming.
pub struct OllamaProvider {
    http: HttpTransport,
    settings: ProviderSettings,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

impl OllamaProvider {
    /// Builds the client and checks that the server answers `GET /api/tags`.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Unavailable`] if the server cannot be reached.
    pub async fn connect(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let http = HttpTransport::new(&settings)?;
        let request = http.client().get(format!("{}/api/tags", settings.endpoint));
        let tags: TagsResponse = http.send_json("api/tags", request).await.map_err(|e| {
            ProviderError::Unavailable {
                provider: "ollama",
                reason: format!("preflight failed: {e}"),
            }
        })?;
        tracing::debug!(models = tags.models.len(), "ollama preflight succeeded");
        Ok(Self { http, settings })
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<ChatReply, ProviderError> {
        let body = GenerateRequest {
            model: &self.settings.model,
            prompt: role_prompt(turns),
            stream: false,
            options: Options {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        };

        let request = self
            .http
            .client()
            .post(format!("{}/api/generate", self.settings.endpoint))
            .json(&body);
        let response: GenerateResponse = self.http.send_json("api/generate", request).await?;

        Ok(ChatReply {
            text: response.response.trim().to_string(),
            provider: ProviderKind::Ollama,
            model: response.model.unwrap_or_else(|| self.settings.model.clone()),
            tokens_used: super::token_sum(&[response.prompt_eval_count, response.eval_count]),
        })
    }
}
