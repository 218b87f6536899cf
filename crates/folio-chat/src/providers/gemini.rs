use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{require_key, HttpTransport};
use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::provider::{ChatProvider, ChatReply};
use crate::settings::ProviderSettings;
use crate::turn::{recent, ChatRole, ChatTurn, MESSAGE_CONTEXT_TURNS};

/// Google Gemini, `POST {base}/models/{model}:generateContent`.
///
/// The key travels in the `x-goog-api-key` header, never in the URL.
pub struct GeminiProvider {
    http: HttpTransport,
    settings: ProviderSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u64>,
}

impl GeminiProvider {
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
impl ChatProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<ChatReply, ProviderError> {
        let body = GenerateRequest {
            contents: recent(turns, MESSAGE_CONTEXT_TURNS)
                .iter()
                .map(|turn| Content {
                    role: match turn.role {
                        ChatRole::Assistant => "model",
                        ChatRole::User | ChatRole::System => "user",
                    },
                    parts: [Part {
                        text: &turn.content,
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_tokens,
            },
        };

        let path = format!("models/{}:generateContent", self.settings.model);
        let request = self
            .http
            .client()
            .post(format!("{}/{path}", self.settings.endpoint))
            .header("x-goog-api-key", require_key(&self.settings)?)
            .json(&body);
        let response: GenerateResponse = self.http.send_json(&path, request).await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| ProviderError::MalformedReply {
                provider: "gemini",
                detail: "no candidates in response".to_string(),
            })?;

        Ok(ChatReply {
            text: text.trim().to_string(),
            provider: ProviderKind::Gemini,
            model: self.settings.model.clone(),
            tokens_used: response.usage_metadata.and_then(|u| u.total_token_count),
        })
    }
}
