//! Per-provider lazy construction.
//!
//! Each [`ProviderKind`] owns one slot that moves through
//! `Unresolved -> Resolving -> Ready` or `Unresolved -> Resolving -> Failed`.
//! The first request for a kind builds its handle; concurrent first requests
//! wait on the same initialization instead of building duplicates. The
//! outcome is kept for the process lifetime.

use std::env::VarError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use folio_core::sanitize_for_log;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::provider::{ChatProvider, ChatReply};
use crate::providers::{
    AnthropicProvider, GeminiProvider, LlamaProvider, OllamaProvider, OpenAiProvider,
};
use crate::settings::ProviderSettings;
use crate::turn::ChatTurn;

const DEFAULT_PROVIDER_VAR: &str = "DEFAULT_LLM_PROVIDER";
const FALLBACK_PROVIDER: ProviderKind = ProviderKind::Llama;

type Lookup = Arc<dyn Fn(&str) -> Result<String, VarError> + Send + Sync>;

/// A constructed provider plus the fingerprint of the settings it was built
/// from.
#[derive(Clone)]
pub struct ProviderHandle {
    provider: Arc<dyn ChatProvider>,
    fingerprint: String,
}

impl ProviderHandle {
    #[must_use]
    pub fn new(provider: Arc<dyn ChatProvider>, fingerprint: String) -> Self {
        Self {
            provider,
            fingerprint,
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Builds the handle for one provider kind.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn build(&self, kind: ProviderKind) -> Result<ProviderHandle, ProviderError>;
}

/// [`ProviderFactory`] that reads [`ProviderSettings`] at build time and
/// constructs the HTTP client for the requested kind.
pub struct HttpProviderFactory {
    lookup: Lookup,
}

impl HttpProviderFactory {
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_lookup(|var| std::env::var(var))
    }

    #[must_use]
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }
}

#[async_trait]
impl ProviderFactory for HttpProviderFactory {
    async fn build(&self, kind: ProviderKind) -> Result<ProviderHandle, ProviderError> {
        let settings = ProviderSettings::from_lookup(kind, |var| (self.lookup)(var)).map_err(
            |e| ProviderError::Unavailable {
                provider: kind.as_str(),
                reason: e.to_string(),
            },
        )?;
        let fingerprint = settings.fingerprint();

        let provider: Arc<dyn ChatProvider> = match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(settings)?),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(settings)?),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(settings)?),
            ProviderKind::Ollama => Arc::new(OllamaProvider::connect(settings).await?),
            ProviderKind::Llama => Arc::new(LlamaProvider::new(settings)?),
        };
        Ok(ProviderHandle::new(provider, fingerprint))
    }
}

/// Observable state of one provider slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderState {
    Unresolved,
    Resolving,
    Ready { fingerprint: String },
    Failed { reason: String },
}

#[derive(Default)]
struct Slot {
    cell: OnceCell<Result<ProviderHandle, ProviderError>>,
    resolving: AtomicBool,
}

/// Resolves provider identifiers to lazily built, cached handles.
pub struct ProviderRegistry {
    factory: Arc<dyn ProviderFactory>,
    lookup: Lookup,
    default_kind: OnceLock<Result<ProviderKind, ProviderError>>,
    slots: [Slot; ProviderKind::ALL.len()],
}

impl ProviderRegistry {
    /// Nothing is read or built until the first request.
    #[must_use]
    pub fn new<F>(factory: Arc<dyn ProviderFactory>, lookup: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError> + Send + Sync + 'static,
    {
        Self {
            factory,
            lookup: Arc::new(lookup),
            default_kind: OnceLock::new(),
            slots: Default::default(),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(Arc::new(HttpProviderFactory::from_env()), |var| {
            std::env::var(var)
        })
    }

    /// The provider used when a request names none, read from
    /// `DEFAULT_LLM_PROVIDER` on first call.
    ///
    /// # Errors
    ///
    /// [`ProviderError::UnknownProvider`] if the configured identifier is not
    /// recognized. The error is kept like a successful read.
    pub fn default_kind(&self) -> Result<ProviderKind, ProviderError> {
        self.default_kind
            .get_or_init(|| match (self.lookup)(DEFAULT_PROVIDER_VAR) {
                Ok(raw) if !raw.trim().is_empty() => {
                    let parsed = raw.parse::<ProviderKind>();
                    match &parsed {
                        Ok(kind) => tracing::info!(provider = %kind, "default chat provider resolved"),
                        Err(e) => tracing::warn!(
                            value = %sanitize_for_log(&raw),
                            error = %e,
                            "default chat provider is not recognized"
                        ),
                    }
                    parsed
                }
                _ => Ok(FALLBACK_PROVIDER),
            })
            .clone()
    }

    /// Answers the conversation with the `requested` provider, or the default
    /// one when `requested` is absent or blank.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::InvalidRequest`] if `turns` is empty or its last turn
    ///   has no content.
    /// - [`ProviderError::UnknownProvider`] if the identifier is not recognized.
    /// - [`ProviderError::Unavailable`] if the provider could not be built,
    ///   now or on an earlier request.
    /// - Any error the provider itself returns.
    pub async fn complete(
        &self,
        requested: Option<&str>,
        turns: &[ChatTurn],
    ) -> Result<ChatReply, ProviderError> {
        match turns.last() {
            None => {
                return Err(ProviderError::InvalidRequest {
                    reason: "conversation has no turns".to_string(),
                })
            }
            Some(last) if last.content.trim().is_empty() => {
                return Err(ProviderError::InvalidRequest {
                    reason: "last turn is empty".to_string(),
                })
            }
            Some(_) => {}
        }

        let kind = match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => name.parse::<ProviderKind>()?,
            None => self.default_kind()?,
        };
        let handle = self.handle(kind).await?;
        handle.provider.complete(turns).await
    }

    /// Returns the handle for `kind`, building it on first use.
    ///
    /// # Errors
    ///
    /// The construction error, replayed on every call after a failed build.
    pub async fn handle(&self, kind: ProviderKind) -> Result<ProviderHandle, ProviderError> {
        let slot = &self.slots[kind.index()];
        slot.cell
            .get_or_init(|| async {
                slot.resolving.store(true, Ordering::SeqCst);
                let _resolving = ResolvingFlag(&slot.resolving);
                tracing::info!(provider = %kind, "constructing chat provider");
                let built = self.factory.build(kind).await;
                match &built {
                    Ok(handle) => tracing::info!(
                        provider = %kind,
                        fingerprint = handle.fingerprint(),
                        "chat provider ready"
                    ),
                    Err(e) => tracing::error!(
                        provider = %kind,
                        error = %e,
                        "chat provider construction failed; requests will fail fast"
                    ),
                }
                built
            })
            .await
            .clone()
    }

    #[must_use]
    pub fn state(&self, kind: ProviderKind) -> ProviderState {
        let slot = &self.slots[kind.index()];
        match slot.cell.get() {
            Some(Ok(handle)) => ProviderState::Ready {
                fingerprint: handle.fingerprint.clone(),
            },
            Some(Err(e)) => ProviderState::Failed {
                reason: e.to_string(),
            },
            None if slot.resolving.load(Ordering::SeqCst) => ProviderState::Resolving,
            None => ProviderState::Unresolved,
        }
    }
}

/// Clears a slot's resolving flag when its build finishes or is cancelled.
struct ResolvingFlag<'a>(&'a AtomicBool);

impl Drop for ResolvingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
