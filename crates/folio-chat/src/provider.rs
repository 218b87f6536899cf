use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::turn::ChatTurn;

/// A provider's answer to one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub provider: ProviderKind,
    pub model: String,
    /// Total tokens, when the provider reports usage.
    pub tokens_used: Option<u64>,
}

/// Uniform "complete a conversation" capability.
///
/// `turns` is oldest first and non-empty; the last turn is the one being
/// answered. Implementations trim older context themselves.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete(&self, turns: &[ChatTurn]) -> Result<ChatReply, ProviderError>;
}
