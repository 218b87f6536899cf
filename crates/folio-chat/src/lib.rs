//! Lazily constructed AI chat providers behind one uniform capability.
//!
//! Callers hand a provider identifier (or nothing, for the configured
//! default) and a conversation to [`ProviderRegistry::complete`]. Each
//! provider is built on its first request and reused afterwards; a provider
//! whose construction failed keeps failing fast with
//! [`ProviderError::Unavailable`].

pub mod error;
pub mod kind;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod settings;
pub mod turn;

pub use error::ProviderError;
pub use kind::ProviderKind;
pub use provider::{ChatProvider, ChatReply};
pub use registry::{
    HttpProviderFactory, ProviderFactory, ProviderHandle, ProviderRegistry, ProviderState,
};
pub use settings::ProviderSettings;
pub use turn::{ChatRole, ChatTurn};
