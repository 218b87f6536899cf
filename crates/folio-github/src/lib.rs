pub mod client;
pub mod endpoint;
pub mod error;
pub mod normalize;
pub mod retry;
pub mod types;

pub use client::GithubClient;
pub use endpoint::{validate_endpoint, validate_segment, ValidatedPath};
pub use error::GithubError;
pub use normalize::{normalize_profile, normalize_repository};
pub use retry::RetryPolicy;
pub use types::{ProfilePayload, RateLimitStatus, RateWindow, RepositoryPayload};
