mod app_config;
mod config;
mod entities;
mod env;
mod log_sanitize;

pub use app_config::{AppConfig, Environment, UpstreamConfig};
pub use config::{
    build_app_config, build_upstream_config, load_app_config, load_app_config_from_env,
    load_upstream_config_from_env,
};
pub use entities::{
    normalize_key, CachePolicyWindow, ExternalProfile, Page, RepositoryRecord, RepositorySnapshot,
};
pub use env::EnvReader;
pub use log_sanitize::sanitize_for_log;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
