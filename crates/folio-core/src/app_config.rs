use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-level settings read once at startup.
#[derive(Clone)]
pub struct AppConfig {
    /// `None` selects the in-memory entity store.
    pub database_url: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Username whose profile and repositories are refreshed nightly.
    pub owner: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Bearer tokens accepted on operator routes.
    pub api_keys: Vec<String>,
    /// Per-client budget on routes that may call the upstream or a chat provider.
    pub upstream_route_limit: u32,
    /// Per-client budget on routes served from the entity store.
    pub store_route_limit: u32,
    pub rate_limit_window_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("owner", &self.owner)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("upstream_route_limit", &self.upstream_route_limit)
            .field("store_route_limit", &self.store_route_limit)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .finish()
    }
}

/// Settings for the upstream profile/repository service.
///
/// Read lazily, on the first synchronization request, because platform
/// injected variables may not exist yet when the process boots.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
    /// Upper bound on the total time spent sleeping between retries of one call.
    pub retry_budget_secs: u64,
    pub fetch_languages: bool,
    pub cache_window_hours: u32,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("retry_budget_secs", &self.retry_budget_secs)
            .field("fetch_languages", &self.fetch_languages)
            .field("cache_window_hours", &self.cache_window_hours)
            .finish()
    }
}
