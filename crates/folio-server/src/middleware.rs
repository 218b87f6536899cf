//! Request identity, operator auth, and per-client rate limiting.

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use folio_core::{AppConfig, Environment};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const MAX_REQUEST_ID_LEN: usize = 128;
/// Above this many tracked clients, expired windows are swept on insert.
const SWEEP_THRESHOLD: usize = 4_096;

/// Request id stored as a request extension and echoed on the response.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    fn of(req: &Request) -> String {
        req.extensions()
            .get::<Self>()
            .map_or_else(String::new, |id| id.0.clone())
    }
}

/// Bearer tokens accepted on operator routes. An empty set means auth is off.
#[derive(Debug, Clone)]
pub struct OperatorAuth {
    keys: Arc<HashSet<String>>,
}

impl OperatorAuth {
    /// # Errors
    ///
    /// Fails outside development when `FOLIO_API_KEYS` holds no keys.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            config.api_keys.iter().cloned(),
            config.env == Environment::Development,
        )
    }

    /// # Errors
    ///
    /// Fails when `keys` is empty and `allow_open` is false.
    pub fn new(keys: impl IntoIterator<Item = String>, allow_open: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = keys.into_iter().filter(|k| !k.is_empty()).collect();
        if keys.is_empty() {
            anyhow::ensure!(
                allow_open,
                "FOLIO_API_KEYS must list at least one bearer token outside development"
            );
            tracing::warn!("no operator keys configured; curation routes are open");
        }
        Ok(Self {
            keys: Arc::new(keys),
        })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    fn admits(&self, authorization: Option<&HeaderValue>) -> bool {
        !self.is_enabled() || bearer_token(authorization).is_some_and(|t| self.keys.contains(t))
    }
}

/// Which budget a route draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// May reach the upstream service or a chat provider.
    Upstream,
    /// Served from the entity store alone.
    Store,
}

impl RouteClass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Store => "store",
        }
    }
}

#[derive(Debug)]
struct ClientWindow {
    opened: Instant,
    used: u32,
}

/// Fixed-window request budget tracked separately for each client address.
#[derive(Debug, Clone)]
pub struct ClientLimiter {
    class: RouteClass,
    budget: u32,
    window: Duration,
    clients: Arc<Mutex<HashMap<String, ClientWindow>>>,
}

impl ClientLimiter {
    #[must_use]
    pub fn new(class: RouteClass, budget: u32, window: Duration) -> Self {
        Self {
            class,
            budget,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request from `client`, or returns how long until its
    /// window reopens once the budget is spent.
    fn admit(&self, client: &str, now: Instant) -> Result<(), Duration> {
        let mut clients = self.clients.lock();
        if clients.len() >= SWEEP_THRESHOLD {
            clients.retain(|_, w| now.duration_since(w.opened) < self.window);
        }

        let entry = clients
            .entry(client.to_string())
            .or_insert(ClientWindow { opened: now, used: 0 });
        let elapsed = now.duration_since(entry.opened);
        if elapsed >= self.window {
            *entry = ClientWindow { opened: now, used: 0 };
        } else if entry.used >= self.budget {
            return Err(self.window - elapsed);
        }
        entry.used += 1;
        Ok(())
    }
}

/// The two budgets applied across the API.
#[derive(Debug, Clone)]
pub struct RouteLimits {
    pub upstream: ClientLimiter,
    pub store: ClientLimiter,
}

impl RouteLimits {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let window = Duration::from_secs(config.rate_limit_window_secs);
        Self {
            upstream: ClientLimiter::new(RouteClass::Upstream, config.upstream_route_limit, window),
            store: ClientLimiter::new(RouteClass::Store, config.store_route_limit, window),
        }
    }
}

/// Uses a caller-supplied `x-request-id` when it is printable and short,
/// otherwise a fresh v4 UUID.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned);

    let echoed = HeaderValue::from_str(&id).ok();
    req.extensions_mut().insert(RequestId(id));

    let mut res = next.run(req).await;
    if let Some(value) = echoed {
        res.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    res
}

pub async fn require_operator(
    State(auth): State<OperatorAuth>,
    req: Request,
    next: Next,
) -> Response {
    if auth.admits(req.headers().get(header::AUTHORIZATION)) {
        return next.run(req).await;
    }
    tracing::warn!(path = %req.uri().path(), "operator route refused: bad or missing bearer token");
    ApiError::new(
        RequestId::of(&req),
        "unauthorized",
        "missing or invalid bearer token",
    )
    .into_response()
}

pub async fn enforce_rate_limit(
    State(limiter): State<ClientLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);
    match limiter.admit(&client, Instant::now()) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!(
                class = limiter.class.as_str(),
                client = %client,
                "rate limit exceeded"
            );
            let mut res = ApiError::new(
                RequestId::of(&req),
                "rate_limited",
                format!("too many {} requests", limiter.class.as_str()),
            )
            .into_response();
            let secs = retry_after.as_secs().max(1);
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            res
        }
    }
}

// Peer IP when the server was started with connect info; tests and other
// in-process callers share one bucket.
fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "local".to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
