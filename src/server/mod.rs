//! HTTP API server
//!
//! # Endpoints
//!
//! - `GET  /health` - Health check
//! - `POST /auth/signup` - Create an account
//! - `POST /auth/login` - Log in, returns a bearer token
//! - `POST /auth/logout` - Log out, invalidating the token
//! - `POST /summarize` - Upload a document and get a summary (authenticated)
//!
//! # Example
//!
//! ```no_run
//! use lexsum::server::Server;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new(8790);
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::timeout::TimeoutLayer;

use crate::auth::{AuthService, Session, SessionManager};
use crate::error::Error;
use crate::extract::DocumentLoader;
use crate::store::CredentialStore;
use crate::summarize::{summarize_document, SummaryClient};

// Maximum upload size (25MB). Documents, not datasets.
const MAX_BODY_SIZE: usize = 25 * 1024 * 1024;
// Whole-request timeout, generous enough for one slow model call.
const REQUEST_TIMEOUT_SECS: u64 = 180;

/// Server state shared across handlers.
pub struct AppState {
    /// Signup/login over the credential store.
    pub auth: AuthService,
    /// Token-to-session map for the HTTP surface.
    pub sessions: SessionManager,
    /// Document text extraction.
    pub loader: DocumentLoader,
    /// Client for the hosted model.
    pub summarizer: SummaryClient,
}

/// API server configuration.
#[derive(Debug)]
pub struct Server {
    /// Port to listen on.
    port: u16,
    /// Address to bind to (defaults to 127.0.0.1 for security).
    bind_address: String,
    /// Path to the credential database.
    db_path: PathBuf,
    /// Model identifier override.
    model: Option<String>,
    /// Endpoint base URL override.
    base_url: Option<String>,
}

impl Server {
    /// Create a new server with the specified port.
    /// By default, binds to 127.0.0.1 (localhost only) for security.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            bind_address: "127.0.0.1".to_string(),
            db_path: PathBuf::from("users.db"),
            model: None,
            base_url: None,
        }
    }

    /// Set the bind address.
    /// Use "0.0.0.0" to allow network access, "127.0.0.1" (default) for localhost only.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Set the credential database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the hosted model endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Build the router with all routes.
    ///
    /// Opens the credential store and runs the idempotent schema migration
    /// once, here, not per request.
    pub fn build_router(&self) -> Result<Router> {
        let store = CredentialStore::open(&self.db_path)?;

        let mut summarizer = SummaryClient::new();
        if let Some(ref model) = self.model {
            summarizer = summarizer.with_model(model.clone());
        }
        if let Some(ref url) = self.base_url {
            summarizer = summarizer.with_base_url(url.clone());
        }
        match summarizer.api_key_masked() {
            Some(masked) => tracing::info!("summarization credential configured ({})", masked),
            None => tracing::warn!(
                "no summarization credential configured; set {} or pass x-api-key per request",
                crate::summarize::API_KEY_ENV
            ),
        }

        let state = Arc::new(AppState {
            auth: AuthService::new(store),
            sessions: SessionManager::new(),
            loader: DocumentLoader::new(),
            summarizer,
        });

        // Rate limiting: 60 requests per minute per IP.
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(1)
                .burst_size(60)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .expect("Failed to build governor config"),
        );

        Ok(Router::new()
            .route("/health", get(health_handler))
            .route("/auth/signup", post(signup_handler))
            .route("/auth/login", post(login_handler))
            .route("/auth/logout", post(logout_handler))
            .route("/summarize", post(summarize_handler))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .layer(TimeoutLayer::new(std::time::Duration::from_secs(
                REQUEST_TIMEOUT_SECS,
            )))
            .layer(GovernorLayer {
                config: governor_conf,
            })
            .with_state(state))
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self) -> Result<()> {
        let router = self.build_router()?;
        let addr = format!("{}:{}", self.bind_address, self.port);

        tracing::info!("Starting server on {}", addr);

        if self.bind_address == "0.0.0.0" {
            tracing::warn!(
                "Server is binding to 0.0.0.0 which exposes the API to the network. \
                Use 127.0.0.1 (default) for local-only access."
            );
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Port {} is already in use. \
                    This usually means another lexsum server is running. \
                    Try stopping other instances or use a different port with --port <PORT>",
                    self.port
                )
            } else {
                anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
            }
        })?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: &'static str,
    summarizer_configured: bool,
}

/// Signup/login request body.
#[derive(Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

/// Generic success message.
#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Login success response.
#[derive(Serialize)]
struct LoginResponse {
    token: String,
    username: String,
}

/// Summarize success response.
#[derive(Serialize)]
struct SummarizeResponse {
    filename: String,
    summary: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION"),
        summarizer_configured: state.summarizer.is_configured(),
    })
}

/// Signup handler. A successful signup does not log the user in.
async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<MessageResponse>, Error> {
    state.auth.signup(&request.username, &request.password)?;
    Ok(Json(MessageResponse {
        message: "account created successfully".to_string(),
    }))
}

/// Login handler. Transitions a fresh session to authenticated and returns
/// its bearer token.
async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, Error> {
    let mut session = Session::anonymous();
    state
        .auth
        .login(&mut session, &request.username, &request.password)?;

    let username = session.username().unwrap_or(&request.username).to_string();
    let token = state.sessions.create(session);
    Ok(Json(LoginResponse { token, username }))
}

/// Logout handler. Clears the session for the presented token; a missing or
/// unknown token is a no-op, since the session is anonymous either way.
async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    if let Some(token) = bearer_token(&headers) {
        if let Some(mut session) = state.sessions.remove(token) {
            state.auth.logout(&mut session);
        }
    }
    Json(MessageResponse {
        message: "logged out".to_string(),
    })
}

/// Summarize handler: authenticate, pull the uploaded file out of the
/// multipart body, extract its text, and request one summary.
async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<SummarizeResponse>, Error> {
    let session = bearer_token(&headers)
        .and_then(|token| state.sessions.get(token))
        .filter(Session::is_authenticated)
        .ok_or(Error::SessionRequired)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Io(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::Io(format!("failed to read upload: {}", e)))?;
            upload = Some((filename, bytes.to_vec()));
        }
    }
    let (filename, bytes) = upload.ok_or(Error::MissingFile)?;

    tracing::info!(
        user = session.username().unwrap_or("<unknown>"),
        filename = %filename,
        size = bytes.len(),
        "summarize requested"
    );

    // Per-session credential: an x-api-key header overrides the server-level
    // key for this request only.
    let summary = match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        Some(key) => {
            let client = state.summarizer.clone().with_api_key(key);
            summarize_document(&state.loader, &client, &filename, &bytes).await?
        }
        None => summarize_document(&state.loader, &state.summarizer, &filename, &bytes).await?,
    };

    Ok(Json(SummarizeResponse { filename, summary }))
}

// =============================================================================
// Utilities
// =============================================================================

/// Extract the bearer token from an Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
    }

    tracing::info!("Cleanup complete, shutting down server");
}
