//! TurboSession demo service
//!
//! Four endpoints over one configured provider:
//!
//! - `POST /login` with `{"user": "..."}` starts a session and returns both tokens as headers
//! - `GET /me` resolves the session from the access token and counts visits
//! - `POST /refresh` exchanges the `X-Refresh-Token` header for a new pair
//! - `POST /logout` destroys the session
//!
//! ```text
//! cargo run -p turbosession-demo -- --secret dev-secret
//! curl -i -X POST localhost:8080/login -d '{"user":"alice"}' -H 'content-type: application/json'
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use turbosession::session::{FIELD_CREATED_AT, FIELD_USER_ID};
use turbosession::{
    RequestContext, Session, SessionConfig, SessionError, SessionProvider, build_provider,
};

/// Demo HTTP service for dual-token sessions
#[derive(Parser, Debug)]
#[command(name = "turbosession-demo", version, about)]
struct Cli {
    /// Session configuration file (TOML, YAML or JSON); environment overrides apply
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Signing secret used when no configuration file is given
    #[arg(long, env = "TURBOSESSION_DEMO_SECRET", default_value = "dev-secret")]
    secret: String,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

#[derive(Clone)]
struct AppState {
    sessions: Arc<dyn SessionProvider>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    user: String,
}

/// Session errors rendered as JSON with the status the error maps to
struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.to_http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, "Session operation failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Attach the headers the provider produced to the outgoing response
fn respond(mut ctx: RequestContext, status: StatusCode, body: Value) -> Response {
    let mut response = (status, Json(body)).into_response();
    ctx.apply_to(&mut response);
    response
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let mut ctx = RequestContext::new(headers);
    let login_ip = ctx
        .request_header("x-forwarded-for")
        .unwrap_or("unknown")
        .to_string();

    let mut data = HashMap::new();
    data.insert("login_ip".to_string(), json!(login_ip));
    data.insert("visits".to_string(), json!(0));

    let session = state
        .sessions
        .create_session(&mut ctx, &request.user, HashMap::new(), data)
        .await?;
    info!(user = %request.user, session_id = %session.id(), "User logged in");

    let body = json!({ "session_id": session.id() });
    Ok(respond(ctx, StatusCode::OK, body))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let mut ctx = RequestContext::new(headers);
    let session = state.sessions.get_session(&mut ctx).await?;

    let visits = session.get("visits").await?.as_u64().unwrap_or(0) + 1;
    session.set("visits", json!(visits)).await?;

    let body = json!({
        "user": session.get(FIELD_USER_ID).await?,
        "session_id": session.id(),
        "login_ip": session.get("login_ip").await?,
        "created_at": session.get(FIELD_CREATED_AT).await?,
        "visits": visits,
    });
    Ok(respond(ctx, StatusCode::OK, body))
}

async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let mut ctx = RequestContext::new(headers);
    state.sessions.renew_tokens(&mut ctx).await?;
    Ok(respond(ctx, StatusCode::OK, json!({ "renewed": true })))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let mut ctx = RequestContext::new(headers);
    state.sessions.destroy_session(&mut ctx).await?;
    Ok(respond(ctx, StatusCode::OK, json!({ "logged_out": true })))
}

fn load_config(cli: &Cli) -> anyhow::Result<SessionConfig> {
    match &cli.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("loading session configuration from {}", path.display())),
        None => Ok(SessionConfig::new(cli.secret.clone())),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let sessions = build_provider(&config)
        .await
        .context("building session provider")?;

    let app = Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(AppState { sessions });

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    info!(addr = %cli.bind, "Session demo listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Session demo stopped");
    Ok(())
}
