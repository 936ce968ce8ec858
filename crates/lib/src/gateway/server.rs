//! Relay HTTP server: LINE webhook callback and health probe (single port).

use crate::answer::{AnswerError, AnswerRequest, Answerer, DiscoveryEngineClient, TokenSource};
use crate::channels::signature::{self, SIGNATURE_HEADER};
use crate::channels::{DeliveryError, InboundEvent, LineChannel, ReplyChannel, WebhookPayload};
use crate::config::RelayConfig;
use crate::format::format_reply;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

const SERVICE_NAME: &str = "line-relay";

/// Shared state for the relay: read-only config plus the two outbound seams.
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub answerer: Arc<dyn Answerer>,
    pub reply_channel: Arc<dyn ReplyChannel>,
}

impl RelayState {
    /// Build the production clients (Discovery Engine + LINE reply API) from config.
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let answer_settings = &config.settings.answer;
        let tokens = TokenSource::resolve(config.google_access_token.clone(), answer_settings.timeout())
            .context("building metadata token client")?;
        let answerer = DiscoveryEngineClient::new(answer_settings, tokens)
            .context("building answer client")?;
        let line = LineChannel::new(config.channel_access_token.clone(), &config.settings.line)
            .context("building LINE client")?;
        Ok(Self {
            config: Arc::new(config),
            answerer: Arc::new(answerer),
            reply_channel: Arc::new(line),
        })
    }

    fn answer_request(&self, query: &str) -> AnswerRequest {
        AnswerRequest {
            project_id: self.config.project_id.clone(),
            location: self.config.location.clone(),
            engine_id: self.config.engine_id.clone(),
            query: query.to_string(),
        }
    }
}

/// Why one event did not get its reply.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Routes: `GET /` health, `POST /callback` LINE webhook.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(callback))
        .with_state(state)
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn run_gateway(config: RelayConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.settings.gateway.bind.trim(), config.settings.gateway.port);
    log::info!(
        "relaying to project {} location {} engine {}",
        config.project_id,
        config.location,
        config.engine_id
    );
    let state = RelayState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server exited")?;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}

/// POST /callback: verify X-Line-Signature over the raw body, then answer and reply to each
/// text message event in order. Per-event failures are logged; the batch is always acknowledged
/// with 200 so LINE does not redeliver.
async fn callback(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !signature::verify(&body, provided, &state.config.channel_secret) {
        log::warn!("invalid signature; check the channel secret and access token");
        return (StatusCode::BAD_REQUEST, "invalid signature");
    }
    log::debug!("request body: {}", String::from_utf8_lossy(&body));

    let payload = match WebhookPayload::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("webhook body is not a LINE payload: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid body");
        }
    };

    let events = payload.text_events();
    log::info!(
        "webhook batch for {}: {} event(s), {} text message(s)",
        payload.destination.as_deref().unwrap_or("?"),
        payload.events.len(),
        events.len()
    );
    for event in events {
        if let Err(e) = relay_event(&state, &event).await {
            match e {
                RelayError::Answer(ref inner) if inner.is_upstream() => {
                    log::error!("answer call failed, skipping reply: {}", inner)
                }
                RelayError::Answer(ref inner) => {
                    log::error!("unusable answer, skipping reply: {}", inner)
                }
                RelayError::Delivery(ref inner) => log::warn!("reply not delivered: {}", inner),
            }
        }
    }
    (StatusCode::OK, "OK")
}

/// Answer one text message and reply with the formatted result. Never retried: the reply token is single-use.
pub async fn relay_event(state: &RelayState, event: &InboundEvent) -> Result<(), RelayError> {
    log::info!("user message: {}", event.text);
    let result = state
        .answerer
        .answer(&state.answer_request(&event.text))
        .await?;
    let text = format_reply(&result);
    state
        .reply_channel
        .reply(&event.reply_token, &text)
        .await?;
    log::debug!(
        "replied via {} with {} cited link(s)",
        state.reply_channel.id(),
        result.cited_results.len()
    );
    Ok(())
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<RelayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "service": SERVICE_NAME,
        "port": state.config.settings.gateway.port,
    }))
}
