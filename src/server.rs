//! Pub/Sub push endpoint
//!
//! A push subscription POSTs `{"message": {...}, "subscription": "..."}`
//! for every published message. Any 2xx acks the message; anything else
//! makes Pub/Sub redeliver it.

use crate::dispatch::{Dispatcher, Outcome};
use crate::types::{InvocationContext, NotificationEvent};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

/// Body of a push delivery
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: NotificationEvent,

    #[serde(default)]
    pub subscription: Option<String>,
}

/// Build the HTTP routes
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", post(push))
        .route("/healthz", get(health))
        .with_state(dispatcher)
}

/// Bind `addr` and serve until Ctrl-C / SIGTERM
pub async fn serve(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Push endpoint listening");

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn push(State(dispatcher): State<Arc<Dispatcher>>, body: Bytes) -> StatusCode {
    let envelope: PushEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = %e, "Rejected push request with invalid envelope");
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::debug!(subscription = ?envelope.subscription, "Push delivery received");

    let ctx = InvocationContext::from_event(&envelope.message);
    let outcome = dispatcher.handle(&envelope.message, &ctx).await;
    status_for(&outcome, dispatcher.config().redeliver_on_failure)
}

/// Map an outcome to the status returned to Pub/Sub
pub fn status_for(outcome: &Outcome, redeliver_on_failure: bool) -> StatusCode {
    match outcome {
        Outcome::Failed { .. } if redeliver_on_failure => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::NO_CONTENT,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down push endpoint");
}
