//! Action server speaking the Rasa webhook protocol.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::actions::{ActionRegistry, Dispatcher, Domain, Event, Message, Tracker};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ActionRegistry>,
}

/// Body of a webhook call
#[derive(Debug, Deserialize)]
pub struct ActionCall {
    pub next_action: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub tracker: Tracker,
    #[serde(default)]
    pub domain: Domain,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub events: Vec<Event>,
    pub responses: Vec<Message>,
}

#[derive(Debug)]
pub enum ServerError {
    /// No action registered under that name
    UnknownAction(String),
    /// The action returned an error
    ActionFailed { action: String, message: String },
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServerError::UnknownAction(name) => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": format!("No registered action found for name '{}'.", name),
                    "action_name": name,
                }),
            ),
            ServerError::ActionFailed { action, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "action_name": action }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .route("/actions", get(list_actions))
        .with_state(state)
}

async fn webhook(
    State(state): State<AppState>,
    Json(call): Json<ActionCall>,
) -> Result<Json<ActionResponse>, ServerError> {
    let name = call.next_action;
    let sender = call
        .sender_id
        .or_else(|| call.tracker.sender_id.clone())
        .unwrap_or_default();

    let action = state
        .registry
        .get(&name)
        .ok_or_else(|| ServerError::UnknownAction(name.clone()))?;

    tracing::info!(action = %name, sender = %sender, version = ?call.version, "Running action");

    let mut dispatcher = Dispatcher::new();
    let events = action
        .run(&mut dispatcher, &call.tracker, &call.domain)
        .await
        .map_err(|e| {
            let detail = format!("{:#}", e);
            tracing::error!(action = %name, error = %detail, "Action failed");
            ServerError::ActionFailed {
                action: name.clone(),
                message: e.to_string(),
            }
        })?;

    Ok(Json(ActionResponse {
        events,
        responses: dispatcher.into_messages(),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_actions(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(
        state
            .registry
            .names()
            .into_iter()
            .map(|name| json!({ "name": name }))
            .collect(),
    )
}

/// Serve until `shutdown` resolves
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Action server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
