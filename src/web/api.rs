//! Defines the Axum router and the login verification handler.

use crate::web::auth::decide;
use authd_shared::{CredentialSource, PluginRequest, PluginResponse};
use axum::{
    Json, Router,
    body::to_bytes,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Helper to create a JSON error response with a message and status code
fn json_error(message: &str, status: StatusCode) -> Response {
    (status, Json(serde_json::json!({ "msg": message }))).into_response()
}

pub struct AppStateInner {
    pub credentials: Arc<dyn CredentialSource>,
    pub max_body_bytes: usize,
}
pub type AppState = Arc<AppStateInner>;

/// Creates the router. Every path and method reaches the login handler.
pub fn create_router(credentials: Arc<dyn CredentialSource>, max_body_bytes: usize) -> Router {
    create_router_with_state(Arc::new(AppStateInner {
        credentials,
        max_body_bytes,
    }))
}

pub fn create_router_with_state(state: AppState) -> Router {
    Router::new().fallback(verify_login).with_state(state)
}

/// Handler for one login verification request from the tunnel host.
async fn verify_login(State(state): State<AppState>, request: Request) -> Response {
    let body = match to_bytes(request.into_body(), state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("failed to read request body: {}", e);
            return json_error(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let plugin_request: PluginRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("rejecting malformed plugin request: {}", e);
            return json_error(&e.to_string(), StatusCode::BAD_REQUEST);
        }
    };

    let login = plugin_request.login();
    let decision = decide(&login, state.credentials.as_ref());
    tracing::debug!(user = %login.user, allowed = decision.is_allowed(), "login checked");

    match serde_json::to_vec(&PluginResponse::from(decision)) {
        Ok(bytes) => {
            let headers = [(header::CONTENT_TYPE, "application/json")];
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => json_error(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}
