use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub source_id: Option<String>,
}

/// POST / with an action-discriminated JSON body.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActionRequest>,
) -> Response {
    match request.action.as_str() {
        "watch" => {
            let Some(source_id) = request.source_id.filter(|id| !id.is_empty()) else {
                return error_response(StatusCode::BAD_REQUEST, "sourceId required");
            };
            match state.megacloud.resolve(&source_id).await {
                Ok(manifest) => Json(manifest).into_response(),
                Err(e) => {
                    error!("watch resolution failed for {}: {}", source_id, e);
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
                }
            }
        }
        _ => error_response(StatusCode::BAD_REQUEST, "Invalid action"),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
