use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::{
    common::errors::RelayError,
    relay::RelayedBody,
    server::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    #[serde(default)]
    pub url: Option<String>,
}

/// GET /proxy?url=... forwards a media fetch; playlists come back with
/// relative entries rewritten so the player keeps asking for absolute
/// upstream URIs.
pub async fn relay_fetch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let Some(target) = query.url.filter(|u| !u.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing url parameter");
    };

    match state.relay.fetch(&target).await {
        Ok(relayed) => {
            let status = StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::OK);
            let body = match relayed.body {
                RelayedBody::Playlist(text) => Body::from(text),
                RelayedBody::Stream(response) => Body::from_stream(response.bytes_stream()),
            };
            Response::builder()
                .status(status)
                .header(CONTENT_TYPE, relayed.content_type)
                .body(body)
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(RelayError::BadRequest) => {
            error_response(StatusCode::BAD_REQUEST, &RelayError::BadRequest.to_string())
        }
        Err(e) => {
            error!("proxy fetch failed for {}: {}", target, e);
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
