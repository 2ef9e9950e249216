use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    server::AppState,
    transport::routes::{proxy, watch},
};

pub fn router(state: Arc<AppState>) -> Router {
    // Players live on other origins; every response is wide open and the
    // CORS layer answers OPTIONS pre-flight by itself.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(watch::dispatch))
        .route("/proxy", get(proxy::relay_fetch))
        .route("/version", get(version))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
