//! Route configuration and setup.
//!
//! Upload routes are public; admin routes sit behind the master key.
//! Health checks live in [health](health).

mod health;

use crate::auth::middleware::{auth_middleware, AuthState};
use crate::constants::{API_PREFIX, OPENAPI_JSON_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Json, Router,
};
use kinora_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Server-level cap on in-flight requests
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Setup all application routes
pub async fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config);
    let auth_state = Arc::new(AuthState {
        master_api_key: config.master_api_key().to_string(),
    });

    let protected_routes = admin_routes().layer(axum::middleware::from_fn_with_state(
        auth_state,
        auth_middleware,
    ));

    let body_limit = usize::try_from(config.max_upload_size_bytes()).unwrap_or(usize::MAX);

    let app = public_routes()
        .merge(upload_routes())
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_JSON_PATH).path("/docs"))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    if config.cors_origins().iter().any(|origin| origin == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        .route(
            OPENAPI_JSON_PATH,
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}

fn upload_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/uploads/sessions", API_PREFIX),
            post(handlers::uploads::create_session),
        )
        .route(
            &format!("{}/uploads/sessions/{{session_id}}", API_PREFIX),
            get(handlers::uploads::get_progress),
        )
        .route(
            &format!("{}/uploads/sessions/{{session_id}}/chunks", API_PREFIX),
            put(handlers::uploads::upload_chunk),
        )
        .route(
            &format!("{}/uploads/sessions/{{session_id}}/cancel", API_PREFIX),
            post(handlers::uploads::cancel_session),
        )
        .route(
            &format!("{}/uploads/sessions/{{session_id}}/complete", API_PREFIX),
            post(handlers::uploads::complete_session),
        )
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/admin/cleanup/status", API_PREFIX),
            get(handlers::cleanup::get_status),
        )
        .route(
            &format!("{}/admin/cleanup/start", API_PREFIX),
            post(handlers::cleanup::start_scheduler),
        )
        .route(
            &format!("{}/admin/cleanup/stop", API_PREFIX),
            post(handlers::cleanup::stop_scheduler),
        )
        .route(
            &format!("{}/admin/cleanup/tasks/{{task_type}}/run", API_PREFIX),
            post(handlers::cleanup::run_task),
        )
        .route(
            &format!("{}/admin/uploads", API_PREFIX),
            get(handlers::uploads::list_sessions),
        )
}
