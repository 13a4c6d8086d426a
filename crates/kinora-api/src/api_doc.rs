//! OpenAPI documentation.
//! Handler annotations use the /api/v0 placeholder; the served spec swaps in
//! `crate::constants::API_VERSION`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::constants::API_VERSION;
use crate::error;
use crate::handlers;
use kinora_core::models;

/// Placeholder version used in handler path annotations (utoipa requires compile-time literals).
const OPENAPI_PATH_PLACEHOLDER: &str = "/api/v0";

fn transform_openapi_paths(spec: &mut utoipa::openapi::OpenApi, version: &str) {
    let replacement = format!("/api/{}", version);
    if OPENAPI_PATH_PLACEHOLDER == replacement {
        return;
    }
    let path_map = std::mem::take(&mut spec.paths.paths);
    for (key, item) in path_map {
        let new_key = key.replacen(OPENAPI_PATH_PLACEHOLDER, &replacement, 1);
        spec.paths.paths.insert(new_key, item);
    }
}

/// Returns the OpenAPI spec with path placeholders replaced by the current API version.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    transform_openapi_paths(&mut spec, API_VERSION);
    spec
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_token",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kinora API",
        version = "0.1.0",
        description = "Chunked upload sessions and storage cleanup administration. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::uploads::create_session,
        handlers::uploads::upload_chunk,
        handlers::uploads::get_progress,
        handlers::uploads::cancel_session,
        handlers::uploads::complete_session,
        handlers::uploads::list_sessions,
        handlers::cleanup::get_status,
        handlers::cleanup::start_scheduler,
        handlers::cleanup::stop_scheduler,
        handlers::cleanup::run_task,
    ),
    components(
        schemas(
            models::UploadStatus,
            models::UploadSessionSnapshot,
            models::UploadProgress,
            models::CleanupTaskType,
            models::CleanupReport,
            models::SchedulerStatus,
            handlers::uploads::CreateUploadSessionRequest,
            handlers::uploads::CompleteUploadResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "uploads", description = "Chunked upload sessions"),
        (name = "admin", description = "Cleanup scheduler control and upload inspection (master key)")
    )
)]
pub struct ApiDoc;
