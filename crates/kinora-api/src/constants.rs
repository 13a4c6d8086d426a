//! API constants
//!
//! Routes and the served OpenAPI document both derive from [`API_VERSION`].

/// Current API version segment
pub const API_VERSION: &str = "v0";

/// Versioned prefix every API route is mounted under
pub const API_PREFIX: &str = "/api/v0";

/// Where the OpenAPI document is served
pub const OPENAPI_JSON_PATH: &str = "/api/openapi.json";
