//! Kinora API Library
//!
//! HTTP handlers, admin authentication and application setup for the upload
//! tracker and cleanup scheduler.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;
mod telemetry;

pub mod auth;
pub mod error;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
