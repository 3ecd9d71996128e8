//! EPUB Chapters
//!
//! Splits EPUB books into chapters aligned with their table of contents and
//! serves the conversion over HTTP. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `epub`: archive access, container/package/navigation parsing, splitting
//! - `html`: entity normalization and chapter output converters
//! - `config`, `error`, `state`, `routes`: the HTTP service

pub mod config;
pub mod epub;
pub mod error;
pub mod html;
pub mod routes;
pub mod state;

use axum::Router;

use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.config().conversion.max_upload_bytes;

    Router::new()
        .merge(routes::health::router())
        .merge(routes::convert::router(max_upload_bytes))
        .with_state(state)
}
