//! HTTP route tree.

pub mod error;
pub mod info;
pub mod speed;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub use error::ApiError;

/// Build the REST router: `/test/*` and `/info`.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/test", speed::router())
        .route("/info", get(info::server_info))
}
