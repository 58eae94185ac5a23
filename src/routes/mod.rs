use axum::{routing::get, Router};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

mod health;
mod home;

pub use health::health;
pub use home::{display, home};

use crate::state::AppState;

pub fn routes(assets_dir: impl AsRef<Path>) -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/api/display", get(display))
        .nest_service("/assets", ServeDir::new(assets_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
}
