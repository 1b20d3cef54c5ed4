//! fba-vote library - vote session and finalization service
//!
//! Anonymous voters fill slots in six award categories. Their votes stay
//! provisional, keyed by a session fingerprint, until the voter form is
//! submitted and finalization claims them for a new voter row. A page
//! reload purges the provisional votes instead.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use fba_common::config::FinalizeConfig;
use fba_common::RetryPolicy;

pub mod api;
pub mod category;
pub mod error;
pub mod finalize;
pub mod identity;
pub mod models;
pub mod results;
pub mod roster;
pub mod session;
pub mod store;
pub mod validation;
pub mod voters;

pub use error::{VoteError, VoteResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Backoff for storage writes hitting a busy database
    pub retry: RetryPolicy,
    pub finalize: FinalizeConfig,
}

impl AppState {
    pub fn new(db: SqlitePool, retry: RetryPolicy, finalize: FinalizeConfig) -> Self {
        Self {
            db,
            retry,
            finalize,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::team_routes())
        .merge(api::session_routes())
        .merge(api::vote_routes())
        .merge(api::voter_routes())
        .merge(api::results_routes())
        .merge(api::admin_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
