//! Session reset endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiQuery;
use crate::error::VoteResult;
use crate::identity::VoterIdentity;
use crate::session::{self, PurgeReport, ResetReason};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetQuery {
    pub reason: ResetReason,
}

#[derive(Debug, Serialize)]
pub struct ClearSessionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: PurgeReport,
}

/// POST /api/votes/clear-session?reason=reload|abandon|entry
///
/// Deletes every provisional vote of the caller. Idempotent. Any request
/// body is ignored, since unload beacons send whatever the browser has.
pub async fn clear_session(
    State(state): State<AppState>,
    identity: VoterIdentity,
    ApiQuery(query): ApiQuery<ResetQuery>,
) -> VoteResult<Json<ClearSessionResponse>> {
    let report = session::reset(&state.db, &state.retry, &identity.fingerprint, query.reason).await?;
    Ok(Json(ClearSessionResponse {
        success: true,
        report,
    }))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/api/votes/clear-session", post(clear_session))
}
