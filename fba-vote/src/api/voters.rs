//! Voter finalization endpoint

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use super::ApiJson;
use crate::error::VoteResult;
use crate::finalize::{self, FinalizeOutcome, FinalizeRequest};
use crate::identity::VoterIdentity;
use crate::AppState;

/// POST /api/voters/finalize
///
/// **Request:** `{"first_name": "...", "last_name": "...", "team_id": "...", "league": "herren"}`
/// (camelCase keys are accepted too)
///
/// **Response:** 201 with the new voter, or 200 with the existing one when
/// this session was already finalized.
pub async fn finalize_voter(
    State(state): State<AppState>,
    identity: VoterIdentity,
    ApiJson(request): ApiJson<FinalizeRequest>,
) -> VoteResult<(StatusCode, Json<FinalizeOutcome>)> {
    let outcome = finalize::finalize(
        &state.db,
        &state.retry,
        &state.finalize,
        &identity,
        request,
    )
    .await?;

    let status = if outcome.already_finalized {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

pub fn voter_routes() -> Router<AppState> {
    Router::new().route("/api/voters/finalize", post(finalize_voter))
}
