//! Admin voter endpoints
//!
//! Read and delete only. Voters are created by finalization, never here.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;

use crate::category::CategoryKind;
use crate::error::VoteResult;
use crate::models::VoterId;
use crate::voters::{self, DeletedVoter, VoterDetail, VoterSummary};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct VotersResponse {
    pub voters: Vec<VoterSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeleteVoterResponse {
    pub success: bool,
    #[serde(flatten)]
    pub deleted: DeletedVoter,
}

#[derive(Debug, Serialize)]
pub struct DeleteVoteResponse {
    pub success: bool,
}

/// GET /api/admin/voters
pub async fn list_voters(State(state): State<AppState>) -> VoteResult<Json<VotersResponse>> {
    let voters = voters::list_voters(&state.db).await?;
    Ok(Json(VotersResponse { voters }))
}

/// GET /api/admin/voters/:id
pub async fn get_voter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> VoteResult<Json<VoterDetail>> {
    let detail = voters::voter_detail(&state.db, &VoterId::from_db(id)).await?;
    Ok(Json(detail))
}

/// DELETE /api/admin/voters/:id
///
/// Removes the voter and every vote it claimed.
pub async fn delete_voter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> VoteResult<Json<DeleteVoterResponse>> {
    let deleted = voters::delete_voter(&state.db, &state.retry, &VoterId::from_db(id)).await?;
    Ok(Json(DeleteVoterResponse {
        success: true,
        deleted,
    }))
}

/// DELETE /api/admin/votes/:category/:id
pub async fn delete_vote(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> VoteResult<Json<DeleteVoteResponse>> {
    let kind: CategoryKind = category.parse()?;
    voters::delete_vote(&state.db, &state.retry, kind, &id).await?;
    Ok(Json(DeleteVoteResponse { success: true }))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/voters", get(list_voters))
        .route("/api/admin/voters/:id", get(get_voter).delete(delete_voter))
        .route("/api/admin/votes/:category/:id", delete(delete_vote))
}
