//! Read-only team list for the voter form

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiQuery;
use crate::error::VoteResult;
use crate::roster::{self, Team};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TeamQuery {
    /// Only teams flagged for the voter form
    pub for_form: bool,
}

#[derive(Debug, Serialize)]
pub struct TeamsResponse {
    pub teams: Vec<Team>,
}

/// GET /api/teams?for_form=true
pub async fn list_teams(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TeamQuery>,
) -> VoteResult<Json<TeamsResponse>> {
    let mut conn = state.db.acquire().await?;
    let teams = roster::list_teams(&mut conn, query.for_form).await?;
    Ok(Json(TeamsResponse { teams }))
}

pub fn team_routes() -> Router<AppState> {
    Router::new().route("/api/teams", get(list_teams))
}
