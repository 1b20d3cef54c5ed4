//! Results endpoint

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiQuery;
use crate::category::CategoryKind;
use crate::error::VoteResult;
use crate::models::League;
use crate::results::{self, RankedResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResultsQuery {
    /// Absent means both leagues
    pub league: Option<League>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub category: CategoryKind,
    pub league: Option<League>,
    pub results: Vec<RankedResult>,
}

/// GET /api/results/:category?league=
pub async fn get_results(
    State(state): State<AppState>,
    Path(category): Path<String>,
    ApiQuery(query): ApiQuery<ResultsQuery>,
) -> VoteResult<Json<ResultsResponse>> {
    let kind: CategoryKind = category.parse()?;
    let league = kind.recorded_league(query.league);

    let results = results::aggregate(&state.db, kind, league).await?;
    Ok(Json(ResultsResponse {
        category: kind,
        league,
        results,
    }))
}

pub fn results_routes() -> Router<AppState> {
    Router::new().route("/api/results/:category", get(get_results))
}
