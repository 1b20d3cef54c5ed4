//! Category vote endpoints
//!
//! Every category gets the same triple on `/api/votes/{category}`:
//! GET lists the voter's provisional votes, POST fills a slot and DELETE
//! clears one. The handlers are generic over [`Category`] and mounted six
//! times.

use axum::{
    body::Bytes,
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{optional_json, ApiJson, ApiQuery};
use crate::category::{
    Allstar, Category, CategoryKind, CoachOfTheYear, FairPlay, Mvp, RefereePair, Slot,
    SlotFields, SpecialAward,
};
use crate::error::VoteResult;
use crate::identity::VoterIdentity;
use crate::models::{League, ProvisionalVote};
use crate::validation::{self, UpsertRequest};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeagueQuery {
    pub league: Option<League>,
}

/// Body of POST /api/votes/{category}
#[derive(Debug, Deserialize)]
pub struct UpsertBody {
    #[serde(default)]
    pub league: Option<League>,
    #[serde(flatten)]
    pub slot: SlotFields,
    #[serde(default, alias = "candidateId", alias = "candidate_id")]
    pub candidate: String,
}

/// Body of DELETE /api/votes/{category}
#[derive(Debug, Default, Deserialize)]
pub struct ClearBody {
    #[serde(default)]
    pub league: Option<League>,
    #[serde(flatten)]
    pub slot: SlotFields,
}

#[derive(Debug, Serialize)]
pub struct ProvisionalVotesResponse<S> {
    pub category: CategoryKind,
    pub league: Option<League>,
    pub votes: Vec<ProvisionalVote<S>>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    /// Whether a vote was actually removed
    pub removed: bool,
}

/// GET /api/votes/{category}?league=
///
/// League-scoped categories default to `herren` when no league is given.
pub async fn get_votes<C: Category>(
    State(state): State<AppState>,
    identity: VoterIdentity,
    ApiQuery(query): ApiQuery<LeagueQuery>,
) -> VoteResult<Json<ProvisionalVotesResponse<C::Slot>>> {
    let league = match query.league {
        Some(league) => Some(league),
        None if C::KIND.league_scoped() => Some(League::Herren),
        None => None,
    };

    let votes = validation::get_provisional::<C>(&state.db, &identity, league).await?;
    Ok(Json(ProvisionalVotesResponse {
        category: C::KIND,
        league: C::KIND.recorded_league(league),
        votes,
    }))
}

/// POST /api/votes/{category}
///
/// **Request:** `{"league": "herren", <slot fields>, "candidate": "<id or name>"}`
///
/// **Errors:**
/// - 400 `INVALID_SLOT`: slot outside the category's domain
/// - 400 `DUPLICATE_CANDIDATE`: candidate already holds another slot
/// - 404 `NOT_FOUND`: unknown candidate
pub async fn upsert_vote<C: Category>(
    State(state): State<AppState>,
    identity: VoterIdentity,
    ApiJson(body): ApiJson<UpsertBody>,
) -> VoteResult<Json<ProvisionalVote<C::Slot>>> {
    let slot = C::Slot::from_fields(&body.slot)?;
    let request = UpsertRequest {
        league: body.league,
        slot,
        candidate: body.candidate,
    };

    let vote = validation::upsert::<C>(&state.db, &state.retry, &identity, request).await?;
    Ok(Json(vote))
}

/// DELETE /api/votes/{category}
///
/// Clearing an empty slot succeeds with `removed: false`.
pub async fn clear_vote<C: Category>(
    State(state): State<AppState>,
    identity: VoterIdentity,
    body: Bytes,
) -> VoteResult<Json<ClearResponse>> {
    let body: ClearBody = optional_json(&body)?;
    let slot = C::Slot::from_fields(&body.slot)?;

    let removed = validation::clear::<C>(&state.db, &state.retry, &identity, body.league, slot).await?;
    Ok(Json(ClearResponse {
        success: true,
        removed,
    }))
}

/// Routes for one category
pub fn category_routes<C: Category>() -> Router<AppState> {
    let path = format!("/api/votes/{}", C::KIND.as_str());
    Router::new().route(
        &path,
        get(get_votes::<C>)
            .post(upsert_vote::<C>)
            .delete(clear_vote::<C>),
    )
}

pub fn vote_routes() -> Router<AppState> {
    Router::new()
        .merge(category_routes::<Allstar>())
        .merge(category_routes::<Mvp>())
        .merge(category_routes::<CoachOfTheYear>())
        .merge(category_routes::<FairPlay>())
        .merge(category_routes::<RefereePair>())
        .merge(category_routes::<SpecialAward>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_body_flattens_slot_fields() {
        let body: UpsertBody = serde_json::from_str(
            r#"{"league": "damen", "line": 2, "position": "lw", "candidate": "p7"}"#,
        )
        .unwrap();
        assert_eq!(body.league, Some(League::Damen));
        assert_eq!(body.slot.line, Some(2));
        assert_eq!(body.slot.position.as_deref(), Some("lw"));
        assert_eq!(body.candidate, "p7");
    }

    #[test]
    fn test_candidate_id_alias() {
        let body: UpsertBody =
            serde_json::from_str(r#"{"rank": 4, "candidateId": "p2"}"#).unwrap();
        assert_eq!(body.slot.rank, Some(4));
        assert_eq!(body.candidate, "p2");
        assert_eq!(body.league, None);
    }
}
