//! Results aggregation over finalized votes
//!
//! Only claimed rows count. Candidates are ranked by total points, highest
//! first; equal totals keep the order in which the candidate first received
//! a vote.

use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use fba_common::{ErrorKind, Retryable};

use crate::category::{
    Allstar, Category, CategoryKind, CoachOfTheYear, FairPlay, Mvp, RefereePair, Slot,
    SpecialAward,
};
use crate::error::{VoteError, VoteResult};
use crate::models::{CategoryVote, League};
use crate::roster::{self, CandidateInfo};
use crate::store::CategoryVoteRepository;

/// Per-candidate totals before roster lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub candidate: String,
    pub total_points: i64,
    pub vote_count: i64,
    /// Votes received on lines 1..3, for line-based slots
    pub line_counts: Option<[i64; 3]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub candidate: CandidateInfo,
    pub total_points: i64,
    pub vote_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_counts: Option<[i64; 3]>,
}

/// Fold votes into ranked tallies
pub fn fold<S: Slot>(votes: &[CategoryVote<S>]) -> Vec<Tally> {
    let mut tallies: Vec<Tally> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for vote in votes {
        let i = *index.entry(vote.candidate.as_str()).or_insert_with(|| {
            tallies.push(Tally {
                candidate: vote.candidate.clone(),
                total_points: 0,
                vote_count: 0,
                line_counts: None,
            });
            tallies.len() - 1
        });

        let tally = &mut tallies[i];
        tally.total_points += vote.points;
        tally.vote_count += 1;
        if let Some(line) = vote.slot.line() {
            let counts = tally.line_counts.get_or_insert([0; 3]);
            if let Some(slot) = counts.get_mut(usize::from(line).saturating_sub(1)) {
                *slot += 1;
            }
        }
    }

    // sort_by is stable: ties stay in first-vote order
    tallies.sort_by(|a, b| b.total_points.cmp(&a.total_points));
    tallies
}

/// Ranked results for one category.
///
/// `league` narrows league-scoped categories and special awards to one
/// league; referee votes carry no league and always cover both.
pub async fn aggregate(
    pool: &SqlitePool,
    kind: CategoryKind,
    league: Option<League>,
) -> VoteResult<Vec<RankedResult>> {
    let result = rank(pool, kind, league).await;

    if let Err(err @ VoteError::Storage(_)) = &result {
        if Retryable::kind(err) == ErrorKind::Fatal {
            tracing::error!(category = %kind, league = ?league, error = %err, "Results aggregation failed");
        } else {
            tracing::warn!(category = %kind, league = ?league, error = %err, "Results aggregation failed");
        }
    }
    result
}

async fn rank(
    pool: &SqlitePool,
    kind: CategoryKind,
    league: Option<League>,
) -> VoteResult<Vec<RankedResult>> {
    let tallies = match kind {
        CategoryKind::Allstar => tally::<Allstar>(pool, league).await?,
        CategoryKind::Mvp => tally::<Mvp>(pool, league).await?,
        CategoryKind::Coach => tally::<CoachOfTheYear>(pool, league).await?,
        CategoryKind::Fairplay => tally::<FairPlay>(pool, league).await?,
        CategoryKind::Referee => tally::<RefereePair>(pool, None).await?,
        CategoryKind::SpecialAward => tally::<SpecialAward>(pool, league).await?,
    };

    let mut conn = pool.acquire().await?;
    let directory = roster::candidate_directory(&mut conn, kind.candidates()).await?;

    tracing::debug!(category = %kind, league = ?league, candidates = tallies.len(), "Results aggregated");

    Ok(tallies
        .into_iter()
        .map(|t| RankedResult {
            candidate: roster::describe(&directory, &t.candidate),
            total_points: t.total_points,
            vote_count: t.vote_count,
            line_counts: t.line_counts,
        })
        .collect())
}

async fn tally<C: Category>(pool: &SqlitePool, league: Option<League>) -> VoteResult<Vec<Tally>> {
    let mut conn = pool.acquire().await?;
    let votes = CategoryVoteRepository::<C>::new()
        .list_finalized(&mut conn, league)
        .await?;
    Ok(fold(&votes))
}
