//! Finalization transaction
//!
//! Submitting the voter form creates the voter row and re-parents every
//! unclaimed vote of the fingerprint, across all six category tables, to
//! it. Everything happens in one transaction: either all rows are claimed
//! or none are.
//!
//! ```text
//! UNCLAIMED --finalize--> CLAIMED --finalize again--> CLAIMED (same voter id)
//! ```
//!
//! The "already finalized?" lookup runs twice: once up front, and again
//! inside the transaction. Two submissions racing past the first check are
//! serialized by the store's single write lock; the loser sees BUSY, retries,
//! and then finds the winner's voter in the second check.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::time::Duration;

use fba_common::config::FinalizeConfig;
use fba_common::db::begin_monitored;
use fba_common::{with_retry, Error, ErrorKind, Result, RetryPolicy, Retryable};

use crate::category::CategoryKind;
use crate::error::{VoteError, VoteResult};
use crate::identity::VoterIdentity;
use crate::models::{League, VoterFingerprint, VoterId};
use crate::roster;
use crate::store;
use crate::voters::{self, NewVoter};

/// Voter details as submitted by the form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FinalizeRequest {
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    #[serde(alias = "teamId", alias = "team")]
    pub team_id: Option<String>,
    pub league: Option<League>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub voter_id: VoterId,
    pub already_finalized: bool,
    /// Rows re-parented by this call, per category
    pub claimed: BTreeMap<CategoryKind, u64>,
}

impl FinalizeOutcome {
    fn existing(voter_id: VoterId) -> Self {
        Self {
            voter_id,
            already_finalized: true,
            claimed: CategoryKind::ALL.into_iter().map(|k| (k, 0)).collect(),
        }
    }

    pub fn total_claimed(&self) -> u64 {
        self.claimed.values().sum()
    }
}

/// Trimmed, validated voter details
#[derive(Debug, Clone, PartialEq)]
struct VoterDetails {
    first_name: String,
    last_name: String,
    team_id: Option<String>,
    league: Option<League>,
}

impl VoterDetails {
    fn from_request(request: FinalizeRequest) -> VoteResult<Self> {
        let first_name = required(&request.first_name, "first name")?;
        let last_name = required(&request.last_name, "last name")?;
        let team_id = request
            .team_id
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            first_name,
            last_name,
            team_id,
            league: request.league,
        })
    }
}

fn required(value: &str, field: &str) -> VoteResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(VoteError::InvalidInput(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Voter already created for this fingerprint, if any.
///
/// Claimed rows are checked first; the voter table catches a voter that
/// finalized without casting any vote.
pub async fn find_finalized(
    conn: &mut SqliteConnection,
    fingerprint: &VoterFingerprint,
) -> Result<Option<VoterId>> {
    for kind in CategoryKind::ALL {
        if let Some(voter_id) = store::find_claiming_voter(conn, kind, fingerprint).await? {
            return Ok(Some(voter_id));
        }
    }
    voters::find_by_fingerprint(conn, fingerprint).await
}

/// Claim every provisional vote of `identity` under a voter built from
/// `request`. Returns the existing voter when the fingerprint was already
/// finalized.
pub async fn finalize(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    config: &FinalizeConfig,
    identity: &VoterIdentity,
    request: FinalizeRequest,
) -> VoteResult<FinalizeOutcome> {
    let details = VoterDetails::from_request(request)?;
    let fingerprint = &identity.fingerprint;

    {
        let mut conn = pool.acquire().await?;

        if let Some(team_id) = details.team_id.as_deref() {
            if !roster::team_exists(&mut conn, team_id).await? {
                return Err(VoteError::NotFound(format!("team {}", team_id)));
            }
        }

        if let Some(voter_id) = find_finalized(&mut conn, fingerprint).await? {
            tracing::info!(voter = %fingerprint, voter_id = %voter_id, "Already finalized");
            return Ok(FinalizeOutcome::existing(voter_id));
        }
    }

    let result = with_retry("finalize", retry, || {
        finalize_attempt(pool, config, identity, &details)
    })
    .await;

    match &result {
        Ok(outcome) if outcome.already_finalized => {
            tracing::info!(
                voter = %fingerprint,
                voter_id = %outcome.voter_id,
                "Concurrent finalize already claimed this session"
            );
        }
        Ok(outcome) => {
            tracing::info!(
                voter = %fingerprint,
                voter_id = %outcome.voter_id,
                claimed = outcome.total_claimed(),
                "Voter finalized"
            );
        }
        Err(err) if Retryable::kind(err) == ErrorKind::Fatal => {
            tracing::error!(voter = %fingerprint, error = %err, "Finalize failed");
        }
        Err(err) => {
            tracing::warn!(voter = %fingerprint, error = %err, "Finalize gave up");
        }
    }
    result
}

/// One attempt, bounded by the configured deadline. Expiry drops the
/// transaction, which rolls it back.
async fn finalize_attempt(
    pool: &SqlitePool,
    config: &FinalizeConfig,
    identity: &VoterIdentity,
    details: &VoterDetails,
) -> VoteResult<FinalizeOutcome> {
    let deadline = Duration::from_millis(config.timeout_ms);
    match tokio::time::timeout(deadline, finalize_once(pool, identity, details)).await {
        Ok(result) => result,
        Err(_) => Err(VoteError::Storage(Error::Timeout {
            operation: "finalize".to_string(),
            timeout_ms: config.timeout_ms,
        })),
    }
}

async fn finalize_once(
    pool: &SqlitePool,
    identity: &VoterIdentity,
    details: &VoterDetails,
) -> VoteResult<FinalizeOutcome> {
    let fingerprint = &identity.fingerprint;
    let mut tx = begin_monitored(pool, "finalize").await?;

    if let Some(voter_id) = find_finalized(tx.conn(), fingerprint).await? {
        tx.rollback().await?;
        return Ok(FinalizeOutcome::existing(voter_id));
    }

    let voter_id = VoterId::generate();
    voters::insert_voter(
        tx.conn(),
        NewVoter {
            id: &voter_id,
            first_name: &details.first_name,
            last_name: &details.last_name,
            team_id: details.team_id.as_deref(),
            league: details.league,
            fingerprint,
            voter_addr: &identity.addr,
        },
    )
    .await?;

    let mut claimed = BTreeMap::new();
    for kind in CategoryKind::ALL {
        let rows = store::claim_all(tx.conn(), kind, fingerprint, &voter_id).await?;
        claimed.insert(kind, rows);
    }

    tx.commit().await?;

    Ok(FinalizeOutcome {
        voter_id,
        already_finalized: false,
        claimed,
    })
}
