//! Finalized voters: storage and admin operations
//!
//! Voters are only ever created by finalization. Admins can list and
//! inspect them, delete a voter together with every vote it claimed, or
//! delete single vote rows.

use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, HashMap};

use fba_common::db::begin_monitored;
use fba_common::{time, with_retry, Error, Result, RetryPolicy};

use crate::category::{slot_json, CategoryKind};
use crate::error::{VoteError, VoteResult};
use crate::models::{League, Voter, VoterFingerprint, VoterId};
use crate::roster::{self, CandidateInfo};
use crate::store;

const VOTER_SELECT: &str = "SELECT v.id, v.first_name, v.last_name, v.team_id, \
                            t.name AS team_name, v.league, v.voter_addr, v.created_at \
                            FROM voters v LEFT JOIN teams t ON t.id = v.team_id";

#[derive(Debug, FromRow)]
struct VoterRow {
    id: String,
    first_name: String,
    last_name: String,
    team_id: Option<String>,
    team_name: Option<String>,
    league: Option<String>,
    voter_addr: String,
    created_at: String,
}

impl VoterRow {
    fn into_voter(self) -> Result<Voter> {
        let league = self
            .league
            .as_deref()
            .map(|l| l.parse::<League>().map_err(Error::Internal))
            .transpose()?;
        Ok(Voter {
            id: VoterId::from_db(self.id),
            first_name: self.first_name,
            last_name: self.last_name,
            team_id: self.team_id,
            team_name: self.team_name,
            league,
            voter_addr: self.voter_addr,
            created_at: self.created_at,
        })
    }
}

/// Data for the voter row written at finalization
pub struct NewVoter<'a> {
    pub id: &'a VoterId,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub team_id: Option<&'a str>,
    pub league: Option<League>,
    pub fingerprint: &'a VoterFingerprint,
    pub voter_addr: &'a str,
}

pub async fn insert_voter(conn: &mut SqliteConnection, voter: NewVoter<'_>) -> Result<()> {
    sqlx::query(
        "INSERT INTO voters \
         (id, first_name, last_name, team_id, league, voter_fingerprint, voter_addr, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(voter.id.as_str())
    .bind(voter.first_name)
    .bind(voter.last_name)
    .bind(voter.team_id)
    .bind(voter.league.map(|l| l.as_str()))
    .bind(voter.fingerprint.as_str())
    .bind(voter.voter_addr)
    .bind(time::now_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Most recent voter finalized from this fingerprint
pub async fn find_by_fingerprint(
    conn: &mut SqliteConnection,
    fingerprint: &VoterFingerprint,
) -> Result<Option<VoterId>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM voters WHERE voter_fingerprint = ? \
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
    )
    .bind(fingerprint.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id.map(VoterId::from_db))
}

pub async fn find_voter(conn: &mut SqliteConnection, id: &VoterId) -> Result<Option<Voter>> {
    let sql = format!("{VOTER_SELECT} WHERE v.id = ?");
    let row: Option<VoterRow> = sqlx::query_as(&sql)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(VoterRow::into_voter).transpose()
}

/// Admin list entry
#[derive(Debug, Serialize)]
pub struct VoterSummary {
    #[serde(flatten)]
    pub voter: Voter,
    pub votes: BTreeMap<CategoryKind, i64>,
}

/// One claimed vote as shown in voter detail
#[derive(Debug, Serialize)]
pub struct ClaimedVote {
    pub id: String,
    pub category: CategoryKind,
    pub league: Option<League>,
    pub slot: serde_json::Value,
    pub candidate: CandidateInfo,
    pub points: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct VoterDetail {
    #[serde(flatten)]
    pub voter: Voter,
    pub votes: Vec<ClaimedVote>,
}

#[derive(Debug, Serialize)]
pub struct DeletedVoter {
    pub id: VoterId,
    pub votes_deleted: u64,
}

/// All voters, newest first, with claimed vote counts per category
pub async fn list_voters(pool: &SqlitePool) -> VoteResult<Vec<VoterSummary>> {
    let mut conn = pool.acquire().await?;

    let sql = format!("{VOTER_SELECT} ORDER BY v.created_at DESC, v.rowid DESC");
    let rows: Vec<VoterRow> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;

    let mut counts: HashMap<CategoryKind, HashMap<String, i64>> = HashMap::new();
    for kind in CategoryKind::ALL {
        counts.insert(kind, store::claimed_counts(&mut conn, kind).await?);
    }

    let mut voters = Vec::with_capacity(rows.len());
    for row in rows {
        let voter = row.into_voter()?;
        let votes = CategoryKind::ALL
            .into_iter()
            .map(|kind| {
                let n = counts
                    .get(&kind)
                    .and_then(|c| c.get(voter.id.as_str()))
                    .copied()
                    .unwrap_or(0);
                (kind, n)
            })
            .collect();
        voters.push(VoterSummary { voter, votes });
    }
    Ok(voters)
}

/// One voter with every vote it claimed
pub async fn voter_detail(pool: &SqlitePool, id: &VoterId) -> VoteResult<VoterDetail> {
    let mut conn = pool.acquire().await?;

    let voter = find_voter(&mut conn, id)
        .await?
        .ok_or_else(|| VoteError::NotFound(format!("voter {}", id)))?;

    let mut votes = Vec::new();
    for kind in CategoryKind::ALL {
        let rows = store::list_claimed_by(&mut conn, kind, id).await?;
        if rows.is_empty() {
            continue;
        }
        let directory = roster::candidate_directory(&mut conn, kind.candidates()).await?;
        for row in rows {
            let league = row.league()?;
            votes.push(ClaimedVote {
                slot: slot_json(kind, &row.slot_key).unwrap_or(serde_json::Value::Null),
                candidate: roster::describe(&directory, &row.candidate_ref),
                id: row.id,
                category: kind,
                league,
                points: row.points,
                created_at: row.created_at,
            });
        }
    }

    Ok(VoterDetail { voter, votes })
}

/// Delete a voter and every row it claimed, atomically
pub async fn delete_voter(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    id: &VoterId,
) -> VoteResult<DeletedVoter> {
    let deleted = with_retry("voter_delete", retry, || delete_voter_once(pool, id)).await?;
    tracing::info!(voter_id = %id, votes_deleted = deleted.votes_deleted, "Voter deleted");
    Ok(deleted)
}

async fn delete_voter_once(pool: &SqlitePool, id: &VoterId) -> VoteResult<DeletedVoter> {
    let mut tx = begin_monitored(pool, "voters::delete").await?;

    let mut votes_deleted = 0;
    for kind in CategoryKind::ALL {
        votes_deleted += store::delete_claimed_by(tx.conn(), kind, id).await?;
    }

    let result = sqlx::query("DELETE FROM voters WHERE id = ?")
        .bind(id.as_str())
        .execute(tx.conn())
        .await?;
    if result.rows_affected() == 0 {
        // Dropping the transaction rolls back the vote deletes.
        return Err(VoteError::NotFound(format!("voter {}", id)));
    }

    tx.commit().await?;
    Ok(DeletedVoter {
        id: id.clone(),
        votes_deleted,
    })
}

/// Delete a single vote row, claimed or not
pub async fn delete_vote(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    kind: CategoryKind,
    id: &str,
) -> VoteResult<()> {
    let existed = with_retry("vote_delete", retry, move || async move {
        let mut conn = pool.acquire().await?;
        let existed = store::delete_by_id(&mut conn, kind, id).await?;
        Ok::<_, VoteError>(existed)
    })
    .await?;

    if !existed {
        return Err(VoteError::NotFound(format!("{} vote {}", kind, id)));
    }
    tracing::info!(category = %kind, vote_id = id, "Vote deleted by admin");
    Ok(())
}
