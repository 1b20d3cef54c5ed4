//! Category vote storage
//!
//! [`CategoryVoteRepository`] is the typed per-category view used by the
//! validation engine and the results aggregator. The free functions below
//! operate on one table by [`CategoryKind`] and serve the operations that
//! sweep all six tables (session reset, finalization, admin).
//!
//! Every function takes a `&mut SqliteConnection` so callers decide whether
//! it runs inside a transaction.

use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;
use std::marker::PhantomData;

use fba_common::{time, Error, Result};

use crate::category::{Category, CategoryKind, Slot};
use crate::models::{
    CategoryVote, Claim, League, ProvisionalVote, VoteId, VoterFingerprint, VoterId,
};

const VOTE_COLUMNS: &str = "id, candidate_ref, voter_fingerprint, voter_addr, league, scope, \
                            slot_key, points, claimed_by, created_at, updated_at";

/// One row of any category vote table
#[derive(Debug, Clone, FromRow)]
pub struct VoteRow {
    pub id: String,
    pub candidate_ref: String,
    pub voter_fingerprint: String,
    pub voter_addr: String,
    pub league: Option<String>,
    pub scope: String,
    pub slot_key: String,
    pub points: i64,
    pub claimed_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl VoteRow {
    pub fn league(&self) -> Result<Option<League>> {
        self.league
            .as_deref()
            .map(|l| l.parse::<League>().map_err(Error::Internal))
            .transpose()
    }

    pub fn into_vote<S: Slot>(self, kind: CategoryKind) -> Result<CategoryVote<S>> {
        let league = self.league()?;
        let slot = S::parse_key(&self.slot_key).ok_or_else(|| {
            Error::Internal(format!(
                "{} row {} has invalid slot key '{}'",
                kind, self.id, self.slot_key
            ))
        })?;
        let claim = match self.claimed_by {
            Some(voter_id) => Claim::Claimed {
                voter_id: VoterId::from_db(voter_id),
            },
            None => Claim::Provisional {
                fingerprint: VoterFingerprint::new(self.voter_fingerprint),
            },
        };

        Ok(CategoryVote {
            id: VoteId::from_db(self.id),
            category: kind,
            league,
            slot,
            candidate: self.candidate_ref,
            points: self.points,
            claim,
            voter_addr: self.voter_addr,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Data for a fresh provisional row
pub struct NewVote<'a, S> {
    pub fingerprint: &'a VoterFingerprint,
    pub voter_addr: &'a str,
    pub league: Option<League>,
    pub scope: &'a str,
    pub slot: &'a S,
    pub candidate: &'a str,
}

/// Typed access to one category table
pub struct CategoryVoteRepository<C> {
    _category: PhantomData<fn() -> C>,
}

impl<C: Category> Default for CategoryVoteRepository<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Category> CategoryVoteRepository<C> {
    pub fn new() -> Self {
        Self {
            _category: PhantomData,
        }
    }

    fn table(&self) -> &'static str {
        C::KIND.table()
    }

    fn provisional(&self, row: VoteRow) -> Result<ProvisionalVote<C::Slot>> {
        let id = row.id.clone();
        ProvisionalVote::try_new(row.into_vote(C::KIND)?)
            .ok_or_else(|| Error::Internal(format!("{} row {} is already claimed", C::KIND, id)))
    }

    /// Unclaimed rows of one voter in one scope, in insertion order
    pub async fn get_provisional(
        &self,
        conn: &mut SqliteConnection,
        fingerprint: &VoterFingerprint,
        scope: &str,
    ) -> Result<Vec<ProvisionalVote<C::Slot>>> {
        let sql = format!(
            "SELECT {VOTE_COLUMNS} FROM {} \
             WHERE voter_fingerprint = ? AND scope = ? AND claimed_by IS NULL ORDER BY rowid",
            self.table()
        );
        let rows: Vec<VoteRow> = sqlx::query_as(&sql)
            .bind(fingerprint.as_str())
            .bind(scope)
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(|row| self.provisional(row)).collect()
    }

    /// The unclaimed row occupying `slot`, if any
    pub async fn find_by_slot(
        &self,
        conn: &mut SqliteConnection,
        fingerprint: &VoterFingerprint,
        scope: &str,
        slot: &C::Slot,
    ) -> Result<Option<ProvisionalVote<C::Slot>>> {
        let sql = format!(
            "SELECT {VOTE_COLUMNS} FROM {} \
             WHERE voter_fingerprint = ? AND scope = ? AND slot_key = ? AND claimed_by IS NULL",
            self.table()
        );
        let row: Option<VoteRow> = sqlx::query_as(&sql)
            .bind(fingerprint.as_str())
            .bind(scope)
            .bind(slot.key())
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|row| self.provisional(row)).transpose()
    }

    /// The unclaimed row already holding `candidate`, if any
    pub async fn find_by_candidate(
        &self,
        conn: &mut SqliteConnection,
        fingerprint: &VoterFingerprint,
        scope: &str,
        candidate: &str,
    ) -> Result<Option<ProvisionalVote<C::Slot>>> {
        let sql = format!(
            "SELECT {VOTE_COLUMNS} FROM {} \
             WHERE voter_fingerprint = ? AND scope = ? AND candidate_ref = ? AND claimed_by IS NULL \
             ORDER BY rowid LIMIT 1",
            self.table()
        );
        let row: Option<VoteRow> = sqlx::query_as(&sql)
            .bind(fingerprint.as_str())
            .bind(scope)
            .bind(candidate)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|row| self.provisional(row)).transpose()
    }

    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        new: NewVote<'_, C::Slot>,
    ) -> Result<ProvisionalVote<C::Slot>> {
        let id = VoteId::generate();
        let now = time::now_rfc3339();
        let sql = format!("INSERT INTO {} ({VOTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)", self.table());

        sqlx::query(&sql)
            .bind(id.as_str())
            .bind(new.candidate)
            .bind(new.fingerprint.as_str())
            .bind(new.voter_addr)
            .bind(new.league.map(|l| l.as_str()))
            .bind(new.scope)
            .bind(new.slot.key())
            .bind(new.slot.points())
            .bind(&now)
            .bind(&now)
            .execute(&mut *conn)
            .await?;

        Ok(ProvisionalVote::from_parts(CategoryVote {
            id,
            category: C::KIND,
            league: new.league,
            slot: new.slot.clone(),
            candidate: new.candidate.to_string(),
            points: new.slot.points(),
            claim: Claim::Provisional {
                fingerprint: new.fingerprint.clone(),
            },
            voter_addr: new.voter_addr.to_string(),
            created_at: now.clone(),
            updated_at: now,
        }))
    }

    /// Point an existing provisional row at another candidate
    pub async fn reassign(
        &self,
        conn: &mut SqliteConnection,
        vote: ProvisionalVote<C::Slot>,
        candidate: &str,
        league: Option<League>,
    ) -> Result<ProvisionalVote<C::Slot>> {
        let now = time::now_rfc3339();
        let points = vote.slot.points();
        let sql = format!(
            "UPDATE {} SET candidate_ref = ?, league = ?, points = ?, updated_at = ? \
             WHERE id = ? AND claimed_by IS NULL",
            self.table()
        );

        let result = sqlx::query(&sql)
            .bind(candidate)
            .bind(league.map(|l| l.as_str()))
            .bind(points)
            .bind(&now)
            .bind(vote.id.as_str())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "{} vote {} is no longer provisional",
                C::KIND,
                vote.id.as_str()
            )));
        }

        let mut updated = vote.into_inner();
        updated.candidate = candidate.to_string();
        updated.league = league;
        updated.points = points;
        updated.updated_at = now;
        Ok(ProvisionalVote::from_parts(updated))
    }

    pub async fn remove(
        &self,
        conn: &mut SqliteConnection,
        vote: ProvisionalVote<C::Slot>,
    ) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE id = ? AND claimed_by IS NULL",
            self.table()
        );
        sqlx::query(&sql)
            .bind(vote.id.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Claimed rows, optionally limited to one league, in insertion order
    pub async fn list_finalized(
        &self,
        conn: &mut SqliteConnection,
        league: Option<League>,
    ) -> Result<Vec<CategoryVote<C::Slot>>> {
        let rows: Vec<VoteRow> = match league {
            Some(league) => {
                let sql = format!(
                    "SELECT {VOTE_COLUMNS} FROM {} \
                     WHERE claimed_by IS NOT NULL AND league = ? ORDER BY rowid",
                    self.table()
                );
                sqlx::query_as(&sql)
                    .bind(league.as_str())
                    .fetch_all(&mut *conn)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {VOTE_COLUMNS} FROM {} WHERE claimed_by IS NOT NULL ORDER BY rowid",
                    self.table()
                );
                sqlx::query_as(&sql).fetch_all(&mut *conn).await?
            }
        };

        rows.into_iter().map(|row| row.into_vote(C::KIND)).collect()
    }
}

/// Delete every unclaimed row of a voter from one table
pub async fn purge_provisional(
    conn: &mut SqliteConnection,
    kind: CategoryKind,
    fingerprint: &VoterFingerprint,
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE voter_fingerprint = ? AND claimed_by IS NULL",
        kind.table()
    );
    let result = sqlx::query(&sql)
        .bind(fingerprint.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Re-parent every unclaimed row of a voter in one table
pub async fn claim_all(
    conn: &mut SqliteConnection,
    kind: CategoryKind,
    fingerprint: &VoterFingerprint,
    voter_id: &VoterId,
) -> Result<u64> {
    let sql = format!(
        "UPDATE {} SET claimed_by = ?, updated_at = ? \
         WHERE voter_fingerprint = ? AND claimed_by IS NULL",
        kind.table()
    );
    let result = sqlx::query(&sql)
        .bind(voter_id.as_str())
        .bind(time::now_rfc3339())
        .bind(fingerprint.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Voter that already claimed rows of this fingerprint in one table
pub async fn find_claiming_voter(
    conn: &mut SqliteConnection,
    kind: CategoryKind,
    fingerprint: &VoterFingerprint,
) -> Result<Option<VoterId>> {
    let sql = format!(
        "SELECT claimed_by FROM {} \
         WHERE voter_fingerprint = ? AND claimed_by IS NOT NULL ORDER BY rowid LIMIT 1",
        kind.table()
    );
    let voter: Option<String> = sqlx::query_scalar(&sql)
        .bind(fingerprint.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(voter.map(VoterId::from_db))
}

pub async fn list_claimed_by(
    conn: &mut SqliteConnection,
    kind: CategoryKind,
    voter_id: &VoterId,
) -> Result<Vec<VoteRow>> {
    let sql = format!(
        "SELECT {VOTE_COLUMNS} FROM {} WHERE claimed_by = ? ORDER BY rowid",
        kind.table()
    );
    let rows = sqlx::query_as(&sql)
        .bind(voter_id.as_str())
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Claimed row count per voter id in one table
pub async fn claimed_counts(
    conn: &mut SqliteConnection,
    kind: CategoryKind,
) -> Result<HashMap<String, i64>> {
    let sql = format!(
        "SELECT claimed_by, COUNT(*) FROM {} WHERE claimed_by IS NOT NULL GROUP BY claimed_by",
        kind.table()
    );
    let rows: Vec<(String, i64)> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().collect())
}

pub async fn delete_claimed_by(
    conn: &mut SqliteConnection,
    kind: CategoryKind,
    voter_id: &VoterId,
) -> Result<u64> {
    let sql = format!("DELETE FROM {} WHERE claimed_by = ?", kind.table());
    let result = sqlx::query(&sql)
        .bind(voter_id.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Delete one row by id, claimed or not. Returns whether it existed.
pub async fn delete_by_id(
    conn: &mut SqliteConnection,
    kind: CategoryKind,
    id: &str,
) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}
