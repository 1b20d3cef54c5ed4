//! Vote validation and dedup engine
//!
//! Every category write goes through here. Before a slot is filled:
//! 1. the slot must be inside the category's domain (checked when the
//!    request is parsed into a typed slot),
//! 2. the candidate must exist in the roster,
//! 3. no *other* unclaimed slot of the same voter and scope may already
//!    hold the candidate,
//! 4. the slot's unclaimed row is overwritten, or created if absent.
//!
//! Steps 3 and 4 run in one transaction, so a rejected request leaves the
//! store unchanged.

use fba_common::db::begin_monitored;
use fba_common::{with_retry, ErrorKind, RetryPolicy, Retryable};
use sqlx::SqlitePool;

use crate::category::{CandidateSource, Category, CategoryKind, Slot};
use crate::error::{VoteError, VoteResult};
use crate::identity::VoterIdentity;
use crate::models::{League, ProvisionalVote};
use crate::roster;
use crate::store::{CategoryVoteRepository, NewVote};

/// Longest accepted free-text candidate name
pub const MAX_NAME_CHARS: usize = 120;

/// A request to fill one slot
#[derive(Debug, Clone)]
pub struct UpsertRequest<S> {
    pub league: Option<League>,
    pub slot: S,
    pub candidate: String,
}

/// Trim and check the candidate reference.
///
/// Roster ids must be non-blank; free-text names are trimmed and compared
/// exactly afterwards.
pub fn normalize_candidate(kind: CategoryKind, raw: &str) -> VoteResult<String> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        let what = match kind.candidates() {
            CandidateSource::Name => "name",
            _ => "candidate",
        };
        return Err(VoteError::InvalidInput(format!("{} is required", what)));
    }
    if kind.candidates() == CandidateSource::Name && candidate.chars().count() > MAX_NAME_CHARS {
        return Err(VoteError::InvalidInput(format!(
            "name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(candidate.to_string())
}

/// Reject the write if `holder` keeps the candidate in a different slot
pub fn check_duplicate<S: Slot>(
    kind: CategoryKind,
    target: &S,
    holder: Option<&ProvisionalVote<S>>,
) -> VoteResult<()> {
    match holder {
        Some(existing) if existing.slot != *target => Err(VoteError::DuplicateCandidate {
            category: kind,
            candidate: existing.candidate.clone(),
            conflicting_slot: serde_json::to_value(&existing.slot).unwrap_or_default(),
            label: existing.slot.label(),
        }),
        _ => Ok(()),
    }
}

/// Unclaimed rows of the voter for one category
pub async fn get_provisional<C: Category>(
    pool: &SqlitePool,
    identity: &VoterIdentity,
    league: Option<League>,
) -> VoteResult<Vec<ProvisionalVote<C::Slot>>> {
    let kind = C::KIND;
    let scope = kind.scope(league)?;
    let result = load_provisional::<C>(pool, identity, scope).await;

    if let Err(err @ VoteError::Storage(_)) = &result {
        if Retryable::kind(err) == ErrorKind::Fatal {
            tracing::error!(
                voter = %identity.fingerprint,
                category = %kind,
                scope,
                error = %err,
                "Loading provisional votes failed"
            );
        } else {
            tracing::warn!(
                voter = %identity.fingerprint,
                category = %kind,
                scope,
                error = %err,
                "Loading provisional votes failed"
            );
        }
    }
    result
}

async fn load_provisional<C: Category>(
    pool: &SqlitePool,
    identity: &VoterIdentity,
    scope: &str,
) -> VoteResult<Vec<ProvisionalVote<C::Slot>>> {
    let mut conn = pool.acquire().await?;
    let votes = CategoryVoteRepository::<C>::new()
        .get_provisional(&mut conn, &identity.fingerprint, scope)
        .await?;
    Ok(votes)
}

/// Fill `request.slot` with `request.candidate`
pub async fn upsert<C: Category>(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    identity: &VoterIdentity,
    request: UpsertRequest<C::Slot>,
) -> VoteResult<ProvisionalVote<C::Slot>> {
    let kind = C::KIND;
    let scope = kind.scope(request.league)?;
    let league = kind.recorded_league(request.league);
    let candidate = normalize_candidate(kind, &request.candidate)?;

    {
        let mut conn = pool.acquire().await?;
        if !roster::candidate_exists(&mut conn, kind.candidates(), &candidate).await? {
            return Err(VoteError::NotFound(format!("{} candidate {}", kind, candidate)));
        }
    }

    let repo = CategoryVoteRepository::<C>::new();
    let result = with_retry("vote_upsert", retry, || {
        upsert_once(pool, &repo, identity, scope, league, &request.slot, &candidate)
    })
    .await;

    match &result {
        Ok(vote) => tracing::debug!(
            voter = %identity.fingerprint,
            category = %kind,
            slot = %request.slot.key(),
            candidate = %vote.candidate,
            "Vote stored"
        ),
        Err(err) => log_failure(err, identity, kind, &request.slot, "Vote upsert failed"),
    }
    result
}

async fn upsert_once<C: Category>(
    pool: &SqlitePool,
    repo: &CategoryVoteRepository<C>,
    identity: &VoterIdentity,
    scope: &str,
    league: Option<League>,
    slot: &C::Slot,
    candidate: &str,
) -> VoteResult<ProvisionalVote<C::Slot>> {
    let mut tx = begin_monitored(pool, "validation::upsert").await?;
    let fingerprint = &identity.fingerprint;

    let holder = repo
        .find_by_candidate(tx.conn(), fingerprint, scope, candidate)
        .await?;
    check_duplicate(C::KIND, slot, holder.as_ref())?;

    let vote = match repo.find_by_slot(tx.conn(), fingerprint, scope, slot).await? {
        Some(existing) => repo.reassign(tx.conn(), existing, candidate, league).await?,
        None => {
            repo.insert(
                tx.conn(),
                NewVote {
                    fingerprint,
                    voter_addr: &identity.addr,
                    league,
                    scope,
                    slot,
                    candidate,
                },
            )
            .await?
        }
    };

    tx.commit().await?;
    Ok(vote)
}

/// Empty one slot. Clearing an empty slot succeeds and changes nothing.
///
/// Returns whether a row was removed.
pub async fn clear<C: Category>(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    identity: &VoterIdentity,
    league: Option<League>,
    slot: C::Slot,
) -> VoteResult<bool> {
    let kind = C::KIND;
    let scope = kind.scope(league)?;
    let repo = CategoryVoteRepository::<C>::new();

    let result = with_retry("vote_clear", retry, || {
        clear_once(pool, &repo, identity, scope, &slot)
    })
    .await;

    if let Err(err) = &result {
        log_failure(err, identity, kind, &slot, "Vote clear failed");
    }
    result
}

async fn clear_once<C: Category>(
    pool: &SqlitePool,
    repo: &CategoryVoteRepository<C>,
    identity: &VoterIdentity,
    scope: &str,
    slot: &C::Slot,
) -> VoteResult<bool> {
    let mut tx = begin_monitored(pool, "validation::clear").await?;

    let removed = match repo
        .find_by_slot(tx.conn(), &identity.fingerprint, scope, slot)
        .await?
    {
        Some(vote) => {
            repo.remove(tx.conn(), vote).await?;
            true
        }
        None => false,
    };

    tx.commit().await?;
    Ok(removed)
}

fn log_failure<S: Slot>(
    err: &VoteError,
    identity: &VoterIdentity,
    kind: CategoryKind,
    slot: &S,
    message: &str,
) {
    if let VoteError::Storage(_) = err {
        if Retryable::kind(err) == ErrorKind::Fatal {
            tracing::error!(
                voter = %identity.fingerprint,
                category = %kind,
                slot = %slot.key(),
                error = %err,
                "{}", message
            );
        } else {
            tracing::warn!(
                voter = %identity.fingerprint,
                category = %kind,
                slot = %slot.key(),
                error = %err,
                "{}", message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{AllstarSlot, MvpRank, Position, Single};
    use crate::models::{CategoryVote, Claim, VoteId, VoterFingerprint};

    fn provisional<S>(slot: S, candidate: &str) -> ProvisionalVote<S> {
        ProvisionalVote::from_parts(CategoryVote {
            id: VoteId::generate(),
            category: CategoryKind::Allstar,
            league: Some(League::Herren),
            slot,
            candidate: candidate.to_string(),
            points: 1,
            claim: Claim::Provisional {
                fingerprint: VoterFingerprint::new("fp"),
            },
            voter_addr: "unknown".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        })
    }

    #[test]
    fn test_duplicate_in_other_slot_rejected() {
        let gk = AllstarSlot {
            line: 1,
            position: Position::Gk,
        };
        let ld = AllstarSlot {
            line: 1,
            position: Position::Ld,
        };
        let holder = provisional(gk, "player-a");

        let err = check_duplicate(CategoryKind::Allstar, &ld, Some(&holder)).unwrap_err();
        match err {
            VoteError::DuplicateCandidate {
                conflicting_slot,
                label,
                ..
            } => {
                assert_eq!(conflicting_slot["line"], 1);
                assert_eq!(conflicting_slot["position"], "gk");
                assert_eq!(label, "line 1 / gk");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_same_slot_is_not_a_duplicate() {
        let slot = MvpRank { rank: 1 };
        let holder = provisional(slot, "player-b");
        assert!(check_duplicate(CategoryKind::Mvp, &slot, Some(&holder)).is_ok());
        assert!(check_duplicate::<MvpRank>(CategoryKind::Mvp, &slot, None).is_ok());
    }

    #[test]
    fn test_single_slot_never_conflicts() {
        let holder = provisional(Single {}, "coach-1");
        assert!(check_duplicate(CategoryKind::Coach, &Single {}, Some(&holder)).is_ok());
    }

    #[test]
    fn test_normalize_candidate() {
        assert_eq!(
            normalize_candidate(CategoryKind::SpecialAward, "  Jane Doe ").unwrap(),
            "Jane Doe"
        );
        assert!(matches!(
            normalize_candidate(CategoryKind::SpecialAward, "   "),
            Err(VoteError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize_candidate(CategoryKind::Mvp, ""),
            Err(VoteError::InvalidInput(_))
        ));
        let long = "x".repeat(MAX_NAME_CHARS + 1);
        assert!(normalize_candidate(CategoryKind::SpecialAward, &long).is_err());
        assert!(normalize_candidate(CategoryKind::Mvp, &long).is_ok());
    }
}
