//! Session reset
//!
//! A full page reload, leaving the page, or landing on the entry screen all
//! wipe the voter's provisional votes so the next attempt starts empty.
//! Detecting *which* of these happened is the client's job; the server only
//! offers an idempotent purge.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use fba_common::db::begin_monitored;
use fba_common::{with_retry, ErrorKind, RetryPolicy, Retryable};

use crate::category::CategoryKind;
use crate::error::VoteResult;
use crate::models::VoterFingerprint;
use crate::store;

/// Why the client asked for a reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetReason {
    #[default]
    Reload,
    Abandon,
    Entry,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub reason: ResetReason,
    pub purged: u64,
    pub by_category: BTreeMap<CategoryKind, u64>,
}

impl PurgeReport {
    fn empty(reason: ResetReason) -> Self {
        Self {
            reason,
            purged: 0,
            by_category: CategoryKind::ALL.into_iter().map(|k| (k, 0)).collect(),
        }
    }
}

/// Delete every unclaimed row of the voter in all six tables, atomically
pub async fn purge_session(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    fingerprint: &VoterFingerprint,
    reason: ResetReason,
) -> VoteResult<PurgeReport> {
    let report = match with_retry("session_purge", retry, || purge_once(pool, fingerprint, reason)).await {
        Ok(report) => report,
        Err(err) => {
            if Retryable::kind(&err) == ErrorKind::Fatal {
                tracing::error!(
                    voter = %fingerprint,
                    category = "all",
                    reason = ?reason,
                    error = %err,
                    "Session purge failed"
                );
            } else {
                tracing::warn!(
                    voter = %fingerprint,
                    category = "all",
                    reason = ?reason,
                    error = %err,
                    "Session purge failed"
                );
            }
            return Err(err);
        }
    };

    if report.purged > 0 {
        tracing::info!(
            voter = %fingerprint,
            reason = ?reason,
            purged = report.purged,
            "Provisional votes purged"
        );
    } else {
        tracing::debug!(voter = %fingerprint, reason = ?reason, "Session reset, nothing to purge");
    }
    Ok(report)
}

async fn purge_once(
    pool: &SqlitePool,
    fingerprint: &VoterFingerprint,
    reason: ResetReason,
) -> VoteResult<PurgeReport> {
    let mut report = PurgeReport::empty(reason);
    let mut tx = begin_monitored(pool, "session::purge").await?;

    for kind in CategoryKind::ALL {
        let deleted = store::purge_provisional(tx.conn(), kind, fingerprint).await?;
        report.by_category.insert(kind, deleted);
        report.purged += deleted;
    }

    tx.commit().await?;
    Ok(report)
}

/// Full page reload
pub async fn on_reload(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    fingerprint: &VoterFingerprint,
) -> VoteResult<PurgeReport> {
    purge_session(pool, retry, fingerprint, ResetReason::Reload).await
}

/// Entry screen of the voting flow
pub async fn on_entry(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    fingerprint: &VoterFingerprint,
) -> VoteResult<PurgeReport> {
    purge_session(pool, retry, fingerprint, ResetReason::Entry).await
}

/// Page unload. Best-effort: failures are logged and swallowed.
pub async fn on_abandon(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    fingerprint: &VoterFingerprint,
) -> PurgeReport {
    match purge_session(pool, retry, fingerprint, ResetReason::Abandon).await {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(voter = %fingerprint, error = %err, "Abandon purge failed");
            PurgeReport::empty(ResetReason::Abandon)
        }
    }
}

/// Dispatch on the client-reported reason
pub async fn reset(
    pool: &SqlitePool,
    retry: &RetryPolicy,
    fingerprint: &VoterFingerprint,
    reason: ResetReason,
) -> VoteResult<PurgeReport> {
    match reason {
        ResetReason::Reload => on_reload(pool, retry, fingerprint).await,
        ResetReason::Entry => on_entry(pool, retry, fingerprint).await,
        ResetReason::Abandon => Ok(on_abandon(pool, retry, fingerprint).await),
    }
}
