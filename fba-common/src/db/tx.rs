//! Monitored transactions
//!
//! Wraps `BEGIN IMMEDIATE` to log how long a caller waited for a connection
//! and the write lock, and how long it then held the write transaction. Long
//! holds on a single-writer store are what turn into BUSY errors for
//! everyone else.
//!
//! Every caller reads before it writes. A deferred transaction would take
//! the write lock only at its first write, and in WAL mode that upgrade
//! fails immediately instead of waiting on `busy_timeout`. Taking the lock
//! at `BEGIN` lets the busy handler queue writers.

use crate::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

/// Transaction wrapper that logs acquisition and release timing
pub struct MonitoredTransaction<'c> {
    tx: Transaction<'c, Sqlite>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    /// Connection to run statements on inside the transaction
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Commit and log hold time
    pub async fn commit(self) -> Result<()> {
        let held_ms = self.acquired_at.elapsed().as_millis() as u64;
        self.tx.commit().await.map_err(Error::Database)?;
        log_release(self.caller, held_ms, "commit");
        Ok(())
    }

    /// Roll back and log hold time
    pub async fn rollback(self) -> Result<()> {
        let held_ms = self.acquired_at.elapsed().as_millis() as u64;
        self.tx.rollback().await.map_err(Error::Database)?;
        log_release(self.caller, held_ms, "rollback");
        Ok(())
    }
}

fn log_release(caller: &'static str, held_ms: u64, how: &'static str) {
    if held_ms > 1000 {
        tracing::warn!(caller, held_ms, how, "Long transaction held the write lock");
    } else {
        tracing::debug!(caller, held_ms, how, "Connection released");
    }
}

/// Begin a write transaction, logging the connection and lock wait.
///
/// Blocks up to the connection's `busy_timeout` while another writer holds
/// the lock, then fails with a Busy error for the retry layer. Dropping the returned value without committing rolls back.
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();

    let tx = pool
        .begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(Error::Database)?;

    let wait_ms = start.elapsed().as_millis() as u64;
    if wait_ms > 500 {
        tracing::warn!(caller, wait_ms, "Slow write transaction start, pool or write lock contended");
    } else {
        tracing::debug!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx,
        caller,
        acquired_at: Instant::now(),
    })
}
