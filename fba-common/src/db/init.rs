//! Database initialization
//!
//! Opens (creating if missing) the SQLite file and brings the schema up to
//! date. Every statement is idempotent so startup against an existing
//! database is a no-op apart from the pragmas.

use crate::config::DatabaseConfig;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Schema version written by this build
pub const SCHEMA_VERSION: i64 = 1;

pub const ALLSTAR_VOTES: &str = "allstar_votes";
pub const MVP_VOTES: &str = "mvp_votes";
pub const COACH_VOTES: &str = "coach_votes";
pub const FAIRPLAY_VOTES: &str = "fairplay_votes";
pub const REFEREE_VOTES: &str = "referee_votes";
pub const SPECIAL_AWARD_VOTES: &str = "special_award_votes";

/// The six category vote tables, in display order
pub const VOTE_TABLES: [&str; 6] = [
    ALLSTAR_VOTES,
    MVP_VOTES,
    COACH_VOTES,
    FAIRPLAY_VOTES,
    REFEREE_VOTES,
    SPECIAL_AWARD_VOTES,
];

/// Open the database at `db_path` and create tables if needed
pub async fn init_database(db_path: &Path, config: &DatabaseConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // busy_timeout is a per-connection setting, so it goes on the connect
    // options rather than a one-off PRAGMA against the pool.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    info!(
        busy_timeout_ms = config.busy_timeout_ms,
        max_connections = config.max_connections,
        "Database ready"
    );

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_teams_table(pool).await?;
    create_players_table(pool).await?;
    create_coaches_table(pool).await?;
    create_referee_pairs_table(pool).await?;
    create_voters_table(pool).await?;

    for table in VOTE_TABLES {
        create_vote_table(pool, table).await?;
    }

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_teams_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            league TEXT CHECK (league IS NULL OR league IN ('herren', 'damen')),
            is_for_form INTEGER NOT NULL DEFAULT 0,
            logo_url TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_players_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            team_id TEXT REFERENCES teams(id) ON DELETE SET NULL,
            league TEXT NOT NULL CHECK (league IN ('herren', 'damen')),
            position TEXT,
            image_url TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_coaches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coaches (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            team_id TEXT REFERENCES teams(id) ON DELETE SET NULL,
            league TEXT NOT NULL CHECK (league IN ('herren', 'damen')),
            image_url TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_referee_pairs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS referee_pairs (
            id TEXT PRIMARY KEY,
            referee1_name TEXT NOT NULL,
            referee2_name TEXT NOT NULL,
            image_url TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_voters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS voters (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            team_id TEXT REFERENCES teams(id) ON DELETE SET NULL,
            league TEXT CHECK (league IS NULL OR league IN ('herren', 'damen')),
            voter_fingerprint TEXT NOT NULL,
            voter_addr TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_voters_fingerprint ON voters(voter_fingerprint)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// All six category tables share one shape.
///
/// `scope` is the league for league-scoped categories and `''` otherwise, so
/// the partial unique index can cover both kinds (NULLs never collide in a
/// unique index).
async fn create_vote_table(pool: &SqlitePool, table: &str) -> Result<()> {
    let create = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            candidate_ref TEXT NOT NULL,
            voter_fingerprint TEXT NOT NULL,
            voter_addr TEXT NOT NULL,
            league TEXT CHECK (league IS NULL OR league IN ('herren', 'damen')),
            scope TEXT NOT NULL DEFAULT '',
            slot_key TEXT NOT NULL,
            points INTEGER NOT NULL CHECK (points > 0),
            claimed_by TEXT REFERENCES voters(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
    );
    sqlx::query(&create).execute(pool).await?;

    let unclaimed_slot = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_unclaimed_slot \
         ON {table}(voter_fingerprint, scope, slot_key) WHERE claimed_by IS NULL"
    );
    sqlx::query(&unclaimed_slot).execute(pool).await?;

    let claimed = format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_claimed_by ON {table}(claimed_by)"
    );
    sqlx::query(&claimed).execute(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_tables_are_distinct() {
        let mut names = VOTE_TABLES.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 6);
    }
}
