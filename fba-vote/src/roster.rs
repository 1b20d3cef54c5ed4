//! Read-only roster lookups
//!
//! Players, coaches, referee pairs and teams are maintained elsewhere; this
//! service only checks that referenced ids exist and resolves display names.

use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use fba_common::Result;

use crate::category::CandidateSource;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub league: Option<String>,
    pub is_for_form: bool,
    pub logo_url: Option<String>,
}

/// Display data for a vote candidate
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct CandidateInfo {
    pub id: String,
    pub name: String,
    pub team: Option<String>,
    pub image_url: Option<String>,
}

impl CandidateInfo {
    /// Placeholder for a candidate whose roster row is gone, or a free-text name
    pub fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            team: None,
            image_url: None,
        }
    }
}

pub async fn list_teams(conn: &mut SqliteConnection, for_form_only: bool) -> Result<Vec<Team>> {
    let sql = if for_form_only {
        "SELECT id, name, league, is_for_form, logo_url FROM teams WHERE is_for_form = 1 ORDER BY name"
    } else {
        "SELECT id, name, league, is_for_form, logo_url FROM teams ORDER BY name"
    };
    let teams = sqlx::query_as(sql).fetch_all(&mut *conn).await?;
    Ok(teams)
}

pub async fn team_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM teams WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Whether `id` names an existing candidate. Free-text names always exist.
pub async fn candidate_exists(
    conn: &mut SqliteConnection,
    source: CandidateSource,
    id: &str,
) -> Result<bool> {
    let sql = match source {
        CandidateSource::Player => "SELECT 1 FROM players WHERE id = ?",
        CandidateSource::Coach => "SELECT 1 FROM coaches WHERE id = ?",
        CandidateSource::RefereePair => "SELECT 1 FROM referee_pairs WHERE id = ?",
        CandidateSource::Name => return Ok(true),
    };
    let found: Option<i64> = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Display data for every candidate of one source, keyed by id.
///
/// Rosters are a few hundred rows at most, so the whole table is read.
pub async fn candidate_directory(
    conn: &mut SqliteConnection,
    source: CandidateSource,
) -> Result<HashMap<String, CandidateInfo>> {
    let sql = match source {
        CandidateSource::Player => {
            "SELECT p.id, p.first_name || ' ' || p.last_name AS name, t.name AS team, p.image_url \
             FROM players p LEFT JOIN teams t ON t.id = p.team_id"
        }
        CandidateSource::Coach => {
            "SELECT c.id, c.first_name || ' ' || c.last_name AS name, t.name AS team, c.image_url \
             FROM coaches c LEFT JOIN teams t ON t.id = c.team_id"
        }
        CandidateSource::RefereePair => {
            "SELECT id, referee1_name || ' / ' || referee2_name AS name, NULL AS team, image_url \
             FROM referee_pairs"
        }
        CandidateSource::Name => return Ok(HashMap::new()),
    };

    let rows: Vec<CandidateInfo> = sqlx::query_as(sql).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|c| (c.id.clone(), c)).collect())
}

/// Look up one candidate in a directory, falling back to the bare id
pub fn describe(directory: &HashMap<String, CandidateInfo>, id: &str) -> CandidateInfo {
    directory
        .get(id)
        .cloned()
        .unwrap_or_else(|| CandidateInfo::bare(id))
}
