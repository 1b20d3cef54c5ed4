//! Shared helpers for fba-vote integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use fba_common::config::{DatabaseConfig, FinalizeConfig};
use fba_common::db::init_database;
use fba_common::RetryPolicy;
use fba_vote::{build_router, AppState};

/// A fresh database in a temp dir plus the router serving it
pub struct TestApp {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub app: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(
            DatabaseConfig::default(),
            RetryPolicy::default(),
            FinalizeConfig::default(),
        )
        .await
    }

    pub async fn with_config(
        database: DatabaseConfig,
        retry: RetryPolicy,
        finalize: FinalizeConfig,
    ) -> Self {
        let dir = TempDir::new().expect("Should create temp dir");
        let pool = init_database(&dir.path().join("fba.db"), &database)
            .await
            .expect("Should init database");
        seed_roster(&pool).await;

        let state = AppState::new(pool.clone(), retry, finalize);
        let app = build_router(state.clone());
        Self {
            dir,
            pool,
            state,
            app,
        }
    }

    /// Send a request and return status plus parsed JSON body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Router should respond");
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .expect("Count query should run")
    }
}

/// Roster used throughout the tests
///
/// Herren players p-a .. p-d on team t-wiz, damen player p-e on t-tig,
/// coach c-1, referee pairs r-1 and r-2.
pub async fn seed_roster(pool: &SqlitePool) {
    let statements = [
        "INSERT INTO teams (id, name, league, is_for_form) VALUES ('t-wiz', 'Wizards', 'herren', 1)",
        "INSERT INTO teams (id, name, league, is_for_form) VALUES ('t-tig', 'Tigers', 'damen', 1)",
        "INSERT INTO teams (id, name, league, is_for_form) VALUES ('t-old', 'Retired Club', NULL, 0)",
        "INSERT INTO players (id, first_name, last_name, team_id, league, position) VALUES ('p-a', 'Anna', 'Alpha', 't-wiz', 'herren', 'gk')",
        "INSERT INTO players (id, first_name, last_name, team_id, league, position) VALUES ('p-b', 'Bea', 'Beta', 't-wiz', 'herren', 'c')",
        "INSERT INTO players (id, first_name, last_name, team_id, league, position) VALUES ('p-c', 'Cem', 'Gamma', 't-wiz', 'herren', 'lw')",
        "INSERT INTO players (id, first_name, last_name, team_id, league, position) VALUES ('p-d', 'Dan', 'Delta', 't-wiz', 'herren', 'rd')",
        "INSERT INTO players (id, first_name, last_name, team_id, league, position) VALUES ('p-e', 'Eva', 'Epsilon', 't-tig', 'damen', 'c')",
        "INSERT INTO coaches (id, first_name, last_name, team_id, league) VALUES ('c-1', 'Carl', 'Coach', 't-wiz', 'herren')",
        "INSERT INTO referee_pairs (id, referee1_name, referee2_name) VALUES ('r-1', 'Meier', 'Keller')",
        "INSERT INTO referee_pairs (id, referee1_name, referee2_name) VALUES ('r-2', 'Huber', 'Frei')",
    ];
    for sql in statements {
        sqlx::query(sql)
            .execute(pool)
            .await
            .expect("Roster seed should insert");
    }
}

/// Build a request carrying the voter token and an optional JSON body
pub fn test_request(method: &str, uri: &str, voter: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-voter-id", voter);

    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
