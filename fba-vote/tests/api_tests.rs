//! Integration tests for the fba-vote HTTP API
//!
//! Tests cover:
//! - Health endpoint and team list
//! - Category upsert, duplicate rejection, clear and slot domains
//! - Session reset across all six categories
//! - Finalization followed by results
//! - Admin voter inspection and deletion

mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use serde_json::{json, Value};

use common::{test_request, TestApp};

const VOTER: &str = "session-aaa";
const OTHER_VOTER: &str = "session-bbb";

async fn provisional(app: &TestApp, voter: &str, uri: &str) -> Vec<Value> {
    let (status, body) = app.send(test_request("GET", uri, voter, None)).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    body["votes"].as_array().cloned().unwrap_or_default()
}

async fn finalize(app: &TestApp, voter: &str) -> (StatusCode, Value) {
    app.send(test_request(
        "POST",
        "/api/voters/finalize",
        voter,
        Some(json!({"firstName": "Vera", "lastName": "Voter", "teamId": "t-wiz", "league": "herren"})),
    ))
    .await
}

// =============================================================================
// Health and roster
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let (status, body) = app.send(test_request("GET", "/health", VOTER, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "fba-vote");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_team_list_for_form() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(test_request("GET", "/api/teams?for_form=true", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["teams"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Tigers", "Wizards"]);

    let (_, body) = app.send(test_request("GET", "/api/teams", VOTER, None)).await;
    assert_eq!(body["teams"].as_array().unwrap().len(), 3);
}

// =============================================================================
// Allstar: duplicate rejection, clear, retry
// =============================================================================

#[tokio::test]
async fn test_allstar_duplicate_then_clear_then_retry() {
    let app = TestApp::new().await;
    let uri = "/api/votes/allstar";

    let (status, body) = app
        .send(test_request(
            "POST",
            uri,
            VOTER,
            Some(json!({"league": "herren", "line": 1, "position": "gk", "candidate": "p-a"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["points"], 3);
    assert_eq!(body["claim"]["state"], "provisional");

    let (status, body) = app
        .send(test_request(
            "POST",
            uri,
            VOTER,
            Some(json!({"league": "herren", "line": 1, "position": "ld", "candidate": "p-a"})),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DUPLICATE_CANDIDATE");
    assert_eq!(body["error"]["conflicting_slot"], json!({"line": 1, "position": "gk"}));

    // Rejection left the store unchanged
    let votes = provisional(&app, VOTER, "/api/votes/allstar?league=herren").await;
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["position"], "gk");

    let (status, body) = app
        .send(test_request(
            "DELETE",
            uri,
            VOTER,
            Some(json!({"league": "herren", "line": 1, "position": "gk"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    let (status, _) = app
        .send(test_request(
            "POST",
            uri,
            VOTER,
            Some(json!({"league": "herren", "line": 1, "position": "ld", "candidate": "p-a"})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let votes = provisional(&app, VOTER, "/api/votes/allstar?league=herren").await;
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["position"], "ld");
    assert_eq!(votes[0]["candidate"], "p-a");
}

#[tokio::test]
async fn test_repeated_upserts_keep_one_row_per_slot() {
    let app = TestApp::new().await;

    for candidate in ["p-a", "p-b", "p-c", "p-b"] {
        let (status, _) = app
            .send(test_request(
                "POST",
                "/api/votes/mvp",
                VOTER,
                Some(json!({"league": "herren", "rank": 3, "candidate": candidate})),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let votes = provisional(&app, VOTER, "/api/votes/mvp?league=herren").await;
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["candidate"], "p-b");
    assert_eq!(votes[0]["points"], 8);
    assert_eq!(app.count("SELECT COUNT(*) FROM mvp_votes").await, 1);
}

#[tokio::test]
async fn test_same_player_allowed_in_each_league() {
    let app = TestApp::new().await;

    for league in ["herren", "damen"] {
        let (status, body) = app
            .send(test_request(
                "POST",
                "/api/votes/fairplay",
                VOTER,
                Some(json!({"league": league, "candidate": "p-a"})),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "body: {}", body);
    }

    assert_eq!(provisional(&app, VOTER, "/api/votes/fairplay?league=damen").await.len(), 1);
    assert_eq!(provisional(&app, VOTER, "/api/votes/fairplay").await.len(), 1);
}

#[tokio::test]
async fn test_voters_do_not_see_each_other() {
    let app = TestApp::new().await;
    let body = json!({"league": "herren", "rank": 1, "candidate": "p-a"});

    let (status, _) = app
        .send(test_request("POST", "/api/votes/mvp", VOTER, Some(body.clone())))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Another voter may pick the same candidate
    let (status, _) = app
        .send(test_request("POST", "/api/votes/mvp", OTHER_VOTER, Some(body)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(test_request(
            "DELETE",
            "/api/votes/mvp",
            OTHER_VOTER,
            Some(json!({"league": "herren", "rank": 1})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(provisional(&app, VOTER, "/api/votes/mvp").await.len(), 1);
    assert!(provisional(&app, OTHER_VOTER, "/api/votes/mvp").await.is_empty());
}

// =============================================================================
// Clear idempotence and session reset
// =============================================================================

#[tokio::test]
async fn test_clear_empty_slot_is_noop_success() {
    let app = TestApp::new().await;

    for _ in 0..2 {
        let (status, body) = app
            .send(test_request(
                "DELETE",
                "/api/votes/mvp",
                VOTER,
                Some(json!({"league": "damen", "rank": 7})),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["removed"], false);
    }

    // Single-slot categories accept a bodyless DELETE
    let (status, body) = app
        .send(test_request("DELETE", "/api/votes/referee", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], false);
}

#[tokio::test]
async fn test_clear_session_empties_every_category() {
    let app = TestApp::new().await;
    let casts = [
        ("/api/votes/allstar", json!({"league": "herren", "line": 2, "position": "c", "candidate": "p-b"})),
        ("/api/votes/mvp", json!({"league": "herren", "rank": 1, "candidate": "p-a"})),
        ("/api/votes/coach", json!({"league": "herren", "candidate": "c-1"})),
        ("/api/votes/fairplay", json!({"league": "damen", "candidate": "p-e"})),
        ("/api/votes/referee", json!({"candidate": "r-1"})),
        ("/api/votes/special-award", json!({"league": "herren", "candidate": "Kim Keeper"})),
    ];
    for (uri, body) in &casts {
        let (status, response) = app
            .send(test_request("POST", uri, VOTER, Some(body.clone())))
            .await;
        assert_eq!(status, StatusCode::OK, "{} -> {}", uri, response);
    }
    // Another voter's vote must survive the purge
    app.send(test_request("POST", casts[1].0, OTHER_VOTER, Some(casts[1].1.clone())))
        .await;

    let (status, body) = app
        .send(test_request("POST", "/api/votes/clear-session?reason=entry", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["reason"], "entry");
    assert_eq!(body["purged"], 6);
    assert_eq!(body["by_category"]["special-award"], 1);

    for uri in [
        "/api/votes/allstar?league=herren",
        "/api/votes/mvp?league=herren",
        "/api/votes/coach?league=herren",
        "/api/votes/fairplay?league=damen",
        "/api/votes/referee",
        "/api/votes/special-award",
    ] {
        assert!(provisional(&app, VOTER, uri).await.is_empty(), "{} not empty", uri);
    }
    assert_eq!(provisional(&app, OTHER_VOTER, "/api/votes/mvp").await.len(), 1);

    // Second reset finds nothing and still succeeds
    let (status, body) = app
        .send(test_request("POST", "/api/votes/clear-session", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "reload");
    assert_eq!(body["purged"], 0);
}

#[tokio::test]
async fn test_abandon_beacon_body_is_ignored() {
    let app = TestApp::new().await;
    app.send(test_request(
        "POST",
        "/api/votes/coach",
        VOTER,
        Some(json!({"league": "herren", "candidate": "c-1"})),
    ))
    .await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/votes/clear-session?reason=abandon")
        .header("x-voter-id", VOTER)
        .header("content-type", "text/plain")
        .body(Body::from("not json at all"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged"], 1);
}

// =============================================================================
// Validation errors
// =============================================================================

#[tokio::test]
async fn test_invalid_slots_rejected() {
    let app = TestApp::new().await;
    let cases = [
        ("/api/votes/mvp", json!({"league": "herren", "rank": 11, "candidate": "p-a"})),
        ("/api/votes/mvp", json!({"league": "herren", "rank": 0, "candidate": "p-a"})),
        ("/api/votes/mvp", json!({"league": "herren", "candidate": "p-a"})),
        ("/api/votes/allstar", json!({"league": "herren", "line": 4, "position": "gk", "candidate": "p-a"})),
        ("/api/votes/allstar", json!({"league": "herren", "line": 1, "position": "xx", "candidate": "p-a"})),
    ];

    for (uri, body) in cases {
        let (status, response) = app
            .send(test_request("POST", uri, VOTER, Some(body.clone())))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(response["error"]["code"], "INVALID_SLOT", "{}", body);
    }
    assert_eq!(app.count("SELECT COUNT(*) FROM mvp_votes").await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM allstar_votes").await, 0);
}

#[tokio::test]
async fn test_unknown_candidate_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(test_request(
            "POST",
            "/api/votes/coach",
            VOTER,
            Some(json!({"league": "herren", "candidate": "p-a"})),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_input_is_invalid_input() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/votes/mvp")
        .header("x-voter-id", VOTER)
        .header("content-type", "application/json")
        .body(Body::from("{\"rank\": 1,"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = app
        .send(test_request("GET", "/api/votes/mvp?league=elsewhere", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    // League-scoped categories need a league on writes
    let (status, body) = app
        .send(test_request(
            "POST",
            "/api/votes/allstar",
            VOTER,
            Some(json!({"line": 1, "position": "gk", "candidate": "p-a"})),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_special_award_names_are_trimmed() {
    let app = TestApp::new().await;
    let uri = "/api/votes/special-award";

    let (status, body) = app
        .send(test_request("POST", uri, VOTER, Some(json!({"candidate": "  Kim Keeper  "}))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["candidate"], "Kim Keeper");

    let (status, body) = app
        .send(test_request("POST", uri, VOTER, Some(json!({"candidate": "   "}))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    // Re-voting replaces the single slot
    app.send(test_request("POST", uri, VOTER, Some(json!({"candidate": "Lou Libero"}))))
        .await;
    let votes = provisional(&app, VOTER, uri).await;
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["candidate"], "Lou Libero");
}

// =============================================================================
// Finalize and results
// =============================================================================

#[tokio::test]
async fn test_mvp_scenario_through_results() {
    let app = TestApp::new().await;
    let uri = "/api/votes/mvp";

    let (status, _) = app
        .send(test_request("POST", uri, VOTER, Some(json!({"league": "herren", "rank": 1, "candidate": "p-b"}))))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(test_request("POST", uri, VOTER, Some(json!({"league": "herren", "rank": 2, "candidate": "p-b"}))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DUPLICATE_CANDIDATE");
    assert_eq!(body["error"]["conflicting_slot"]["rank"], 1);

    let (status, _) = app
        .send(test_request("POST", uri, VOTER, Some(json!({"league": "herren", "rank": 2, "candidate": "p-c"}))))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Nothing counts before finalization
    let (_, body) = app
        .send(test_request("GET", "/api/results/mvp?league=herren", VOTER, None))
        .await;
    assert!(body["results"].as_array().unwrap().is_empty());

    let (status, body) = finalize(&app, VOTER).await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["already_finalized"], false);
    assert_eq!(body["claimed"]["mvp"], 2);

    let (status, body) = app
        .send(test_request("GET", "/api/results/mvp?league=herren", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["candidate"]["id"], "p-b");
    assert_eq!(results[0]["candidate"]["name"], "Bea Beta");
    assert_eq!(results[0]["candidate"]["team"], "Wizards");
    assert_eq!(results[0]["total_points"], 10);
    assert_eq!(results[0]["vote_count"], 1);
    assert_eq!(results[1]["candidate"]["id"], "p-c");
    assert_eq!(results[1]["total_points"], 9);
    assert_eq!(results[1]["vote_count"], 1);

    // Provisional views no longer show claimed rows
    assert!(provisional(&app, VOTER, "/api/votes/mvp?league=herren").await.is_empty());
}

#[tokio::test]
async fn test_claimed_rows_are_not_mutated_by_later_votes() {
    let app = TestApp::new().await;
    let uri = "/api/votes/mvp";

    app.send(test_request("POST", uri, VOTER, Some(json!({"league": "herren", "rank": 1, "candidate": "p-a"}))))
        .await;
    let (status, _) = finalize(&app, VOTER).await;
    assert_eq!(status, StatusCode::CREATED);

    // Same fingerprint votes again: a new provisional row, history untouched
    let (status, _) = app
        .send(test_request("POST", uri, VOTER, Some(json!({"league": "herren", "rank": 1, "candidate": "p-d"}))))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(test_request("DELETE", uri, VOTER, Some(json!({"league": "herren", "rank": 1}))))
        .await;
    assert_eq!(status, StatusCode::OK);
    app.send(test_request("POST", "/api/votes/clear-session", VOTER, None))
        .await;

    let (_, body) = app
        .send(test_request("GET", "/api/results/mvp", VOTER, None))
        .await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["candidate"]["id"], "p-a");
    assert_eq!(
        app.count("SELECT COUNT(*) FROM mvp_votes WHERE claimed_by IS NOT NULL").await,
        1
    );
}

#[tokio::test]
async fn test_results_across_categories() {
    let app = TestApp::new().await;
    let ballots = [
        (VOTER, "/api/votes/allstar", json!({"league": "herren", "line": 1, "position": "c", "candidate": "p-b"})),
        (VOTER, "/api/votes/referee", json!({"league": "herren", "candidate": "r-1"})),
        (VOTER, "/api/votes/special-award", json!({"league": "damen", "candidate": "Kim Keeper"})),
        (OTHER_VOTER, "/api/votes/allstar", json!({"league": "herren", "line": 3, "position": "lw", "candidate": "p-b"})),
        (OTHER_VOTER, "/api/votes/allstar", json!({"league": "herren", "line": 1, "position": "gk", "candidate": "p-a"})),
        (OTHER_VOTER, "/api/votes/referee", json!({"candidate": "r-1"})),
        (OTHER_VOTER, "/api/votes/special-award", json!({"league": "herren", "candidate": "Kim Keeper"})),
    ];
    for (voter, uri, body) in ballots {
        let (status, response) = app.send(test_request("POST", uri, voter, Some(body))).await;
        assert_eq!(status, StatusCode::OK, "{} -> {}", uri, response);
    }
    for voter in [VOTER, OTHER_VOTER] {
        let (status, _) = finalize(&app, voter).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app
        .send(test_request("GET", "/api/results/allstar?league=herren", VOTER, None))
        .await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["candidate"]["id"], "p-b");
    assert_eq!(results[0]["total_points"], 4);
    assert_eq!(results[0]["line_counts"], json!([1, 0, 1]));
    assert_eq!(results[1]["candidate"]["id"], "p-a");
    assert_eq!(results[1]["total_points"], 3);

    // Referee rows carry no league, so a league filter does not hide them
    let (_, body) = app
        .send(test_request("GET", "/api/results/referee?league=damen", VOTER, None))
        .await;
    assert!(body["league"].is_null());
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["candidate"]["name"], "Meier / Keller");
    assert_eq!(results[0]["vote_count"], 2);
    assert!(results[0].get("line_counts").is_none());

    let (_, body) = app
        .send(test_request("GET", "/api/results/special-award?league=damen", VOTER, None))
        .await;
    assert_eq!(body["results"][0]["candidate"]["name"], "Kim Keeper");
    assert_eq!(body["results"][0]["vote_count"], 1);

    let (_, body) = app
        .send(test_request("GET", "/api/results/special-award", VOTER, None))
        .await;
    assert_eq!(body["results"][0]["vote_count"], 2);

    let (status, body) = app
        .send(test_request("GET", "/api/results/best-dressed", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

// =============================================================================
// Admin voter operations
// =============================================================================

#[tokio::test]
async fn test_admin_list_detail_and_delete() {
    let app = TestApp::new().await;

    app.send(test_request("POST", "/api/votes/mvp", VOTER, Some(json!({"league": "herren", "rank": 1, "candidate": "p-a"}))))
        .await;
    app.send(test_request("POST", "/api/votes/coach", VOTER, Some(json!({"league": "herren", "candidate": "c-1"}))))
        .await;
    let (_, outcome) = finalize(&app, VOTER).await;
    let voter_id = outcome["voter_id"].as_str().unwrap().to_string();

    let (status, body) = app.send(test_request("GET", "/api/admin/voters", VOTER, None)).await;
    assert_eq!(status, StatusCode::OK);
    let voters = body["voters"].as_array().unwrap();
    assert_eq!(voters.len(), 1);
    assert_eq!(voters[0]["id"], voter_id.as_str());
    assert_eq!(voters[0]["first_name"], "Vera");
    assert_eq!(voters[0]["team_name"], "Wizards");
    assert_eq!(voters[0]["votes"]["mvp"], 1);
    assert_eq!(voters[0]["votes"]["coach"], 1);
    assert_eq!(voters[0]["votes"]["referee"], 0);

    let detail_uri = format!("/api/admin/voters/{}", voter_id);
    let (status, body) = app.send(test_request("GET", &detail_uri, VOTER, None)).await;
    assert_eq!(status, StatusCode::OK);
    let votes = body["votes"].as_array().unwrap();
    assert_eq!(votes.len(), 2);
    assert_eq!(votes[0]["category"], "mvp");
    assert_eq!(votes[0]["slot"], json!({"rank": 1}));
    assert_eq!(votes[0]["candidate"]["name"], "Anna Alpha");
    assert_eq!(votes[1]["candidate"]["name"], "Carl Coach");

    // Single vote deletion
    let vote_id = votes[1]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .send(test_request("DELETE", &format!("/api/admin/votes/coach/{}", vote_id), VOTER, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(test_request("DELETE", &format!("/api/admin/votes/coach/{}", vote_id), VOTER, None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(test_request("DELETE", "/api/admin/votes/nonsense/x", VOTER, None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Voter deletion takes the remaining claimed rows with it
    let (status, body) = app.send(test_request("DELETE", &detail_uri, VOTER, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes_deleted"], 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM voters").await, 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM mvp_votes").await, 0);

    let (status, _) = app.send(test_request("GET", &detail_uri, VOTER, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(test_request("DELETE", &detail_uri, VOTER, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
