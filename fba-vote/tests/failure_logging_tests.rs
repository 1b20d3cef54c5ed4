//! Storage failures on read and reset paths are logged with voter context
//!
//! A vote table is dropped under a running app so the next query fails, and
//! the log output is captured with a thread-local subscriber.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use tracing::subscriber::DefaultGuard;

use common::{test_request, TestApp};

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn lines_containing(&self, needle: &str) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

async fn drop_table(app: &TestApp, table: &str) {
    sqlx::query(&format!("DROP TABLE {}", table))
        .execute(&app.pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_provisional_read_failure_logs_voter_and_category() {
    let app = TestApp::new().await;
    drop_table(&app, "mvp_votes").await;

    let logs = LogCapture::default();
    let _guard = logs.install();

    let (status, body) = app
        .send(test_request("GET", "/api/votes/mvp?league=damen", "reader-1", None))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body: {}", body);

    let lines = logs.lines_containing("Loading provisional votes failed");
    assert_eq!(lines.len(), 1, "logs: {:?}", lines);
    assert!(lines[0].contains("ERROR"), "{}", lines[0]);
    assert!(lines[0].contains("voter=reader-1"), "{}", lines[0]);
    assert!(lines[0].contains("category=mvp"), "{}", lines[0]);
    assert!(lines[0].contains("scope=\"damen\"") || lines[0].contains("scope=damen"), "{}", lines[0]);
}

#[tokio::test]
async fn test_session_purge_failure_logs_voter_and_reason() {
    let app = TestApp::new().await;
    drop_table(&app, "coach_votes").await;

    let logs = LogCapture::default();
    let _guard = logs.install();

    let (status, _) = app
        .send(test_request(
            "POST",
            "/api/votes/clear-session?reason=entry",
            "resetter-1",
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let lines = logs.lines_containing("Session purge failed");
    assert_eq!(lines.len(), 1, "logs: {:?}", lines);
    assert!(lines[0].contains("voter=resetter-1"), "{}", lines[0]);
    assert!(lines[0].contains("reason=Entry"), "{}", lines[0]);
}

#[tokio::test]
async fn test_results_failure_logs_category() {
    let app = TestApp::new().await;
    drop_table(&app, "fairplay_votes").await;

    let logs = LogCapture::default();
    let _guard = logs.install();

    let (status, _) = app
        .send(test_request("GET", "/api/results/fairplay?league=herren", "anyone", None))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let lines = logs.lines_containing("Results aggregation failed");
    assert_eq!(lines.len(), 1, "logs: {:?}", lines);
    assert!(lines[0].contains("category=fairplay"), "{}", lines[0]);
    assert!(lines[0].contains("league=Some(Herren)"), "{}", lines[0]);
}
