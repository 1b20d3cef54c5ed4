//! API-facing error type for the vote service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fba_common::{ErrorKind, RetryExhausted, Retryable};
use serde_json::json;
use thiserror::Error;

use crate::category::CategoryKind;

#[derive(Debug, Error)]
pub enum VoteError {
    /// Slot outside the category's domain (400)
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    /// Candidate already holds another slot of this voter (400)
    #[error("Candidate {candidate} already chosen for {category} at {label}")]
    DuplicateCandidate {
        category: CategoryKind,
        candidate: String,
        conflicting_slot: serde_json::Value,
        label: String,
    },

    /// Malformed or missing request data (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Candidate, team, voter or vote does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] fba_common::Error),
}

impl From<sqlx::Error> for VoteError {
    fn from(err: sqlx::Error) -> Self {
        VoteError::Storage(fba_common::Error::Database(err))
    }
}

impl From<RetryExhausted> for VoteError {
    fn from(err: RetryExhausted) -> Self {
        VoteError::Storage(fba_common::Error::StorageBusy(err))
    }
}

impl Retryable for VoteError {
    fn kind(&self) -> ErrorKind {
        match self {
            VoteError::Storage(err) => err.kind(),
            _ => ErrorKind::Fatal,
        }
    }
}

impl IntoResponse for VoteError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            VoteError::InvalidSlot(msg) => (StatusCode::BAD_REQUEST, "INVALID_SLOT", msg.clone()),
            VoteError::DuplicateCandidate { .. } => {
                (StatusCode::BAD_REQUEST, "DUPLICATE_CANDIDATE", self.to_string())
            }
            VoteError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
            }
            VoteError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            VoteError::Storage(fba_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
            }
            VoteError::Storage(fba_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
            }
            VoteError::Storage(err) => match err.kind() {
                ErrorKind::Busy | ErrorKind::TimedOut => {
                    tracing::warn!(error = %err, "Request gave up on busy storage");
                    (
                        StatusCode::REQUEST_TIMEOUT,
                        "REQUEST_TIMEOUT",
                        "The server is busy, please try again".to_string(),
                    )
                }
                ErrorKind::Fatal => {
                    tracing::error!(error = %err, "Unexpected storage failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let VoteError::DuplicateCandidate {
            conflicting_slot, ..
        } = self
        {
            error["conflicting_slot"] = conflicting_slot;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

pub type VoteResult<T> = Result<T, VoteError>;
