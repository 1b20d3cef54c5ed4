//! HTTP API handlers for fba-vote

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{VoteError, VoteResult};

pub mod admin;
pub mod health;
pub mod results;
pub mod session;
pub mod teams;
pub mod voters;
pub mod votes;

pub use admin::admin_routes;
pub use health::health_routes;
pub use results::results_routes;
pub use session::session_routes;
pub use teams::team_routes;
pub use voters::voter_routes;
pub use votes::vote_routes;

/// JSON body extractor that reports malformed bodies as `INVALID_INPUT`
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = VoteError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(VoteError::InvalidInput(rejection.body_text())),
        }
    }
}

/// Query string extractor that reports bad parameters as `INVALID_INPUT`
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = VoteError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(VoteError::InvalidInput(rejection.body_text())),
        }
    }
}

/// Parse a body that may be empty. DELETE requests are often sent without
/// a content type, so the bytes are read directly.
pub fn optional_json<T>(body: &Bytes) -> VoteResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| VoteError::InvalidInput(format!("invalid JSON body: {}", e)))
}
