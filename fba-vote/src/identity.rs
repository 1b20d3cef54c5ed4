//! Voter identity resolution
//!
//! A voter is identified by a client-generated session token when the
//! browser sends one, else by network address plus a user-agent prefix.
//! The fallback collides for visitors sharing a proxy and browser build;
//! it is a correlation key, not an authentication.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::models::VoterFingerprint;

/// Header carrying the client session token
pub const VOTER_ID_HEADER: &str = "x-voter-id";

const USER_AGENT_PREFIX_CHARS: usize = 50;
const UNKNOWN: &str = "unknown";

/// Derive the voter fingerprint.
///
/// A non-blank `client_token` is used verbatim. Otherwise the fingerprint is
/// `<first address of network_addr>-<first 50 chars of user_agent>`.
pub fn resolve(client_token: Option<&str>, network_addr: &str, user_agent: &str) -> VoterFingerprint {
    if let Some(token) = client_token.filter(|t| !t.trim().is_empty()) {
        return VoterFingerprint::new(token);
    }

    let addr = first_hop(network_addr);
    let addr = if addr.is_empty() { UNKNOWN } else { addr };
    let agent: String = user_agent.chars().take(USER_AGENT_PREFIX_CHARS).collect();

    VoterFingerprint::new(format!("{}-{}", addr, agent))
}

/// First entry of a comma-separated proxy chain, trimmed
pub fn first_hop(addr: &str) -> &str {
    addr.split(',').next().unwrap_or("").trim()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identity of the voter behind a request
#[derive(Debug, Clone)]
pub struct VoterIdentity {
    pub fingerprint: VoterFingerprint,
    /// Address recorded on vote rows for diagnostics
    pub addr: String,
}

impl VoterIdentity {
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let addr = header(headers, "x-forwarded-for")
            .map(first_hop)
            .filter(|a| !a.is_empty())
            .or_else(|| {
                header(headers, "x-real-ip")
                    .map(first_hop)
                    .filter(|a| !a.is_empty())
            })
            .map(str::to_string)
            .or_else(|| peer.map(|p| p.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let user_agent = header(headers, "user-agent").unwrap_or(UNKNOWN);
        let fingerprint = resolve(header(headers, VOTER_ID_HEADER), &addr, user_agent);

        Self { fingerprint, addr }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for VoterIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(&parts.headers, peer))
    }
}
