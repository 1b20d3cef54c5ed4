//! Core vote domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::category::CategoryKind;

/// Competition division. Most categories are voted per league.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Herren,
    Damen,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            League::Herren => "herren",
            League::Damen => "damen",
        }
    }
}

impl FromStr for League {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "herren" => Ok(League::Herren),
            "damen" => Ok(League::Damen),
            other => Err(format!("unknown league '{}'", other)),
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort correlation key for an anonymous browsing session.
///
/// Not unique: two visitors behind one proxy address with the same browser
/// share a fingerprint when neither sends a client token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoterFingerprint(String);

impl VoterFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id of a finalized voter row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_db(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id of one category vote row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(String);

impl VoteId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_db(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Who a vote row belongs to.
///
/// A row starts provisional under the session fingerprint and becomes
/// claimed by exactly one voter at finalization. Claimed rows are history
/// and never change again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Claim {
    Provisional {
        #[serde(skip)]
        fingerprint: VoterFingerprint,
    },
    Claimed {
        voter_id: VoterId,
    },
}

impl Claim {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Claim::Claimed { .. })
    }
}

/// One voter's choice for one slot of a category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryVote<S> {
    pub id: VoteId,
    pub category: CategoryKind,
    pub league: Option<League>,
    #[serde(flatten)]
    pub slot: S,
    pub candidate: String,
    pub points: i64,
    pub claim: Claim,
    #[serde(skip)]
    pub voter_addr: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A vote row known to be unclaimed.
///
/// Only the repository can build one, and every mutating repository call
/// takes one, so claimed rows cannot reach a mutation path.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ProvisionalVote<S>(CategoryVote<S>);

impl<S> ProvisionalVote<S> {
    pub(crate) fn try_new(vote: CategoryVote<S>) -> Option<Self> {
        match vote.claim {
            Claim::Provisional { .. } => Some(Self(vote)),
            Claim::Claimed { .. } => None,
        }
    }

    /// For rows the repository has just written as unclaimed
    pub(crate) fn from_parts(vote: CategoryVote<S>) -> Self {
        debug_assert!(!vote.claim.is_claimed());
        Self(vote)
    }

    pub fn into_inner(self) -> CategoryVote<S> {
        self.0
    }
}

impl<S> std::ops::Deref for ProvisionalVote<S> {
    type Target = CategoryVote<S>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A finalized voter
#[derive(Debug, Clone, Serialize)]
pub struct Voter {
    pub id: VoterId,
    pub first_name: String,
    pub last_name: String,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub league: Option<League>,
    pub voter_addr: String,
    pub created_at: String,
}
