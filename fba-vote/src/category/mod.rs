//! Award categories
//!
//! Six categories share one storage shape and differ only in their slot
//! domain, point function, league scoping and where candidates come from.
//! [`CategoryKind`] names a category at runtime; the [`Category`] marker
//! types carry the same information at compile time for the generic
//! repository.

pub mod slots;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use fba_common::db;

use crate::error::VoteError;
use crate::models::League;
pub use slots::{AllstarSlot, MvpRank, Position, Single, Slot, SlotFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKind {
    Allstar,
    Mvp,
    Coach,
    Fairplay,
    Referee,
    SpecialAward,
}

/// Roster table a category's candidates are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Player,
    Coach,
    RefereePair,
    /// Free-text name, no roster row
    Name,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 6] = [
        CategoryKind::Allstar,
        CategoryKind::Mvp,
        CategoryKind::Coach,
        CategoryKind::Fairplay,
        CategoryKind::Referee,
        CategoryKind::SpecialAward,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Allstar => "allstar",
            CategoryKind::Mvp => "mvp",
            CategoryKind::Coach => "coach",
            CategoryKind::Fairplay => "fairplay",
            CategoryKind::Referee => "referee",
            CategoryKind::SpecialAward => "special-award",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            CategoryKind::Allstar => db::ALLSTAR_VOTES,
            CategoryKind::Mvp => db::MVP_VOTES,
            CategoryKind::Coach => db::COACH_VOTES,
            CategoryKind::Fairplay => db::FAIRPLAY_VOTES,
            CategoryKind::Referee => db::REFEREE_VOTES,
            CategoryKind::SpecialAward => db::SPECIAL_AWARD_VOTES,
        }
    }

    /// Whether one voter fills the category once per league
    pub fn league_scoped(&self) -> bool {
        matches!(
            self,
            CategoryKind::Allstar | CategoryKind::Mvp | CategoryKind::Coach | CategoryKind::Fairplay
        )
    }

    pub fn candidates(&self) -> CandidateSource {
        match self {
            CategoryKind::Allstar | CategoryKind::Mvp | CategoryKind::Fairplay => {
                CandidateSource::Player
            }
            CategoryKind::Coach => CandidateSource::Coach,
            CategoryKind::Referee => CandidateSource::RefereePair,
            CategoryKind::SpecialAward => CandidateSource::Name,
        }
    }

    /// Storage scope for a vote: the league for league-scoped categories,
    /// empty otherwise
    pub fn scope(&self, league: Option<League>) -> Result<&'static str, VoteError> {
        if !self.league_scoped() {
            return Ok("");
        }
        league.map(|l| l.as_str()).ok_or_else(|| {
            VoteError::InvalidInput(format!("league is required for {} votes", self.as_str()))
        })
    }

    /// League recorded on a row. Referee rows never carry one.
    pub fn recorded_league(&self, league: Option<League>) -> Option<League> {
        match self {
            CategoryKind::Referee => None,
            _ => league,
        }
    }
}

/// JSON form of a stored slot key, e.g. `{"line": 1, "position": "gk"}`
pub fn slot_json(kind: CategoryKind, key: &str) -> Option<serde_json::Value> {
    let value = match kind {
        CategoryKind::Allstar => serde_json::to_value(AllstarSlot::parse_key(key)?),
        CategoryKind::Mvp => serde_json::to_value(MvpRank::parse_key(key)?),
        _ => serde_json::to_value(Single::parse_key(key)?),
    };
    value.ok()
}

impl FromStr for CategoryKind {
    type Err = VoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| VoteError::InvalidInput(format!("unknown category '{}'", s)))
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compile-time description of one category
pub trait Category: Send + Sync + 'static {
    const KIND: CategoryKind;
    type Slot: Slot;
}

pub struct Allstar;
pub struct Mvp;
pub struct CoachOfTheYear;
pub struct FairPlay;
pub struct RefereePair;
pub struct SpecialAward;

impl Category for Allstar {
    const KIND: CategoryKind = CategoryKind::Allstar;
    type Slot = AllstarSlot;
}

impl Category for Mvp {
    const KIND: CategoryKind = CategoryKind::Mvp;
    type Slot = MvpRank;
}

impl Category for CoachOfTheYear {
    const KIND: CategoryKind = CategoryKind::Coach;
    type Slot = Single;
}

impl Category for FairPlay {
    const KIND: CategoryKind = CategoryKind::Fairplay;
    type Slot = Single;
}

impl Category for RefereePair {
    const KIND: CategoryKind = CategoryKind::Referee;
    type Slot = Single;
}

impl Category for SpecialAward {
    const KIND: CategoryKind = CategoryKind::SpecialAward;
    type Slot = Single;
}
