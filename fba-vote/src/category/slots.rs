//! Slot domains and point functions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VoteError;

/// Slot fields as they arrive in a request body. Which ones are required
/// depends on the category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotFields {
    pub line: Option<i64>,
    pub position: Option<String>,
    pub rank: Option<i64>,
}

/// The addressable unit a voter fills with one candidate
pub trait Slot: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync + 'static {
    /// Validate request fields against the slot domain
    fn from_fields(fields: &SlotFields) -> Result<Self, VoteError>;

    /// Stable storage key, unique within a category
    fn key(&self) -> String;

    fn parse_key(key: &str) -> Option<Self>;

    /// Points this slot is worth. A pure function of the slot.
    fn points(&self) -> i64;

    /// Human-readable name used in conflict messages
    fn label(&self) -> String;

    /// Allstar line, for per-line result counts
    fn line(&self) -> Option<u8> {
        None
    }
}

/// Allstar team position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Gk,
    Ld,
    Rd,
    C,
    Lw,
    Rw,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::Gk,
        Position::Ld,
        Position::Rd,
        Position::C,
        Position::Lw,
        Position::Rw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Gk => "gk",
            Position::Ld => "ld",
            Position::Rd => "rd",
            Position::C => "c",
            Position::Lw => "lw",
            Position::Rw => "rw",
        }
    }
}

impl FromStr for Position {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or(())
    }
}

/// Allstar slot: one of three lines times six positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllstarSlot {
    pub line: u8,
    pub position: Position,
}

impl Slot for AllstarSlot {
    fn from_fields(fields: &SlotFields) -> Result<Self, VoteError> {
        let line = fields
            .line
            .ok_or_else(|| VoteError::InvalidSlot("line is required".to_string()))?;
        if !(1..=3).contains(&line) {
            return Err(VoteError::InvalidSlot(format!(
                "line must be 1, 2 or 3 (got {})",
                line
            )));
        }

        let raw = fields
            .position
            .as_deref()
            .ok_or_else(|| VoteError::InvalidSlot("position is required".to_string()))?;
        let position = raw
            .parse::<Position>()
            .map_err(|_| VoteError::InvalidSlot(format!("unknown position '{}'", raw)))?;

        Ok(Self {
            line: line as u8,
            position,
        })
    }

    fn key(&self) -> String {
        format!("{}:{}", self.line, self.position.as_str())
    }

    fn parse_key(key: &str) -> Option<Self> {
        let (line, position) = key.split_once(':')?;
        let line: u8 = line.parse().ok()?;
        if !(1..=3).contains(&line) {
            return None;
        }
        Some(Self {
            line,
            position: position.parse().ok()?,
        })
    }

    fn points(&self) -> i64 {
        match self.line {
            1 => 3,
            2 => 2,
            _ => 1,
        }
    }

    fn label(&self) -> String {
        format!("line {} / {}", self.line, self.position.as_str())
    }

    fn line(&self) -> Option<u8> {
        Some(self.line)
    }
}

/// MVP ranking slot, 1 (best) through 10
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MvpRank {
    pub rank: u8,
}

impl MvpRank {
    pub const MAX: u8 = 10;
}

impl Slot for MvpRank {
    fn from_fields(fields: &SlotFields) -> Result<Self, VoteError> {
        let rank = fields
            .rank
            .ok_or_else(|| VoteError::InvalidSlot("rank is required".to_string()))?;
        if !(1..=i64::from(Self::MAX)).contains(&rank) {
            return Err(VoteError::InvalidSlot(format!(
                "rank must be between 1 and {} (got {})",
                Self::MAX,
                rank
            )));
        }
        Ok(Self { rank: rank as u8 })
    }

    fn key(&self) -> String {
        self.rank.to_string()
    }

    fn parse_key(key: &str) -> Option<Self> {
        let rank: u8 = key.parse().ok()?;
        (1..=Self::MAX).contains(&rank).then_some(Self { rank })
    }

    fn points(&self) -> i64 {
        i64::from(Self::MAX) + 1 - i64::from(self.rank)
    }

    fn label(&self) -> String {
        format!("rank {}", self.rank)
    }
}

/// The only slot of a one-choice category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Single {}

const SINGLE_KEY: &str = "-";

impl Slot for Single {
    fn from_fields(_fields: &SlotFields) -> Result<Self, VoteError> {
        Ok(Single {})
    }

    fn key(&self) -> String {
        SINGLE_KEY.to_string()
    }

    fn parse_key(key: &str) -> Option<Self> {
        (key == SINGLE_KEY).then_some(Single {})
    }

    fn points(&self) -> i64 {
        1
    }

    fn label(&self) -> String {
        "the single choice".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allstar(line: i64, position: &str) -> Result<AllstarSlot, VoteError> {
        AllstarSlot::from_fields(&SlotFields {
            line: Some(line),
            position: Some(position.to_string()),
            rank: None,
        })
    }

    fn mvp(rank: i64) -> Result<MvpRank, VoteError> {
        MvpRank::from_fields(&SlotFields {
            rank: Some(rank),
            ..Default::default()
        })
    }

    #[test]
    fn test_allstar_points_by_line() {
        assert_eq!(allstar(1, "gk").unwrap().points(), 3);
        assert_eq!(allstar(2, "c").unwrap().points(), 2);
        assert_eq!(allstar(3, "rw").unwrap().points(), 1);
    }

    #[test]
    fn test_allstar_domain() {
        assert!(matches!(allstar(0, "gk"), Err(VoteError::InvalidSlot(_))));
        assert!(matches!(allstar(4, "gk"), Err(VoteError::InvalidSlot(_))));
        assert!(matches!(allstar(1, "st"), Err(VoteError::InvalidSlot(_))));
        assert!(matches!(allstar(1, "GK"), Err(VoteError::InvalidSlot(_))));
        assert!(matches!(
            AllstarSlot::from_fields(&SlotFields::default()),
            Err(VoteError::InvalidSlot(_))
        ));
        for p in Position::ALL {
            assert!(allstar(2, p.as_str()).is_ok());
        }
    }

    #[test]
    fn test_allstar_key() {
        let slot = allstar(2, "lw").unwrap();
        assert_eq!(slot.key(), "2:lw");
        assert_eq!(AllstarSlot::parse_key("2:lw"), Some(slot));
        assert_eq!(AllstarSlot::parse_key("7:lw"), None);
        assert_eq!(AllstarSlot::parse_key("2-lw"), None);
    }

    #[test]
    fn test_mvp_points() {
        assert_eq!(mvp(1).unwrap().points(), 10);
        assert_eq!(mvp(2).unwrap().points(), 9);
        assert_eq!(mvp(10).unwrap().points(), 1);
    }

    #[test]
    fn test_mvp_domain() {
        assert!(matches!(mvp(0), Err(VoteError::InvalidSlot(_))));
        assert!(matches!(mvp(11), Err(VoteError::InvalidSlot(_))));
        assert!(matches!(mvp(-3), Err(VoteError::InvalidSlot(_))));
        assert_eq!(MvpRank::parse_key("10"), Some(MvpRank { rank: 10 }));
        assert_eq!(MvpRank::parse_key("11"), None);
    }

    #[test]
    fn test_single_ignores_fields() {
        let slot = Single::from_fields(&SlotFields {
            line: Some(9),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(slot.points(), 1);
        assert_eq!(Single::parse_key(&slot.key()), Some(Single {}));
    }

    #[test]
    fn test_slots_serialize_flat() {
        let json = serde_json::to_value(allstar(1, "gk").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"line": 1, "position": "gk"}));
        let json = serde_json::to_value(mvp(3).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"rank": 3}));
    }
}
