//! Rosters: ordered unit placements for one side.

use serde::{Deserialize, Serialize};

use super::UnitTemplate;
use crate::hex::HexCoord;

/// A template at a star level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterUnit {
    /// Unit definition.
    pub template: UnitTemplate,
    /// Star level, `1..=3`.
    #[serde(default = "default_star")]
    pub star: u8,
}

const fn default_star() -> u8 {
    1
}

/// One placed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSlot {
    /// Side-local position, row 0 is the side's back line.
    pub position: HexCoord,
    /// The unit placed there.
    pub unit: RosterUnit,
}

/// Ordered placements for one side.
///
/// Slot order is placement order and fixes unit-list order in the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Placements.
    #[serde(default)]
    pub slots: Vec<RosterSlot>,
}

impl Roster {
    /// An empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a placement.
    #[must_use]
    pub fn with_unit(mut self, position: HexCoord, template: UnitTemplate, star: u8) -> Self {
        self.place(position, template, star);
        self
    }

    /// Append a placement in place.
    pub fn place(&mut self, position: HexCoord, template: UnitTemplate, star: u8) {
        self.slots.push(RosterSlot {
            position,
            unit: RosterUnit { template, star },
        });
    }

    /// Number of placements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the roster has no placements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Parse a roster from RON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BattleError::DataParseError`] on malformed input.
    pub fn from_ron(source_name: &str, text: &str) -> crate::Result<Self> {
        super::parse_ron(source_name, text)
    }
}
