//! Authored data: unit templates, abilities, items, crests and rosters.
//!
//! Everything in here is immutable once combat starts. Values are written
//! by people in RON with plain decimals and converted to fixed-point at
//! parse time.
//!
//! **Note:** This module contains no IO - it only defines data types and
//! parses strings. File loading is handled by `hexclash_headless`.

mod ability_data;
mod item_data;
mod roster;
mod unit_data;

pub use ability_data::{Ability, AbilityEffect, TargetRule};
pub use item_data::{Crest, ItemModifier, StatDelta};
pub use roster::{Roster, RosterSlot, RosterUnit};
pub use unit_data::{star_multiplier, UnitTemplate, MAX_STAR};

use serde::de::DeserializeOwned;

use crate::error::{BattleError, Result};

/// Parse any authored data type from a RON string.
///
/// `source_name` only labels the error.
pub fn parse_ron<T: DeserializeOwned>(source_name: &str, text: &str) -> Result<T> {
    ron::from_str(text).map_err(|e| BattleError::DataParseError {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
