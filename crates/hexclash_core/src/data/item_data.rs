//! Item modifiers and team-wide crests.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, Fixed};

/// Flat stat deltas granted by items and crests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDelta {
    /// Max health delta.
    #[serde(default, with = "fixed_decimal")]
    pub health: Fixed,
    /// Attack delta.
    #[serde(default, with = "fixed_decimal")]
    pub attack: Fixed,
    /// Armor delta.
    #[serde(default, with = "fixed_decimal")]
    pub armor: Fixed,
    /// Magic resist delta.
    #[serde(default, with = "fixed_decimal")]
    pub magic_resist: Fixed,
    /// Attack speed delta.
    #[serde(default, with = "fixed_decimal")]
    pub attack_speed: Fixed,
    /// Range delta in hexes.
    #[serde(default)]
    pub range: i32,
    /// Starting mana delta.
    #[serde(default, with = "fixed_decimal")]
    pub starting_mana: Fixed,
}

/// Item effects. A closed set; the engine matches on every variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemModifier {
    /// Flat stat bonus applied to the snapshot at combat start.
    StatBonus(StatDelta),
    /// Heal the attacker for a share of basic-attack damage.
    LifeSteal {
        /// Share of post-mitigation damage, shield included.
        #[serde(with = "fixed_decimal")]
        ratio: Fixed,
    },
    /// Basic attacks attach a magic damage-over-time effect.
    Burn {
        /// Damage spread over the whole duration.
        #[serde(with = "fixed_decimal")]
        total_damage: Fixed,
        /// Seconds.
        #[serde(with = "fixed_decimal")]
        duration: Fixed,
    },
    /// Once per combat, return from death with a share of max health.
    Revive {
        /// Share of max health restored.
        #[serde(with = "fixed_decimal")]
        health_fraction: Fixed,
    },
}

/// Team-wide passive bonus applied to every unit of one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crest {
    /// Display name.
    pub name: String,
    /// Stat bonus for every unit.
    #[serde(default)]
    pub bonus: StatDelta,
    /// Shield every unit starts with. Zero for none.
    #[serde(default, with = "fixed_decimal")]
    pub opening_shield: Fixed,
}

impl Crest {
    /// Crest granting only a stat bonus.
    #[must_use]
    pub fn new(name: impl Into<String>, bonus: StatDelta) -> Self {
        Self {
            name: name.into(),
            bonus,
            opening_shield: Fixed::ZERO,
        }
    }

    /// Add an opening shield.
    #[must_use]
    pub fn with_opening_shield(mut self, shield: Fixed) -> Self {
        self.opening_shield = shield;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_ron;

    #[test]
    fn test_parse_items() {
        let items: Vec<ItemModifier> = parse_ron(
            "items",
            "[StatBonus((attack: 15, attack_speed: 0.1)), LifeSteal(ratio: 0.25), Revive(health_fraction: 0.5)]",
        )
        .unwrap();
        assert_eq!(items.len(), 3);
        match &items[0] {
            ItemModifier::StatBonus(delta) => {
                assert_eq!(delta.attack, Fixed::from_num(15));
                assert_eq!(delta.armor, Fixed::ZERO);
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn test_parse_crest_defaults() {
        let crest: Crest = parse_ron("crest", r#"(name: "bulwark", opening_shield: 40)"#).unwrap();
        assert_eq!(crest.bonus, StatDelta::default());
        assert_eq!(crest.opening_shield, Fixed::from_num(40));
    }
}
