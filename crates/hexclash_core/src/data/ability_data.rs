//! Ability definitions: a closed set of effect shapes plus a targeting rule.

use serde::{Deserialize, Serialize};

use crate::combat::DamageCategory;
use crate::math::{fixed_decimal, Fixed};

/// An active ability cast when a unit's mana is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    /// Display name, echoed in `AbilityCast` events.
    pub name: String,
    /// What the ability does.
    pub effect: AbilityEffect,
    /// Who the ability picks.
    #[serde(default)]
    pub targeting: TargetRule,
    /// Category of any damage the ability deals.
    #[serde(default)]
    pub category: DamageCategory,
}

impl Ability {
    /// Ability with the default targeting rule and physical damage.
    #[must_use]
    pub fn new(name: impl Into<String>, effect: AbilityEffect) -> Self {
        Self {
            name: name.into(),
            effect,
            targeting: TargetRule::default(),
            category: DamageCategory::default(),
        }
    }

    /// Override the targeting rule.
    #[must_use]
    pub fn targeting(mut self, rule: TargetRule) -> Self {
        self.targeting = rule;
        self
    }

    /// Override the damage category.
    #[must_use]
    pub fn category(mut self, category: DamageCategory) -> Self {
        self.category = category;
        self
    }
}

/// Effect shapes. Magnitudes are scaled by the caster's star multiplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityEffect {
    /// Single-target damage.
    Damage {
        /// Base damage.
        #[serde(with = "fixed_decimal")]
        amount: Fixed,
    },
    /// Restore health, capped at max health.
    Heal {
        /// Base heal.
        #[serde(with = "fixed_decimal")]
        amount: Fixed,
    },
    /// Add an uncapped shield.
    Shield {
        /// Base shield.
        #[serde(with = "fixed_decimal")]
        amount: Fixed,
    },
    /// Damage every alive enemy within `radius` of the caster's current
    /// target, or of the caster when it has none. Ignores `targeting`.
    AreaDamage {
        /// Base damage per enemy hit.
        #[serde(with = "fixed_decimal")]
        amount: Fixed,
        /// Radius in hexes.
        radius: u32,
    },
    /// Damage, then heal the caster for half the damage dealt.
    DamageAndHeal {
        /// Base damage.
        #[serde(with = "fixed_decimal")]
        amount: Fixed,
    },
    /// Timed attack-speed change.
    Buff {
        /// Attack-speed delta while the buff lasts.
        #[serde(with = "fixed_decimal")]
        attack_speed: Fixed,
        /// Base duration in seconds.
        #[serde(with = "fixed_decimal")]
        duration: Fixed,
    },
}

/// How an ability picks its target.
///
/// Ties are broken by unit-list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TargetRule {
    /// The caster's current basic-attack target.
    #[default]
    CurrentTarget,
    /// Enemy with the lowest health fraction.
    LowestHealthEnemy,
    /// Enemy with the highest current health.
    HighestHealthEnemy,
    /// Ally (caster included) with the lowest health fraction.
    LowestHealthAlly,
    /// The caster itself.
    Caster,
    /// A random alive enemy drawn from the battle's RNG.
    RandomEnemy,
}
