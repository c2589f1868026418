//! Damage and mitigation formulas.
//!
//! This module implements the stateless half of damage resolution:
//! - Diminishing-returns mitigation: `stat / (stat + 100)`
//! - Shield absorption before health
//! - Attack cooldown from attack speed
//!
//! Armor is applied by the basic-attack path only. The shared damage
//! application ([`apply_damage`]) mitigates `Magic` damage with magic
//! resist and leaves `Physical` untouched, so abilities that deal
//! `Physical` damage bypass armor.

use serde::{Deserialize, Serialize};

use crate::math::{non_negative, Fixed};
use crate::unit::CombatUnit;

/// Mitigation stats above this value are treated as this value.
///
/// Keeps `stat + 100` far from the fixed-point range limit, so the
/// mitigation fraction stays strictly below one.
pub const MITIGATION_STAT_CAP: i32 = 1_000_000;

/// The constant in `stat / (stat + MITIGATION_SCALE)`.
pub const MITIGATION_SCALE: i32 = 100;

/// Attack speed floor, prevents division by zero in cooldowns.
pub const MIN_ATTACK_SPEED: Fixed = Fixed::from_bits(1 << 28); // 0.0625

/// Damage category of an attack, ability or damage-over-time effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DamageCategory {
    /// Basic attacks. Mitigated by armor at attack time only.
    #[default]
    Physical,
    /// Spell damage. Mitigated by magic resist.
    Magic,
    /// Never mitigated. Shields still absorb it.
    True,
}

/// Fraction of incoming damage removed by a mitigation stat.
///
/// `0` yields `0`; large values approach but never reach `1`.
/// Negative stats are treated as `0`.
#[must_use]
pub fn mitigation_fraction(stat: Fixed) -> Fixed {
    let stat = stat.clamp(Fixed::ZERO, Fixed::from_num(MITIGATION_STAT_CAP));
    stat / (stat + Fixed::from_num(MITIGATION_SCALE))
}

/// Reduce `amount` by the mitigation granted by `stat`.
#[must_use]
pub fn mitigate(amount: Fixed, stat: Fixed) -> Fixed {
    non_negative(amount * (Fixed::ONE - mitigation_fraction(stat)))
}

/// Split incoming damage into the part a shield absorbs and the remainder.
///
/// Returns `(absorbed, remaining)`.
#[must_use]
pub fn absorb_with_shield(shield: Fixed, amount: Fixed) -> (Fixed, Fixed) {
    let absorbed = non_negative(shield).min(amount);
    (absorbed, amount - absorbed)
}

/// Seconds between basic attacks.
///
/// `1 / (attack_speed × global_multiplier)`, with the product floored at
/// [`MIN_ATTACK_SPEED`].
#[must_use]
pub fn attack_interval(attack_speed: Fixed, global_multiplier: Fixed) -> Fixed {
    let speed = (attack_speed * global_multiplier).max(MIN_ATTACK_SPEED);
    Fixed::ONE / speed
}

/// What a single application of damage did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageOutcome {
    /// Health actually lost.
    pub dealt: Fixed,
    /// Damage soaked by the shield.
    pub absorbed: Fixed,
    /// Whether this application brought health to zero.
    pub lethal: bool,
}

impl DamageOutcome {
    /// Post-mitigation damage, shield included.
    #[must_use]
    pub fn total(&self) -> Fixed {
        self.dealt + self.absorbed
    }
}

/// Apply damage to a single unit's counters.
///
/// Steps, in order: magic-resist mitigation for `Magic`, shield
/// absorption, health loss floored at zero, mana gain capped at max mana.
/// Death handling and event emission are the engine's job.
pub fn apply_damage(
    target: &mut CombatUnit,
    amount: Fixed,
    category: DamageCategory,
    mana_on_damage: Fixed,
) -> DamageOutcome {
    let amount = match category {
        DamageCategory::Magic => mitigate(amount, target.stats.magic_resist),
        DamageCategory::Physical | DamageCategory::True => non_negative(amount),
    };

    let (absorbed, remaining) = absorb_with_shield(target.shield, amount);
    target.shield -= absorbed;

    let before = target.health;
    target.health = non_negative(target.health - remaining);
    target.gain_mana(mana_on_damage);

    DamageOutcome {
        dealt: before - target.health,
        absorbed,
        lethal: before > Fixed::ZERO && target.health == Fixed::ZERO,
    }
}
