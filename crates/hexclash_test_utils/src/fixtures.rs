//! Test fixtures and helpers.
//!
//! Unit archetypes, rosters and pre-started battles for consistent
//! testing across crates.

use fixed::types::I32F32;
use hexclash_core::battle::Battle;
use hexclash_core::combat::DamageCategory;
use hexclash_core::config::BattleConfig;
use hexclash_core::data::{
    Ability, AbilityEffect, Crest, ItemModifier, Roster, StatDelta, TargetRule, UnitTemplate,
};
use hexclash_core::hex::HexCoord;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Default config without the startup delay, so the first `advance`
/// runs ticks straight away.
#[must_use]
pub fn instant_config() -> BattleConfig {
    BattleConfig {
        startup_delay: I32F32::ZERO,
        ..BattleConfig::default()
    }
}

/// Sturdy melee unit.
#[must_use]
pub fn knight() -> UnitTemplate {
    UnitTemplate::new("knight", 650, 55)
        .with_resists(35, 20)
        .with_attack_speed(fixed_f(0.7))
        .with_mana(90, 30)
        .with_ability(
            Ability::new("bulwark", AbilityEffect::Shield { amount: fixed(150) })
                .targeting(TargetRule::Caster),
        )
}

/// Ranged physical damage dealer with a burn item.
#[must_use]
pub fn archer() -> UnitTemplate {
    UnitTemplate::new("archer", 450, 60)
        .with_resists(15, 15)
        .with_attack_speed(fixed_f(0.8))
        .with_range(4)
        .with_mana(60, 0)
        .with_ability(
            Ability::new("volley", AbilityEffect::Damage { amount: fixed(180) })
                .targeting(TargetRule::LowestHealthEnemy),
        )
        .with_item(ItemModifier::Burn {
            total_damage: fixed(40),
            duration: fixed(2),
        })
}

/// Ranged caster with an area-damage ability.
#[must_use]
pub fn mage() -> UnitTemplate {
    UnitTemplate::new("mage", 400, 35)
        .with_resists(10, 40)
        .with_attack_speed(fixed_f(0.65))
        .with_range(3)
        .with_mana(70, 20)
        .with_ability(
            Ability::new(
                "fireball",
                AbilityEffect::AreaDamage {
                    amount: fixed(160),
                    radius: 1,
                },
            )
            .category(DamageCategory::Magic),
        )
}

/// Healer that tops up the weakest ally.
#[must_use]
pub fn cleric() -> UnitTemplate {
    UnitTemplate::new("cleric", 480, 30)
        .with_resists(20, 30)
        .with_attack_speed(fixed_f(0.6))
        .with_range(2)
        .with_mana(60, 20)
        .with_ability(
            Ability::new("mend", AbilityEffect::Heal { amount: fixed(200) })
                .targeting(TargetRule::LowestHealthAlly),
        )
}

/// Melee drain unit with life steal and a one-time revive.
#[must_use]
pub fn vampire() -> UnitTemplate {
    UnitTemplate::new("vampire", 550, 50)
        .with_resists(25, 25)
        .with_attack_speed(fixed_f(0.9))
        .with_mana(80, 0)
        .with_ability(
            Ability::new("bite", AbilityEffect::DamageAndHeal { amount: fixed(140) })
                .targeting(TargetRule::RandomEnemy)
                .category(DamageCategory::Magic),
        )
        .with_item(ItemModifier::LifeSteal {
            ratio: fixed_f(0.2),
        })
        .with_item(ItemModifier::Revive {
            health_fraction: fixed_f(0.3),
        })
}

/// Fast melee unit that buffs its own attack speed.
#[must_use]
pub fn berserker() -> UnitTemplate {
    UnitTemplate::new("berserker", 600, 45)
        .with_resists(20, 10)
        .with_mana(50, 0)
        .with_ability(
            Ability::new(
                "frenzy",
                AbilityEffect::Buff {
                    attack_speed: fixed_f(0.5),
                    duration: fixed(3),
                },
            )
            .targeting(TargetRule::Caster),
        )
}

/// Every archetype, in a fixed order.
#[must_use]
pub fn all_archetypes() -> Vec<UnitTemplate> {
    vec![knight(), archer(), mage(), cleric(), vampire(), berserker()]
}

/// A mixed roster using every archetype: melee on the front row
/// (row 3), ranged behind.
#[must_use]
pub fn mixed_roster() -> Roster {
    Roster::new()
        .with_unit(HexCoord::new(2, 3), knight(), 2)
        .with_unit(HexCoord::new(3, 3), vampire(), 1)
        .with_unit(HexCoord::new(4, 3), berserker(), 1)
        .with_unit(HexCoord::new(1, 1), archer(), 1)
        .with_unit(HexCoord::new(3, 0), mage(), 1)
        .with_unit(HexCoord::new(5, 1), cleric(), 1)
}

/// `count` copies of `template` along the front row, left to right.
#[must_use]
pub fn front_line(template: &UnitTemplate, count: i32) -> Roster {
    let mut roster = Roster::new();
    for col in 0..count {
        roster.place(HexCoord::new(col, 3), template.clone(), 1);
    }
    roster
}

/// A crest granting armor and an opening shield.
#[must_use]
pub fn iron_crest() -> Crest {
    Crest::new(
        "iron",
        StatDelta {
            armor: fixed(15),
            ..StatDelta::default()
        },
    )
    .with_opening_shield(fixed(50))
}

/// A started battle between two mixed rosters.
///
/// # Panics
///
/// Never in practice: a fresh battle always accepts `start_combat`.
#[must_use]
pub fn mixed_battle(seed: u64) -> Battle {
    let mut battle = Battle::new(BattleConfig::default(), seed);
    battle
        .start_combat(&mixed_roster(), &mixed_roster(), &[iron_crest()], &[])
        .expect("fresh battle accepts start_combat");
    battle
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexclash_core::battle::BattlePhase;

    #[test]
    fn test_mixed_roster_fits_one_side() {
        let config = BattleConfig::default();
        for slot in &mixed_roster().slots {
            assert!(slot.position.in_bounds(config.board_width, config.side_height));
        }
    }

    #[test]
    fn test_mixed_battle_places_everyone() {
        let battle = mixed_battle(1);
        assert_eq!(battle.units().len(), 12);
        assert_eq!(battle.phase(), BattlePhase::Starting);
    }

    #[test]
    fn test_archetype_templates_parse_back() {
        for template in all_archetypes() {
            let text = ron::to_string(&template).unwrap();
            let parsed: UnitTemplate = ron::from_str(&text).unwrap();
            assert_eq!(parsed, template);
        }
    }
}
