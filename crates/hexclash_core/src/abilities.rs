//! Ability casting and target selection.
//!
//! Casting always empties the caster's mana. If the targeting rule finds
//! nobody (every enemy already dead, say), nothing else happens and no
//! `AbilityCast` event is emitted. Area abilities centre on the caster's
//! basic-attack target instead of consulting a targeting rule.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::battle::{closest_enemy, Battle};
use crate::data::{star_multiplier, AbilityEffect, TargetRule};
use crate::events::BattleEvent;
use crate::hex::distance;
use crate::math::{non_negative, Fixed};
use crate::unit::{CombatUnit, StatusEffect, UnitId};

/// Share of `DamageAndHeal` damage returned to the caster as health.
pub const DRAIN_RATIO: Fixed = Fixed::from_bits(1 << 31); // 0.5

/// Pick a target for `rule` on behalf of `units[caster]`.
///
/// Ties are broken by unit-list order. `RandomEnemy` draws from `rng`.
pub fn select_target(
    units: &[CombatUnit],
    caster: usize,
    rule: TargetRule,
    rng: &mut ChaCha8Rng,
) -> Option<UnitId> {
    let team = units[caster].team;
    let enemies = units.iter().filter(|u| u.is_alive() && u.team != team);

    match rule {
        TargetRule::CurrentTarget => units[caster]
            .target
            .filter(|id| {
                let target = &units[id.index()];
                target.is_alive() && target.team != team
            })
            .or_else(|| closest_enemy(units, caster)),
        TargetRule::LowestHealthEnemy => first_best(enemies, |a, b| {
            a.health_fraction() < b.health_fraction()
        }),
        TargetRule::HighestHealthEnemy => first_best(enemies, |a, b| a.health > b.health),
        TargetRule::LowestHealthAlly => first_best(
            units.iter().filter(|u| u.is_alive() && u.team == team),
            |a, b| a.health_fraction() < b.health_fraction(),
        ),
        TargetRule::Caster => Some(units[caster].id),
        TargetRule::RandomEnemy => {
            let alive: Vec<UnitId> = enemies.map(|u| u.id).collect();
            if alive.is_empty() {
                None
            } else {
                Some(alive[rng.gen_range(0..alive.len())])
            }
        }
    }
}

/// Centre of an area ability: the caster's current target while it is a
/// living enemy, otherwise the caster itself.
///
/// `None` when no enemy is left to hit.
pub fn area_center(units: &[CombatUnit], caster: usize) -> Option<UnitId> {
    let team = units[caster].team;
    if !units.iter().any(|u| u.is_alive() && u.team != team) {
        return None;
    }
    units[caster]
        .target
        .filter(|id| {
            let target = &units[id.index()];
            target.is_alive() && target.team != team
        })
        .or(Some(units[caster].id))
}

/// First unit for which no later unit is strictly `better`.
fn first_best<'a>(
    units: impl Iterator<Item = &'a CombatUnit>,
    better: impl Fn(&CombatUnit, &CombatUnit) -> bool,
) -> Option<UnitId> {
    units
        .fold(None, |best: Option<&CombatUnit>, candidate| match best {
            Some(current) if !better(candidate, current) => Some(current),
            _ => Some(candidate),
        })
        .map(|u| u.id)
}

impl Battle {
    /// Cast `units[caster]`'s ability and empty its mana.
    pub(crate) fn cast_ability(&mut self, caster: usize, events: &mut Vec<BattleEvent>) {
        let Some(ability) = self.units[caster].ability.clone() else {
            return;
        };
        self.units[caster].mana = Fixed::ZERO;

        let target = match ability.effect {
            AbilityEffect::AreaDamage { .. } => area_center(&self.units, caster),
            _ => select_target(&self.units, caster, ability.targeting, &mut self.rng),
        };
        let Some(target) = target else {
            debug!(caster, ability = %ability.name, "Ability found no target");
            return;
        };
        let target = target.index();

        events.push(BattleEvent::AbilityCast {
            caster: UnitId(caster as u32),
            ability: ability.name.clone(),
        });

        let mult = star_multiplier(self.units[caster].star);
        match ability.effect {
            AbilityEffect::Damage { amount } => {
                self.deal_damage(caster, target, amount * mult, ability.category, events);
            }
            AbilityEffect::Heal { amount } => {
                self.heal_unit(target, amount * mult, events);
            }
            AbilityEffect::Shield { amount } => {
                let shield = non_negative(amount * mult);
                self.units[target].shield += shield;
                events.push(BattleEvent::ShieldGained {
                    id: UnitId(target as u32),
                    amount: shield,
                });
            }
            AbilityEffect::AreaDamage { amount, radius } => {
                let center = self.units[target].position;
                let team = self.units[caster].team;
                let victims: Vec<usize> = self
                    .units
                    .iter()
                    .filter(|u| {
                        u.is_alive() && u.team != team && distance(center, u.position) <= radius
                    })
                    .map(|u| u.id.index())
                    .collect();
                for victim in victims {
                    self.deal_damage(caster, victim, amount * mult, ability.category, events);
                }
            }
            AbilityEffect::DamageAndHeal { amount } => {
                let outcome =
                    self.deal_damage(caster, target, amount * mult, ability.category, events);
                self.heal_unit(caster, outcome.total() * DRAIN_RATIO, events);
            }
            AbilityEffect::Buff {
                attack_speed,
                duration,
            } => {
                let ticks = self.config.seconds_to_ticks(duration * mult);
                if ticks > 0 {
                    let status = StatusEffect::attack_speed_buff(
                        ability.name,
                        UnitId(caster as u32),
                        ticks,
                        attack_speed,
                    );
                    self.attach_status(target, status, events);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::BattlePhase;
    use crate::combat::DamageCategory;
    use crate::config::BattleConfig;
    use crate::data::{Ability, Roster, UnitTemplate};
    use crate::hex::HexCoord;
    use rand::SeedableRng;

    fn caster_template(effect: AbilityEffect, rule: TargetRule) -> UnitTemplate {
        UnitTemplate::new("caster", 500, 10)
            .with_mana(10, 0)
            .with_ability(Ability::new("spell", effect).targeting(rule))
    }

    /// Start a battle with no startup delay and the caster first in the
    /// unit list.
    fn started(caster: UnitTemplate, allies: &[(i32, i32, i32)], enemies: &[(i32, i32, i32)]) -> Battle {
        let mut home = Roster::new().with_unit(HexCoord::new(3, 3), caster, 1);
        for &(col, row, health) in allies {
            home.place(HexCoord::new(col, row), UnitTemplate::new("ally", health, 0), 1);
        }
        let mut away = Roster::new();
        for &(col, row, health) in enemies {
            away.place(HexCoord::new(col, row), UnitTemplate::new("enemy", health, 0), 1);
        }
        let mut config = BattleConfig::default();
        config.startup_delay = Fixed::ZERO;
        let mut battle = Battle::new(config, 9);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        battle
    }

    fn cast(battle: &mut Battle) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        battle.units[0].mana = battle.units[0].stats.max_mana;
        battle.cast_ability(0, &mut events);
        events
    }

    #[test]
    fn test_lowest_health_enemy_ties_use_list_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut battle = started(
            UnitTemplate::new("c", 100, 0),
            &[],
            &[(0, 3, 100), (1, 3, 100), (2, 3, 100)],
        );
        battle.units[2].health = Fixed::from_num(50);
        battle.units[3].health = Fixed::from_num(50);
        assert_eq!(
            select_target(&battle.units, 0, TargetRule::LowestHealthEnemy, &mut rng),
            Some(UnitId(2))
        );
        assert_eq!(
            select_target(&battle.units, 0, TargetRule::HighestHealthEnemy, &mut rng),
            Some(UnitId(1))
        );
    }

    #[test]
    fn test_random_enemy_is_seeded() {
        let battle = started(UnitTemplate::new("c", 100, 0), &[], &[(0, 3, 100), (1, 3, 100), (2, 3, 100)]);
        let picks = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..8)
                .map(|_| select_target(&battle.units, 0, TargetRule::RandomEnemy, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(5), picks(5));
        assert!(picks(5).iter().all(|p| p.is_some_and(|id| id.0 >= 1)));
    }

    #[test]
    fn test_no_enemy_means_no_cast() {
        let mut battle = started(
            caster_template(AbilityEffect::Damage { amount: Fixed::from_num(100) }, TargetRule::LowestHealthEnemy),
            &[],
            &[(0, 3, 100)],
        );
        battle.units[1].dead = true;
        let events = cast(&mut battle);
        assert!(events.is_empty());
        assert_eq!(battle.units[0].mana, Fixed::ZERO);
    }

    #[test]
    fn test_heal_targets_lowest_ally() {
        let mut battle = started(
            caster_template(AbilityEffect::Heal { amount: Fixed::from_num(40) }, TargetRule::LowestHealthAlly),
            &[(0, 0, 100)],
            &[(0, 3, 100)],
        );
        battle.units[1].health = Fixed::from_num(30);
        let events = cast(&mut battle);
        assert!(events.contains(&BattleEvent::UnitHealed {
            id: UnitId(1),
            amount: Fixed::from_num(40)
        }));
    }

    #[test]
    fn test_shield_scales_with_star() {
        let template = caster_template(AbilityEffect::Shield { amount: Fixed::from_num(60) }, TargetRule::Caster);
        let mut battle = started(template, &[], &[(0, 3, 100)]);
        battle.units[0].star = 2;
        cast(&mut battle);
        assert_eq!(battle.units[0].shield, Fixed::from_num(90));
    }

    #[test]
    fn test_drain_heals_half_of_damage() {
        let template = caster_template(
            AbilityEffect::DamageAndHeal { amount: Fixed::from_num(80) },
            TargetRule::HighestHealthEnemy,
        );
        let mut battle = started(template, &[], &[(0, 3, 300)]);
        battle.units[0].health = Fixed::from_num(100);
        battle.units[1].shield = Fixed::from_num(30);
        let events = cast(&mut battle);
        assert!(events.contains(&BattleEvent::UnitHealed {
            id: UnitId(0),
            amount: Fixed::from_num(40)
        }));
    }

    #[test]
    fn test_buff_changes_attack_speed_then_expires() {
        let template = caster_template(
            AbilityEffect::Buff {
                attack_speed: Fixed::ONE,
                duration: Fixed::from_num(0.25),
            },
            TargetRule::Caster,
        );
        let mut battle = started(template, &[], &[(0, 3, 100)]);
        let events = cast(&mut battle);
        assert!(events.iter().any(|e| matches!(e, BattleEvent::StatusApplied { id: UnitId(0), .. })));
        assert_eq!(battle.units[0].stats.attack_speed, Fixed::from_num(2));

        battle.advance(Fixed::from_num(0.3));
        assert_eq!(battle.units[0].stats.attack_speed, Fixed::ONE);
        assert!(battle.units[0].statuses.is_empty());
    }

    #[test]
    fn test_area_damage_centres_on_current_target() {
        let template = caster_template(
            AbilityEffect::AreaDamage {
                amount: Fixed::from_num(50),
                radius: 1,
            },
            TargetRule::LowestHealthAlly,
        );
        let mut battle = started(template, &[(6, 0, 100)], &[(0, 3, 300), (6, 3, 300), (5, 3, 300)]);
        battle.units[0].target = Some(UnitId(3));
        let word_pos = battle.rng.get_word_pos();

        let events = cast(&mut battle);
        assert!(events.iter().any(|e| matches!(e, BattleEvent::AbilityCast { .. })));
        assert_eq!(battle.units[2].health, Fixed::from_num(300));
        assert_eq!(battle.units[3].health, Fixed::from_num(250));
        assert_eq!(battle.units[4].health, Fixed::from_num(250));
        assert_eq!(battle.units[1].health, Fixed::from_num(100));
        assert_eq!(battle.rng.get_word_pos(), word_pos);
    }

    #[test]
    fn test_area_damage_without_target_centres_on_caster() {
        let template = caster_template(
            AbilityEffect::AreaDamage {
                amount: Fixed::from_num(50),
                radius: 1,
            },
            TargetRule::RandomEnemy,
        );
        let mut battle = started(template, &[], &[(3, 3, 300), (0, 0, 300)]);
        battle.units[0].target = Some(UnitId(2));
        battle.units[2].dead = true;
        let word_pos = battle.rng.get_word_pos();

        cast(&mut battle);
        assert_eq!(battle.units[1].health, Fixed::from_num(250));
        assert_eq!(battle.units[2].health, Fixed::from_num(300));
        assert_eq!(battle.rng.get_word_pos(), word_pos);
    }

    #[test]
    fn test_magic_ability_uses_resist() {
        let ability = Ability::new("bolt", AbilityEffect::Damage { amount: Fixed::from_num(100) })
            .category(DamageCategory::Magic);
        let template = UnitTemplate::new("mage", 500, 0).with_mana(10, 0).with_ability(ability);
        let mut battle = started(template, &[], &[(0, 3, 500)]);
        battle.units[1].stats.magic_resist = Fixed::from_num(100);
        battle.units[0].target = Some(UnitId(1));
        cast(&mut battle);
        assert_eq!(battle.units[1].health, Fixed::from_num(450));
        assert_eq!(battle.phase(), BattlePhase::Starting);
    }
}
