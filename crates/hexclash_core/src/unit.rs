//! Mutable combat state for a single unit.
//!
//! A [`CombatUnit`] is built from a template once at combat start and is
//! owned by exactly one battle. Other units refer to it by [`UnitId`],
//! never by reference, so a target that dies is simply re-validated on
//! next use.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::combat::{DamageCategory, MIN_ATTACK_SPEED};
use crate::data::{star_multiplier, Ability, Crest, ItemModifier, StatDelta, UnitTemplate};
use crate::hex::HexCoord;
use crate::math::{fixed_serde, non_negative, Fixed};

/// Dense index of a unit in its battle's unit list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    /// Position in the unit list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Side of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    /// Placed on the low rows.
    Home,
    /// Placed on the high rows, mirrored.
    Away,
}

impl Team {
    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Home => Self::Away,
            Self::Away => Self::Home,
        }
    }
}

/// Stat snapshot after star scaling, items and crests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Damage per basic attack.
    #[serde(with = "fixed_serde")]
    pub attack: Fixed,
    /// Mitigates basic attacks.
    #[serde(with = "fixed_serde")]
    pub armor: Fixed,
    /// Mitigates magic damage.
    #[serde(with = "fixed_serde")]
    pub magic_resist: Fixed,
    /// Attacks per second, includes active buffs.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
    /// Attack range in hexes, at least 1.
    pub range: u32,
    /// Mana needed to cast.
    #[serde(with = "fixed_serde")]
    pub max_mana: Fixed,
    /// Mana at combat start.
    #[serde(with = "fixed_serde")]
    pub starting_mana: Fixed,
}

impl UnitStats {
    fn scaled(template: &UnitTemplate, star: u8) -> Self {
        let mult = star_multiplier(star);
        Self {
            max_health: template.health * mult,
            attack: template.attack * mult,
            armor: template.armor,
            magic_resist: template.magic_resist,
            attack_speed: template.attack_speed,
            range: template.range,
            max_mana: non_negative(template.max_mana),
            starting_mana: template.starting_mana,
        }
    }

    fn apply(&mut self, delta: &StatDelta) {
        self.max_health += delta.health;
        self.attack += delta.attack;
        self.armor += delta.armor;
        self.magic_resist += delta.magic_resist;
        self.attack_speed += delta.attack_speed;
        self.range = self.range.saturating_add_signed(delta.range);
        self.starting_mana += delta.starting_mana;
    }

    fn normalize(&mut self) {
        self.max_health = self.max_health.max(Fixed::ONE);
        self.attack = non_negative(self.attack);
        self.attack_speed = self.attack_speed.max(MIN_ATTACK_SPEED);
        self.range = self.range.max(1);
        self.starting_mana = non_negative(self.starting_mana).min(self.max_mana);
    }
}

/// A timed effect attached to a unit.
///
/// Durations are counted in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Effect name. Re-applying an effect with the same name refreshes it.
    pub name: String,
    /// Unit that applied it, credited for its damage.
    pub source: UnitId,
    /// Total duration in ticks.
    pub duration: u32,
    /// Ticks left.
    pub remaining: u32,
    /// Damage dealt at each tick.
    #[serde(with = "fixed_serde")]
    pub damage_per_tick: Fixed,
    /// Category of the per-tick damage.
    pub category: DamageCategory,
    /// Health restored at each tick.
    #[serde(with = "fixed_serde")]
    pub heal_per_tick: Fixed,
    /// Attack speed delta applied on attach and reverted on expiry.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
}

impl StatusEffect {
    /// Damage-over-time effect.
    #[must_use]
    pub fn damage_over_time(
        name: impl Into<String>,
        source: UnitId,
        ticks: u32,
        damage_per_tick: Fixed,
        category: DamageCategory,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            duration: ticks,
            remaining: ticks,
            damage_per_tick,
            category,
            heal_per_tick: Fixed::ZERO,
            attack_speed: Fixed::ZERO,
        }
    }

    /// Attack-speed buff (or debuff, with a negative delta).
    #[must_use]
    pub fn attack_speed_buff(
        name: impl Into<String>,
        source: UnitId,
        ticks: u32,
        attack_speed: Fixed,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            duration: ticks,
            remaining: ticks,
            damage_per_tick: Fixed::ZERO,
            category: DamageCategory::Magic,
            heal_per_tick: Fixed::ZERO,
            attack_speed,
        }
    }
}

/// A unit taking part in combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatUnit {
    /// Index in the battle's unit list.
    pub id: UnitId,
    /// Owning side.
    pub team: Team,
    /// Template name.
    pub name: String,
    /// Star level.
    pub star: u8,
    /// Board position.
    pub position: HexCoord,
    /// Stat snapshot.
    pub stats: UnitStats,
    /// Ability, copied from the template.
    pub ability: Option<Ability>,
    /// Item modifiers, copied from the template.
    pub items: Vec<ItemModifier>,
    /// Current health.
    #[serde(with = "fixed_serde")]
    pub health: Fixed,
    /// Current mana.
    #[serde(with = "fixed_serde")]
    pub mana: Fixed,
    /// Damage absorbed before health.
    #[serde(with = "fixed_serde")]
    pub shield: Fixed,
    /// Ticks until the next basic attack.
    pub attack_cooldown: u32,
    /// Ticks until the next move.
    pub move_cooldown: u32,
    /// Current basic-attack target.
    pub target: Option<UnitId>,
    /// Active timed effects.
    pub statuses: Vec<StatusEffect>,
    /// Set once the unit has had its turn this tick.
    pub acted_this_tick: bool,
    /// Dead units never act and are never targeted.
    pub dead: bool,
    /// Share of max health restored by an unused revive.
    #[serde(with = "optional_fixed")]
    pub revive: Option<Fixed>,
    /// Whether the revive has been used.
    pub revived: bool,
}

impl CombatUnit {
    /// Build a unit from a template.
    ///
    /// The stat snapshot is the template's base stats (health and attack
    /// scaled by star) plus item stat bonuses. Crests are added with
    /// [`CombatUnit::apply_crests`].
    #[must_use]
    pub fn from_template(
        id: UnitId,
        team: Team,
        position: HexCoord,
        template: &UnitTemplate,
        star: u8,
    ) -> Self {
        let mut stats = UnitStats::scaled(template, star);
        let mut revive = None;
        for item in &template.items {
            match item {
                ItemModifier::StatBonus(delta) => stats.apply(delta),
                ItemModifier::Revive { health_fraction } => {
                    revive.get_or_insert(*health_fraction);
                }
                ItemModifier::LifeSteal { .. } | ItemModifier::Burn { .. } => {}
            }
        }
        stats.normalize();

        Self {
            id,
            team,
            name: template.name.clone(),
            star,
            position,
            health: stats.max_health,
            mana: stats.starting_mana,
            stats,
            ability: template.ability.clone(),
            items: template.items.clone(),
            shield: Fixed::ZERO,
            attack_cooldown: 0,
            move_cooldown: 0,
            target: None,
            statuses: Vec::new(),
            acted_this_tick: false,
            dead: false,
            revive,
            revived: false,
        }
    }

    /// Add team-wide crest bonuses and opening shields.
    ///
    /// Health and mana are reset to the new maximum and starting values.
    pub fn apply_crests(&mut self, crests: &[Crest]) {
        for crest in crests {
            self.stats.apply(&crest.bonus);
            self.shield += non_negative(crest.opening_shield);
        }
        self.stats.normalize();
        self.health = self.stats.max_health;
        self.mana = self.stats.starting_mana;
    }

    /// Whether the unit can act and be targeted.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Current health as a share of max health.
    #[must_use]
    pub fn health_fraction(&self) -> Fixed {
        self.health / self.stats.max_health
    }

    /// Add mana, capped at max mana.
    pub fn gain_mana(&mut self, amount: Fixed) {
        self.mana = (self.mana + non_negative(amount)).min(self.stats.max_mana);
    }

    /// Whether the unit has an ability and enough mana to cast it.
    #[must_use]
    pub fn mana_full(&self) -> bool {
        self.ability.is_some() && self.stats.max_mana > Fixed::ZERO && self.mana >= self.stats.max_mana
    }

    /// Restore health, capped at max health. Returns the amount restored.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        let before = self.health;
        self.health = (self.health + non_negative(amount)).min(self.stats.max_health);
        self.health - before
    }

    /// Total life-steal ratio from items.
    #[must_use]
    pub fn life_steal(&self) -> Fixed {
        self.items
            .iter()
            .map(|item| match item {
                ItemModifier::LifeSteal { ratio } => non_negative(*ratio),
                _ => Fixed::ZERO,
            })
            .sum()
    }

    /// Burn items as `(total_damage, duration_seconds)`.
    pub fn burns(&self) -> impl Iterator<Item = (Fixed, Fixed)> + '_ {
        self.items.iter().filter_map(|item| match item {
            ItemModifier::Burn {
                total_damage,
                duration,
            } => Some((*total_damage, *duration)),
            _ => None,
        })
    }

    /// Attach a status, or refresh an existing one with the same name.
    ///
    /// The attack-speed delta of a replaced status is reverted before the
    /// new one is applied.
    pub fn attach_status(&mut self, status: StatusEffect) {
        if let Some(existing) = self.statuses.iter_mut().find(|s| s.name == status.name) {
            self.stats.attack_speed -= existing.attack_speed;
            self.stats.attack_speed += status.attack_speed;
            *existing = status;
        } else {
            self.stats.attack_speed += status.attack_speed;
            self.statuses.push(status);
        }
    }

    /// Count down every status and drop the expired ones, reverting their
    /// attack-speed deltas.
    pub fn expire_statuses(&mut self) {
        let mut reverted = Fixed::ZERO;
        self.statuses.retain_mut(|status| {
            status.remaining = status.remaining.saturating_sub(1);
            if status.remaining == 0 {
                reverted += status.attack_speed;
                false
            } else {
                true
            }
        });
        self.stats.attack_speed -= reverted;
    }

    /// Drop every status, reverting their attack-speed deltas.
    pub fn clear_statuses(&mut self) {
        let reverted: Fixed = self.statuses.iter().map(|s| s.attack_speed).sum();
        self.stats.attack_speed -= reverted;
        self.statuses.clear();
    }

    /// Return from death with the revive's share of max health.
    ///
    /// Returns false when no revive is left.
    pub fn try_revive(&mut self) -> bool {
        let Some(fraction) = self.revive.take() else {
            return false;
        };
        let restored = (self.stats.max_health * non_negative(fraction)).max(Fixed::ONE);
        self.health = restored.min(self.stats.max_health);
        self.revived = true;
        self.clear_statuses();
        self.target = None;
        true
    }

    /// Clamp counters that drifted out of their valid ranges.
    ///
    /// Returns true when anything had to be corrected.
    pub fn clamp_invariants(&mut self) -> bool {
        let mut corrected = false;
        if self.health > self.stats.max_health {
            warn!(unit = self.id.0, health = %self.health, max = %self.stats.max_health, "Health above max, clamping");
            self.health = self.stats.max_health;
            corrected = true;
        }
        if self.health < Fixed::ZERO {
            warn!(unit = self.id.0, health = %self.health, "Negative health, clamping");
            self.health = Fixed::ZERO;
            corrected = true;
        }
        if self.shield < Fixed::ZERO {
            warn!(unit = self.id.0, shield = %self.shield, "Negative shield, clamping");
            self.shield = Fixed::ZERO;
            corrected = true;
        }
        corrected
    }
}

/// Serde helper for `Option<Fixed>` as raw bits.
pub(crate) mod optional_fixed {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(Fixed::to_bits).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<i64>::deserialize(deserializer)?.map(Fixed::from_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knight() -> UnitTemplate {
        UnitTemplate::new("knight", 600, 50)
            .with_resists(30, 10)
            .with_mana(80, 20)
    }

    #[test]
    fn test_star_scales_health_and_attack_only() {
        let unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &knight(), 2);
        assert_eq!(unit.stats.max_health, Fixed::from_num(900));
        assert_eq!(unit.stats.attack, Fixed::from_num(75));
        assert_eq!(unit.stats.armor, Fixed::from_num(30));
        assert_eq!(unit.health, Fixed::from_num(900));
        assert_eq!(unit.mana, Fixed::from_num(20));
    }

    #[test]
    fn test_items_then_crests() {
        let template = knight().with_item(ItemModifier::StatBonus(StatDelta {
            health: Fixed::from_num(100),
            range: 2,
            ..StatDelta::default()
        }));
        let mut unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &template, 1);
        assert_eq!(unit.stats.max_health, Fixed::from_num(700));
        assert_eq!(unit.stats.range, 3);

        let crest = Crest::new(
            "iron",
            StatDelta {
                armor: Fixed::from_num(20),
                health: Fixed::from_num(50),
                ..StatDelta::default()
            },
        )
        .with_opening_shield(Fixed::from_num(40));
        unit.apply_crests(&[crest.clone(), crest]);
        assert_eq!(unit.stats.armor, Fixed::from_num(70));
        assert_eq!(unit.health, Fixed::from_num(800));
        assert_eq!(unit.shield, Fixed::from_num(80));
    }

    #[test]
    fn test_stat_floors() {
        let template = UnitTemplate::new("glass", 10, 5)
            .with_attack_speed(Fixed::ZERO)
            .with_item(ItemModifier::StatBonus(StatDelta {
                health: Fixed::from_num(-50),
                attack: Fixed::from_num(-50),
                range: -5,
                ..StatDelta::default()
            }));
        let unit = CombatUnit::from_template(UnitId(0), Team::Away, HexCoord::new(0, 0), &template, 1);
        assert_eq!(unit.stats.max_health, Fixed::ONE);
        assert_eq!(unit.stats.attack, Fixed::ZERO);
        assert_eq!(unit.stats.range, 1);
        assert_eq!(unit.stats.attack_speed, MIN_ATTACK_SPEED);
    }

    #[test]
    fn test_heal_is_capped() {
        let mut unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &knight(), 1);
        unit.health = Fixed::from_num(590);
        assert_eq!(unit.heal(Fixed::from_num(50)), Fixed::from_num(10));
        assert_eq!(unit.health, Fixed::from_num(600));
    }

    #[test]
    fn test_status_refresh_reverts_old_delta() {
        let mut unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &knight(), 1);
        unit.attach_status(StatusEffect::attack_speed_buff("frenzy", UnitId(0), 4, Fixed::from_num(0.5)));
        unit.attach_status(StatusEffect::attack_speed_buff("frenzy", UnitId(0), 2, Fixed::from_num(0.25)));
        assert_eq!(unit.stats.attack_speed, Fixed::from_num(1.25));
        assert_eq!(unit.statuses.len(), 1);

        unit.expire_statuses();
        assert_eq!(unit.stats.attack_speed, Fixed::from_num(1.25));
        unit.expire_statuses();
        assert!(unit.statuses.is_empty());
        assert_eq!(unit.stats.attack_speed, Fixed::ONE);
    }

    #[test]
    fn test_revive_is_single_use() {
        let template = knight().with_item(ItemModifier::Revive {
            health_fraction: Fixed::from_num(0.5),
        });
        let mut unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &template, 1);
        unit.health = Fixed::ZERO;
        assert!(unit.try_revive());
        assert_eq!(unit.health, Fixed::from_num(300));
        assert!(unit.revived);
        assert!(!unit.try_revive());
    }

    #[test]
    fn test_revive_drops_buffs() {
        let template = knight().with_item(ItemModifier::Revive {
            health_fraction: Fixed::from_num(0.5),
        });
        let mut unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &template, 1);
        unit.attach_status(StatusEffect::attack_speed_buff("frenzy", UnitId(0), 40, Fixed::ONE));
        unit.attach_status(StatusEffect::damage_over_time(
            "burn",
            UnitId(1),
            10,
            Fixed::from_num(5),
            DamageCategory::Magic,
        ));
        assert_eq!(unit.stats.attack_speed, Fixed::from_num(2));

        unit.health = Fixed::ZERO;
        assert!(unit.try_revive());
        assert!(unit.statuses.is_empty());
        assert_eq!(unit.stats.attack_speed, Fixed::ONE);
    }

    #[test]
    fn test_clamp_invariants() {
        let mut unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &knight(), 1);
        assert!(!unit.clamp_invariants());
        unit.health = Fixed::from_num(9000);
        unit.shield = Fixed::from_num(-3);
        assert!(unit.clamp_invariants());
        assert_eq!(unit.health, unit.stats.max_health);
        assert_eq!(unit.shield, Fixed::ZERO);
    }

    #[test]
    fn test_mana_full_requires_ability() {
        let mut unit = CombatUnit::from_template(UnitId(0), Team::Home, HexCoord::new(0, 0), &knight(), 1);
        unit.mana = unit.stats.max_mana;
        assert!(!unit.mana_full());
    }
}
