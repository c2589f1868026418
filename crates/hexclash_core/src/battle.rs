//! Single-match tick engine.
//!
//! A [`Battle`] owns every unit of one matchup and advances them in fixed
//! ticks. It moves through four phases:
//!
//! ```text
//! Idle --start_combat--> Starting --startup delay--> Running --win/timeout/force--> Ended
//! ```
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - One seeded [`ChaCha8Rng`] per battle, never shared
//! - Units are processed in unit-list order, fixed by roster placement
//! - Tick boundaries do not depend on how callers slice `advance` calls
//!
//! # Example
//!
//! ```
//! use hexclash_core::prelude::*;
//!
//! let home = Roster::new().with_unit(HexCoord::new(0, 3), UnitTemplate::new("a", 100, 50), 1);
//! let away = Roster::new().with_unit(HexCoord::new(0, 3), UnitTemplate::new("b", 80, 0), 1);
//!
//! let mut battle = Battle::new(BattleConfig::default(), 7);
//! battle.start_combat(&home, &away, &[], &[]).unwrap();
//! while battle.phase() != BattlePhase::Ended {
//!     battle.advance(Fixed::from_num(0.25));
//! }
//! assert_eq!(battle.result().unwrap().outcome, Outcome::Victory);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::combat::{self, attack_interval, mitigate, DamageCategory, DamageOutcome};
use crate::config::BattleConfig;
use crate::data::{Crest, Roster};
use crate::error::{BattleError, Result};
use crate::events::{BattleEvent, UnitSnapshot};
use crate::hex::{distance, find_path, HexCoord};
use crate::math::{fixed_serde, non_negative, Fixed};
use crate::unit::{CombatUnit, StatusEffect, Team, UnitId};

/// Name of the damage-over-time status attached by burn items.
pub const BURN_STATUS: &str = "burn";

/// Lifecycle phase of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattlePhase {
    /// Created, not started.
    Idle,
    /// Startup delay elapsing; no simulation logic runs.
    Starting,
    /// Ticks are being processed.
    Running,
    /// Terminal. A result is available.
    Ended,
}

/// Result from the home side's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Home has more survivors.
    Victory,
    /// Away has more survivors.
    Defeat,
    /// Equal survivors, including a mutual wipe.
    Draw,
}

/// Why combat ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// A side ran out of living units.
    Elimination,
    /// [`Battle::force_end`] was called.
    Forced,
    /// The tick limit was reached.
    Timeout,
}

/// Final result of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatResult {
    /// Outcome for the home side.
    pub outcome: Outcome,
    /// Whether the home side won.
    pub victory: bool,
    /// Why combat ended.
    pub end_reason: EndReason,
    /// Ticks simulated.
    pub ticks: u32,
    /// Simulated running time in seconds, startup delay excluded.
    #[serde(with = "fixed_serde")]
    pub elapsed: Fixed,
    /// Living home units at the end.
    pub home_survivors: u32,
    /// Living away units at the end.
    pub away_survivors: u32,
    /// Damage to the loser's pool. On a draw both pools take it.
    pub damage_to_loser: u32,
}

impl CombatResult {
    /// Survivors of the winning side, zero on a draw.
    #[must_use]
    pub fn winner_survivors(&self) -> u32 {
        match self.outcome {
            Outcome::Victory => self.home_survivors,
            Outcome::Defeat => self.away_survivors,
            Outcome::Draw => 0,
        }
    }
}

/// One matchup's authoritative simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub(crate) config: BattleConfig,
    seed: u64,
    phase: BattlePhase,
    pub(crate) units: Vec<CombatUnit>,
    pub(crate) rng: ChaCha8Rng,
    tick: u32,
    #[serde(with = "fixed_serde")]
    startup_remaining: Fixed,
    #[serde(with = "fixed_serde")]
    accumulator: Fixed,
    #[serde(with = "fixed_serde")]
    elapsed: Fixed,
    result: Option<CombatResult>,
}

impl Battle {
    /// Create an idle battle.
    #[must_use]
    pub fn new(config: BattleConfig, seed: u64) -> Self {
        Self {
            startup_remaining: config.startup_delay,
            config,
            seed,
            phase: BattlePhase::Idle,
            units: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            accumulator: Fixed::ZERO,
            elapsed: Fixed::ZERO,
            result: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BattlePhase {
        self.phase
    }

    /// Ticks processed so far.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    /// Seed the RNG was built from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Tunables in use.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// All units in unit-list order, dead ones included.
    #[must_use]
    pub fn units(&self) -> &[CombatUnit] {
        &self.units
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&CombatUnit> {
        self.units.get(id.index())
    }

    /// Final result once ended.
    #[must_use]
    pub const fn result(&self) -> Option<&CombatResult> {
        self.result.as_ref()
    }

    /// Living units of one side.
    #[must_use]
    pub fn alive_count(&self, team: Team) -> u32 {
        self.units
            .iter()
            .filter(|u| u.team == team && u.is_alive())
            .count() as u32
    }

    /// Place both rosters and begin the startup delay.
    ///
    /// Home units are placed first, then away units with rows mirrored.
    /// Slots outside a side's half or on an occupied cell are dropped.
    /// If either side ends up empty, the battle ends immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidPhase`] unless the battle is idle.
    pub fn start_combat(
        &mut self,
        home: &Roster,
        away: &Roster,
        home_crests: &[Crest],
        away_crests: &[Crest],
    ) -> Result<Vec<BattleEvent>> {
        if self.phase != BattlePhase::Idle {
            return Err(BattleError::InvalidPhase {
                operation: "start_combat",
                phase: self.phase,
            });
        }

        let mut occupied = HashSet::new();
        self.place_side(Team::Home, home, home_crests, &mut occupied);
        self.place_side(Team::Away, away, away_crests, &mut occupied);

        let units = self
            .units
            .iter()
            .map(|u| UnitSnapshot {
                id: u.id,
                team: u.team,
                name: u.name.clone(),
                star: u.star,
                position: u.position,
                health: u.health,
                shield: u.shield,
            })
            .collect();
        let mut events = vec![BattleEvent::CombatStarted { units }];

        self.phase = BattlePhase::Starting;
        self.startup_remaining = non_negative(self.config.startup_delay);

        let home_count = self.alive_count(Team::Home);
        let away_count = self.alive_count(Team::Away);
        info!(seed = self.seed, home = home_count, away = away_count, "Combat started");

        if home_count == 0 || away_count == 0 {
            self.finish(EndReason::Elimination, &mut events);
        }
        Ok(events)
    }

    fn place_side(
        &mut self,
        team: Team,
        roster: &Roster,
        crests: &[Crest],
        occupied: &mut HashSet<HexCoord>,
    ) {
        let width = self.config.board_width;
        let side_height = self.config.side_height;
        for slot in &roster.slots {
            if !slot.position.in_bounds(width, side_height) {
                warn!(?team, position = %slot.position, unit = %slot.unit.template.name, "Dropping out-of-bounds roster slot");
                continue;
            }
            let position = match team {
                Team::Home => slot.position,
                Team::Away => slot.position.mirrored(self.config.total_height()),
            };
            if !occupied.insert(position) {
                warn!(?team, %position, unit = %slot.unit.template.name, "Dropping roster slot on occupied cell");
                continue;
            }

            let id = UnitId(self.units.len() as u32);
            let mut unit =
                CombatUnit::from_template(id, team, position, &slot.unit.template, slot.unit.star);
            unit.apply_crests(crests);
            self.units.push(unit);
        }
    }

    /// Advance the clock by `delta` seconds.
    ///
    /// Startup delay is consumed first, then whole ticks; any remainder is
    /// carried to the next call. Negative deltas and calls outside the
    /// starting or running phases do nothing.
    pub fn advance(&mut self, delta: Fixed) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        if delta <= Fixed::ZERO
            || !matches!(self.phase, BattlePhase::Starting | BattlePhase::Running)
        {
            return events;
        }

        let mut budget = delta;
        if self.phase == BattlePhase::Starting {
            if budget < self.startup_remaining {
                self.startup_remaining -= budget;
                return events;
            }
            budget -= self.startup_remaining;
            self.startup_remaining = Fixed::ZERO;
            self.phase = BattlePhase::Running;
            debug!(seed = self.seed, "Startup delay elapsed");
        }

        self.accumulator = self.accumulator.saturating_add(budget);
        let tick_length = self.config.tick_length();
        while self.phase == BattlePhase::Running && self.accumulator >= tick_length {
            self.accumulator -= tick_length;
            self.step(&mut events);
        }
        events
    }

    /// End a started battle now, judging by survivors.
    ///
    /// Returns `None` if the battle is idle or already ended.
    pub fn force_end(&mut self) -> Option<Vec<BattleEvent>> {
        if !matches!(self.phase, BattlePhase::Starting | BattlePhase::Running) {
            return None;
        }
        let mut events = Vec::new();
        self.finish(EndReason::Forced, &mut events);
        Some(events)
    }

    /// Process exactly one tick.
    fn step(&mut self, events: &mut Vec<BattleEvent>) {
        for unit in &mut self.units {
            unit.acted_this_tick = false;
        }

        if self.alive_count(Team::Home) == 0 || self.alive_count(Team::Away) == 0 {
            self.finish(EndReason::Elimination, events);
            return;
        }

        for index in 0..self.units.len() {
            if self.units[index].dead || self.units[index].acted_this_tick {
                continue;
            }
            self.units[index].acted_this_tick = true;

            self.process_statuses(index, events);
            if self.units[index].dead {
                continue;
            }

            let unit = &mut self.units[index];
            unit.attack_cooldown = unit.attack_cooldown.saturating_sub(1);
            unit.move_cooldown = unit.move_cooldown.saturating_sub(1);

            let Some(target) = self.acquire_target(index) else {
                continue;
            };

            let unit = &self.units[index];
            let in_range = distance(unit.position, self.units[target.index()].position) <= unit.stats.range;
            if in_range {
                if unit.attack_cooldown == 0 {
                    self.perform_attack(index, target.index(), events);
                }
            } else if unit.move_cooldown == 0 {
                self.step_toward(index, target.index(), events);
            }
        }

        self.tick += 1;
        self.elapsed += self.config.tick_length();

        for unit in &mut self.units {
            unit.clamp_invariants();
        }

        #[cfg(any(debug_assertions, feature = "debug-validation"))]
        {
            let hash = self.state_hash();
            debug!(tick = self.tick, state_hash = hash, "Battle state hash");
        }

        if self.tick >= self.config.max_ticks {
            let reason = if self.alive_count(Team::Home) == 0 || self.alive_count(Team::Away) == 0 {
                EndReason::Elimination
            } else {
                EndReason::Timeout
            };
            self.finish(reason, events);
        }
    }

    fn process_statuses(&mut self, index: usize, events: &mut Vec<BattleEvent>) {
        let ticks: Vec<(UnitId, Fixed, DamageCategory, Fixed)> = self.units[index]
            .statuses
            .iter()
            .map(|s| (s.source, s.damage_per_tick, s.category, s.heal_per_tick))
            .collect();

        for (source, damage, category, heal) in ticks {
            if damage > Fixed::ZERO {
                self.deal_damage(source.index(), index, damage, category, events);
                if self.units[index].dead {
                    return;
                }
            }
            if heal > Fixed::ZERO {
                self.heal_unit(index, heal, events);
            }
        }
        self.units[index].expire_statuses();
    }

    /// Keep the current target if it is still a living enemy, otherwise
    /// pick the closest one.
    fn acquire_target(&mut self, index: usize) -> Option<UnitId> {
        let team = self.units[index].team;
        if let Some(current) = self.units[index].target {
            let target = &self.units[current.index()];
            if target.is_alive() && target.team != team {
                return Some(current);
            }
        }
        let target = closest_enemy(&self.units, index);
        self.units[index].target = target;
        target
    }

    fn perform_attack(&mut self, attacker: usize, target: usize, events: &mut Vec<BattleEvent>) {
        let raw = self.units[attacker].stats.attack;
        let amount = mitigate(raw, self.units[target].stats.armor);
        let outcome = self.deal_damage(attacker, target, amount, DamageCategory::Physical, events);

        let interval = attack_interval(
            self.units[attacker].stats.attack_speed,
            self.config.attack_speed_multiplier,
        );
        let cooldown = self.config.seconds_to_ticks(interval);
        let mana_per_attack = self.config.mana_per_attack;
        let unit = &mut self.units[attacker];
        unit.attack_cooldown = cooldown;
        unit.gain_mana(mana_per_attack);
        if unit.mana_full() {
            self.cast_ability(attacker, events);
        }

        self.apply_on_hit(attacker, target, outcome, events);
    }

    fn apply_on_hit(
        &mut self,
        attacker: usize,
        target: usize,
        outcome: DamageOutcome,
        events: &mut Vec<BattleEvent>,
    ) {
        let life_steal = self.units[attacker].life_steal();
        if life_steal > Fixed::ZERO {
            self.heal_unit(attacker, outcome.total() * life_steal, events);
        }

        if self.units[target].dead {
            return;
        }
        let burns: Vec<(Fixed, Fixed)> = self.units[attacker].burns().collect();
        for (total_damage, duration) in burns {
            let ticks = self.config.seconds_to_ticks(duration);
            if ticks == 0 || total_damage <= Fixed::ZERO {
                continue;
            }
            let per_tick = total_damage / Fixed::from_num(ticks);
            let status = StatusEffect::damage_over_time(
                BURN_STATUS,
                UnitId(attacker as u32),
                ticks,
                per_tick,
                DamageCategory::Magic,
            );
            self.attach_status(target, status, events);
        }
    }

    /// Apply damage from `source` to `target`, emitting events and
    /// handling death.
    pub(crate) fn deal_damage(
        &mut self,
        source: usize,
        target: usize,
        amount: Fixed,
        category: DamageCategory,
        events: &mut Vec<BattleEvent>,
    ) -> DamageOutcome {
        if self.units[target].dead {
            return DamageOutcome::default();
        }
        let mana = self.config.mana_per_damage_taken;
        let outcome = combat::apply_damage(&mut self.units[target], amount, category, mana);
        events.push(BattleEvent::DamageDealt {
            source: UnitId(source as u32),
            target: UnitId(target as u32),
            amount: outcome.dealt,
            absorbed: outcome.absorbed,
        });
        if outcome.lethal {
            self.handle_death(target, events);
        }
        outcome
    }

    pub(crate) fn heal_unit(&mut self, index: usize, amount: Fixed, events: &mut Vec<BattleEvent>) {
        if self.units[index].dead {
            return;
        }
        let healed = self.units[index].heal(amount);
        if healed > Fixed::ZERO {
            events.push(BattleEvent::UnitHealed {
                id: UnitId(index as u32),
                amount: healed,
            });
        }
    }

    pub(crate) fn attach_status(
        &mut self,
        index: usize,
        status: StatusEffect,
        events: &mut Vec<BattleEvent>,
    ) {
        let name = status.name.clone();
        self.units[index].attach_status(status);
        events.push(BattleEvent::StatusApplied {
            id: UnitId(index as u32),
            name,
        });
    }

    fn handle_death(&mut self, index: usize, events: &mut Vec<BattleEvent>) {
        let unit = &mut self.units[index];
        if unit.try_revive() {
            debug!(unit = index, "Unit revived");
            events.push(BattleEvent::UnitRevived { id: unit.id });
            return;
        }
        unit.dead = true;
        unit.target = None;
        unit.clear_statuses();
        events.push(BattleEvent::UnitDied { id: unit.id });
    }

    fn step_toward(&mut self, index: usize, target: usize, events: &mut Vec<BattleEvent>) {
        let blocked: HashSet<HexCoord> = self
            .units
            .iter()
            .filter(|u| u.is_alive() && u.id.index() != index)
            .map(|u| u.position)
            .collect();

        let from = self.units[index].position;
        let path = find_path(
            from,
            self.units[target].position,
            &blocked,
            self.config.board_width,
            self.config.total_height(),
        );
        let Some(&to) = path.first() else {
            return;
        };

        let move_cooldown = self.config.seconds_to_ticks(self.config.move_cooldown);
        let attack_delay = self.config.seconds_to_ticks(self.config.post_move_attack_delay);
        let unit = &mut self.units[index];
        unit.position = to;
        unit.move_cooldown = move_cooldown;
        unit.attack_cooldown = unit.attack_cooldown.max(attack_delay);
        events.push(BattleEvent::UnitMoved {
            id: unit.id,
            from,
            to,
        });
    }

    fn finish(&mut self, end_reason: EndReason, events: &mut Vec<BattleEvent>) {
        let home_survivors = self.alive_count(Team::Home);
        let away_survivors = self.alive_count(Team::Away);
        let outcome = match home_survivors.cmp(&away_survivors) {
            std::cmp::Ordering::Greater => Outcome::Victory,
            std::cmp::Ordering::Less => Outcome::Defeat,
            std::cmp::Ordering::Equal => Outcome::Draw,
        };
        let winner_survivors = match outcome {
            Outcome::Victory => home_survivors,
            Outcome::Defeat => away_survivors,
            Outcome::Draw => 0,
        };

        let result = CombatResult {
            outcome,
            victory: outcome == Outcome::Victory,
            end_reason,
            ticks: self.tick,
            elapsed: self.elapsed,
            home_survivors,
            away_survivors,
            damage_to_loser: self
                .config
                .damage_base
                .saturating_add(self.config.damage_per_unit.saturating_mul(winner_survivors)),
        };

        info!(
            seed = self.seed,
            ?outcome,
            ?end_reason,
            ticks = self.tick,
            home = home_survivors,
            away = away_survivors,
            "Combat ended"
        );

        self.phase = BattlePhase::Ended;
        self.result = Some(result.clone());
        events.push(BattleEvent::CombatEnded { result });
    }

    /// Compute a hash of the simulation state for desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.phase.hash(&mut hasher);
        self.accumulator.to_bits().hash(&mut hasher);
        self.rng.get_word_pos().hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for unit in &self.units {
            unit.id.hash(&mut hasher);
            unit.position.hash(&mut hasher);
            unit.health.to_bits().hash(&mut hasher);
            unit.mana.to_bits().hash(&mut hasher);
            unit.shield.to_bits().hash(&mut hasher);
            unit.attack_cooldown.hash(&mut hasher);
            unit.move_cooldown.hash(&mut hasher);
            unit.stats.attack_speed.to_bits().hash(&mut hasher);
            unit.target.hash(&mut hasher);
            unit.dead.hash(&mut hasher);
            unit.revived.hash(&mut hasher);
            for status in &unit.statuses {
                status.name.hash(&mut hasher);
                status.remaining.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize battle state to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| BattleError::Serialization(format!("Failed to serialize battle: {e}")))
    }

    /// Deserialize battle state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| BattleError::Serialization(format!("Failed to deserialize battle: {e}")))
    }
}

/// Closest living enemy of `units[index]` by hex distance, ties broken by
/// unit-list order.
pub(crate) fn closest_enemy(units: &[CombatUnit], index: usize) -> Option<UnitId> {
    let origin = &units[index];
    units
        .iter()
        .filter(|u| u.is_alive() && u.team != origin.team)
        .min_by_key(|u| distance(origin.position, u.position))
        .map(|u| u.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UnitTemplate;

    fn duel(home: UnitTemplate, away: UnitTemplate) -> (Roster, Roster) {
        (
            Roster::new().with_unit(HexCoord::new(0, 3), home, 1),
            Roster::new().with_unit(HexCoord::new(0, 3), away, 1),
        )
    }

    fn run_to_end(battle: &mut Battle) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        for _ in 0..10_000 {
            if battle.phase() == BattlePhase::Ended {
                break;
            }
            events.extend(battle.advance(battle.config().tick_length()));
        }
        events
    }

    #[test]
    fn test_new_battle_is_idle() {
        let battle = Battle::new(BattleConfig::default(), 1);
        assert_eq!(battle.phase(), BattlePhase::Idle);
        assert_eq!(battle.tick(), 0);
        assert!(battle.result().is_none());
    }

    #[test]
    fn test_start_twice_fails() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 10), UnitTemplate::new("b", 100, 10));
        let mut battle = Battle::new(BattleConfig::default(), 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        let err = battle.start_combat(&home, &away, &[], &[]).unwrap_err();
        assert!(matches!(err, BattleError::InvalidPhase { operation: "start_combat", .. }));
    }

    #[test]
    fn test_away_rows_are_mirrored() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 10), UnitTemplate::new("b", 100, 10));
        let mut battle = Battle::new(BattleConfig::default(), 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        assert_eq!(battle.units()[0].position, HexCoord::new(0, 3));
        assert_eq!(battle.units()[1].position, HexCoord::new(0, 4));
    }

    #[test]
    fn test_invalid_slots_are_dropped() {
        let home = Roster::new()
            .with_unit(HexCoord::new(0, 0), UnitTemplate::new("a", 100, 10), 1)
            .with_unit(HexCoord::new(0, 0), UnitTemplate::new("dup", 100, 10), 1)
            .with_unit(HexCoord::new(0, 4), UnitTemplate::new("enemy_half", 100, 10), 1)
            .with_unit(HexCoord::new(-1, 0), UnitTemplate::new("off_board", 100, 10), 1);
        let away = Roster::new().with_unit(HexCoord::new(0, 0), UnitTemplate::new("b", 100, 10), 1);
        let mut battle = Battle::new(BattleConfig::default(), 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        assert_eq!(battle.units().len(), 2);
        assert_eq!(battle.units()[1].id, UnitId(1));
        assert_eq!(battle.units()[1].team, Team::Away);
    }

    #[test]
    fn test_empty_side_ends_immediately() {
        let home = Roster::new().with_unit(HexCoord::new(0, 0), UnitTemplate::new("a", 100, 10), 1);
        let mut battle = Battle::new(BattleConfig::default(), 1);
        let events = battle.start_combat(&home, &Roster::new(), &[], &[]).unwrap();
        assert_eq!(battle.phase(), BattlePhase::Ended);
        let result = battle.result().unwrap();
        assert_eq!(result.outcome, Outcome::Victory);
        assert_eq!(result.damage_to_loser, 3);
        assert!(matches!(events.last(), Some(BattleEvent::CombatEnded { .. })));
    }

    #[test]
    fn test_startup_delay_runs_no_ticks() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 10), UnitTemplate::new("b", 100, 10));
        let mut battle = Battle::new(BattleConfig::default(), 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        assert!(battle.advance(Fixed::from_num(0.25)).is_empty());
        assert_eq!(battle.phase(), BattlePhase::Starting);
        battle.advance(Fixed::from_num(0.25));
        assert_eq!(battle.phase(), BattlePhase::Running);
        assert_eq!(battle.tick(), 0);
    }

    #[test]
    fn test_negative_delta_ignored() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 10), UnitTemplate::new("b", 100, 10));
        let mut battle = Battle::new(BattleConfig::default(), 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        assert!(battle.advance(Fixed::from_num(-5)).is_empty());
        assert_eq!(battle.phase(), BattlePhase::Starting);
    }

    #[test]
    fn test_first_attack_lands_on_first_tick() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 50), UnitTemplate::new("b", 80, 0));
        let mut config = BattleConfig::default();
        config.startup_delay = Fixed::ZERO;
        let mut battle = Battle::new(config, 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        let events = battle.advance(battle.config().tick_length());
        assert!(events.iter().any(|e| matches!(
            e,
            BattleEvent::DamageDealt { source: UnitId(0), target: UnitId(1), .. }
        )));
        assert_eq!(battle.units()[1].health, Fixed::from_num(30));
    }

    #[test]
    fn test_attack_cadence_matches_attack_speed() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 10), UnitTemplate::new("dummy", 100_000, 0));
        let mut config = BattleConfig::default();
        config.startup_delay = Fixed::ZERO;
        let mut battle = Battle::new(config, 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();

        let mut attack_ticks = Vec::new();
        for _ in 0..70 {
            let events = battle.advance(battle.config().tick_length());
            if events
                .iter()
                .any(|e| matches!(e, BattleEvent::DamageDealt { source: UnitId(0), .. }))
            {
                attack_ticks.push(battle.tick());
            }
        }
        assert_eq!(attack_ticks, vec![1, 21, 41, 61]);
    }

    #[test]
    fn test_move_cadence_matches_move_cooldown() {
        let home = Roster::new().with_unit(HexCoord::new(0, 0), UnitTemplate::new("a", 500, 20), 1);
        let away = Roster::new().with_unit(HexCoord::new(0, 0), UnitTemplate::new("b", 500, 20), 1);
        let mut config = BattleConfig::default();
        config.startup_delay = Fixed::ZERO;
        let mut battle = Battle::new(config, 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();

        let mut move_ticks = Vec::new();
        for _ in 0..12 {
            let events = battle.advance(battle.config().tick_length());
            if events
                .iter()
                .any(|e| matches!(e, BattleEvent::UnitMoved { id: UnitId(0), .. }))
            {
                move_ticks.push(battle.tick());
            }
        }
        assert_eq!(move_ticks, vec![1, 9]);
    }

    #[test]
    fn test_units_walk_into_range() {
        let home = Roster::new().with_unit(HexCoord::new(0, 0), UnitTemplate::new("a", 500, 20), 1);
        let away = Roster::new().with_unit(HexCoord::new(0, 0), UnitTemplate::new("b", 500, 20), 1);
        let mut battle = Battle::new(BattleConfig::default(), 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        let events = run_to_end(&mut battle);
        assert!(events.iter().any(|e| matches!(e, BattleEvent::UnitMoved { .. })));
        assert!(events.iter().any(|e| matches!(e, BattleEvent::DamageDealt { .. })));
    }

    #[test]
    fn test_zero_damage_battle_times_out() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 0), UnitTemplate::new("b", 100, 0));
        let mut config = BattleConfig::default();
        config.max_ticks = 50;
        let mut battle = Battle::new(config, 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        run_to_end(&mut battle);
        let result = battle.result().unwrap();
        assert_eq!(result.end_reason, EndReason::Timeout);
        assert_eq!(result.outcome, Outcome::Draw);
        assert_eq!(result.ticks, 50);
        assert_eq!(result.damage_to_loser, 2);
    }

    #[test]
    fn test_force_end_is_idempotent() {
        let (home, away) = duel(UnitTemplate::new("a", 100, 10), UnitTemplate::new("b", 100, 10));
        let mut battle = Battle::new(BattleConfig::default(), 1);
        assert!(battle.force_end().is_none());
        battle.start_combat(&home, &away, &[], &[]).unwrap();

        let events = battle.force_end().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(battle.result().unwrap().end_reason, EndReason::Forced);
        assert_eq!(battle.result().unwrap().outcome, Outcome::Draw);
        assert!(battle.force_end().is_none());
        assert!(battle.advance(Fixed::ONE).is_empty());
    }

    #[test]
    fn test_revive_keeps_unit_in_fight() {
        let phoenix = UnitTemplate::new("phoenix", 50, 0).with_item(crate::data::ItemModifier::Revive {
            health_fraction: Fixed::from_num(0.5),
        });
        let (home, away) = duel(UnitTemplate::new("a", 1000, 60), phoenix);
        let mut battle = Battle::new(BattleConfig::default(), 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        let events = run_to_end(&mut battle);

        let revived = events
            .iter()
            .position(|e| matches!(e, BattleEvent::UnitRevived { id: UnitId(1) }))
            .unwrap();
        let died = events
            .iter()
            .position(|e| matches!(e, BattleEvent::UnitDied { id: UnitId(1) }))
            .unwrap();
        assert!(revived < died);
        assert!(battle.units()[1].revived);
    }

    #[test]
    fn test_burn_ticks_magic_damage() {
        let burner = UnitTemplate::new("burner", 1000, 1).with_item(crate::data::ItemModifier::Burn {
            total_damage: Fixed::from_num(20),
            duration: Fixed::ONE,
        });
        let (home, away) = duel(burner, UnitTemplate::new("b", 1000, 0));
        let mut config = BattleConfig::default();
        config.startup_delay = Fixed::ZERO;
        let mut battle = Battle::new(config, 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        let events = battle.advance(battle.config().tick_length());
        assert!(events
            .iter()
            .any(|e| matches!(e, BattleEvent::StatusApplied { id: UnitId(1), name } if name == BURN_STATUS)));

        let health_before = battle.units()[1].health;
        let events = battle.advance(battle.config().tick_length());
        assert!(events.iter().any(|e| matches!(
            e,
            BattleEvent::DamageDealt { source: UnitId(0), target: UnitId(1), amount, .. } if *amount == Fixed::ONE
        )));
        assert_eq!(battle.units()[1].health, health_before - Fixed::ONE);
    }

    #[test]
    fn test_life_steal_heals_attacker() {
        let vampire = UnitTemplate::new("vampire", 100, 40).with_item(crate::data::ItemModifier::LifeSteal {
            ratio: Fixed::from_num(0.5),
        });
        let (home, away) = duel(vampire, UnitTemplate::new("b", 1000, 0));
        let mut config = BattleConfig::default();
        config.startup_delay = Fixed::ZERO;
        let mut battle = Battle::new(config, 1);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        battle.units[0].health = Fixed::from_num(50);
        let events = battle.advance(battle.config().tick_length());
        assert!(events.iter().any(|e| matches!(
            e,
            BattleEvent::UnitHealed { id: UnitId(0), amount } if *amount == Fixed::from_num(20)
        )));
    }

    #[test]
    fn test_serialization_roundtrip_preserves_hash() {
        let (home, away) = duel(UnitTemplate::new("a", 300, 25), UnitTemplate::new("b", 300, 20));
        let mut battle = Battle::new(BattleConfig::default(), 42);
        battle.start_combat(&home, &away, &[], &[]).unwrap();
        battle.advance(Fixed::from_num(2));

        let bytes = battle.serialize().unwrap();
        let mut restored = Battle::deserialize(&bytes).unwrap();
        assert_eq!(battle.state_hash(), restored.state_hash());

        battle.advance(Fixed::from_num(3));
        restored.advance(Fixed::from_num(3));
        assert_eq!(battle.state_hash(), restored.state_hash());
    }
}
