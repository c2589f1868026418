//! Determinism testing utilities.
//!
//! Provides a harness for verifying that battles produce identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! A battle must be reproducible from its seed and rosters alone, so a
//! spectator can verify it. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`hexclash_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Units are always processed in unit-list order.
//!
//! - **Shared randomness**: Each battle owns its seeded RNG.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual formulas and abilities
//! 2. **Property tests**: Random rosters must still produce deterministic outputs
//! 3. **Integration tests**: Full battles are reproducible
//! 4. **Parallel tests**: Running N battles on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use hexclash_core::battle::Battle;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the battle was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel battle runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each battle.
    pub hashes: Vec<u64>,
    /// Number of steps each battle ran.
    pub steps: u64,
    /// Number of battles run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all battles produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all battles matched.
    ///
    /// # Panics
    ///
    /// Panics if battles produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel battles diverged!\n\
                 Battles: {}\n\
                 Steps: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Advance a battle by exactly one tick length.
///
/// During the startup delay this consumes delay time without ticking.
pub fn step_battle(battle: &mut Battle) {
    let tick_length = battle.config().tick_length();
    battle.advance(tick_length);
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `steps` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one step
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use hexclash_test_utils::determinism::{step_battle, verify_determinism};
/// use hexclash_core::battle::Battle;
/// use hexclash_test_utils::fixtures::mixed_battle;
///
/// let result = verify_determinism(3, 200, || mixed_battle(5), step_battle, Battle::state_hash);
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..steps {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Run a battle twice from the same setup and compare final hashes.
pub fn verify_battle_determinism<F>(setup_fn: F, num_steps: u64) -> bool
where
    F: Fn() -> Battle,
{
    verify_determinism(2, num_steps, &setup_fn, step_battle, Battle::state_hash).is_deterministic
}

/// Run N battles on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_battles_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_steps: u64,
) -> ParallelSimResult
where
    F: Fn() -> Battle + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut battle = setup_fn();
                    for _ in 0..num_steps {
                        step_battle(&mut battle);
                    }
                    battle.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        steps: num_steps,
        num_sims,
    }
}

/// Compare two runs step-by-step, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs match, `Some(step)` if they diverge at that step.
pub fn find_first_divergence<F>(setup_fn: F, num_steps: u64) -> Option<u64>
where
    F: Fn() -> Battle,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for step in 1..=num_steps {
        step_battle(&mut a);
        step_battle(&mut b);

        if a.state_hash() != b.state_hash() {
            return Some(step);
        }
    }

    None
}

/// Verify that a snapshot round-trip preserves battle state exactly, and
/// that the restored battle keeps evolving identically.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_steps: u64) -> bool
where
    F: Fn() -> Battle,
{
    let mut battle = setup_fn();
    for _ in 0..num_steps {
        step_battle(&mut battle);
    }

    let Ok(bytes) = battle.serialize() else {
        return false;
    };
    let Ok(mut restored) = Battle::deserialize(&bytes) else {
        return false;
    };
    if battle.state_hash() != restored.state_hash() {
        return false;
    }

    for _ in 0..num_steps {
        step_battle(&mut battle);
        step_battle(&mut restored);
    }
    battle.state_hash() == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible templates and
/// rosters for property-based testing.
pub mod strategies {
    use proptest::prelude::*;

    use hexclash_core::combat::DamageCategory;
    use hexclash_core::data::{
        Ability, AbilityEffect, ItemModifier, Roster, TargetRule, UnitTemplate,
    };
    use hexclash_core::hex::HexCoord;
    use hexclash_core::math::{ratio, Fixed};

    /// Whole-number stat in `[lo, hi]`.
    pub fn arb_stat(lo: i32, hi: i32) -> impl Strategy<Value = Fixed> {
        (lo..=hi).prop_map(Fixed::from_num)
    }

    /// Attack speed between 0.25 and 2.0 in quarter steps.
    pub fn arb_attack_speed() -> impl Strategy<Value = Fixed> {
        (1i32..=8).prop_map(|q| ratio(q, 4))
    }

    /// Damage category.
    pub fn arb_category() -> impl Strategy<Value = DamageCategory> {
        prop_oneof![
            Just(DamageCategory::Physical),
            Just(DamageCategory::Magic),
            Just(DamageCategory::True),
        ]
    }

    /// Targeting rule.
    pub fn arb_target_rule() -> impl Strategy<Value = TargetRule> {
        prop_oneof![
            Just(TargetRule::CurrentTarget),
            Just(TargetRule::LowestHealthEnemy),
            Just(TargetRule::HighestHealthEnemy),
            Just(TargetRule::LowestHealthAlly),
            Just(TargetRule::Caster),
            Just(TargetRule::RandomEnemy),
        ]
    }

    /// Any ability effect with moderate magnitudes.
    pub fn arb_effect() -> impl Strategy<Value = AbilityEffect> {
        prop_oneof![
            arb_stat(10, 300).prop_map(|amount| AbilityEffect::Damage { amount }),
            arb_stat(10, 200).prop_map(|amount| AbilityEffect::Heal { amount }),
            arb_stat(10, 200).prop_map(|amount| AbilityEffect::Shield { amount }),
            (arb_stat(10, 200), 0u32..=2)
                .prop_map(|(amount, radius)| AbilityEffect::AreaDamage { amount, radius }),
            arb_stat(10, 200).prop_map(|amount| AbilityEffect::DamageAndHeal { amount }),
            (arb_attack_speed(), arb_stat(1, 4))
                .prop_map(|(attack_speed, duration)| AbilityEffect::Buff {
                    attack_speed,
                    duration
                }),
        ]
    }

    /// Any ability.
    pub fn arb_ability() -> impl Strategy<Value = Ability> {
        (arb_effect(), arb_target_rule(), arb_category()).prop_map(|(effect, rule, category)| {
            Ability::new("arb", effect).targeting(rule).category(category)
        })
    }

    /// Any item modifier.
    pub fn arb_item() -> impl Strategy<Value = ItemModifier> {
        prop_oneof![
            (1i32..=4).prop_map(|q| ItemModifier::LifeSteal { ratio: ratio(q, 10) }),
            (arb_stat(10, 80), arb_stat(1, 4)).prop_map(|(total_damage, duration)| {
                ItemModifier::Burn {
                    total_damage,
                    duration,
                }
            }),
            (1i32..=9).prop_map(|q| ItemModifier::Revive {
                health_fraction: ratio(q, 10)
            }),
        ]
    }

    /// A unit template that always deals some damage.
    pub fn arb_template() -> impl Strategy<Value = UnitTemplate> {
        (
            arb_stat(100, 1000),
            arb_stat(5, 120),
            (0i32..=150, 0i32..=150),
            arb_attack_speed(),
            1u32..=4,
            (arb_stat(0, 120), arb_stat(0, 50)),
            proptest::option::of(arb_ability()),
            proptest::collection::vec(arb_item(), 0..=2),
        )
            .prop_map(
                |(health, attack, (armor, mr), speed, range, (max_mana, start), ability, items)| {
                    let mut template = UnitTemplate::new("arb", 0, 0)
                        .with_resists(armor, mr)
                        .with_attack_speed(speed)
                        .with_range(range);
                    template.health = health;
                    template.attack = attack;
                    template.max_mana = max_mana;
                    template.starting_mana = start;
                    template.ability = ability;
                    template.items = items;
                    template
                },
            )
    }

    /// A roster of up to `max_units` units on distinct cells of a 7 x 4 side.
    pub fn arb_roster(max_units: usize) -> impl Strategy<Value = Roster> {
        proptest::collection::btree_map((0i32..7, 0i32..4), (arb_template(), 1u8..=3), 1..=max_units)
            .prop_map(|cells| {
                let mut roster = Roster::new();
                for ((col, row), (template, star)) in cells {
                    roster.place(HexCoord::new(col, row), template, star);
                }
                roster
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{front_line, instant_config, knight, mixed_battle};
    use hexclash_core::battle::BattlePhase;
    use hexclash_core::data::Roster;
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.hashes, vec![10, 10, 10]);
    }

    #[test]
    fn test_mixed_battle_is_deterministic() {
        assert!(verify_battle_determinism(|| mixed_battle(17), 600));
    }

    #[test]
    fn test_no_divergence_on_same_seed() {
        assert_eq!(find_first_divergence(|| mixed_battle(3), 300), None);
    }

    #[test]
    fn test_serialization_mid_battle() {
        assert!(verify_serialization_determinism(|| mixed_battle(8), 150));
    }

    #[test]
    fn test_parallel_mixed_battles() {
        run_parallel_battles_scoped(|| mixed_battle(21), 4, 400).assert_deterministic();
    }

    #[test]
    fn test_empty_vs_empty_is_deterministic() {
        let setup = || {
            let mut battle = Battle::new(instant_config(), 1);
            battle
                .start_combat(&Roster::new(), &Roster::new(), &[], &[])
                .unwrap();
            battle
        };
        assert!(verify_battle_determinism(setup, 10));
        assert_eq!(setup().phase(), BattlePhase::Ended);
    }

    #[test]
    fn test_seed_does_not_matter_without_random_draws() {
        let setup = |seed| {
            move || {
                let mut battle = Battle::new(instant_config(), seed);
                let line = front_line(&knight(), 3);
                battle.start_combat(&line, &line, &[], &[]).unwrap();
                battle
            }
        };
        // Knights never draw from the RNG, so the seed cannot matter.
        let health = |b: &Battle| compute_hash(&b.units()[0].health);
        let a = verify_determinism(1, 400, setup(1), step_battle, health);
        let b = verify_determinism(1, 400, setup(2), step_battle, health);
        assert_eq!(a.hashes, b.hashes);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_random_rosters_are_deterministic(
            home in strategies::arb_roster(4),
            away in strategies::arb_roster(4),
            seed in any::<u64>(),
        ) {
            let setup = || {
                let mut battle = Battle::new(instant_config(), seed);
                battle.start_combat(&home, &away, &[], &[]).unwrap();
                battle
            };
            prop_assert!(verify_battle_determinism(setup, 300));
        }
    }
}
