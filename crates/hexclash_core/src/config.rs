//! Battle tuning constants.
//!
//! Every number the tick engine uses that is not part of a unit template
//! lives in [`BattleConfig`]. Scenario files may override any field; the
//! rest fall back to [`BattleConfig::default`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_decimal, ratio, Fixed};

/// Ticks per second for the default configuration.
pub const TICK_RATE: u32 = 20;

/// Duration of one default tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Fixed-point error tolerated when converting seconds to ticks.
const TICK_EPSILON: Fixed = Fixed::from_bits(1 << 12);

/// Tunables for one battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Board width in hexes.
    pub board_width: u32,
    /// Rows per side. The board is twice this tall.
    pub side_height: u32,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Seconds between `start_combat` and the first tick.
    #[serde(with = "fixed_decimal")]
    pub startup_delay: Fixed,
    /// Mana gained by an attacker per basic attack.
    #[serde(with = "fixed_decimal")]
    pub mana_per_attack: Fixed,
    /// Mana gained by a target per damage application.
    #[serde(with = "fixed_decimal")]
    pub mana_per_damage_taken: Fixed,
    /// Multiplies every unit's attack speed.
    #[serde(with = "fixed_decimal")]
    pub attack_speed_multiplier: Fixed,
    /// Seconds a unit waits between moves.
    #[serde(with = "fixed_decimal")]
    pub move_cooldown: Fixed,
    /// Minimum attack cooldown imposed after a move.
    #[serde(with = "fixed_decimal")]
    pub post_move_attack_delay: Fixed,
    /// Damage the loser's pool takes regardless of survivors.
    pub damage_base: u32,
    /// Additional pool damage per surviving winner unit.
    pub damage_per_unit: u32,
    /// Ticks after which the battle ends with a timeout.
    pub max_ticks: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            board_width: 7,
            side_height: 4,
            tick_rate: TICK_RATE,
            startup_delay: ratio(1, 2),
            mana_per_attack: Fixed::from_num(10),
            mana_per_damage_taken: Fixed::from_num(5),
            attack_speed_multiplier: Fixed::ONE,
            move_cooldown: ratio(2, 5),
            post_move_attack_delay: ratio(1, 5),
            damage_base: 2,
            damage_per_unit: 1,
            max_ticks: TICK_RATE * 90,
        }
    }
}

impl BattleConfig {
    /// Seconds per tick.
    #[must_use]
    pub fn tick_length(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Full board height, both sides.
    #[must_use]
    pub const fn total_height(&self) -> u32 {
        self.side_height * 2
    }

    /// Convert a duration in seconds to whole ticks, rounding up.
    ///
    /// Positive durations last at least one tick. A duration within
    /// rounding error of a whole tick count maps to that count, so a 1s
    /// cooldown at 20 ticks per second is exactly 20 ticks.
    #[must_use]
    pub fn seconds_to_ticks(&self, seconds: Fixed) -> u32 {
        if seconds <= Fixed::ZERO {
            return 0;
        }
        let exact = seconds.saturating_mul(Fixed::from_num(self.tick_rate.max(1)));
        let ticks = (exact - TICK_EPSILON).ceil();
        ticks.saturating_to_num::<u32>().max(1)
    }
}
