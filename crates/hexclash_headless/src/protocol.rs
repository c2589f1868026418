//! JSON-line output protocol for headless battles.
//!
//! Every battle event becomes one JSON object per line on stdout. Numbers
//! are decimals so downstream tools never see raw fixed-point bits.
//!
//! # Example Session
//!
//! ```text
//! {"type":"combat_started","match_id":0,"units":[{"id":0,"team":"home",...}]}
//! {"type":"unit_moved","match_id":0,"id":1,"from":[2,4],"to":[2,3]}
//! {"type":"damage_dealt","match_id":0,"source":0,"target":1,"amount":38.5,"absorbed":0.0}
//! {"type":"unit_died","match_id":0,"id":1}
//! {"type":"combat_ended","match_id":0,"result":{"outcome":"victory",...}}
//! ```

use hexclash_core::battle::{CombatResult, EndReason, Outcome};
use hexclash_core::events::{BattleEvent, MatchId, UnitSnapshot};
use hexclash_core::math::to_f64;
use hexclash_core::unit::Team;
use serde::{Deserialize, Serialize};

/// Protocol version reported in the `ready` line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Output Records (Runner -> Consumer)
// ============================================================================

/// One line of headless output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventRecord {
    /// Runner is about to stream a battle.
    Ready {
        version: String,
        scenario: String,
        seed: u64,
    },

    /// Units were placed.
    CombatStarted { match_id: u32, units: Vec<UnitRecord> },

    /// A unit stepped to an adjacent cell.
    UnitMoved {
        match_id: u32,
        id: u32,
        from: (i32, i32),
        to: (i32, i32),
    },

    /// Damage was applied.
    DamageDealt {
        match_id: u32,
        source: u32,
        target: u32,
        amount: f64,
        absorbed: f64,
    },

    /// An ability took effect.
    AbilityCast {
        match_id: u32,
        caster: u32,
        ability: String,
    },

    /// Health was restored.
    UnitHealed { match_id: u32, id: u32, amount: f64 },

    /// A shield was added.
    ShieldGained { match_id: u32, id: u32, amount: f64 },

    /// A status was attached or refreshed.
    StatusApplied {
        match_id: u32,
        id: u32,
        name: String,
    },

    /// A unit came back from death.
    UnitRevived { match_id: u32, id: u32 },

    /// A unit died.
    UnitDied { match_id: u32, id: u32 },

    /// A battle finished.
    CombatEnded { match_id: u32, result: ResultRecord },

    /// Health pools after a round.
    RoundSettled {
        round: u32,
        pools: Vec<PoolRecord>,
    },

    /// State hash for determinism verification.
    StateHash { match_id: u32, tick: u32, hash: u64 },
}

// ============================================================================
// Record Types
// ============================================================================

/// A unit at combat start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: u32,
    pub team: TeamRecord,
    pub name: String,
    pub star: u8,
    pub position: (i32, i32),
    pub health: f64,
    pub shield: f64,
}

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRecord {
    Home,
    Away,
}

/// Battle outcome from the home side's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeRecord {
    Victory,
    Defeat,
    Draw,
}

/// Final result of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub outcome: OutcomeRecord,
    pub end_reason: String,
    pub ticks: u32,
    pub elapsed_seconds: f64,
    pub home_survivors: u32,
    pub away_survivors: u32,
    pub damage_to_loser: u32,
}

/// A side's pool after a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub side: u32,
    pub name: String,
    pub health: u32,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Team> for TeamRecord {
    fn from(team: Team) -> Self {
        match team {
            Team::Home => Self::Home,
            Team::Away => Self::Away,
        }
    }
}

impl From<Outcome> for OutcomeRecord {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Victory => Self::Victory,
            Outcome::Defeat => Self::Defeat,
            Outcome::Draw => Self::Draw,
        }
    }
}

impl From<&CombatResult> for ResultRecord {
    fn from(result: &CombatResult) -> Self {
        Self {
            outcome: result.outcome.into(),
            end_reason: end_reason_name(result.end_reason).to_string(),
            ticks: result.ticks,
            elapsed_seconds: to_f64(result.elapsed),
            home_survivors: result.home_survivors,
            away_survivors: result.away_survivors,
            damage_to_loser: result.damage_to_loser,
        }
    }
}

/// Wire name of an end reason.
pub fn end_reason_name(reason: EndReason) -> &'static str {
    match reason {
        EndReason::Elimination => "elimination",
        EndReason::Forced => "forced",
        EndReason::Timeout => "timeout",
    }
}

impl From<&UnitSnapshot> for UnitRecord {
    fn from(unit: &UnitSnapshot) -> Self {
        Self {
            id: unit.id.0,
            team: unit.team.into(),
            name: unit.name.clone(),
            star: unit.star,
            position: (unit.position.col, unit.position.row),
            health: to_f64(unit.health),
            shield: to_f64(unit.shield),
        }
    }
}

impl EventRecord {
    /// Create a ready line.
    pub fn ready(scenario: &str, seed: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            scenario: scenario.to_string(),
            seed,
        }
    }

    /// Convert a core event from `match_id`.
    pub fn from_event(match_id: MatchId, event: &BattleEvent) -> Self {
        let match_id = match_id.0;
        match event {
            BattleEvent::CombatStarted { units } => Self::CombatStarted {
                match_id,
                units: units.iter().map(UnitRecord::from).collect(),
            },
            BattleEvent::UnitMoved { id, from, to } => Self::UnitMoved {
                match_id,
                id: id.0,
                from: (from.col, from.row),
                to: (to.col, to.row),
            },
            BattleEvent::DamageDealt {
                source,
                target,
                amount,
                absorbed,
            } => Self::DamageDealt {
                match_id,
                source: source.0,
                target: target.0,
                amount: to_f64(*amount),
                absorbed: to_f64(*absorbed),
            },
            BattleEvent::AbilityCast { caster, ability } => Self::AbilityCast {
                match_id,
                caster: caster.0,
                ability: ability.clone(),
            },
            BattleEvent::UnitHealed { id, amount } => Self::UnitHealed {
                match_id,
                id: id.0,
                amount: to_f64(*amount),
            },
            BattleEvent::ShieldGained { id, amount } => Self::ShieldGained {
                match_id,
                id: id.0,
                amount: to_f64(*amount),
            },
            BattleEvent::StatusApplied { id, name } => Self::StatusApplied {
                match_id,
                id: id.0,
                name: name.clone(),
            },
            BattleEvent::UnitRevived { id } => Self::UnitRevived { match_id, id: id.0 },
            BattleEvent::UnitDied { id } => Self::UnitDied { match_id, id: id.0 },
            BattleEvent::CombatEnded { result } => Self::CombatEnded {
                match_id,
                result: result.into(),
            },
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }

    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
