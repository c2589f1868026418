//! Events emitted by the tick engine, in strict tick order.
//!
//! Collaborators (renderers, network layers, replays) consume these; the
//! core never calls back into them during a tick.

use serde::{Deserialize, Serialize};

use crate::battle::CombatResult;
use crate::hex::HexCoord;
use crate::math::{fixed_serde, Fixed};
use crate::unit::{Team, UnitId};

/// Identifies one matchup inside an orchestrator round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(pub u32);

/// A unit as it stood when combat started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit id.
    pub id: UnitId,
    /// Side.
    pub team: Team,
    /// Template name.
    pub name: String,
    /// Star level.
    pub star: u8,
    /// Board position.
    pub position: HexCoord,
    /// Starting health.
    #[serde(with = "fixed_serde")]
    pub health: Fixed,
    /// Starting shield.
    #[serde(with = "fixed_serde")]
    pub shield: Fixed,
}

/// Something observable that happened during combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEvent {
    /// Units were placed and combat began.
    CombatStarted {
        /// Every unit, in unit-list order.
        units: Vec<UnitSnapshot>,
    },
    /// A unit stepped to an adjacent cell.
    UnitMoved {
        /// Unit.
        id: UnitId,
        /// Previous cell.
        from: HexCoord,
        /// New cell.
        to: HexCoord,
    },
    /// Damage was applied.
    DamageDealt {
        /// Unit credited with the damage.
        source: UnitId,
        /// Unit hit.
        target: UnitId,
        /// Health lost.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
        /// Damage soaked by the shield.
        #[serde(with = "fixed_serde")]
        absorbed: Fixed,
    },
    /// An ability resolved a target and took effect.
    AbilityCast {
        /// Caster.
        caster: UnitId,
        /// Ability name.
        ability: String,
    },
    /// Health was restored.
    UnitHealed {
        /// Unit.
        id: UnitId,
        /// Health restored.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A shield was added.
    ShieldGained {
        /// Unit.
        id: UnitId,
        /// Shield added.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A status effect was attached or refreshed.
    StatusApplied {
        /// Unit.
        id: UnitId,
        /// Status name.
        name: String,
    },
    /// A unit came back from death.
    UnitRevived {
        /// Unit.
        id: UnitId,
    },
    /// A unit died.
    UnitDied {
        /// Unit.
        id: UnitId,
    },
    /// Combat is over.
    CombatEnded {
        /// Final result.
        result: CombatResult,
    },
}

/// Receives events for the matches routed to it.
pub trait EventSink {
    /// Handle one event from `match_id`.
    fn handle(&mut self, match_id: MatchId, event: &BattleEvent);
}

impl EventSink for Vec<(MatchId, BattleEvent)> {
    fn handle(&mut self, match_id: MatchId, event: &BattleEvent) {
        self.push((match_id, event.clone()));
    }
}

/// Lets a caller keep a handle on a sink it hands to an orchestrator.
impl<S: EventSink> EventSink for std::rc::Rc<std::cell::RefCell<S>> {
    fn handle(&mut self, match_id: MatchId, event: &BattleEvent) {
        self.borrow_mut().handle(match_id, event);
    }
}
