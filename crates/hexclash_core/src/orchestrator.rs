//! Multi-match orchestration.
//!
//! The orchestrator owns one [`Battle`] per matchup of a round and steps
//! them sequentially from a single `advance` call. It never reaches into
//! a battle's internals: it starts battles, feeds them time and reacts to
//! their results.
//!
//! A round may also include one or more matches simulated elsewhere (the
//! "home player" board on a client, say). Those are reported through
//! [`MatchOrchestrator::complete_external`] and count towards the
//! all-settled signal like any owned match.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::battle::{Battle, BattlePhase, CombatResult, Outcome};
use crate::config::BattleConfig;
use crate::data::{Crest, Roster};
use crate::error::{BattleError, Result};
use crate::events::{BattleEvent, EventSink, MatchId};
use crate::math::Fixed;

/// Identifies a player or PvE side across rounds.
pub type SideId = u32;

/// Lifecycle notifications from [`MatchOrchestrator::advance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorEvent {
    /// An owned match ended and its result was applied to the pools.
    MatchSettled {
        /// Match.
        match_id: MatchId,
        /// Home side.
        home: SideId,
        /// Away side.
        away: SideId,
        /// Result of the match.
        result: CombatResult,
    },
    /// Every match of the round, external ones included, has settled.
    AllMatchesSettled {
        /// Round number, starting at 1.
        round: u32,
    },
}

/// A pairing and the battle that resolves it.
#[derive(Debug)]
pub struct CombatMatchup {
    /// Match id, unique within the round.
    pub id: MatchId,
    /// Side whose board the fight happens on.
    pub home: SideId,
    /// Visiting side.
    pub away: SideId,
    battle: Battle,
    settled: bool,
}

impl CombatMatchup {
    /// The owned battle.
    #[must_use]
    pub const fn battle(&self) -> &Battle {
        &self.battle
    }

    /// Whether the result has been applied.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.settled
    }
}

#[derive(Debug, Clone)]
struct Side {
    pool: u32,
    roster: Roster,
    crests: Vec<Crest>,
}

/// Runs every matchup of a round and tracks persistent health pools.
pub struct MatchOrchestrator {
    config: BattleConfig,
    seed: u64,
    round: u32,
    sides: BTreeMap<SideId, Side>,
    sinks: BTreeMap<SideId, Box<dyn EventSink>>,
    matchups: Vec<CombatMatchup>,
    external_expected: usize,
    external_settled: usize,
    all_settled_signalled: bool,
}

impl std::fmt::Debug for MatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchOrchestrator")
            .field("seed", &self.seed)
            .field("round", &self.round)
            .field("sides", &self.sides.len())
            .field("sinks", &self.sinks.len())
            .field("matchups", &self.matchups.len())
            .finish_non_exhaustive()
    }
}

impl MatchOrchestrator {
    /// Create an orchestrator with no sides.
    ///
    /// `seed` is the root of every battle seed this orchestrator derives.
    #[must_use]
    pub fn new(config: BattleConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            round: 0,
            sides: BTreeMap::new(),
            sinks: BTreeMap::new(),
            matchups: Vec::new(),
            external_expected: 0,
            external_settled: 0,
            all_settled_signalled: false,
        }
    }

    /// Register a side with a starting health pool.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::DuplicateSide`] if the side already exists.
    pub fn register_side(&mut self, side: SideId, health: u32) -> Result<()> {
        if self.sides.contains_key(&side) {
            return Err(BattleError::DuplicateSide(side));
        }
        self.sides.insert(
            side,
            Side {
                pool: health,
                roster: Roster::new(),
                crests: Vec::new(),
            },
        );
        Ok(())
    }

    /// Replace a side's roster and crests for upcoming rounds.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownSide`] if the side is not registered.
    pub fn set_roster(&mut self, side: SideId, roster: Roster, crests: Vec<Crest>) -> Result<()> {
        let entry = self.sides.get_mut(&side).ok_or(BattleError::UnknownSide(side))?;
        entry.roster = roster;
        entry.crests = crests;
        Ok(())
    }

    /// Route events of matches hosted on `side`'s board to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownSide`] if the side is not registered.
    pub fn register_sink(&mut self, side: SideId, sink: Box<dyn EventSink>) -> Result<()> {
        if !self.sides.contains_key(&side) {
            return Err(BattleError::UnknownSide(side));
        }
        self.sinks.insert(side, sink);
        Ok(())
    }

    /// Remaining health of a side's pool.
    #[must_use]
    pub fn pool(&self, side: SideId) -> Option<u32> {
        self.sides.get(&side).map(|s| s.pool)
    }

    /// Sides with health left, in id order.
    #[must_use]
    pub fn alive_sides(&self) -> Vec<SideId> {
        self.sides
            .iter()
            .filter(|(_, s)| s.pool > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Current round number, zero before the first round.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Matchups of the current round.
    #[must_use]
    pub fn matchups(&self) -> &[CombatMatchup] {
        &self.matchups
    }

    /// Seed used for the battle between `home` and `away` in the current round.
    #[must_use]
    pub fn matchup_seed(&self, home: SideId, away: SideId) -> u64 {
        derive_seed(self.seed, self.round, home, away)
    }

    /// Start one battle per pairing.
    ///
    /// `expect_external` is the number of additional matches that will be
    /// reported through [`Self::complete_external`].
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::RoundInProgress`] if the previous round was
    /// not ended, or [`BattleError::UnknownSide`] for an unregistered side.
    /// Nothing is started on error.
    pub fn begin_round(
        &mut self,
        pairings: &[(SideId, SideId)],
        expect_external: usize,
    ) -> Result<Vec<MatchId>> {
        if !self.matchups.is_empty() || self.external_expected > 0 {
            return Err(BattleError::RoundInProgress);
        }
        for &(home, away) in pairings {
            for side in [home, away] {
                if !self.sides.contains_key(&side) {
                    return Err(BattleError::UnknownSide(side));
                }
            }
        }

        self.round += 1;
        self.external_expected = expect_external;
        self.external_settled = 0;
        self.all_settled_signalled = false;

        let mut ids = Vec::with_capacity(pairings.len());
        for (index, &(home, away)) in pairings.iter().enumerate() {
            let id = MatchId(index as u32);
            let seed = derive_seed(self.seed, self.round, home, away);
            let mut battle = Battle::new(self.config.clone(), seed);

            let home_side = &self.sides[&home];
            let away_side = &self.sides[&away];
            let events = battle.start_combat(
                &home_side.roster,
                &away_side.roster,
                &home_side.crests,
                &away_side.crests,
            )?;
            if let Some(sink) = self.sinks.get_mut(&home) {
                for event in &events {
                    sink.handle(id, event);
                }
            }

            self.matchups.push(CombatMatchup {
                id,
                home,
                away,
                battle,
                settled: false,
            });
            ids.push(id);
        }

        info!(
            round = self.round,
            matches = pairings.len(),
            external = expect_external,
            "Round started"
        );
        Ok(ids)
    }

    /// Advance every unsettled match by `delta` seconds.
    ///
    /// Results are applied as matches end. `AllMatchesSettled` is emitted
    /// at most once per round, after all matches have been stepped.
    pub fn advance(&mut self, delta: Fixed) -> Vec<OrchestratorEvent> {
        let mut out = Vec::new();
        for index in 0..self.matchups.len() {
            if self.matchups[index].settled {
                continue;
            }
            let events = self.matchups[index].battle.advance(delta);
            self.route(index, &events);
            self.settle_if_ended(index, &mut out);
        }
        self.check_all_settled(&mut out);
        out
    }

    /// Report the result of a match simulated outside this orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownSide`] for an unregistered side, or
    /// [`BattleError::NoExternalPending`] if every expected external match
    /// has already been reported.
    pub fn complete_external(
        &mut self,
        home: SideId,
        away: SideId,
        result: &CombatResult,
    ) -> Result<()> {
        for side in [home, away] {
            if !self.sides.contains_key(&side) {
                return Err(BattleError::UnknownSide(side));
            }
        }
        if self.external_settled >= self.external_expected {
            return Err(BattleError::NoExternalPending { home, away });
        }
        self.apply_result(home, away, result);
        self.external_settled += 1;
        debug!(home, away, outcome = ?result.outcome, "External match settled");
        Ok(())
    }

    /// Force-end every running match, applying their results.
    ///
    /// Used when a linked match (such as the external one) finishes and
    /// the round must close. Already-ended matches are unaffected.
    pub fn force_end_all(&mut self) -> Vec<OrchestratorEvent> {
        let mut out = Vec::new();
        for index in 0..self.matchups.len() {
            if self.matchups[index].settled {
                continue;
            }
            if let Some(events) = self.matchups[index].battle.force_end() {
                self.route(index, &events);
            }
            self.settle_if_ended(index, &mut out);
        }
        self.check_all_settled(&mut out);
        out
    }

    /// Discard the round's matchups and return the settled results.
    ///
    /// Matches that never settled are dropped without touching the pools.
    pub fn end_round(&mut self) -> Vec<(MatchId, CombatResult)> {
        let matchups = std::mem::take(&mut self.matchups);
        let pending_external = self.external_expected - self.external_settled;
        if pending_external > 0 {
            warn!(round = self.round, pending = pending_external, "Ending round with external matches pending");
        }
        self.external_expected = 0;
        self.external_settled = 0;

        matchups
            .into_iter()
            .filter_map(|m| {
                if !m.settled {
                    warn!(round = self.round, match_id = m.id.0, "Discarding unsettled match");
                    return None;
                }
                m.battle.result().cloned().map(|r| (m.id, r))
            })
            .collect()
    }

    fn route(&mut self, index: usize, events: &[BattleEvent]) {
        let matchup = &self.matchups[index];
        if let Some(sink) = self.sinks.get_mut(&matchup.home) {
            for event in events {
                sink.handle(matchup.id, event);
            }
        }
    }

    fn settle_if_ended(&mut self, index: usize, out: &mut Vec<OrchestratorEvent>) {
        let matchup = &self.matchups[index];
        if matchup.battle.phase() != BattlePhase::Ended {
            return;
        }
        let Some(result) = matchup.battle.result().cloned() else {
            return;
        };
        let (id, home, away) = (matchup.id, matchup.home, matchup.away);
        self.matchups[index].settled = true;
        self.apply_result(home, away, &result);
        out.push(OrchestratorEvent::MatchSettled {
            match_id: id,
            home,
            away,
            result,
        });
    }

    fn apply_result(&mut self, home: SideId, away: SideId, result: &CombatResult) {
        let damage = result.damage_to_loser;
        let losers: &[SideId] = match result.outcome {
            Outcome::Victory => &[away],
            Outcome::Defeat => &[home],
            Outcome::Draw => &[home, away],
        };
        for loser in losers {
            if let Some(side) = self.sides.get_mut(loser) {
                side.pool = side.pool.saturating_sub(damage);
                debug!(side = loser, damage, pool = side.pool, "Pool damaged");
            }
        }
    }

    fn check_all_settled(&mut self, out: &mut Vec<OrchestratorEvent>) {
        if self.all_settled_signalled || self.round == 0 {
            return;
        }
        let owned_done = self.matchups.iter().all(|m| m.settled);
        if owned_done && self.external_settled >= self.external_expected {
            self.all_settled_signalled = true;
            info!(round = self.round, "All matches settled");
            out.push(OrchestratorEvent::AllMatchesSettled { round: self.round });
        }
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Battle seed for a pairing. Independent of pairing order within a round.
#[must_use]
pub fn derive_seed(root: u64, round: u32, home: SideId, away: SideId) -> u64 {
    let mut state = splitmix64(root ^ u64::from(round));
    state = splitmix64(state ^ u64::from(home));
    splitmix64(state ^ u64::from(away).rotate_left(32))
}
