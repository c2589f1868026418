//! Scenario loading and configuration.
//!
//! Scenarios define a unit library, the sides that fight, and optional
//! battle config overrides for headless runs.

use std::collections::BTreeMap;
use std::path::Path;

use hexclash_core::config::BattleConfig;
use hexclash_core::data::{Crest, Roster, UnitTemplate};
use hexclash_core::hex::HexCoord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A placement names a unit missing from the library.
    #[error("Side '{side}' places unknown unit '{unit}'")]
    UnknownUnit {
        /// Side name.
        side: String,
        /// Missing unit name.
        unit: String,
    },
    /// Not enough sides to stage a battle.
    #[error("Scenario needs at least 2 sides, found {0}")]
    TooFewSides(usize),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Default seed when the CLI does not supply one.
    #[serde(default)]
    pub seed: u64,
    /// Battle tunables. Missing fields take their defaults.
    #[serde(default)]
    pub config: BattleConfig,
    /// Unit templates by name.
    #[serde(default)]
    pub units: BTreeMap<String, UnitTemplate>,
    /// Participating sides. The first two fight single battles.
    pub sides: Vec<SideSetup>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::duel()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check side count and that every placement resolves.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.sides.len() < 2 {
            return Err(ScenarioError::TooFewSides(self.sides.len()));
        }
        for side in &self.sides {
            self.roster(side)?;
        }
        Ok(())
    }

    /// Resolve a side's placements against the unit library.
    pub fn roster(&self, side: &SideSetup) -> Result<Roster, ScenarioError> {
        let mut roster = Roster::new();
        for placement in &side.units {
            let template = self
                .units
                .get(&placement.unit)
                .ok_or_else(|| ScenarioError::UnknownUnit {
                    side: side.name.clone(),
                    unit: placement.unit.clone(),
                })?;
            let (col, row) = placement.position;
            roster.place(HexCoord::new(col, row), template.clone(), placement.star);
        }
        Ok(roster)
    }

    /// Rosters and crests of the first two sides.
    pub fn duel_inputs(&self) -> Result<DuelInputs, ScenarioError> {
        let [home, away, ..] = self.sides.as_slice() else {
            return Err(ScenarioError::TooFewSides(self.sides.len()));
        };
        Ok(DuelInputs {
            home: self.roster(home)?,
            away: self.roster(away)?,
            home_crests: home.crests.clone(),
            away_crests: away.crests.clone(),
        })
    }

    /// A built-in two-side scenario: bruisers against a ranged line.
    #[must_use]
    pub fn duel() -> Self {
        let mut units = BTreeMap::new();
        units.insert(
            "brawler".to_string(),
            UnitTemplate::new("brawler", 600, 50).with_resists(30, 15),
        );
        units.insert(
            "sharpshooter".to_string(),
            UnitTemplate::new("sharpshooter", 420, 65)
                .with_resists(10, 10)
                .with_range(4),
        );
        Self {
            name: "Built-in Duel".to_string(),
            description: "Two brawlers against two sharpshooters".to_string(),
            seed: 0,
            config: BattleConfig::default(),
            units,
            sides: vec![
                SideSetup::new(
                    "home",
                    vec![
                        UnitPlacement::new("brawler", 2, 3, 1),
                        UnitPlacement::new("brawler", 4, 3, 1),
                    ],
                ),
                SideSetup::new(
                    "away",
                    vec![
                        UnitPlacement::new("sharpshooter", 2, 1, 1),
                        UnitPlacement::new("sharpshooter", 4, 1, 1),
                    ],
                ),
            ],
        }
    }
}

/// Ready-to-run inputs for a single battle.
#[derive(Debug, Clone)]
pub struct DuelInputs {
    /// Home roster.
    pub home: Roster,
    /// Away roster.
    pub away: Roster,
    /// Home crests.
    pub home_crests: Vec<Crest>,
    /// Away crests.
    pub away_crests: Vec<Crest>,
}

/// One participant: its placements, crests and health pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideSetup {
    /// Side name, used in logs and round output.
    pub name: String,
    /// Starting health pool for multi-round play.
    #[serde(default = "default_pool")]
    pub health: u32,
    /// Unit placements in side-local coordinates.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Team-wide crests.
    #[serde(default)]
    pub crests: Vec<Crest>,
}

const fn default_pool() -> u32 {
    100
}

impl SideSetup {
    /// Create a side with the default pool and no crests.
    #[must_use]
    pub fn new(name: impl Into<String>, units: Vec<UnitPlacement>) -> Self {
        Self {
            name: name.into(),
            health: default_pool(),
            units,
            crests: Vec::new(),
        }
    }
}

/// Placement of a library unit at battle start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Library unit name.
    pub unit: String,
    /// Side-local (col, row).
    pub position: (i32, i32),
    /// Star level, 1 to 3.
    #[serde(default = "default_star")]
    pub star: u8,
}

const fn default_star() -> u8 {
    1
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(unit: impl Into<String>, col: i32, row: i32, star: u8) -> Self {
        Self {
            unit: unit.into(),
            position: (col, row),
            star,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert_eq!(scenario.sides.len(), 2);
        assert!(scenario.validate().is_ok());
        let inputs = scenario.duel_inputs().unwrap();
        assert_eq!(inputs.home.len(), 2);
        assert_eq!(inputs.away.slots[0].unit.template.range, 4);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                seed: 9,
                config: (max_ticks: 600),
                units: {
                    "grunt": UnitTemplate(name: "grunt", health: 300, attack: 20),
                },
                sides: [
                    SideSetup(name: "a", units: [UnitPlacement(unit: "grunt", position: (0, 3))]),
                    SideSetup(
                        name: "b",
                        health: 40,
                        units: [UnitPlacement(unit: "grunt", position: (1, 3), star: 2)],
                        crests: [Crest(name: "guard", opening_shield: 25)],
                    ),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.seed, 9);
        assert_eq!(scenario.config.max_ticks, 600);
        assert_eq!(scenario.config.tick_rate, BattleConfig::default().tick_rate);
        assert_eq!(scenario.sides[0].health, 100);
        assert_eq!(scenario.sides[1].health, 40);

        let inputs = scenario.duel_inputs().unwrap();
        assert_eq!(inputs.away.slots[0].unit.star, 2);
        assert_eq!(inputs.away_crests.len(), 1);
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let mut scenario = Scenario::duel();
        scenario.sides[1].units.push(UnitPlacement::new("ghost", 0, 0, 1));
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::UnknownUnit { unit, .. }) if unit == "ghost"
        ));
    }

    #[test]
    fn test_single_side_is_rejected() {
        let mut scenario = Scenario::duel();
        scenario.sides.truncate(1);
        assert!(matches!(scenario.validate(), Err(ScenarioError::TooFewSides(1))));
    }

    #[test]
    fn test_bundled_scenarios_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        let duel = Scenario::load(dir.join("duel.ron")).unwrap();
        assert_eq!(duel.sides.len(), 2);
        assert_eq!(duel.duel_inputs().unwrap().away_crests[0].name, "iron");

        let gauntlet = Scenario::load(dir.join("gauntlet.ron")).unwrap();
        assert_eq!(gauntlet.sides.len(), 4);
        assert_eq!(gauntlet.config.max_ticks, 1200);
        assert_eq!(gauntlet.units["vampire"].items.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/nonexistent/scenario.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
