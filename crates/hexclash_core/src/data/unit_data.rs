//! Unit templates and star scaling.

use serde::{Deserialize, Serialize};

use super::{Ability, ItemModifier};
use crate::math::{fixed_decimal, Fixed};

/// Highest star level. Higher values are clamped.
pub const MAX_STAR: u8 = 3;

/// Multiplier applied to health, attack and ability magnitudes.
///
/// Star table is `[1, 1.5, 2]`; values outside `1..=3` are clamped.
#[must_use]
pub fn star_multiplier(star: u8) -> Fixed {
    match star.clamp(1, MAX_STAR) {
        1 => Fixed::ONE,
        2 => Fixed::from_num(3) / Fixed::from_num(2),
        _ => Fixed::from_num(2),
    }
}

/// Immutable definition of a unit type.
///
/// # Example RON
///
/// ```ron
/// UnitTemplate(
///     name: "ember_mage",
///     health: 450,
///     attack: 35,
///     armor: 15,
///     magic_resist: 30,
///     attack_speed: 0.7,
///     range: 3,
///     max_mana: 60,
///     ability: Some(Ability(
///         name: "fireball",
///         effect: Damage(amount: 180),
///         category: Magic,
///     )),
///     items: [Burn(total_damage: 30, duration: 3.0)],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Display name.
    pub name: String,

    /// Base maximum health.
    #[serde(with = "fixed_decimal")]
    pub health: Fixed,

    /// Base damage per basic attack.
    #[serde(with = "fixed_decimal")]
    pub attack: Fixed,

    /// Mitigates basic attacks.
    #[serde(default, with = "fixed_decimal")]
    pub armor: Fixed,

    /// Mitigates magic damage.
    #[serde(default, with = "fixed_decimal")]
    pub magic_resist: Fixed,

    /// Basic attacks per second.
    #[serde(default = "default_attack_speed", with = "fixed_decimal")]
    pub attack_speed: Fixed,

    /// Attack range in hexes.
    #[serde(default = "default_range")]
    pub range: u32,

    /// Mana needed to cast. Zero means the unit never casts.
    #[serde(default = "default_max_mana", with = "fixed_decimal")]
    pub max_mana: Fixed,

    /// Mana at combat start.
    #[serde(default, with = "fixed_decimal")]
    pub starting_mana: Fixed,

    /// Ability cast when mana is full.
    #[serde(default)]
    pub ability: Option<Ability>,

    /// Equipped item modifiers.
    #[serde(default)]
    pub items: Vec<ItemModifier>,
}

fn default_attack_speed() -> Fixed {
    Fixed::ONE
}

const fn default_range() -> u32 {
    1
}

fn default_max_mana() -> Fixed {
    Fixed::from_num(100)
}

impl UnitTemplate {
    /// Melee template with the given health and attack and default
    /// everything else.
    #[must_use]
    pub fn new(name: impl Into<String>, health: i32, attack: i32) -> Self {
        Self {
            name: name.into(),
            health: Fixed::from_num(health),
            attack: Fixed::from_num(attack),
            armor: Fixed::ZERO,
            magic_resist: Fixed::ZERO,
            attack_speed: default_attack_speed(),
            range: default_range(),
            max_mana: default_max_mana(),
            starting_mana: Fixed::ZERO,
            ability: None,
            items: Vec::new(),
        }
    }

    /// Parse a template from RON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BattleError::DataParseError`] on malformed input.
    pub fn from_ron(source_name: &str, text: &str) -> crate::Result<Self> {
        super::parse_ron(source_name, text)
    }

    /// Set the attack range.
    #[must_use]
    pub fn with_range(mut self, range: u32) -> Self {
        self.range = range;
        self
    }

    /// Set attacks per second.
    #[must_use]
    pub fn with_attack_speed(mut self, attack_speed: Fixed) -> Self {
        self.attack_speed = attack_speed;
        self
    }

    /// Set armor and magic resist.
    #[must_use]
    pub fn with_resists(mut self, armor: i32, magic_resist: i32) -> Self {
        self.armor = Fixed::from_num(armor);
        self.magic_resist = Fixed::from_num(magic_resist);
        self
    }

    /// Set maximum and starting mana.
    #[must_use]
    pub fn with_mana(mut self, max_mana: i32, starting_mana: i32) -> Self {
        self.max_mana = Fixed::from_num(max_mana);
        self.starting_mana = Fixed::from_num(starting_mana);
        self
    }

    /// Attach an ability.
    #[must_use]
    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.ability = Some(ability);
        self
    }

    /// Equip an item modifier.
    #[must_use]
    pub fn with_item(mut self, item: ItemModifier) -> Self {
        self.items.push(item);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::DamageCategory;
    use crate::data::AbilityEffect;

    #[test]
    fn test_star_table() {
        assert_eq!(star_multiplier(1), Fixed::ONE);
        assert_eq!(star_multiplier(2), Fixed::from_num(1.5));
        assert_eq!(star_multiplier(3), Fixed::from_num(2));
    }

    #[test]
    fn test_star_clamped() {
        assert_eq!(star_multiplier(0), Fixed::ONE);
        assert_eq!(star_multiplier(9), Fixed::from_num(2));
    }

    #[test]
    fn test_parse_minimal_template() {
        let template =
            UnitTemplate::from_ron("inline", r#"(name: "grunt", health: 500, attack: 50)"#)
                .unwrap();
        assert_eq!(template, UnitTemplate::new("grunt", 500, 50));
    }

    #[test]
    fn test_parse_full_template() {
        let text = r#"
            UnitTemplate(
                name: "ember_mage",
                health: 450,
                attack: 35,
                armor: 15,
                magic_resist: 30,
                attack_speed: 0.75,
                range: 3,
                max_mana: 60,
                ability: Some(Ability(
                    name: "fireball",
                    effect: Damage(amount: 180),
                    category: Magic,
                )),
                items: [Burn(total_damage: 30, duration: 3.0)],
            )
        "#;
        let template = UnitTemplate::from_ron("ember_mage.ron", text).unwrap();
        assert_eq!(template.attack_speed, Fixed::from_num(0.75));
        assert_eq!(template.range, 3);
        let ability = template.ability.unwrap();
        assert_eq!(ability.category, DamageCategory::Magic);
        assert_eq!(
            ability.effect,
            AbilityEffect::Damage {
                amount: Fixed::from_num(180)
            }
        );
        assert_eq!(template.items.len(), 1);
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = UnitTemplate::from_ron("broken.ron", "(name: 5)").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }
}
