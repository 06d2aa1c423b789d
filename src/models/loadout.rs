//! Weapons, loadouts, and loadout validation.

use crate::models::attributes::AttributeSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a weapon (inventory item).
pub type WeaponId = Uuid;

/// How a weapon is held.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponHands {
    One,
    Two,
    Shield,
}

/// Damage family of a weapon. Informational only; formulas do not branch on it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    #[default]
    Energy,
    Ballistic,
    Melee,
    Shield,
}

/// A weapon equipped in a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub id: WeaponId,
    pub name: String,
    #[serde(default)]
    pub weapon_type: WeaponType,
    pub hands: WeaponHands,
    pub base_damage: f64,
    /// Seconds between attacks before attack-speed scaling.
    pub cooldown: f64,
    /// Attribute bonuses granted while equipped.
    #[serde(default)]
    pub bonuses: AttributeSet,
}

impl Weapon {
    pub fn new(name: impl Into<String>, hands: WeaponHands, base_damage: f64, cooldown: f64) -> Self {
        let weapon_type = match hands {
            WeaponHands::Shield => WeaponType::Shield,
            _ => WeaponType::Energy,
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            weapon_type,
            hands,
            base_damage,
            cooldown,
            bonuses: AttributeSet::default(),
        }
    }

    pub fn with_bonuses(mut self, bonuses: AttributeSet) -> Self {
        self.bonuses = bonuses;
        self
    }
}

/// Which slot a weapon sits in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Main,
    Offhand,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Main => write!(f, "main"),
            Slot::Offhand => write!(f, "offhand"),
        }
    }
}

/// Loadout configuration chosen for the robot.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadoutKind {
    #[default]
    Single,
    TwoHanded,
    DualWield,
    WeaponShield,
}

/// Invalid loadout detected before a battle starts. Never retried: the caller sent a bad robot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigurationError {
    /// A slot the loadout requires is empty.
    MissingWeapon { slot: Slot },
    /// The weapon in a slot is held the wrong way for this loadout.
    WrongHands {
        slot: Slot,
        expected: WeaponHands,
        found: WeaponHands,
    },
    /// The loadout has an off-hand item it has no slot for.
    UnexpectedOffhand,
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::MissingWeapon { slot } => {
                write!(f, "No weapon equipped in {} slot", slot)
            }
            ConfigurationError::WrongHands {
                slot,
                expected,
                found,
            } => write!(
                f,
                "Weapon in {} slot must be {:?}-handed, found {:?}",
                slot, expected, found
            ),
            ConfigurationError::UnexpectedOffhand => {
                write!(f, "Loadout does not allow an offhand item")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Loadout type plus the weapons in its two slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loadout {
    pub kind: LoadoutKind,
    pub main_weapon: Option<Weapon>,
    pub offhand_weapon: Option<Weapon>,
}

impl Loadout {
    pub fn single(main: Weapon) -> Self {
        Self {
            kind: LoadoutKind::Single,
            main_weapon: Some(main),
            offhand_weapon: None,
        }
    }

    pub fn two_handed(main: Weapon) -> Self {
        Self {
            kind: LoadoutKind::TwoHanded,
            main_weapon: Some(main),
            offhand_weapon: None,
        }
    }

    pub fn dual_wield(main: Weapon, offhand: Weapon) -> Self {
        Self {
            kind: LoadoutKind::DualWield,
            main_weapon: Some(main),
            offhand_weapon: Some(offhand),
        }
    }

    pub fn weapon_shield(main: Weapon, shield: Weapon) -> Self {
        Self {
            kind: LoadoutKind::WeaponShield,
            main_weapon: Some(main),
            offhand_weapon: Some(shield),
        }
    }

    /// Check slot occupancy and hand types against the loadout kind.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let main = self
            .main_weapon
            .as_ref()
            .ok_or(ConfigurationError::MissingWeapon { slot: Slot::Main })?;

        let main_hands = match self.kind {
            LoadoutKind::TwoHanded => WeaponHands::Two,
            _ => WeaponHands::One,
        };
        expect_hands(Slot::Main, main_hands, main.hands)?;

        match (self.kind, self.offhand_weapon.as_ref()) {
            (LoadoutKind::Single | LoadoutKind::TwoHanded, None) => Ok(()),
            (LoadoutKind::Single | LoadoutKind::TwoHanded, Some(_)) => {
                Err(ConfigurationError::UnexpectedOffhand)
            }
            (LoadoutKind::DualWield | LoadoutKind::WeaponShield, None) => {
                Err(ConfigurationError::MissingWeapon {
                    slot: Slot::Offhand,
                })
            }
            (LoadoutKind::DualWield, Some(off)) => {
                expect_hands(Slot::Offhand, WeaponHands::One, off.hands)
            }
            (LoadoutKind::WeaponShield, Some(off)) => {
                expect_hands(Slot::Offhand, WeaponHands::Shield, off.hands)
            }
        }
    }

    /// Weapons that attack, in rotation order. Shields never attack.
    pub fn attacking_weapons(&self) -> Vec<&Weapon> {
        self.main_weapon
            .iter()
            .chain(self.offhand_weapon.iter())
            .filter(|w| w.hands != WeaponHands::Shield)
            .collect()
    }

    /// Sum of attribute bonuses of every equipped item.
    pub fn bonus_total(&self) -> AttributeSet {
        self.main_weapon
            .iter()
            .chain(self.offhand_weapon.iter())
            .fold(AttributeSet::default(), |acc, w| acc.plus(&w.bonuses))
    }
}

fn expect_hands(
    slot: Slot,
    expected: WeaponHands,
    found: WeaponHands,
) -> Result<(), ConfigurationError> {
    if expected == found {
        Ok(())
    } else {
        Err(ConfigurationError::WrongHands {
            slot,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blade() -> Weapon {
        Weapon::new("Blade", WeaponHands::One, 15.0, 3.0)
    }

    fn buckler() -> Weapon {
        Weapon::new("Buckler", WeaponHands::Shield, 0.0, 0.0)
    }

    #[test]
    fn dual_wield_needs_both_slots() {
        let mut loadout = Loadout::dual_wield(blade(), blade());
        assert!(loadout.validate().is_ok());
        loadout.offhand_weapon = None;
        assert_eq!(
            loadout.validate(),
            Err(ConfigurationError::MissingWeapon {
                slot: Slot::Offhand
            })
        );
    }

    #[test]
    fn weapon_shield_needs_a_shield_offhand() {
        assert!(Loadout::weapon_shield(blade(), buckler()).validate().is_ok());
        let bad = Loadout::weapon_shield(blade(), blade());
        assert!(matches!(
            bad.validate(),
            Err(ConfigurationError::WrongHands {
                slot: Slot::Offhand,
                expected: WeaponHands::Shield,
                ..
            })
        ));
    }

    #[test]
    fn two_handed_rejects_one_handed_main() {
        let bad = Loadout::two_handed(blade());
        assert!(matches!(
            bad.validate(),
            Err(ConfigurationError::WrongHands { slot: Slot::Main, .. })
        ));
    }

    #[test]
    fn missing_main_weapon_is_rejected() {
        let loadout = Loadout {
            kind: LoadoutKind::Single,
            main_weapon: None,
            offhand_weapon: None,
        };
        assert_eq!(
            loadout.validate(),
            Err(ConfigurationError::MissingWeapon { slot: Slot::Main })
        );
    }

    #[test]
    fn shields_do_not_attack() {
        let loadout = Loadout::weapon_shield(blade(), buckler());
        let attackers = loadout.attacking_weapons();
        assert_eq!(attackers.len(), 1);
        assert_eq!(attackers[0].name, "Blade");
    }
}
