//! AttributeSet: the 23 numeric combat attributes of a robot, plus derived caps.

use crate::models::loadout::{Loadout, LoadoutKind};
use serde::{Deserialize, Serialize};

/// Snapshot of a robot's combat attributes at battle time.
///
/// Values are expected to be non-negative; level caps are enforced by whoever
/// builds the robot. Formulas clamp anything odd rather than reject it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeSet {
    // Combat systems
    pub combat_power: f64,
    pub targeting_systems: f64,
    pub critical_systems: f64,
    pub penetration: f64,
    pub weapon_control: f64,
    pub attack_speed: f64,
    // Defensive systems
    pub armor_plating: f64,
    pub shield_capacity: f64,
    pub evasion_thrusters: f64,
    pub damage_dampeners: f64,
    pub counter_protocols: f64,
    // Chassis & mobility
    pub hull_integrity: f64,
    pub servo_motors: f64,
    pub gyro_stabilizers: f64,
    pub hydraulic_systems: f64,
    pub power_core: f64,
    // AI processing
    pub combat_algorithms: f64,
    pub threat_analysis: f64,
    pub adaptive_ai: f64,
    pub logic_cores: f64,
    // Team coordination
    pub sync_protocols: f64,
    pub support_systems: f64,
    pub formation_tactics: f64,
}

/// Names of the attributes, in declaration order.
pub const ATTRIBUTE_NAMES: [&str; 23] = [
    "combatPower",
    "targetingSystems",
    "criticalSystems",
    "penetration",
    "weaponControl",
    "attackSpeed",
    "armorPlating",
    "shieldCapacity",
    "evasionThrusters",
    "damageDampeners",
    "counterProtocols",
    "hullIntegrity",
    "servoMotors",
    "gyroStabilizers",
    "hydraulicSystems",
    "powerCore",
    "combatAlgorithms",
    "threatAnalysis",
    "adaptiveAI",
    "logicCores",
    "syncProtocols",
    "supportSystems",
    "formationTactics",
];

impl AttributeSet {
    /// Every attribute set to `value`.
    pub fn uniform(value: f64) -> Self {
        let mut set = Self::default();
        set.map_in_place(|_| value);
        set
    }

    fn fields_mut(&mut self) -> [&mut f64; 23] {
        [
            &mut self.combat_power,
            &mut self.targeting_systems,
            &mut self.critical_systems,
            &mut self.penetration,
            &mut self.weapon_control,
            &mut self.attack_speed,
            &mut self.armor_plating,
            &mut self.shield_capacity,
            &mut self.evasion_thrusters,
            &mut self.damage_dampeners,
            &mut self.counter_protocols,
            &mut self.hull_integrity,
            &mut self.servo_motors,
            &mut self.gyro_stabilizers,
            &mut self.hydraulic_systems,
            &mut self.power_core,
            &mut self.combat_algorithms,
            &mut self.threat_analysis,
            &mut self.adaptive_ai,
            &mut self.logic_cores,
            &mut self.sync_protocols,
            &mut self.support_systems,
            &mut self.formation_tactics,
        ]
    }

    /// Values in the same order as [`ATTRIBUTE_NAMES`].
    pub fn values(&self) -> [f64; 23] {
        let mut copy = *self;
        copy.fields_mut().map(|v| *v)
    }

    fn map_in_place(&mut self, mut f: impl FnMut(usize) -> f64) {
        for (i, field) in self.fields_mut().into_iter().enumerate() {
            *field = f(i);
        }
    }

    /// Field-wise sum (base attributes plus weapon bonuses).
    pub fn plus(&self, other: &AttributeSet) -> AttributeSet {
        let a = self.values();
        let b = other.values();
        let mut out = AttributeSet::default();
        out.map_in_place(|i| a[i] + b[i]);
        out
    }

    /// Combat attributes after weapon bonuses and loadout modifiers:
    /// `floor((base + weapon bonus) * (1 + loadout bonus))`, never negative.
    pub fn effective(&self, loadout: &Loadout) -> AttributeSet {
        let with_weapons = self.plus(&loadout.bonus_total());
        let raw = with_weapons.values();
        let bonuses = loadout.kind.bonus_table();
        let mut out = AttributeSet::default();
        out.map_in_place(|i| {
            let bonus = bonuses
                .iter()
                .find(|(name, _)| *name == ATTRIBUTE_NAMES[i])
                .map(|(_, b)| *b)
                .unwrap_or(0.0);
            (raw[i].max(0.0) * (1.0 + bonus)).floor().max(0.0)
        });
        out
    }

    /// Maximum hull points: hull integrity x 10 (at least 1 so percentages stay defined).
    pub fn max_hp(&self) -> f64 {
        (self.hull_integrity.max(0.0) * 10.0).max(1.0)
    }

    /// Maximum shield points: shield capacity x 2.
    pub fn max_shield(&self) -> f64 {
        self.shield_capacity.max(0.0) * 2.0
    }
}

impl LoadoutKind {
    /// Percentage modifiers applied per attribute for this loadout.
    pub fn bonus_table(self) -> &'static [(&'static str, f64)] {
        match self {
            LoadoutKind::WeaponShield => &[
                ("shieldCapacity", 0.20),
                ("armorPlating", 0.15),
                ("counterProtocols", 0.10),
                ("attackSpeed", -0.15),
            ],
            LoadoutKind::TwoHanded => &[
                ("combatPower", 0.25),
                ("criticalSystems", 0.20),
                ("evasionThrusters", -0.10),
            ],
            LoadoutKind::DualWield => &[
                ("attackSpeed", 0.30),
                ("weaponControl", 0.15),
                ("penetration", -0.20),
                ("combatPower", -0.10),
            ],
            LoadoutKind::Single => &[("gyroStabilizers", 0.10), ("servoMotors", 0.05)],
        }
    }
}
