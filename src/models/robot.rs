//! Robot record, battle stance, league tiers, and the read-only combat snapshot.

use crate::models::attributes::AttributeSet;
use crate::models::battle::{BattleEnding, BattleResult};
use crate::models::loadout::{ConfigurationError, Loadout};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a robot.
pub type RobotId = Uuid;

/// ELO rating. Whole points, like the leaderboards show them.
pub type Elo = i32;

/// Battle stance: a multiplier profile applied by the combat formulas.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    #[serde(alias = "aggressive")]
    Offensive,
    #[default]
    Balanced,
    Defensive,
}

/// League tiers, lowest first.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LeagueTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Champion,
}

impl LeagueTier {
    pub const ALL: [LeagueTier; 6] = [
        LeagueTier::Bronze,
        LeagueTier::Silver,
        LeagueTier::Gold,
        LeagueTier::Platinum,
        LeagueTier::Diamond,
        LeagueTier::Champion,
    ];

    /// Next tier up, or None at champion.
    pub fn promoted(self) -> Option<LeagueTier> {
        let idx = Self::ALL.iter().position(|t| *t == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Next tier down, or None at bronze.
    pub fn demoted(self) -> Option<LeagueTier> {
        let idx = Self::ALL.iter().position(|t| *t == self)?;
        idx.checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl std::fmt::Display for LeagueTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LeagueTier::Bronze => "bronze",
            LeagueTier::Silver => "silver",
            LeagueTier::Gold => "gold",
            LeagueTier::Platinum => "platinum",
            LeagueTier::Diamond => "diamond",
            LeagueTier::Champion => "champion",
        };
        write!(f, "{}", name)
    }
}

/// A robot as the robot repository stores it: configuration plus running record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Robot {
    pub id: RobotId,
    pub name: String,
    pub attributes: AttributeSet,
    pub loadout: Loadout,
    #[serde(default)]
    pub stance: Stance,
    /// HP percentage at or below which the robot surrenders.
    #[serde(default)]
    pub yield_threshold: f64,
    pub elo: Elo,
    #[serde(default)]
    pub league: LeagueTier,
    #[serde(default)]
    pub league_points: u32,
    /// Battles fought since entering the current tier.
    #[serde(default)]
    pub league_battles: u32,
    pub current_hp: f64,
    pub current_shield: f64,
    #[serde(default)]
    pub stats: CareerStats,
}

/// Lifetime counters updated after every battle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerStats {
    pub total_battles: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub kills: u32,
    pub damage_dealt: f64,
    pub damage_taken: f64,
}

impl Robot {
    /// New robot at full HP/shield in bronze.
    pub fn new(
        name: impl Into<String>,
        attributes: AttributeSet,
        loadout: Loadout,
        elo: Elo,
    ) -> Self {
        let mut robot = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            attributes,
            loadout,
            stance: Stance::Balanced,
            yield_threshold: 0.0,
            elo,
            league: LeagueTier::Bronze,
            league_points: 0,
            league_battles: 0,
            current_hp: 0.0,
            current_shield: 0.0,
            stats: CareerStats::default(),
        };
        robot.repair();
        robot
    }

    /// Combat attributes after weapons and loadout modifiers.
    pub fn effective_attributes(&self) -> AttributeSet {
        self.attributes.effective(&self.loadout)
    }

    pub fn max_hp(&self) -> f64 {
        self.effective_attributes().max_hp()
    }

    pub fn max_shield(&self) -> f64 {
        self.effective_attributes().max_shield()
    }

    /// Restore HP and shield to their caps.
    pub fn repair(&mut self) {
        self.current_hp = self.max_hp();
        self.current_shield = self.max_shield();
    }

    /// Read-only snapshot for the resolver, carrying current HP/shield in.
    pub fn combatant(&self) -> Result<Combatant, ConfigurationError> {
        self.loadout.validate()?;
        let effective = self.effective_attributes();
        let max_hp = effective.max_hp();
        let max_shield = effective.max_shield();
        Ok(Combatant {
            id: self.id,
            name: self.name.clone(),
            attributes: effective,
            loadout: self.loadout.clone(),
            yield_threshold: self.yield_threshold,
            max_hp,
            max_shield,
            hp: self.current_hp.clamp(0.0, max_hp),
            shield: self.current_shield.clamp(0.0, max_shield),
        })
    }

    /// Snapshot at full HP and shield (tournament battles start repaired).
    pub fn fresh_combatant(&self) -> Result<Combatant, ConfigurationError> {
        let mut combatant = self.combatant()?;
        combatant.hp = combatant.max_hp;
        combatant.shield = combatant.max_shield;
        Ok(combatant)
    }

    /// HP as a fraction of max.
    pub fn hp_fraction(&self) -> f64 {
        self.current_hp.max(0.0) / self.max_hp()
    }

    /// Write a finished battle back: rating, HP/shield left, and career counters.
    /// Byes and forfeits were never fought and leave the record untouched.
    pub fn record_battle(&mut self, result: &BattleResult, new_elo: Elo) {
        if !result.was_fought() {
            return;
        }
        let first = result.robot1_id == self.id;
        let opponent = if first {
            result.robot2_id
        } else {
            Some(result.robot1_id)
        };
        self.elo = new_elo;

        self.stats.total_battles += 1;
        match result.winner_id {
            Some(w) if w == self.id => self.stats.wins += 1,
            Some(_) => self.stats.losses += 1,
            None => self.stats.draws += 1,
        }
        let (hp, shield, dealt, taken) = if first {
            (
                result.robot1_final_hp,
                result.robot1_final_shield,
                result.robot1_damage_dealt,
                result.robot2_damage_dealt,
            )
        } else {
            (
                result.robot2_final_hp,
                result.robot2_final_shield,
                result.robot2_damage_dealt,
                result.robot1_damage_dealt,
            )
        };
        self.current_hp = hp;
        self.current_shield = shield;
        self.stats.damage_dealt += dealt;
        self.stats.damage_taken += taken;
        if let BattleEnding::Destroyed { robot_id } = result.ending {
            if Some(robot_id) == opponent {
                self.stats.kills += 1;
            }
        }
    }
}

/// Everything the resolver reads about one side except its stance.
/// Built from a [`Robot`], never written back by combat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: RobotId,
    pub name: String,
    /// Effective attributes (weapon bonuses and loadout modifiers applied).
    pub attributes: AttributeSet,
    pub loadout: Loadout,
    pub yield_threshold: f64,
    pub max_hp: f64,
    pub max_shield: f64,
    /// Starting HP.
    pub hp: f64,
    /// Starting shield.
    pub shield: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_movement_stops_at_the_ends() {
        assert_eq!(LeagueTier::Bronze.demoted(), None);
        assert_eq!(LeagueTier::Bronze.promoted(), Some(LeagueTier::Silver));
        assert_eq!(LeagueTier::Champion.promoted(), None);
        assert_eq!(LeagueTier::Champion.demoted(), Some(LeagueTier::Diamond));
    }

    #[test]
    fn aggressive_is_accepted_as_offensive() {
        let stance: Stance = serde_json::from_str("\"aggressive\"").unwrap();
        assert_eq!(stance, Stance::Offensive);
    }
}
