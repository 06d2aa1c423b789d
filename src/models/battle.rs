//! Combat event log, formula breakdowns, and battle results.
//!
//! Field names here are a wire contract: battle-detail viewers match on `type`,
//! `formulaBreakdown.components` and `formulaBreakdown.result`. Do not rename or
//! reorder without a compatibility note.

use crate::models::robot::{Elo, RobotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a stored battle.
pub type BattleId = Uuid;

/// The named terms and final value behind one computed number.
///
/// Components are kept in a `BTreeMap` so serialization order is stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaBreakdown {
    pub calculation: String,
    pub components: BTreeMap<String, f64>,
    pub result: f64,
}

impl FormulaBreakdown {
    pub fn new(calculation: impl Into<String>, result: f64) -> Self {
        Self {
            calculation: calculation.into(),
            components: BTreeMap::new(),
            result,
        }
    }

    /// Add a named component.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.components.insert(name.to_string(), value);
        self
    }

    /// Component by name (0 when absent).
    pub fn component(&self, name: &str) -> f64 {
        self.components.get(name).copied().unwrap_or(0.0)
    }
}

/// What happened in one event. Each kind carries only the fields valid for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CombatEventKind {
    /// Regular hit.
    Attack {
        weapon: String,
        shield_damage: f64,
        hp_damage: f64,
        formula_breakdown: FormulaBreakdown,
    },
    /// Hit that rolled a critical.
    Critical {
        weapon: String,
        shield_damage: f64,
        hp_damage: f64,
        formula_breakdown: FormulaBreakdown,
    },
    /// Attack that failed the hit roll. The breakdown is the hit chance.
    Miss {
        weapon: String,
        formula_breakdown: FormulaBreakdown,
    },
    /// Counter-attack by the defender right after being hit.
    Counter {
        weapon: String,
        shield_damage: f64,
        hp_damage: f64,
        formula_breakdown: FormulaBreakdown,
    },
    /// Target's shield dropped to zero.
    ShieldBreak,
    /// Shield regenerated (never HP).
    ShieldRegen { formula_breakdown: FormulaBreakdown },
    /// Robot surrendered at or below its yield threshold.
    Yield { threshold: f64, hp_percent: f64 },
    /// Robot's HP reached zero.
    Destroyed,
}

impl CombatEventKind {
    /// Wire name of the kind (`attack`, `critical`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            CombatEventKind::Attack { .. } => "attack",
            CombatEventKind::Critical { .. } => "critical",
            CombatEventKind::Miss { .. } => "miss",
            CombatEventKind::Counter { .. } => "counter",
            CombatEventKind::ShieldBreak => "shield_break",
            CombatEventKind::ShieldRegen { .. } => "shield_regen",
            CombatEventKind::Yield { .. } => "yield",
            CombatEventKind::Destroyed => "destroyed",
        }
    }

    pub fn formula_breakdown(&self) -> Option<&FormulaBreakdown> {
        match self {
            CombatEventKind::Attack {
                formula_breakdown, ..
            }
            | CombatEventKind::Critical {
                formula_breakdown, ..
            }
            | CombatEventKind::Miss {
                formula_breakdown, ..
            }
            | CombatEventKind::Counter {
                formula_breakdown, ..
            }
            | CombatEventKind::ShieldRegen { formula_breakdown } => Some(formula_breakdown),
            CombatEventKind::ShieldBreak
            | CombatEventKind::Yield { .. }
            | CombatEventKind::Destroyed => None,
        }
    }

    /// Shield and HP damage dealt by this event, if it is a damaging one.
    pub fn damage(&self) -> Option<(f64, f64)> {
        match self {
            CombatEventKind::Attack {
                shield_damage,
                hp_damage,
                ..
            }
            | CombatEventKind::Critical {
                shield_damage,
                hp_damage,
                ..
            }
            | CombatEventKind::Counter {
                shield_damage,
                hp_damage,
                ..
            } => Some((*shield_damage, *hp_damage)),
            _ => None,
        }
    }
}

/// One ordered log entry.
///
/// HP/shield before/after describe the target. For self-directed kinds
/// (shield regen, yield, destroyed) actor and target are the same robot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatEvent {
    /// Seconds since battle start.
    pub timestamp: f64,
    pub actor_id: RobotId,
    pub target_id: RobotId,
    pub hp_before: f64,
    pub hp_after: f64,
    pub shield_before: f64,
    pub shield_after: f64,
    #[serde(flatten)]
    pub kind: CombatEventKind,
}

impl CombatEvent {
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn formula_breakdown(&self) -> Option<&FormulaBreakdown> {
        self.kind.formula_breakdown()
    }
}

/// Outcome from the first robot's point of view.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    AWins,
    BWins,
    Draw,
}

impl Outcome {
    /// Actual score for side A (1, 0, or 0.5).
    pub fn score_a(self) -> f64 {
        match self {
            Outcome::AWins => 1.0,
            Outcome::BWins => 0.0,
            Outcome::Draw => 0.5,
        }
    }
}

/// How a battle ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BattleEnding {
    /// The named robot's HP reached zero.
    Destroyed { robot_id: RobotId },
    /// The named robot surrendered.
    Yielded { robot_id: RobotId },
    /// Both robots entered the battle with no HP left. A draw.
    BothDestroyed,
    /// Maximum duration reached with both robots standing.
    TimeLimit,
    /// Bracket slot without opponent.
    Bye,
    /// The named robot could not take part.
    Forfeit { robot_id: RobotId },
}

/// ELO before and after, written once the rating update has been applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub robot1_elo_before: Elo,
    pub robot1_elo_after: Elo,
    pub robot2_elo_before: Elo,
    pub robot2_elo_after: Elo,
}

/// Result of one battle. Owned by the tournament/league side once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleResult {
    pub robot1_id: RobotId,
    /// None only for byes.
    pub robot2_id: Option<RobotId>,
    /// None means draw.
    pub winner_id: Option<RobotId>,
    #[serde(rename = "robot1FinalHP")]
    pub robot1_final_hp: f64,
    #[serde(rename = "robot2FinalHP")]
    pub robot2_final_hp: f64,
    pub robot1_final_shield: f64,
    pub robot2_final_shield: f64,
    pub robot1_damage_dealt: f64,
    pub robot2_damage_dealt: f64,
    pub ending: BattleEnding,
    pub duration_seconds: f64,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub ratings: Option<RatingChange>,
    pub events: Vec<CombatEvent>,
}

impl BattleResult {
    /// Zero-duration walkover for a bye: the robot advances, nothing is fought.
    pub fn bye(robot_id: RobotId) -> Self {
        Self {
            robot1_id: robot_id,
            robot2_id: None,
            winner_id: Some(robot_id),
            robot1_final_hp: 0.0,
            robot2_final_hp: 0.0,
            robot1_final_shield: 0.0,
            robot2_final_shield: 0.0,
            robot1_damage_dealt: 0.0,
            robot2_damage_dealt: 0.0,
            ending: BattleEnding::Bye,
            duration_seconds: 0.0,
            ratings: None,
            events: Vec::new(),
        }
    }

    /// Walkover when `absent` could not fight; `winner` advances.
    pub fn forfeit(robot1_id: RobotId, robot2_id: RobotId, absent: RobotId) -> Self {
        let winner = if absent == robot1_id {
            robot2_id
        } else {
            robot1_id
        };
        Self {
            robot2_id: Some(robot2_id),
            winner_id: Some(winner),
            ending: BattleEnding::Forfeit { robot_id: absent },
            ..Self::bye(robot1_id)
        }
    }

    /// Record the HP and shield one side of a walkover ends with.
    pub fn with_final_state(mut self, robot_id: RobotId, hp: f64, shield: f64) -> Self {
        if robot_id == self.robot1_id {
            self.robot1_final_hp = hp;
            self.robot1_final_shield = shield;
        } else if Some(robot_id) == self.robot2_id {
            self.robot2_final_hp = hp;
            self.robot2_final_shield = shield;
        }
        self
    }

    pub fn is_draw(&self) -> bool {
        self.winner_id.is_none()
    }

    pub fn outcome(&self) -> Outcome {
        match self.winner_id {
            Some(w) if w == self.robot1_id => Outcome::AWins,
            Some(_) => Outcome::BWins,
            None => Outcome::Draw,
        }
    }

    /// The losing robot, if there was one.
    pub fn loser_id(&self) -> Option<RobotId> {
        match self.outcome() {
            Outcome::AWins => self.robot2_id,
            Outcome::BWins => Some(self.robot1_id),
            Outcome::Draw => None,
        }
    }

    /// True when a robot actually fought (not a bye or forfeit).
    pub fn was_fought(&self) -> bool {
        !matches!(
            self.ending,
            BattleEnding::Bye | BattleEnding::Forfeit { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_tag_and_breakdown() {
        let event = CombatEvent {
            timestamp: 1.5,
            actor_id: Uuid::from_u128(1),
            target_id: Uuid::from_u128(2),
            hp_before: 100.0,
            hp_after: 90.0,
            shield_before: 0.0,
            shield_after: 0.0,
            kind: CombatEventKind::Attack {
                weapon: "Laser".to_string(),
                shield_damage: 0.0,
                hp_damage: 10.0,
                formula_breakdown: FormulaBreakdown::new("10 - 0 armor", 10.0)
                    .with("damage", 10.0)
                    .with("armorReduction", 0.0),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "attack");
        assert_eq!(json["actorId"], Uuid::from_u128(1).to_string());
        assert_eq!(json["hpDamage"], 10.0);
        assert_eq!(json["formulaBreakdown"]["result"], 10.0);
        assert_eq!(json["formulaBreakdown"]["components"]["damage"], 10.0);

        let back: CombatEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unit_kinds_have_no_breakdown() {
        assert!(CombatEventKind::Destroyed.formula_breakdown().is_none());
        assert_eq!(CombatEventKind::ShieldBreak.type_name(), "shield_break");
    }

    #[test]
    fn bye_result_is_empty_walkover() {
        let x = Uuid::from_u128(7);
        let result = BattleResult::bye(x);
        assert_eq!(result.winner_id, Some(x));
        assert_eq!(result.duration_seconds, 0.0);
        assert!(result.events.is_empty());
        assert!(!result.was_fought());
        assert_eq!(result.outcome(), Outcome::AWins);
    }

    #[test]
    fn forfeit_awards_the_other_robot() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let result = BattleResult::forfeit(a, b, a);
        assert_eq!(result.winner_id, Some(b));
        assert_eq!(result.loser_id(), Some(a));
        assert_eq!(result.ending, BattleEnding::Forfeit { robot_id: a });
    }

    #[test]
    fn walkover_keeps_the_state_it_is_given() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let result = BattleResult::forfeit(a, b, a).with_final_state(b, 120.0, 30.0);
        assert_eq!(result.robot2_final_hp, 120.0);
        assert_eq!(result.robot2_final_shield, 30.0);
        assert_eq!(result.robot1_final_hp, 0.0);

        let bye = BattleResult::bye(a).with_final_state(a, 80.0, 0.0);
        assert_eq!(bye.robot1_final_hp, 80.0);
        // Unknown robots are ignored.
        let same = bye.clone().with_final_state(Uuid::from_u128(9), 1.0, 1.0);
        assert_eq!(same, bye);
    }
}
