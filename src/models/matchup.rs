//! Bracket match and its status.

use crate::models::battle::BattleId;
use crate::models::robot::RobotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a match.
pub type MatchId = Uuid;

/// Match lifecycle. Only `Completed` is terminal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Pending,
    /// Handed to a scheduler that will resolve it out of band.
    Scheduled,
    Completed,
}

/// One slot of a single-elimination bracket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: Uuid,
    /// 1-based round number.
    pub round: u32,
    /// 1-based position within the round. Next-round pairing follows this order.
    pub match_number: u32,
    pub robot1_id: RobotId,
    /// Absent for byes.
    pub robot2_id: Option<RobotId>,
    /// Set once, when the match completes. Never changed afterwards.
    pub winner_id: Option<RobotId>,
    pub status: MatchStatus,
    pub is_bye_match: bool,
    /// Winner advanced because the other robot could not fight.
    #[serde(default)]
    pub forfeit: bool,
    pub battle_id: Option<BattleId>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Regular match between two robots.
    pub fn new(
        tournament_id: Uuid,
        round: u32,
        match_number: u32,
        robot1_id: RobotId,
        robot2_id: RobotId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            round,
            match_number,
            robot1_id,
            robot2_id: Some(robot2_id),
            winner_id: None,
            status: MatchStatus::Pending,
            is_bye_match: false,
            forfeit: false,
            battle_id: None,
            completed_at: None,
        }
    }

    /// Bye: one robot, advances without playing.
    pub fn bye(tournament_id: Uuid, round: u32, match_number: u32, robot_id: RobotId) -> Self {
        Self {
            robot2_id: None,
            is_bye_match: true,
            ..Self::new(tournament_id, round, match_number, robot_id, robot_id)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    /// True if `robot` plays in this match.
    pub fn involves(&self, robot: RobotId) -> bool {
        self.robot1_id == robot || self.robot2_id == Some(robot)
    }
}
