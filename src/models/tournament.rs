//! Tournament, TournamentStatus, and the records a tournament owns.

use crate::models::battle::{BattleId, BattleResult};
use crate::models::matchup::{Match, MatchId, MatchStatus};
use crate::models::robot::RobotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur during tournament operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TournamentError {
    /// Fewer eligible robots than a bracket needs. No tournament is created.
    InsufficientParticipants { found: usize, required: usize },
    /// The next round was requested while matches of the current round are unresolved.
    ConcurrencyViolation { round: u32, blocking: Vec<MatchId> },
    /// Tournament is not in a state that allows this action.
    InvalidState,
    TournamentNotFound(TournamentId),
    MatchNotFound(MatchId),
    /// Cancellation or a second runner while a round is being resolved.
    RoundInProgress,
}

impl std::fmt::Display for TournamentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentError::InsufficientParticipants { found, required } => write!(
                f,
                "Need at least {} eligible robots (found {})",
                required, found
            ),
            TournamentError::ConcurrencyViolation { round, blocking } => write!(
                f,
                "Round {} is not finished: {} match(es) still unresolved",
                round,
                blocking.len()
            ),
            TournamentError::InvalidState => write!(f, "Invalid state for this action"),
            TournamentError::TournamentNotFound(id) => write!(f, "Tournament {} not found", id),
            TournamentError::MatchNotFound(id) => write!(f, "Match {} not found", id),
            TournamentError::RoundInProgress => write!(f, "A round is currently in progress"),
        }
    }
}

impl std::error::Error for TournamentError {}

/// Unique identifier for a tournament.
pub type TournamentId = Uuid;

/// Tournament lifecycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Created, bracket not generated yet.
    #[default]
    Pending,
    /// Bracket generated; rounds being played.
    Active,
    /// A winner emerged from the final round.
    Completed,
    /// Stopped by an admin between rounds.
    Cancelled,
}

impl TournamentStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, TournamentStatus::Completed | TournamentStatus::Cancelled)
    }
}

/// A stored battle fought (or walked over) for a tournament match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRecord {
    pub id: BattleId,
    pub tournament_id: TournamentId,
    pub match_id: MatchId,
    pub round: u32,
    pub result: BattleResult,
    pub created_at: DateTime<Utc>,
}

/// Per-match line of a round summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub match_id: MatchId,
    pub robot1_id: RobotId,
    pub robot2_id: Option<RobotId>,
    pub winner_id: Option<RobotId>,
    pub is_bye_match: bool,
    pub forfeit: bool,
    pub battle_id: Option<BattleId>,
    pub duration_seconds: f64,
}

/// What one executed round produced. Stored, so re-running a finished round
/// returns it instead of simulating again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub round: u32,
    pub matches: Vec<MatchReport>,
    /// Robots advancing out of this round, in bracket order.
    pub advancing: Vec<RobotId>,
    /// Set when this round produced the tournament winner.
    pub champion: Option<RobotId>,
}

/// Full tournament state: bracket, battles, and progress.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub status: TournamentStatus,
    /// Round to execute next (1-based). Ends at `max_rounds + 1` once completed.
    pub current_round: u32,
    pub max_rounds: u32,
    /// Participating robots, sorted.
    pub participants: Vec<RobotId>,
    pub winner_id: Option<RobotId>,
    /// Seed for the bracket shuffle and every battle of this tournament.
    pub seed: u64,
    /// Matches of every generated round.
    pub matches: Vec<Match>,
    pub battles: Vec<BattleRecord>,
    pub round_summaries: Vec<RoundSummary>,
    /// Cancellation asked for mid-round; applied when the round finishes.
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Create a pending tournament. Participant order is normalized.
    pub fn new(name: impl Into<String>, mut participants: Vec<RobotId>, seed: u64) -> Self {
        participants.sort();
        participants.dedup();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: TournamentStatus::Pending,
            current_round: 1,
            max_rounds: 0,
            participants,
            winner_id: None,
            seed,
            matches: Vec::new(),
            battles: Vec::new(),
            round_summaries: Vec::new(),
            cancel_requested: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Matches of `round`, in match-number order.
    pub fn round_matches(&self, round: u32) -> Vec<&Match> {
        let mut matches: Vec<&Match> = self.matches.iter().filter(|m| m.round == round).collect();
        matches.sort_by_key(|m| m.match_number);
        matches
    }

    pub fn get_match(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn get_match_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        self.matches.iter_mut().find(|m| m.id == id)
    }

    pub fn battle(&self, id: BattleId) -> Option<&BattleRecord> {
        self.battles.iter().find(|b| b.id == id)
    }

    /// Ids of current-round matches without a terminal status.
    pub fn blocking_matches(&self) -> Vec<MatchId> {
        self.round_matches(self.current_round)
            .into_iter()
            .filter(|m| m.status != MatchStatus::Completed)
            .map(|m| m.id)
            .collect()
    }

    /// True when at least one current-round match has already been resolved.
    pub fn round_partially_resolved(&self) -> bool {
        self.round_matches(self.current_round)
            .iter()
            .any(|m| m.is_terminal())
    }

    /// Summary stored for `round`, if that round was executed.
    pub fn summary(&self, round: u32) -> Option<&RoundSummary> {
        self.round_summaries.iter().find(|s| s.round == round)
    }
}
