//! Data records for the arena: robots, loadouts, battles, matches, tournaments.

mod attributes;
mod battle;
mod loadout;
mod matchup;
mod robot;
mod tournament;

pub use attributes::{AttributeSet, ATTRIBUTE_NAMES};
pub use battle::{
    BattleEnding, BattleId, BattleResult, CombatEvent, CombatEventKind, FormulaBreakdown, Outcome,
    RatingChange,
};
pub use loadout::{ConfigurationError, Loadout, LoadoutKind, Slot, Weapon, WeaponHands, WeaponId, WeaponType};
pub use matchup::{Match, MatchId, MatchStatus};
pub use robot::{CareerStats, Combatant, Elo, LeagueTier, Robot, RobotId, Stance};
pub use tournament::{
    BattleRecord, MatchReport, RoundSummary, Tournament, TournamentError, TournamentId,
    TournamentStatus,
};
