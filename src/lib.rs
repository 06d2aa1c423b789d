//! Robot arena engine: deterministic combat, ELO ratings, league tiers, and
//! single-elimination tournaments.

pub mod config;
pub mod logic;
pub mod models;
pub mod store;

pub use config::{
    ArenaConfig, CombatConfig, ConfigError, LeagueConfig, RatingConfig, TournamentConfig,
    MIN_PARTICIPANTS,
};
pub use logic::{
    advance_round, apply_league_points, apply_rating, build_bracket, cancel_tournament,
    create_tournament, eligible_robots, events_to_csv, execute_round, expected_score,
    finish_round, match_seed, next_round, plan_round, rebalance, rebalance_robots,
    record_match_result, resolve, rounds_for, run_league_battle, schedule_match, start_tournament,
    update_ratings, Bracket, LeagueError, RebalanceSummary, RoundPlan, RoundResults, RoundStart,
    TournamentRunner,
};
pub use models::{
    AttributeSet, BattleEnding, BattleId, BattleRecord, BattleResult, CareerStats, CombatEvent,
    CombatEventKind, Combatant, ConfigurationError, Elo, FormulaBreakdown, LeagueTier, Loadout,
    LoadoutKind, Match, MatchId, MatchReport, MatchStatus, Outcome, RatingChange, Robot, RobotId,
    RoundSummary, Slot, Stance, Tournament, TournamentError, TournamentId, TournamentStatus,
    Weapon, WeaponHands, WeaponType,
};
pub use store::{InMemoryRobots, RobotRepository};
