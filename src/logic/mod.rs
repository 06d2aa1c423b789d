//! Battle and tournament logic: combat, ratings, brackets, rounds, leagues.

mod bracket;
mod combat;
mod export;
pub mod formulas;
mod league;
mod rating;
mod runner;

pub use bracket::{build as build_bracket, next_round, rounds_for, Bracket};
pub use combat::resolve;
pub use export::events_to_csv;
pub use league::{
    apply_league_points, points_delta, rebalance, rebalance_robots, run_league_battle, tier_move,
    LeagueError, RebalanceSummary,
};
pub use rating::{apply_to_result as apply_rating, expected_score, update as update_ratings};
pub use runner::{
    advance_round, cancel_tournament, create_tournament, eligible_robots, execute_round,
    finish_round, match_seed, plan_round, record_match_result, schedule_match, start_tournament,
    RoundPlan, RoundResults, RoundStart, TournamentRunner,
};
