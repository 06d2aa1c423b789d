//! League battles, league points, and the LeagueRebalancer.

use crate::config::{ArenaConfig, LeagueConfig};
use crate::logic::{combat, rating};
use crate::models::{BattleResult, ConfigurationError, LeagueTier, Robot, RobotId};
use crate::store::RobotRepository;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LeagueError {
    RobotNotFound(RobotId),
    /// A robot cannot be paired with itself.
    SameRobot(RobotId),
    /// The robot has no HP left and needs a repair before it can fight.
    Disabled(RobotId),
    Configuration(ConfigurationError),
}

impl std::fmt::Display for LeagueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeagueError::RobotNotFound(id) => write!(f, "Robot {} not found", id),
            LeagueError::SameRobot(id) => write!(f, "Robot {} cannot fight itself", id),
            LeagueError::Disabled(id) => write!(f, "Robot {} has no HP left", id),
            LeagueError::Configuration(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LeagueError {}

impl From<ConfigurationError> for LeagueError {
    fn from(e: ConfigurationError) -> Self {
        LeagueError::Configuration(e)
    }
}

/// League point change for `robot` from a battle result.
pub fn points_delta(robot: RobotId, result: &BattleResult, config: &LeagueConfig) -> i32 {
    match result.winner_id {
        Some(w) if w == robot => config.win_points,
        Some(_) => config.loss_points,
        None => config.draw_points,
    }
}

/// Add the battle's league points (never below zero) and count it toward the tier.
pub fn apply_league_points(robot: &mut Robot, result: &BattleResult, config: &LeagueConfig) {
    let delta = points_delta(robot.id, result, config);
    robot.league_points = (robot.league_points as i64 + delta as i64).max(0) as u32;
    robot.league_battles += 1;
}

/// Resolve one scheduled league battle. Robots fight with the HP and shield
/// they currently have; ratings, league points, and records are written back.
pub fn run_league_battle<R: RobotRepository>(
    robots: &mut R,
    robot1: RobotId,
    robot2: RobotId,
    config: &ArenaConfig,
    seed: u64,
) -> Result<BattleResult, LeagueError> {
    if robot1 == robot2 {
        return Err(LeagueError::SameRobot(robot1));
    }
    let mut a = robots.get(robot1).ok_or(LeagueError::RobotNotFound(robot1))?;
    let mut b = robots.get(robot2).ok_or(LeagueError::RobotNotFound(robot2))?;
    for robot in [&a, &b] {
        if robot.current_hp <= 0.0 {
            return Err(LeagueError::Disabled(robot.id));
        }
    }

    let mut result = combat::resolve(
        &a.combatant()?,
        &b.combatant()?,
        a.stance,
        b.stance,
        seed,
        &config.combat,
    )?;

    let (before_a, before_b) = (a.elo, b.elo);
    let (elo_a, elo_b) = rating::apply_to_result(&mut result, before_a, before_b, &config.rating);
    a.record_battle(&result, elo_a);
    b.record_battle(&result, elo_b);
    apply_league_points(&mut a, &result, &config.league);
    apply_league_points(&mut b, &result, &config.league);
    log::debug!(
        "League battle {} vs {}: winner {:?}, elo {} -> {}, {} -> {}",
        a.name,
        b.name,
        result.winner_id,
        before_a,
        elo_a,
        before_b,
        elo_b
    );
    robots.save(a);
    robots.save(b);
    Ok(result)
}

/// Robots moved by one rebalancing run, sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceSummary {
    pub promoted: Vec<RobotId>,
    pub demoted: Vec<RobotId>,
}

/// Tier a robot should move to, if any. At most one tier per run; bronze and
/// champion are the ends.
pub fn tier_move(robot: &Robot, config: &LeagueConfig) -> Option<LeagueTier> {
    if robot.league_battles < config.min_battles_in_tier.max(1) {
        return None;
    }
    let tier = robot.league;
    if let Some(&promote_at) = config.promote_at.get(&tier) {
        if robot.league_points >= promote_at {
            if let Some(up) = tier.promoted() {
                return Some(up);
            }
        }
    }
    if let Some(&demote_below) = config.demote_below.get(&tier) {
        if robot.league_points < demote_below {
            return tier.demoted();
        }
    }
    None
}

/// Promote and demote over a set of robots in place.
///
/// Moved robots restart the new tier with the baseline points and no battles
/// counted, so a second run without new results moves nobody.
pub fn rebalance_robots(robots: &mut [Robot], config: &LeagueConfig) -> RebalanceSummary {
    let mut summary = RebalanceSummary::default();
    for robot in robots.iter_mut() {
        let Some(target) = tier_move(robot, config) else {
            continue;
        };
        let from = robot.league;
        robot.league = target;
        robot.league_points = config.reset_points;
        robot.league_battles = 0;
        if target > from {
            log::info!("Promoted {} ({}) from {} to {}", robot.name, robot.id, from, target);
            summary.promoted.push(robot.id);
        } else {
            log::info!("Demoted {} ({}) from {} to {}", robot.name, robot.id, from, target);
            summary.demoted.push(robot.id);
        }
    }
    summary.promoted.sort();
    summary.demoted.sort();
    summary
}

/// Scheduled rebalancing over every robot in the repository.
pub fn rebalance<R: RobotRepository>(robots: &mut R, config: &LeagueConfig) -> RebalanceSummary {
    let mut all = robots.all();
    let summary = rebalance_robots(&mut all, config);
    for robot in all {
        if summary.promoted.contains(&robot.id) || summary.demoted.contains(&robot.id) {
            robots.save(robot);
        }
    }
    log::info!(
        "League rebalance: {} promoted, {} demoted",
        summary.promoted.len(),
        summary.demoted.len()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeSet, Loadout, Weapon, WeaponHands};
    use uuid::Uuid;

    fn robot(id: u128, tier: LeagueTier, points: u32, battles: u32) -> Robot {
        let weapon = Weapon::new("Laser", WeaponHands::One, 20.0, 3.0);
        let mut r = Robot::new(format!("R{id}"), AttributeSet::uniform(10.0), Loadout::single(weapon), 1200);
        r.id = Uuid::from_u128(id);
        r.league = tier;
        r.league_points = points;
        r.league_battles = battles;
        r
    }

    #[test]
    fn loss_points_floor_at_zero() {
        let config = LeagueConfig::default();
        let mut r = robot(1, LeagueTier::Bronze, 0, 0);
        let mut result = BattleResult::bye(Uuid::from_u128(2));
        result.robot2_id = Some(r.id);
        apply_league_points(&mut r, &result, &config);
        assert_eq!(r.league_points, 0);
        assert_eq!(r.league_battles, 1);
    }

    #[test]
    fn promotes_and_demotes_one_tier() {
        let config = LeagueConfig::default();
        let mut robots = vec![
            robot(1, LeagueTier::Bronze, 25, 6),
            robot(2, LeagueTier::Gold, 2, 6),
            robot(3, LeagueTier::Silver, 12, 6),
        ];
        let summary = rebalance_robots(&mut robots, &config);
        assert_eq!(summary.promoted, vec![Uuid::from_u128(1)]);
        assert_eq!(summary.demoted, vec![Uuid::from_u128(2)]);
        assert_eq!(robots[0].league, LeagueTier::Silver);
        assert_eq!(robots[0].league_points, 0);
        assert_eq!(robots[1].league, LeagueTier::Silver);
        assert_eq!(robots[2].league, LeagueTier::Silver);
    }

    #[test]
    fn needs_enough_battles_in_tier() {
        let config = LeagueConfig::default();
        let mut robots = vec![robot(1, LeagueTier::Bronze, 100, 4)];
        assert_eq!(rebalance_robots(&mut robots, &config), RebalanceSummary::default());
    }

    #[test]
    fn tier_ends_do_not_move() {
        let config = LeagueConfig::default();
        let mut robots = vec![
            robot(1, LeagueTier::Champion, 500, 10),
            robot(2, LeagueTier::Bronze, 0, 10),
        ];
        let summary = rebalance_robots(&mut robots, &config);
        assert!(summary.promoted.is_empty());
        assert!(summary.demoted.is_empty());
    }

    #[test]
    fn second_run_moves_nobody() {
        let config = LeagueConfig {
            min_battles_in_tier: 0,
            ..LeagueConfig::default()
        };
        let mut robots = vec![robot(1, LeagueTier::Bronze, 30, 1), robot(2, LeagueTier::Gold, 0, 1)];
        let first = rebalance_robots(&mut robots, &config);
        assert_eq!(first.promoted.len() + first.demoted.len(), 2);
        let second = rebalance_robots(&mut robots, &config);
        assert_eq!(second, RebalanceSummary::default());
    }
}
