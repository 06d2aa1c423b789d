//! Integration tests for ELO updates, league battles, and league rebalancing.

use robot_arena::{
    expected_score, rebalance, run_league_battle, update_ratings, ArenaConfig, AttributeSet,
    InMemoryRobots, LeagueConfig, LeagueError, LeagueTier, Loadout, Outcome, RatingConfig, Robot,
    RobotRepository, Weapon, WeaponHands,
};
use uuid::Uuid;

fn robot(id: u128) -> Robot {
    let weapon = Weapon::new("Railgun", WeaponHands::Two, 30.0, 3.0);
    let mut r = Robot::new(
        format!("Bot {id}"),
        AttributeSet::uniform(12.0),
        Loadout::two_handed(weapon),
        1200,
    );
    r.id = Uuid::from_u128(id);
    r
}

#[test]
fn even_match_moves_sixteen_points() {
    let config = RatingConfig::default();
    assert_eq!(update_ratings(1200, 1200, Outcome::AWins, &config), (1216, 1184));
    assert_eq!(update_ratings(1200, 1200, Outcome::BWins, &config), (1184, 1216));
    assert_eq!(update_ratings(1200, 1200, Outcome::Draw, &config), (1200, 1200));
}

#[test]
fn upset_moves_more_than_expected_win() {
    let config = RatingConfig::default();
    let (favourite, _) = update_ratings(1600, 1200, Outcome::AWins, &config);
    let (_, underdog) = update_ratings(1600, 1200, Outcome::BWins, &config);
    assert!(favourite - 1600 < underdog - 1200);
    assert!((expected_score(1600, 1200) + expected_score(1200, 1600) - 1.0).abs() < 1e-12);
}

#[test]
fn rating_never_drops_below_floor() {
    let config = RatingConfig::default();
    let (_, loser) = update_ratings(110, 110, Outcome::AWins, &config);
    assert_eq!(loser, config.min_elo);
}

#[test]
fn league_battle_writes_back_both_robots() {
    let mut robots: InMemoryRobots = [robot(1), robot(2)].into_iter().collect();
    let config = ArenaConfig::default();
    let result = run_league_battle(
        &mut robots,
        Uuid::from_u128(1),
        Uuid::from_u128(2),
        &config,
        17,
    )
    .unwrap();

    let a = robots.get(Uuid::from_u128(1)).unwrap();
    let b = robots.get(Uuid::from_u128(2)).unwrap();
    let ratings = result.ratings.unwrap();
    assert_eq!(a.elo, ratings.robot1_elo_after);
    assert_eq!(b.elo, ratings.robot2_elo_after);
    assert_eq!(a.stats.total_battles, 1);
    assert_eq!(b.stats.total_battles, 1);
    assert_eq!(a.league_battles, 1);
    assert_eq!(b.league_battles, 1);
    assert_eq!(a.current_hp, result.robot1_final_hp);
    assert_eq!(b.current_hp, result.robot2_final_hp);
    match result.winner_id {
        Some(w) if w == a.id => {
            assert_eq!((a.league_points, b.league_points), (3, 0));
            assert_eq!((a.stats.wins, b.stats.losses), (1, 1));
        }
        Some(_) => {
            assert_eq!((a.league_points, b.league_points), (0, 3));
            assert_eq!((a.stats.losses, b.stats.wins), (1, 1));
        }
        None => {
            assert_eq!((a.league_points, b.league_points), (1, 1));
            assert_eq!((a.stats.draws, b.stats.draws), (1, 1));
        }
    }
}

#[test]
fn league_battle_rejects_bad_pairings() {
    let mut robots: InMemoryRobots = [robot(1)].into_iter().collect();
    let config = ArenaConfig::default();
    let one = Uuid::from_u128(1);
    let ghost = Uuid::from_u128(9);
    assert_eq!(
        run_league_battle(&mut robots, one, one, &config, 1),
        Err(LeagueError::SameRobot(one))
    );
    assert_eq!(
        run_league_battle(&mut robots, one, ghost, &config, 1),
        Err(LeagueError::RobotNotFound(ghost))
    );
}

#[test]
fn league_battle_refuses_a_robot_with_no_hp() {
    let mut wrecked = robot(2);
    wrecked.current_hp = 0.0;
    let mut robots: InMemoryRobots = [robot(1), wrecked].into_iter().collect();
    let config = ArenaConfig::default();
    let (one, two) = (Uuid::from_u128(1), Uuid::from_u128(2));

    assert_eq!(
        run_league_battle(&mut robots, one, two, &config, 1),
        Err(LeagueError::Disabled(two))
    );
    // Nothing was recorded for either side.
    assert_eq!(robots.get(one).unwrap().stats.total_battles, 0);
    assert_eq!(robots.get(two).unwrap().elo, 1200);

    let mut repaired = robots.get(two).unwrap();
    repaired.repair();
    robots.save(repaired);
    assert!(run_league_battle(&mut robots, one, two, &config, 1).is_ok());
}

#[test]
fn rebalance_promotes_demotes_and_is_idempotent() {
    let mut climber = robot(1);
    climber.league_points = 22;
    climber.league_battles = 6;
    let mut faller = robot(2);
    faller.league = LeagueTier::Gold;
    faller.league_points = 3;
    faller.league_battles = 6;
    let mut rookie = robot(3);
    rookie.league_points = 40;
    rookie.league_battles = 2;
    let mut robots: InMemoryRobots = [climber, faller, rookie].into_iter().collect();
    let config = LeagueConfig::default();

    let summary = rebalance(&mut robots, &config);
    assert_eq!(summary.promoted, vec![Uuid::from_u128(1)]);
    assert_eq!(summary.demoted, vec![Uuid::from_u128(2)]);
    assert_eq!(robots.get(Uuid::from_u128(1)).unwrap().league, LeagueTier::Silver);
    assert_eq!(robots.get(Uuid::from_u128(2)).unwrap().league, LeagueTier::Silver);
    assert_eq!(robots.get(Uuid::from_u128(3)).unwrap().league, LeagueTier::Bronze);

    let again = rebalance(&mut robots, &config);
    assert!(again.promoted.is_empty());
    assert!(again.demoted.is_empty());
}
