//! ELO rating updates.

use crate::config::RatingConfig;
use crate::models::{BattleResult, Elo, Outcome, RatingChange};

/// Expected score of a player rated `rating` against `opponent`.
pub fn expected_score(rating: Elo, opponent: Elo) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - rating) as f64 / 400.0))
}

/// New ratings for A and B after `outcome`.
///
/// Each side moves by `round(K * (S - E))` and is floored at the configured
/// minimum. Pure: storing the ratings is up to the caller.
pub fn update(elo_a: Elo, elo_b: Elo, outcome: Outcome, config: &RatingConfig) -> (Elo, Elo) {
    let score_a = outcome.score_a();
    let score_b = 1.0 - score_a;
    let change_a = (config.k_factor * (score_a - expected_score(elo_a, elo_b))).round() as Elo;
    let change_b = (config.k_factor * (score_b - expected_score(elo_b, elo_a))).round() as Elo;
    (
        (elo_a + change_a).max(config.min_elo),
        (elo_b + change_b).max(config.min_elo),
    )
}

/// Apply the update for a finished battle and record before/after on it.
pub fn apply_to_result(
    result: &mut BattleResult,
    elo1: Elo,
    elo2: Elo,
    config: &RatingConfig,
) -> (Elo, Elo) {
    let (new1, new2) = update(elo1, elo2, result.outcome(), config);
    result.ratings = Some(RatingChange {
        robot1_elo_before: elo1,
        robot1_elo_after: new1,
        robot2_elo_before: elo2,
        robot2_elo_after: new2,
    });
    (new1, new2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_expect_half() {
        assert!((expected_score(1200, 1200) - 0.5).abs() < 1e-12);
        assert!(expected_score(1600, 1200) > 0.9);
    }

    #[test]
    fn equal_ratings_win_moves_sixteen() {
        let config = RatingConfig::default();
        assert_eq!(update(1200, 1200, Outcome::AWins, &config), (1216, 1184));
        assert_eq!(update(1200, 1200, Outcome::BWins, &config), (1184, 1216));
    }

    #[test]
    fn draw_between_equals_changes_nothing() {
        let config = RatingConfig::default();
        assert_eq!(update(1500, 1500, Outcome::Draw, &config), (1500, 1500));
    }

    #[test]
    fn draw_pulls_ratings_together() {
        let config = RatingConfig::default();
        let (a, b) = update(1600, 1200, Outcome::Draw, &config);
        assert!(a < 1600);
        assert!(b > 1200);
    }

    #[test]
    fn ratings_never_drop_below_floor() {
        let config = RatingConfig::default();
        let (_, b) = update(2000, 105, Outcome::AWins, &config);
        assert_eq!(b, 105);
        let (a, _) = update(100, 100, Outcome::BWins, &config);
        assert_eq!(a, config.min_elo);
        for rating in [0, 50, 100, 101, 120] {
            let (x, y) = update(rating, 3000, Outcome::BWins, &config);
            assert!(x >= config.min_elo);
            assert!(y >= config.min_elo);
        }
    }
}
