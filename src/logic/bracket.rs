//! BracketBuilder: single-elimination brackets with byes.
//!
//! Rule for byes: participants are sorted by id, shuffled with the seed, and
//! padded up to the next power of two. The last `2^maxRounds - n` robots of the
//! shuffled order get byes; everyone before them is paired in order
//! (0 v 1, 2 v 3, ...). Real matches come first in match-number order, byes after.

use crate::models::{Match, RobotId, TournamentError, TournamentId};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Round-1 matches and the number of rounds the bracket needs.
#[derive(Clone, Debug)]
pub struct Bracket {
    pub matches: Vec<Match>,
    pub max_rounds: u32,
}

impl Bracket {
    pub fn bye_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_bye_match).count()
    }
}

/// Rounds needed for `n` participants: `ceil(log2(n))`.
pub fn rounds_for(n: usize) -> u32 {
    n.max(1).next_power_of_two().trailing_zeros()
}

/// Build round 1 for `eligible` robots. Fails with
/// `InsufficientParticipants` when fewer than `min_participants` are given.
pub fn build(
    tournament_id: TournamentId,
    eligible: &[RobotId],
    seed: u64,
    min_participants: usize,
) -> Result<Bracket, TournamentError> {
    let mut order: Vec<RobotId> = eligible.to_vec();
    order.sort();
    order.dedup();

    let n = order.len();
    if n < min_participants.max(2) {
        return Err(TournamentError::InsufficientParticipants {
            found: n,
            required: min_participants.max(2),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let max_rounds = rounds_for(n);
    let byes = (1usize << max_rounds) - n;
    let (paired, bye_robots) = order.split_at(n - byes);

    let mut matches = Vec::with_capacity(paired.len() / 2 + byes);
    for pair in paired.chunks_exact(2) {
        let number = matches.len() as u32 + 1;
        matches.push(Match::new(tournament_id, 1, number, pair[0], pair[1]));
    }
    for robot in bye_robots {
        let number = matches.len() as u32 + 1;
        matches.push(Match::bye(tournament_id, 1, number, *robot));
    }

    Ok(Bracket {
        matches,
        max_rounds,
    })
}

/// Pair the winners of a finished round, in match order. An odd robot out gets
/// a bye; with power-of-two padding this does not happen.
pub fn next_round(tournament_id: TournamentId, round: u32, winners: &[RobotId]) -> Vec<Match> {
    let mut matches = Vec::with_capacity(winners.len().div_ceil(2));
    for pair in winners.chunks(2) {
        let number = matches.len() as u32 + 1;
        match pair {
            [a, b] => matches.push(Match::new(tournament_id, round, number, *a, *b)),
            [a] => {
                log::warn!(
                    "Odd number of robots advancing to round {}; {} gets a bye",
                    round,
                    a
                );
                matches.push(Match::bye(tournament_id, round, number, *a));
            }
            _ => {}
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ids(n: u128) -> Vec<RobotId> {
        (1..=n).map(Uuid::from_u128).collect()
    }

    #[test]
    fn fewer_than_four_is_rejected() {
        let result = build(Uuid::nil(), &ids(3), 1, 4);
        assert_eq!(
            result.unwrap_err(),
            TournamentError::InsufficientParticipants {
                found: 3,
                required: 4
            }
        );
    }

    #[test]
    fn rounds_are_ceil_log2() {
        assert_eq!(rounds_for(4), 2);
        assert_eq!(rounds_for(5), 3);
        assert_eq!(rounds_for(8), 3);
        assert_eq!(rounds_for(9), 4);
    }

    #[test]
    fn every_size_fills_round_two() {
        for n in 4..=33u128 {
            let bracket = build(Uuid::nil(), &ids(n), 42, 4).unwrap();
            let slots = 1usize << (bracket.max_rounds - 1);
            assert_eq!(bracket.matches.len(), slots, "n = {n}");
            let byes = bracket.bye_count();
            let real = bracket.matches.len() - byes;
            assert_eq!(real * 2 + byes, n as usize, "n = {n}");
            assert!(bracket
                .matches
                .iter()
                .filter(|m| m.is_bye_match)
                .all(|m| m.robot2_id.is_none()));
        }
    }

    #[test]
    fn each_robot_appears_once() {
        let robots = ids(11);
        let bracket = build(Uuid::nil(), &robots, 9, 4).unwrap();
        for robot in &robots {
            let count = bracket.matches.iter().filter(|m| m.involves(*robot)).count();
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn same_seed_same_bracket() {
        let a = build(Uuid::nil(), &ids(7), 5, 4).unwrap();
        let mut shuffled = ids(7);
        shuffled.reverse();
        let b = build(Uuid::nil(), &shuffled, 5, 4).unwrap();
        let pairs = |br: &Bracket| -> Vec<(RobotId, Option<RobotId>)> {
            br.matches.iter().map(|m| (m.robot1_id, m.robot2_id)).collect()
        };
        assert_eq!(pairs(&a), pairs(&b));
    }

    #[test]
    fn byes_follow_real_matches() {
        let bracket = build(Uuid::nil(), &ids(5), 3, 4).unwrap();
        let flags: Vec<bool> = bracket.matches.iter().map(|m| m.is_bye_match).collect();
        assert_eq!(flags, vec![false, true, true, true]);
        let numbers: Vec<u32> = bracket.matches.iter().map(|m| m.match_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn next_round_pairs_in_order() {
        let winners = ids(4);
        let matches = next_round(Uuid::nil(), 2, &winners);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].robot1_id, winners[0]);
        assert_eq!(matches[0].robot2_id, Some(winners[1]));
        assert!(matches.iter().all(|m| m.round == 2));
    }

    #[test]
    fn odd_winner_count_gets_a_bye() {
        let matches = next_round(Uuid::nil(), 2, &ids(3));
        assert_eq!(matches.len(), 2);
        assert!(matches[1].is_bye_match);
    }
}
