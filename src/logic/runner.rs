//! TournamentRunner: tournament lifecycle, round execution, and the round barrier.
//!
//! `pending --start--> active --execute_round x max_rounds--> completed`.
//! A round is resolved in parallel (each battle is pure), then written back
//! one match at a time. The next round is only paired once every match of the
//! current round is completed.

use crate::config::{ArenaConfig, TournamentConfig};
use crate::logic::{bracket, combat, rating};
use crate::models::{
    BattleEnding, BattleRecord, BattleResult, Combatant, Elo, Match, MatchId, MatchReport,
    MatchStatus, Robot, RobotId, RoundSummary, Stance, Tournament, TournamentError, TournamentId,
    TournamentStatus,
};
use crate::store::RobotRepository;
use chrono::Utc;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const SPLITMIX64_GOLDEN: u64 = 0x9e3779b97f4a7c15;
const SPLITMIX64_M1: u64 = 0xbf58476d1ce4e5b9;
const SPLITMIX64_M2: u64 = 0x94d049bb133111eb;

/// Battle seed for one match, derived from the tournament seed and bracket position.
pub fn match_seed(tournament_seed: u64, round: u32, match_number: u32) -> u64 {
    let position = ((round as u64) << 32) | match_number as u64;
    let mut z = tournament_seed ^ position.wrapping_mul(SPLITMIX64_GOLDEN);
    z = (z ^ (z >> 30)).wrapping_mul(SPLITMIX64_M1);
    z = (z ^ (z >> 27)).wrapping_mul(SPLITMIX64_M2);
    z ^ (z >> 31)
}

/// Robots ready for a tournament: valid loadout and enough HP. Sorted by id.
pub fn eligible_robots<R: RobotRepository>(robots: &R, config: &TournamentConfig) -> Vec<RobotId> {
    let mut ids: Vec<RobotId> = robots
        .all()
        .into_iter()
        .filter(|r| r.loadout.validate().is_ok())
        .filter(|r| r.hp_fraction() >= config.readiness_hp_fraction)
        .map(|r| r.id)
        .collect();
    ids.sort();
    ids
}

/// Create a pending tournament over every eligible robot.
pub fn create_tournament<R: RobotRepository>(
    name: impl Into<String>,
    robots: &R,
    config: &ArenaConfig,
    seed: u64,
) -> Result<Tournament, TournamentError> {
    let eligible = eligible_robots(robots, &config.tournament);
    let required = config.tournament.min_participants;
    if eligible.len() < required {
        return Err(TournamentError::InsufficientParticipants {
            found: eligible.len(),
            required,
        });
    }
    let tournament = Tournament::new(name, eligible, seed);
    log::info!(
        "Created tournament {} ({}) with {} robots",
        tournament.name,
        tournament.id,
        tournament.participants.len()
    );
    Ok(tournament)
}

/// Generate the bracket: pending -> active.
pub fn start_tournament(
    tournament: &mut Tournament,
    config: &ArenaConfig,
) -> Result<(), TournamentError> {
    if tournament.status != TournamentStatus::Pending {
        return Err(TournamentError::InvalidState);
    }
    let built = bracket::build(
        tournament.id,
        &tournament.participants,
        tournament.seed,
        config.tournament.min_participants,
    )?;
    log::info!(
        "Tournament {} started: {} rounds, {} byes in round 1",
        tournament.id,
        built.max_rounds,
        built.bye_count()
    );
    tournament.max_rounds = built.max_rounds;
    tournament.matches = built.matches;
    tournament.current_round = 1;
    tournament.status = TournamentStatus::Active;
    tournament.started_at = Some(Utc::now());
    Ok(())
}

/// Work for one unresolved match, prepared under the repository borrow and run in parallel.
enum Job {
    Walkover {
        match_id: MatchId,
        result: BattleResult,
    },
    Fight {
        match_id: MatchId,
        seed: u64,
        robot1: Combatant,
        robot2: Combatant,
        stance1: Stance,
        stance2: Stance,
    },
}

impl Job {
    fn run(self, config: &ArenaConfig) -> (MatchId, BattleResult) {
        match self {
            Job::Walkover { match_id, result } => (match_id, result),
            Job::Fight {
                match_id,
                seed,
                robot1,
                robot2,
                stance1,
                stance2,
            } => {
                let result =
                    combat::resolve(&robot1, &robot2, stance1, stance2, seed, &config.combat)
                        .unwrap_or_else(|e| {
                            log::warn!("Match {} could not be fought: {}", match_id, e);
                            BattleResult::forfeit(robot1.id, robot2.id, robot1.id)
                                .with_final_state(robot2.id, robot2.max_hp, robot2.max_shield)
                        });
                (match_id, result)
            }
        }
    }
}

/// Combat snapshot at full HP, or None if the robot is gone or cannot fight.
fn ready_combatant(robot: Option<&Robot>, match_id: MatchId) -> Option<Combatant> {
    let robot = robot?;
    match robot.fresh_combatant() {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!(
                "Robot {} cannot fight match {}: {}",
                robot.id,
                match_id,
                e
            );
            None
        }
    }
}

/// Walkover for a match nobody fights. The robot that advances is recorded at
/// the full HP and shield it would have started the battle with.
fn walkover<R: RobotRepository>(match_id: MatchId, result: BattleResult, robots: &R) -> Job {
    let result = match result.winner_id.and_then(|id| robots.get(id)) {
        Some(winner) => result.with_final_state(winner.id, winner.max_hp(), winner.max_shield()),
        None => result,
    };
    Job::Walkover { match_id, result }
}

fn prepare_job<R: RobotRepository>(tournament: &Tournament, m: &Match, robots: &R) -> Job {
    let robot2_id = match (m.is_bye_match, m.robot2_id) {
        (false, Some(id)) => id,
        _ => return walkover(m.id, BattleResult::bye(m.robot1_id), robots),
    };
    let robot1 = robots.get(m.robot1_id);
    let robot2 = robots.get(robot2_id);
    let c1 = ready_combatant(robot1.as_ref(), m.id);
    let c2 = ready_combatant(robot2.as_ref(), m.id);
    match (c1, c2, robot1, robot2) {
        (Some(c1), Some(c2), Some(r1), Some(r2)) => Job::Fight {
            match_id: m.id,
            seed: match_seed(tournament.seed, m.round, m.match_number),
            robot1: c1,
            robot2: c2,
            stance1: r1.stance,
            stance2: r2.stance,
        },
        (Some(_), None, ..) => {
            log::warn!("Match {}: {} forfeits", m.id, robot2_id);
            let result = BattleResult::forfeit(m.robot1_id, robot2_id, robot2_id);
            walkover(m.id, result, robots)
        }
        (None, Some(_), ..) => {
            log::warn!("Match {}: {} forfeits", m.id, m.robot1_id);
            let result = BattleResult::forfeit(m.robot1_id, robot2_id, m.robot1_id);
            walkover(m.id, result, robots)
        }
        _ => {
            log::warn!(
                "Match {}: neither robot can fight, {} advances",
                m.id,
                m.robot1_id
            );
            let result = BattleResult::forfeit(m.robot1_id, robot2_id, robot2_id);
            walkover(m.id, result, robots)
        }
    }
}

/// The unresolved matches of one round, snapshotted so they can be fought
/// without holding the tournament or the robots.
pub struct RoundPlan {
    tournament_id: TournamentId,
    round: u32,
    jobs: Vec<Job>,
}

/// Battle results of a resolved [`RoundPlan`], waiting to be written back.
pub struct RoundResults {
    tournament_id: TournamentId,
    round: u32,
    results: Vec<(MatchId, BattleResult)>,
}

/// What [`plan_round`] found.
pub enum RoundStart {
    /// Nothing left to fight: the stored summary of the last finished round.
    Done(RoundSummary),
    Plan(RoundPlan),
}

impl RoundPlan {
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Number of matches to resolve.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Fight every match in parallel. Touches no shared state.
    pub fn resolve(self, config: &ArenaConfig) -> RoundResults {
        let results = self
            .jobs
            .into_par_iter()
            .map(|job| job.run(config))
            .collect();
        RoundResults {
            tournament_id: self.tournament_id,
            round: self.round,
            results,
        }
    }
}

/// Snapshot the current round's unresolved matches.
///
/// On a completed or cancelled tournament, or a round that already has a
/// summary, this returns `RoundStart::Done` so repeated scheduler triggers are
/// safe.
pub fn plan_round<R: RobotRepository>(
    tournament: &Tournament,
    robots: &R,
) -> Result<RoundStart, TournamentError> {
    match tournament.status {
        TournamentStatus::Pending => return Err(TournamentError::InvalidState),
        TournamentStatus::Completed | TournamentStatus::Cancelled => {
            return tournament
                .round_summaries
                .last()
                .cloned()
                .map(RoundStart::Done)
                .ok_or(TournamentError::InvalidState)
        }
        TournamentStatus::Active => {}
    }
    let round = tournament.current_round;
    if let Some(done) = tournament.summary(round) {
        return Ok(RoundStart::Done(done.clone()));
    }

    let jobs: Vec<Job> = tournament
        .round_matches(round)
        .into_iter()
        .filter(|m| !m.is_terminal())
        .map(|m| prepare_job(tournament, m, robots))
        .collect();
    log::debug!(
        "Tournament {} round {}: resolving {} match(es)",
        tournament.id,
        round,
        jobs.len()
    );
    Ok(RoundStart::Plan(RoundPlan {
        tournament_id: tournament.id,
        round,
        jobs,
    }))
}

/// Write resolved battles back, then cross the round barrier. The results
/// must belong to this tournament's current round.
pub fn finish_round<R: RobotRepository>(
    tournament: &mut Tournament,
    robots: &mut R,
    resolved: RoundResults,
    config: &ArenaConfig,
) -> Result<RoundSummary, TournamentError> {
    if resolved.tournament_id != tournament.id
        || resolved.round != tournament.current_round
        || tournament.status != TournamentStatus::Active
    {
        return Err(TournamentError::InvalidState);
    }
    for (match_id, result) in resolved.results {
        apply_result(tournament, robots, match_id, result, config)?;
    }
    advance_round(tournament)
}

/// Resolve every unresolved match of the current round, then cross the round barrier.
///
/// On a completed or cancelled tournament this returns the stored last round
/// summary and changes nothing.
pub fn execute_round<R: RobotRepository>(
    tournament: &mut Tournament,
    robots: &mut R,
    config: &ArenaConfig,
) -> Result<RoundSummary, TournamentError> {
    match plan_round(tournament, &*robots)? {
        RoundStart::Done(summary) => Ok(summary),
        RoundStart::Plan(plan) => {
            let resolved = plan.resolve(config);
            finish_round(tournament, robots, resolved, config)
        }
    }
}

/// Resolve one match out of band (e.g. by an external scheduler). The match
/// must belong to the current round, not be completed yet, and the result must
/// be for the same robots.
pub fn record_match_result<R: RobotRepository>(
    tournament: &mut Tournament,
    robots: &mut R,
    match_id: MatchId,
    result: BattleResult,
    config: &ArenaConfig,
) -> Result<(), TournamentError> {
    if tournament.status != TournamentStatus::Active {
        return Err(TournamentError::InvalidState);
    }
    let m = tournament
        .get_match(match_id)
        .ok_or(TournamentError::MatchNotFound(match_id))?;
    if m.round != tournament.current_round || m.is_terminal() {
        return Err(TournamentError::InvalidState);
    }
    if result.robot1_id != m.robot1_id || result.robot2_id != m.robot2_id {
        return Err(TournamentError::InvalidState);
    }
    apply_result(tournament, robots, match_id, result, config)
}

/// Mark a pending current-round match as handed off to a scheduler.
pub fn schedule_match(tournament: &mut Tournament, match_id: MatchId) -> Result<(), TournamentError> {
    let current = tournament.current_round;
    let m = tournament
        .get_match_mut(match_id)
        .ok_or(TournamentError::MatchNotFound(match_id))?;
    if m.round != current || m.status != MatchStatus::Pending {
        return Err(TournamentError::InvalidState);
    }
    m.status = MatchStatus::Scheduled;
    Ok(())
}

/// One write per match: ratings and robot records, the battle record, then the match itself.
fn apply_result<R: RobotRepository>(
    tournament: &mut Tournament,
    robots: &mut R,
    match_id: MatchId,
    mut result: BattleResult,
    config: &ArenaConfig,
) -> Result<(), TournamentError> {
    let round = match tournament.get_match(match_id) {
        Some(m) if m.is_terminal() => return Ok(()),
        Some(m) => m.round,
        None => return Err(TournamentError::MatchNotFound(match_id)),
    };

    let mut advancing = result.winner_id;
    if result.was_fought() {
        let robot1 = robots.get(result.robot1_id);
        let robot2 = result.robot2_id.and_then(|id| robots.get(id));
        match (robot1, robot2) {
            (Some(mut a), Some(mut b)) => {
                let (new_a, new_b) =
                    rating::apply_to_result(&mut result, a.elo, b.elo, &config.rating);
                let (elo_a, elo_b) = (a.elo, b.elo);
                a.record_battle(&result, new_a);
                b.record_battle(&result, new_b);
                if result.is_draw() {
                    advancing = Some(draw_tiebreak(&a, &b, elo_a, elo_b));
                }
                robots.save(a);
                robots.save(b);
            }
            _ => {
                log::warn!(
                    "Match {}: robot removed before the result was stored",
                    match_id
                );
                if advancing.is_none() {
                    advancing = Some(result.robot1_id);
                }
            }
        }
    }

    let battle_id = Uuid::new_v4();
    let forfeit = matches!(result.ending, BattleEnding::Forfeit { .. });
    let now = Utc::now();
    tournament.battles.push(BattleRecord {
        id: battle_id,
        tournament_id: tournament.id,
        match_id,
        round,
        result,
        created_at: now,
    });

    let m = tournament
        .get_match_mut(match_id)
        .ok_or(TournamentError::MatchNotFound(match_id))?;
    m.winner_id = advancing;
    m.status = MatchStatus::Completed;
    m.forfeit = forfeit;
    m.battle_id = Some(battle_id);
    m.completed_at = Some(now);
    Ok(())
}

/// Who advances from a drawn battle: higher HP fraction left, then higher
/// rating before the battle, then robot 1.
fn draw_tiebreak(a: &Robot, b: &Robot, elo_a: Elo, elo_b: Elo) -> RobotId {
    let (fa, fb) = (a.hp_fraction(), b.hp_fraction());
    if fb > fa || (fb == fa && elo_b > elo_a) {
        b.id
    } else {
        a.id
    }
}

/// Cross the round barrier: summarize the round, then pair the next round or
/// finish the tournament. Refuses with `ConcurrencyViolation` while any match
/// of the current round is not completed.
pub fn advance_round(tournament: &mut Tournament) -> Result<RoundSummary, TournamentError> {
    if tournament.status != TournamentStatus::Active {
        return Err(TournamentError::InvalidState);
    }
    let round = tournament.current_round;
    let blocking = tournament.blocking_matches();
    if !blocking.is_empty() {
        return Err(TournamentError::ConcurrencyViolation { round, blocking });
    }

    let round_matches = tournament.round_matches(round);
    if round_matches.is_empty() {
        return Err(TournamentError::InvalidState);
    }
    let mut reports = Vec::with_capacity(round_matches.len());
    let mut winners = Vec::with_capacity(round_matches.len());
    for m in &round_matches {
        let duration = m
            .battle_id
            .and_then(|id| tournament.battle(id))
            .map(|b| b.result.duration_seconds)
            .unwrap_or(0.0);
        reports.push(MatchReport {
            match_id: m.id,
            robot1_id: m.robot1_id,
            robot2_id: m.robot2_id,
            winner_id: m.winner_id,
            is_bye_match: m.is_bye_match,
            forfeit: m.forfeit,
            battle_id: m.battle_id,
            duration_seconds: duration,
        });
        if let Some(w) = m.winner_id {
            winners.push(w);
        }
    }

    let now = Utc::now();
    tournament.current_round += 1;
    let champion = if winners.len() == 1 && tournament.current_round > tournament.max_rounds {
        let winner = winners[0];
        tournament.status = TournamentStatus::Completed;
        tournament.winner_id = Some(winner);
        tournament.completed_at = Some(now);
        log::info!("Tournament {} completed: winner {}", tournament.id, winner);
        Some(winner)
    } else if tournament.cancel_requested {
        tournament.status = TournamentStatus::Cancelled;
        tournament.completed_at = Some(now);
        log::info!(
            "Tournament {} cancelled after round {}",
            tournament.id,
            round
        );
        None
    } else {
        let next = bracket::next_round(tournament.id, tournament.current_round, &winners);
        tournament.matches.extend(next);
        None
    };

    let summary = RoundSummary {
        round,
        matches: reports,
        advancing: winners,
        champion,
    };
    log::info!(
        "Tournament {} round {} done: {} match(es), {} advancing",
        tournament.id,
        round,
        summary.matches.len(),
        summary.advancing.len()
    );
    tournament.round_summaries.push(summary.clone());
    Ok(summary)
}

/// Cancel between rounds. Takes effect now if no current-round match has been
/// resolved yet, otherwise when the current round finishes. Returns the status
/// after the call.
pub fn cancel_tournament(tournament: &mut Tournament) -> Result<TournamentStatus, TournamentError> {
    match tournament.status {
        TournamentStatus::Completed | TournamentStatus::Cancelled => {
            Err(TournamentError::InvalidState)
        }
        TournamentStatus::Active if tournament.round_partially_resolved() => {
            tournament.cancel_requested = true;
            log::info!(
                "Tournament {} will be cancelled when round {} finishes",
                tournament.id,
                tournament.current_round
            );
            Ok(TournamentStatus::Active)
        }
        TournamentStatus::Pending | TournamentStatus::Active => {
            tournament.status = TournamentStatus::Cancelled;
            tournament.completed_at = Some(Utc::now());
            log::info!("Tournament {} cancelled", tournament.id);
            Ok(TournamentStatus::Cancelled)
        }
    }
}

/// Registry of tournaments by id, with a per-tournament guard so only one
/// caller resolves a given tournament's round at a time.
#[derive(Debug, Default)]
pub struct TournamentRunner {
    tournaments: BTreeMap<TournamentId, Tournament>,
    running: BTreeSet<TournamentId>,
}

impl TournamentRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tournament: Tournament) -> TournamentId {
        let id = tournament.id;
        self.tournaments.insert(id, tournament);
        id
    }

    pub fn get(&self, id: TournamentId) -> Option<&Tournament> {
        self.tournaments.get(&id)
    }

    pub fn list(&self) -> Vec<&Tournament> {
        self.tournaments.values().collect()
    }

    /// True while any tournament is pending or active.
    pub fn has_open_tournament(&self) -> bool {
        self.tournaments.values().any(|t| !t.status.is_finished())
    }

    /// Ids of active tournaments.
    pub fn active_ids(&self) -> Vec<TournamentId> {
        self.tournaments
            .values()
            .filter(|t| t.status == TournamentStatus::Active)
            .map(|t| t.id)
            .collect()
    }

    /// Take a working copy of a tournament to resolve a round on. Fails with
    /// `RoundInProgress` while another caller holds it.
    pub fn checkout(&mut self, id: TournamentId) -> Result<Tournament, TournamentError> {
        let tournament = self
            .tournaments
            .get(&id)
            .cloned()
            .ok_or(TournamentError::TournamentNotFound(id))?;
        if !self.running.insert(id) {
            return Err(TournamentError::RoundInProgress);
        }
        Ok(tournament)
    }

    /// Store the working copy back and release the guard.
    pub fn checkin(&mut self, tournament: Tournament) {
        self.running.remove(&tournament.id);
        self.tournaments.insert(tournament.id, tournament);
    }

    /// Release the guard without storing anything.
    pub fn release(&mut self, id: TournamentId) {
        self.running.remove(&id);
    }

    /// Execute the current round of a stored tournament.
    pub fn execute_round<R: RobotRepository>(
        &mut self,
        id: TournamentId,
        robots: &mut R,
        config: &ArenaConfig,
    ) -> Result<RoundSummary, TournamentError> {
        let mut tournament = self.checkout(id)?;
        let outcome = execute_round(&mut tournament, robots, config);
        self.checkin(tournament);
        outcome
    }

    pub fn cancel(&mut self, id: TournamentId) -> Result<TournamentStatus, TournamentError> {
        if self.running.contains(&id) {
            return Err(TournamentError::RoundInProgress);
        }
        let tournament = self
            .tournaments
            .get_mut(&id)
            .ok_or(TournamentError::TournamentNotFound(id))?;
        cancel_tournament(tournament)
    }

    /// Create and start a tournament when none is open and enough robots are
    /// ready. Returns the new id, or None when the conditions are not met.
    pub fn auto_create<R: RobotRepository>(
        &mut self,
        robots: &R,
        config: &ArenaConfig,
        seed: u64,
    ) -> Result<Option<TournamentId>, TournamentError> {
        if self.has_open_tournament() {
            return Ok(None);
        }
        let eligible = eligible_robots(robots, &config.tournament);
        if eligible.len() < config.tournament.auto_create_threshold {
            log::debug!(
                "Not creating a tournament: {} eligible robot(s), need {}",
                eligible.len(),
                config.tournament.auto_create_threshold
            );
            return Ok(None);
        }
        let number = self.tournaments.len() + 1;
        let mut tournament =
            create_tournament(format!("Tournament #{number}"), robots, config, seed)?;
        start_tournament(&mut tournament, config)?;
        Ok(Some(self.insert(tournament)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_seeds_differ_by_position() {
        let a = match_seed(7, 1, 1);
        let b = match_seed(7, 1, 2);
        let c = match_seed(7, 2, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, match_seed(7, 1, 1));
    }

    #[test]
    fn pending_tournament_cannot_execute() {
        let mut t = Tournament::new("Cup", vec![Uuid::from_u128(1)], 1);
        let mut robots = crate::store::InMemoryRobots::new();
        let result = execute_round(&mut t, &mut robots, &ArenaConfig::default());
        assert_eq!(result.unwrap_err(), TournamentError::InvalidState);
    }

    #[test]
    fn pending_tournament_cancels_immediately() {
        let mut t = Tournament::new("Cup", vec![Uuid::from_u128(1)], 1);
        assert_eq!(cancel_tournament(&mut t), Ok(TournamentStatus::Cancelled));
        assert_eq!(cancel_tournament(&mut t), Err(TournamentError::InvalidState));
    }

    #[test]
    fn results_from_another_round_are_refused() {
        let mut robots: crate::store::InMemoryRobots = (1..=4u128)
            .map(|i| {
                let weapon = crate::models::Weapon::new(
                    "Blaster",
                    crate::models::WeaponHands::One,
                    12.0,
                    1.5,
                );
                let mut r = Robot::new(
                    format!("R{i}"),
                    crate::models::AttributeSet::uniform(10.0),
                    crate::models::Loadout::single(weapon),
                    1200,
                );
                r.id = Uuid::from_u128(i);
                r
            })
            .collect();
        let config = ArenaConfig::default();
        let mut t = create_tournament("Cup", &robots, &config, 3).unwrap();
        start_tournament(&mut t, &config).unwrap();

        let RoundStart::Plan(plan) = plan_round(&t, &robots).unwrap() else {
            panic!("round 1 should need resolving");
        };
        assert_eq!(plan.round(), 1);
        assert_eq!(plan.len(), 2);
        let stale = plan.resolve(&config);
        execute_round(&mut t, &mut robots, &config).unwrap();
        assert_eq!(
            finish_round(&mut t, &mut robots, stale, &config).unwrap_err(),
            TournamentError::InvalidState
        );
        assert_eq!(t.current_round, 2);
    }

    #[test]
    fn checkout_guards_against_second_runner() {
        let mut runner = TournamentRunner::new();
        let id = runner.insert(Tournament::new("Cup", vec![], 1));
        let working = runner.checkout(id).unwrap();
        assert_eq!(runner.checkout(id).unwrap_err(), TournamentError::RoundInProgress);
        assert_eq!(runner.cancel(id), Err(TournamentError::RoundInProgress));
        runner.checkin(working);
        assert!(runner.checkout(id).is_ok());
    }
}
