//! CombatResolver: one deterministic, time-stepped battle between two combatants.
//!
//! The clock advances in fixed ticks. Each tick regenerates shields on the
//! regen interval, then robot 1 and robot 2 act if their cooldown has elapsed.
//! All randomness comes from a `ChaCha8Rng` seeded by the caller, so the same
//! inputs and seed always give the same event log.

use crate::config::CombatConfig;
use crate::logic::formulas::{self, DamageSplit};
use crate::models::{
    BattleEnding, BattleResult, CombatEvent, CombatEventKind, Combatant, ConfigurationError,
    FormulaBreakdown, RobotId, Stance, Weapon,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TIME_EPSILON: f64 = 1e-9;

/// Mutable battle state of one side.
struct Fighter<'a> {
    snapshot: &'a Combatant,
    stance: Stance,
    weapons: Vec<&'a Weapon>,
    next_weapon: usize,
    next_attack_at: f64,
    hp: f64,
    shield: f64,
    damage_dealt: f64,
}

impl<'a> Fighter<'a> {
    fn new(snapshot: &'a Combatant, stance: Stance, config: &CombatConfig) -> Self {
        let weapons = snapshot.loadout.attacking_weapons();
        let first_cooldown = weapons
            .first()
            .map(|w| {
                formulas::attack_cooldown(
                    w.cooldown,
                    snapshot.attributes.attack_speed,
                    config.tick_seconds,
                )
            })
            .unwrap_or(config.max_duration_seconds);
        Self {
            snapshot,
            stance,
            weapons,
            next_weapon: 0,
            next_attack_at: first_cooldown,
            hp: snapshot.hp.clamp(0.0, snapshot.max_hp),
            shield: snapshot.shield.clamp(0.0, snapshot.max_shield),
            damage_dealt: 0.0,
        }
    }

    fn id(&self) -> RobotId {
        self.snapshot.id
    }

    /// Weapon for the next attack; dual wield alternates.
    fn take_weapon(&mut self) -> Option<&'a Weapon> {
        let weapon = self.weapons.get(self.next_weapon).copied()?;
        self.next_weapon = (self.next_weapon + 1) % self.weapons.len();
        Some(weapon)
    }

    /// Weapon a counter-attack is made with (does not advance the rotation).
    fn ready_weapon(&self) -> Option<&'a Weapon> {
        self.weapons.get(self.next_weapon).copied()
    }

    fn hp_percent(&self) -> f64 {
        self.hp / self.snapshot.max_hp * 100.0
    }

    /// Take a damage split; shield and HP never go below zero.
    fn absorb(&mut self, split: &DamageSplit) {
        self.shield = (self.shield - split.shield_damage).max(0.0);
        self.hp = (self.hp - split.hp_damage).max(0.0);
    }
}

/// Accumulates the event log while a battle runs.
struct Log {
    events: Vec<CombatEvent>,
}

impl Log {
    fn push(
        &mut self,
        time: f64,
        actor: RobotId,
        target: &Fighter,
        before: (f64, f64),
        kind: CombatEventKind,
    ) {
        self.events.push(CombatEvent {
            timestamp: time,
            actor_id: actor,
            target_id: target.id(),
            hp_before: before.0,
            hp_after: target.hp,
            shield_before: before.1,
            shield_after: target.shield,
            kind,
        });
    }

    /// Event the subject does to itself (regen, yield, destroyed).
    fn push_self(&mut self, time: f64, subject: &Fighter, before: (f64, f64), kind: CombatEventKind) {
        self.push(time, subject.id(), subject, before, kind);
    }
}

/// Run one battle.
///
/// Loadouts are validated first; an invalid loadout is rejected before any
/// simulation happens. The inputs are not modified.
pub fn resolve(
    robot1: &Combatant,
    robot2: &Combatant,
    stance1: Stance,
    stance2: Stance,
    seed: u64,
    config: &CombatConfig,
) -> Result<BattleResult, ConfigurationError> {
    robot1.loadout.validate()?;
    robot2.loadout.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut fighters = [
        Fighter::new(robot1, stance1, config),
        Fighter::new(robot2, stance2, config),
    ];
    let mut log = Log { events: Vec::new() };

    let tick = config.tick_seconds;
    let max_ticks = (config.max_duration_seconds / tick).round().max(1.0) as u64;
    let regen_every = (config.shield_regen_interval_seconds / tick).round().max(1.0) as u64;

    let mut ending = disabled_at_start(&fighters, &mut log);
    let mut elapsed = 0.0;

    'clock: for step in 1..=max_ticks {
        if ending.is_some() {
            break;
        }
        let time = round_time(step as f64 * tick);
        elapsed = time;

        if step % regen_every == 0 {
            for fighter in fighters.iter_mut() {
                regenerate(fighter, time, regen_every as f64 * tick, &mut log);
            }
        }

        for side in 0..2 {
            let (attacker, defender) = pair_mut(&mut fighters, side);
            if attacker.hp <= 0.0 || attacker.next_attack_at > time + TIME_EPSILON {
                continue;
            }
            if let Some(end) = act(attacker, defender, time, &mut rng, &mut log, config) {
                ending = Some(end);
                break 'clock;
            }
        }
    }

    let [f1, f2] = fighters;
    let ending = ending.unwrap_or(BattleEnding::TimeLimit);
    let winner_id = match ending {
        BattleEnding::Destroyed { robot_id } | BattleEnding::Yielded { robot_id } => {
            Some(if robot_id == f1.id() { f2.id() } else { f1.id() })
        }
        _ => None,
    };

    Ok(BattleResult {
        robot1_id: f1.id(),
        robot2_id: Some(f2.id()),
        winner_id,
        robot1_final_hp: f1.hp,
        robot2_final_hp: f2.hp,
        robot1_final_shield: f1.shield,
        robot2_final_shield: f2.shield,
        robot1_damage_dealt: f1.damage_dealt,
        robot2_damage_dealt: f2.damage_dealt,
        ending,
        duration_seconds: elapsed,
        ratings: None,
        events: log.events,
    })
}

/// A robot carried into the battle at 0 HP is destroyed before the first tick
/// and never acts. Both at 0 HP is a draw.
fn disabled_at_start(fighters: &[Fighter; 2], log: &mut Log) -> Option<BattleEnding> {
    let down: Vec<&Fighter> = fighters.iter().filter(|f| f.hp <= 0.0).collect();
    for fighter in &down {
        log.push_self(
            0.0,
            fighter,
            (fighter.hp, fighter.shield),
            CombatEventKind::Destroyed,
        );
    }
    match down.as_slice() {
        [] => None,
        [only] => Some(BattleEnding::Destroyed {
            robot_id: only.id(),
        }),
        _ => Some(BattleEnding::BothDestroyed),
    }
}

/// Timestamps are reported on a microsecond grid so tick sums print cleanly.
fn round_time(t: f64) -> f64 {
    (t * 1_000_000.0).round() / 1_000_000.0
}

fn pair_mut<'f, 'a>(
    fighters: &'f mut [Fighter<'a>; 2],
    attacker: usize,
) -> (&'f mut Fighter<'a>, &'f mut Fighter<'a>) {
    let (first, second) = fighters.split_at_mut(1);
    if attacker == 0 {
        (&mut first[0], &mut second[0])
    } else {
        (&mut second[0], &mut first[0])
    }
}

/// Shield regen for one interval, capped at max shield. HP never regenerates.
fn regenerate(fighter: &mut Fighter, time: f64, interval: f64, log: &mut Log) {
    let missing = fighter.snapshot.max_shield - fighter.shield;
    if missing <= 0.0 {
        return;
    }
    let breakdown = formulas::shield_regen(&fighter.snapshot.attributes, fighter.stance, interval);
    let amount = breakdown.result.min(missing);
    if amount <= 0.0 {
        return;
    }
    let before = (fighter.hp, fighter.shield);
    fighter.shield += amount;
    let breakdown = FormulaBreakdown {
        result: amount,
        ..breakdown.with("maxShield", fighter.snapshot.max_shield)
    };
    log.push_self(
        time,
        fighter,
        before,
        CombatEventKind::ShieldRegen {
            formula_breakdown: breakdown,
        },
    );
}

/// One attack by `attacker`, including the defender's possible counter.
/// Returns how the battle ended if this action ended it.
fn act(
    attacker: &mut Fighter,
    defender: &mut Fighter,
    time: f64,
    rng: &mut ChaCha8Rng,
    log: &mut Log,
    config: &CombatConfig,
) -> Option<BattleEnding> {
    let Some(weapon) = attacker.take_weapon() else {
        attacker.next_attack_at = f64::INFINITY;
        return None;
    };
    attacker.next_attack_at = time
        + formulas::attack_cooldown(
            weapon.cooldown,
            attacker.snapshot.attributes.attack_speed,
            config.tick_seconds,
        );

    let (attacker_snapshot, defender_snapshot) = (attacker.snapshot, defender.snapshot);
    let att = &attacker_snapshot.attributes;
    let def = &defender_snapshot.attributes;
    let variance = config.roll_variance.abs();

    let hit = formulas::hit_chance(att, def, attacker.stance, rng.gen_range(-variance..=variance), config);
    let hit_roll = rng.gen_range(0.0..100.0);
    if hit_roll >= hit.result {
        let before = (defender.hp, defender.shield);
        log.push(
            time,
            attacker.id(),
            defender,
            before,
            CombatEventKind::Miss {
                weapon: weapon.name.clone(),
                formula_breakdown: hit.with("roll", hit_roll),
            },
        );
        return None;
    }

    let kind = attacker_snapshot.loadout.kind;
    let base = formulas::base_damage(weapon.base_damage, att, kind, attacker.stance);
    let crit = formulas::crit_chance(att, kind, rng.gen_range(-variance..=variance), config);
    let crit_roll = rng.gen_range(0.0..100.0);
    let is_crit = crit_roll < crit.result;
    let multiplier = if is_crit {
        formulas::crit_multiplier(kind, def, config)
    } else {
        1.0
    };
    let damage = base.result * multiplier;

    let (split, applied) = formulas::split_damage(damage, att, def, defender.shield, config);
    let before = (defender.hp, defender.shield);
    defender.absorb(&split);
    attacker.damage_dealt += split.total();

    let mut breakdown = merge(&base, applied)
        .with("critMultiplier", multiplier)
        .with("hitChance", hit.result)
        .with("hitRoll", hit_roll)
        .with("critChance", crit.result)
        .with("critRoll", crit_roll);
    breakdown.calculation = format!("({}) x {:.2} crit -> {}", base.calculation, multiplier, breakdown.calculation);
    let weapon_name = weapon.name.clone();
    let event = if is_crit {
        CombatEventKind::Critical {
            weapon: weapon_name,
            shield_damage: split.shield_damage,
            hp_damage: split.hp_damage,
            formula_breakdown: breakdown,
        }
    } else {
        CombatEventKind::Attack {
            weapon: weapon_name,
            shield_damage: split.shield_damage,
            hp_damage: split.hp_damage,
            formula_breakdown: breakdown,
        }
    };
    log.push(time, attacker.id(), defender, before, event);
    shield_break(attacker.id(), defender, before.1, time, log);

    if let Some(end) = check_end(defender, time, log) {
        return Some(end);
    }

    // Defender is still standing: it may counter.
    let counter_pct = formulas::counter_chance(
        def,
        defender.stance,
        defender_snapshot.loadout.kind,
        config,
    );
    let counter_roll = rng.gen_range(0.0..100.0);
    if counter_roll < counter_pct {
        if let Some(counter_weapon) = defender.ready_weapon() {
            let counter_base = formulas::base_damage(
                counter_weapon.base_damage,
                def,
                defender_snapshot.loadout.kind,
                defender.stance,
            );
            let counter_damage = counter_base.result * config.counter_damage_factor;
            let (split, applied) =
                formulas::split_damage(counter_damage, def, att, attacker.shield, config);
            let before = (attacker.hp, attacker.shield);
            attacker.absorb(&split);
            defender.damage_dealt += split.total();

            let mut breakdown = merge(&counter_base, applied)
                .with("counterFactor", config.counter_damage_factor)
                .with("counterChance", counter_pct)
                .with("counterRoll", counter_roll);
            breakdown.calculation = format!(
                "({}) x {:.2} counter -> {}",
                counter_base.calculation, config.counter_damage_factor, breakdown.calculation
            );
            log.push(
                time,
                defender.id(),
                attacker,
                before,
                CombatEventKind::Counter {
                    weapon: counter_weapon.name.clone(),
                    shield_damage: split.shield_damage,
                    hp_damage: split.hp_damage,
                    formula_breakdown: breakdown,
                },
            );
            shield_break(defender.id(), attacker, before.1, time, log);

            if let Some(end) = check_end(attacker, time, log) {
                return Some(end);
            }
        }
    }

    None
}

/// Damage breakdown: split terms plus the base damage terms.
fn merge(base: &FormulaBreakdown, mut applied: FormulaBreakdown) -> FormulaBreakdown {
    for (name, value) in &base.components {
        applied.components.insert(name.clone(), *value);
    }
    applied.components.insert("baseDamage".to_string(), base.result);
    applied
}

fn shield_break(actor: RobotId, target: &Fighter, shield_before: f64, time: f64, log: &mut Log) {
    if shield_before > 0.0 && target.shield <= 0.0 {
        log.push(
            time,
            actor,
            target,
            (target.hp, shield_before),
            CombatEventKind::ShieldBreak,
        );
    }
}

/// Yield is checked before destruction: a robot at 0 < HP% <= threshold surrenders.
fn check_end(subject: &Fighter, time: f64, log: &mut Log) -> Option<BattleEnding> {
    let before = (subject.hp, subject.shield);
    if subject.hp <= 0.0 {
        log.push_self(time, subject, before, CombatEventKind::Destroyed);
        return Some(BattleEnding::Destroyed {
            robot_id: subject.id(),
        });
    }
    let hp_percent = subject.hp_percent();
    if hp_percent > 0.0 && hp_percent <= subject.snapshot.yield_threshold {
        log.push_self(
            time,
            subject,
            before,
            CombatEventKind::Yield {
                threshold: subject.snapshot.yield_threshold,
                hp_percent,
            },
        );
        return Some(BattleEnding::Yielded {
            robot_id: subject.id(),
        });
    }
    None
}
