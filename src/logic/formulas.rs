//! Combat formulas. Each returns the value together with the breakdown that
//! produced it, so the event log can show every number's terms.
//!
//! Random rolls are passed in rather than drawn here; the resolver owns the rng.

use crate::config::CombatConfig;
use crate::models::{AttributeSet, FormulaBreakdown, LoadoutKind, Stance};

/// Seconds between attacks: weapon cooldown scaled down by attack speed,
/// never shorter than one tick.
pub fn attack_cooldown(weapon_cooldown: f64, attack_speed: f64, tick: f64) -> f64 {
    let scaled = weapon_cooldown.max(0.0) / (1.0 + attack_speed.max(0.0) / 50.0);
    scaled.max(tick)
}

/// Hit chance in percent. `variance_roll` is uniform in [-variance, variance].
pub fn hit_chance(
    attacker: &AttributeSet,
    defender: &AttributeSet,
    stance: Stance,
    variance_roll: f64,
    config: &CombatConfig,
) -> FormulaBreakdown {
    let targeting = attacker.targeting_systems / 2.0;
    let stance_bonus = if stance == Stance::Offensive { 5.0 } else { 0.0 };
    let evasion = defender.evasion_thrusters / 3.0;
    let gyro = defender.gyro_stabilizers / 5.0;
    let raw = config.base_hit_chance + targeting + stance_bonus - evasion - gyro + variance_roll;
    let result = raw.max(config.min_hit_chance).min(config.max_hit_chance);
    FormulaBreakdown::new(
        format!(
            "clamp({:.0} + {:.1} targeting + {:.0} stance - {:.1} evasion - {:.1} gyro + {:.1} variance, {:.0}, {:.0})",
            config.base_hit_chance,
            targeting,
            stance_bonus,
            evasion,
            gyro,
            variance_roll,
            config.min_hit_chance,
            config.max_hit_chance
        ),
        result,
    )
    .with("base", config.base_hit_chance)
    .with("targeting", targeting)
    .with("stanceBonus", stance_bonus)
    .with("evasion", -evasion)
    .with("gyro", -gyro)
    .with("variance", variance_roll)
}

/// Critical chance in percent. `variance_roll` is uniform in [-variance, variance].
pub fn crit_chance(
    attacker: &AttributeSet,
    loadout: LoadoutKind,
    variance_roll: f64,
    config: &CombatConfig,
) -> FormulaBreakdown {
    let critical = attacker.critical_systems / 8.0;
    let targeting = attacker.targeting_systems / 25.0;
    let loadout_bonus = if loadout == LoadoutKind::TwoHanded {
        10.0
    } else {
        0.0
    };
    let raw = config.base_crit_chance + critical + targeting + loadout_bonus + variance_roll;
    let result = raw.max(0.0).min(config.max_crit_chance);
    FormulaBreakdown::new(
        format!(
            "clamp({:.0} + {:.2} critical + {:.2} targeting + {:.0} loadout + {:.1} variance, 0, {:.0})",
            config.base_crit_chance,
            critical,
            targeting,
            loadout_bonus,
            variance_roll,
            config.max_crit_chance
        ),
        result,
    )
    .with("base", config.base_crit_chance)
    .with("critical", critical)
    .with("targeting", targeting)
    .with("loadoutBonus", loadout_bonus)
    .with("variance", variance_roll)
}

/// Damage multiplier for the loadout.
pub fn loadout_damage_multiplier(loadout: LoadoutKind) -> f64 {
    match loadout {
        LoadoutKind::TwoHanded => 1.25,
        LoadoutKind::DualWield => 0.90,
        LoadoutKind::Single | LoadoutKind::WeaponShield => 1.0,
    }
}

/// Damage multiplier for the stance.
pub fn stance_damage_multiplier(stance: Stance) -> f64 {
    match stance {
        Stance::Offensive => 1.15,
        Stance::Defensive => 0.90,
        Stance::Balanced => 1.0,
    }
}

/// Damage before crits and defenses.
pub fn base_damage(
    weapon_base: f64,
    attacker: &AttributeSet,
    loadout: LoadoutKind,
    stance: Stance,
) -> FormulaBreakdown {
    let weapon = weapon_base.max(0.0);
    let power = 1.0 + attacker.combat_power / 100.0;
    let loadout_mult = loadout_damage_multiplier(loadout);
    let control = 1.0 + attacker.weapon_control / 100.0;
    let stance_mult = stance_damage_multiplier(stance);
    let result = weapon * power * loadout_mult * control * stance_mult;
    FormulaBreakdown::new(
        format!(
            "{:.1} weapon x {:.2} power x {:.2} loadout x {:.2} control x {:.2} stance",
            weapon, power, loadout_mult, control, stance_mult
        ),
        result,
    )
    .with("weaponBase", weapon)
    .with("combatPower", power)
    .with("loadout", loadout_mult)
    .with("weaponControl", control)
    .with("stance", stance_mult)
}

/// Critical multiplier, reduced by the defender's dampeners down to the configured floor.
pub fn crit_multiplier(loadout: LoadoutKind, defender: &AttributeSet, config: &CombatConfig) -> f64 {
    let base = if loadout == LoadoutKind::TwoHanded {
        2.5
    } else {
        2.0
    };
    (base - defender.damage_dampeners / 100.0).max(config.min_crit_multiplier)
}

/// Flat HP damage removed by armor, after the attacker's penetration.
pub fn armor_reduction(defender: &AttributeSet, attacker: &AttributeSet) -> f64 {
    (defender.armor_plating * (1.0 - attacker.penetration / 150.0)).max(0.0)
}

/// How one damage instance splits between shield and HP.
#[derive(Clone, Debug, PartialEq)]
pub struct DamageSplit {
    pub shield_damage: f64,
    pub hp_damage: f64,
}

impl DamageSplit {
    pub fn total(&self) -> f64 {
        self.shield_damage + self.hp_damage
    }
}

/// Apply `damage` to a defender with `shield` points up. Shield absorbs first,
/// a fraction of the overflow bleeds into HP, armor reduces what reaches HP.
/// Never negative; any HP hit does at least 1.
pub fn split_damage(
    damage: f64,
    attacker: &AttributeSet,
    defender: &AttributeSet,
    shield: f64,
    config: &CombatConfig,
) -> (DamageSplit, FormulaBreakdown) {
    let damage = damage.max(0.0);
    let armor = armor_reduction(defender, attacker);
    if shield > 0.0 {
        let penetration_factor = 1.0 + attacker.penetration / 200.0;
        let shield_hit = damage * config.shield_absorption * penetration_factor;
        let shield_damage = shield_hit.min(shield);
        let overflow = shield_hit - shield_damage;
        let hp_damage = if overflow > 0.0 {
            (overflow * config.bleed_through - armor).max(1.0)
        } else {
            0.0
        };
        let split = DamageSplit {
            shield_damage,
            hp_damage,
        };
        let breakdown = FormulaBreakdown::new(
            format!(
                "{:.1} to shield, overflow {:.1} x {:.2} - {:.1} armor = {:.1} HP",
                shield_damage, overflow, config.bleed_through, armor, hp_damage
            ),
            split.total(),
        )
        .with("damage", damage)
        .with("shieldAbsorption", config.shield_absorption)
        .with("penetrationFactor", penetration_factor)
        .with("shieldHit", shield_hit)
        .with("shieldDamage", shield_damage)
        .with("overflow", overflow)
        .with("bleedThrough", config.bleed_through)
        .with("armorReduction", armor)
        .with("hpDamage", hp_damage);
        (split, breakdown)
    } else {
        let hp_damage = (damage - armor).max(1.0);
        let split = DamageSplit {
            shield_damage: 0.0,
            hp_damage,
        };
        let breakdown = FormulaBreakdown::new(
            format!("max(1, {:.1} - {:.1} armor)", damage, armor),
            split.total(),
        )
        .with("damage", damage)
        .with("shieldDamage", 0.0)
        .with("armorReduction", armor)
        .with("hpDamage", hp_damage);
        (split, breakdown)
    }
}

/// Counter chance in percent for a defender.
pub fn counter_chance(
    defender: &AttributeSet,
    stance: Stance,
    loadout: LoadoutKind,
    config: &CombatConfig,
) -> f64 {
    let stance_mult = if stance == Stance::Defensive { 1.15 } else { 1.0 };
    let loadout_mult = if loadout == LoadoutKind::WeaponShield {
        1.10
    } else {
        1.0
    };
    (defender.counter_protocols * stance_mult * loadout_mult)
        .max(0.0)
        .min(config.max_counter_chance)
}

/// Shield regained over `interval` seconds, before capping at max shield.
pub fn shield_regen(attributes: &AttributeSet, stance: Stance, interval: f64) -> FormulaBreakdown {
    let per_second = attributes.power_core * 0.15;
    let stance_mult = if stance == Stance::Defensive { 1.20 } else { 1.0 };
    let result = (per_second * stance_mult * interval).max(0.0);
    FormulaBreakdown::new(
        format!(
            "{:.2}/s power core x {:.2} stance x {:.1}s",
            per_second, stance_mult, interval
        ),
        result,
    )
    .with("perSecond", per_second)
    .with("stance", stance_mult)
    .with("interval", interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(v: f64) -> AttributeSet {
        AttributeSet::uniform(v)
    }

    #[test]
    fn hit_chance_is_clamped() {
        let config = CombatConfig::default();
        let strong = attrs(200.0);
        let weak = attrs(0.0);
        let high = hit_chance(&strong, &weak, Stance::Offensive, 10.0, &config);
        assert_eq!(high.result, 95.0);
        let low = hit_chance(&weak, &strong, Stance::Balanced, -10.0, &config);
        assert_eq!(low.result, 10.0);
    }

    #[test]
    fn hit_chance_components_add_up() {
        let config = CombatConfig::default();
        let b = hit_chance(&attrs(10.0), &attrs(9.0), Stance::Balanced, 2.0, &config);
        let sum: f64 = b.components.values().sum();
        // 70 + 5 + 0 - 3 - 1.8 + 2
        assert!((sum - 72.2).abs() < 1e-9);
        assert!((b.result - 72.2).abs() < 1e-9);
    }

    #[test]
    fn base_damage_multiplies_terms() {
        let mut a = AttributeSet::default();
        a.combat_power = 20.0;
        let b = base_damage(20.0, &a, LoadoutKind::TwoHanded, Stance::Offensive);
        // 20 * 1.2 * 1.25 * 1.0 * 1.15
        assert!((b.result - 34.5).abs() < 1e-9);
    }

    #[test]
    fn crit_multiplier_has_floor() {
        let config = CombatConfig::default();
        let mut d = AttributeSet::default();
        d.damage_dampeners = 500.0;
        assert_eq!(crit_multiplier(LoadoutKind::Single, &d, &config), 1.2);
        assert_eq!(
            crit_multiplier(LoadoutKind::TwoHanded, &AttributeSet::default(), &config),
            2.5
        );
    }

    #[test]
    fn unshielded_hit_does_at_least_one() {
        let config = CombatConfig::default();
        let mut defender = AttributeSet::default();
        defender.armor_plating = 100.0;
        let (split, breakdown) =
            split_damage(5.0, &AttributeSet::default(), &defender, 0.0, &config);
        assert_eq!(split.hp_damage, 1.0);
        assert_eq!(breakdown.result, 1.0);
    }

    #[test]
    fn shield_absorbs_before_hp() {
        let config = CombatConfig::default();
        let none = AttributeSet::default();
        let (split, _) = split_damage(10.0, &none, &none, 50.0, &config);
        assert!((split.shield_damage - 7.0).abs() < 1e-9);
        assert_eq!(split.hp_damage, 0.0);

        let (split, breakdown) = split_damage(100.0, &none, &none, 20.0, &config);
        assert_eq!(split.shield_damage, 20.0);
        // overflow 50 * 0.3
        assert!((split.hp_damage - 15.0).abs() < 1e-9);
        assert!((breakdown.component("overflow") - 50.0).abs() < 1e-9);
    }

    /// Rebuild an applied split from its own components and the shield it hit.
    fn recompute(b: &FormulaBreakdown, shield: f64) -> f64 {
        let damage = b.component("damage");
        let armor = b.component("armorReduction");
        if shield > 0.0 {
            let hit = damage * b.component("shieldAbsorption") * b.component("penetrationFactor");
            let absorbed = hit.min(shield);
            let overflow = hit - absorbed;
            let hp = if overflow > 0.0 {
                (overflow * b.component("bleedThrough") - armor).max(1.0)
            } else {
                0.0
            };
            absorbed + hp
        } else {
            (damage - armor).max(1.0)
        }
    }

    #[test]
    fn split_result_follows_from_components() {
        let config = CombatConfig::default();
        let mut attacker = AttributeSet::default();
        attacker.penetration = 40.0;
        let mut defender = AttributeSet::default();
        defender.armor_plating = 6.0;
        for (damage, shield) in [(30.0, 0.0), (30.0, 50.0), (120.0, 25.0), (2.0, 0.0)] {
            let (split, b) = split_damage(damage, &attacker, &defender, shield, &config);
            assert!((recompute(&b, shield) - b.result).abs() < 1e-9);
            assert!((split.total() - b.result).abs() < 1e-9);
        }
    }

    #[test]
    fn bad_limits_do_not_panic() {
        let config = CombatConfig {
            min_hit_chance: 50.0,
            max_hit_chance: 10.0,
            max_crit_chance: -1.0,
            max_counter_chance: -1.0,
            ..CombatConfig::default()
        };
        let a = attrs(10.0);
        assert_eq!(hit_chance(&a, &a, Stance::Balanced, 0.0, &config).result, 10.0);
        assert_eq!(crit_chance(&a, LoadoutKind::Single, 0.0, &config).result, -1.0);
        assert_eq!(counter_chance(&a, Stance::Balanced, LoadoutKind::Single, &config), -1.0);
    }

    #[test]
    fn counter_chance_is_capped() {
        let config = CombatConfig::default();
        let mut d = AttributeSet::default();
        d.counter_protocols = 100.0;
        assert_eq!(
            counter_chance(&d, Stance::Defensive, LoadoutKind::WeaponShield, &config),
            40.0
        );
        d.counter_protocols = 10.0;
        assert!((counter_chance(&d, Stance::Balanced, LoadoutKind::Single, &config) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn cooldown_never_below_one_tick() {
        assert_eq!(attack_cooldown(0.0, 0.0, 0.1), 0.1);
        assert!((attack_cooldown(3.0, 50.0, 0.1) - 1.5).abs() < 1e-9);
    }
}
