//! Tunable constants for combat, rating, leagues and tournaments.
//!
//! Every field has a default, so a config file only needs the values it changes.

use crate::models::LeagueTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Smallest bracket a tournament may be configured for.
pub const MIN_PARTICIPANTS: usize = 4;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {e}"),
            Self::Parse(e) => write!(f, "cannot parse config: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArenaConfig {
    pub combat: CombatConfig,
    pub rating: RatingConfig,
    pub league: LeagueConfig,
    pub tournament: TournamentConfig,
}

/// Combat loop and formula constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombatConfig {
    /// Simulation step in seconds.
    pub tick_seconds: f64,
    /// Battles still running at this point end in a draw.
    pub max_duration_seconds: f64,
    pub shield_regen_interval_seconds: f64,
    pub base_hit_chance: f64,
    pub min_hit_chance: f64,
    pub max_hit_chance: f64,
    /// Uniform random spread added to hit and crit rolls, +/- this many points.
    pub roll_variance: f64,
    pub base_crit_chance: f64,
    pub max_crit_chance: f64,
    pub min_crit_multiplier: f64,
    /// Fraction of damage that lands on an active shield.
    pub shield_absorption: f64,
    /// Fraction of shield overflow that reaches HP.
    pub bleed_through: f64,
    pub counter_damage_factor: f64,
    pub max_counter_chance: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 0.1,
            max_duration_seconds: 120.0,
            shield_regen_interval_seconds: 1.0,
            base_hit_chance: 70.0,
            min_hit_chance: 10.0,
            max_hit_chance: 95.0,
            roll_variance: 10.0,
            base_crit_chance: 5.0,
            max_crit_chance: 50.0,
            min_crit_multiplier: 1.2,
            shield_absorption: 0.7,
            bleed_through: 0.3,
            counter_damage_factor: 0.7,
            max_counter_chance: 40.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RatingConfig {
    pub k_factor: f64,
    pub starting_elo: i32,
    /// Ratings never drop below this.
    pub min_elo: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            starting_elo: 1200,
            min_elo: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeagueConfig {
    pub win_points: i32,
    pub loss_points: i32,
    pub draw_points: i32,
    /// Battles a robot must play in its tier before it can move.
    pub min_battles_in_tier: u32,
    /// Points at or above which a robot is promoted out of the tier.
    pub promote_at: BTreeMap<LeagueTier, u32>,
    /// Points below which a robot is demoted out of the tier.
    pub demote_below: BTreeMap<LeagueTier, u32>,
    /// Points a robot starts with after moving tier.
    pub reset_points: u32,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            win_points: 3,
            loss_points: -1,
            draw_points: 1,
            min_battles_in_tier: 5,
            promote_at: BTreeMap::from([
                (LeagueTier::Bronze, 20),
                (LeagueTier::Silver, 25),
                (LeagueTier::Gold, 30),
                (LeagueTier::Platinum, 35),
                (LeagueTier::Diamond, 40),
            ]),
            demote_below: BTreeMap::from([
                (LeagueTier::Silver, 5),
                (LeagueTier::Gold, 8),
                (LeagueTier::Platinum, 10),
                (LeagueTier::Diamond, 12),
                (LeagueTier::Champion, 15),
            ]),
            reset_points: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TournamentConfig {
    pub min_participants: usize,
    /// Eligible robots needed before a tournament is created automatically.
    pub auto_create_threshold: usize,
    /// Fraction of max HP a robot needs to be entered.
    pub readiness_hp_fraction: f64,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            min_participants: 4,
            auto_create_threshold: 8,
            readiness_hp_fraction: 0.75,
        }
    }
}

impl ArenaConfig {
    /// Read and validate a JSON config file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: ArenaConfig = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.combat;
        let numbers = [
            ("combat.tickSeconds", c.tick_seconds),
            ("combat.maxDurationSeconds", c.max_duration_seconds),
            ("combat.shieldRegenIntervalSeconds", c.shield_regen_interval_seconds),
            ("combat.baseHitChance", c.base_hit_chance),
            ("combat.minHitChance", c.min_hit_chance),
            ("combat.maxHitChance", c.max_hit_chance),
            ("combat.rollVariance", c.roll_variance),
            ("combat.baseCritChance", c.base_crit_chance),
            ("combat.maxCritChance", c.max_crit_chance),
            ("combat.minCritMultiplier", c.min_crit_multiplier),
            ("combat.shieldAbsorption", c.shield_absorption),
            ("combat.bleedThrough", c.bleed_through),
            ("combat.counterDamageFactor", c.counter_damage_factor),
            ("combat.maxCounterChance", c.max_counter_chance),
            ("rating.kFactor", self.rating.k_factor),
            ("tournament.readinessHpFraction", self.tournament.readiness_hp_fraction),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be a finite number")));
            }
        }
        // Percentages, fractions and factors the combat loop draws against.
        let non_negative = [
            ("combat.minHitChance", c.min_hit_chance),
            ("combat.rollVariance", c.roll_variance),
            ("combat.maxCritChance", c.max_crit_chance),
            ("combat.shieldAbsorption", c.shield_absorption),
            ("combat.bleedThrough", c.bleed_through),
            ("combat.counterDamageFactor", c.counter_damage_factor),
            ("combat.maxCounterChance", c.max_counter_chance),
            ("tournament.readinessHpFraction", self.tournament.readiness_hp_fraction),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be >= 0")));
            }
        }
        if !(c.tick_seconds > 0.0) {
            return Err(ConfigError::Invalid("combat.tickSeconds must be > 0".into()));
        }
        if c.max_duration_seconds < c.tick_seconds {
            return Err(ConfigError::Invalid(
                "combat.maxDurationSeconds must be at least one tick".into(),
            ));
        }
        if !(c.shield_regen_interval_seconds > 0.0) {
            return Err(ConfigError::Invalid(
                "combat.shieldRegenIntervalSeconds must be > 0".into(),
            ));
        }
        if c.min_hit_chance > c.max_hit_chance {
            return Err(ConfigError::Invalid(
                "combat.minHitChance exceeds combat.maxHitChance".into(),
            ));
        }
        if c.min_crit_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "combat.minCritMultiplier must be >= 1".into(),
            ));
        }
        if self.rating.k_factor < 0.0 {
            return Err(ConfigError::Invalid("rating.kFactor must be >= 0".into()));
        }
        if self.rating.min_elo < 0 {
            return Err(ConfigError::Invalid("rating.minElo must be >= 0".into()));
        }
        if self.tournament.min_participants < MIN_PARTICIPANTS {
            return Err(ConfigError::Invalid(format!(
                "tournament.minParticipants must be >= {MIN_PARTICIPANTS}"
            )));
        }
        for (tier, promote) in &self.league.promote_at {
            if let Some(demote) = self.league.demote_below.get(tier) {
                if demote >= promote {
                    return Err(ConfigError::Invalid(format!(
                        "league thresholds for {tier} overlap"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ArenaConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = ArenaConfig::from_json(r#"{ "rating": { "kFactor": 16 } }"#).unwrap();
        assert_eq!(config.rating.k_factor, 16.0);
        assert_eq!(config.rating.min_elo, 100);
        assert_eq!(config.combat.max_duration_seconds, 120.0);
        assert_eq!(config.league.promote_at[&LeagueTier::Bronze], 20);
    }

    #[test]
    fn tier_thresholds_parse_from_names() {
        let config =
            ArenaConfig::from_json(r#"{ "league": { "promoteAt": { "bronze": 12 } } }"#).unwrap();
        assert_eq!(config.league.promote_at.get(&LeagueTier::Bronze), Some(&12));
        assert_eq!(config.league.promote_at.get(&LeagueTier::Silver), None);
    }

    #[test]
    fn zero_tick_is_rejected() {
        let result = ArenaConfig::from_json(r#"{ "combat": { "tickSeconds": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn negative_chance_caps_are_rejected() {
        for raw in [
            r#"{ "combat": { "maxCritChance": -1 } }"#,
            r#"{ "combat": { "maxCounterChance": -1 } }"#,
            r#"{ "combat": { "minHitChance": -1 } }"#,
            r#"{ "combat": { "rollVariance": -5 } }"#,
            r#"{ "combat": { "bleedThrough": -0.1 } }"#,
        ] {
            let result = ArenaConfig::from_json(raw);
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{raw}");
        }
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut config = ArenaConfig::default();
        config.combat.max_crit_chance = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ArenaConfig::default();
        config.combat.min_hit_chance = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ArenaConfig::default();
        config.combat.roll_variance = f64::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ArenaConfig::default();
        config.rating.k_factor = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn tournaments_need_at_least_four_entrants() {
        let result = ArenaConfig::from_json(r#"{ "tournament": { "minParticipants": 3 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        let config =
            ArenaConfig::from_json(r#"{ "tournament": { "minParticipants": 4 } }"#).unwrap();
        assert_eq!(config.tournament.min_participants, 4);
    }
}
