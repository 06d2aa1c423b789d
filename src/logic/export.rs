//! CSV export of a battle's event log, one row per event.

use crate::models::BattleResult;

const HEADER: [&str; 11] = [
    "timestamp",
    "type",
    "actor_id",
    "target_id",
    "hp_before",
    "hp_after",
    "shield_before",
    "shield_after",
    "damage",
    "calculation",
    "result",
];

/// Render the events of `battle` as CSV with a header row.
pub fn events_to_csv(battle: &BattleResult) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for event in &battle.events {
        let damage = event
            .kind
            .damage()
            .map(|(shield, hp)| format!("{:.2}", shield + hp))
            .unwrap_or_default();
        let (calculation, result) = match event.formula_breakdown() {
            Some(b) => (b.calculation.clone(), format!("{:.2}", b.result)),
            None => (String::new(), String::new()),
        };
        writer.write_record([
            format!("{:.1}", event.timestamp),
            event.type_name().to_string(),
            event.actor_id.to_string(),
            event.target_id.to_string(),
            format!("{:.2}", event.hp_before),
            format!("{:.2}", event.hp_after),
            format!("{:.2}", event.shield_before),
            format!("{:.2}", event.shield_after),
            damage,
            calculation,
            result,
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CombatEvent, CombatEventKind, FormulaBreakdown};
    use uuid::Uuid;

    #[test]
    fn one_row_per_event_plus_header() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let mut battle = BattleResult::bye(a);
        battle.events = vec![
            CombatEvent {
                timestamp: 3.0,
                actor_id: a,
                target_id: b,
                hp_before: 100.0,
                hp_after: 88.0,
                shield_before: 0.0,
                shield_after: 0.0,
                kind: CombatEventKind::Attack {
                    weapon: "Laser".into(),
                    shield_damage: 0.0,
                    hp_damage: 12.0,
                    formula_breakdown: FormulaBreakdown::new("max(1, 12.0 - 0.0 armor)", 12.0),
                },
            },
            CombatEvent {
                timestamp: 3.0,
                actor_id: b,
                target_id: b,
                hp_before: 88.0,
                hp_after: 88.0,
                shield_before: 0.0,
                shield_after: 0.0,
                kind: CombatEventKind::Yield {
                    threshold: 90.0,
                    hp_percent: 88.0,
                },
            },
        ];
        let csv = events_to_csv(&battle).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,type,actor_id"));
        assert!(lines[1].contains(",attack,"));
        assert!(lines[1].contains("12.00"));
        assert!(lines[2].contains(",yield,"));
    }

    #[test]
    fn empty_battle_has_only_header() {
        let csv = events_to_csv(&BattleResult::bye(Uuid::from_u128(1))).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
