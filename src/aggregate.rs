//! Minutes-weighted collapse of repeated per-player samples.

use crate::identity::Roster;
use crate::table::{PlayerTable, RawTable};
use crate::{PipelineError, Result};
use ndarray::Array2;
use std::collections::HashMap;

/// Collapses every record sharing a canonical player into one row.
///
/// Each feature becomes `sum(value_i * minutes_i) / sum(minutes_i)`, kept as a
/// running mean so a single-record group reproduces its values bit for bit.
/// Minutes are consumed as the weight and do not appear in the output. Groups
/// keep the order in which their first record appears.
///
/// Fails on a group whose total minutes are not positive, and on any blank or
/// non-finite cell, rather than producing an undefined mean.
pub fn aggregate(table: &RawTable, roster: &mut Roster) -> Result<PlayerTable> {
    if table.is_empty() {
        return Err(PipelineError::EmptyTable("aggregation"));
    }

    let width = table.columns.len();
    let mut group_of = HashMap::new();
    let mut keys = Vec::new();
    let mut means: Vec<Vec<f64>> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();

    for rec in &table.records {
        if !rec.minutes.is_finite() || rec.minutes < 0.0 {
            return Err(PipelineError::InvalidExposure {
                player: rec.player.clone(),
                minutes: rec.minutes,
            });
        }

        let key = roster.intern(&rec.player);
        let group = *group_of.entry(key).or_insert_with(|| {
            keys.push(key);
            means.push(vec![0.0; width]);
            weights.push(0.0);
            keys.len() - 1
        });

        weights[group] += rec.minutes;
        let share = if rec.minutes > 0.0 {
            rec.minutes / weights[group]
        } else {
            0.0
        };
        for (col, cell) in rec.stats.iter().enumerate() {
            let value = match cell {
                Some(v) if v.is_finite() => *v,
                _ => {
                    return Err(PipelineError::NonFinite {
                        player: rec.player.clone(),
                        column: table.columns[col].clone(),
                    })
                }
            };
            let mean = &mut means[group][col];
            *mean += share * (value - *mean);
        }
    }

    let mut players = Vec::with_capacity(keys.len());
    let mut values = Array2::<f64>::zeros((keys.len(), width));
    for (group, &key) in keys.iter().enumerate() {
        let player = roster
            .get(key)
            .cloned()
            .ok_or(PipelineError::EmptyTable("aggregation"))?;
        let total = weights[group];
        if total <= 0.0 {
            return Err(PipelineError::ZeroExposure {
                player: player.name,
                total,
            });
        }
        for col in 0..width {
            values[(group, col)] = means[group][col];
        }
        players.push(player);
    }

    log::info!(
        "Aggregated {} records into {} players",
        table.len(),
        players.len()
    );
    Ok(PlayerTable::new(players, table.columns.clone(), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RawRecord;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn record(player: &str, minutes: f64, stats: &[f64]) -> RawRecord {
        RawRecord {
            player: player.to_string(),
            minutes,
            period: None,
            stats: stats.iter().map(|&v| Some(v)).collect(),
        }
    }

    fn raw(columns: &[&str], records: Vec<RawRecord>) -> RawTable {
        RawTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            records,
        }
    }

    #[test]
    fn test_weighted_mean_by_minutes() {
        let t = raw(
            &["Per90_Goals"],
            vec![record("A. Smith", 450.0, &[1.0]), record("A. Smith", 600.0, &[2.0])],
        );

        let out = aggregate(&t, &mut Roster::new()).unwrap();

        assert_eq!(out.n_rows(), 1);
        assert_relative_eq!(out.values[(0, 0)], 1650.0 / 1050.0, epsilon = 1e-12);
    }

    #[test]
    fn test_equal_minutes_give_plain_mean() {
        let t = raw(
            &["x", "y"],
            vec![record("P", 900.0, &[1.0, 10.0]), record("P", 900.0, &[3.0, 20.0])],
        );

        let out = aggregate(&t, &mut Roster::new()).unwrap();

        assert_relative_eq!(out.values[(0, 0)], 2.0);
        assert_relative_eq!(out.values[(0, 1)], 15.0);
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let t = raw(
            &["x"],
            vec![
                record("Zed", 500.0, &[1.0]),
                record("Amy", 500.0, &[2.0]),
                record("Zed", 500.0, &[3.0]),
            ],
        );

        let out = aggregate(&t, &mut Roster::new()).unwrap();

        let names: Vec<&str> = out.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Zed", "Amy"]);
        assert_relative_eq!(out.values[(0, 0)], 2.0);
    }

    #[test]
    fn test_zero_exposure_group_fails_naming_player() {
        let t = raw(&["x"], vec![record("A. Smith", 500.0, &[1.0]), record("Ghost", 0.0, &[5.0])]);

        match aggregate(&t, &mut Roster::new()) {
            Err(PipelineError::ZeroExposure { player, total }) => {
                assert_eq!(player, "Ghost");
                assert_eq!(total, 0.0);
            }
            other => panic!("expected ZeroExposure, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_cell_is_rejected() {
        let mut t = raw(&["x"], vec![record("A", 500.0, &[1.0])]);
        t.records[0].stats[0] = None;

        assert!(matches!(
            aggregate(&t, &mut Roster::new()),
            Err(PipelineError::NonFinite { column, .. }) if column == "x"
        ));
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let t = raw(&["x"], Vec::new());
        assert!(matches!(
            aggregate(&t, &mut Roster::new()),
            Err(PipelineError::EmptyTable(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_single_record_group_is_unchanged(
            minutes in 1.0f64..5000.0,
            stats in proptest::collection::vec(-100.0f64..100.0, 1..12),
        ) {
            let columns: Vec<String> = (0..stats.len()).map(|i| format!("c{}", i)).collect();
            let t = RawTable {
                columns,
                records: vec![record("Solo", minutes, &stats)],
            };

            let out = aggregate(&t, &mut Roster::new()).unwrap();

            for (i, &v) in stats.iter().enumerate() {
                prop_assert_eq!(out.values[(0, i)], v);
            }
        }
    }
}
