//! Derived ratio and sum features computed from raw per-90 counts.

use crate::table::RawTable;
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// `name = numerator / denominator`; both sources are consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioFeature {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

/// `name = summands[0] + summands[1] + ...`; sources are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumFeature {
    pub name: String,
    pub summands: Vec<String>,
}

/// The engineered-feature recipe table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub ratios: Vec<RatioFeature>,
    #[serde(default)]
    pub sums: Vec<SumFeature>,
}

impl Default for Recipe {
    fn default() -> Self {
        Recipe {
            ratios: vec![
                RatioFeature::new("Finishing_Efficiency", "Per90_Goals", "Per90_Goals - xG"),
                RatioFeature::new("Assist_Efficiency", "Per90_Assists", "Per90_xA: Expected Assists"),
            ],
            sums: Vec::new(),
        }
    }
}

impl Recipe {
    pub fn empty() -> Self {
        Recipe {
            ratios: Vec::new(),
            sums: Vec::new(),
        }
    }
}

impl RatioFeature {
    pub fn new(name: &str, numerator: &str, denominator: &str) -> Self {
        RatioFeature {
            name: name.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
        }
    }
}

impl SumFeature {
    pub fn new(name: &str, summands: &[&str]) -> Self {
        SumFeature {
            name: name.to_string(),
            summands: summands.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Division where an undefined result (x/0, 0/0) reads as "no efficiency observed".
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Outcome of one engineering pass
#[derive(Debug, Default)]
pub struct EngineerReport {
    pub derived: Vec<String>,
    /// Always `PipelineError::MissingColumn`.
    pub skipped: Vec<PipelineError>,
    pub consumed: Vec<String>,
}

impl EngineerReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Applies a `Recipe` to a raw table in place.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    recipe: Recipe,
}

impl FeatureEngineer {
    pub fn new(recipe: Recipe) -> Self {
        Self { recipe }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Derives every feature whose sources exist, then removes consumed ratio sources.
    ///
    /// All derivations read the table as it was on entry, so two ratios may
    /// share a source column.
    pub fn apply(&self, table: &mut RawTable) -> EngineerReport {
        let mut report = EngineerReport::default();
        let mut derived: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        let mut consumed: Vec<String> = Vec::new();

        for ratio in &self.recipe.ratios {
            let (num, den) = match (
                require(table, &ratio.name, &ratio.numerator),
                require(table, &ratio.name, &ratio.denominator),
            ) {
                (Ok(n), Ok(d)) => (n, d),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Skipping derived feature: {}", e);
                    report.skipped.push(e);
                    continue;
                }
            };

            let values = table
                .records
                .iter()
                .map(|r| match (r.stats[num], r.stats[den]) {
                    (Some(n), Some(d)) => Some(safe_ratio(n, d)),
                    // blank source cells are undefined ratios too
                    _ => Some(0.0),
                })
                .collect();
            derived.push((ratio.name.clone(), values));
            for source in [&ratio.numerator, &ratio.denominator] {
                if !consumed.contains(source) {
                    consumed.push(source.clone());
                }
            }
        }

        for sum in &self.recipe.sums {
            let indices: Result<Vec<usize>, PipelineError> = sum
                .summands
                .iter()
                .map(|col| require(table, &sum.name, col))
                .collect();
            let indices = match indices {
                Ok(idx) => idx,
                Err(e) => {
                    log::warn!("Skipping derived feature: {}", e);
                    report.skipped.push(e);
                    continue;
                }
            };

            let values = table
                .records
                .iter()
                .map(|r| indices.iter().map(|&i| r.stats[i]).sum::<Option<f64>>())
                .collect();
            derived.push((sum.name.clone(), values));
        }

        let outputs: HashSet<&str> = derived.iter().map(|(n, _)| n.as_str()).collect();
        consumed.retain(|c| !outputs.contains(c.as_str()));
        let removed: HashSet<&str> = consumed.iter().map(String::as_str).collect();
        table.retain_columns(|c| !removed.contains(c));

        for (name, values) in derived {
            table.set_column(&name, values);
            report.derived.push(name);
        }
        report.consumed = consumed;

        log::info!(
            "Derived {} features ({} skipped, {} source columns consumed)",
            report.derived.len(),
            report.skipped.len(),
            report.consumed.len()
        );
        report
    }
}

fn require(table: &RawTable, feature: &str, column: &str) -> Result<usize, PipelineError> {
    table
        .column_index(column)
        .ok_or_else(|| PipelineError::MissingColumn {
            feature: feature.to_string(),
            column: column.to_string(),
        })
}
