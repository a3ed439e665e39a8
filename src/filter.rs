//! Row and column filtering ahead of feature engineering.

use crate::config::FilterConfig;
use crate::table::RawTable;
use std::collections::HashSet;

/// Counts of what each filtering step removed or filled
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilterReport {
    pub input_rows: usize,
    pub duplicates: usize,
    pub below_min_exposure: usize,
    pub excluded_period: usize,
    pub dropped_columns: Vec<String>,
    pub zero_filled_cells: usize,
    /// Blank cells outside the zero-fill list that took the default.
    pub imputed_cells: usize,
}

impl FilterReport {
    pub fn output_rows(&self) -> usize {
        self.input_rows - self.duplicates - self.below_min_exposure - self.excluded_period
    }
}

/// Drops duplicate and low-sample rows and normalizes the column set.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    config: FilterConfig,
}

impl RecordFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Runs every step in order; afterwards no stat cell is blank.
    pub fn apply(&self, table: &mut RawTable) -> FilterReport {
        let mut report = FilterReport {
            input_rows: table.len(),
            ..FilterReport::default()
        };

        report.duplicates = self.drop_duplicates(table);
        log::info!(
            "Records after dropping duplicates: {} -> {}",
            report.input_rows,
            table.len()
        );

        let before = table.len();
        report.below_min_exposure = self.drop_low_exposure(table);
        log::info!(
            "Records with at least {} minutes: {} -> {}",
            self.config.min_exposure,
            before,
            table.len()
        );

        report.excluded_period = self.drop_excluded_periods(table);
        if report.excluded_period > 0 {
            log::info!(
                "Dropped {} records from excluded scouting periods",
                report.excluded_period
            );
        }

        let columns_before = table.columns.len();
        report.dropped_columns = self.drop_pattern_columns(table);
        log::info!(
            "Columns after dropping {:?}: {} -> {}",
            self.config.drop_column_patterns,
            columns_before,
            table.columns.len()
        );

        let (zero_filled, imputed) = self.fill_missing(table);
        report.zero_filled_cells = zero_filled;
        report.imputed_cells = imputed;
        if imputed > 0 {
            log::warn!(
                "Filled {} blank cells outside the zero-fill list with {}",
                imputed,
                self.config.default_fill
            );
        }

        for rec in &mut table.records {
            rec.period = None;
        }
        report
    }

    /// Removes rows identical in every field to an earlier row.
    pub fn drop_duplicates(&self, table: &mut RawTable) -> usize {
        let before = table.len();
        let mut seen = HashSet::new();
        table.records.retain(|r| {
            let cells: Vec<Option<u64>> = r.stats.iter().map(|v| v.map(f64::to_bits)).collect();
            seen.insert((r.player.clone(), r.minutes.to_bits(), r.period.clone(), cells))
        });
        before - table.len()
    }

    pub fn drop_low_exposure(&self, table: &mut RawTable) -> usize {
        let before = table.len();
        let min = self.config.min_exposure;
        table.records.retain(|r| r.minutes >= min);
        before - table.len()
    }

    pub fn drop_excluded_periods(&self, table: &mut RawTable) -> usize {
        let before = table.len();
        let excluded = &self.config.excluded_periods;
        table
            .records
            .retain(|r| r.period.as_ref().map_or(true, |p| !excluded.contains(p)));
        before - table.len()
    }

    /// Drops columns whose name contains a configured pattern; returns their names.
    pub fn drop_pattern_columns(&self, table: &mut RawTable) -> Vec<String> {
        let patterns = &self.config.drop_column_patterns;
        let dropped: Vec<String> = table
            .columns
            .iter()
            .filter(|c| patterns.iter().any(|p| c.contains(p.as_str())))
            .cloned()
            .collect();
        table.retain_columns(|c| !patterns.iter().any(|p| c.contains(p.as_str())));
        dropped
    }

    /// Zero-fills listed columns that exist, then fills every other blank cell.
    ///
    /// Returns `(zero_filled, imputed)` cell counts.
    pub fn fill_missing(&self, table: &mut RawTable) -> (usize, usize) {
        let zero_cols: HashSet<usize> = self
            .config
            .zero_fill_columns
            .iter()
            .filter_map(|c| table.column_index(c))
            .collect();

        let mut zero_filled = 0;
        let mut imputed = 0;
        for rec in &mut table.records {
            for (idx, cell) in rec.stats.iter_mut().enumerate() {
                if cell.is_some() {
                    continue;
                }
                if zero_cols.contains(&idx) {
                    *cell = Some(0.0);
                    zero_filled += 1;
                } else {
                    *cell = Some(self.config.default_fill);
                    imputed += 1;
                }
            }
        }
        (zero_filled, imputed)
    }
}
