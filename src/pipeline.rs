//! Runs every stage over one input table, start to finish.

use crate::aggregate::aggregate;
use crate::config::PipelineConfig;
use crate::correlation::CorrelationPruner;
use crate::features::FeatureEngineer;
use crate::filter::RecordFilter;
use crate::identity::{IdentityResolver, Roster};
use crate::join::{JoinReport, TableJoiner};
use crate::reduce::{DimensionalityReducer, Reduction};
use crate::table::{AuxTable, PlayerTable, RawTable};
use crate::Result;
use std::collections::HashSet;
use std::fmt;

/// Per-run counts reported to the user
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub input_rows: usize,
    pub filtered_rows: usize,
    pub imputed_cells: usize,
    pub engineered_features: usize,
    pub skipped_features: usize,
    pub players: usize,
    pub pruned_features: usize,
    pub retained_features: usize,
    /// `None` when reduction is disabled.
    pub components: Option<usize>,
    pub explained_variance: Option<f64>,
    pub joins: Vec<JoinReport>,
}

impl RunSummary {
    /// Distinct players left unresolved by at least one join.
    pub fn unresolved_identities(&self) -> usize {
        self.joins
            .iter()
            .flat_map(|j| j.unresolved.iter())
            .collect::<HashSet<_>>()
            .len()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows read:               {}", self.input_rows)?;
        writeln!(f, "Rows after filtering:    {}", self.filtered_rows)?;
        writeln!(f, "Imputed cells:           {}", self.imputed_cells)?;
        writeln!(f, "Engineered features:     {}", self.engineered_features)?;
        writeln!(f, "Skipped features:        {}", self.skipped_features)?;
        writeln!(f, "Players:                 {}", self.players)?;
        writeln!(f, "Pruned by correlation:   {}", self.pruned_features)?;
        writeln!(f, "Retained features:       {}", self.retained_features)?;
        if let (Some(k), Some(var)) = (self.components, self.explained_variance) {
            writeln!(f, "Components:              {} ({:.1}% variance)", k, var * 100.0)?;
        }
        for join in &self.joins {
            writeln!(
                f,
                "Unresolved ({:<10})   {}",
                join.label,
                join.unresolved.len()
            )?;
        }
        write!(f, "Unresolved identities:   {}", self.unresolved_identities())
    }
}

/// Output of one run
#[derive(Debug)]
pub struct PipelineOutput {
    pub table: PlayerTable,
    pub reduction: Option<Reduction>,
    pub summary: RunSummary,
}

/// The consolidation pipeline, configured once and reused across inputs.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// filter -> engineer -> aggregate -> prune -> reduce -> join.
    ///
    /// Any stage error aborts the run.
    pub fn run(&self, mut raw: RawTable, auxiliaries: &[AuxTable]) -> Result<PipelineOutput> {
        let config = self.config;
        let mut summary = RunSummary {
            input_rows: raw.len(),
            ..RunSummary::default()
        };

        let filtered = RecordFilter::new(config.filter.clone()).apply(&mut raw);
        summary.filtered_rows = raw.len();
        summary.imputed_cells = filtered.imputed_cells;

        let engineered = FeatureEngineer::new(config.recipe.clone()).apply(&mut raw);
        summary.engineered_features = engineered.derived.len();
        summary.skipped_features = engineered.skipped_count();

        let mut roster = Roster::new();
        let features = aggregate(&raw, &mut roster)?;
        drop(raw);
        summary.players = features.n_rows();

        let (pruned, prune_report) =
            CorrelationPruner::new(config.correlation.threshold).prune(&features);
        summary.pruned_features = prune_report.removed.len();
        summary.retained_features = prune_report.remaining;

        let (mut table, reduction) = if config.reduction.enabled {
            let reduction = DimensionalityReducer::new(
                config.reduction.target_variance,
                &config.reduction.component_prefix,
            )
            .fit_transform(&pruned)?;
            summary.components = Some(reduction.components.retained);
            summary.explained_variance = Some(reduction.components.retained_ratio());
            (reduction.table.clone(), Some(reduction))
        } else {
            (pruned, None)
        };

        let joiner = TableJoiner::new(
            IdentityResolver::new(config.identity.threshold),
            config.auxiliary.default_fill,
        );
        for aux in auxiliaries {
            summary.joins.push(joiner.left_join(&mut table, aux));
        }

        log::info!(
            "Run complete: {} players, {} output columns",
            table.n_rows(),
            table.n_columns()
        );
        Ok(PipelineOutput {
            table,
            reduction,
            summary,
        })
    }
}
