//! Standardization and principal-component projection.

use crate::table::PlayerTable;
use crate::{PipelineError, Result};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};

/// Cumulative ratios within this distance of the target count as reaching it.
const TARGET_TOLERANCE: f64 = 1e-12;

/// Fitted per-column centering and scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    pub columns: Vec<String>,
    pub mean: Array1<f64>,
    /// Population standard deviation; 1 for constant columns.
    pub scale: Array1<f64>,
}

impl Standardizer {
    pub fn fit(table: &PlayerTable) -> Result<Self> {
        let mean = table
            .values
            .mean_axis(Axis(0))
            .ok_or(PipelineError::EmptyTable("standardization"))?;
        let scale = table
            .values
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Ok(Self {
            columns: table.columns.clone(),
            mean,
            scale,
        })
    }

    /// Scales the table's columns, matched by name to the fitted ones.
    pub fn transform(&self, table: &PlayerTable) -> Result<Array2<f64>> {
        let indices = self
            .columns
            .iter()
            .map(|c| {
                table.column_index(c).ok_or_else(|| PipelineError::Schema {
                    table: "standardization input".to_string(),
                    column: c.clone(),
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        let selected = table.values.select(Axis(1), &indices);
        Ok((selected - &self.mean) / &self.scale)
    }
}

/// Principal axes of standardized data, sorted by explained variance.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalComponents {
    /// Features x retained components.
    pub loadings: Array2<f64>,
    /// Every component's share of total variance, largest first.
    pub explained_variance_ratio: Vec<f64>,
    pub retained: usize,
}

impl PrincipalComponents {
    /// Fits on centered data and keeps the fewest components reaching `target`.
    pub fn fit(scaled: &Array2<f64>, target: f64) -> Result<Self> {
        let (n, p) = scaled.dim();
        if n < 2 {
            return Err(PipelineError::Degenerate(format!(
                "need at least two players, got {}",
                n
            )));
        }
        if p == 0 {
            return Err(PipelineError::Degenerate("no feature columns".to_string()));
        }

        let cov = scaled.t().dot(scaled) / (n - 1) as f64;
        let eigen = DMatrix::from_fn(p, p, |i, j| cov[(i, j)]).symmetric_eigen();

        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
        let variances: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i].max(0.0)).collect();
        let total: f64 = variances.iter().sum();
        if total <= 0.0 {
            return Err(PipelineError::Degenerate(
                "features have no variance to explain".to_string(),
            ));
        }
        let explained_variance_ratio: Vec<f64> = variances.iter().map(|v| v / total).collect();
        let retained = components_for(&explained_variance_ratio, target);

        let mut loadings = Array2::<f64>::zeros((p, retained));
        for (k, &src) in order.iter().take(retained).enumerate() {
            let axis = eigen.eigenvectors.column(src);
            // sign convention: largest-magnitude loading is positive
            let pivot = axis
                .iter()
                .copied()
                .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
            for f in 0..p {
                loadings[(f, k)] = sign * axis[f];
            }
        }

        Ok(Self {
            loadings,
            explained_variance_ratio,
            retained,
        })
    }

    pub fn cumulative_ratio(&self) -> Vec<f64> {
        self.explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect()
    }

    /// Variance share of the retained components together.
    pub fn retained_ratio(&self) -> f64 {
        self.explained_variance_ratio[..self.retained].iter().sum()
    }

    pub fn project(&self, scaled: &Array2<f64>) -> Array2<f64> {
        scaled.dot(&self.loadings)
    }
}

/// Fewest leading components whose cumulative ratio reaches `target`.
pub fn components_for(ratios: &[f64], target: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, r) in ratios.iter().enumerate() {
        cumulative += r;
        if cumulative >= target - TARGET_TOLERANCE {
            return i + 1;
        }
    }
    ratios.len()
}

/// Everything needed to replay a fitted reduction on new rows
#[derive(Debug, Clone)]
pub struct Reduction {
    pub table: PlayerTable,
    pub scaler: Standardizer,
    pub components: PrincipalComponents,
    prefix: String,
}

impl Reduction {
    pub fn transform(&self, table: &PlayerTable) -> Result<PlayerTable> {
        let scaled = self.scaler.transform(table)?;
        Ok(PlayerTable::new(
            table.players.clone(),
            component_labels(&self.prefix, self.components.retained),
            self.components.project(&scaled),
        ))
    }
}

fn component_labels(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Projects standardized features onto the variance-preserving basis.
#[derive(Debug, Clone)]
pub struct DimensionalityReducer {
    target: f64,
    prefix: String,
}

impl Default for DimensionalityReducer {
    fn default() -> Self {
        Self::new(0.95, "PCA_")
    }
}

impl DimensionalityReducer {
    pub fn new(target: f64, prefix: &str) -> Self {
        Self {
            target,
            prefix: prefix.to_string(),
        }
    }

    pub fn fit_transform(&self, table: &PlayerTable) -> Result<Reduction> {
        if !(self.target > 0.0 && self.target <= 1.0) {
            return Err(PipelineError::Config(format!(
                "variance target must be within (0, 1], got {}",
                self.target
            )));
        }
        log::info!("Number of features before reduction: {}", table.n_columns());

        let scaler = Standardizer::fit(table)?;
        let scaled = scaler.transform(table)?;
        let components = PrincipalComponents::fit(&scaled, self.target)?;
        let reduced = PlayerTable::new(
            table.players.clone(),
            component_labels(&self.prefix, components.retained),
            components.project(&scaled),
        );

        log::info!(
            "Number of components after reduction: {} ({:.1}% of variance)",
            components.retained,
            components.retained_ratio() * 100.0
        );
        Ok(Reduction {
            table: reduced,
            scaler,
            components,
            prefix: self.prefix.clone(),
        })
    }
}
