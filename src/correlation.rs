//! Correlation matrix and greedy removal of redundant features.

use crate::table::PlayerTable;
use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashSet;

/// Pearson correlation; 0 when either side has no variance.
pub fn pearson(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
    let n = x.len();
    if n < 2 || y.len() != n {
        return 0.0;
    }
    let mean_x = x.sum() / n as f64;
    let mean_y = y.sum() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y.iter()) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Quartile bin (0..=3) per value, with duplicate edges merged.
fn quartile_bins(values: ArrayView1<'_, f64>) -> Vec<usize> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len().saturating_sub(1);
    let quantile = |q: f64| {
        let pos = q * last as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    };

    let mut edges: Vec<f64> = [0.0, 0.25, 0.5, 0.75, 1.0].iter().map(|&q| quantile(q)).collect();
    edges.dedup();
    values
        .iter()
        .map(|&v| {
            edges[1..]
                .iter()
                .position(|&e| v <= e)
                .unwrap_or(edges.len().saturating_sub(2))
        })
        .collect()
}

/// Cramér's V between a categorical column and a numeric column cut into quartiles.
///
/// Chi-square uses Yates' correction when the table has one degree of freedom.
pub fn cramers_v(labels: &[String], values: ArrayView1<'_, f64>) -> f64 {
    let n = labels.len();
    if n == 0 || values.len() != n {
        return 0.0;
    }

    let mut categories: Vec<&str> = Vec::new();
    let rows: Vec<usize> = labels
        .iter()
        .map(|l| match categories.iter().position(|c| *c == l.as_str()) {
            Some(i) => i,
            None => {
                categories.push(l);
                categories.len() - 1
            }
        })
        .collect();
    let bins = quartile_bins(values);
    let n_bins = bins.iter().max().map_or(0, |b| b + 1);

    let mut counts = Array2::<f64>::zeros((categories.len(), n_bins));
    for (&r, &b) in rows.iter().zip(&bins) {
        counts[(r, b)] += 1.0;
    }
    // interior quartile bins can be empty; a zero margin has no expected count
    let observed = drop_empty_margins(&counts);
    let (r, c) = observed.dim();
    let k = r.min(c);
    if k < 2 {
        return 0.0;
    }

    let row_totals = observed.sum_axis(Axis(1));
    let col_totals = observed.sum_axis(Axis(0));
    let total = n as f64;
    let yates = (r - 1) * (c - 1) == 1;
    let mut chi2 = 0.0;
    for i in 0..r {
        for j in 0..c {
            let expected = row_totals[i] * col_totals[j] / total;
            let mut diff = (observed[(i, j)] - expected).abs();
            if yates {
                diff = (diff - 0.5).max(0.0);
            }
            chi2 += diff * diff / expected;
        }
    }
    (chi2 / (total * (k - 1) as f64)).sqrt().min(1.0)
}

fn drop_empty_margins(counts: &Array2<f64>) -> Array2<f64> {
    let keep_rows: Vec<usize> = (0..counts.nrows())
        .filter(|&i| counts.row(i).sum() > 0.0)
        .collect();
    let keep_cols: Vec<usize> = (0..counts.ncols())
        .filter(|&j| counts.column(j).sum() > 0.0)
        .collect();
    Array2::from_shape_fn((keep_rows.len(), keep_cols.len()), |(i, j)| {
        counts[(keep_rows[i], keep_cols[j])]
    })
}

/// Square, symmetric association matrix over named columns
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl CorrelationMatrix {
    /// Pearson correlation over every numeric column of `table`.
    pub fn pearson(table: &PlayerTable) -> Self {
        let p = table.n_columns();
        let mut values = Array2::<f64>::eye(p);
        for i in 0..p {
            for j in 0..i {
                let r = pearson(table.values.column(i), table.values.column(j));
                values[(i, j)] = r;
                values[(j, i)] = r;
            }
        }
        Self {
            names: table.columns.clone(),
            values,
        }
    }

    /// Appends a categorical column whose entries against numeric columns are Cramér's V.
    ///
    /// Categorical-to-categorical entries are 0 off the diagonal.
    pub fn with_categorical(mut self, name: &str, labels: &[String], table: &PlayerTable) -> Self {
        let p = self.names.len();
        let mut grown = Array2::<f64>::zeros((p + 1, p + 1));
        grown.slice_mut(ndarray::s![..p, ..p]).assign(&self.values);
        grown[(p, p)] = 1.0;
        for (j, column) in self.names.iter().enumerate() {
            if let Some(values) = table.column(column) {
                let v = cramers_v(labels, values);
                grown[(p, j)] = v;
                grown[(j, p)] = v;
            }
        }
        self.names.push(name.to_string());
        self.values = grown;
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[(i, j)]
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PruneReport {
    /// In column order.
    pub removed: Vec<String>,
    pub remaining: usize,
}

/// Drops one feature from every pair correlated above a threshold.
///
/// One pass over the lower triangle: for each pair `(i, j)` with `j < i` and
/// `|r| > threshold`, column `i` is marked. Correlations are not recomputed
/// after a removal and marked columns still act as the earlier member of
/// later pairs, so a feature can go because it tracks one that is itself
/// removed. The result depends on column order.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationPruner {
    threshold: f64,
}

impl Default for CorrelationPruner {
    fn default() -> Self {
        Self::new(0.9)
    }
}

impl CorrelationPruner {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Names to remove, in matrix order.
    pub fn removal_set(&self, matrix: &CorrelationMatrix) -> Vec<String> {
        let mut removed = Vec::new();
        for i in 0..matrix.len() {
            if (0..i).any(|j| matrix.get(i, j).abs() > self.threshold) {
                removed.push(matrix.names()[i].clone());
            }
        }
        removed
    }

    pub fn prune(&self, table: &PlayerTable) -> (PlayerTable, PruneReport) {
        self.prune_with(&CorrelationMatrix::pearson(table), table)
    }

    /// Prunes `table` using a precomputed matrix (e.g. one extended with categorical columns).
    pub fn prune_with(&self, matrix: &CorrelationMatrix, table: &PlayerTable) -> (PlayerTable, PruneReport) {
        let removed: Vec<String> = self
            .removal_set(matrix)
            .into_iter()
            .filter(|name| table.column_index(name).is_some())
            .collect();
        let drop: HashSet<String> = removed.iter().cloned().collect();
        let pruned = table.without_columns(&drop);

        log::info!("Removed {} highly correlated features", removed.len());
        log::info!("Remaining features: {}", pruned.n_columns());
        let report = PruneReport {
            removed,
            remaining: pruned.n_columns(),
        };
        (pruned, report)
    }
}
