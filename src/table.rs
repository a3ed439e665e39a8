//! Tabular containers handed from one pipeline stage to the next.

use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashSet;
use std::fmt;

/// Stable key of a resolved player identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerKey(pub usize);

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// A resolved identity: stable key plus the best-known display name.
///
/// The key never changes once assigned; the name may be rewritten when a
/// join aligns it with an auxiliary table's spelling.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPlayer {
    pub key: PlayerKey,
    pub name: String,
}

/// One player's observed stats from one scouting window.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub player: String,
    /// Minutes played; the exposure weight.
    pub minutes: f64,
    pub period: Option<String>,
    /// One cell per `RawTable::columns` entry, `None` when the export left it blank.
    pub stats: Vec<Option<f64>>,
}

/// Raw rows sharing one header of numeric stat columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<f64>> + '_ {
        self.records.iter().map(move |r| r.stats[index])
    }

    /// Sets a column, replacing it when the name already exists.
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.records.len());
        match self.column_index(name) {
            Some(idx) => {
                for (rec, v) in self.records.iter_mut().zip(values) {
                    rec.stats[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (rec, v) in self.records.iter_mut().zip(values) {
                    rec.stats.push(v);
                }
            }
        }
    }

    /// Keeps the columns `keep` accepts; returns how many were dropped.
    pub fn retain_columns<F: FnMut(&str) -> bool>(&mut self, mut keep: F) -> usize {
        let mask: Vec<bool> = self.columns.iter().map(|c| keep(c)).collect();
        let dropped = mask.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }

        self.columns = std::mem::take(&mut self.columns)
            .into_iter()
            .zip(&mask)
            .filter_map(|(c, &k)| k.then_some(c))
            .collect();
        for rec in &mut self.records {
            rec.stats = std::mem::take(&mut rec.stats)
                .into_iter()
                .zip(&mask)
                .filter_map(|(v, &k)| k.then_some(v))
                .collect();
        }
        dropped
    }
}

/// One row per canonical player with named numeric columns.
///
/// Before reduction the columns are feature names (a row is a FeatureRow);
/// after reduction they are ordinal component labels.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerTable {
    pub players: Vec<CanonicalPlayer>,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl PlayerTable {
    pub fn new(players: Vec<CanonicalPlayer>, columns: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.nrows(), players.len());
        debug_assert_eq!(values.ncols(), columns.len());
        Self {
            players,
            columns,
            values,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.players.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name)
            .map(|idx| self.values.index_axis(Axis(1), idx))
    }

    pub fn row(&self, index: usize) -> FeatureRow<'_> {
        FeatureRow {
            player: &self.players[index],
            columns: &self.columns,
            values: self.values.index_axis(Axis(0), index),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = FeatureRow<'_>> {
        (0..self.n_rows()).map(move |i| self.row(i))
    }

    /// First row whose display name equals `name`.
    pub fn find(&self, name: &str) -> Option<FeatureRow<'_>> {
        self.players
            .iter()
            .position(|p| p.name == name)
            .map(|i| self.row(i))
    }

    /// Copy of the table without the named columns.
    pub fn without_columns(&self, names: &HashSet<String>) -> PlayerTable {
        let keep: Vec<usize> = (0..self.n_columns())
            .filter(|&i| !names.contains(&self.columns[i]))
            .collect();
        PlayerTable {
            players: self.players.clone(),
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            values: self.values.select(Axis(1), &keep),
        }
    }

    /// Sets a column, replacing it when the name already exists.
    pub fn set_column(&mut self, name: &str, values: &[f64]) {
        debug_assert_eq!(values.len(), self.n_rows());
        if let Some(idx) = self.column_index(name) {
            for (cell, &v) in self.values.column_mut(idx).iter_mut().zip(values) {
                *cell = v;
            }
            return;
        }

        let width = self.n_columns();
        let old = &self.values;
        self.values = Array2::from_shape_fn((self.n_rows(), width + 1), |(i, j)| {
            if j < width {
                old[(i, j)]
            } else {
                values[i]
            }
        });
        self.columns.push(name.to_string());
    }
}

/// Borrowed view of one player's row.
#[derive(Debug, Clone)]
pub struct FeatureRow<'a> {
    pub player: &'a CanonicalPlayer,
    columns: &'a [String],
    values: ArrayView1<'a, f64>,
}

impl<'a> FeatureRow<'a> {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    pub fn values(&self) -> ArrayView1<'a, f64> {
        self.values.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// One auxiliary row: a player name as spelled by its source plus attribute cells.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxRow {
    pub player: String,
    pub values: Vec<Option<f64>>,
}

/// Per-player auxiliary attributes (age registry, valuation snapshot).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxTable {
    /// Short name for logs and summaries, e.g. "age".
    pub label: String,
    pub columns: Vec<String>,
    pub rows: Vec<AuxRow>,
}

impl AuxTable {
    pub fn new(label: &str, columns: Vec<String>) -> Self {
        Self {
            label: label.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, player: &str, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(AuxRow {
            player: player.to_string(),
            values,
        });
    }

    pub fn player_names(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.player.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn record(player: &str, stats: Vec<Option<f64>>) -> RawRecord {
        RawRecord {
            player: player.to_string(),
            minutes: 90.0,
            period: None,
            stats,
        }
    }

    fn player(key: usize, name: &str) -> CanonicalPlayer {
        CanonicalPlayer {
            key: PlayerKey(key),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_retain_columns_keeps_cells_aligned() {
        let mut table = RawTable::new(vec!["a".into(), "Percentile_b".into(), "c".into()]);
        table.records.push(record("X", vec![Some(1.0), Some(2.0), Some(3.0)]));
        table.records.push(record("Y", vec![None, Some(5.0), Some(6.0)]));

        let dropped = table.retain_columns(|c| !c.contains("Percentile"));

        assert_eq!(dropped, 1);
        assert_eq!(table.columns, vec!["a", "c"]);
        assert_eq!(table.records[0].stats, vec![Some(1.0), Some(3.0)]);
        assert_eq!(table.records[1].stats, vec![None, Some(6.0)]);
    }

    #[test]
    fn test_raw_set_column_replaces_existing() {
        let mut table = RawTable::new(vec!["a".into()]);
        table.records.push(record("X", vec![Some(1.0)]));

        table.set_column("a", vec![Some(9.0)]);
        table.set_column("b", vec![None]);

        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.records[0].stats, vec![Some(9.0), None]);
    }

    #[test]
    fn test_player_table_set_column_and_lookup() {
        let mut table = PlayerTable::new(
            vec![player(0, "A. Smith"), player(1, "B. Jones")],
            vec!["goals".into()],
            array![[1.0], [2.0]],
        );

        table.set_column("age", &[24.0, 0.0]);

        assert_eq!(table.columns, vec!["goals", "age"]);
        let row = table.find("B. Jones").unwrap();
        assert_eq!(row.get("goals"), Some(2.0));
        assert_eq!(row.get("age"), Some(0.0));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_without_columns() {
        let table = PlayerTable::new(
            vec![player(0, "A")],
            vec!["x".into(), "y".into(), "z".into()],
            array![[1.0, 2.0, 3.0]],
        );
        let drop: HashSet<String> = ["y".to_string()].into_iter().collect();

        let pruned = table.without_columns(&drop);

        assert_eq!(pruned.columns, vec!["x", "z"]);
        assert_eq!(pruned.values, array![[1.0, 3.0]]);
    }
}
