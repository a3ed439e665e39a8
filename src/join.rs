//! Left join of auxiliary per-player attributes onto the player table.

use crate::identity::{CandidateSet, IdentityResolver};
use crate::table::{AuxRow, AuxTable, PlayerTable};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct JoinReport {
    pub label: String,
    pub matched: usize,
    pub renamed: usize,
    /// Players left with default-filled attributes.
    pub unresolved: Vec<String>,
}

/// Aligns name spellings with the resolver, then left-joins.
#[derive(Debug, Clone, Copy)]
pub struct TableJoiner {
    resolver: IdentityResolver,
    default_fill: f64,
}

impl TableJoiner {
    pub fn new(resolver: IdentityResolver, default_fill: f64) -> Self {
        Self {
            resolver,
            default_fill,
        }
    }

    /// Every row of `table` survives. Player names accepted by the resolver
    /// are rewritten to the auxiliary spelling; unmatched players and blank
    /// auxiliary cells get the default fill.
    ///
    /// `aux` is expected to hold at most one row per player; if it does not,
    /// the first row for a name wins.
    pub fn left_join(&self, table: &mut PlayerTable, aux: &AuxTable) -> JoinReport {
        let candidates = CandidateSet::new(&aux.player_names());
        let mut names: Vec<String> = table.players.iter().map(|p| p.name.clone()).collect();
        let resolution = self.resolver.resolve_in_place(&mut names, &candidates);
        for (player, name) in table.players.iter_mut().zip(names) {
            player.name = name;
        }

        let mut lookup: HashMap<&str, &AuxRow> = HashMap::new();
        for row in &aux.rows {
            if lookup.contains_key(row.player.as_str()) {
                log::warn!(
                    "{} table has more than one row for '{}'; keeping the first",
                    aux.label,
                    row.player
                );
                continue;
            }
            lookup.insert(row.player.as_str(), row);
        }

        for (c, column) in aux.columns.iter().enumerate() {
            let values: Vec<f64> = table
                .players
                .iter()
                .map(|p| {
                    lookup
                        .get(p.name.as_str())
                        .and_then(|row| row.values[c])
                        .unwrap_or(self.default_fill)
                })
                .collect();
            table.set_column(column, &values);
        }

        log::info!(
            "Joined {} attributes: {} matched, {} unresolved (filled with {})",
            aux.label,
            resolution.matched,
            resolution.unresolved.len(),
            self.default_fill
        );
        JoinReport {
            label: aux.label.clone(),
            matched: resolution.matched,
            renamed: resolution.renamed,
            unresolved: resolution.unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CanonicalPlayer, PlayerKey};
    use ndarray::array;

    fn players(names: &[&str]) -> Vec<CanonicalPlayer> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| CanonicalPlayer {
                key: PlayerKey(i),
                name: n.to_string(),
            })
            .collect()
    }

    fn ages(rows: &[(&str, Option<f64>)]) -> AuxTable {
        let mut aux = AuxTable::new("age", vec!["age".to_string()]);
        for (name, age) in rows {
            aux.push(name, vec![*age]);
        }
        aux
    }

    #[test]
    fn test_unmatched_player_gets_default_age() {
        let mut t = PlayerTable::new(
            players(&["Alan Smith", "B. Jones"]),
            vec!["PCA_1".into()],
            array![[0.5], [-0.5]],
        );
        let aux = ages(&[("Smith Alan", Some(27.0)), ("C. Brown", Some(30.0))]);

        let report = TableJoiner::new(IdentityResolver::new(70), 0.0).left_join(&mut t, &aux);

        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.players[0].name, "Smith Alan");
        assert_eq!(t.row(0).get("age"), Some(27.0));
        assert_eq!(t.players[1].name, "B. Jones");
        assert_eq!(t.row(1).get("age"), Some(0.0));
        assert_eq!(report.matched, 1);
        assert_eq!(report.unresolved, vec!["B. Jones"]);
    }

    #[test]
    fn test_blank_aux_cell_and_duplicates() {
        let mut t = PlayerTable::new(
            players(&["Alan Smith", "Ben Jones"]),
            vec!["x".into()],
            array![[1.0], [2.0]],
        );
        let aux = ages(&[("Alan Smith", None), ("Ben Jones", Some(21.0)), ("Ben Jones", Some(99.0))]);

        TableJoiner::new(IdentityResolver::new(70), -1.0).left_join(&mut t, &aux);

        assert_eq!(t.columns, vec!["x", "age"]);
        assert_eq!(t.values, array![[1.0, -1.0], [2.0, 21.0]]);
    }

    #[test]
    fn test_keys_survive_renaming() {
        let mut t = PlayerTable::new(players(&["Saka"]), vec!["x".into()], array![[1.0]]);
        let aux = ages(&[("Bukayo Saka", Some(23.0))]);

        TableJoiner::new(IdentityResolver::new(70), 0.0).left_join(&mut t, &aux);

        assert_eq!(t.players[0].key, PlayerKey(0));
        assert_eq!(t.players[0].name, "Bukayo Saka");
        assert_eq!(t.row(0).get("age"), Some(23.0));
    }
}
