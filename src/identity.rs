//! Fuzzy identity resolution across independently spelled name tables.
//!
//! Scores are token-set ratios on a 0-100 scale: both names are lowercased,
//! stripped to alphanumeric tokens, and compared as sorted token sets so that
//! word order and extra initials matter little.

use crate::table::{CanonicalPlayer, PlayerKey};
use std::collections::{BTreeSet, HashMap};
use strsim::normalized_levenshtein;

type Tokens = BTreeSet<String>;

fn tokenize(name: &str) -> Tokens {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

fn join<'a>(tokens: impl Iterator<Item = &'a String>) -> String {
    tokens.map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn ratio(a: &str, b: &str) -> u8 {
    (normalized_levenshtein(a, b) * 100.0).round() as u8
}

fn token_set_score(a: &Tokens, b: &Tokens) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let common = join(a.intersection(b));
    let only_a = join(a.difference(b));
    let only_b = join(b.difference(a));
    let with_a = format!("{} {}", common, only_a).trim().to_string();
    let with_b = format!("{} {}", common, only_b).trim().to_string();

    let mut best = ratio(&with_a, &with_b);
    if !common.is_empty() {
        best = best.max(ratio(&common, &with_a)).max(ratio(&common, &with_b));
    }
    best
}

/// Token-set similarity of two names, 0-100.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    token_set_score(&tokenize(a), &tokenize(b))
}

/// Candidate names with their token sets computed once.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    names: Vec<String>,
    tokens: Vec<Tokens>,
}

impl CandidateSet {
    /// Candidate order is kept; it decides ties.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let tokens = names.iter().map(|n| tokenize(n)).collect();
        Self { names, tokens }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Best-scoring candidate for a query
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch<'a> {
    pub candidate: &'a str,
    pub index: usize,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Matched(NameMatch<'a>),
    /// Below threshold: the name is left as is and will not join.
    Unresolved { best_score: u8 },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResolutionReport {
    pub matched: usize,
    /// Matches whose spelling differed from the query.
    pub renamed: usize,
    pub unresolved: Vec<String>,
}

/// Maps free-text names onto the closest name in a reference set.
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    threshold: u8,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(70)
    }
}

impl IdentityResolver {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Highest-scoring candidate; the first one wins ties.
    ///
    /// A candidate spelled exactly like the query is returned outright.
    pub fn best_match<'a>(&self, query: &str, candidates: &'a CandidateSet) -> Option<NameMatch<'a>> {
        if let Some(index) = candidates.names.iter().position(|c| c == query) {
            return Some(NameMatch {
                candidate: &candidates.names[index],
                index,
                score: 100,
            });
        }

        let query_tokens = tokenize(query);
        let mut best: Option<NameMatch<'a>> = None;
        for (index, tokens) in candidates.tokens.iter().enumerate() {
            let score = token_set_score(&query_tokens, tokens);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(NameMatch {
                    candidate: &candidates.names[index],
                    index,
                    score,
                });
            }
        }
        best
    }

    pub fn resolve<'a>(&self, query: &str, candidates: &'a CandidateSet) -> Resolution<'a> {
        match self.best_match(query, candidates) {
            Some(m) if m.score >= self.threshold => Resolution::Matched(m),
            Some(m) => Resolution::Unresolved { best_score: m.score },
            None => Resolution::Unresolved { best_score: 0 },
        }
    }

    /// Rewrites each accepted name to its candidate's spelling.
    pub fn resolve_in_place(&self, names: &mut [String], candidates: &CandidateSet) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        for name in names.iter_mut() {
            match self.resolve(name, candidates) {
                Resolution::Matched(m) => {
                    report.matched += 1;
                    if m.candidate != name.as_str() {
                        log::debug!("Resolved '{}' -> '{}' (score {})", name, m.candidate, m.score);
                        report.renamed += 1;
                        *name = m.candidate.to_string();
                    }
                }
                Resolution::Unresolved { best_score } => {
                    log::debug!("Unresolved '{}' (best score {})", name, best_score);
                    report.unresolved.push(name.clone());
                }
            }
        }
        report
    }
}

/// Assigns stable keys to player names in first-seen order.
///
/// Names are compared after trimming and collapsing inner whitespace.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<CanonicalPlayer>,
    index: HashMap<String, PlayerKey>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> PlayerKey {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(&key) = self.index.get(&normalized) {
            return key;
        }
        let key = PlayerKey(self.players.len());
        self.players.push(CanonicalPlayer {
            key,
            name: normalized.clone(),
        });
        self.index.insert(normalized, key);
        key
    }

    pub fn get(&self, key: PlayerKey) -> Option<&CanonicalPlayer> {
        self.players.get(key.0)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
