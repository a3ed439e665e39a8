// Module for loading and validating the data. It reads the csv files, validates headers, and handles blank cells.
use crate::config::{ColumnConfig, RegistrySpec};
use crate::table::{AuxTable, PlayerTable, RawRecord, RawTable};
use crate::{PipelineError, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// One row of a per-league age/valuation export.
#[derive(Debug, Deserialize)]
pub struct LeagueExportRecord {
    #[serde(rename = "player_name")]
    pub player_name: String,
    #[serde(rename = "player_age")]
    pub player_age: Option<f64>,
    #[serde(rename = "player_market_value_euro")]
    pub player_market_value_euro: Option<f64>,
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .has_headers(true)
        .from_reader(input)
}

fn line_of(raw: &StringRecord) -> u64 {
    raw.position().map(|p| p.line()).unwrap_or(0)
}

/// Reads every well-formed row; blank lines and rows of the wrong width are skipped.
fn read_rows<R: Read>(rdr: &mut csv::Reader<R>, source: &str) -> Result<(StringRecord, Vec<StringRecord>)> {
    // Grab and own the header row
    let headers = rdr.headers()?.clone();
    let expected_len = headers.len();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let raw: StringRecord = result?;

        if raw.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        if raw.len() != expected_len {
            log::warn!(
                "{}: skipping line {}: expected {} fields, found {}",
                source,
                line_of(&raw),
                expected_len,
                raw.len(),
            );
            continue;
        }
        rows.push(raw);
    }
    Ok((headers, rows))
}

/// Spellings of a missing value found in scraped exports.
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-NaN", "-nan", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
    "n/a", "nan", "null",
];

/// `Ok(None)` for a blank, a missing-value token, or a non-finite number.
/// Anything else that is not a number is an error.
fn parse_cell(cell: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
    let cell = cell.trim();
    if MISSING_TOKENS.contains(&cell) {
        return Ok(None);
    }
    let value: f64 = cell.parse()?;
    Ok(Some(value).filter(|v| v.is_finite()))
}

fn require_column(headers: &StringRecord, table: &str, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| PipelineError::Schema {
            table: table.to_string(),
            column: column.to_string(),
        })
}

pub fn load_stats(path: &Path, columns: &ColumnConfig) -> Result<RawTable> {
    let file = File::open(path)?;
    read_stats(file, &path.display().to_string(), columns)
}

/// Parses a per-match stat export.
///
/// The identity and exposure columns must exist; the period column is
/// optional. Any other column with a non-numeric cell (e.g. an opponent
/// name) is dropped.
pub fn read_stats<R: Read>(input: R, source: &str, columns: &ColumnConfig) -> Result<RawTable> {
    let mut rdr = reader(input);
    let (headers, rows) = read_rows(&mut rdr, source)?;

    let identity = require_column(&headers, source, &columns.identity)?;
    let exposure = require_column(&headers, source, &columns.exposure)?;
    let period = headers.iter().position(|h| h.trim() == columns.period);

    let mut stat_indices = Vec::new();
    let mut stat_names = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        if idx == identity || idx == exposure || Some(idx) == period {
            continue;
        }
        if rows.iter().all(|r| parse_cell(&r[idx]).is_ok()) {
            stat_indices.push(idx);
            stat_names.push(name.trim().to_string());
        } else {
            log::info!("{}: dropping non-numeric column '{}'", source, name);
        }
    }

    let mut table = RawTable::new(stat_names);
    for raw in &rows {
        let player = raw[identity].trim();
        if player.is_empty() {
            log::warn!("{}: skipping line {}: blank player name", source, line_of(raw));
            continue;
        }
        let minutes = match parse_cell(&raw[exposure]) {
            Ok(Some(m)) => m,
            _ => {
                log::warn!(
                    "{}: skipping line {}: unreadable {} '{}'",
                    source,
                    line_of(raw),
                    columns.exposure,
                    &raw[exposure]
                );
                continue;
            }
        };

        let stats = stat_indices
            .iter()
            .map(|&i| parse_cell(&raw[i]).ok().flatten())
            .collect();
        table.records.push(RawRecord {
            player: player.to_string(),
            minutes,
            period: period
                .map(|i| raw[i].trim().to_string())
                .filter(|p| !p.is_empty()),
            stats,
        });
    }

    log::info!(
        "{}: loaded {} records with {} stat columns",
        source,
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

pub fn load_registry(path: &Path, registry: &RegistrySpec) -> Result<AuxTable> {
    let file = File::open(path)?;
    read_registry(file, &path.display().to_string(), registry)
}

fn selector_matches(cell: &str, wanted: &str) -> bool {
    let (cell, wanted) = (cell.trim(), wanted.trim());
    match (cell.parse::<f64>(), wanted.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => cell == wanted,
    }
}

/// Parses an auxiliary registry, keeping only rows the selector accepts.
///
/// Unreadable attribute cells are kept as blanks and take the join's default.
pub fn read_registry<R: Read>(input: R, source: &str, registry: &RegistrySpec) -> Result<AuxTable> {
    let mut rdr = reader(input);
    let (headers, rows) = read_rows(&mut rdr, source)?;

    let identity = require_column(&headers, source, &registry.identity)?;
    let value_indices = registry
        .columns
        .iter()
        .map(|c| require_column(&headers, source, c))
        .collect::<Result<Vec<usize>>>()?;
    let selector = match &registry.selector {
        Some(sel) => Some((require_column(&headers, source, &sel.column)?, sel.value.as_str())),
        None => None,
    };

    let mut aux = AuxTable::new(&registry.label, registry.columns.clone());
    for raw in &rows {
        if let Some((idx, wanted)) = selector {
            if !selector_matches(&raw[idx], wanted) {
                continue;
            }
        }
        let player = raw[identity].trim();
        if player.is_empty() {
            continue;
        }
        let values = value_indices
            .iter()
            .map(|&i| parse_cell(&raw[i]).ok().flatten())
            .collect();
        aux.push(player, values);
    }

    log::info!("{}: loaded {} {} rows", source, aux.len(), registry.label);
    Ok(aux)
}

/// Merges every `*.csv` league export in `dir` (by file name order) into one registry.
pub fn combine_registries(dir: &Path) -> Result<AuxTable> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "csv"))
        .collect();
    files.sort();

    let mut combined = AuxTable::new(
        "age-valuation",
        vec!["age".to_string(), "player_market_value_euro".to_string()],
    );
    for path in &files {
        let mut rdr = reader(File::open(path)?);
        for result in rdr.deserialize::<LeagueExportRecord>() {
            match result {
                Ok(rec) => combined.push(
                    rec.player_name.trim(),
                    vec![rec.player_age, rec.player_market_value_euro],
                ),
                Err(e) => log::warn!("{}: skipping malformed record: {}", path.display(), e),
            }
        }
    }

    log::info!(
        "Combined {} files into {} registry rows",
        files.len(),
        combined.len()
    );
    Ok(combined)
}

/// Writes one row per player: identity column first, then every numeric column.
pub fn write_table(path: &Path, table: &PlayerTable, identity: &str) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    let mut header = vec![identity.to_string()];
    header.extend(table.columns.iter().cloned());
    wtr.write_record(&header)?;

    for row in table.rows() {
        let mut cells = vec![row.player.name.clone()];
        cells.extend(row.values().iter().map(|v| v.to_string()));
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes a registry; blank attributes stay blank.
pub fn write_registry(path: &Path, aux: &AuxTable, identity: &str) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    let mut header = vec![identity.to_string()];
    header.extend(aux.columns.iter().cloned());
    wtr.write_record(&header)?;

    for row in &aux.rows {
        let mut cells = vec![row.player.clone()];
        cells.extend(
            row.values
                .iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    Ok(())
}
