//! Relationship dataset ingestion
//!
//! Reads `stock1,stock2,relation_type,weight` CSV files into [`RelationRecord`]s.
//! A source that cannot be read at all is replaced with a small built-in sample so
//! the network view always has something to lay out.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LoadError, LoadResult};

/// Weight used when a record has none, or one that cannot be used
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// One row of the relationship table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// First stock symbol
    pub stock1: Option<String>,
    /// Second stock symbol
    pub stock2: Option<String>,
    /// Kind of relationship (e.g. "sector", "supplier")
    pub relation_type: Option<String>,
    /// Relationship strength, always finite and non-negative
    pub weight: f64,
}

impl RelationRecord {
    /// Create a fully populated record
    pub fn new(stock1: &str, stock2: &str, relation_type: &str, weight: f64) -> Self {
        Self {
            stock1: Some(stock1.to_string()),
            stock2: Some(stock2.to_string()),
            relation_type: Some(relation_type.to_string()),
            weight: sanitize_weight(Some(weight)),
        }
    }

    /// Both stock ids are present
    pub fn is_complete(&self) -> bool {
        self.stock1.is_some() && self.stock2.is_some()
    }
}

/// Where a dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Read from the requested file
    File,
    /// The built-in sample, used because the file was unusable
    Fallback,
}

/// Records plus ingestion diagnostics
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub records: Vec<RelationRecord>,
    pub source: Source,
    /// CSV rows that could not be decoded at all
    pub unreadable_rows: usize,
}

/// Built-in sample used when no usable source is available
pub fn fallback_records() -> Vec<RelationRecord> {
    vec![
        RelationRecord::new("MARUTI", "M&M", "sector", 0.9),
        RelationRecord::new("MARUTI", "TATAMOTORS", "sector", 0.9),
        RelationRecord::new("MARUTI", "BAJAJ-AUTO", "sector", 0.9),
    ]
}

/// Parse a weight cell, falling back to [`DEFAULT_WEIGHT`]
pub fn parse_weight(cell: Option<&str>) -> f64 {
    sanitize_weight(cell.and_then(|c| c.trim().parse::<f64>().ok()))
}

fn sanitize_weight(weight: Option<f64>) -> f64 {
    match weight {
        Some(w) if w.is_finite() && w >= 0.0 => w,
        _ => DEFAULT_WEIGHT,
    }
}

fn non_empty(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Parse relationship records from any CSV source
///
/// Returns the records and the number of rows that could not be decoded.
/// A source in which no row names both stocks is [`LoadError::Empty`].
pub fn parse_records<R: Read>(source: R) -> LoadResult<(Vec<RelationRecord>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let stock1 = column("stock1").ok_or_else(|| LoadError::MissingColumn("stock1".into()))?;
    let stock2 = column("stock2").ok_or_else(|| LoadError::MissingColumn("stock2".into()))?;
    let relation_type = column("relation_type");
    let weight = column("weight");

    let mut records = Vec::new();
    let mut unreadable = 0;
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "skipping unreadable CSV row");
                unreadable += 1;
                continue;
            }
        };
        records.push(RelationRecord {
            stock1: non_empty(row.get(stock1)),
            stock2: non_empty(row.get(stock2)),
            relation_type: non_empty(relation_type.and_then(|i| row.get(i))),
            weight: parse_weight(weight.and_then(|i| row.get(i))),
        });
    }

    if !records.iter().any(RelationRecord::is_complete) {
        return Err(LoadError::Empty);
    }
    Ok((records, unreadable))
}

/// Read relationship records from a CSV file
pub fn read_records(path: &Path) -> LoadResult<(Vec<RelationRecord>, usize)> {
    let file = File::open(path)?;
    parse_records(file)
}

/// Read a CSV file, substituting the built-in sample on any failure
pub fn load_or_fallback(path: &Path) -> LoadedDataset {
    match read_records(path) {
        Ok((records, unreadable_rows)) => {
            info!(path = %path.display(), records = records.len(), "loaded relationship data");
            LoadedDataset {
                records,
                source: Source::File,
                unreadable_rows,
            }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "using built-in sample relationships");
            LoadedDataset {
                records: fallback_records(),
                source: Source::Fallback,
                unreadable_rows: 0,
            }
        }
    }
}
