//! Feature table loading
//!
//! Parses the per-(feature, exam) CSV tables of the cleaned dataset. Each table
//! has a `minute` column and one value column per student. Empty, `NaN` and
//! otherwise unparsable cells are treated as absent readings.

use crate::error::LensError;
use crate::types::{Exam, Feature, FeatureSeries, SeriesPoint};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info};

/// Name of the time key column
pub const MINUTE_COLUMN: &str = "minute";

/// One row of a feature table
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub minute: f64,
    /// Values aligned with [`FeatureTable::columns`]
    pub cells: Vec<Option<f64>>,
}

/// A parsed table for one (feature, exam) pair
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    /// Value column names, in file order, excluding `minute`
    pub columns: Vec<String>,
    /// Rows in file order
    pub rows: Vec<TableRow>,
}

impl FeatureTable {
    /// Parse CSV text. `source_name` is only used in error messages.
    pub fn parse(source_name: &str, content: &str) -> Result<Self, LensError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| LensError::MissingColumn(format!("{source_name}: {MINUTE_COLUMN}")))?;

        let header: Vec<String> = split_cells(header.trim_start_matches('\u{feff}'))
            .map(|cell| unquote(cell).to_string())
            .collect();

        let minute_index = header
            .iter()
            .position(|name| name.eq_ignore_ascii_case(MINUTE_COLUMN))
            .ok_or_else(|| LensError::MissingColumn(format!("{source_name}: {MINUTE_COLUMN}")))?;

        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != minute_index)
            .map(|(_, name)| name.clone())
            .collect();

        let mut rows = Vec::new();
        for (line_index, line) in lines {
            let raw: Vec<&str> = split_cells(line).collect();

            let minute = raw
                .get(minute_index)
                .and_then(|cell| parse_value(cell))
                .ok_or_else(|| LensError::Parse {
                    source_name: source_name.to_string(),
                    line: line_index + 1,
                    message: format!("invalid {MINUTE_COLUMN} value"),
                })?;

            let cells = (0..header.len())
                .filter(|i| *i != minute_index)
                .map(|i| raw.get(i).and_then(|cell| parse_value(cell)))
                .collect();

            rows.push(TableRow { minute, cells });
        }

        Ok(Self { columns, rows })
    }

    /// Read and parse a table from disk
    pub fn load(path: &Path) -> Result<Self, LensError> {
        let content = std::fs::read_to_string(path).map_err(|error| LensError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse(&path.display().to_string(), &content)
    }

    /// Position of a value column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Extract one column as a series, multiplying present values by `scale`.
    ///
    /// Row order is preserved. A missing column yields every row with an
    /// absent value.
    pub fn series(&self, column: &str, scale: f64) -> FeatureSeries {
        let index = self.column_index(column);
        if index.is_none() {
            debug!(column, "column missing, readings treated as absent");
        }

        let points = self
            .rows
            .iter()
            .map(|row| SeriesPoint {
                minute: row.minute,
                value: index
                    .and_then(|i| row.cells.get(i).copied().flatten())
                    .map(|value| value * scale),
            })
            .collect();

        FeatureSeries::new(points)
    }
}

fn split_cells(line: &str) -> impl Iterator<Item = &str> {
    line.trim_end_matches('\r').split(',').map(str::trim)
}

fn unquote(cell: &str) -> &str {
    cell.strip_prefix('"')
        .and_then(|c| c.strip_suffix('"'))
        .unwrap_or(cell)
}

fn parse_value(cell: &str) -> Option<f64> {
    unquote(cell).parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Location of a table inside the dataset root: `{root}/{FEATURE}/{FEATURE}{exam}.csv`
pub fn table_path(root: &Path, feature: Feature, exam: Exam) -> PathBuf {
    root.join(feature.as_str())
        .join(format!("{}{}.csv", feature.as_str(), exam.label()))
}

/// Every (feature, exam) pair, feature-major
pub fn table_keys() -> impl Iterator<Item = (Feature, Exam)> {
    Feature::ALL
        .into_iter()
        .flat_map(|feature| Exam::ALL.into_iter().map(move |exam| (feature, exam)))
}

/// The full set of loaded tables, one per (feature, exam) pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    tables: BTreeMap<(Feature, Exam), FeatureTable>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the table for a pair
    pub fn insert(&mut self, feature: Feature, exam: Exam, table: FeatureTable) {
        self.tables.insert((feature, exam), table);
    }

    pub fn get(&self, feature: Feature, exam: Exam) -> Result<&FeatureTable, LensError> {
        self.tables
            .get(&(feature, exam))
            .ok_or(LensError::MissingTable { feature, exam })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Fail unless every (feature, exam) pair has a table
    pub fn ensure_complete(&self) -> Result<(), LensError> {
        for (feature, exam) in table_keys() {
            self.get(feature, exam)?;
        }
        Ok(())
    }

    /// Load every table under `root`.
    ///
    /// Files are read concurrently and the set is only returned once all reads
    /// have finished. Any failure fails the whole load; the first failure in
    /// [`table_keys`] order is reported.
    pub fn load_dir(root: &Path) -> Result<Self, LensError> {
        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = table_keys()
                .map(|(feature, exam)| {
                    let path = table_path(root, feature, exam);
                    let handle = scope.spawn(move || FeatureTable::load(&path));
                    (feature, exam, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(feature, exam, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
                    (feature, exam, result)
                })
                .collect()
        });

        let mut set = TableSet::new();
        for (feature, exam, result) in results {
            set.insert(feature, exam, result?);
        }

        info!(root = %root.display(), tables = set.len(), "loaded feature tables");
        Ok(set)
    }
}
