//! CSV loading and the process-wide dataset cache.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{TrendError, TrendResult};
use crate::models::{Dataset, Record};

pub const DATE_COLUMN: &str = "Data";
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Cells treated like a blank cell.
const MISSING_MARKERS: [&str; 3] = ["NA", "N/A", "#N/A"];

/// Parse a table whose `Data` column holds `DD/MM/YYYY` dates and whose other
/// columns are numeric metrics.
pub fn parse_csv<R: Read>(input: R) -> TrendResult<Dataset> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let headers = reader.headers()?.clone();

    let date_index = headers
        .iter()
        .position(|name| name == DATE_COLUMN)
        .ok_or_else(|| TrendError::MissingDateColumn(DATE_COLUMN.to_string()))?;
    let metrics: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != date_index)
        .map(|(index, name)| (index, name.to_string()))
        .collect();

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (offset, result) in reader.records().enumerate() {
        let row = result?;
        // Header is line 1.
        let line = offset + 2;
        let raw_date = row.get(date_index).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| {
            TrendError::InvalidDate {
                row: line,
                value: raw_date.to_string(),
            }
        })?;

        if !seen.insert(date) {
            warn!(%date, row = line, "duplicate date in source table");
        }

        let mut values = BTreeMap::new();
        for (index, metric) in &metrics {
            let raw = row.get(*index).unwrap_or_default();
            if raw.is_empty() || MISSING_MARKERS.contains(&raw) {
                continue;
            }
            let value = raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| TrendError::InvalidValue {
                    row: line,
                    metric: metric.clone(),
                    value: raw.to_string(),
                })?;
            values.insert(metric.clone(), value);
        }

        records.push(Record {
            date,
            metrics: values,
        });
    }

    let dataset = Dataset::new(metrics.into_iter().map(|(_, name)| name).collect(), records);
    debug!(
        records = dataset.records().len(),
        metrics = dataset.metrics().len(),
        "parsed weekly table"
    );
    Ok(dataset)
}

pub fn load_csv(path: &Path) -> TrendResult<Dataset> {
    let bytes = std::fs::read(path)?;
    parse_csv(bytes.as_slice())
}

fn content_digest(bytes: &[u8]) -> [u8; 32] {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(bytes));
    digest
}

struct CachedDataset {
    digest: [u8; 32],
    dataset: Arc<Dataset>,
}

/// Memoizes parsed files by path and content hash; a changed file is reparsed.
#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, CachedDataset>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> TrendResult<Arc<Dataset>> {
        let bytes = std::fs::read(path)?;
        let digest = content_digest(&bytes);

        if let Some(cached) = self.entries.get(path) {
            if cached.digest == digest {
                debug!(path = %path.display(), "dataset cache hit");
                return Ok(Arc::clone(&cached.dataset));
            }
        }

        let dataset = Arc::new(parse_csv(bytes.as_slice())?);
        info!(
            path = %path.display(),
            records = dataset.records().len(),
            "loaded dataset"
        );
        self.entries.insert(
            path.to_path_buf(),
            CachedDataset {
                digest,
                dataset: Arc::clone(&dataset),
            },
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
