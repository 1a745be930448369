//! Where morphed records go, and a read-back check of what was written.
use crate::error::RecordError;
use crate::record::{MorphedColumnSet, WeatherRecord, COLUMN_NAMES};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Written values are rounded to one decimal, so means can drift by half of that.
const MEAN_TOLERANCE: f64 = 0.05;

/// The output paths of one morphing run.
///
/// `<root>/<city>/<scenario>_<period>/<stem>_morphed_<scenario>_<period>.epw`, with a copy of the
/// baseline record beside it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlan {
    dir: PathBuf,
    morphed: PathBuf,
    baseline: PathBuf,
}

impl OutputPlan {
    pub fn new(root: &Path, city: &str, scenario: &str, period: &str, record: &WeatherRecord) -> Self {
        let stem = record
            .path()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("record");
        let name = record
            .path()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{}.epw", stem));

        let run = format!("{}_{}", scenario, period);
        let dir = root.join(path_component(city)).join(&run);
        let morphed = dir.join(format!("{}_morphed_{}.epw", stem, run));
        let baseline = dir.join(name);

        OutputPlan {
            dir,
            morphed,
            baseline,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn morphed_path(&self) -> &Path {
        &self.morphed
    }

    pub fn baseline_path(&self) -> &Path {
        &self.baseline
    }

    /// Write the morphed record and a copy of the baseline, creating directories as needed.
    pub fn write(
        &self,
        record: &WeatherRecord,
        columns: &MorphedColumnSet,
    ) -> Result<(), RecordError> {
        fs::create_dir_all(&self.dir)?;
        record.write_morphed_to(&self.morphed, columns)?;

        match record.path() {
            Some(src) if src != self.baseline.as_path() => {
                fs::copy(src, &self.baseline)?;
            }
            Some(_) => {}
            None => record.write_morphed_to(&self.baseline, &MorphedColumnSet::new())?,
        }

        Ok(())
    }
}

fn path_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "unknown".to_owned()
    } else {
        cleaned
    }
}

/// Baseline and morphed means of one column as read back from disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnCheck {
    pub column: usize,
    pub baseline_mean: f64,
    pub morphed_mean: f64,
    /// Mean of the in-memory series that was written.
    pub expected_mean: f64,
}

impl ColumnCheck {
    pub fn name(&self) -> &'static str {
        COLUMN_NAMES.get(self.column).copied().unwrap_or("?")
    }

    pub fn written_faithfully(&self) -> bool {
        (self.morphed_mean - self.expected_mean).abs() <= MEAN_TOLERANCE
    }
}

/// Re-read a written record and compare each morphed column with the baseline.
pub fn verify(
    baseline: &WeatherRecord,
    morphed_path: &Path,
    columns: &MorphedColumnSet,
) -> Result<Vec<ColumnCheck>, RecordError> {
    let morphed = WeatherRecord::open(morphed_path)?;
    if morphed.num_rows() != baseline.num_rows() {
        return Err(RecordError::RowCount {
            found: morphed.num_rows(),
            expected: baseline.num_rows(),
        });
    }

    let mut checks = Vec::with_capacity(columns.len());
    for column in columns.columns() {
        let expected_mean = match columns.get(column) {
            Some(series) => series.mean(),
            None => continue,
        };

        let check = ColumnCheck {
            column,
            baseline_mean: baseline.column(column)?.mean(),
            morphed_mean: morphed.column(column)?.mean(),
            expected_mean,
        };

        info!(
            "{}: baseline mean {:.2}, morphed mean {:.2}",
            check.name(),
            check.baseline_mean,
            check.morphed_mean
        );
        if !check.written_faithfully() {
            warn!(
                "{}: mean read back as {:.3}, written series mean was {:.3}",
                check.name(),
                check.morphed_mean,
                check.expected_mean
            );
        }

        checks.push(check);
    }

    Ok(checks)
}
