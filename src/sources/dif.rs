//! Parser for fixed-width monthly change tables (`.dif`/`.mea` files).
//!
//! A table is a few descriptive header lines followed by twelve blocks, each introduced by a
//! `Month is ...` line and holding grid values in 8 character columns. Values at or above
//! 9999 are the missing-data code.
use crate::error::ParseError;
use log::{debug, warn};
use std::fs;
use std::path::Path;

const MONTH_MARKER: &str = "Month is";
const CHUNK_WIDTH: usize = 8;
const MISSING_CODE: f64 = 9999.0;

const HEADER_TOKENS: &[&str] = &[
    "IPCC",
    "Grid is",
    "Mean Change",
    "HADCM",
    "Format is",
    "format is",
    "missing code",
    "Mean daily",
    "Maximum",
    "Minimum",
    "Total Precipitation",
];

/// How the valid values of a month block collapse to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// The first valid value, a single representative grid cell.
    First,
    /// The mean of every valid value, zeros included.
    Mean,
}

/// Parses difference tables with a fixed aggregation policy.
#[derive(Debug, Clone, Copy)]
pub struct DifferenceTableParser {
    aggregation: Aggregation,
}

impl DifferenceTableParser {
    pub fn new(aggregation: Aggregation) -> Self {
        DifferenceTableParser { aggregation }
    }

    pub fn parse<P: AsRef<Path>>(&self, path: P) -> Result<[f64; 12], ParseError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse_str(&text, path)
    }

    /// Parse table text. `path` is only used in error messages.
    pub fn parse_str(&self, text: &str, path: &Path) -> Result<[f64; 12], ParseError> {
        let mut blocks: Vec<(String, Vec<f64>)> = Vec::with_capacity(12);

        for line in text.lines() {
            if let Some(pos) = line.find(MONTH_MARKER) {
                let month = line[pos + MONTH_MARKER.len()..].trim().to_owned();
                blocks.push((month, Vec::new()));
                continue;
            }

            if HEADER_TOKENS.iter().any(|tok| line.contains(tok)) {
                continue;
            }

            // Data before the first month marker belongs to no month.
            let block = match blocks.last_mut() {
                Some((_, values)) => values,
                None => continue,
            };

            match parse_chunks(line) {
                Some(values) => block.extend(values.into_iter().filter(|&v| v < MISSING_CODE)),
                None => debug!("skipping unparsable line in {}: {:?}", path.display(), line),
            }
        }

        let mut monthly = Vec::with_capacity(blocks.len());
        for (month, values) in blocks {
            let value = match (self.aggregation, values.first()) {
                (Aggregation::First, Some(&first)) => first,
                (Aggregation::First, None) => {
                    return Err(ParseError::EmptyMonth {
                        path: path.to_path_buf(),
                        month,
                    })
                }
                (Aggregation::Mean, Some(_)) => values.iter().sum::<f64>() / values.len() as f64,
                (Aggregation::Mean, None) => {
                    warn!(
                        "month {} in {} has no valid values, using 0.0",
                        month,
                        path.display()
                    );
                    0.0
                }
            };
            debug!("{} month {}: {:.4}", path.display(), month, value);
            monthly.push(value);
        }

        if monthly.len() < 12 {
            return Err(ParseError::TooFewMonths {
                path: path.to_path_buf(),
                found: monthly.len(),
            });
        }

        if monthly.len() > 12 {
            warn!(
                "found {} months in {}, using the first 12",
                monthly.len(),
                path.display()
            );
        }

        let mut out = [0.0; 12];
        out.copy_from_slice(&monthly[..12]);
        Ok(out)
    }
}

/// Split a line into 8 character chunks and parse every non-blank chunk.
///
/// Returns `None` if any chunk is not a number.
fn parse_chunks(line: &str) -> Option<Vec<f64>> {
    line.as_bytes()
        .chunks(CHUNK_WIDTH)
        .filter_map(|chunk| {
            let chunk = std::str::from_utf8(chunk).ok().map(str::trim);
            match chunk {
                Some("") => None,
                Some(s) => Some(s.parse::<f64>().ok()),
                None => Some(None),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::path::PathBuf;

    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    /// A table with one line of data per month built by `row(month)`.
    pub(crate) fn table_with<F: Fn(usize) -> String>(row: F) -> String {
        let mut text = String::from(
            "IPCC Data Distribution Centre\nHADCM3 A2a\nMean Change values for 2020\n\
             Grid is 96 x 73\nFormat is 10F8.2, missing code is 9999\n",
        );
        for (m, name) in MONTHS.iter().enumerate() {
            text.push_str(&format!("Month is {}\n", name));
            text.push_str(&row(m));
            text.push('\n');
        }
        text
    }

    fn fake_path() -> PathBuf {
        PathBuf::from("HADCM3_A2a_TEMP_2020.dif")
    }

    #[test]
    fn single_chunk_per_month() {
        let text = table_with(|_| "   12.34".to_owned());
        let parsed = DifferenceTableParser::new(Aggregation::First)
            .parse_str(&text, &fake_path())
            .unwrap();
        for v in parsed.iter() {
            assert_abs_diff_eq!(*v, 12.34);
        }
    }

    #[test]
    fn first_skips_missing_codes() {
        let text = table_with(|m| format!(" 9999.00{:8.2}{:8.2}", m as f64, 100.0));
        let parsed = DifferenceTableParser::new(Aggregation::First)
            .parse_str(&text, &fake_path())
            .unwrap();
        assert_abs_diff_eq!(parsed[0], 0.0);
        assert_abs_diff_eq!(parsed[11], 11.0);
    }

    #[test]
    fn mean_keeps_zeros() {
        let text = table_with(|_| format!("{:8.2}{:8.2}{:8.2} 9999.00", 0.0, 0.3, 0.6));
        let parsed = DifferenceTableParser::new(Aggregation::Mean)
            .parse_str(&text, &fake_path())
            .unwrap();
        for v in parsed.iter() {
            assert_abs_diff_eq!(*v, 0.3, epsilon = 1e-12);
        }
    }

    #[test]
    fn mean_spans_lines_in_a_block() {
        let text = table_with(|_| format!("{:8.2}\n{:8.2}", 1.0, 3.0));
        let parsed = DifferenceTableParser::new(Aggregation::Mean)
            .parse_str(&text, &fake_path())
            .unwrap();
        assert_abs_diff_eq!(parsed[4], 2.0);
    }

    #[test]
    fn too_few_months() {
        let text: String = table_with(|_| "    1.00".to_owned())
            .lines()
            .take(5 + 2 * 11)
            .map(|l| format!("{}\n", l))
            .collect();
        let err = DifferenceTableParser::new(Aggregation::First)
            .parse_str(&text, &fake_path())
            .unwrap_err();
        assert!(matches!(err, ParseError::TooFewMonths { found: 11, .. }));
    }

    #[test]
    fn extra_months_are_truncated() {
        let mut text = table_with(|m| format!("{:8.2}", m as f64));
        text.push_str("Month is Jan\n   99.00\n");
        let parsed = DifferenceTableParser::new(Aggregation::First)
            .parse_str(&text, &fake_path())
            .unwrap();
        assert_abs_diff_eq!(parsed[11], 11.0);
    }

    #[test]
    fn empty_block_fails_first_policy() {
        let text = table_with(|m| {
            if m == 3 {
                " 9999.00".to_owned()
            } else {
                "    1.00".to_owned()
            }
        });
        let err = DifferenceTableParser::new(Aggregation::First)
            .parse_str(&text, &fake_path())
            .unwrap_err();
        assert!(matches!(err, ParseError::EmptyMonth { .. }));

        let parsed = DifferenceTableParser::new(Aggregation::Mean)
            .parse_str(&text, &fake_path())
            .unwrap();
        assert_abs_diff_eq!(parsed[3], 0.0);
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let text = table_with(|_| "  abcdef\n    2.50".to_owned());
        let parsed = DifferenceTableParser::new(Aggregation::First)
            .parse_str(&text, &fake_path())
            .unwrap();
        assert_abs_diff_eq!(parsed[7], 2.5);
    }
}
