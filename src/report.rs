//! Box-drawn text tables for run manifests and monthly comparisons.
use crate::pipeline::{Manifest, VariableStatus};
use crate::series::HourlySeries;
use std::fmt::{self, Write};
use unicode_width::UnicodeWidthStr;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A table of right aligned cells with an optional title and footer.
#[derive(Default, Debug)]
pub struct ReportTable {
    title: Option<String>,
    footer: Option<String>,
    column_names: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title<T: Into<String>>(self, title: T) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    pub fn with_footer<T: Into<String>>(self, footer: T) -> Self {
        Self {
            footer: Some(footer.into()),
            ..self
        }
    }

    pub fn with_columns<T: fmt::Display>(self, names: &[T]) -> Self {
        Self {
            column_names: names.iter().map(|n| n.to_string()).collect(),
            ..self
        }
    }

    /// Add a row. Short rows are padded with blanks, extra cells are dropped.
    pub fn add_row(&mut self, cells: Vec<String>) {
        let mut cells = cells;
        cells.resize(self.column_names.len(), String::new());
        self.rows.push(cells);
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Width of every column including one space of padding on each side.
    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .column_names
            .iter()
            .map(|n| UnicodeWidthStr::width(n.as_str()) + 2)
            .collect();

        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(UnicodeWidthStr::width(cell.as_str()) + 2);
            }
        }

        // Widen the narrowest columns until a title or footer fits.
        let banner = self
            .title
            .iter()
            .chain(self.footer.iter())
            .map(|s| UnicodeWidthStr::width(s.as_str()) + 2)
            .max()
            .unwrap_or(0);

        if !widths.is_empty() {
            while inner_width(&widths) < banner {
                let min = widths.iter().cloned().min().unwrap_or(0);
                for width in widths.iter_mut().filter(|w| **w == min) {
                    *width += 1;
                }
            }
        }

        widths
    }

    pub fn render(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        if self.column_names.is_empty() {
            return Ok(out);
        }

        let widths = self.column_widths();
        let total = inner_width(&widths);

        let mut left = '\u{250c}';
        let mut right = '\u{2510}';
        if let Some(title) = &self.title {
            writeln!(out, "{}{}{}", left, "\u{2500}".repeat(total), right)?;
            writeln!(out, "\u{2502}{}\u{2502}", centered(title, total))?;
            left = '\u{251c}';
            right = '\u{2524}';
        }

        rule(&mut out, left, '\u{252c}', right, &widths)?;
        for (name, &width) in self.column_names.iter().zip(&widths) {
            write!(out, "\u{2502}{}", centered(name, width))?;
        }
        writeln!(out, "\u{2502}")?;
        rule(&mut out, '\u{251c}', '\u{253c}', '\u{2524}', &widths)?;

        for row in &self.rows {
            for (cell, &width) in row.iter().zip(&widths) {
                let pad = width - 1 - UnicodeWidthStr::width(cell.as_str());
                write!(out, "\u{2502}{}{} ", " ".repeat(pad), cell)?;
            }
            writeln!(out, "\u{2502}")?;
        }

        match &self.footer {
            Some(footer) => {
                rule(&mut out, '\u{251c}', '\u{2534}', '\u{2524}', &widths)?;
                let pad = total - 1 - UnicodeWidthStr::width(footer.as_str());
                writeln!(out, "\u{2502} {}{}\u{2502}", footer, " ".repeat(pad))?;
                writeln!(out, "\u{2514}{}\u{2518}", "\u{2500}".repeat(total))?;
            }
            None => rule(&mut out, '\u{2514}', '\u{2534}', '\u{2518}', &widths)?,
        }

        Ok(out)
    }
}

fn inner_width(widths: &[usize]) -> usize {
    widths.iter().sum::<usize>() + widths.len().saturating_sub(1)
}

fn centered(text: &str, width: usize) -> String {
    let len = UnicodeWidthStr::width(text);
    let space = width.saturating_sub(len);
    let left = space / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(space - left))
}

fn rule(out: &mut String, left: char, mid: char, right: char, widths: &[usize]) -> fmt::Result {
    out.push(left);
    for (i, &width) in widths.iter().enumerate() {
        if i > 0 {
            out.push(mid);
        }
        out.push_str(&"\u{2500}".repeat(width));
    }
    out.push(right);
    out.push('\n');
    Ok(())
}

/// One row per variable with its outcome.
pub fn manifest_table(manifest: &Manifest) -> ReportTable {
    let mut table = ReportTable::new()
        .with_title("Morphing summary")
        .with_columns(&["Variable", "Status", "Baseline", "Morphed", "Out of range", "Note"]);

    for (var, status) in manifest.iter() {
        let row = match status {
            VariableStatus::Merged {
                baseline_mean,
                morphed_mean,
                out_of_range,
                ..
            } => vec![
                var.key().to_owned(),
                status.label().to_owned(),
                format!("{:.2}", baseline_mean),
                format!("{:.2} {}", morphed_mean, var.units()),
                out_of_range.to_string(),
                String::new(),
            ],
            VariableStatus::Skipped { reason } | VariableStatus::Failed { reason } => vec![
                var.key().to_owned(),
                status.label().to_owned(),
                "-".to_owned(),
                "-".to_owned(),
                "-".to_owned(),
                reason.clone(),
            ],
        };
        table.add_row(row);
    }

    let merged = manifest.merged().count();
    table.with_footer(format!("{} of {} variables merged", merged, manifest.len()))
}

/// Monthly mean of a baseline and a morphed series side by side.
pub fn monthly_table(title: &str, baseline: &HourlySeries, morphed: &HourlySeries) -> ReportTable {
    let mut table = ReportTable::new()
        .with_title(title)
        .with_columns(&["Month", "Baseline", "Morphed", "Change"]);

    let base = baseline.monthly_stats();
    let new = morphed.monthly_stats();
    for (month, (b, m)) in base.iter().zip(new.iter()).enumerate() {
        table.add_row(vec![
            MONTH_NAMES[month].to_owned(),
            format!("{:.2}", b.mean),
            format!("{:.2}", m.mean),
            format!("{:+.2}", m.mean - b.mean),
        ]);
    }

    table
}
