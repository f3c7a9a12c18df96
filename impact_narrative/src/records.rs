//! Schema validation: loose CSV rows into typed records.

use log::{debug, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::Display;

use crate::config::*;

/// Why a single row was rejected.
#[derive(PartialEq, Debug, Clone)]
pub enum RowError {
    MissingField { column: &'static str },
    NotANumber { column: &'static str, content: String },
    Unrecognized { column: &'static str, content: String },
}

impl Error for RowError {}

impl Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowError::MissingField { column } => write!(f, "missing field {}", column),
            RowError::NotANumber { column, content } => {
                write!(f, "field {} is not a number: {:?}", column, content)
            }
            RowError::Unrecognized { column, content } => {
                write!(f, "field {} has an unrecognized value: {:?}", column, content)
            }
        }
    }
}

/// A record type that can be read from one row of its dataset.
pub trait FromRow: Sized {
    const DATASET: Dataset;
    /// Columns without which no row of the dataset can be read.
    const REQUIRED: &'static [&'static str];

    fn from_row(row: &Row) -> Result<Self, RowError>;

    /// The discriminating key within a year. Rows are unique per (year, key).
    fn key(&self) -> (Year, String);
}

fn number(row: &Row, column: &'static str) -> Result<f64, RowError> {
    match row.get(column) {
        Field::Number(x) => Ok(*x),
        Field::Missing => Err(RowError::MissingField { column }),
        Field::Text(s) if s.trim().is_empty() => Err(RowError::MissingField { column }),
        Field::Text(s) => Err(RowError::NotANumber {
            column,
            content: s.clone(),
        }),
    }
}

fn optional_number(row: &Row, column: &'static str) -> Option<f64> {
    row.get(column).as_f64()
}

fn text(row: &Row, column: &'static str) -> Result<String, RowError> {
    match row.get(column).as_text() {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(RowError::MissingField { column }),
    }
}

fn optional_text(row: &Row, column: &'static str) -> Option<String> {
    row.get(column)
        .as_text()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn year(row: &Row) -> Result<Year, RowError> {
    let field = row.get("year");
    if field.is_missing() {
        return Err(RowError::MissingField { column: "year" });
    }
    Year::from_field(field).ok_or_else(|| RowError::Unrecognized {
        column: "year",
        content: field.as_text().unwrap_or_default(),
    })
}

impl FromRow for BudgetaryRecord {
    const DATASET: Dataset = Dataset::Budgetary;
    const REQUIRED: &'static [&'static str] = &["year", "budgetary_impact_bn"];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(BudgetaryRecord {
            year: year(row)?,
            budgetary_impact_bn: number(row, "budgetary_impact_bn")?,
        })
    }

    fn key(&self) -> (Year, String) {
        (self.year.clone(), String::new())
    }
}

impl FromRow for HeadcountRecord {
    const DATASET: Dataset = Dataset::Headcounts;
    const REQUIRED: &'static [&'static str] = &[
        "year",
        "affected_households",
        "affected_children",
        "pct_children_affected",
    ];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(HeadcountRecord {
            year: year(row)?,
            affected_households: number(row, "affected_households")?,
            affected_children: number(row, "affected_children")?,
            pct_children_affected: number(row, "pct_children_affected")?,
            total_households: optional_number(row, "total_households"),
            total_people: optional_number(row, "total_people"),
            affected_people: optional_number(row, "affected_people"),
            total_children: optional_number(row, "total_children"),
            pct_households_affected: optional_number(row, "pct_households_affected"),
            pct_people_affected: optional_number(row, "pct_people_affected"),
            avg_loss_per_affected_hh: optional_number(row, "avg_loss_per_affected_hh"),
        })
    }

    fn key(&self) -> (Year, String) {
        (self.year.clone(), String::new())
    }
}

impl FromRow for DistributionalRecord {
    const DATASET: Dataset = Dataset::Distributional;
    const REQUIRED: &'static [&'static str] =
        &["year", "decile", "avg_change_gbp", "relative_change_pct"];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        let d = number(row, "decile")?;
        if d.fract() != 0.0 || d < 1.0 || d > u32::MAX as f64 {
            return Err(RowError::Unrecognized {
                column: "decile",
                content: d.to_string(),
            });
        }
        Ok(DistributionalRecord {
            year: year(row)?,
            decile: d as u32,
            avg_change_gbp: number(row, "avg_change_gbp")?,
            relative_change_pct: number(row, "relative_change_pct")?,
        })
    }

    fn key(&self) -> (Year, String) {
        (self.year.clone(), self.decile.to_string())
    }
}

impl FromRow for PovertyRecord {
    const DATASET: Dataset = Dataset::Poverty;
    const REQUIRED: &'static [&'static str] = &[
        "year",
        "group",
        "measure",
        "baseline_rate_pct",
        "reform_rate_pct",
        "change_pp",
    ];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        let group_s = text(row, "group")?;
        let group = PopulationGroup::parse(&group_s).ok_or(RowError::Unrecognized {
            column: "group",
            content: group_s,
        })?;
        let measure_s = text(row, "measure")?;
        let measure = PovertyMeasure::parse(&measure_s).ok_or(RowError::Unrecognized {
            column: "measure",
            content: measure_s,
        })?;
        Ok(PovertyRecord {
            year: year(row)?,
            group,
            measure,
            baseline_rate_pct: number(row, "baseline_rate_pct")?,
            reform_rate_pct: number(row, "reform_rate_pct")?,
            change_pp: number(row, "change_pp")?,
            change_pct: optional_number(row, "change_pct"),
        })
    }

    fn key(&self) -> (Year, String) {
        (
            self.year.clone(),
            format!("{}/{}", self.group.label(), self.measure.label()),
        )
    }
}

impl FromRow for InequalityRecord {
    const DATASET: Dataset = Dataset::Inequality;
    const REQUIRED: &'static [&'static str] = &["year", "gini_change_pct"];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(InequalityRecord {
            year: year(row)?,
            gini_change_pct: number(row, "gini_change_pct")?,
            baseline_gini: optional_number(row, "baseline_gini"),
            reform_gini: optional_number(row, "reform_gini"),
        })
    }

    fn key(&self) -> (Year, String) {
        (self.year.clone(), String::new())
    }
}

impl FromRow for ConstituencyRecord {
    const DATASET: Dataset = Dataset::Constituency;
    const REQUIRED: &'static [&'static str] = &["year", "constituency_name", "avg_change_gbp"];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(ConstituencyRecord {
            year: year(row)?,
            constituency_name: text(row, "constituency_name")?,
            avg_change_gbp: number(row, "avg_change_gbp")?,
            constituency_code: optional_text(row, "constituency_code"),
            relative_change_pct: optional_number(row, "relative_change_pct"),
        })
    }

    fn key(&self) -> (Year, String) {
        (self.year.clone(), self.constituency_name.clone())
    }
}

/// Reads every row of a table into records of type `T`.
///
/// A header without one of the required columns rejects the whole table.
/// Rows that cannot be read, and rows repeating an earlier (year, key) pair,
/// are skipped with a warning.
pub fn validate_table<T: FromRow>(table: &Table) -> Result<Vec<T>, NarrativeErrors> {
    let dataset = T::DATASET;
    if table.headers.is_empty() {
        return Err(NarrativeErrors::EmptyHeader { dataset });
    }
    let missing: Vec<String> = T::REQUIRED
        .iter()
        .filter(|c| !table.headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(NarrativeErrors::MissingColumns {
            dataset,
            columns: missing,
        });
    }
    let extra: Vec<&String> = table
        .headers
        .iter()
        .filter(|h| !T::REQUIRED.contains(&h.as_str()))
        .collect();
    if !extra.is_empty() {
        debug!("validate_table: {}: extra columns {:?}", dataset, extra);
    }

    let mut seen: HashSet<(Year, String)> = HashSet::new();
    let mut res: Vec<T> = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        // Line numbers are 1-based and the header is line 1.
        let lineno = idx + 2;
        match T::from_row(row) {
            Ok(rec) => {
                let key = rec.key();
                if seen.contains(&key) {
                    warn!(
                        "{}: line {}: duplicate row for {} {:?}, skipping",
                        dataset, lineno, key.0, key.1
                    );
                } else {
                    seen.insert(key);
                    res.push(rec);
                }
            }
            Err(e) => {
                warn!("{}: line {}: skipping row: {}", dataset, lineno, e);
            }
        }
    }
    debug!(
        "validate_table: {}: {} of {} rows accepted",
        dataset,
        res.len(),
        table.rows.len()
    );
    Ok(res)
}
