// ********* Input data structures ***********

use std::cmp::Ordering;
use std::error::Error;
use std::fmt::Display;

/// A single cell of a loaded CSV file, after numeric coercion.
#[derive(PartialEq, Debug, Clone)]
pub enum Field {
    /// The trimmed text was non-empty and parsed as a finite number.
    Number(f64),
    /// Anything else, kept verbatim (including the empty string).
    Text(String),
    /// The row was shorter than the header.
    Missing,
}

impl Field {
    /// Coerces raw cell text.
    ///
    /// `"3.5"` becomes `Number(3.5)`, `""` stays `Text("")`, `"N/A"` stays
    /// `Text("N/A")`. Non-finite spellings such as `NaN` or `inf` are kept as text.
    pub fn coerce(raw: &str) -> Field {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Field::Text(raw.to_string());
        }
        match trimmed.parse::<f64>() {
            Ok(x) if x.is_finite() => Field::Number(x),
            _ => Field::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Number(x) => Some(*x),
            _ => None,
        }
    }

    /// The textual content of the cell. Numbers are rendered back without a
    /// trailing `.0` when they are integral.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Field::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => {
                Some(format!("{}", *x as i64))
            }
            Field::Number(x) => Some(x.to_string()),
            Field::Text(s) => Some(s.clone()),
            Field::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }
}

/// An ordered mapping from column name to field, as read from one CSV line.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Row {
    fields: Vec<(String, Field)>,
}

static MISSING: Field = Field::Missing;

impl Row {
    pub fn new() -> Row {
        Row { fields: Vec::new() }
    }

    pub fn push(&mut self, column: &str, field: Field) {
        self.fields.push((column.to_string(), field));
    }

    /// Looks up a column. Unknown columns read as `Field::Missing`.
    pub fn get(&self, column: &str) -> &Field {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, f)| f)
            .unwrap_or(&MISSING)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A parsed CSV file: the header line and the data rows in file order.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// A projection year.
///
/// The upstream script labels fiscal years as `2029-30`, which do not coerce to
/// a number, while hand-written files may use a plain `2029`. Years are
/// ordered by the leading integer of the label, then by the label itself.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Year {
    key: i64,
    label: String,
}

impl Year {
    pub fn parse(s: &str) -> Option<Year> {
        let label = s.trim();
        let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
        let key = digits.parse::<i64>().ok()?;
        Some(Year {
            key,
            label: label.to_string(),
        })
    }

    pub fn from_field(field: &Field) -> Option<Year> {
        match field {
            Field::Number(x) if x.fract() == 0.0 => Some(Year::from(*x as i64)),
            Field::Number(_) => None,
            Field::Text(s) => Year::parse(s),
            Field::Missing => None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key(&self) -> i64 {
        self.key
    }
}

impl From<i64> for Year {
    fn from(y: i64) -> Year {
        Year {
            key: y,
            label: y.to_string(),
        }
    }
}

impl Ord for Year {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for Year {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// The six datasets produced by the microsimulation run.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Dataset {
    Budgetary,
    Headcounts,
    Distributional,
    Poverty,
    Inequality,
    Constituency,
}

impl Dataset {
    pub const ALL: [Dataset; 6] = [
        Dataset::Budgetary,
        Dataset::Headcounts,
        Dataset::Distributional,
        Dataset::Poverty,
        Dataset::Inequality,
        Dataset::Constituency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Budgetary => "budgetary",
            Dataset::Headcounts => "headcounts",
            Dataset::Distributional => "distributional",
            Dataset::Poverty => "poverty",
            Dataset::Inequality => "inequality",
            Dataset::Constituency => "constituency",
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            Dataset::Budgetary => "budgetary.csv",
            Dataset::Headcounts => "headcounts.csv",
            Dataset::Distributional => "distributional.csv",
            Dataset::Poverty => "poverty.csv",
            Dataset::Inequality => "inequality.csv",
            Dataset::Constituency => "constituency.csv",
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PopulationGroup {
    Children,
    All,
}

impl PopulationGroup {
    pub fn parse(s: &str) -> Option<PopulationGroup> {
        match s.trim() {
            "Children" => Some(PopulationGroup::Children),
            "All" => Some(PopulationGroup::All),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PopulationGroup::Children => "Children",
            PopulationGroup::All => "All",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PovertyBasis {
    Absolute,
    Relative,
}

/// Before (BHC) or after (AHC) housing costs.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum HousingCosts {
    Bhc,
    Ahc,
}

/// A poverty measure as labelled in the poverty file, e.g. `Absolute BHC`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct PovertyMeasure {
    pub basis: PovertyBasis,
    pub housing: HousingCosts,
}

impl PovertyMeasure {
    pub const ABSOLUTE_BHC: PovertyMeasure = PovertyMeasure {
        basis: PovertyBasis::Absolute,
        housing: HousingCosts::Bhc,
    };
    pub const ABSOLUTE_AHC: PovertyMeasure = PovertyMeasure {
        basis: PovertyBasis::Absolute,
        housing: HousingCosts::Ahc,
    };

    pub fn parse(s: &str) -> Option<PovertyMeasure> {
        let mut parts = s.split_whitespace();
        let basis = match parts.next()? {
            "Absolute" => PovertyBasis::Absolute,
            "Relative" => PovertyBasis::Relative,
            _ => return None,
        };
        let housing = match parts.next()? {
            "BHC" => HousingCosts::Bhc,
            "AHC" => HousingCosts::Ahc,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(PovertyMeasure { basis, housing })
    }

    pub fn label(&self) -> String {
        let basis = match self.basis {
            PovertyBasis::Absolute => "Absolute",
            PovertyBasis::Relative => "Relative",
        };
        let housing = match self.housing {
            HousingCosts::Bhc => "BHC",
            HousingCosts::Ahc => "AHC",
        };
        format!("{} {}", basis, housing)
    }

    /// Prose form, e.g. "absolute poverty before housing costs".
    pub fn describe(&self) -> &'static str {
        match (self.basis, self.housing) {
            (PovertyBasis::Absolute, HousingCosts::Bhc) => {
                "absolute poverty before housing costs"
            }
            (PovertyBasis::Absolute, HousingCosts::Ahc) => "absolute poverty after housing costs",
            (PovertyBasis::Relative, HousingCosts::Bhc) => {
                "relative poverty before housing costs"
            }
            (PovertyBasis::Relative, HousingCosts::Ahc) => "relative poverty after housing costs",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct BudgetaryRecord {
    pub year: Year,
    /// Net government savings, in billions. Positive means the reform saves money.
    pub budgetary_impact_bn: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct HeadcountRecord {
    pub year: Year,
    pub affected_households: f64,
    pub affected_children: f64,
    pub pct_children_affected: f64,
    pub total_households: Option<f64>,
    pub total_people: Option<f64>,
    pub affected_people: Option<f64>,
    pub total_children: Option<f64>,
    pub pct_households_affected: Option<f64>,
    pub pct_people_affected: Option<f64>,
    pub avg_loss_per_affected_hh: Option<f64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct DistributionalRecord {
    pub year: Year,
    pub decile: u32,
    pub avg_change_gbp: f64,
    pub relative_change_pct: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PovertyRecord {
    pub year: Year,
    pub group: PopulationGroup,
    pub measure: PovertyMeasure,
    pub baseline_rate_pct: f64,
    pub reform_rate_pct: f64,
    pub change_pp: f64,
    pub change_pct: Option<f64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct InequalityRecord {
    pub year: Year,
    pub gini_change_pct: f64,
    pub baseline_gini: Option<f64>,
    pub reform_gini: Option<f64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ConstituencyRecord {
    pub year: Year,
    pub constituency_name: String,
    pub avg_change_gbp: f64,
    pub constituency_code: Option<String>,
    pub relative_change_pct: Option<f64>,
}

/// Everything loaded for one page view.
///
/// `None` means the dataset could not be loaded at all, `Some(vec![])` that it
/// loaded with no rows. Both omit the corresponding section.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Datasets {
    pub budgetary: Option<Vec<BudgetaryRecord>>,
    pub headcounts: Option<Vec<HeadcountRecord>>,
    pub distributional: Option<Vec<DistributionalRecord>>,
    pub poverty: Option<Vec<PovertyRecord>>,
    pub inequality: Option<Vec<InequalityRecord>>,
    pub constituency: Option<Vec<ConstituencyRecord>>,
}

/// The rows of a dataset, if it loaded with at least one row.
pub fn present<T>(rows: &Option<Vec<T>>) -> Option<&[T]> {
    match rows {
        Some(v) if !v.is_empty() => Some(v.as_slice()),
        _ => None,
    }
}

impl Datasets {
    pub fn is_present(&self, dataset: Dataset) -> bool {
        match dataset {
            Dataset::Budgetary => present(&self.budgetary).is_some(),
            Dataset::Headcounts => present(&self.headcounts).is_some(),
            Dataset::Distributional => present(&self.distributional).is_some(),
            Dataset::Poverty => present(&self.poverty).is_some(),
            Dataset::Inequality => present(&self.inequality).is_some(),
            Dataset::Constituency => present(&self.constituency).is_some(),
        }
    }

    /// The datasets that loaded with at least one row, in canonical order.
    pub fn loaded(&self) -> Vec<Dataset> {
        Dataset::ALL
            .iter()
            .filter(|d| self.is_present(**d))
            .cloned()
            .collect()
    }

    pub fn absent(&self) -> Vec<Dataset> {
        Dataset::ALL
            .iter()
            .filter(|d| !self.is_present(**d))
            .cloned()
            .collect()
    }
}

// ********* Configuration **********

/// Households whose average income changes by less than this amount (in
/// pounds per year) are considered unaffected.
pub const AFFECTED_THRESHOLD_GBP: f64 = 1.0;

/// Number of constituencies listed next to the map.
pub const MAP_LISTING_COUNT: usize = 5;

/// Number of constituencies named in the conclusion.
pub const CONCLUSION_LISTING_COUNT: usize = 3;

pub const CURRENCY_SYMBOL: &str = "£";

// ******** Errors *********

/// Errors raised while turning loose rows into typed records.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum NarrativeErrors {
    /// The header line lacks columns the dataset cannot do without.
    MissingColumns {
        dataset: Dataset,
        columns: Vec<String>,
    },
    /// The file had no header line at all.
    EmptyHeader { dataset: Dataset },
}

impl Error for NarrativeErrors {}

impl Display for NarrativeErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NarrativeErrors::MissingColumns { dataset, columns } => write!(
                f,
                "dataset {} is missing required columns: {}",
                dataset,
                columns.join(", ")
            ),
            NarrativeErrors::EmptyHeader { dataset } => {
                write!(f, "dataset {} has no header line", dataset)
            }
        }
    }
}
