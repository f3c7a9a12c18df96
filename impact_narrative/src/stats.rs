//! Derived statistics feeding the narrative.
//!
//! Every function here accepts empty input and answers with "nothing" rather
//! than failing, so that a missing dataset only removes the sentences that
//! depend on it.

use log::debug;
use std::cmp::Ordering;

use crate::config::*;

/// The two endpoints a reader compares.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct HeadlineYears {
    pub first: Year,
    pub last: Year,
}

/// Minimum and maximum of the years present in the budgetary dataset.
///
/// The file is normally sorted already; this does not rely on it.
pub fn headline_years(budgetary: &[BudgetaryRecord]) -> Option<HeadlineYears> {
    let first = budgetary.iter().map(|r| &r.year).min()?;
    let last = budgetary.iter().map(|r| &r.year).max()?;
    Some(HeadlineYears {
        first: first.clone(),
        last: last.clone(),
    })
}

/// The budgetary rows in ascending year order.
pub fn budgetary_series(budgetary: &[BudgetaryRecord]) -> Vec<&BudgetaryRecord> {
    let mut rows: Vec<&BudgetaryRecord> = budgetary.iter().collect();
    rows.sort_by(|a, b| a.year.cmp(&b.year));
    rows
}

fn deciles_in_year<'a>(
    rows: &'a [DistributionalRecord],
    year: &Year,
) -> impl Iterator<Item = &'a DistributionalRecord> {
    let year = year.clone();
    rows.iter().filter(move |r| r.year == year)
}

/// The decile with the most negative relative change in `year`.
///
/// Ties go to the lowest decile number. There is no floor: when every decile
/// gains, the smallest gain is still reported.
pub fn worst_decile<'a>(
    rows: &'a [DistributionalRecord],
    year: &Year,
) -> Option<&'a DistributionalRecord> {
    let mut worst: Option<&DistributionalRecord> = None;
    for r in deciles_in_year(rows, year) {
        if !r.relative_change_pct.is_finite() {
            continue;
        }
        worst = match worst {
            None => Some(r),
            Some(w) => {
                let better = r.relative_change_pct < w.relative_change_pct
                    || (r.relative_change_pct == w.relative_change_pct && r.decile < w.decile);
                if better {
                    Some(r)
                } else {
                    Some(w)
                }
            }
        };
    }
    debug!(
        "worst_decile: year {}: {:?}",
        year,
        worst.map(|w| (w.decile, w.relative_change_pct))
    );
    worst
}

fn is_affected(r: &DistributionalRecord) -> bool {
    r.avg_change_gbp.abs() >= AFFECTED_THRESHOLD_GBP
}

/// The deciles whose average change stays under the threshold.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UnaffectedDeciles {
    None,
    Single(u32),
    /// Lowest and highest unaffected decile. Deciles in between are not
    /// checked: a gap in the middle still reads as one range.
    Range { low: u32, high: u32 },
}

pub fn unaffected_deciles(rows: &[DistributionalRecord], year: &Year) -> UnaffectedDeciles {
    let unaffected: Vec<u32> = deciles_in_year(rows, year)
        .filter(|r| !is_affected(r))
        .map(|r| r.decile)
        .collect();
    match (unaffected.iter().min(), unaffected.iter().max()) {
        (Some(low), Some(high)) if unaffected.len() >= 2 => UnaffectedDeciles::Range {
            low: *low,
            high: *high,
        },
        (Some(only), _) => UnaffectedDeciles::Single(*only),
        _ => UnaffectedDeciles::None,
    }
}

/// Number of deciles in `year` whose average change reaches the threshold.
pub fn affected_decile_count(rows: &[DistributionalRecord], year: &Year) -> usize {
    deciles_in_year(rows, year).filter(|r| is_affected(r)).count()
}

/// The `n` constituencies with the lowest average change in `year`, most
/// negative first. Equal values keep their input order.
pub fn top_constituencies<'a>(
    rows: &'a [ConstituencyRecord],
    year: &Year,
    n: usize,
) -> Vec<&'a ConstituencyRecord> {
    let mut sorted: Vec<&ConstituencyRecord> = rows.iter().filter(|r| r.year == *year).collect();
    // sort_by is stable.
    sorted.sort_by(|a, b| {
        a.avg_change_gbp
            .partial_cmp(&b.avg_change_gbp)
            .unwrap_or(Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

/// Rounds to one decimal place, half away from zero.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// A poverty rate before and after the reform, as displayed.
#[derive(PartialEq, Debug, Clone)]
pub struct RateShift {
    pub group: PopulationGroup,
    pub measure: PovertyMeasure,
    pub year: Year,
    pub baseline_display: f64,
    pub reform_display: f64,
    /// Difference of the two rounded rates. This is what the page shows.
    pub displayed_change_pp: f64,
    /// The unrounded `change_pp` field as supplied.
    pub raw_change_pp: f64,
}

pub fn rate_shift(r: &PovertyRecord) -> RateShift {
    let baseline_display = round1(r.baseline_rate_pct);
    let reform_display = round1(r.reform_rate_pct);
    RateShift {
        group: r.group,
        measure: r.measure,
        year: r.year.clone(),
        baseline_display,
        reform_display,
        displayed_change_pp: reform_display - baseline_display,
        raw_change_pp: r.change_pp,
    }
}

pub fn find_poverty<'a>(
    rows: &'a [PovertyRecord],
    year: &Year,
    group: PopulationGroup,
    measure: PovertyMeasure,
) -> Option<&'a PovertyRecord> {
    rows.iter()
        .find(|r| r.year == *year && r.group == group && r.measure == measure)
}

/// The headcount row for `year`, or the earliest row when that year is absent.
pub fn headcount_for<'a>(rows: &'a [HeadcountRecord], year: &Year) -> Option<&'a HeadcountRecord> {
    rows.iter()
        .find(|r| r.year == *year)
        .or_else(|| rows.iter().min_by(|a, b| a.year.cmp(&b.year)))
}

/// Joins items for prose: "A", "A and B", "A, B, and C".
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [a] => a.as_ref().to_string(),
        [a, b] => format!("{} and {}", a.as_ref(), b.as_ref()),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|s| s.as_ref()).collect();
            format!("{}, and {}", head.join(", "), last.as_ref())
        }
    }
}

/// All the derived statistics of a page, computed once.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DerivedStats {
    pub years: Option<HeadlineYears>,
    pub budgetary: Vec<BudgetaryRecord>,
    pub headcount: Option<HeadcountRecord>,
    pub worst_decile: Option<DistributionalRecord>,
    pub unaffected_deciles: Option<UnaffectedDeciles>,
    pub affected_decile_count: Option<usize>,
    pub map_constituencies: Vec<ConstituencyRecord>,
    pub conclusion_constituencies: Vec<ConstituencyRecord>,
    /// First-year shifts for every group and measure present, in file order.
    pub poverty_shifts: Vec<RateShift>,
    pub gini_changes: Vec<InequalityRecord>,
}

impl DerivedStats {
    pub fn compute(data: &Datasets) -> DerivedStats {
        let years = present(&data.budgetary).and_then(headline_years);
        let budgetary: Vec<BudgetaryRecord> = present(&data.budgetary)
            .map(|rows| budgetary_series(rows).into_iter().cloned().collect())
            .unwrap_or_default();
        let first = match &years {
            Some(y) => y.first.clone(),
            None => {
                return DerivedStats {
                    budgetary,
                    ..Default::default()
                }
            }
        };

        let headcount = present(&data.headcounts)
            .and_then(|rows| headcount_for(rows, &first))
            .cloned();

        let distributional = present(&data.distributional).unwrap_or(&[]);
        let has_first_year_deciles = distributional.iter().any(|r| r.year == first);
        let worst = worst_decile(distributional, &first).cloned();
        let (unaffected, affected_count) = if has_first_year_deciles {
            (
                Some(unaffected_deciles(distributional, &first)),
                Some(affected_decile_count(distributional, &first)),
            )
        } else {
            (None, None)
        };

        let constituency = present(&data.constituency).unwrap_or(&[]);
        let map_constituencies: Vec<ConstituencyRecord> =
            top_constituencies(constituency, &first, MAP_LISTING_COUNT)
                .into_iter()
                .cloned()
                .collect();
        let conclusion_constituencies: Vec<ConstituencyRecord> =
            top_constituencies(constituency, &first, CONCLUSION_LISTING_COUNT)
                .into_iter()
                .cloned()
                .collect();

        let poverty_shifts: Vec<RateShift> = present(&data.poverty)
            .unwrap_or(&[])
            .iter()
            .filter(|r| r.year == first)
            .map(rate_shift)
            .collect();

        let mut gini_changes: Vec<InequalityRecord> =
            present(&data.inequality).unwrap_or(&[]).to_vec();
        gini_changes.sort_by(|a, b| a.year.cmp(&b.year));

        DerivedStats {
            years,
            budgetary,
            headcount,
            worst_decile: worst,
            unaffected_deciles: unaffected,
            affected_decile_count: affected_count,
            map_constituencies,
            conclusion_constituencies,
            poverty_shifts,
            gini_changes,
        }
    }

    pub fn poverty_shift(
        &self,
        group: PopulationGroup,
        measure: PovertyMeasure,
    ) -> Option<&RateShift> {
        self.poverty_shifts
            .iter()
            .find(|s| s.group == group && s.measure == measure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decile(year: i64, decile: u32, avg: f64, rel: f64) -> DistributionalRecord {
        DistributionalRecord {
            year: Year::from(year),
            decile,
            avg_change_gbp: avg,
            relative_change_pct: rel,
        }
    }

    fn constituency(name: &str, avg: f64) -> ConstituencyRecord {
        ConstituencyRecord {
            year: Year::from(2029),
            constituency_name: name.to_string(),
            avg_change_gbp: avg,
            constituency_code: None,
            relative_change_pct: None,
        }
    }

    fn budget(year: i64, bn: f64) -> BudgetaryRecord {
        BudgetaryRecord {
            year: Year::from(year),
            budgetary_impact_bn: bn,
        }
    }

    #[test]
    fn headline_years_do_not_depend_on_row_order() {
        let rows = vec![budget(2030, 3.1), budget(2028, 1.0), budget(2029, 2.8)];
        let y = headline_years(&rows).unwrap();
        assert_eq!(y.first, Year::from(2028));
        assert_eq!(y.last, Year::from(2030));
        assert_eq!(headline_years(&[]), None);
    }

    #[test]
    fn headline_years_with_fiscal_labels() {
        let rows = vec![
            BudgetaryRecord {
                year: Year::parse("2030-31").unwrap(),
                budgetary_impact_bn: 3.1,
            },
            BudgetaryRecord {
                year: Year::parse("2029-30").unwrap(),
                budgetary_impact_bn: 2.8,
            },
        ];
        let y = headline_years(&rows).unwrap();
        assert_eq!(y.first.label(), "2029-30");
        assert_eq!(y.last.label(), "2030-31");
    }

    #[test]
    fn worst_decile_is_stable_under_reordering() {
        let mut rows: Vec<DistributionalRecord> = vec![
            decile(2029, 1, -400.0, -2.5),
            decile(2029, 2, -300.0, -1.5),
            decile(2029, 3, -350.0, -2.5),
            decile(2029, 4, -10.0, -0.1),
            decile(2030, 5, -900.0, -9.0),
        ];
        let y = Year::from(2029);
        assert_eq!(worst_decile(&rows, &y).unwrap().decile, 1);
        rows.reverse();
        assert_eq!(worst_decile(&rows, &y).unwrap().decile, 1);
        rows.swap(0, 3);
        assert_eq!(worst_decile(&rows, &y).unwrap().decile, 1);
    }

    #[test]
    fn worst_decile_has_no_floor() {
        let rows = vec![decile(2029, 1, 5.0, 0.3), decile(2029, 2, 0.0, 0.0)];
        assert_eq!(worst_decile(&rows, &Year::from(2029)).unwrap().decile, 2);
        assert_eq!(worst_decile(&rows, &Year::from(2031)), None);
    }

    #[test]
    fn unaffected_deciles_report_min_and_max() {
        let y = Year::from(2029);
        let rows = vec![
            decile(2029, 1, -500.0, -3.0),
            decile(2029, 6, -0.4, 0.0),
            decile(2029, 7, -3.0, 0.0),
            decile(2029, 9, 0.0, 0.0),
            decile(2029, 10, 0.99, 0.0),
        ];
        assert_eq!(
            unaffected_deciles(&rows, &y),
            UnaffectedDeciles::Range { low: 6, high: 10 }
        );
        assert_eq!(affected_decile_count(&rows, &y), 2);

        let one = vec![decile(2029, 1, -500.0, -3.0), decile(2029, 10, 0.2, 0.0)];
        assert_eq!(unaffected_deciles(&one, &y), UnaffectedDeciles::Single(10));
        let none = vec![decile(2029, 1, -1.0, -3.0)];
        assert_eq!(unaffected_deciles(&none, &y), UnaffectedDeciles::None);
        assert_eq!(affected_decile_count(&none, &y), 1);
    }

    #[test]
    fn top_constituencies_sort_stably() {
        let rows = vec![
            constituency("A", -500.0),
            constituency("B", -300.0),
            constituency("C", -500.0),
            constituency("D", -100.0),
            constituency("E", -900.0),
        ];
        let top = top_constituencies(&rows, &Year::from(2029), 5);
        let names: Vec<&str> = top.iter().map(|r| r.constituency_name.as_str()).collect();
        assert_eq!(names, vec!["E", "A", "C", "B", "D"]);
        let top3 = top_constituencies(&rows, &Year::from(2029), 3);
        assert_eq!(top3.len(), 3);
        assert!(top_constituencies(&rows, &Year::from(2030), 5).is_empty());
    }

    #[test]
    fn displayed_change_uses_rounded_rates() {
        let rec = PovertyRecord {
            year: Year::from(2029),
            group: PopulationGroup::Children,
            measure: PovertyMeasure::ABSOLUTE_BHC,
            baseline_rate_pct: 10.01,
            reform_rate_pct: 10.04,
            change_pp: 0.03,
            change_pct: None,
        };
        let s = rate_shift(&rec);
        assert_eq!(s.baseline_display, 10.0);
        assert_eq!(s.reform_display, 10.0);
        assert_eq!(s.displayed_change_pp, 0.0);
        assert_eq!(s.raw_change_pp, 0.03);

        let rec2 = PovertyRecord {
            baseline_rate_pct: 10.04,
            reform_rate_pct: 10.09,
            change_pp: 0.05,
            ..rec
        };
        let s2 = rate_shift(&rec2);
        assert!((s2.displayed_change_pp - 0.1).abs() < 1e-9);
        assert_eq!(s2.raw_change_pp, 0.05);
    }

    #[test]
    fn list_formatting() {
        let empty: [&str; 0] = [];
        assert_eq!(format_list(&empty), "");
        assert_eq!(format_list(&["A"]), "A");
        assert_eq!(format_list(&["A", "B"]), "A and B");
        assert_eq!(format_list(&["A", "B", "C"]), "A, B, and C");
        assert_eq!(format_list(&["A", "B", "C", "D"]), "A, B, C, and D");
    }

    #[test]
    fn derived_stats_without_budgetary_are_empty() {
        let data = Datasets {
            distributional: Some(vec![decile(2029, 1, -5.0, -1.0)]),
            ..Default::default()
        };
        let stats = DerivedStats::compute(&data);
        assert_eq!(stats.years, None);
        assert_eq!(stats.worst_decile, None);
    }

    #[test]
    fn derived_stats_use_first_year() {
        let data = Datasets {
            budgetary: Some(vec![budget(2030, 3.1), budget(2029, 2.8)]),
            distributional: Some(vec![
                decile(2029, 1, -5.0, -1.0),
                decile(2030, 2, -50.0, -10.0),
            ]),
            constituency: Some(vec![constituency("A", -1.0), constituency("B", -2.0)]),
            ..Default::default()
        };
        let stats = DerivedStats::compute(&data);
        assert_eq!(stats.worst_decile.unwrap().decile, 1);
        assert_eq!(stats.affected_decile_count, Some(1));
        assert_eq!(stats.budgetary[0].year, Year::from(2029));
        assert_eq!(stats.map_constituencies[0].constituency_name, "B");
        assert!(stats.poverty_shifts.is_empty());
    }
}
