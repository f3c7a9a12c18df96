//! Narrative rendering: derived statistics into a single HTML page.
//!
//! Each dataset gets one section, rendered only when that dataset loaded with
//! at least one row. Without budgetary rows the page stays in its loading
//! state.

use log::{debug, info};

use crate::config::*;
use crate::format::*;
use crate::scroll_spy::{SectionId, SectionTracker, VisibilityBand};
use crate::stats::*;

#[derive(PartialEq, Debug, Clone)]
pub struct PageOptions {
    pub title: String,
    /// Location of the pre-rendered distributional chart document.
    pub distributional_chart: Option<String>,
    /// Location of the pre-rendered constituency map document.
    pub constituency_map: Option<String>,
    pub band: VisibilityBand,
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions {
            title: "Impact of the reform".to_string(),
            distributional_chart: None,
            constituency_map: None,
            band: VisibilityBand::DEFAULT,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PageState {
    Loading,
    Ready,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RenderedPage {
    pub state: PageState,
    /// The sections present on the page, in page order.
    pub sections: Vec<SectionId>,
    pub html: String,
}

pub fn render_page(data: &Datasets, stats: &DerivedStats, opts: &PageOptions) -> RenderedPage {
    let years = match &stats.years {
        Some(y) => y,
        None => {
            info!("render_page: no budgetary rows, page stays in the loading state");
            return RenderedPage {
                state: PageState::Loading,
                sections: Vec::new(),
                html: page_shell(opts, "", "<main class=\"loading\"><p>Loading&hellip;</p></main>\n", ""),
            };
        }
    };

    let mut rendered: Vec<(SectionId, String)> = Vec::new();
    for dataset in Dataset::ALL {
        let body = match dataset {
            Dataset::Budgetary => budgetary_section(stats),
            Dataset::Headcounts => headcounts_section(data, stats),
            Dataset::Distributional => distributional_section(data, stats, years, opts),
            Dataset::Poverty => poverty_section(data, stats),
            Dataset::Inequality => inequality_section(stats),
            Dataset::Constituency => constituency_section(data, stats, years, opts),
        };
        if let Some(body) = body {
            rendered.push((SectionId::for_dataset(dataset), body));
        }
    }
    rendered.push((SectionId::Conclusion, conclusion_section(stats, years)));

    let sections: Vec<SectionId> = rendered.iter().map(|(s, _)| *s).collect();
    debug!("render_page: sections {:?}", sections);

    // The navigation lists exactly the sections of this render.
    let mut tracker = SectionTracker::new(opts.band);
    let subscription = tracker.subscribe(&sections);
    let mut nav = String::from("<nav id=\"section-nav\">\n<ul>\n");
    for s in subscription.sections() {
        if let Some(req) = tracker.navigate(*s) {
            nav.push_str(&format!(
                "<li><a href=\"{}\" data-section=\"{}\">{}</a></li>\n",
                req.anchor,
                s.anchor(),
                escape_html(s.title())
            ));
        }
    }
    nav.push_str("</ul>\n</nav>\n");

    let mut main = String::from("<main>\n");
    for (s, body) in rendered.iter() {
        main.push_str(&format!(
            "<section id=\"{}\">\n<h2>{}</h2>\n{}</section>\n",
            s.anchor(),
            escape_html(s.title()),
            body
        ));
    }
    main.push_str("</main>\n");

    let script = NAV_SCRIPT.replace("{ROOT_MARGIN}", &tracker.band().root_margin());
    RenderedPage {
        state: PageState::Ready,
        sections,
        html: page_shell(opts, &nav, &main, &script),
    }
}

const STYLE: &str = "body{font-family:sans-serif;margin:0 auto;max-width:52rem;padding:0 1rem}\n\
#section-nav{position:sticky;top:0;background:#fff}\n\
#section-nav ul{display:flex;flex-wrap:wrap;gap:1rem;list-style:none;padding:0}\n\
#section-nav a.active{font-weight:bold}\n\
table{border-collapse:collapse}\n\
td,th{border-bottom:1px solid #ddd;padding:0.25rem 0.75rem;text-align:right}\n\
iframe{border:0;height:32rem;width:100%}\n";

const NAV_SCRIPT: &str = r#"(function () {
  var links = document.querySelectorAll('#section-nav a');
  var observer = new IntersectionObserver(function (entries) {
    entries.forEach(function (entry) {
      if (!entry.isIntersecting) return;
      links.forEach(function (a) {
        a.classList.toggle('active', a.dataset.section === entry.target.id);
      });
    });
  }, { rootMargin: '{ROOT_MARGIN}' });
  document.querySelectorAll('main > section').forEach(function (s) { observer.observe(s); });
  links.forEach(function (a) {
    a.addEventListener('click', function (ev) {
      ev.preventDefault();
      document.getElementById(a.dataset.section).scrollIntoView({ behavior: 'smooth' });
    });
  });
})();
"#;

fn page_shell(opts: &PageOptions, nav: &str, main: &str, script: &str) -> String {
    let title = escape_html(&opts.title);
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", title));
    out.push_str(&format!("<style>\n{}</style>\n", STYLE));
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!("<header><h1>{}</h1></header>\n", title));
    out.push_str(nav);
    out.push_str(main);
    if !script.is_empty() {
        out.push_str(&format!("<script>\n{}</script>\n", script));
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn para(text: &str) -> String {
    format!("<p>{}</p>\n", escape_html(text))
}

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table>\n<thead><tr>");
    for h in headers {
        out.push_str(&format!("<th>{}</th>", escape_html(h)));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for r in rows {
        out.push_str("<tr>");
        for cell in r {
            out.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

fn chart_frame(location: &Option<String>, title: &str) -> String {
    match location {
        Some(src) => format!(
            "<iframe src=\"{}\" title=\"{}\" loading=\"lazy\"></iframe>\n",
            escape_html(src),
            escape_html(title)
        ),
        None => String::new(),
    }
}

fn signed_billions(x: f64) -> String {
    if x < 0.0 {
        format!("-{}", billions(x, Style::Compact))
    } else {
        billions(x, Style::Compact)
    }
}

/// "The reform would save the Treasury £2.8 billion in 2029 and £3.1 billion in 2030."
pub fn budgetary_sentence(rows: &[BudgetaryRecord]) -> String {
    let plain: Vec<String> = rows
        .iter()
        .map(|r| format!("{} in {}", billions(r.budgetary_impact_bn, Style::Prose), r.year))
        .collect();
    if rows.iter().all(|r| r.budgetary_impact_bn >= 0.0) {
        format!("The reform would save the Treasury {}.", format_list(&plain))
    } else if rows.iter().all(|r| r.budgetary_impact_bn < 0.0) {
        format!("The reform would cost the Treasury {}.", format_list(&plain))
    } else {
        let mixed: Vec<String> = rows
            .iter()
            .map(|r| {
                let kind = if r.budgetary_impact_bn >= 0.0 {
                    "a saving"
                } else {
                    "a cost"
                };
                format!(
                    "{} of {} in {}",
                    kind,
                    billions(r.budgetary_impact_bn, Style::Prose),
                    r.year
                )
            })
            .collect();
        format!(
            "The reform's net effect on the public finances would be {}.",
            format_list(&mixed)
        )
    }
}

fn budgetary_section(stats: &DerivedStats) -> Option<String> {
    if stats.budgetary.is_empty() {
        return None;
    }
    let mut out = para(&budgetary_sentence(&stats.budgetary));
    let rows: Vec<Vec<String>> = stats
        .budgetary
        .iter()
        .map(|r| vec![r.year.to_string(), signed_billions(r.budgetary_impact_bn)])
        .collect();
    out.push_str(&table(&["Year", "Net saving"], &rows));
    Some(out)
}

fn headcounts_section(data: &Datasets, stats: &DerivedStats) -> Option<String> {
    let all = present(&data.headcounts)?;
    let h = stats.headcount.as_ref()?;
    let mut text = format!(
        "In {}, {} households would be affected, including {} children ({} of all children).",
        h.year,
        millions(h.affected_households, Style::Prose),
        millions(h.affected_children, Style::Prose),
        percent(h.pct_children_affected)
    );
    if let (Some(people), Some(pct)) = (h.affected_people, h.pct_people_affected) {
        text.push_str(&format!(
            " In total, {} people live in affected households ({} of the population).",
            millions(people, Style::Prose),
            percent(pct)
        ));
    }
    if let Some(avg) = h.avg_loss_per_affected_hh {
        if avg < 0.0 {
            text.push_str(&format!(
                " Affected households would lose {} a year on average.",
                currency(avg)
            ));
        } else if avg > 0.0 {
            text.push_str(&format!(
                " Affected households would gain {} a year on average.",
                currency(avg)
            ));
        }
    }
    let mut out = para(&text);

    let mut sorted: Vec<&HeadcountRecord> = all.iter().collect();
    sorted.sort_by(|a, b| a.year.cmp(&b.year));
    let rows: Vec<Vec<String>> = sorted
        .iter()
        .map(|r| {
            vec![
                r.year.to_string(),
                millions(r.affected_households, Style::Compact),
                millions(r.affected_children, Style::Compact),
                percent(r.pct_children_affected),
            ]
        })
        .collect();
    out.push_str(&table(
        &["Year", "Households", "Children", "Share of children"],
        &rows,
    ));
    Some(out)
}

fn distributional_section(
    data: &Datasets,
    stats: &DerivedStats,
    years: &HeadlineYears,
    opts: &PageOptions,
) -> Option<String> {
    let all = present(&data.distributional)?;
    let mut first_year: Vec<&DistributionalRecord> =
        all.iter().filter(|r| r.year == years.first).collect();
    first_year.sort_by_key(|r| r.decile);

    let mut out = String::new();
    if first_year.is_empty() {
        out.push_str(&para(&format!(
            "No decile breakdown is available for {}.",
            years.first
        )));
        out.push_str(&chart_frame(
            &opts.distributional_chart,
            "Distributional impact by income decile",
        ));
        return Some(out);
    }

    let mut text = String::new();
    if let Some(w) = &stats.worst_decile {
        let change = if w.avg_change_gbp < 0.0 {
            format!("losing {} a year on average", currency(w.avg_change_gbp))
        } else if w.avg_change_gbp > 0.0 {
            format!("gaining {} a year on average", currency(w.avg_change_gbp))
        } else {
            "with no change in average income".to_string()
        };
        text.push_str(&format!(
            "In {}, households in the {} income decile are hit hardest, {} ({} of household income).",
            years.first,
            ordinal(w.decile),
            change,
            percent(w.relative_change_pct)
        ));
    }
    if let Some(count) = stats.affected_decile_count {
        text.push_str(&format!(
            " {} of the {} deciles see their income change by at least {} a year.",
            count,
            first_year.len(),
            currency(AFFECTED_THRESHOLD_GBP)
        ));
    }
    match stats.unaffected_deciles {
        Some(UnaffectedDeciles::Range { low, high }) => text.push_str(&format!(
            " Households in the {} to {} deciles are essentially unaffected.",
            ordinal(low),
            ordinal(high)
        )),
        Some(UnaffectedDeciles::Single(d)) => text.push_str(&format!(
            " Households in the {} decile are essentially unaffected.",
            ordinal(d)
        )),
        Some(UnaffectedDeciles::None) | None => {}
    }
    out.push_str(&para(text.trim_start()));
    out.push_str(&chart_frame(
        &opts.distributional_chart,
        "Distributional impact by income decile",
    ));
    let rows: Vec<Vec<String>> = first_year
        .iter()
        .map(|r| {
            vec![
                r.decile.to_string(),
                signed_currency(r.avg_change_gbp),
                percent(r.relative_change_pct),
            ]
        })
        .collect();
    out.push_str(&table(
        &["Decile", "Average change", "Relative change"],
        &rows,
    ));
    Some(out)
}

/// One sentence per poverty rate, using the rounded rates for the change.
pub fn poverty_sentence(shift: &RateShift) -> String {
    let subject = match shift.group {
        PopulationGroup::Children => format!("Child {}", shift.measure.describe()),
        PopulationGroup::All => format!("Overall {}", shift.measure.describe()),
    };
    if shift.displayed_change_pp == 0.0 {
        return format!(
            "{} is unchanged at {} in {} ({} percentage points).",
            subject,
            percent(shift.baseline_display),
            shift.year,
            signed_pp(shift.displayed_change_pp)
        );
    }
    let verb = if shift.displayed_change_pp > 0.0 {
        "rises"
    } else {
        "falls"
    };
    format!(
        "{} {} from {} to {} in {} ({} percentage points).",
        subject,
        verb,
        percent(shift.baseline_display),
        percent(shift.reform_display),
        shift.year,
        signed_pp(shift.displayed_change_pp)
    )
}

fn poverty_section(data: &Datasets, stats: &DerivedStats) -> Option<String> {
    let all = present(&data.poverty)?;
    let mut out = String::new();
    for group in [PopulationGroup::Children, PopulationGroup::All] {
        for measure in [PovertyMeasure::ABSOLUTE_BHC, PovertyMeasure::ABSOLUTE_AHC] {
            if let Some(shift) = stats.poverty_shift(group, measure) {
                out.push_str(&para(&poverty_sentence(shift)));
            }
        }
    }
    let mut sorted: Vec<&PovertyRecord> = all.iter().collect();
    // Stable: rows of one year keep their file order.
    sorted.sort_by(|a, b| a.year.cmp(&b.year));
    let rows: Vec<Vec<String>> = sorted
        .iter()
        .map(|r| {
            let s = rate_shift(r);
            vec![
                r.year.to_string(),
                r.group.label().to_string(),
                r.measure.label(),
                percent(s.baseline_display),
                percent(s.reform_display),
                signed_pp(s.displayed_change_pp),
            ]
        })
        .collect();
    out.push_str(&table(
        &["Year", "Group", "Measure", "Baseline", "Reform", "Change (pp)"],
        &rows,
    ));
    Some(out)
}

pub fn inequality_sentence(rows: &[InequalityRecord]) -> String {
    if rows.iter().all(|r| r.gini_change_pct > 0.0) {
        let items: Vec<String> = rows
            .iter()
            .map(|r| format!("{} in {}", percent(r.gini_change_pct.abs()), r.year))
            .collect();
        format!(
            "The reform would increase income inequality: the Gini index rises by {}.",
            format_list(&items)
        )
    } else if rows.iter().all(|r| r.gini_change_pct < 0.0) {
        let items: Vec<String> = rows
            .iter()
            .map(|r| format!("{} in {}", percent(r.gini_change_pct.abs()), r.year))
            .collect();
        format!(
            "The reform would reduce income inequality: the Gini index falls by {}.",
            format_list(&items)
        )
    } else {
        let items: Vec<String> = rows
            .iter()
            .map(|r| format!("{} in {}", percent(r.gini_change_pct), r.year))
            .collect();
        format!("The Gini index changes by {}.", format_list(&items))
    }
}

fn inequality_section(stats: &DerivedStats) -> Option<String> {
    if stats.gini_changes.is_empty() {
        return None;
    }
    let mut out = para(&inequality_sentence(&stats.gini_changes));
    let with_levels: Vec<Vec<String>> = stats
        .gini_changes
        .iter()
        .filter_map(|r| match (r.baseline_gini, r.reform_gini) {
            (Some(b), Some(f)) => Some(vec![
                r.year.to_string(),
                format!("{:.4}", b),
                format!("{:.4}", f),
                percent(r.gini_change_pct),
            ]),
            _ => None,
        })
        .collect();
    if !with_levels.is_empty() {
        out.push_str(&table(
            &["Year", "Baseline Gini", "Reform Gini", "Change"],
            &with_levels,
        ));
    }
    Some(out)
}

fn constituency_section(
    data: &Datasets,
    stats: &DerivedStats,
    years: &HeadlineYears,
    opts: &PageOptions,
) -> Option<String> {
    present(&data.constituency)?;
    let mut out = String::new();
    let top = &stats.map_constituencies;
    if top.is_empty() {
        out.push_str(&para(&format!(
            "No constituency breakdown is available for {}.",
            years.first
        )));
    } else {
        let items: Vec<String> = top
            .iter()
            .map(|r| format!("{} ({})", r.constituency_name, currency(r.avg_change_gbp)))
            .collect();
        let what = if top.iter().all(|r| r.avg_change_gbp < 0.0) {
            "the largest average falls in household income"
        } else {
            "the lowest average changes in household income"
        };
        out.push_str(&para(&format!(
            "In {}, the constituencies with {} are {}.",
            years.first,
            what,
            format_list(&items)
        )));
    }
    out.push_str(&chart_frame(
        &opts.constituency_map,
        "Average change in household income by constituency",
    ));
    if !top.is_empty() {
        out.push_str("<ol class=\"constituencies\">\n");
        for r in top.iter() {
            out.push_str(&format!(
                "<li>{}: {}</li>\n",
                escape_html(&r.constituency_name),
                escape_html(&signed_currency(r.avg_change_gbp))
            ));
        }
        out.push_str("</ol>\n");
    }
    Some(out)
}

fn conclusion_section(stats: &DerivedStats, years: &HeadlineYears) -> String {
    let mut sentences: Vec<String> = Vec::new();
    if let Some(last) = stats.budgetary.iter().find(|r| r.year == years.last) {
        let verb = if last.budgetary_impact_bn >= 0.0 {
            "save"
        } else {
            "cost"
        };
        sentences.push(format!(
            "By {}, the reform would {} {} a year.",
            years.last,
            verb,
            billions(last.budgetary_impact_bn, Style::Prose)
        ));
    }
    if let Some(h) = &stats.headcount {
        sentences.push(format!(
            "It would affect {} children in {} households.",
            millions(h.affected_children, Style::Prose),
            millions(h.affected_households, Style::Prose)
        ));
    }
    if let Some(w) = &stats.worst_decile {
        sentences.push(format!(
            "The {} income decile would be hit hardest.",
            ordinal(w.decile)
        ));
    }
    if let Some(shift) = stats.poverty_shift(PopulationGroup::Children, PovertyMeasure::ABSOLUTE_BHC)
    {
        if shift.displayed_change_pp != 0.0 {
            let verb = if shift.displayed_change_pp > 0.0 {
                "rise"
            } else {
                "fall"
            };
            sentences.push(format!(
                "Child absolute poverty before housing costs would {} by {:.1} percentage points.",
                verb,
                shift.displayed_change_pp.abs()
            ));
        }
    }
    if !stats.conclusion_constituencies.is_empty() {
        let names: Vec<&str> = stats
            .conclusion_constituencies
            .iter()
            .map(|r| r.constituency_name.as_str())
            .collect();
        sentences.push(format!(
            "The hardest-hit constituencies would be {}.",
            format_list(&names)
        ));
    }
    para(&sentences.join(" "))
}
