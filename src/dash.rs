mod config_reader;
mod io_common;
mod io_csv;
mod loader;

use log::{debug, info, warn};

use impact_narrative::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::dash::config_reader::*;
use crate::dash::io_common::{is_remote, is_stdout};
use crate::dash::loader::{load_datasets, AssetFetcher, Fetcher};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DashError {
    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the configuration {path}: {source}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary: {source}"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error fetching {resource}: {source}"))]
    Fetching {
        source: reqwest::Error,
        resource: String,
    },
    #[snafu(display("{resource} not found"))]
    NotFound { resource: String },
    #[snafu(display("Error parsing CSV from {resource}: {source}"))]
    CsvParse {
        source: csv::Error,
        resource: String,
    },
    #[snafu(display("Invalid data in {resource}: {source}"))]
    Schema {
        source: NarrativeErrors,
        resource: String,
    },
    #[snafu(display("Error writing {path}: {source}"))]
    Writing {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error starting the runtime: {source}"))]
    Runtime { source: std::io::Error },
    #[snafu(display("Error building the HTTP client: {source}"))]
    HttpClient { source: reqwest::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type DashResult<T> = Result<T, DashError>;

const DEFAULT_BASE_LOCATION: &str = "public/data";

/// Everything a run needs, after merging the configuration file and the
/// command line.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub sources: DataSources,
    pub page: PageOptions,
    pub out: Option<String>,
    pub summary: Option<String>,
    pub reference: Option<String>,
    pub timeout: Option<Duration>,
}

pub fn settings_from_args(args: &Args) -> DashResult<RunSettings> {
    let (config, config_dir) = match &args.config {
        Some(p) => {
            let config = read_config(p)?;
            info!("config: {:?}", config);
            let dir = Path::new(p).parent().map(|d| d.to_path_buf());
            (config, dir)
        }
        None => (DashConfig::default(), None),
    };

    // The command line wins over the configuration file.
    let base = match (&args.data, &config.data_sources.base_location) {
        (Some(d), _) => d.clone(),
        (None, Some(b)) => resolve_against(b, config_dir.as_deref()),
        (None, None) => resolve_against(DEFAULT_BASE_LOCATION, config_dir.as_deref()),
    };
    let sources = DataSources::resolve(&base, &config.data_sources);
    debug!("settings_from_args: sources: {:?}", sources);

    let mut page = PageOptions::default();
    if let Some(t) = args
        .title
        .clone()
        .or_else(|| config.output_settings.title.clone())
    {
        page.title = t;
    }
    page.distributional_chart = config.charts.distributional.clone();
    page.constituency_map = config.charts.constituency_map.clone();

    Ok(RunSettings {
        sources,
        page,
        out: args
            .out
            .clone()
            .or_else(|| config.output_settings.output_path.clone()),
        summary: args
            .summary
            .clone()
            .or_else(|| config.output_settings.summary_path.clone()),
        reference: args.reference.clone(),
        timeout: config.fetch.timeout_seconds.map(Duration::from_secs),
    })
}

fn resolve_against(location: &str, dir: Option<&Path>) -> String {
    match dir {
        Some(d) if !is_remote(location) && Path::new(location).is_relative() => {
            d.join(location).display().to_string()
        }
        _ => location.to_string(),
    }
}

/// The loaded datasets, what was derived from them and the page.
#[derive(PartialEq, Debug, Clone)]
pub struct Dashboard {
    pub datasets: Datasets,
    pub stats: DerivedStats,
    pub page: RenderedPage,
}

pub async fn build_dashboard(fetcher: &dyn Fetcher, settings: &RunSettings) -> Dashboard {
    let datasets = load_datasets(fetcher, &settings.sources).await;
    let absent = datasets.absent();
    if !absent.is_empty() {
        warn!("build_dashboard: absent datasets: {:?}", absent);
    }
    let stats = DerivedStats::compute(&datasets);
    let page = render_page(&datasets, &stats, &settings.page);
    info!(
        "build_dashboard: page {:?} with sections {:?}",
        page.state, page.sections
    );
    Dashboard {
        datasets,
        stats,
        page,
    }
}

fn year_js(y: &Year) -> JSValue {
    json!(y.label())
}

fn build_summary_js(dash: &Dashboard) -> JSValue {
    let stats = &dash.stats;
    let state = match dash.page.state {
        PageState::Loading => "loading",
        PageState::Ready => "ready",
    };
    let sections: Vec<&str> = dash.page.sections.iter().map(|s| s.anchor()).collect();
    let loaded: Vec<&str> = dash.datasets.loaded().iter().map(|d| d.name()).collect();
    let absent: Vec<&str> = dash.datasets.absent().iter().map(|d| d.name()).collect();

    let years = match &stats.years {
        Some(y) => json!({"first": year_js(&y.first), "last": year_js(&y.last)}),
        None => JSValue::Null,
    };
    let budgetary: Vec<JSValue> = stats
        .budgetary
        .iter()
        .map(|r| json!({"year": year_js(&r.year), "budgetaryImpactBn": r.budgetary_impact_bn}))
        .collect();
    let headcount = match &stats.headcount {
        Some(h) => json!({
            "year": year_js(&h.year),
            "affectedHouseholds": h.affected_households,
            "affectedChildren": h.affected_children,
            "pctChildrenAffected": h.pct_children_affected,
        }),
        None => JSValue::Null,
    };
    let worst = match &stats.worst_decile {
        Some(w) => json!({
            "decile": w.decile,
            "avgChangeGbp": w.avg_change_gbp,
            "relativeChangePct": w.relative_change_pct,
        }),
        None => JSValue::Null,
    };
    let unaffected = match stats.unaffected_deciles {
        Some(UnaffectedDeciles::Range { low, high }) => json!({"low": low, "high": high}),
        Some(UnaffectedDeciles::Single(d)) => json!({"low": d, "high": d}),
        Some(UnaffectedDeciles::None) | None => JSValue::Null,
    };
    let constituencies: Vec<JSValue> = stats
        .map_constituencies
        .iter()
        .map(|r| json!({"name": r.constituency_name, "avgChangeGbp": r.avg_change_gbp}))
        .collect();
    let poverty: Vec<JSValue> = stats
        .poverty_shifts
        .iter()
        .map(|s| {
            json!({
                "year": year_js(&s.year),
                "group": s.group.label(),
                "measure": s.measure.label(),
                "baselineRatePct": s.baseline_display,
                "reformRatePct": s.reform_display,
                "displayedChangePp": round1(s.displayed_change_pp),
                "rawChangePp": s.raw_change_pp,
            })
        })
        .collect();
    let gini: Vec<JSValue> = stats
        .gini_changes
        .iter()
        .map(|r| json!({"year": year_js(&r.year), "giniChangePct": r.gini_change_pct}))
        .collect();

    json!({
        "state": state,
        "sections": sections,
        "datasets": {"loaded": loaded, "absent": absent},
        "years": years,
        "budgetary": budgetary,
        "headcount": headcount,
        "worstDecile": worst,
        "affectedDecileCount": stats.affected_decile_count,
        "unaffectedDeciles": unaffected,
        "topConstituencies": constituencies,
        "poverty": poverty,
        "gini": gini,
    })
}

fn write_output(target: &Option<String>, content: &str) -> DashResult<()> {
    match target {
        Some(path) if !is_stdout(target) => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).context(WritingSnafu { path })?;
                }
            }
            fs::write(path, content).context(WritingSnafu { path })?;
            info!("write_output: wrote {} bytes to {}", content.len(), path);
        }
        _ => print!("{}", content),
    }
    Ok(())
}

fn check_reference(reference_path: &str, html: &str) -> DashResult<()> {
    let reference =
        fs::read_to_string(reference_path).context(OpeningFileSnafu { path: reference_path })?;
    if reference != html {
        warn!("Found differences with the reference page");
        print_diff(reference.as_str(), html, "\n");
        whatever!("Difference detected between the rendered page and the reference page")
    }
    Ok(())
}

fn runtime() -> DashResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context(RuntimeSnafu {})
}

pub fn run_dashboard(args: &Args) -> DashResult<()> {
    let settings = settings_from_args(args)?;
    let fetcher = AssetFetcher::new(settings.timeout)?;
    let dash = runtime()?.block_on(build_dashboard(&fetcher, &settings));

    write_output(&settings.out, &dash.page.html)?;

    if settings.summary.is_some() {
        let summary_js = build_summary_js(&dash);
        let pretty = serde_json::to_string_pretty(&summary_js).context(SerializingJsonSnafu {})?;
        write_output(&settings.summary, &pretty)?;
    }

    // The reference page, if provided for comparison
    if let Some(reference_path) = &settings.reference {
        check_reference(reference_path, &dash.page.html)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_path(test_name: &str, file_name: &str) -> String {
        format!(
            "{}/test_data/{}/{}",
            env!("CARGO_MANIFEST_DIR"),
            test_name,
            file_name
        )
    }

    fn fixture_args(test_name: &str) -> Args {
        Args {
            config: Some(fixture_path(
                test_name,
                &format!("{}_config.json", test_name),
            )),
            ..Default::default()
        }
    }

    fn run_fixture(test_name: &str) -> Dashboard {
        let _ = env_logger::builder().is_test(true).try_init();
        let settings = settings_from_args(&fixture_args(test_name)).unwrap();
        let fetcher = AssetFetcher::new(settings.timeout).unwrap();
        runtime()
            .unwrap()
            .block_on(build_dashboard(&fetcher, &settings))
    }

    /// Renders the fixture and checks the page against its fragment list.
    /// Lines starting with '!' must not appear in the page.
    fn test_wrapper(test_name: &str) -> Dashboard {
        let dash = run_fixture(test_name);
        let fragments = fs::read_to_string(fixture_path(
            test_name,
            &format!("{}_expected_fragments.txt", test_name),
        ))
        .unwrap();
        for line in fragments.lines().filter(|l| !l.trim().is_empty()) {
            if let Some(absent) = line.strip_prefix('!') {
                assert!(
                    !dash.page.html.contains(absent),
                    "{}: unexpected fragment {:?}",
                    test_name,
                    absent
                );
            } else {
                assert!(
                    dash.page.html.contains(line),
                    "{}: missing fragment {:?}\n{}",
                    test_name,
                    line,
                    dash.page.html
                );
            }
        }
        dash
    }

    #[test]
    fn numeric_years() {
        let dash = test_wrapper("numeric_years");
        assert_eq!(dash.page.state, PageState::Ready);
        assert_eq!(dash.page.sections, SectionId::ALL.to_vec());
    }

    #[test]
    fn two_child_limit() {
        let dash = test_wrapper("two_child_limit");
        assert_eq!(dash.page.sections.len(), 7);
        let years = dash.stats.years.unwrap();
        assert_eq!(years.first.label(), "2029-30");
        assert_eq!(years.last.label(), "2030-31");
    }

    #[test]
    fn missing_constituency() {
        let dash = test_wrapper("missing_constituency");
        assert_eq!(dash.datasets.absent(), vec![Dataset::Constituency]);
        assert!(!dash.page.sections.contains(&SectionId::Constituency));
        assert_eq!(dash.page.sections.last(), Some(&SectionId::Conclusion));
    }

    #[test]
    fn missing_budgetary() {
        let dash = test_wrapper("missing_budgetary");
        assert_eq!(dash.page.state, PageState::Loading);
        assert!(dash.page.sections.is_empty());
        assert!(dash.datasets.is_present(Dataset::Poverty));
    }

    #[test]
    fn command_line_overrides_config() {
        let mut args = fixture_args("two_child_limit");
        args.title = Some("Custom".to_string());
        args.data = Some("https://example.org/data/".to_string());
        let settings = settings_from_args(&args).unwrap();
        assert_eq!(settings.page.title, "Custom");
        assert_eq!(
            settings.sources.location(Dataset::Poverty),
            "https://example.org/data/poverty.csv"
        );
        assert_eq!(settings.timeout, Some(Duration::from_secs(20)));
        assert_eq!(
            settings.page.constituency_map.as_deref(),
            Some("charts/constituency_map.html")
        );
    }

    #[test]
    fn relative_base_follows_config_file() {
        let settings = settings_from_args(&fixture_args("missing_budgetary")).unwrap();
        let expected = Path::new(&fixture_path("missing_budgetary", ""))
            .join("../numeric_years")
            .join("poverty.csv")
            .display()
            .to_string();
        assert_eq!(settings.sources.location(Dataset::Poverty), expected);
    }

    #[test]
    fn writes_page_summary_and_checks_reference() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("site/index.html").display().to_string();
        let summary = dir.path().join("summary.json").display().to_string();
        let mut args = fixture_args("numeric_years");
        args.out = Some(out.clone());
        args.summary = Some(summary.clone());
        run_dashboard(&args).unwrap();

        let html = fs::read_to_string(&out).unwrap();
        assert!(html.contains("£2.8 billion in 2029 and £3.1 billion in 2030"));

        let js: JSValue = serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        assert_eq!(js["state"], json!("ready"));
        assert_eq!(js["worstDecile"]["decile"], json!(1));
        assert_eq!(js["affectedDecileCount"], json!(6));
        assert_eq!(js["unaffectedDeciles"], json!({"low": 6, "high": 10}));
        assert_eq!(js["topConstituencies"][0]["name"], json!("Birmingham, Ladywood"));
        assert_eq!(js["poverty"][0]["displayedChangePp"], json!(1.3));
        assert_eq!(js["poverty"][0]["rawChangePp"], json!(1.22));

        // The page just written is its own reference.
        let mut again = fixture_args("numeric_years");
        again.out = Some(dir.path().join("again.html").display().to_string());
        again.reference = Some(out.clone());
        assert!(run_dashboard(&again).is_ok());

        fs::write(&out, "<html></html>").unwrap();
        assert!(run_dashboard(&again).is_err());
    }
}
