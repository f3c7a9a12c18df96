use crate::dash::io_common::join_location;
use crate::dash::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    pub title: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    #[serde(rename = "summaryPath")]
    pub summary_path: Option<String>,
}

/// Where the six CSV files live. Each file name defaults to `<dataset>.csv`.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataSourceSettings {
    #[serde(rename = "baseLocation")]
    pub base_location: Option<String>,
    pub budgetary: Option<String>,
    pub headcounts: Option<String>,
    pub distributional: Option<String>,
    pub poverty: Option<String>,
    pub inequality: Option<String>,
    pub constituency: Option<String>,
}

impl DataSourceSettings {
    pub fn file_name(&self, dataset: Dataset) -> String {
        let custom = match dataset {
            Dataset::Budgetary => &self.budgetary,
            Dataset::Headcounts => &self.headcounts,
            Dataset::Distributional => &self.distributional,
            Dataset::Poverty => &self.poverty,
            Dataset::Inequality => &self.inequality,
            Dataset::Constituency => &self.constituency,
        };
        match custom {
            Some(x) if !x.trim().is_empty() => x.clone(),
            _ => dataset.default_file_name().to_string(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChartSettings {
    pub distributional: Option<String>,
    #[serde(rename = "constituencyMap")]
    pub constituency_map: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct FetchSettings {
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DashConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "dataSources", default)]
    pub data_sources: DataSourceSettings,
    #[serde(default)]
    pub charts: ChartSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
}

pub fn read_config(path: &str) -> DashResult<DashConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    debug!("read_config: content: {:?}", contents);
    let config: DashConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

/// The resolved location of every dataset.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DataSources {
    locations: Vec<(Dataset, String)>,
}

impl DataSources {
    pub fn resolve(base: &str, settings: &DataSourceSettings) -> DataSources {
        DataSources {
            locations: Dataset::ALL
                .iter()
                .map(|d| (*d, join_location(base, &settings.file_name(*d))))
                .collect(),
        }
    }

    pub fn location(&self, dataset: Dataset) -> &str {
        self.locations
            .iter()
            .find(|(d, _)| *d == dataset)
            .map(|(_, l)| l.as_str())
            .unwrap_or_else(|| dataset.default_file_name())
    }
}
