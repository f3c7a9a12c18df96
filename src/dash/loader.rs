use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::dash::config_reader::DataSources;
use crate::dash::io_common::{is_remote, simplify_file_name};
use crate::dash::io_csv::parse_csv_text;
use crate::dash::*;

/// Retrieves the text of one static asset.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, location: &str) -> DashResult<String>;
}

/// Reads http(s) locations over the network and everything else from disk.
pub struct AssetFetcher {
    client: Client,
}

impl AssetFetcher {
    pub fn new(timeout: Option<Duration>) -> DashResult<AssetFetcher> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().context(HttpClientSnafu {})?;
        Ok(AssetFetcher { client })
    }
}

#[async_trait]
impl Fetcher for AssetFetcher {
    async fn fetch_text(&self, location: &str) -> DashResult<String> {
        if is_remote(location) {
            debug!("fetch_text: GET {}", location);
            let resp = self
                .client
                .get(location)
                .send()
                .await
                .context(FetchingSnafu { resource: location })?;
            ensure!(
                resp.status() != StatusCode::NOT_FOUND,
                NotFoundSnafu { resource: location }
            );
            let resp = resp
                .error_for_status()
                .context(FetchingSnafu { resource: location })?;
            resp.text().await.context(FetchingSnafu { resource: location })
        } else {
            debug!("fetch_text: reading {}", location);
            tokio::fs::read_to_string(location)
                .await
                .context(OpeningFileSnafu { path: location })
        }
    }
}

async fn fetch_table<T: FromRow>(fetcher: &dyn Fetcher, location: &str) -> DashResult<Vec<T>> {
    let text = fetcher.fetch_text(location).await?;
    let table = parse_csv_text(location, &text)?;
    validate_table::<T>(&table).context(SchemaSnafu { resource: location })
}

/// Loads one dataset. Any failure leaves the dataset absent.
async fn load_dataset<T: FromRow>(fetcher: &dyn Fetcher, location: &str) -> Option<Vec<T>> {
    match fetch_table::<T>(fetcher, location).await {
        Ok(rows) => {
            info!(
                "load_dataset: {}: {} rows from {}",
                T::DATASET,
                rows.len(),
                simplify_file_name(location)
            );
            Some(rows)
        }
        Err(e) => {
            warn!("load_dataset: {} is absent: {}", T::DATASET, e);
            None
        }
    }
}

/// Fetches the six datasets concurrently. The result is only returned once
/// every fetch has completed or failed.
pub async fn load_datasets(fetcher: &dyn Fetcher, sources: &DataSources) -> Datasets {
    let (budgetary, headcounts, distributional, poverty, inequality, constituency) = tokio::join!(
        load_dataset::<BudgetaryRecord>(fetcher, sources.location(Dataset::Budgetary)),
        load_dataset::<HeadcountRecord>(fetcher, sources.location(Dataset::Headcounts)),
        load_dataset::<DistributionalRecord>(fetcher, sources.location(Dataset::Distributional)),
        load_dataset::<PovertyRecord>(fetcher, sources.location(Dataset::Poverty)),
        load_dataset::<InequalityRecord>(fetcher, sources.location(Dataset::Inequality)),
        load_dataset::<ConstituencyRecord>(fetcher, sources.location(Dataset::Constituency)),
    );
    Datasets {
        budgetary,
        headcounts,
        distributional,
        poverty,
        inequality,
        constituency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Serves files from memory; anything else is a 404.
    struct MemoryFetcher {
        files: HashMap<String, String>,
    }

    #[async_trait]
    impl Fetcher for MemoryFetcher {
        async fn fetch_text(&self, location: &str) -> DashResult<String> {
            self.files
                .get(location)
                .cloned()
                .context(NotFoundSnafu { resource: location })
        }
    }

    fn fetcher(files: &[(&str, &str)]) -> MemoryFetcher {
        MemoryFetcher {
            files: files
                .iter()
                .map(|(k, v)| (format!("https://host/data/{}", k), v.to_string()))
                .collect(),
        }
    }

    fn sources() -> DataSources {
        DataSources::resolve("https://host/data", &DataSourceSettings::default())
    }

    #[tokio::test]
    async fn missing_file_leaves_dataset_absent() {
        let f = fetcher(&[
            ("budgetary.csv", "year,budgetary_impact_bn\n2029,2.8\n2030,3.1\n"),
            (
                "headcounts.csv",
                "year,affected_households,affected_children,pct_children_affected\n2029,450000,1560000,11.2\n",
            ),
            (
                "distributional.csv",
                "year,decile,avg_change_gbp,relative_change_pct\n2029,1,-400,-2.1\n",
            ),
            (
                "poverty.csv",
                "year,group,measure,baseline_rate_pct,reform_rate_pct,change_pp\n2029,Children,Absolute BHC,18.0,19.3,1.3\n",
            ),
            ("inequality.csv", "year,gini_change_pct\n2029,0.4\n"),
        ]);
        let data = load_datasets(&f, &sources()).await;
        assert_eq!(data.absent(), vec![Dataset::Constituency]);
        assert_eq!(data.constituency, None);
        assert_eq!(data.budgetary.as_ref().map(|v| v.len()), Some(2));
    }

    #[tokio::test]
    async fn schema_failure_leaves_dataset_absent() {
        let f = fetcher(&[
            ("budgetary.csv", "year,impact\n2029,2.8\n"),
            (
                "constituency.csv",
                "year,constituency_name,avg_change_gbp\n2029,\"Birmingham, Ladywood\",-612.4\n",
            ),
        ]);
        let data = load_datasets(&f, &sources()).await;
        assert_eq!(data.budgetary, None);
        let c = data.constituency.unwrap();
        assert_eq!(c[0].constituency_name, "Birmingham, Ladywood");
        assert_eq!(c[0].avg_change_gbp, -612.4);
    }

    #[tokio::test]
    async fn empty_file_is_absent() {
        let f = fetcher(&[("inequality.csv", "")]);
        let data = load_datasets(&f, &sources()).await;
        assert_eq!(data.inequality, None);
    }

    #[tokio::test]
    async fn reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("budgetary.csv");
        fs::write(&p, "year,budgetary_impact_bn\n2029,2.8\n").unwrap();
        let fetcher = AssetFetcher::new(None).unwrap();
        let text = fetcher.fetch_text(p.to_str().unwrap()).await.unwrap();
        assert!(text.starts_with("year,"));
        let missing = fetcher
            .fetch_text(dir.path().join("nope.csv").to_str().unwrap())
            .await;
        assert!(matches!(missing, Err(DashError::OpeningFile { .. })));
    }

    /// Serves `files` over plain HTTP on a local port, one request per
    /// connection. Returns the base URL.
    fn serve(files: &[(&str, &str)]) -> String {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let files: HashMap<String, String> = files
            .iter()
            .map(|(k, v)| (format!("/data/{}", k), v.to_string()))
            .collect();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                let mut request: Vec<u8> = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match files.get(path) {
                    Some(body) => ("200 OK", body.as_str()),
                    None => ("404 Not Found", "not found"),
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        base
    }

    #[tokio::test]
    async fn fetches_over_http() {
        let base = serve(&[(
            "budgetary.csv",
            "year,budgetary_impact_bn\n2029,2.8\n2030,3.1\n",
        )]);
        // Bypass any proxy configured in the environment.
        let fetcher = AssetFetcher {
            client: Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
        };

        let text = fetcher
            .fetch_text(&format!("{}/data/budgetary.csv", base))
            .await
            .unwrap();
        assert!(text.starts_with("year,budgetary_impact_bn"));

        let missing = fetcher
            .fetch_text(&format!("{}/data/constituency.csv", base))
            .await;
        assert!(matches!(missing, Err(DashError::NotFound { .. })));

        let sources =
            DataSources::resolve(&format!("{}/data", base), &DataSourceSettings::default());
        let data = load_datasets(&fetcher, &sources).await;
        assert_eq!(data.budgetary.as_ref().map(|v| v.len()), Some(2));
        assert_eq!(data.loaded(), vec![Dataset::Budgetary]);
        assert_eq!(data.constituency, None);
    }
}
