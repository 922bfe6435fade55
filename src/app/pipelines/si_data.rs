use crate::adapters::HttpClient;
use crate::core::table::Table;
use crate::core::{Pipeline, RunSummary, Storage};
use crate::sources::smithsonian;
use crate::utils::error::{EtlError, Result};
use crate::utils::files::{empty_directory, make_directories, read_line_delimited_json, read_lines, url_basename};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_SOURCE: &str =
    "https://smithsonian-open-access.s3-us-west-2.amazonaws.com/metadata/edan/chndm/index.txt";
pub const DEFAULT_QUERY: &str = r#"access == "CC0""#;

#[derive(Debug, Clone)]
pub struct SiDataOptions {
    /// URL of the collection's `index.txt`, one data file URL per line.
    pub source: String,
    pub query: String,
    pub cache_dir: PathBuf,
    /// Output CSV, relative to the storage root.
    pub output: String,
    pub clean: bool,
}

impl Default for SiDataOptions {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            query: DEFAULT_QUERY.to_string(),
            cache_dir: PathBuf::from("cache/si-chndm"),
            output: "output/si-chndm-pd.csv".to_string(),
            clean: false,
        }
    }
}

/// Smithsonian Open Access dump -> filtered CSV.
pub struct SiDataPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) options: SiDataOptions,
    pub(crate) client: HttpClient,
    failures: AtomicUsize,
}

impl<S: Storage> SiDataPipeline<S> {
    pub fn new(storage: S, options: SiDataOptions) -> Self {
        Self {
            storage,
            options,
            client: HttpClient::new(),
            failures: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for SiDataPipeline<S> {
    async fn extract(&self) -> Result<Table> {
        let cache_dir = &self.options.cache_dir;
        make_directories(&[cache_dir.join("index.txt")])?;
        if self.options.clean {
            let removed = empty_directory(cache_dir)?;
            tracing::info!("Cleared {} cached files", removed);
        }

        let index_path = cache_dir.join("index.txt");
        if let Err(e) = self.client.download(&self.options.source, &index_path, false).await {
            tracing::debug!("Index download failed: {}", e);
        }
        if !index_path.is_file() {
            return Err(EtlError::processing(format!(
                "Could not download index file: {}",
                self.options.source
            )));
        }

        let mut records = Vec::new();
        for url in read_lines(&index_path)? {
            let data_path = cache_dir.join(url_basename(&url));
            if let Err(e) = self.client.download(&url, &data_path, false).await {
                tracing::debug!("Data file download failed: {}", e);
            }
            if !data_path.is_file() {
                tracing::warn!("Could not download data file: {}", url);
                self.failures.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let (documents, malformed) = read_line_delimited_json(&data_path)?;
            if malformed > 0 {
                tracing::warn!("{} malformed records in {}", malformed, data_path.display());
                self.failures.fetch_add(malformed, Ordering::Relaxed);
            }
            tracing::debug!("{} records in {}", documents.len(), data_path.display());
            records.extend(documents.iter().map(smithsonian::parse_si_json));
        }

        Ok(Table::new(smithsonian::columns(), records))
    }

    async fn transform(&self, table: Table) -> Result<Table> {
        table.query(&self.options.query)
    }

    async fn load(&self, table: Table) -> Result<RunSummary> {
        let bytes = table.to_csv_bytes()?;
        self.storage.write_file(&self.options.output, &bytes).await?;

        let location = self.storage.location(&self.options.output);
        tracing::info!("Wrote items to {}", location);

        let mut summary = RunSummary::new(location);
        summary.processed = table.len();
        summary.errors = self.failures.load(Ordering::Relaxed);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::test_support::MockStorage;
    use crate::domain::model::Record;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(id: &str, access: &str) -> Record {
        let mut record = Record::default();
        record.insert("id", id);
        record.insert("access", access);
        record
    }

    #[tokio::test]
    async fn test_transform_applies_default_query() {
        let pipeline = SiDataPipeline::new(MockStorage::default(), SiDataOptions::default());
        let table = Table::new(
            vec!["id".to_string(), "access".to_string()],
            vec![record("a", "CC0"), record("b", "Usage conditions apply")],
        );

        let filtered = pipeline.transform(table).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records[0].get("id"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn test_load_writes_csv_through_storage() {
        let options = SiDataOptions {
            output: "si.csv".to_string(),
            ..Default::default()
        };
        let pipeline = SiDataPipeline::new(MockStorage::default(), options);
        let table = Table::new(
            vec!["id".to_string(), "access".to_string()],
            vec![record("a", "CC0")],
        );

        let summary = pipeline.load(table).await.unwrap();
        assert_eq!(summary.output, "mock://si.csv");
        assert_eq!(summary.processed, 1);

        let written = pipeline.storage.read_file("si.csv").await.unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), "id,access\na,CC0\n");
    }

    #[tokio::test]
    async fn test_corrupt_cached_file_is_counted_not_fatal() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(
            cache.join("index.txt"),
            "http://127.0.0.1:1/good.txt\nhttp://127.0.0.1:1/bad.txt\n",
        )
        .unwrap();
        let good = json!({
            "title": "Side Chair",
            "content": {"descriptiveNonRepeating": {
                "record_ID": "chndm_1",
                "metadata_usage": {"access": "CC0"}
            }}
        });
        std::fs::write(cache.join("good.txt"), format!("{}\n", good)).unwrap();
        std::fs::write(cache.join("bad.txt"), "{\"title\": \"trunc\n").unwrap();

        let options = SiDataOptions {
            source: "http://127.0.0.1:1/index.txt".to_string(),
            cache_dir: cache,
            output: "si.csv".to_string(),
            ..Default::default()
        };
        let pipeline = SiDataPipeline::new(MockStorage::default(), options);

        let table = pipeline.extract().await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].get("id"), Some(&json!("chndm_1")));

        let summary = pipeline.load(table).await.unwrap();
        assert_eq!(summary.errors, 1);
        assert!(pipeline.storage.text("si.csv").unwrap().contains("chndm_1"));
    }

    #[tokio::test]
    async fn test_missing_index_aborts() {
        let dir = TempDir::new().unwrap();
        let options = SiDataOptions {
            source: "http://127.0.0.1:1/index.txt".to_string(),
            cache_dir: dir.path().join("cache"),
            ..Default::default()
        };
        let pipeline = SiDataPipeline::new(MockStorage::default(), options);
        let err = pipeline.extract().await.unwrap_err();
        assert!(err.to_string().contains("Could not download index file"));
    }
}
