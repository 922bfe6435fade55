use crate::adapters::HttpClient;
use crate::core::table::Table;
use crate::core::{Pipeline, RunSummary, Storage};
use crate::utils::error::{EtlError, Result};
use crate::utils::files::{empty_directory, make_directories, url_basename};
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE: &str = "https://github.com/metmuseum/openaccess/raw/master/MetObjects.csv";
pub const PUBLIC_DOMAIN_COLUMN: &str = "Is Public Domain";

/// Value-count files written to the stats directory.
pub const STATS_FILES: &[(&str, &str)] = &[
    ("Object Name", "met_object_types.csv"),
    ("Medium", "met_mediums.csv"),
];

#[derive(Debug, Clone)]
pub struct MetDataOptions {
    pub source: String,
    pub query: String,
    pub cache_dir: PathBuf,
    /// Filtered data CSV, relative to the storage root.
    pub output: Option<String>,
    /// Directory for the object type and medium counts.
    pub stats_dir: Option<String>,
    pub clean: bool,
}

impl Default for MetDataOptions {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            query: String::new(),
            cache_dir: PathBuf::from("cache/met-open-access-objects"),
            output: Some("output/met-open-access-objects.csv".to_string()),
            stats_dir: None,
            clean: false,
        }
    }
}

/// Met Open Access `MetObjects.csv` -> public domain subset and its stats.
pub struct MetDataPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) options: MetDataOptions,
    pub(crate) client: HttpClient,
}

impl<S: Storage> MetDataPipeline<S> {
    pub fn new(storage: S, options: MetDataOptions) -> Self {
        Self {
            storage,
            options,
            client: HttpClient::new(),
        }
    }

    fn source_path(&self) -> PathBuf {
        self.options.cache_dir.join(url_basename(&self.options.source))
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for MetDataPipeline<S> {
    async fn extract(&self) -> Result<Table> {
        let source_path = self.source_path();
        make_directories(&[&source_path])?;
        if self.options.clean {
            let removed = empty_directory(&self.options.cache_dir)?;
            tracing::info!("Cleared {} cached files", removed);
        }

        if let Err(e) = self.client.download(&self.options.source, &source_path, false).await {
            return Err(EtlError::processing(format!(
                "Could not download {}: {}",
                self.options.source, e
            )));
        }

        Table::read_csv(&source_path)
    }

    async fn transform(&self, table: Table) -> Result<Table> {
        let table = table.filter_truthy(PUBLIC_DOMAIN_COLUMN)?;
        tracing::info!("{} public domain items found.", table.len());
        table.query(&self.options.query)
    }

    async fn load(&self, table: Table) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.options.output.clone().unwrap_or_default());
        summary.processed = table.len();

        if let Some(output) = &self.options.output {
            self.storage.write_file(output, &table.to_csv_bytes()?).await?;
            summary.output = self.storage.location(output);
            tracing::info!("Wrote items to {}", summary.output);
        }

        if let Some(stats_dir) = &self.options.stats_dir {
            for (column, filename) in STATS_FILES {
                let path = Path::new(stats_dir).join(filename).to_string_lossy().into_owned();
                if !table.has_column(column) {
                    tracing::warn!("Could not find column {} in data", column);
                    summary.skipped += 1;
                    continue;
                }
                self.storage.write_file(&path, &table.value_counts_csv(column)?).await?;
                tracing::info!("Created {}", self.storage.location(&path));
            }
        }

        tracing::info!("Done.");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::test_support::MockStorage;

    const MET_CSV: &str = "Object ID,Is Public Domain,Object Name,Medium,Department\n\
1,True,Vase,Porcelain,Asian Art\n\
2,False,Bowl,Porcelain,Asian Art\n\
3,True,Vase,Glass,European Sculpture and Decorative Arts\n\
4,True,Figure,Bronze,Asian Art\n";

    fn table() -> Table {
        Table::from_csv_reader(MET_CSV.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_transform_keeps_public_domain_then_queries() {
        let options = MetDataOptions {
            query: "Department == 'Asian Art'".to_string(),
            ..Default::default()
        };
        let pipeline = MetDataPipeline::new(MockStorage::default(), options);
        let filtered = pipeline.transform(table()).await.unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[tokio::test]
    async fn test_load_writes_data_and_stats() {
        let options = MetDataOptions {
            output: Some("met.csv".to_string()),
            stats_dir: Some("stats".to_string()),
            ..Default::default()
        };
        let pipeline = MetDataPipeline::new(MockStorage::default(), options);
        let table = pipeline.transform(table()).await.unwrap();
        let summary = pipeline.load(table).await.unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.output, "mock://met.csv");
        assert_eq!(
            pipeline.storage.text("stats/met_object_types.csv").unwrap(),
            "Object Name,count\nVase,2\nFigure,1\n"
        );
        assert_eq!(
            pipeline.storage.text("stats/met_mediums.csv").unwrap(),
            "Medium,count\nBronze,1\nGlass,1\nPorcelain,1\n"
        );
    }

    #[tokio::test]
    async fn test_missing_public_domain_column_is_an_error() {
        let pipeline = MetDataPipeline::new(MockStorage::default(), MetDataOptions::default());
        let table = Table::from_csv_reader("Object ID,Medium\n1,Oil\n".as_bytes()).unwrap();
        assert!(pipeline.transform(table).await.is_err());
    }
}
