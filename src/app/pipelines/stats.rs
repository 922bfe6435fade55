use crate::core::table::Table;
use crate::core::{Pipeline, RunSummary, Storage};
use crate::utils::error::Result;
use crate::utils::files::string_to_filename;

#[derive(Debug, Clone)]
pub struct StatsOptions {
    /// Source CSV, relative to the storage root.
    pub source: String,
    pub query: String,
    pub columns: Vec<String>,
    /// Output pattern; `{id}` becomes the column name made filename-safe.
    pub output: String,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            source: "cache/met-open-access-objects/MetObjects.csv".to_string(),
            query: String::new(),
            columns: vec!["Object Name".to_string(), "Medium".to_string()],
            output: "output/met_{id}.csv".to_string(),
        }
    }
}

/// Value counts for a list of columns of any CSV.
pub struct StatsPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) options: StatsOptions,
}

impl<S: Storage> StatsPipeline<S> {
    pub fn new(storage: S, options: StatsOptions) -> Self {
        Self { storage, options }
    }

    pub fn output_for(&self, column: &str) -> String {
        self.options.output.replace("{id}", &string_to_filename(column))
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for StatsPipeline<S> {
    async fn extract(&self) -> Result<Table> {
        let data = self.storage.read_file(&self.options.source).await?;
        Table::from_csv_reader(data.as_slice())
    }

    async fn transform(&self, table: Table) -> Result<Table> {
        table.query(&self.options.query)
    }

    async fn load(&self, table: Table) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.storage.location(&self.options.output));

        for column in &self.options.columns {
            if !table.has_column(column) {
                tracing::warn!("Could not find column {} in data", column);
                summary.skipped += 1;
                continue;
            }
            let filename = self.output_for(column);
            self.storage
                .write_file(&filename, &table.value_counts_csv(column)?)
                .await?;
            tracing::info!("Created {}", self.storage.location(&filename));
            summary.processed += 1;
        }

        tracing::info!("Done.");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::test_support::MockStorage;
    use crate::core::etl::EtlEngine;

    const CSV: &str = "id,Object Name,Medium,Culture\n\
1,Vase,Porcelain,Chinese\n\
2,Vase,Glass,\n\
3,Print,Woodblock,Japanese\n";

    #[tokio::test]
    async fn test_counts_each_existing_column() {
        let options = StatsOptions {
            source: "data.csv".to_string(),
            columns: vec!["Object Name".to_string(), "Artist".to_string(), "Culture".to_string()],
            output: "out/met_{id}.csv".to_string(),
            ..Default::default()
        };
        let engine = EtlEngine::new(StatsPipeline::new(MockStorage::with_file("data.csv", CSV.as_bytes()), options));

        let summary = engine.run().await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);

        let storage = &engine.pipeline().storage;
        assert_eq!(
            storage.text("out/met_object_name.csv").unwrap(),
            "Object Name,count\nVase,2\nPrint,1\n"
        );
        assert_eq!(
            storage.text("out/met_culture.csv").unwrap(),
            "Culture,count\nChinese,1\nJapanese,1\n"
        );
        assert!(storage.text("out/met_artist.csv").is_none());
    }

    #[tokio::test]
    async fn test_query_applies_before_counting() {
        let options = StatsOptions {
            source: "data.csv".to_string(),
            query: "Medium != 'Glass'".to_string(),
            columns: vec!["Object Name".to_string()],
            output: "{id}.csv".to_string(),
        };
        let engine = EtlEngine::new(StatsPipeline::new(MockStorage::with_file("data.csv", CSV.as_bytes()), options));
        engine.run().await.unwrap();
        assert_eq!(
            engine.pipeline().storage.text("object_name.csv").unwrap(),
            "Object Name,count\nPrint,1\nVase,1\n"
        );
    }
}
