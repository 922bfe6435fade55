use crate::adapters::{HttpClient, ItemCache};
use crate::app::pipelines::images::{progress, save_image};
use crate::core::table::Table;
use crate::core::{Pipeline, Record, RunSummary, Storage};
use crate::domain::model::CachedItem;
use crate::sources::loc;
use crate::utils::error::Result;
use crate::utils::files::{empty_directory, make_directories};
use crate::utils::json_path::value_to_string;
use std::path::PathBuf;
use std::time::Duration;

pub const CACHE_FILE: &str = "item_cache.json";

#[derive(Debug, Clone)]
pub struct LocImagesOptions {
    /// Source CSV with `id` and `url` columns, relative to the storage root.
    pub source: String,
    pub query: String,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub clean: bool,
    /// Pause after a failed item before moving on.
    pub retry_delay: Duration,
}

impl Default for LocImagesOptions {
    fn default() -> Self {
        Self {
            source: "data/loc/posters-wpa-posters-2024-02-11.csv".to_string(),
            query: String::new(),
            cache_dir: PathBuf::from("cache/loc"),
            output_dir: PathBuf::from("output/loc-posters"),
            clean: false,
            retry_delay: Duration::from_secs(1),
        }
    }
}

enum Resolution {
    Found(String),
    Failed,
    NoImage,
}

/// Library of Congress items -> largest available image per item.
pub struct LocImagesPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) options: LocImagesOptions,
    pub(crate) client: HttpClient,
}

impl<S: Storage> LocImagesPipeline<S> {
    pub fn new(storage: S, options: LocImagesOptions) -> Self {
        Self {
            storage,
            options,
            client: HttpClient::new(),
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.options.cache_dir.join(CACHE_FILE)
    }

    /// Image URL for an item, from the cache or the item's JSON view. Only
    /// successful lookups are cached.
    async fn resolve(&self, cache: &mut ItemCache, id: &str, url: &str) -> Result<Resolution> {
        if let Some(item) = cache.get(id) {
            return Ok(Resolution::Found(item.resource_url.clone()));
        }

        let api_url = loc::api_url(url);
        let response = match self.client.json_request(&api_url).await {
            Ok(response) => response,
            Err(failure) => {
                tracing::warn!("{} error when requesting {}. Skipping.", failure, api_url);
                tracing::debug!("{}", failure.detail());
                return Ok(Resolution::Failed);
            }
        };

        let Some(files) = loc::resource_files(&response) else {
            tracing::warn!("No resources found for {}", api_url);
            return Ok(Resolution::NoImage);
        };
        let Some(resource_url) = loc::select_image_url(files) else {
            tracing::warn!("No image resources for {}", api_url);
            return Ok(Resolution::NoImage);
        };

        cache.insert(
            id,
            CachedItem {
                resource_url: resource_url.clone(),
            },
        );
        cache.save()?;
        Ok(Resolution::Found(resource_url))
    }

    async fn pause(&self) {
        if !self.options.retry_delay.is_zero() {
            tokio::time::sleep(self.options.retry_delay).await;
        }
    }
}

fn cell(record: &Record, column: &str) -> String {
    record.get(column).map(value_to_string).unwrap_or_default()
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for LocImagesPipeline<S> {
    async fn extract(&self) -> Result<Table> {
        make_directories(&[self.cache_path()])?;
        std::fs::create_dir_all(&self.options.output_dir)?;
        if self.options.clean {
            let removed = empty_directory(&self.options.cache_dir)?;
            tracing::info!("Cleared {} cached files", removed);
        }

        let data = self.storage.read_file(&self.options.source).await?;
        Table::from_csv_reader(data.as_slice())
    }

    async fn transform(&self, table: Table) -> Result<Table> {
        table.query(&self.options.query)
    }

    async fn load(&self, table: Table) -> Result<RunSummary> {
        let mut cache = ItemCache::load(self.cache_path())?;
        let mut summary = RunSummary::new(self.options.output_dir.display().to_string());
        let total = table.len();

        for (i, record) in table.records.iter().enumerate() {
            let id = cell(record, "id");
            let url = cell(record, "url");
            let path = self.options.output_dir.join(format!("loc-{}.jpg", id));
            if path.is_file() {
                summary.skipped += 1;
                continue;
            }

            let image_url = match self.resolve(&mut cache, &id, &url).await? {
                Resolution::Found(image_url) => image_url,
                Resolution::NoImage => {
                    summary.skipped += 1;
                    continue;
                }
                Resolution::Failed => {
                    summary.errors += 1;
                    self.pause().await;
                    continue;
                }
            };

            if let Err(e) = save_image(&self.client, &image_url, &path).await {
                tracing::warn!("{} with {} in {}", e, image_url, url);
            }
            if !path.is_file() {
                summary.errors += 1;
                self.pause().await;
                continue;
            }

            summary.processed += 1;
            tracing::info!(
                "{} of {} ({}%) Saved {}",
                i + 1,
                total,
                progress(i, total),
                path.display()
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::test_support::MockStorage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_existing_output_is_skipped() {
        let dir = TempDir::new().unwrap();
        let options = LocImagesOptions {
            source: "items.csv".to_string(),
            cache_dir: dir.path().join("cache"),
            output_dir: dir.path().join("out"),
            retry_delay: Duration::ZERO,
            ..Default::default()
        };
        let csv = "id,url\n2017001,http://127.0.0.1:1/item/2017001/\n";
        let pipeline = LocImagesPipeline::new(MockStorage::with_file("items.csv", csv.as_bytes()), options);

        let table = pipeline.extract().await.unwrap();
        std::fs::write(dir.path().join("out/loc-2017001.jpg"), b"jpeg").unwrap();
        let summary = pipeline.load(table).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn test_unreachable_api_counts_error_and_caches_nothing() {
        let dir = TempDir::new().unwrap();
        let options = LocImagesOptions {
            source: "items.csv".to_string(),
            cache_dir: dir.path().join("cache"),
            output_dir: dir.path().join("out"),
            retry_delay: Duration::ZERO,
            ..Default::default()
        };
        let csv = "id,url\n2017001,http://127.0.0.1:1/item/2017001/\n";
        let pipeline = LocImagesPipeline::new(MockStorage::with_file("items.csv", csv.as_bytes()), options);

        let table = pipeline.extract().await.unwrap();
        let summary = pipeline.load(table).await.unwrap();
        assert_eq!(summary.errors, 1);
        assert!(ItemCache::load(pipeline.cache_path()).unwrap().is_empty());
    }
}
