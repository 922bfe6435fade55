use crate::adapters::{DownloadOutcome, HttpClient};
use crate::core::table::{format_template, Table};
use crate::core::{Pipeline, Record, RunSummary, Storage};
use crate::utils::error::Result;
use crate::utils::exif::{write_meta_to_image, ExifField};
use crate::utils::files::{extension_of, url_extension};
use crate::utils::json_path::value_to_string;
use crate::vision::imaging::{decode_image, save_converted};
use std::path::Path;

/// Saves the image at `url` to `path`. When both sides share an extension
/// the bytes are stored as-is, otherwise the image is decoded and
/// re-encoded in the format `path` asks for.
pub async fn save_image(client: &HttpClient, url: &str, path: &Path) -> Result<()> {
    if url_extension(url) == extension_of(path) {
        if let DownloadOutcome::Downloaded { bytes } = client.download(url, path, false).await? {
            tracing::debug!("Saved {} bytes to {}", bytes, path.display());
        }
        return Ok(());
    }

    let bytes = client.download_bytes(url).await?;
    let image = decode_image(&bytes)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    save_converted(image, path)
}

pub(crate) fn progress(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (10000.0 * index as f64 / total as f64).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct ImagesOptions {
    /// Source CSV, relative to the storage root.
    pub source: String,
    /// Column holding the image URL.
    pub image_column: String,
    pub query: String,
    /// Output path template, e.g. `output/si-{id}.jpg`.
    pub output: String,
    /// Report counts without downloading anything.
    pub probe: bool,
    /// EXIF fields filled from row columns after each download.
    pub meta: Vec<(ExifField, String)>,
}

impl Default for ImagesOptions {
    fn default() -> Self {
        Self {
            source: "output/si-chndm-pd.csv".to_string(),
            image_column: "image".to_string(),
            query: String::new(),
            output: "output/si-cultery/si-{id}.jpg".to_string(),
            probe: false,
            meta: Vec::new(),
        }
    }
}

/// Downloads the image of every row of a catalog CSV.
pub struct ImagesPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) options: ImagesOptions,
    pub(crate) client: HttpClient,
}

impl<S: Storage> ImagesPipeline<S> {
    pub fn new(storage: S, options: ImagesOptions) -> Self {
        Self {
            storage,
            options,
            client: HttpClient::new(),
        }
    }

    fn write_meta(&self, path: &Path, record: &Record) {
        let values: Vec<(ExifField, String)> = self
            .options
            .meta
            .iter()
            .map(|(field, column)| {
                let value = record.get(column).map(value_to_string).unwrap_or_default();
                (*field, value)
            })
            .collect();

        match write_meta_to_image(path, &values) {
            Ok(true) => tracing::debug!("Wrote metadata to {}", path.display()),
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not write metadata to {}: {}", path.display(), e),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for ImagesPipeline<S> {
    async fn extract(&self) -> Result<Table> {
        let data = self.storage.read_file(&self.options.source).await?;
        Table::from_csv_reader(data.as_slice())
    }

    async fn transform(&self, table: Table) -> Result<Table> {
        let table = table
            .query(&self.options.query)?
            .filter_not_null(&self.options.image_column)?;
        tracing::info!("{} items after filtering out items with no image", table.len());
        Ok(table)
    }

    async fn load(&self, table: Table) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.options.output.clone());
        let total = table.len();

        if self.options.probe {
            tracing::info!("Probe mode: {} images would be downloaded", total);
            summary.skipped = total;
            return Ok(summary);
        }

        for (i, record) in table.records.iter().enumerate() {
            let filename = format_template(&self.options.output, record)?;
            let path = Path::new(&filename);
            if path.is_file() {
                summary.skipped += 1;
                continue;
            }

            let url = record
                .get(&self.options.image_column)
                .map(value_to_string)
                .unwrap_or_default();
            if let Err(e) = save_image(&self.client, &url, path).await {
                tracing::warn!("Invalid image: {} with {}", e, url);
            }

            // No file on disk means the item failed, whatever the cause.
            if !path.is_file() {
                summary.errors += 1;
                continue;
            }

            if !self.options.meta.is_empty() {
                self.write_meta(path, record);
            }

            summary.processed += 1;
            tracing::info!(
                "{} of {} ({}%) Saved {}",
                i + 1,
                total,
                progress(i, total),
                filename
            );
        }

        Ok(summary)
    }
}
