//! Command-line arguments of each binary, validated and turned into the
//! options struct its pipeline takes.

use crate::app::image_meta::DEFAULT_FIELDS;
use crate::app::pipelines::{
    met_data, si_data, ImagesOptions, LocImagesOptions, MetDataOptions,
    RemoveBackgroundOptions, SegmentTextOptions, SiDataOptions, StatsOptions,
};
use crate::core::query::Query;
use crate::utils::error::{EtlError, Result};
use crate::utils::exif::{parse_field_mapping, ExifField};
use crate::utils::logger;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_template, validate_url, Validate,
};
use clap::{Args, Parser};
use std::path::PathBuf;
use std::time::Duration;

const MIN_DIMENSION: u32 = 64;
const MAX_DIMENSION: u32 = 16384;

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl LogArgs {
    pub fn init(&self) {
        logger::init(self.verbose, self.log_json);
    }
}

fn validate_query(query: &str) -> Result<()> {
    if !query.trim().is_empty() {
        Query::parse(query)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Parser)]
#[command(name = "get_si_data")]
#[command(about = "Download Smithsonian Open Access metadata into a filtered CSV")]
pub struct SiDataArgs {
    /// URL to the collection's index.txt
    #[arg(long, default_value = si_data::DEFAULT_SOURCE)]
    pub src: String,

    /// A query string to filter by, e.g. `access == "CC0"`
    #[arg(long, default_value = si_data::DEFAULT_QUERY)]
    pub query: String,

    #[arg(long, default_value = "cache/si-chndm/")]
    pub cache_dir: PathBuf,

    /// Output data file
    #[arg(long, default_value = "output/si-chndm-pd.csv")]
    pub out: String,

    /// Clear the cache before processing
    #[arg(long)]
    pub clean: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for SiDataArgs {
    fn validate(&self) -> Result<()> {
        validate_url("src", &self.src)?;
        validate_query(&self.query)?;
        validate_path("cache_dir", &self.cache_dir.to_string_lossy())?;
        validate_path("out", &self.out)
    }
}

impl SiDataArgs {
    pub fn into_options(self) -> SiDataOptions {
        SiDataOptions {
            source: self.src,
            query: self.query,
            cache_dir: self.cache_dir,
            output: self.out,
            clean: self.clean,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "get_met_data")]
#[command(about = "Download the Met Open Access CSV, keep public domain rows, and count object types and mediums")]
pub struct MetDataArgs {
    /// URL to MetObjects.csv
    #[arg(long, default_value = met_data::DEFAULT_SOURCE)]
    pub src: String,

    #[arg(long, default_value = "")]
    pub query: String,

    #[arg(long, default_value = "cache/met-open-access-objects/")]
    pub cache_dir: PathBuf,

    /// Output data file for the filtered rows
    #[arg(long, default_value = "output/met-open-access-objects.csv")]
    pub out: String,

    /// Also write met_object_types.csv and met_mediums.csv to this directory
    #[arg(long)]
    pub stats_dir: Option<String>,

    /// Clear the cache before processing
    #[arg(long)]
    pub clean: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for MetDataArgs {
    fn validate(&self) -> Result<()> {
        validate_url("src", &self.src)?;
        validate_query(&self.query)?;
        validate_path("cache_dir", &self.cache_dir.to_string_lossy())?;
        validate_path("out", &self.out)?;
        if let Some(dir) = &self.stats_dir {
            validate_path("stats_dir", dir)?;
        }
        Ok(())
    }
}

impl MetDataArgs {
    pub fn into_options(self) -> MetDataOptions {
        MetDataOptions {
            source: self.src,
            query: self.query,
            cache_dir: self.cache_dir,
            output: Some(self.out),
            stats_dir: self.stats_dir,
            clean: self.clean,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "get_stats")]
#[command(about = "Write value counts for columns of a CSV data file")]
pub struct StatsArgs {
    /// Path to the CSV data file
    #[arg(long, default_value = "cache/met-open-access-objects/MetObjects.csv")]
    pub src: String,

    #[arg(long, default_value = "")]
    pub query: String,

    /// Comma separated list of column names to count
    #[arg(long, value_delimiter = ',', default_value = "Object Name,Medium")]
    pub cols: Vec<String>,

    /// Output file pattern; {id} is replaced by the column name
    #[arg(long, default_value = "output/met_{id}.csv")]
    pub out: String,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for StatsArgs {
    fn validate(&self) -> Result<()> {
        validate_path("src", &self.src)?;
        validate_query(&self.query)?;
        if self.cols.iter().all(|c| c.trim().is_empty()) {
            return Err(EtlError::MissingConfigError {
                field: "cols".to_string(),
            });
        }
        validate_template("out", &self.out)
    }
}

impl StatsArgs {
    pub fn into_options(self) -> StatsOptions {
        StatsOptions {
            source: self.src,
            query: self.query,
            columns: self
                .cols
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            output: self.out,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "get_images")]
#[command(about = "Download the image of each row of a catalog CSV")]
pub struct ImagesArgs {
    /// Path to the CSV data file
    #[arg(long, default_value = "output/si-chndm-pd.csv")]
    pub src: String,

    /// The column that contains the image URL
    #[arg(long, default_value = "image")]
    pub image: String,

    #[arg(long, default_value = "")]
    pub query: String,

    /// Output path template filled from row columns
    #[arg(long, default_value = "output/si-cultery/si-{id}.jpg")]
    pub out: String,

    /// Only report counts; do not download
    #[arg(long)]
    pub probe: bool,

    /// EXIF fields to fill from columns, e.g. ImageDescription:title,Artist:artistDisplayName
    #[arg(long)]
    pub meta: Option<String>,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for ImagesArgs {
    fn validate(&self) -> Result<()> {
        validate_path("src", &self.src)?;
        validate_non_empty_string("image", &self.image)?;
        validate_query(&self.query)?;
        validate_template("out", &self.out)?;
        if let Some(meta) = &self.meta {
            parse_field_mapping(meta)?;
        }
        Ok(())
    }
}

impl ImagesArgs {
    pub fn into_options(self) -> Result<ImagesOptions> {
        let meta = match &self.meta {
            Some(meta) => parse_field_mapping(meta)?,
            None => Vec::new(),
        };
        Ok(ImagesOptions {
            source: self.src,
            image_column: self.image,
            query: self.query,
            output: self.out,
            probe: self.probe,
            meta,
        })
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "get_loc_images")]
#[command(about = "Download high resolution images from the Library of Congress")]
pub struct LocImagesArgs {
    /// Path to the collection CSV (needs `id` and `url` columns)
    #[arg(long, default_value = "data/loc/posters-wpa-posters-2024-02-11.csv")]
    pub src: String,

    #[arg(long, default_value = "")]
    pub query: String,

    #[arg(long, default_value = "cache/loc/")]
    pub cache_dir: PathBuf,

    /// Output directory
    #[arg(long, default_value = "output/loc-posters/")]
    pub out: PathBuf,

    /// Clear the cache before processing
    #[arg(long)]
    pub clean: bool,

    /// Seconds to wait after a failed item
    #[arg(long, default_value_t = 1)]
    pub retry_delay: u64,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for LocImagesArgs {
    fn validate(&self) -> Result<()> {
        validate_path("src", &self.src)?;
        validate_query(&self.query)?;
        validate_path("cache_dir", &self.cache_dir.to_string_lossy())?;
        validate_path("out", &self.out.to_string_lossy())?;
        validate_range("retry_delay", self.retry_delay, 0, 60)
    }
}

impl LocImagesArgs {
    pub fn into_options(self) -> LocImagesOptions {
        LocImagesOptions {
            source: self.src,
            query: self.query,
            cache_dir: self.cache_dir,
            output_dir: self.out,
            clean: self.clean,
            retry_delay: Duration::from_secs(self.retry_delay),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// SAM image encoder (ONNX)
    #[arg(long, default_value = "models/sam_vit_h_encoder.onnx")]
    pub encoder: PathBuf,

    /// SAM prompt decoder (ONNX)
    #[arg(long, default_value = "models/sam_vit_h_decoder.onnx")]
    pub decoder: PathBuf,
}

impl Validate for ModelArgs {
    fn validate(&self) -> Result<()> {
        for (field, path) in [("encoder", &self.encoder), ("decoder", &self.decoder)] {
            validate_path(field, &path.to_string_lossy())?;
            if !path.is_file() {
                return Err(EtlError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: path.display().to_string(),
                    reason: "Model file not found".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "remove_background")]
#[command(about = "Cut the main object out of each image onto a transparent background")]
pub struct RemoveBackgroundArgs {
    /// Glob of input images
    #[arg(long = "in", default_value = "sample/figures/*.jpg")]
    pub input: String,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Output directory
    #[arg(long, default_value = "output/figure-segments/")]
    pub out: PathBuf,

    /// Max dimension of a source image; larger images are resized first
    #[arg(long, default_value_t = 4096)]
    pub max_dimension: u32,

    /// Clear the output directory before processing
    #[arg(long)]
    pub clean: bool,

    /// List the files that would be processed and stop
    #[arg(long)]
    pub debug: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for RemoveBackgroundArgs {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("in", &self.input)?;
        validate_path("out", &self.out.to_string_lossy())?;
        validate_range("max_dimension", self.max_dimension, MIN_DIMENSION, MAX_DIMENSION)?;
        self.model.validate()
    }
}

impl RemoveBackgroundArgs {
    pub fn into_options(self) -> RemoveBackgroundOptions {
        RemoveBackgroundOptions {
            input: self.input,
            output_dir: self.out,
            max_dimension: self.max_dimension,
            clean: self.clean,
            debug: self.debug,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "segment_image_text")]
#[command(about = "Cut each recognised letter and digit out of poster images")]
pub struct SegmentTextArgs {
    /// Glob of input images
    #[arg(long = "in", default_value = "sample/posters/*.jpg")]
    pub input: String,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Max dimension of a source image; larger images are resized first
    #[arg(long, default_value_t = 4000)]
    pub max_dimension: u32,

    /// Output directory
    #[arg(long, default_value = "output/sample-text-segments/")]
    pub out: PathBuf,

    /// tesseract executable
    #[arg(long, default_value = "tesseract")]
    pub tesseract: PathBuf,

    /// OCR language
    #[arg(long, default_value = "eng")]
    pub lang: String,

    /// Clear the output directory before processing
    #[arg(long)]
    pub clean: bool,

    /// Log the character boxes of the first image and stop
    #[arg(long)]
    pub debug: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for SegmentTextArgs {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("in", &self.input)?;
        validate_path("out", &self.out.to_string_lossy())?;
        validate_range("max_dimension", self.max_dimension, MIN_DIMENSION, MAX_DIMENSION)?;
        validate_non_empty_string("lang", &self.lang)?;
        self.model.validate()
    }
}

impl SegmentTextArgs {
    pub fn into_options(self) -> SegmentTextOptions {
        SegmentTextOptions {
            input: self.input,
            output_dir: self.out,
            max_dimension: self.max_dimension,
            clean: self.clean,
            debug: self.debug,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "image_meta")]
#[command(about = "Print EXIF metadata of downloaded images")]
pub struct ImageMetaArgs {
    /// Glob of images to read
    #[arg(long = "in", default_value = "output/met-sculptures/*.jpg")]
    pub input: String,

    /// EXIF fields to read and the names to print them under
    #[arg(long, default_value = DEFAULT_FIELDS)]
    pub fields: String,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Validate for ImageMetaArgs {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("in", &self.input)?;
        parse_field_mapping(&self.fields).map(|_| ())
    }
}

impl ImageMetaArgs {
    pub fn field_mapping(&self) -> Result<Vec<(ExifField, String)>> {
        parse_field_mapping(&self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_si_data_defaults() {
        let args = SiDataArgs::parse_from(["get_si_data"]);
        assert!(args.validate().is_ok());
        let options = args.into_options();
        assert_eq!(options.query, r#"access == "CC0""#);
        assert_eq!(options.output, "output/si-chndm-pd.csv");
    }

    #[test]
    fn test_invalid_query_is_rejected_up_front() {
        let args = SiDataArgs::parse_from(["get_si_data", "--query", "access =="]);
        assert!(matches!(args.validate(), Err(EtlError::QueryError { .. })));
    }

    #[test]
    fn test_stats_columns_are_split_and_trimmed() {
        let args = StatsArgs::parse_from(["get_stats", "--cols", "Object Name, Medium,,Culture"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.into_options().columns, vec!["Object Name", "Medium", "Culture"]);
    }

    #[test]
    fn test_images_meta_mapping() {
        let args = ImagesArgs::parse_from([
            "get_images",
            "--out",
            "out/met-{Object ID}.jpg",
            "--meta",
            "ImageDescription:Title,Artist:Artist Display Name",
        ]);
        assert!(args.validate().is_ok());
        let options = args.into_options().unwrap();
        assert_eq!(options.meta.len(), 2);
        assert_eq!(options.meta[1], (ExifField::Artist, "Artist Display Name".to_string()));

        let bad = ImagesArgs::parse_from(["get_images", "--out", "out/{}.jpg"]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_max_dimension_range_and_missing_models() {
        let args = RemoveBackgroundArgs::parse_from(["remove_background", "--max-dimension", "10"]);
        assert!(args.validate().is_err());

        let args = RemoveBackgroundArgs::parse_from([
            "remove_background",
            "--encoder",
            "/nonexistent/encoder.onnx",
        ]);
        assert!(args.validate().is_err());
        assert_eq!(args.into_options().max_dimension, 4096);
    }

    #[test]
    fn test_default_image_meta_fields() {
        let args = ImageMetaArgs::parse_from(["image_meta"]);
        assert_eq!(args.field_mapping().unwrap().len(), 4);
    }

    #[test]
    fn test_loc_retry_delay() {
        let args = LocImagesArgs::parse_from(["get_loc_images", "--retry-delay", "0"]);
        assert!(args.validate().is_ok());
        assert!(args.into_options().retry_delay.is_zero());
    }
}
