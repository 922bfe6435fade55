pub mod adapters;
pub mod app;
#[cfg(feature = "cli")]
pub mod config;
pub mod core;
pub mod domain;
pub mod sources;
pub mod utils;
pub mod vision;

pub use adapters::{HttpClient, ItemCache, LocalStorage};
pub use app::pipelines::{
    ImagesPipeline, LocImagesPipeline, MetDataPipeline, RemoveBackground, SegmentText, SiDataPipeline,
    StatsPipeline,
};
pub use core::{etl::EtlEngine, table::Table};
pub use utils::error::{EtlError, Result};
