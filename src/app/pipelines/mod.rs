pub mod images;
pub mod loc_images;
pub mod met_data;
pub mod remove_background;
pub mod segment_text;
pub mod si_data;
pub mod stats;

pub use images::{ImagesOptions, ImagesPipeline};
pub use loc_images::{LocImagesOptions, LocImagesPipeline};
pub use met_data::{MetDataOptions, MetDataPipeline};
pub use remove_background::{RemoveBackground, RemoveBackgroundOptions};
pub use segment_text::{SegmentText, SegmentTextOptions};
pub use si_data::{SiDataOptions, SiDataPipeline};
pub use stats::{StatsOptions, StatsPipeline};
