pub mod cli;

pub use cli::{
    ImageMetaArgs, ImagesArgs, LocImagesArgs, LogArgs, MetDataArgs, ModelArgs, RemoveBackgroundArgs,
    SegmentTextArgs, SiDataArgs, StatsArgs,
};
