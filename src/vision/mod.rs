pub mod geometry;
pub mod imaging;
pub mod ocr;
#[cfg(feature = "sam")]
pub mod sam;
pub mod segmenter;

pub use geometry::{bbox_contains, get_largest_mask_segment, BBox, Mask, Segment};
pub use ocr::{CharBox, Tesseract, TextLocator};
#[cfg(feature = "sam")]
pub use sam::SamSegmenter;
pub use segmenter::Segmenter;
