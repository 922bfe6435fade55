pub mod error;
pub mod exif;
pub mod files;
pub mod json_path;
pub mod logger;
pub mod validation;
