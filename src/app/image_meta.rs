use crate::utils::error::Result;
use crate::utils::exif::{read_image_meta, ExifField};
use crate::utils::files::get_filenames;
use std::collections::HashMap;
use std::path::PathBuf;

/// Field mapping used when none is given: the catalog columns the Met
/// image download writes.
pub const DEFAULT_FIELDS: &str =
    "ImageDescription:title,Artist:artistDisplayName,DateTime:objectDate,ImageUniqueID:objectURL";

#[derive(Debug)]
pub struct ImageMeta {
    pub path: PathBuf,
    pub meta: Result<HashMap<String, String>>,
}

/// Reads the mapped EXIF fields of every file matching `pattern`. A file
/// whose fields cannot be read is reported, not fatal.
pub fn collect_image_meta(pattern: &str, fields: &[(ExifField, String)]) -> Result<Vec<ImageMeta>> {
    let files = get_filenames(pattern)?;
    tracing::info!("{} files found.", files.len());

    Ok(files
        .into_iter()
        .map(|path| {
            let meta = read_image_meta(&path, fields);
            if let Err(e) = &meta {
                tracing::warn!("{}: {}", path.display(), e);
            }
            ImageMeta { path, meta }
        })
        .collect())
}
