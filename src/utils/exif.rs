//! Reading and writing the textual EXIF tags used to carry catalog metadata
//! inside downloaded images.

use crate::utils::error::{EtlError, Result};
use crate::utils::files::string_to_ascii;
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExifField {
    ImageDescription,
    Artist,
    Copyright,
    DateTime,
    Software,
    ImageUniqueId,
}

impl ExifField {
    fn tag(self) -> exif::Tag {
        match self {
            ExifField::ImageDescription => exif::Tag::ImageDescription,
            ExifField::Artist => exif::Tag::Artist,
            ExifField::Copyright => exif::Tag::Copyright,
            ExifField::DateTime => exif::Tag::DateTime,
            ExifField::Software => exif::Tag::Software,
            ExifField::ImageUniqueId => exif::Tag::ImageUniqueID,
        }
    }

    fn to_exif_tag(self, value: String) -> ExifTag {
        match self {
            ExifField::ImageDescription => ExifTag::ImageDescription(value),
            ExifField::Artist => ExifTag::Artist(value),
            ExifField::Copyright => ExifTag::Copyright(value),
            ExifField::DateTime => ExifTag::ModifyDate(value),
            ExifField::Software => ExifTag::Software(value),
            ExifField::ImageUniqueId => ExifTag::ImageUniqueID(value),
        }
    }
}

impl FromStr for ExifField {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ImageDescription" => Ok(ExifField::ImageDescription),
            "Artist" => Ok(ExifField::Artist),
            "Copyright" => Ok(ExifField::Copyright),
            "DateTime" => Ok(ExifField::DateTime),
            "Software" => Ok(ExifField::Software),
            "ImageUniqueID" => Ok(ExifField::ImageUniqueId),
            other => Err(EtlError::InvalidConfigValueError {
                field: "meta".to_string(),
                value: other.to_string(),
                reason: "Unsupported EXIF field. Supported: ImageDescription, Artist, Copyright, DateTime, Software, ImageUniqueID".to_string(),
            }),
        }
    }
}

/// Parses `Field:column,Field:column` pairs such as
/// `ImageDescription:title,Artist:artistDisplayName`.
pub fn parse_field_mapping(mapping: &str) -> Result<Vec<(ExifField, String)>> {
    mapping
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (field, column) = pair.split_once(':').ok_or_else(|| {
                EtlError::InvalidConfigValueError {
                    field: "meta".to_string(),
                    value: pair.to_string(),
                    reason: "Expected Field:column".to_string(),
                }
            })?;
            Ok((field.parse()?, column.trim().to_string()))
        })
        .collect()
}

/// Reads each requested field into a map keyed by its output name.
/// A missing field is an error.
pub fn read_image_meta(
    path: impl AsRef<Path>,
    fields: &[(ExifField, String)],
) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| EtlError::metadata(format!("{}: {}", path.display(), e)))?;

    let mut values = HashMap::new();
    for (field, output_name) in fields {
        let value = exif
            .get_field(field.tag(), exif::In::PRIMARY)
            .and_then(|f| match &f.value {
                exif::Value::Ascii(parts) => parts
                    .first()
                    .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                EtlError::metadata(format!("{}: no {:?} field", path.display(), field))
            })?;
        values.insert(output_name.clone(), value);
    }
    Ok(values)
}

/// Writes the non-empty values into the image's EXIF block, folding them to
/// ASCII. Returns `Ok(false)` when the image data cannot carry EXIF.
pub fn write_meta_to_image(path: impl AsRef<Path>, values: &[(ExifField, String)]) -> Result<bool> {
    let path = path.as_ref();
    let mut metadata = Metadata::new_from_path(path).unwrap_or_else(|_| Metadata::new());

    let mut written = 0;
    for (field, value) in values {
        let value = string_to_ascii(value);
        if value.is_empty() {
            continue;
        }
        metadata.set_tag(field.to_exif_tag(value));
        written += 1;
    }

    if written == 0 {
        return Ok(true);
    }

    match metadata.write_to_file(path) {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::warn!("Error ({}) trying to write meta to {}", e, path.display());
            Ok(false)
        }
    }
}
