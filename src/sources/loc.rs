//! Library of Congress item JSON: locating the best image file.

use crate::json_path;
use crate::utils::json_path::lookup;
use serde_json::Value;
use std::cmp::Ordering;

const IMAGE_MIMETYPES: &[&str] = &["image/jpg", "image/jpeg", "image/tiff"];

/// The JSON view of a loc.gov item page (`fo=json`).
pub fn api_url(url: &str) -> String {
    if url.contains('?') {
        format!("{}&fo=json", url)
    } else {
        format!("{}?fo=json", url)
    }
}

/// File entries of an item response. A page within a multi-page document
/// lists them under `page`; a whole item under `resources[0].files[0]`.
pub fn resource_files(response: &Value) -> Option<&Vec<Value>> {
    let files = match response.get("page") {
        Some(page) => page,
        None => lookup(response, json_path!["resources", 0, "files", 0])?,
    };
    files.as_array().filter(|files| !files.is_empty())
}

/// URL of the largest image file by `size`, or by `height` when no image
/// file reports a size.
pub fn select_image_url(files: &[Value]) -> Option<String> {
    largest_by(files, "size")
        .or_else(|| largest_by(files, "height"))
        .and_then(|file| file.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn largest_by<'a>(files: &'a [Value], key: &str) -> Option<&'a Value> {
    files
        .iter()
        .filter(|file| {
            file.get("mimetype")
                .and_then(Value::as_str)
                .is_some_and(|m| IMAGE_MIMETYPES.contains(&m))
                && file.get("url").is_some()
        })
        .filter_map(|file| Some((file, file.get(key)?.as_f64()?)))
        .min_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
        .map(|(file, _)| file)
}
