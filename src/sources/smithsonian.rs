//! Flattening of Smithsonian Open Access (EDAN) records.

use crate::domain::model::Record;
use crate::json_path;
use crate::utils::json_path::{get_nested_value, get_where, lookup};
use serde_json::{json, Value};
use std::cmp::Ordering;

/// Column order of the flattened CSV.
pub const COLUMNS: &[&str] = &[
    "id",
    "title",
    "unit_code",
    "record_link",
    "access",
    "data_source",
    "date",
    "name",
    "object_type",
    "place",
    "group",
    "description",
    "medium",
    "dimensions",
    "image",
    "image_width",
    "image_height",
];

pub fn columns() -> Vec<String> {
    COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Converts one line of an EDAN metadata dump into a flat row.
pub fn parse_si_json(doc: &Value) -> Record {
    let empty = json!({});
    let descriptive = lookup(doc, json_path!["content", "descriptiveNonRepeating"]).unwrap_or(&empty);
    let structured = lookup(doc, json_path!["content", "indexedStructured"]).unwrap_or(&empty);
    let freetext = lookup(doc, json_path!["content", "freetext"]).unwrap_or(&empty);
    let blank = || json!("");

    let mut row = Record::default();
    row.insert("id", get_nested_value(descriptive, json_path!["record_ID"], blank()));
    row.insert("title", get_nested_value(doc, json_path!["title"], json!("Untitled")));
    row.insert("unit_code", get_nested_value(doc, json_path!["unitCode"], blank()));
    row.insert("record_link", get_nested_value(descriptive, json_path!["record_link"], blank()));
    row.insert(
        "access",
        get_nested_value(descriptive, json_path!["metadata_usage", "access"], blank()),
    );
    row.insert("data_source", get_nested_value(descriptive, json_path!["data_source"], blank()));
    for (column, key) in [
        ("date", "date"),
        ("name", "name"),
        ("object_type", "object_type"),
        ("place", "place"),
    ] {
        row.insert(column, get_nested_value(structured, json_path![key, 0], blank()));
    }

    let group = lookup(freetext, json_path!["setName"])
        .and_then(Value::as_array)
        .and_then(|sets| sets.last())
        .and_then(|set| set.get("content"))
        .cloned()
        .unwrap_or_else(blank);
    row.insert("group", group);

    let notes = get_nested_value(freetext, json_path!["notes"], json!([]));
    row.insert("description", get_where(&notes, "content", ("label", "Description"), blank()));

    let physical = get_nested_value(freetext, json_path!["physicalDescription"], json!([]));
    row.insert("medium", get_where(&physical, "content", ("label", "Medium"), blank()));
    row.insert("dimensions", get_where(&physical, "content", ("label", "Dimensions"), blank()));

    match largest_resource(descriptive) {
        Some(resource) => {
            row.insert("image", resource.get("url").cloned().unwrap_or(Value::Null));
            row.insert("image_width", resource.get("width").cloned().unwrap_or(Value::Null));
            row.insert("image_height", resource.get("height").cloned().unwrap_or(Value::Null));
        }
        None => {
            row.insert("image", Value::Null);
            row.insert("image_width", Value::Null);
            row.insert("image_height", Value::Null);
        }
    }

    row
}

/// The first media item's resource with the greatest height.
fn largest_resource(descriptive: &Value) -> Option<&Value> {
    lookup(descriptive, json_path!["online_media", "media", 0, "resources"])?
        .as_array()?
        .iter()
        .filter(|r| r.get("url").is_some())
        .filter_map(|r| Some((r, r.get("height")?.as_f64()?)))
        // min_by keeps the first of equal candidates
        .min_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
        .map(|(r, _)| r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "title": "Side Chair",
            "unitCode": "CHNDM",
            "content": {
                "descriptiveNonRepeating": {
                    "record_ID": "chndm_1931-45-1",
                    "record_link": "https://collection.cooperhewitt.org/objects/18446747/",
                    "data_source": "Cooper Hewitt, Smithsonian Design Museum",
                    "metadata_usage": {"access": "CC0"},
                    "online_media": {"media": [{"resources": [
                        {"label": "Thumbnail", "url": "https://ids.si.edu/thumb.jpg"},
                        {"label": "Screen", "url": "https://ids.si.edu/screen.jpg", "width": 800, "height": 600},
                        {"label": "High", "url": "https://ids.si.edu/high.jpg", "width": 3200, "height": 2400}
                    ]}]}
                },
                "indexedStructured": {
                    "date": ["1890s"],
                    "object_type": ["Chairs", "Furniture"]
                },
                "freetext": {
                    "setName": [{"content": "Furniture"}, {"content": "Seating"}],
                    "notes": [{"label": "Description", "content": "Bentwood side chair"}],
                    "physicalDescription": [
                        {"label": "Medium", "content": "Steam-bent beech"},
                        {"label": "Dimensions", "content": "H x W: 90 x 40 cm"}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_parse_full_record() {
        let row = parse_si_json(&sample());
        assert_eq!(row.get("id"), Some(&json!("chndm_1931-45-1")));
        assert_eq!(row.get("title"), Some(&json!("Side Chair")));
        assert_eq!(row.get("access"), Some(&json!("CC0")));
        assert_eq!(row.get("date"), Some(&json!("1890s")));
        assert_eq!(row.get("object_type"), Some(&json!("Chairs")));
        assert_eq!(row.get("name"), Some(&json!("")));
        assert_eq!(row.get("group"), Some(&json!("Seating")));
        assert_eq!(row.get("description"), Some(&json!("Bentwood side chair")));
        assert_eq!(row.get("medium"), Some(&json!("Steam-bent beech")));
        assert_eq!(row.get("dimensions"), Some(&json!("H x W: 90 x 40 cm")));
        assert_eq!(row.get("image"), Some(&json!("https://ids.si.edu/high.jpg")));
        assert_eq!(row.get("image_width"), Some(&json!(3200)));
        assert_eq!(row.get("image_height"), Some(&json!(2400)));
        assert_eq!(row.len(), COLUMNS.len());
    }

    #[test]
    fn test_parse_sparse_record() {
        let row = parse_si_json(&json!({"content": {}}));
        assert_eq!(row.get("title"), Some(&json!("Untitled")));
        assert_eq!(row.get("id"), Some(&json!("")));
        assert_eq!(row.get("group"), Some(&json!("")));
        assert!(!row.has_value("image"));
        assert_eq!(row.len(), COLUMNS.len());
    }
}
