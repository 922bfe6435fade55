use serde_json::Value;

/// One step into a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Key(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for PathSegment<'a> {
    fn from(key: &'a str) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment<'_> {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Builds a `&[PathSegment]` from mixed keys and indices:
/// `json_path!["content", "indexedStructured", "date", 0]`.
#[macro_export]
macro_rules! json_path {
    ($($segment:expr),* $(,)?) => {
        &[$($crate::utils::json_path::PathSegment::from($segment)),*]
    };
}

/// Follows `path` from `root`. Returns `None` as soon as a key is missing,
/// an index is out of range, or a segment does not fit the node's type.
pub fn lookup<'v>(root: &'v Value, path: &[PathSegment<'_>]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, segment| match (segment, node) {
        (PathSegment::Key(key), Value::Object(map)) => map.get(*key),
        (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    })
}

/// Like [`lookup`], but falls back to `default` and clones the result.
pub fn get_nested_value(root: &Value, path: &[PathSegment<'_>], default: Value) -> Value {
    lookup(root, path).cloned().unwrap_or(default)
}

/// Returns `return_key` of the first object in `items` whose `condition.0`
/// equals `condition.1`.
pub fn get_where(items: &Value, return_key: &str, condition: (&str, &str), default: Value) -> Value {
    let (condition_key, condition_value) = condition;
    items
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .find(|item| {
            item.get(condition_key).and_then(Value::as_str) == Some(condition_value)
                && item.contains_key(return_key)
        })
        .and_then(|item| item.get(return_key).cloned())
        .unwrap_or(default)
}

/// String form of a scalar; `Null` becomes the empty string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}
