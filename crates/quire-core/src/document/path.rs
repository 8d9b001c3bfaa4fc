//! Dotted-path mutation over nested JSON mappings.
//!
//! Paths are dot-separated keys (`preferences.communication`). Reads may
//! index arrays with numeric segments; writes only traverse mappings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::document::{short_id, JsonMap, SCHEMA_VERSION};
use crate::error::{QuireError, QuireResult};

/// A single path mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Set,
    Merge,
    Append,
    Remove,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn ensure_object(value: &mut Value) -> &mut JsonMap {
    if !value.is_object() {
        *value = Value::Object(JsonMap::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Walk `keys`, creating missing or non-mapping intermediates.
fn walk_create<'a>(doc: &'a mut JsonMap, keys: &[&str]) -> &'a mut JsonMap {
    let mut current = doc;
    for key in keys {
        let entry = current
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        current = ensure_object(entry);
    }
    current
}

/// Resolve a path for reading. Numeric segments index arrays.
pub fn get<'a>(doc: &'a JsonMap, path: &str) -> Option<&'a Value> {
    let keys = segments(path);
    let (first, rest) = keys.split_first()?;
    let mut current = doc.get(*first)?;
    for key in rest {
        current = match current {
            Value::Object(map) => map.get(*key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Assign `value` at `path`. An empty path replaces the whole document,
/// keeping its `version`.
pub fn set(doc: &mut JsonMap, path: &str, value: Value) -> QuireResult<()> {
    let keys = segments(path);
    let Some((leaf, parents)) = keys.split_last() else {
        let Value::Object(mut replacement) = value else {
            return Err(QuireError::validation(
                "Replacing a whole document requires an object value",
            ));
        };
        let version = doc
            .get("version")
            .cloned()
            .unwrap_or_else(|| Value::from(SCHEMA_VERSION));
        replacement.insert("version".to_string(), version);
        *doc = replacement;
        return Ok(());
    };

    walk_create(doc, parents).insert((*leaf).to_string(), value);
    Ok(())
}

/// Recursively merge `update` into `base`. Nested mappings merge, anything
/// else in `update` wins.
pub fn deep_merge(base: &mut JsonMap, update: JsonMap) {
    for (key, incoming) in update {
        match (base.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => deep_merge(existing, nested),
            (_, incoming) => {
                base.insert(key, incoming);
            }
        }
    }
}

/// Deep-merge `value` into the mapping at `path`, or into the document root
/// when the path is empty.
pub fn merge(doc: &mut JsonMap, path: &str, value: Value) -> QuireResult<()> {
    let keys = segments(path);
    let Some((leaf, parents)) = keys.split_last() else {
        let Value::Object(update) = value else {
            return Err(QuireError::validation("merge without a path requires an object value"));
        };
        deep_merge(doc, update);
        return Ok(());
    };

    let parent = walk_create(doc, parents);
    match (parent.get_mut(*leaf), value) {
        (Some(Value::Object(existing)), Value::Object(update)) => deep_merge(existing, update),
        (_, value) => {
            parent.insert((*leaf).to_string(), value);
        }
    }
    Ok(())
}

/// Append `value` to the array at `path`, creating it if absent.
///
/// Mappings without an `id` get a generated one; a mapping whose `id`
/// matches an existing element replaces it in place. Returns the stored
/// value.
pub fn append(doc: &mut JsonMap, path: &str, mut value: Value) -> QuireResult<Value> {
    let keys = segments(path);
    let Some((leaf, parents)) = keys.split_last() else {
        return Err(QuireError::missing_field("path"));
    };

    let mut current = &mut *doc;
    for key in parents {
        let entry = current
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => return Err(QuireError::not_an_array(path)),
        };
    }

    let slot = current
        .entry((*leaf).to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(items) = slot else {
        return Err(QuireError::not_an_array(path));
    };

    if let Value::Object(map) = &mut value {
        if !map.contains_key("id") {
            map.insert("id".to_string(), Value::String(short_id()));
        }
        let id = map.get("id").cloned();
        if let Some(existing) = items
            .iter_mut()
            .find(|item| item.get("id").is_some() && item.get("id") == id.as_ref())
        {
            *existing = value.clone();
            return Ok(value);
        }
    }

    items.push(value.clone());
    Ok(value)
}

/// Remove from the array at `path`: by index for integers, by `id` for
/// mappings carrying one, by equality otherwise. Returns the number of
/// elements removed; removing something absent is a no-op.
pub fn remove(doc: &mut JsonMap, path: &str, value: &Value) -> QuireResult<usize> {
    let keys = segments(path);
    let Some((leaf, parents)) = keys.split_last() else {
        return Err(QuireError::missing_field("path"));
    };

    let mut current = &mut *doc;
    for key in parents {
        current = match current.get_mut(*key) {
            Some(Value::Object(map)) => map,
            Some(_) => return Err(QuireError::not_an_array(path)),
            None => return Err(QuireError::path_not_found(path)),
        };
    }

    let Some(Value::Array(items)) = current.get_mut(*leaf) else {
        return Err(QuireError::not_an_array(path));
    };

    if let Some(index) = value.as_i64() {
        if index < 0 || index as usize >= items.len() {
            return Err(QuireError::index_out_of_range(index, items.len()));
        }
        items.remove(index as usize);
        return Ok(1);
    }

    let before = items.len();
    match value.get("id") {
        Some(id) => items.retain(|item| item.get("id") != Some(id)),
        None => items.retain(|item| item != value),
    }
    Ok(before - items.len())
}

/// Apply one operation. `value` is required for every operation.
pub fn apply(doc: &mut JsonMap, op: Operation, path: &str, value: Value) -> QuireResult<()> {
    match op {
        Operation::Set => set(doc, path, value),
        Operation::Merge => merge(doc, path, value),
        Operation::Append => append(doc, path, value).map(|_| ()),
        Operation::Remove => remove(doc, path, &value).map(|_| ()),
    }
}

/// A search hit inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchHit {
    /// A scalar or key in the frontmatter.
    Data { path: String, value: Value },
    /// A line of the markdown body (1-based).
    Markdown { line: usize, content: String },
}

/// Case-insensitive search across frontmatter keys, string values and
/// markdown lines. Array elements are addressed as `key[i]`.
pub fn search(data: &JsonMap, markdown: &str, query: &str) -> Vec<SearchHit> {
    let needle = query.to_lowercase();
    let mut hits = Vec::new();
    for (key, value) in data {
        search_value(key, value, &needle, &mut hits, key);
    }
    for (i, line) in markdown.lines().enumerate() {
        if line.to_lowercase().contains(&needle) {
            hits.push(SearchHit::Markdown {
                line: i + 1,
                content: line.trim().to_string(),
            });
        }
    }
    hits
}

fn search_value(path: &str, value: &Value, needle: &str, hits: &mut Vec<SearchHit>, key: &str) {
    match value {
        Value::Object(map) => {
            if key.to_lowercase().contains(needle) {
                hits.push(SearchHit::Data {
                    path: path.to_string(),
                    value: value.clone(),
                });
                return;
            }
            for (k, v) in map {
                search_value(&format!("{}.{}", path, k), v, needle, hits, k);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                search_value(&format!("{}[{}]", path, i), v, needle, hits, "");
            }
        }
        Value::String(s) if s.to_lowercase().contains(needle) => hits.push(SearchHit::Data {
            path: path.to_string(),
            value: value.clone(),
        }),
        _ if !key.is_empty() && key.to_lowercase().contains(needle) => hits.push(SearchHit::Data {
            path: path.to_string(),
            value: value.clone(),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn doc(value: Value) -> JsonMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let d = doc(json!({"a": {"b": [10, {"c": "x"}]}}));
        assert_eq!(get(&d, "a.b.0"), Some(&json!(10)));
        assert_eq!(get(&d, "a.b.1.c"), Some(&json!("x")));
        assert_eq!(get(&d, "a.missing"), None);
        assert_eq!(get(&d, ""), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut d = doc(json!({"version": 1, "a": 5}));
        set(&mut d, "a.b.c", json!(true)).unwrap();
        assert_eq!(d["a"], json!({"b": {"c": true}}));
    }

    #[test]
    fn test_set_root_preserves_version() {
        let mut d = doc(json!({"version": 3, "old": true}));
        set(&mut d, "", json!({"version": 9, "new": 1})).unwrap();
        assert_eq!(Value::Object(d), json!({"version": 3, "new": 1}));
    }

    #[test]
    fn test_set_root_requires_object() {
        let mut d = doc(json!({"version": 1}));
        let err = set(&mut d, "", json!([1])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
    }

    #[test]
    fn test_merge_deep() {
        let mut d = doc(json!({"prefs": {"tone": "warm", "nested": {"a": 1}}}));
        merge(&mut d, "prefs", json!({"nested": {"b": 2}, "tone": "dry"})).unwrap();
        assert_eq!(d["prefs"], json!({"tone": "dry", "nested": {"a": 1, "b": 2}}));
    }

    #[test]
    fn test_merge_sets_when_target_not_mapping() {
        let mut d = doc(json!({"prefs": "none"}));
        merge(&mut d, "prefs", json!({"a": 1})).unwrap();
        assert_eq!(d["prefs"], json!({"a": 1}));
    }

    #[test]
    fn test_merge_root_requires_object() {
        let mut d = JsonMap::new();
        assert!(merge(&mut d, "", json!("x")).is_err());
        merge(&mut d, "", json!({"x": 1})).unwrap();
        assert_eq!(d["x"], json!(1));
    }

    #[test]
    fn test_append_generates_id_and_upserts() {
        let mut d = JsonMap::new();
        let stored = append(&mut d, "people", json!({"name": "Ann"})).unwrap();
        let id = stored["id"].as_str().unwrap().to_string();
        assert_eq!(id.len(), 8);

        append(&mut d, "people", json!({"id": id, "name": "Ann B"})).unwrap();
        append(&mut d, "people", json!({"id": id, "name": "Ann B"})).unwrap();
        let people = d["people"].as_array().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0]["name"], json!("Ann B"));
    }

    #[test]
    fn test_append_scalar_and_shape_errors() {
        let mut d = doc(json!({"tags": "nope"}));
        let err = append(&mut d, "tags", json!("x")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ArrNotArray);

        append(&mut d, "list", json!("x")).unwrap();
        append(&mut d, "list", json!("x")).unwrap();
        assert_eq!(d["list"], json!(["x", "x"]));

        assert_eq!(
            append(&mut d, "", json!(1)).unwrap_err().code(),
            ErrorCode::ValMissingField
        );
    }

    #[test]
    fn test_remove_by_index_id_and_value() {
        let mut d = doc(json!({"xs": ["a", {"id": "k", "v": 1}, "b", "a"]}));
        assert_eq!(remove(&mut d, "xs", &json!({"id": "k"})).unwrap(), 1);
        assert_eq!(remove(&mut d, "xs", &json!("a")).unwrap(), 2);
        assert_eq!(remove(&mut d, "xs", &json!(0)).unwrap(), 1);
        assert_eq!(d["xs"], json!([]));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut d = doc(json!({"xs": [1, 2]}));
        assert_eq!(remove(&mut d, "xs", &json!("zzz")).unwrap(), 0);
        assert_eq!(d["xs"], json!([1, 2]));
    }

    #[test]
    fn test_remove_errors() {
        let mut d = doc(json!({"xs": [1], "s": "str"}));
        assert_eq!(
            remove(&mut d, "xs", &json!(5)).unwrap_err().code(),
            ErrorCode::ValIndexOutOfRange
        );
        assert_eq!(
            remove(&mut d, "s", &json!(1)).unwrap_err().code(),
            ErrorCode::ArrNotArray
        );
        assert_eq!(
            remove(&mut d, "missing.xs", &json!(1)).unwrap_err().code(),
            ErrorCode::NfPath
        );
    }

    #[test]
    fn test_search_paths() {
        let d = doc(json!({
            "name": "Acme Corp",
            "contacts": [{"name": "Jo", "company": "acme"}],
            "acme_notes": 3
        }));
        let hits = search(&d, "line one\nAcme rocks", "acme");
        let paths: Vec<String> = hits
            .iter()
            .filter_map(|h| match h {
                SearchHit::Data { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert!(paths.contains(&"name".to_string()));
        assert!(paths.contains(&"contacts[0].company".to_string()));
        assert!(paths.contains(&"acme_notes".to_string()));
        assert!(hits.contains(&SearchHit::Markdown {
            line: 2,
            content: "Acme rocks".to_string()
        }));
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!("append".parse::<Operation>().unwrap(), Operation::Append);
        assert_eq!(Operation::Merge.to_string(), "merge");
    }
}
