//! Record flattening: nested objects collapse into dot-path keys.
//!
//! Pure functions, no async. Sequences are never exploded into rows; they are
//! kept as a single string value so every input record maps to exactly one
//! flat record.

use serde_json::{Map, Value};

/// Separator between a parent key and a child key.
pub const KEY_SEPARATOR: &str = ".";

/// A flattened record: dot-path key to scalar value. Never holds an object.
pub type FlatRecord = Map<String, Value>;

/// Flatten every record, preserving length and order.
///
/// Objects become [`FlatRecord`]s wrapped back into `Value::Object`; any other
/// top-level value is passed through untouched.
pub fn flatten_records(records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .map(|record| match record {
            Value::Object(map) => Value::Object(flatten_record(map)),
            other => other.clone(),
        })
        .collect()
}

/// Flatten a single object record.
pub fn flatten_record(record: &Map<String, Value>) -> FlatRecord {
    let mut out = Map::new();
    flatten_into(record, None, &mut out);
    out
}

fn flatten_into(map: &Map<String, Value>, prefix: Option<&str>, out: &mut FlatRecord) {
    for (key, value) in map {
        let path = match prefix {
            Some(p) => format!("{}{}{}", p, KEY_SEPARATOR, key),
            None => key.clone(),
        };

        match value {
            Value::Object(child) => flatten_into(child, Some(&path), out),
            Value::Array(items) => {
                out.insert(path, Value::String(stringify_sequence(items)));
            }
            scalar => {
                // Last write wins on a colliding path.
                out.insert(path, scalar.clone());
            }
        }
    }
}

/// Render a sequence as one string.
///
/// Sequences of objects are serialized as canonical JSON (keys sorted at
/// every level); sequences of scalars use plain JSON array text.
fn stringify_sequence(items: &[Value]) -> String {
    let all_objects = !items.is_empty() && items.iter().all(Value::is_object);
    let rendered = if all_objects {
        Value::Array(items.iter().map(canonicalize).collect())
    } else {
        Value::Array(items.to_vec())
    };
    serde_json::to_string(&rendered).unwrap_or_default()
}

/// Rebuild a value with object keys in sorted order.
///
/// `serde_json` preserves insertion order here, so sorting is explicit.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects_use_dot_paths() {
        let records = vec![json!({"user": {"name": "Ana", "address": {"city": "SP"}}, "age": 30})];
        let flat = flatten_records(&records);
        assert_eq!(
            flat[0],
            json!({"user.name": "Ana", "user.address.city": "SP", "age": 30})
        );
    }

    #[test]
    fn test_scalar_sequence_becomes_string() {
        let records = vec![json!({"tags": ["a", "b"], "n": [1, 2]})];
        let flat = flatten_records(&records);
        assert_eq!(flat[0]["tags"], json!("[\"a\",\"b\"]"));
        assert_eq!(flat[0]["n"], json!("[1,2]"));
    }

    #[test]
    fn test_object_sequence_is_canonical() {
        let a = vec![json!({"items": [{"b": 1, "a": 2}]})];
        let b = vec![json!({"items": [{"a": 2, "b": 1}]})];
        let flat_a = flatten_records(&a);
        let flat_b = flatten_records(&b);
        assert_eq!(flat_a[0]["items"], json!("[{\"a\":2,\"b\":1}]"));
        assert_eq!(flat_a, flat_b);
    }

    #[test]
    fn test_non_object_records_pass_through() {
        let records = vec![json!(42), json!(null), json!({"x": {"y": null}})];
        let flat = flatten_records(&records);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0], json!(42));
        assert_eq!(flat[1], Value::Null);
        assert_eq!(flat[2], json!({"x.y": null}));
    }

    #[test]
    fn test_collision_is_last_write_wins() {
        let records = vec![json!({"a.b": 1, "a": {"b": 2}})];
        let flat = flatten_records(&records);
        assert_eq!(flat[0]["a.b"], json!(2));
    }

    #[test]
    fn test_empty_nested_object_yields_no_keys() {
        let flat = flatten_record(json!({"meta": {}, "v": 1}).as_object().unwrap());
        assert_eq!(Value::Object(flat), json!({"v": 1}));
    }
}
