//! Column views and per-field summary statistics.
//!
//! All statistics are computed once per analysis over the full record set,
//! never over a sample.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashSet;

static MISSING: Value = Value::Null;

/// One field's values across every record, in record order.
///
/// A record that lacks the field (or is not an object at all) contributes
/// `Null`, so `values.len()` always equals the record count.
#[derive(Debug, Clone)]
pub struct Column<'a> {
    pub name: &'a str,
    pub values: Vec<&'a Value>,
}

impl<'a> Column<'a> {
    /// Number of records, nulls included.
    pub fn total(&self) -> usize {
        self.values.len()
    }

    /// Non-null values in record order.
    pub fn non_null(&self) -> impl Iterator<Item = &'a Value> + '_ {
        self.values.iter().copied().filter(|v| !v.is_null())
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Count of distinct non-null values.
    pub fn distinct_count(&self) -> usize {
        self.non_null().map(value_key).collect::<HashSet<_>>().len()
    }

    /// True if no non-null value repeats.
    pub fn all_distinct(&self) -> bool {
        let mut seen = HashSet::new();
        self.non_null().all(|v| seen.insert(value_key(v)))
    }

    /// Non-null values that are numbers, as `f64`.
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.non_null().filter_map(Value::as_f64)
    }
}

/// Identity key used for distinctness. Flattened values are scalars, so the
/// JSON text is unambiguous.
fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => format!("s:{}", s),
        other => other.to_string(),
    }
}

/// Build one column per field, in order of first appearance across records.
pub fn columns(records: &[Value]) -> Vec<Column<'_>> {
    let mut names: IndexSet<&str> = IndexSet::new();
    for record in records {
        if let Value::Object(map) = record {
            names.extend(map.keys().map(String::as_str));
        }
    }

    names
        .into_iter()
        .map(|name| Column {
            name,
            values: records
                .iter()
                .map(|record| record.get(name).unwrap_or(&MISSING))
                .collect(),
        })
        .collect()
}

/// Distinct non-null value count per field.
pub fn cardinality(columns: &[Column<'_>]) -> IndexMap<String, usize> {
    columns
        .iter()
        .map(|c| (c.name.to_string(), c.distinct_count()))
        .collect()
}

/// Percentage of records where the field is null or missing, rounded to 2 places.
pub fn null_percentages(columns: &[Column<'_>]) -> IndexMap<String, f64> {
    columns
        .iter()
        .map(|c| {
            let pct = if c.total() == 0 {
                0.0
            } else {
                c.null_count() as f64 / c.total() as f64 * 100.0
            };
            (c.name.to_string(), round2(pct))
        })
        .collect()
}

/// Sample variance (n - 1 denominator) of the numeric values.
///
/// `None` when fewer than two numbers are present.
pub fn sample_variance(column: &Column<'_>) -> Option<f64> {
    let values: Vec<f64> = column.numbers().collect();
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.is_finite().then_some(var)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Value> {
        vec![
            json!({"a": 1, "b": "x"}),
            json!({"a": 1, "c": true}),
            json!({"a": null, "b": "y"}),
        ]
    }

    #[test]
    fn test_columns_follow_first_appearance() {
        let records = sample();
        let cols = columns(&records);
        let names: Vec<&str> = cols.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(cols.iter().all(|c| c.total() == 3));
    }

    #[test]
    fn test_cardinality_ignores_nulls() {
        let records = sample();
        let card = cardinality(&columns(&records));
        assert_eq!(card["a"], 1);
        assert_eq!(card["b"], 2);
        assert_eq!(card["c"], 1);
    }

    #[test]
    fn test_null_percentages_count_missing() {
        let records = sample();
        let nulls = null_percentages(&columns(&records));
        assert_eq!(nulls["a"], 33.33);
        assert_eq!(nulls["b"], 33.33);
        assert_eq!(nulls["c"], 66.67);
    }

    #[test]
    fn test_string_and_number_are_distinct_values() {
        let records = vec![json!({"v": 1}), json!({"v": "1"})];
        let cols = columns(&records);
        assert_eq!(cols[0].distinct_count(), 2);
        assert!(cols[0].all_distinct());
    }

    #[test]
    fn test_sample_variance() {
        let records = vec![json!({"v": 2}), json!({"v": 4}), json!({"v": 6}), json!({})];
        let cols = columns(&records);
        assert_eq!(sample_variance(&cols[0]), Some(4.0));

        let single = vec![json!({"v": 2})];
        assert_eq!(sample_variance(&columns(&single)[0]), None);
    }

    #[test]
    fn test_non_object_records_count_as_missing() {
        let records = vec![json!({"v": 1}), json!("loose")];
        let nulls = null_percentages(&columns(&records));
        assert_eq!(nulls["v"], 50.0);
    }
}
