//! Data profile assembly: records in, immutable [`DataProfile`] out.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::charts::recommend_charts;
use crate::classify::{classify, FieldType, GeoFields, Role};
use crate::flatten::flatten_records;
use crate::metrics::identify_key_metrics;
use crate::spec::ComponentType;
use crate::stats::{cardinality, columns, null_percentages};

/// Flattened records kept verbatim in the profile.
const SAMPLE_ROWS: usize = 10;

/// Everything learned about one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub roles: Vec<Role>,
    pub cardinality: usize,
    pub null_percentage: f64,
}

/// Analysis result for a record collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProfile {
    pub data_types: IndexMap<String, FieldType>,
    pub is_time_series: bool,
    #[serde(default)]
    pub time_fields: Vec<String>,
    #[serde(default)]
    pub numeric_fields: Vec<String>,
    #[serde(default)]
    pub categorical_fields: Vec<String>,
    #[serde(default)]
    pub key_metrics: Vec<String>,
    #[serde(default)]
    pub cardinality: IndexMap<String, usize>,
    #[serde(default)]
    pub null_percentages: IndexMap<String, f64>,
    pub recommended_charts: Vec<ComponentType>,
    #[serde(default)]
    pub sample_data: Vec<Value>,
    #[serde(default, skip_serializing_if = "GeoFields::is_empty")]
    pub geo_fields: GeoFields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_profiles: Vec<FieldProfile>,
}

impl DataProfile {
    /// Profile of a collection with no fields.
    pub fn empty() -> Self {
        Self {
            data_types: IndexMap::new(),
            is_time_series: false,
            time_fields: Vec::new(),
            numeric_fields: Vec::new(),
            categorical_fields: Vec::new(),
            key_metrics: Vec::new(),
            cardinality: IndexMap::new(),
            null_percentages: IndexMap::new(),
            recommended_charts: vec![ComponentType::Metric],
            sample_data: Vec::new(),
            geo_fields: GeoFields::default(),
            field_profiles: Vec::new(),
        }
    }
}

/// Profile a collection of heterogeneous records.
///
/// Never fails: anomalies such as unparseable dates or zero records fall back
/// to permissive defaults.
pub fn profile(records: &[Value]) -> DataProfile {
    let flat = flatten_records(records);
    let cols = columns(&flat);

    if cols.is_empty() {
        debug!("No fields found in {} records, returning empty profile", records.len());
        return DataProfile::empty();
    }

    let roles = classify(&cols);
    let cardinality = cardinality(&cols);
    let null_percentages = null_percentages(&cols);
    let key_metrics = identify_key_metrics(&roles.numeric_fields, &cols);
    let recommended_charts = recommend_charts(&roles, &cardinality);

    let field_profiles = roles
        .data_types
        .iter()
        .map(|(name, &field_type)| FieldProfile {
            name: name.clone(),
            field_type,
            roles: roles.roles_of(name),
            cardinality: cardinality.get(name).copied().unwrap_or_default(),
            null_percentage: null_percentages.get(name).copied().unwrap_or_default(),
        })
        .collect();

    debug!(
        "Profiled {} records: {} fields, {} time, {} numeric, {} categorical",
        records.len(),
        roles.data_types.len(),
        roles.time_fields.len(),
        roles.numeric_fields.len(),
        roles.categorical_fields.len()
    );

    DataProfile {
        is_time_series: !roles.time_fields.is_empty(),
        data_types: roles.data_types,
        time_fields: roles.time_fields,
        numeric_fields: roles.numeric_fields,
        categorical_fields: roles.categorical_fields,
        key_metrics,
        cardinality,
        null_percentages,
        recommended_charts,
        sample_data: flat.iter().take(SAMPLE_ROWS).cloned().collect(),
        geo_fields: roles.geo,
        field_profiles,
    }
}
