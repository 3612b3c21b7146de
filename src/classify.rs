//! Per-field type and role inference over flattened records.
//!
//! Type inference is an ordered chain of pure rules over a column; the first
//! rule that accepts the column decides its type, `string` otherwise. Role
//! detection runs afterwards on the inferred types. Malformed values never
//! fail a rule; they simply do not count as parseable.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::stats::Column;

/// Substrings in a field name that mark it as temporal.
const TIME_NAME_HINTS: &[&str] = &["date", "time", "timestamp", "created", "updated", "at", "on"];

/// Substrings in a field name that mark it as a possible identifier.
const ID_NAME_HINTS: &[&str] = &["id", "key", "index", "no", "number", "code"];

const LAT_NAME_HINTS: &[&str] = &["lat", "latitude", "y"];
const LON_NAME_HINTS: &[&str] = &["lon", "lng", "long", "longitude", "x"];

/// Values inspected when probing for date/time formats.
const DATETIME_SAMPLE: usize = 10;
/// Fraction of the sample that must parse.
const DATETIME_THRESHOLD: f64 = 0.8;
/// Values inspected when checking coordinate ranges.
const GEO_SAMPLE: usize = 100;

/// Categorical if distinct values are below this share of all records...
const CATEGORICAL_RATIO: f64 = 0.5;
/// ...and below this absolute count.
const CATEGORICAL_CAP: usize = 50;

/// Inferred storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    Datetime,
    Boolean,
    String,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Datetime => "datetime",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
        }
    }
}

/// Semantic role of a field, independent of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "numeric")]
    Numeric,
    #[serde(rename = "categorical")]
    Categorical,
    #[serde(rename = "geographic-lat")]
    GeographicLat,
    #[serde(rename = "geographic-lon")]
    GeographicLon,
}

/// Latitude and longitude candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoFields {
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,
}

impl GeoFields {
    /// Both a latitude and a longitude field are present.
    pub fn is_complete(&self) -> bool {
        !self.latitude.is_empty() && !self.longitude.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_empty() && self.longitude.is_empty()
    }
}

/// Classifier output for a whole record set.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub data_types: IndexMap<String, FieldType>,
    pub time_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
    pub categorical_fields: Vec<String>,
    pub geo: GeoFields,
}

impl Classification {
    /// Roles held by a field, in a fixed order.
    pub fn roles_of(&self, field: &str) -> Vec<Role> {
        let has = |list: &[String]| list.iter().any(|f| f == field);
        let mut roles = Vec::new();
        if has(&self.time_fields) {
            roles.push(Role::Time);
        }
        if has(&self.numeric_fields) {
            roles.push(Role::Numeric);
        }
        if has(&self.categorical_fields) {
            roles.push(Role::Categorical);
        }
        if has(&self.geo.latitude) {
            roles.push(Role::GeographicLat);
        }
        if has(&self.geo.longitude) {
            roles.push(Role::GeographicLon);
        }
        roles
    }
}

/// Classify every column.
pub fn classify(columns: &[Column<'_>]) -> Classification {
    let mut out = Classification::default();

    for column in columns {
        let field_type = infer_type(column);
        let name = column.name.to_string();
        out.data_types.insert(name.clone(), field_type);

        if field_type == FieldType::Datetime {
            out.time_fields.push(name.clone());
        }

        if field_type.is_numeric() {
            if is_identifier_like(column) {
                debug!("Excluding identifier-like field '{}' from numeric fields", column.name);
            } else {
                out.numeric_fields.push(name.clone());
            }
            if is_latitude(column) {
                out.geo.latitude.push(name.clone());
            }
            if is_longitude(column) {
                out.geo.longitude.push(name.clone());
            }
        } else if is_categorical(column) {
            out.categorical_fields.push(name);
        }
    }

    out
}

// ============================================================================
// Type rules
// ============================================================================

type TypeRule = fn(&Column<'_>) -> Option<FieldType>;

/// Tried in order; first match wins.
const TYPE_RULES: &[TypeRule] = &[integer_rule, float_rule, boolean_rule, datetime_rule];

/// Infer a column's type, `string` when no rule accepts it.
pub fn infer_type(column: &Column<'_>) -> FieldType {
    TYPE_RULES
        .iter()
        .find_map(|rule| rule(column))
        .unwrap_or(FieldType::String)
}

/// True if the column has at least one non-null value and all satisfy `pred`.
fn all_non_null(column: &Column<'_>, pred: impl Fn(&Value) -> bool) -> bool {
    let mut any = false;
    for value in column.non_null() {
        if !pred(value) {
            return false;
        }
        any = true;
    }
    any
}

fn integer_rule(column: &Column<'_>) -> Option<FieldType> {
    all_non_null(column, is_integral).then_some(FieldType::Integer)
}

/// A finite number with no fractional part, however it was written (`2` or `2.0`).
fn is_integral(value: &Value) -> bool {
    value
        .as_f64()
        .map_or(false, |n| n.is_finite() && n.fract() == 0.0)
}

fn float_rule(column: &Column<'_>) -> Option<FieldType> {
    all_non_null(column, Value::is_number).then_some(FieldType::Float)
}

fn boolean_rule(column: &Column<'_>) -> Option<FieldType> {
    all_non_null(column, Value::is_boolean).then_some(FieldType::Boolean)
}

fn datetime_rule(column: &Column<'_>) -> Option<FieldType> {
    is_datetime_column(column).then_some(FieldType::Datetime)
}

// ============================================================================
// Datetime detection
// ============================================================================

/// A named date/time layout accepted during detection.
struct DateFormat {
    name: &'static str,
    parses: fn(&str) -> bool,
}

/// Fixed layouts, tried in order. Each is judged on its own share of the sample.
const FIXED_DATE_FORMATS: &[DateFormat] = &[
    DateFormat { name: "iso-date", parses: parses_iso_date },
    DateFormat { name: "iso-datetime", parses: parses_iso_datetime },
    DateFormat { name: "mm/dd/yyyy", parses: parses_us_date },
    DateFormat { name: "yyyy/mm/dd", parses: parses_slashed_iso_date },
    DateFormat { name: "dd-mm-yyyy", parses: parses_dashed_eu_date },
];

/// Extra layouts accepted by the permissive pass, where each value may match
/// any layout independently.
const PERMISSIVE_DATE_LAYOUTS: &[&str] = &[
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%Y%m%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

const PERMISSIVE_DATETIME_LAYOUTS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// chrono's `%Y` also takes one to three digit years; require a full year.
fn has_full_year(s: &str, layout: &str) -> bool {
    !layout.contains("%Y")
        || s.as_bytes()
            .windows(4)
            .any(|w| w.iter().all(u8::is_ascii_digit))
}

fn date(s: &str, layout: &str) -> bool {
    has_full_year(s, layout) && NaiveDate::parse_from_str(s, layout).is_ok()
}

fn datetime(s: &str, layout: &str) -> bool {
    has_full_year(s, layout) && NaiveDateTime::parse_from_str(s, layout).is_ok()
}

fn parses_iso_date(s: &str) -> bool {
    date(s, "%Y-%m-%d")
}

fn parses_us_date(s: &str) -> bool {
    date(s, "%m/%d/%Y")
}

fn parses_slashed_iso_date(s: &str) -> bool {
    date(s, "%Y/%m/%d")
}

fn parses_dashed_eu_date(s: &str) -> bool {
    date(s, "%d-%m-%Y")
}

fn parses_iso_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || datetime(s, "%Y-%m-%dT%H:%M:%S%.f")
        || datetime(s, "%Y-%m-%d %H:%M:%S%.f")
        || datetime(s, "%Y-%m-%dT%H:%M")
}

fn parses_permissive(s: &str) -> bool {
    FIXED_DATE_FORMATS.iter().any(|f| (f.parses)(s))
        || DateTime::parse_from_rfc2822(s).is_ok()
        || PERMISSIVE_DATE_LAYOUTS.iter().any(|l| date(s, l))
        || PERMISSIVE_DATETIME_LAYOUTS.iter().any(|l| datetime(s, l))
}

fn name_has_hint(name: &str, hints: &[&str]) -> bool {
    let lower = name.to_lowercase();
    hints.iter().any(|hint| lower.contains(hint))
}

/// Temporal detection for a non-numeric column.
///
/// A name hint alone is enough; otherwise a fixed layout, then the
/// permissive pass, must parse at least 80% of up to 10 non-null values.
/// A column with no non-null values is never temporal.
pub fn is_datetime_column(column: &Column<'_>) -> bool {
    let sample: Vec<&Value> = column.non_null().take(DATETIME_SAMPLE).collect();
    if sample.is_empty() {
        return false;
    }
    if name_has_hint(column.name, TIME_NAME_HINTS) {
        return true;
    }

    let texts: Vec<Option<&str>> = sample.iter().map(|v| v.as_str().map(str::trim)).collect();
    let share = |parses: &dyn Fn(&str) -> bool| {
        let ok = texts.iter().filter(|t| t.is_some_and(parses)).count();
        ok as f64 / texts.len() as f64
    };

    if let Some(format) = FIXED_DATE_FORMATS
        .iter()
        .find(|f| share(&f.parses) >= DATETIME_THRESHOLD)
    {
        debug!("Field '{}' matches date format {}", column.name, format.name);
        return true;
    }

    let permissive = share(&parses_permissive) >= DATETIME_THRESHOLD;
    if !permissive {
        debug!("Field '{}' sample is not parseable as dates", column.name);
    }
    permissive
}

// ============================================================================
// Role rules
// ============================================================================

/// Identifier-like: an id-ish name and values that are all distinct or
/// never decrease.
pub fn is_identifier_like(column: &Column<'_>) -> bool {
    if !name_has_hint(column.name, ID_NAME_HINTS) {
        return false;
    }
    column.all_distinct() || is_non_decreasing(column)
}

fn is_non_decreasing(column: &Column<'_>) -> bool {
    let values: Vec<f64> = column.numbers().collect();
    values.windows(2).all(|w| w[0] <= w[1])
}

/// Categorical: few distinct values relative to the record count and in absolute terms.
pub fn is_categorical(column: &Column<'_>) -> bool {
    let distinct = column.distinct_count();
    distinct > 0
        && (distinct as f64) < column.total() as f64 * CATEGORICAL_RATIO
        && distinct < CATEGORICAL_CAP
}

fn in_range(column: &Column<'_>, bound: f64) -> bool {
    let sample: Vec<f64> = column.numbers().take(GEO_SAMPLE).collect();
    !sample.is_empty() && sample.iter().all(|v| (-bound..=bound).contains(v))
}

pub fn is_latitude(column: &Column<'_>) -> bool {
    name_has_hint(column.name, LAT_NAME_HINTS) && in_range(column, 90.0)
}

pub fn is_longitude(column: &Column<'_>) -> bool {
    name_has_hint(column.name, LON_NAME_HINTS) && in_range(column, 180.0)
}
