//! Structural validation of candidate dashboard specifications.
//!
//! A candidate arrives as untyped JSON (from a model, a cache, a person) and
//! leaves either as a typed [`DashboardSpecification`] or as a
//! [`SpecificationInvalid`] listing every problem found. Duplicate component
//! ids and overlapping grid positions are always hard failures.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::spec::{
    default_columns, ComponentType, DashboardComponent, DashboardSpecification, DataMapping,
    LayoutConfig, Metadata, Position, Styling, ThemeSettings, FONT_SIZE_RANGE,
};

/// Keys every component must carry.
const REQUIRED_FIELDS: [&str; 4] = ["id", "type", "title", "dataMapping"];

/// Largest width or height of a positioned component, in grid cells.
const MAX_CELL_SPAN: u32 = 12;
/// Largest number of grid columns.
const MAX_GRID_COLUMNS: u32 = 24;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("specification must be a JSON object")]
    NotAnObject,

    #[error("specification has no 'components' list")]
    MissingComponents,

    #[error("specification must contain at least one component")]
    NoComponents,

    #[error("component #{index} is not an object")]
    ComponentNotObject { index: usize },

    #[error("component #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("component #{index} field '{field}' must be a string")]
    NotAString { index: usize, field: &'static str },

    #[error("component #{index} has an empty or malformed id '{id}' (allowed: A-Z a-z 0-9 _ -)")]
    MalformedId { index: usize, id: String },

    #[error("component '{id}' has unknown type '{value}'")]
    UnknownType { id: String, value: String },

    #[error("component '{id}' has an empty title")]
    EmptyTitle { id: String },

    #[error("component '{id}' has invalid dataMapping: {reason}")]
    InvalidMapping { id: String, reason: String },

    #[error("component '{id}' maps '{key}' to an empty field name")]
    EmptyFieldReference { id: String, key: &'static str },

    #[error("component '{id}' has invalid position: {reason}")]
    InvalidPosition { id: String, reason: String },

    #[error("component '{id}' extends beyond grid width: x({x}) + width({width}) > {columns}")]
    OutOfBounds { id: String, x: u32, width: u32, columns: u32 },

    #[error("components '{first}' and '{second}' overlap")]
    Overlap { first: String, second: String },

    #[error("component '{id}' has invalid styling: {reason}")]
    InvalidStyling { id: String, reason: String },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid theme: {0}")]
    InvalidTheme(String),

    #[error("duplicate component ids: {}", .0.join(", "))]
    DuplicateIds(Vec<String>),
}

/// Rejection of a candidate specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid dashboard specification: {}", join_issues(.issues))]
pub struct SpecificationInvalid {
    pub issues: Vec<ValidationIssue>,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl SpecificationInvalid {
    fn single(issue: ValidationIssue) -> Self {
        Self { issues: vec![issue] }
    }

    /// Human-readable reasons, one per issue.
    pub fn reasons(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Validate an untyped candidate.
pub fn validate(candidate: &Value) -> Result<DashboardSpecification, SpecificationInvalid> {
    let root = candidate
        .as_object()
        .ok_or_else(|| SpecificationInvalid::single(ValidationIssue::NotAnObject))?;
    let raw_components = root
        .get("components")
        .and_then(Value::as_array)
        .ok_or_else(|| SpecificationInvalid::single(ValidationIssue::MissingComponents))?;
    if raw_components.is_empty() {
        return Err(SpecificationInvalid::single(ValidationIssue::NoComponents));
    }

    let mut issues = Vec::new();

    let layout = match root.get("layout") {
        None | Some(Value::Null) => None,
        Some(raw) => check_layout(raw, &mut issues),
    };
    let metadata = match root.get("metadata") {
        None | Some(Value::Null) => None,
        Some(raw) => check_metadata(raw, &mut issues),
    };
    let theme = match root.get("theme") {
        None | Some(Value::Null) => None,
        Some(raw) => match serde_json::from_value::<ThemeSettings>(raw.clone()) {
            Ok(theme) => Some(theme),
            Err(e) => {
                issues.push(ValidationIssue::InvalidTheme(e.to_string()));
                None
            }
        },
    };

    let components: Vec<DashboardComponent> = raw_components
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| check_component(index, raw, &mut issues))
        .collect();

    if let Some(duplicates) = duplicate_ids(raw_components) {
        issues.push(ValidationIssue::DuplicateIds(duplicates));
    }

    let columns = layout.as_ref().map_or_else(default_columns, |l| l.columns);
    check_positions(&components, columns, &mut issues);

    if issues.is_empty() {
        Ok(DashboardSpecification {
            components,
            layout,
            metadata,
            theme,
        })
    } else {
        Err(SpecificationInvalid { issues })
    }
}

/// Re-check an already typed specification.
#[cfg(test)]
pub fn validate_spec(spec: &DashboardSpecification) -> Result<(), SpecificationInvalid> {
    validate(&serde_json::to_value(spec).unwrap()).map(|_| ())
}

fn check_layout(raw: &Value, issues: &mut Vec<ValidationIssue>) -> Option<LayoutConfig> {
    let layout: LayoutConfig = match serde_json::from_value(raw.clone()) {
        Ok(layout) => layout,
        Err(e) => {
            issues.push(ValidationIssue::InvalidLayout(e.to_string()));
            return None;
        }
    };
    if !(1..=MAX_GRID_COLUMNS).contains(&layout.columns) {
        issues.push(ValidationIssue::InvalidLayout(format!(
            "columns must be between 1 and {}, got {}",
            MAX_GRID_COLUMNS, layout.columns
        )));
    }
    if layout.rows == 0 {
        issues.push(ValidationIssue::InvalidLayout("rows must be at least 1".to_string()));
    }
    Some(layout)
}

fn check_metadata(raw: &Value, issues: &mut Vec<ValidationIssue>) -> Option<Metadata> {
    let metadata: Metadata = match serde_json::from_value(raw.clone()) {
        Ok(metadata) => metadata,
        Err(e) => {
            issues.push(ValidationIssue::InvalidMetadata(e.to_string()));
            return None;
        }
    };
    if metadata.title.trim().is_empty() {
        issues.push(ValidationIssue::InvalidMetadata("title must not be empty".to_string()));
    }
    Some(metadata)
}

fn check_styling(id: &str, raw: &Value, issues: &mut Vec<ValidationIssue>) -> Option<Styling> {
    let styling: Styling = match serde_json::from_value(raw.clone()) {
        Ok(styling) => styling,
        Err(e) => {
            issues.push(ValidationIssue::InvalidStyling {
                id: id.to_string(),
                reason: e.to_string(),
            });
            return None;
        }
    };
    if let Some(size) = styling.font_size.filter(|size| !FONT_SIZE_RANGE.contains(size)) {
        issues.push(ValidationIssue::InvalidStyling {
            id: id.to_string(),
            reason: format!(
                "fontSize must be between {} and {}, got {}",
                FONT_SIZE_RANGE.start(),
                FONT_SIZE_RANGE.end(),
                size
            ),
        });
    }
    Some(styling)
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    index: usize,
    field: &'static str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a str> {
    let value = obj.get(field)?.as_str();
    if value.is_none() {
        issues.push(ValidationIssue::NotAString { index, field });
    }
    value
}

/// Validate one component, recording issues. Returns it typed only when clean.
fn check_component(
    index: usize,
    raw: &Value,
    issues: &mut Vec<ValidationIssue>,
) -> Option<DashboardComponent> {
    let Some(obj) = raw.as_object() else {
        issues.push(ValidationIssue::ComponentNotObject { index });
        return None;
    };

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| obj.get(*field).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        issues.extend(
            missing
                .into_iter()
                .map(|field| ValidationIssue::MissingField { index, field }),
        );
        return None;
    }

    let before = issues.len();

    let id = required_str(obj, index, "id", issues);
    if let Some(id) = id.filter(|id| !ID_PATTERN.is_match(id)) {
        issues.push(ValidationIssue::MalformedId { index, id: id.to_string() });
    }
    let id = id.unwrap_or_default();
    let label = if id.is_empty() { format!("#{}", index) } else { id.to_string() };

    let component_type = required_str(obj, index, "type", issues).and_then(|raw_type| {
        let resolved = resolve_type(raw_type);
        if resolved.is_none() {
            issues.push(ValidationIssue::UnknownType {
                id: label.clone(),
                value: raw_type.to_string(),
            });
        }
        resolved
    });

    let title = required_str(obj, index, "title", issues).unwrap_or_default();
    if title.trim().is_empty() {
        issues.push(ValidationIssue::EmptyTitle { id: label.clone() });
    }

    let data_mapping = check_mapping(&label, &obj["dataMapping"], issues);

    let description = match obj.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(ValidationIssue::NotAString { index, field: "description" });
            None
        }
    };

    let position = match obj.get("position") {
        None | Some(Value::Null) => None,
        Some(raw) => check_position(&label, raw, issues),
    };

    let styling = match obj.get("styling") {
        None | Some(Value::Null) => None,
        Some(raw) => check_styling(&label, raw, issues),
    };

    if issues.len() != before {
        return None;
    }

    Some(DashboardComponent {
        id: id.to_string(),
        component_type: component_type?,
        title: title.to_string(),
        data_mapping: data_mapping?,
        description,
        position,
        styling,
    })
}

/// Resolve a type name: exact wire name, then the case/underscore-insensitive
/// form. Anything else is left to fail the closed enum.
fn resolve_type(raw: &str) -> Option<ComponentType> {
    if let Some(t) = ComponentType::from_wire(raw) {
        return Some(t);
    }
    match ComponentType::from_loose(raw) {
        Some(t) => {
            info!("Normalized component type '{}' to '{}'", raw, t);
            Some(t)
        }
        None => {
            warn!("Unknown component type '{}', keeping as-is", raw);
            None
        }
    }
}

fn check_mapping(id: &str, raw: &Value, issues: &mut Vec<ValidationIssue>) -> Option<DataMapping> {
    if !raw.is_object() {
        issues.push(ValidationIssue::InvalidMapping {
            id: id.to_string(),
            reason: "must be an object".to_string(),
        });
        return None;
    }
    let mapping: DataMapping = match serde_json::from_value(raw.clone()) {
        Ok(mapping) => mapping,
        Err(e) => {
            issues.push(ValidationIssue::InvalidMapping {
                id: id.to_string(),
                reason: e.to_string(),
            });
            return None;
        }
    };

    let before = issues.len();
    for (key, field) in mapping.references() {
        if field.trim().is_empty() {
            issues.push(ValidationIssue::EmptyFieldReference { id: id.to_string(), key });
        }
    }
    (issues.len() == before).then_some(mapping)
}

fn check_position(id: &str, raw: &Value, issues: &mut Vec<ValidationIssue>) -> Option<Position> {
    let position: Position = match serde_json::from_value(raw.clone()) {
        Ok(position) => position,
        Err(e) => {
            issues.push(ValidationIssue::InvalidPosition { id: id.to_string(), reason: e.to_string() });
            return None;
        }
    };
    for (name, span) in [("width", position.width), ("height", position.height)] {
        if !(1..=MAX_CELL_SPAN).contains(&span) {
            issues.push(ValidationIssue::InvalidPosition {
                id: id.to_string(),
                reason: format!("{} {} must be between 1 and {}", name, span, MAX_CELL_SPAN),
            });
        }
    }
    Some(position)
}

/// Ids that appear more than once, in first-seen order.
fn duplicate_ids(raw_components: &[Value]) -> Option<Vec<String>> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for id in raw_components.iter().filter_map(|c| c.get("id").and_then(Value::as_str)) {
        let count = counts.entry(id).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(id.to_string());
        }
    }
    (!order.is_empty()).then_some(order)
}

fn check_positions(components: &[DashboardComponent], columns: u32, issues: &mut Vec<ValidationIssue>) {
    let placed: Vec<(&str, &Position)> = components
        .iter()
        .filter_map(|c| c.position.as_ref().map(|p| (c.id.as_str(), p)))
        .collect();

    for (id, pos) in &placed {
        if pos.right() > columns {
            issues.push(ValidationIssue::OutOfBounds {
                id: id.to_string(),
                x: pos.x,
                width: pos.width,
                columns,
            });
        }
    }

    for (i, (first, a)) in placed.iter().enumerate() {
        for (second, b) in &placed[i + 1..] {
            if a.overlaps(b) {
                issues.push(ValidationIssue::Overlap {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn component(id: &str, kind: &str) -> Value {
        json!({"id": id, "type": kind, "title": "Title", "dataMapping": {}})
    }

    #[test]
    fn test_valid_spec() {
        let spec = validate(&json!({
            "components": [
                {"id": "metric_1", "type": "metric", "title": "Revenue", "dataMapping": {"value": "revenue"}},
                {"id": "chart-2", "type": "line", "title": "Trend", "dataMapping": {"xAxis": "date", "yAxis": "revenue"}, "description": "Daily"}
            ]
        }))
        .unwrap();
        assert_eq!(spec.components.len(), 2);
        assert_eq!(spec.components[1].component_type, ComponentType::Line);
        assert_eq!(spec.components[1].description.as_deref(), Some("Daily"));
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = validate(&json!({
            "components": [component("chart_1", "bar"), component("chart_1", "line")]
        }))
        .unwrap_err();
        assert_eq!(err.issues, vec![ValidationIssue::DuplicateIds(vec!["chart_1".to_string()])]);
        assert!(err.to_string().contains("chart_1"));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = validate(&json!({
            "components": [{"id": "a", "type": "bar"}]
        }))
        .unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                ValidationIssue::MissingField { index: 0, field: "title" },
                ValidationIssue::MissingField { index: 0, field: "dataMapping" },
            ]
        );
    }

    #[test]
    fn test_structural_failures() {
        assert_eq!(validate(&json!([])).unwrap_err().issues, vec![ValidationIssue::NotAnObject]);
        assert_eq!(validate(&json!({})).unwrap_err().issues, vec![ValidationIssue::MissingComponents]);
        assert_eq!(
            validate(&json!({"components": []})).unwrap_err().issues,
            vec![ValidationIssue::NoComponents]
        );
        assert_eq!(
            validate(&json!({"components": [1]})).unwrap_err().issues,
            vec![ValidationIssue::ComponentNotObject { index: 0 }]
        );
    }

    #[test]
    fn test_type_normalization() {
        let spec = validate(&json!({
            "components": [component("a", "horizontal_bar"), component("b", "PIE")]
        }))
        .unwrap();
        assert_eq!(spec.components[0].component_type, ComponentType::HorizontalBar);
        assert_eq!(spec.components[1].component_type, ComponentType::Pie);
    }

    #[test]
    fn test_unknown_type_rejected_by_enum() {
        let err = validate(&json!({"components": [component("a", "donut")]})).unwrap_err();
        assert_eq!(
            err.issues,
            vec![ValidationIssue::UnknownType { id: "a".to_string(), value: "donut".to_string() }]
        );
    }

    #[test]
    fn test_malformed_ids() {
        let err = validate(&json!({
            "components": [component("has space", "bar"), component("", "bar")]
        }))
        .unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                ValidationIssue::MalformedId { index: 0, id: "has space".to_string() },
                ValidationIssue::MalformedId { index: 1, id: String::new() },
            ]
        );
    }

    #[test]
    fn test_empty_title_and_field_reference() {
        let err = validate(&json!({
            "components": [
                {"id": "a", "type": "bar", "title": "  ", "dataMapping": {"xAxis": "", "value": null, "series": ["ok", " "]}}
            ]
        }))
        .unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                ValidationIssue::EmptyTitle { id: "a".to_string() },
                ValidationIssue::EmptyFieldReference { id: "a".to_string(), key: "xAxis" },
                ValidationIssue::EmptyFieldReference { id: "a".to_string(), key: "series" },
            ]
        );
    }

    #[test]
    fn test_mapping_with_wrong_shape() {
        let err = validate(&json!({
            "components": [{"id": "a", "type": "bar", "title": "T", "dataMapping": {"xAxis": 3}}]
        }))
        .unwrap_err();
        assert!(matches!(err.issues[0], ValidationIssue::InvalidMapping { .. }));
    }

    #[test]
    fn test_positions_out_of_bounds_and_overlap() {
        let err = validate(&json!({
            "layout": {"columns": 12, "rows": 4},
            "components": [
                {"id": "a", "type": "bar", "title": "A", "dataMapping": {}, "position": {"x": 0, "y": 0, "width": 6, "height": 2}},
                {"id": "b", "type": "bar", "title": "B", "dataMapping": {}, "position": {"x": 4, "y": 1, "width": 6, "height": 2}},
                {"id": "c", "type": "bar", "title": "C", "dataMapping": {}, "position": {"x": 10, "y": 3, "width": 4, "height": 1}}
            ]
        }))
        .unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                ValidationIssue::OutOfBounds { id: "c".to_string(), x: 10, width: 4, columns: 12 },
                ValidationIssue::Overlap { first: "a".to_string(), second: "b".to_string() },
            ]
        );
    }

    #[test]
    fn test_adjacent_positions_are_valid() {
        let spec = validate(&json!({
            "components": [
                {"id": "a", "type": "bar", "title": "A", "dataMapping": {}, "position": {"x": 0, "y": 0, "width": 6, "height": 2}},
                {"id": "b", "type": "pie", "title": "B", "dataMapping": {}, "position": {"x": 6, "y": 0, "width": 6, "height": 2}}
            ]
        }))
        .unwrap();
        assert!(spec.layout.is_none());
    }

    #[test]
    fn test_invalid_layout_and_span() {
        let err = validate(&json!({
            "layout": {"columns": 30, "rows": 0},
            "components": [
                {"id": "a", "type": "bar", "title": "A", "dataMapping": {}, "position": {"x": 0, "y": 0, "width": 0, "height": 13}}
            ]
        }))
        .unwrap_err();
        assert_eq!(err.issues.len(), 4);
    }

    #[test]
    fn test_styling_theme_and_metadata_pass_through() {
        let spec = validate(&json!({
            "metadata": {"title": "Sales", "apiEndpoint": "https://example.com/sales"},
            "theme": {"primaryColor": "#111111"},
            "components": [
                {"id": "a", "type": "bar", "title": "A", "dataMapping": {}, "styling": {"colors": ["#ff0000"], "fontSize": 14}}
            ]
        }))
        .unwrap();
        assert_eq!(spec.metadata.as_ref().map(|m| m.title.as_str()), Some("Sales"));
        assert_eq!(spec.theme.as_ref().map(|t| t.text_color.as_str()), Some("#f4f4f5"));
        assert_eq!(spec.components[0].styling.as_ref().and_then(|s| s.font_size), Some(14));
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn test_bad_styling_and_metadata() {
        let err = validate(&json!({
            "metadata": {"title": " ", "apiEndpoint": "https://example.com"},
            "theme": {"primaryColor": 7},
            "components": [
                {"id": "a", "type": "bar", "title": "A", "dataMapping": {}, "styling": {"fontSize": 100}},
                {"id": "b", "type": "bar", "title": "B", "dataMapping": {}, "styling": {"borderRadius": -1}}
            ]
        }))
        .unwrap_err();
        assert_eq!(err.issues.len(), 4);
        assert_eq!(
            err.issues[0],
            ValidationIssue::InvalidMetadata("title must not be empty".to_string())
        );
        assert!(matches!(err.issues[1], ValidationIssue::InvalidTheme(_)));
        assert!(matches!(&err.issues[2], ValidationIssue::InvalidStyling { id, .. } if id == "a"));
        assert!(matches!(&err.issues[3], ValidationIssue::InvalidStyling { id, .. } if id == "b"));
    }

    proptest! {
        #[test]
        fn prop_any_repeated_id_is_named(
            ids in prop::collection::vec("[a-z]{1,3}", 1..8),
            dup_index in 0usize..8,
        ) {
            let mut ids = ids;
            let dup = ids[dup_index % ids.len()].clone();
            ids.push(dup.clone());
            let components: Vec<Value> = ids.iter().map(|id| component(id, "table")).collect();
            let err = validate(&json!({"components": components})).unwrap_err();
            let named = err.issues.iter().any(|issue| matches!(
                issue,
                ValidationIssue::DuplicateIds(found) if found.contains(&dup)
            ));
            prop_assert!(named);
        }
    }
}
