//! Deterministic dashboard construction from a profile.
//!
//! This is the availability guarantee: it needs nothing but the profile and
//! always yields a specification that passes validation.

use serde_json::Value;
use tracing::warn;

use crate::profile::DataProfile;
use crate::spec::{
    ComponentType, DashboardComponent, DashboardSpecification, DataMapping, FieldRef,
};
use crate::validate::validate;

/// Metric cards emitted at most.
const MAX_METRIC_CARDS: usize = 3;

/// Build a dashboard straight from the profile.
///
/// Emission order and ids: `metric_1..=3`, `chart_1` (line), `chart_2` (bar),
/// `table_1`. The table is always present.
pub fn build_fallback(profile: &DataProfile) -> DashboardSpecification {
    let mut components = Vec::new();

    let key_metrics = profile.key_metrics.iter().filter(usable);
    for (i, metric) in key_metrics.take(MAX_METRIC_CARDS).enumerate() {
        components.push(DashboardComponent::new(
            format!("metric_{}", i + 1),
            ComponentType::Metric,
            display_title(metric),
            DataMapping {
                value: Some(metric.clone()),
                ..Default::default()
            },
        ));
    }

    if profile.is_time_series {
        if let (Some(time), Some(numeric)) =
            (first_usable(&profile.time_fields), first_usable(&profile.numeric_fields))
        {
            components.push(DashboardComponent::new(
                "chart_1",
                ComponentType::Line,
                "Trend Over Time",
                axis_mapping(time, numeric),
            ));
        }
    }

    if let (Some(category), Some(numeric)) = (
        first_usable(&profile.categorical_fields),
        first_usable(&profile.numeric_fields),
    ) {
        components.push(DashboardComponent::new(
            "chart_2",
            ComponentType::Bar,
            "Comparison by Category",
            axis_mapping(category, numeric),
        ));
    }

    components.push(DashboardComponent::new(
        "table_1",
        ComponentType::Table,
        "Data Table",
        DataMapping::default(),
    ));

    DashboardSpecification {
        components,
        layout: None,
        metadata: None,
        theme: None,
    }
}

/// Validate `candidate` if there is one; otherwise, or on rejection, build the
/// fallback from `profile`.
pub fn validate_or_fallback(candidate: Option<&Value>, profile: &DataProfile) -> DashboardSpecification {
    resolve(candidate, profile).0
}

/// Where a resolved specification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecSource {
    Candidate,
    Fallback,
}

impl SpecSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecSource::Candidate => "generated",
            SpecSource::Fallback => "fallback",
        }
    }
}

/// Like [`validate_or_fallback`], also reporting which path was taken.
pub fn resolve(candidate: Option<&Value>, profile: &DataProfile) -> (DashboardSpecification, SpecSource) {
    let Some(candidate) = candidate else {
        return (build_fallback(profile), SpecSource::Fallback);
    };
    match validate(candidate) {
        Ok(spec) => (spec, SpecSource::Candidate),
        Err(invalid) => {
            warn!("Candidate specification rejected, using fallback: {}", invalid);
            (build_fallback(profile), SpecSource::Fallback)
        }
    }
}

fn axis_mapping(x: &str, y: &str) -> DataMapping {
    DataMapping {
        x_axis: Some(x.to_string()),
        y_axis: Some(FieldRef::One(y.to_string())),
        ..Default::default()
    }
}

/// `total_revenue` -> `Total Revenue`: underscores become spaces and each run
/// of letters is capitalized. Falls back to the raw name if nothing printable
/// is left.
fn display_title(field: &str) -> String {
    let mut title = String::with_capacity(field.len());
    let mut in_word = false;
    for c in field.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if in_word {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            title.push(c);
            in_word = false;
        }
    }
    if title.trim().is_empty() {
        field.to_string()
    } else {
        title
    }
}

/// Blank field names cannot be referenced from a component.
fn usable(field: &&String) -> bool {
    !field.trim().is_empty()
}

fn first_usable(fields: &[String]) -> Option<&String> {
    fields.iter().find(usable)
}
