//! Dashboard specification types.
//!
//! Field names on the wire match what renderers consume (`dataMapping`,
//! `horizontalBar`, ...). A value of these types is only handed out after
//! passing [`crate::validate`].

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::classify::FieldType;

/// Visualization kind of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentType {
    Line,
    Bar,
    HorizontalBar,
    Pie,
    Area,
    Table,
    Metric,
    Scatter,
    Heatmap,
    Globe,
}

impl ComponentType {
    pub const ALL: [ComponentType; 10] = [
        ComponentType::Line,
        ComponentType::Bar,
        ComponentType::HorizontalBar,
        ComponentType::Pie,
        ComponentType::Area,
        ComponentType::Table,
        ComponentType::Metric,
        ComponentType::Scatter,
        ComponentType::Heatmap,
        ComponentType::Globe,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::Line => "line",
            ComponentType::Bar => "bar",
            ComponentType::HorizontalBar => "horizontalBar",
            ComponentType::Pie => "pie",
            ComponentType::Area => "area",
            ComponentType::Table => "table",
            ComponentType::Metric => "metric",
            ComponentType::Scatter => "scatter",
            ComponentType::Heatmap => "heatmap",
            ComponentType::Globe => "globe",
        }
    }

    /// Exact wire-name lookup.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Lookup ignoring case, underscores, hyphens and spaces
    /// (`horizontal_bar` and `HORIZONTALBAR` both give `horizontalBar`).
    pub fn from_loose(s: &str) -> Option<Self> {
        let wanted = loose_key(s);
        Self::ALL.into_iter().find(|t| loose_key(t.as_str()) == wanted)
    }
}

fn loose_key(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field reference or several (e.g. multiple y-axis series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRef {
    One(String),
    Many(Vec<String>),
}

impl FieldRef {
    pub fn names(&self) -> Vec<&str> {
        match self {
            FieldRef::One(s) => vec![s.as_str()],
            FieldRef::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

/// Role-keyed references from a component to data fields. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<FieldRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl DataMapping {
    /// Every field reference present, paired with its wire key.
    pub fn references(&self) -> Vec<(&'static str, &str)> {
        let mut refs = Vec::new();
        let singles: [(&'static str, &Option<String>); 10] = [
            ("xAxis", &self.x_axis),
            ("xKey", &self.x_key),
            ("yKey", &self.y_key),
            ("value", &self.value),
            ("valueKey", &self.value_key),
            ("label", &self.label),
            ("labelKey", &self.label_key),
            ("category", &self.category),
            ("lat", &self.lat),
            ("lon", &self.lon),
        ];
        for (key, field) in singles {
            if let Some(name) = field {
                refs.push((key, name.as_str()));
            }
        }
        if let Some(y) = &self.y_axis {
            refs.extend(y.names().into_iter().map(|n| ("yAxis", n)));
        }
        let lists: [(&'static str, &Option<Vec<String>>); 3] = [
            ("yKeys", &self.y_keys),
            ("series", &self.series),
            ("columns", &self.columns),
        ];
        for (key, list) in lists {
            if let Some(names) = list {
                refs.extend(names.iter().map(|n| (key, n.as_str())));
            }
        }
        refs
    }
}

/// Placement on the layout grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Position {
    pub fn overlaps(&self, other: &Position) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

/// Grid configuration for positioned components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_columns")]
    pub columns: u32,
    pub rows: u32,
    #[serde(default = "default_spacing")]
    pub gap: u32,
    #[serde(default = "default_spacing")]
    pub padding: u32,
}

pub fn default_columns() -> u32 {
    12
}

fn default_spacing() -> u32 {
    16
}

/// A single visualization on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardComponent {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub title: String,
    pub data_mapping: DataMapping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styling: Option<Styling>,
}

impl DashboardComponent {
    pub fn new(
        id: impl Into<String>,
        component_type: ComponentType,
        title: impl Into<String>,
        data_mapping: DataMapping,
    ) -> Self {
        Self {
            id: id.into(),
            component_type,
            title: title.into(),
            data_mapping,
            description: None,
            position: None,
            styling: None,
        }
    }
}

/// Presentation hints for one component. Renderers may ignore any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Styling {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 8..=72;

/// Dashboard-wide colors and font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_secondary_color")]
    pub secondary_color: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_text_color")]
    pub text_color: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            primary_color: default_primary_color(),
            secondary_color: default_secondary_color(),
            background_color: default_background_color(),
            text_color: default_text_color(),
            font_family: default_font_family(),
        }
    }
}

fn default_primary_color() -> String {
    "#3b82f6".to_string()
}

fn default_secondary_color() -> String {
    "#a855f7".to_string()
}

fn default_background_color() -> String {
    "#18181b".to_string()
}

fn default_text_color() -> String {
    "#f4f4f5".to_string()
}

fn default_font_family() -> String {
    "Inter, sans-serif".to_string()
}

/// Describes where a dashboard came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub api_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_schema: Option<IndexMap<String, FieldType>>,
    /// Seconds between refreshes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u64>,
}

/// The renderer-ready dashboard document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSpecification {
    pub components: Vec<DashboardComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSettings>,
}
