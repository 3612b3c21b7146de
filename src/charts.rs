//! Chart-kind recommendations from field roles.

use indexmap::{IndexMap, IndexSet};

use crate::classify::Classification;
use crate::spec::ComponentType;

/// A categorical field at or below this cardinality is chartable as bar/pie.
const LOW_CARDINALITY: usize = 10;

/// Ordered, de-duplicated chart suggestions. Always ends with `metric` and `table`.
pub fn recommend_charts(
    roles: &Classification,
    cardinality: &IndexMap<String, usize>,
) -> Vec<ComponentType> {
    let mut charts: IndexSet<ComponentType> = IndexSet::new();

    if roles.geo.is_complete() {
        charts.insert(ComponentType::Globe);
    }

    let has_numeric = !roles.numeric_fields.is_empty();

    if has_numeric && !roles.time_fields.is_empty() {
        charts.extend([ComponentType::Line, ComponentType::Area]);
    }

    let low_cardinality_category = roles
        .categorical_fields
        .iter()
        .any(|f| cardinality.get(f).is_some_and(|&n| n <= LOW_CARDINALITY));
    if has_numeric && low_cardinality_category {
        charts.extend([ComponentType::Bar, ComponentType::Pie]);
    }

    if roles.numeric_fields.len() >= 2 {
        charts.insert(ComponentType::Scatter);
    }

    charts.insert(ComponentType::Metric);
    charts.insert(ComponentType::Table);

    charts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, GeoFields};
    use crate::stats::{cardinality, columns};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn recommend(records: &[Value]) -> Vec<ComponentType> {
        let cols = columns(records);
        recommend_charts(&classify(&cols), &cardinality(&cols))
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_time_series() {
        let charts = recommend(&[
            json!({"date": "2024-01-01", "revenue": 100}),
            json!({"date": "2024-01-02", "revenue": 150}),
        ]);
        assert_eq!(
            charts,
            vec![ComponentType::Line, ComponentType::Area, ComponentType::Metric, ComponentType::Table]
        );
    }

    #[test]
    fn test_globe_first() {
        let charts = recommend(&[json!({"lat": 37.7, "lon": -122.4, "count": 5})]);
        assert_eq!(charts[0], ComponentType::Globe);
        assert_eq!(charts.last(), Some(&ComponentType::Table));
    }

    #[test]
    fn test_bar_needs_low_cardinality_category() {
        let roles = Classification {
            numeric_fields: strings(&["amount"]),
            categorical_fields: strings(&["segment"]),
            ..Default::default()
        };
        let mut card = IndexMap::new();
        card.insert("segment".to_string(), 11);
        assert_eq!(recommend_charts(&roles, &card), vec![ComponentType::Metric, ComponentType::Table]);

        card.insert("segment".to_string(), 10);
        assert_eq!(
            recommend_charts(&roles, &card),
            vec![ComponentType::Bar, ComponentType::Pie, ComponentType::Metric, ComponentType::Table]
        );
    }

    #[test]
    fn test_scatter_with_two_numeric() {
        let roles = Classification {
            numeric_fields: strings(&["a", "b"]),
            ..Default::default()
        };
        assert_eq!(
            recommend_charts(&roles, &IndexMap::new()),
            vec![ComponentType::Scatter, ComponentType::Metric, ComponentType::Table]
        );
    }

    #[test]
    fn test_single_geo_axis_is_not_globe() {
        let roles = Classification {
            numeric_fields: strings(&["lat"]),
            geo: GeoFields { latitude: strings(&["lat"]), longitude: vec![] },
            ..Default::default()
        };
        assert!(!recommend_charts(&roles, &IndexMap::new()).contains(&ComponentType::Globe));
    }

    proptest! {
        #[test]
        fn prop_always_metric_and_table_without_duplicates(
            numeric in prop::collection::vec("[a-z]{1,6}", 0..4),
            time in prop::collection::vec("[a-z]{1,6}", 0..3),
            categorical in prop::collection::vec("[a-z]{1,6}", 0..3),
            card in 0usize..20,
            lat in any::<bool>(),
            lon in any::<bool>(),
        ) {
            let cardinality: IndexMap<String, usize> =
                categorical.iter().map(|c| (c.clone(), card)).collect();
            let roles = Classification {
                numeric_fields: numeric,
                time_fields: time,
                categorical_fields: categorical,
                geo: GeoFields {
                    latitude: if lat { strings(&["lat"]) } else { vec![] },
                    longitude: if lon { strings(&["lon"]) } else { vec![] },
                },
                ..Default::default()
            };
            let charts = recommend_charts(&roles, &cardinality);
            prop_assert!(charts.contains(&ComponentType::Metric));
            prop_assert!(charts.contains(&ComponentType::Table));
            prop_assert_eq!(charts.contains(&ComponentType::Globe), lat && lon);
            let unique: IndexSet<_> = charts.iter().collect();
            prop_assert_eq!(unique.len(), charts.len());
        }
    }
}
