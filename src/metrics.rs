//! Headline ("key metric") selection among numeric fields.

use std::cmp::Ordering;

use crate::stats::{sample_variance, Column};

/// Field-name fragments that suggest a KPI.
const METRIC_KEYWORDS: &[&str] = &[
    "total", "sum", "count", "average", "avg", "mean", "revenue", "sales", "profit", "cost",
    "price", "amount", "value", "rate", "percentage", "score", "balance", "budget", "spend",
    "earning",
];

/// Number of fields picked by the variance ranking.
const VARIANCE_TOP_N: usize = 3;

/// Pick key metrics from `numeric_fields`.
///
/// Keyword matches win and are returned in field order, uncapped. Only when
/// nothing matches are the numeric fields ranked by descending sample
/// variance, fields without a variance last, top three kept.
pub fn identify_key_metrics(numeric_fields: &[String], columns: &[Column<'_>]) -> Vec<String> {
    let matched: Vec<String> = numeric_fields
        .iter()
        .filter(|field| {
            let lower = field.to_lowercase();
            METRIC_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .cloned()
        .collect();

    if !matched.is_empty() {
        return matched;
    }

    let mut ranked: Vec<(&String, Option<f64>)> = numeric_fields
        .iter()
        .map(|field| {
            let variance = columns
                .iter()
                .find(|c| c.name == field.as_str())
                .and_then(sample_variance);
            (field, variance)
        })
        .collect();

    // Stable sort keeps field order among ties.
    ranked.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    ranked
        .into_iter()
        .take(VARIANCE_TOP_N)
        .map(|(field, _)| field.clone())
        .collect()
}
