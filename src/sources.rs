//! Record collection retrieval.
//!
//! Fetches a caller-supplied URL and turns the body into a flat list of
//! records: CSV rows become objects keyed by header, JSON is unwrapped from
//! the common envelope shapes (`data`, `results`, `items`, GeoJSON `features`).

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Number, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Envelope keys checked on an object root, highest priority first.
const WRAPPER_KEYS: [&str; 4] = ["data", "results", "items", "features"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch data from {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("data source {url} responded with HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV has no header row")]
    NoHeaders,

    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data source returned empty or invalid data")]
    Empty,
}

/// HTTP client for record sources.
#[derive(Clone)]
pub struct SourceClient {
    client: Client,
}

impl SourceClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }

    /// GET `url` and decode its body into records. Never returns an empty list.
    pub async fn fetch_records(&self, url: &str) -> Result<Vec<Value>, SourceError> {
        info!("Fetching records from {}", url);

        let request_error = |source: reqwest::Error| SourceError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json, text/csv;q=0.9, */*;q=0.8")
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        let body = response.bytes().await.map_err(request_error)?;

        let records = if is_csv(content_type.as_deref(), url) {
            parse_csv_records(&body)?
        } else {
            unwrap_records(serde_json::from_slice(&body)?)
        };

        if records.is_empty() {
            return Err(SourceError::Empty);
        }

        debug!("Fetched {} records ({} bytes) from {}", records.len(), body.len(), url);
        Ok(records)
    }
}

/// CSV when the content type says so or the URL path ends in `.csv`.
pub fn is_csv(content_type: Option<&str>, url: &str) -> bool {
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("csv")) {
        return true;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".csv")
}

/// Parse a CSV body with a header row. Short rows are padded with nulls,
/// surplus cells dropped.
pub fn parse_csv_records(data: &[u8]) -> Result<Vec<Value>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(SourceError::NoHeaders);
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let record: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), row.get(i).map(coerce_cell).unwrap_or(Value::Null)))
            .collect();
        records.push(Value::Object(record));
    }

    Ok(records)
}

/// Give a CSV cell its natural JSON type.
///
/// Empty -> null, `true`/`false` -> boolean, then integer, then finite float,
/// otherwise the original text.
pub fn coerce_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(cell.to_string())
}

/// Reduce a decoded JSON body to a record list.
pub fn unwrap_records(root: Value) -> Vec<Value> {
    let root = match root {
        Value::Object(mut map) => match WRAPPER_KEYS.iter().find_map(|key| map.remove(*key)) {
            Some(inner) => {
                debug!("Unwrapped records from envelope object");
                inner
            }
            None => Value::Object(map),
        },
        other => other,
    };

    match root {
        Value::Array(items) => items,
        Value::Object(map) => vec![Value::Object(map)],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::http::StatusCode as HttpStatus;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_coerce_cell() {
        assert_eq!(coerce_cell(""), Value::Null);
        assert_eq!(coerce_cell("  "), Value::Null);
        assert_eq!(coerce_cell("TRUE"), json!(true));
        assert_eq!(coerce_cell("false"), json!(false));
        assert_eq!(coerce_cell("42"), json!(42));
        assert_eq!(coerce_cell("-3.5"), json!(-3.5));
        assert_eq!(coerce_cell("NaN"), json!("NaN"));
        assert_eq!(coerce_cell("2024-01-01"), json!("2024-01-01"));
        assert_eq!(coerce_cell("N/A"), json!("N/A"));
    }

    #[test]
    fn test_parse_csv_records() {
        let csv = b"date,revenue,region,active\n2024-01-01,100,north,true\n2024-01-02,,south\n";
        let records = parse_csv_records(csv).unwrap();
        assert_eq!(
            records,
            vec![
                json!({"date": "2024-01-01", "revenue": 100, "region": "north", "active": true}),
                json!({"date": "2024-01-02", "revenue": null, "region": "south", "active": null}),
            ]
        );
    }

    #[test]
    fn test_parse_csv_header_only() {
        assert!(parse_csv_records(b"a,b\n").unwrap().is_empty());
    }

    #[test]
    fn test_is_csv() {
        assert!(is_csv(Some("text/csv; charset=utf-8"), "https://x.test/data"));
        assert!(is_csv(None, "https://x.test/export.CSV?token=1"));
        assert!(!is_csv(Some("application/json"), "https://x.test/data.json"));
        assert!(!is_csv(None, "https://x.test/csv/list"));
    }

    #[test]
    fn test_unwrap_priority() {
        let body = json!({"items": [1], "data": [{"a": 1}], "results": [2]});
        assert_eq!(unwrap_records(body), vec![json!({"a": 1})]);
    }

    #[test]
    fn test_unwrap_geojson_features() {
        let body = json!({"type": "FeatureCollection", "features": [{"properties": {"mag": 2.1}}]});
        assert_eq!(unwrap_records(body), vec![json!({"properties": {"mag": 2.1}})]);
    }

    #[test]
    fn test_unwrap_shapes() {
        assert_eq!(unwrap_records(json!({"a": 1})), vec![json!({"a": 1})]);
        assert_eq!(unwrap_records(json!({"data": {"a": 1}})), vec![json!({"a": 1})]);
        assert_eq!(unwrap_records(json!([{"a": 1}, {"a": 2}])).len(), 2);
        assert!(unwrap_records(json!("text")).is_empty());
        assert!(unwrap_records(json!({"data": null})).is_empty());
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_records_over_http() {
        let app = Router::new()
            .route("/json", get(|| async { Json(json!({"results": [{"n": 1}, {"n": 2}]})) }))
            .route(
                "/export",
                get(|| async { ([(header::CONTENT_TYPE, "text/csv")], "n,label\n1,a\n") }),
            )
            .route("/empty", get(|| async { Json(json!({"data": []})) }))
            .route(
                "/missing",
                get(|| async { (HttpStatus::NOT_FOUND, "gone").into_response() }),
            );
        let base = serve(app).await;
        let client = SourceClient::new(Duration::from_secs(5)).unwrap();

        let records = client.fetch_records(&format!("{}/json", base)).await.unwrap();
        assert_eq!(records, vec![json!({"n": 1}), json!({"n": 2})]);

        let records = client.fetch_records(&format!("{}/export", base)).await.unwrap();
        assert_eq!(records, vec![json!({"n": 1, "label": "a"})]);

        let err = client.fetch_records(&format!("{}/empty", base)).await.unwrap_err();
        assert!(matches!(err, SourceError::Empty));

        let err = client.fetch_records(&format!("{}/missing", base)).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }
}
