//! Candidate specification generation.
//!
//! A [`SpecGenerator`] turns a [`DataProfile`] into an *unvalidated* candidate
//! document. Whatever it returns goes through the validator before anyone
//! sees it, so implementations are free to be wrong.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::openrouter::{Message, OpenRouterClient};
use crate::profile::DataProfile;

/// Proposes a dashboard specification for a profiled record collection.
#[async_trait]
pub trait SpecGenerator: Send + Sync {
    fn name(&self) -> &str;
    async fn propose(&self, profile: &DataProfile) -> Result<Value>;
}

// ============================================================================
// Prompt construction
// ============================================================================

const SAMPLE_ROWS: usize = 2;
const MAX_SAMPLE_FIELDS: usize = 4;
const MAX_SAMPLE_CHARS: usize = 30;
const TRUNCATED_CHARS: usize = 27;

const SYSTEM_PROMPT: &str =
    "You design analytics dashboards. You answer with a single JSON object and nothing else.";

const PROMPT_TEMPLATE: &str = r#"Generate dashboard components from API data. Select 2-4 chart types from: line, bar, horizontalBar, pie, area, scatter, metric, table, globe.

Data Summary:
Fields: {field_summary}
Sample: {sample_data}
Suggested: {recommended}

Field tags: T=time, N=numeric, C=categorical, K=key metric.

Chart Types (use EXACT type names):
- line / area: xKey (time/seq), yKeys[] (numeric)
- bar: xKey (cat), yKey (num)
- horizontalBar: yKey (cat), xKey (num) - type must be "horizontalBar" exactly
- pie: labelKey (cat), valueKey (num)
- scatter: xKey (num), yKey (num)
- metric: value (numeric field)
- table: columns[] (optional)
- globe: lat (latitude num), lon (longitude num), value (num), label (opt string). Use when data has lat/lon/coordinates.

Rules:
1. Use exact field names from data
2. Output ONLY valid JSON - no markdown, no code blocks, no explanations
3. Each component: id, type, title, dataMapping
4. Component ids are unique and use only letters, digits, '_' and '-'
5. No layout/styling/position
6. Prefer globe if fields contain: lat/latitude, lon/longitude/lng/long, coordinates

Output format: {"components": [{"id": "...", "type": "...", "title": "...", "dataMapping": {...}}]}"#;

/// Render the user prompt for `profile`.
pub fn build_prompt(profile: &DataProfile) -> String {
    let recommended: Vec<&str> = profile.recommended_charts.iter().map(|c| c.as_str()).collect();
    PROMPT_TEMPLATE
        .replace("{field_summary}", &field_summary(profile))
        .replace("{sample_data}", &compact_sample(profile))
        .replace("{recommended}", &recommended.join(", "))
}

/// `field:type[TNCK]` per field, comma separated, in profile order.
pub fn field_summary(profile: &DataProfile) -> String {
    profile
        .data_types
        .iter()
        .map(|(field, field_type)| {
            let tags: String = [
                ('T', &profile.time_fields),
                ('N', &profile.numeric_fields),
                ('C', &profile.categorical_fields),
                ('K', &profile.key_metrics),
            ]
            .into_iter()
            .filter(|(_, fields)| fields.contains(field))
            .map(|(tag, _)| tag)
            .collect();

            if tags.is_empty() {
                format!("{}:{}", field, field_type.as_str())
            } else {
                format!("{}:{}[{}]", field, field_type.as_str(), tags)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// First sample rows restricted to the fields most worth showing, as compact JSON.
pub fn compact_sample(profile: &DataProfile) -> String {
    let key_fields: Vec<&String> = profile
        .time_fields
        .iter()
        .take(1)
        .chain(profile.numeric_fields.iter().take(2))
        .chain(profile.categorical_fields.iter().take(1))
        .take(MAX_SAMPLE_FIELDS)
        .collect();

    let rows: Vec<Value> = profile
        .sample_data
        .iter()
        .take(SAMPLE_ROWS)
        .map(|row| match row {
            Value::Object(record) => Value::Object(
                record
                    .iter()
                    .filter(|(k, _)| key_fields.contains(k))
                    .map(|(k, v)| (k.clone(), truncate_value(v)))
                    .collect::<Map<_, _>>(),
            ),
            other => other.clone(),
        })
        .collect();

    serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
}

fn truncate_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_SAMPLE_CHARS => {
            let head: String = s.chars().take(TRUNCATED_CHARS).collect();
            Value::String(format!("{}...", head))
        }
        other => other.clone(),
    }
}

// ============================================================================
// Response parsing
// ============================================================================

/// Pull a JSON document out of a model reply.
///
/// Accepts a ```json fence, a bare fence, the whole reply, or failing all of
/// those the outermost `{...}` span.
pub fn parse_llm_json(response: &str) -> Result<Value> {
    let json_str = if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    };

    if let Ok(value) = serde_json::from_str(json_str) {
        return Ok(value);
    }

    let outer = outermost_object(response).with_context(|| {
        format!("No JSON object in response: {}", preview(response))
    })?;
    serde_json::from_str(outer).with_context(|| format!("Invalid JSON syntax: {}", preview(outer)))
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

// ============================================================================
// OpenRouter-backed generator
// ============================================================================

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Asks a chat model for a candidate specification, retrying with
/// exponential backoff.
pub struct LlmSpecGenerator {
    client: OpenRouterClient,
    attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl LlmSpecGenerator {
    pub fn new(client: OpenRouterClient, attempts: u32) -> Self {
        Self {
            client,
            attempts: attempts.max(1),
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &EngineConfig) -> Option<Self> {
        let api_key = config.openrouter_api_key.as_ref()?;
        let mut client = OpenRouterClient::new(api_key.clone()).with_model(config.model.clone());
        if let Some(endpoint) = &config.openrouter_url {
            client = client.with_endpoint(endpoint.clone());
        }
        Some(Self::new(client, config.generation_attempts))
    }

    async fn attempt(&self, prompt: &str) -> Result<Value> {
        let reply = self
            .client
            .chat(vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)])
            .await?;
        parse_llm_json(&reply)
    }
}

#[async_trait]
impl SpecGenerator for LlmSpecGenerator {
    fn name(&self) -> &str {
        self.client.model()
    }

    async fn propose(&self, profile: &DataProfile) -> Result<Value> {
        let prompt = build_prompt(profile);
        let mut delay = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.attempt(&prompt).await {
                Ok(candidate) => {
                    info!("Received candidate specification on attempt {}", attempt);
                    return Ok(candidate);
                }
                Err(e) if attempt < self.attempts => {
                    warn!(
                        "Generation attempt {}/{} failed: {:#}. Retrying in {:?}",
                        attempt, self.attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_backoff);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!("Generation failed after {} attempts", attempt)));
                }
            }
        }
    }
}
