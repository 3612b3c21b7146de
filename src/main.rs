//! GenDash Engine - profiles record collections and serves dashboard specifications.

mod charts;
mod classify;
mod config;
mod fallback;
mod flatten;
mod generator;
mod metrics;
mod openrouter;
mod profile;
mod sources;
mod spec;
mod stats;
mod validate;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use config::EngineConfig;
use generator::{LlmSpecGenerator, SpecGenerator};
use profile::DataProfile;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sources::{SourceClient, SourceError};
use spec::{DashboardSpecification, Metadata};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    generator: Option<Arc<dyn SpecGenerator>>,
    sources: SourceClient,
    dashboards: Arc<RwLock<DashboardStore>>,
}

/// Generated dashboards in insertion order, oldest evicted past `capacity`.
struct DashboardStore {
    entries: IndexMap<String, StoredDashboard>,
    capacity: usize,
}

impl DashboardStore {
    fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, dashboard: StoredDashboard) {
        self.entries.shift_remove(&dashboard.dashboard_id);
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                info!("Evicted dashboard {} from the store", evicted);
            }
        }
        self.entries.insert(dashboard.dashboard_id.clone(), dashboard);
    }

    fn get(&self, id: &str) -> Option<&StoredDashboard> {
        self.entries.get(id)
    }
}

/// A generated dashboard kept until evicted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredDashboard {
    dashboard_id: String,
    api_url: String,
    spec: DashboardSpecification,
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    preferences: Option<Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "gendash_engine=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;

    let generator: Option<Arc<dyn SpecGenerator>> = match LlmSpecGenerator::from_config(&config) {
        Some(generator) => {
            info!("Spec generator initialized: model={}", generator.name());
            Some(Arc::new(generator))
        }
        None => {
            warn!("OPENROUTER_API_KEY not set, every dashboard will use the fallback template");
            None
        }
    };

    let state = AppState {
        generator,
        sources: SourceClient::new(config.fetch_timeout)?,
        dashboards: Arc::new(RwLock::new(DashboardStore::new(config.max_dashboards))),
    };

    let app = router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate-dashboard", post(generate_dashboard))
        .route("/api/dashboard/:id", get(get_dashboard))
        .route("/api/analyze-data", post(analyze_data))
        .route("/api/analyze-records", post(analyze_records))
        .route("/api/validate-spec", post(validate_spec))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => {
                error!("Internal error: {}", m);
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(json!({"success": false, "error": message}))).into_response()
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        warn!("Source fetch failed: {}", e);
        ApiError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "gendash-engine",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    api_url: Option<String>,
    #[serde(default)]
    preferences: Option<Value>,
}

/// Fetch, profile, propose, validate, store.
async fn generate_dashboard(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let api_url = require_api_url(request.api_url)?;

    let records = state.sources.fetch_records(&api_url).await?;
    let profile = profile_records(records).await?;

    let candidate = match &state.generator {
        Some(generator) => match generator.propose(&profile).await {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!("Generator {} failed, using fallback: {:#}", generator.name(), e);
                None
            }
        },
        None => None,
    };

    let (mut spec, source) = fallback::resolve(candidate.as_ref(), &profile);
    if spec.metadata.is_none() {
        spec.metadata = Some(source_metadata(&api_url, &profile));
    }
    let dashboard_id = dashboard_id(&api_url);

    info!(
        "Dashboard {} ready: {} components from {} ({})",
        dashboard_id,
        spec.components.len(),
        api_url,
        source.as_str()
    );

    let stored = StoredDashboard {
        dashboard_id: dashboard_id.clone(),
        api_url,
        spec: spec.clone(),
        source: source.as_str(),
        preferences: request.preferences,
    };
    state
        .dashboards
        .write()
        .map_err(|_| ApiError::Internal("Dashboard store is unavailable".to_string()))?
        .insert(stored);

    Ok(Json(json!({
        "success": true,
        "dashboardId": dashboard_id,
        "spec": spec,
        "source": source.as_str(),
    })))
}

/// Get a stored dashboard by ID.
async fn get_dashboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let dashboards = state
        .dashboards
        .read()
        .map_err(|_| ApiError::Internal("Dashboard store is unavailable".to_string()))?;
    let stored = dashboards
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Dashboard not found: {}", id)))?;

    let body = serde_json::to_value(DashboardResponse {
        success: true,
        dashboard: stored,
    })
    .map_err(|e| ApiError::Internal(format!("Failed to serialize dashboard: {}", e)))?;
    Ok(Json(body))
}

#[derive(Serialize)]
struct DashboardResponse<'a> {
    success: bool,
    #[serde(flatten)]
    dashboard: &'a StoredDashboard,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    api_url: Option<String>,
}

/// Profile a remote source without generating a dashboard.
async fn analyze_data(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let api_url = require_api_url(request.api_url)?;
    let records = state.sources.fetch_records(&api_url).await?;
    let analysis = profile_records(records).await?;
    Ok(Json(json!({"success": true, "analysis": analysis})))
}

#[derive(Deserialize)]
struct RecordsRequest {
    records: Vec<Value>,
}

/// Profile records supplied inline.
async fn analyze_records(
    body: Result<Json<RecordsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let analysis = profile_records(request.records).await?;
    Ok(Json(json!({"success": true, "analysis": analysis})))
}

#[derive(Deserialize)]
struct ValidateRequest {
    spec: Value,
    #[serde(default)]
    records: Vec<Value>,
}

/// Validate a candidate; on rejection return the reasons and a fallback.
async fn validate_spec(
    body: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    match validate::validate(&request.spec) {
        Ok(spec) => Ok(Json(json!({"success": true, "valid": true, "spec": spec}))),
        Err(invalid) => {
            warn!("Submitted specification rejected: {}", invalid);
            let profile = profile_records(request.records).await?;
            let fallback = fallback::validate_or_fallback(None, &profile);
            Ok(Json(json!({
                "success": true,
                "valid": false,
                "errors": invalid.reasons(),
                "fallback": fallback,
            })))
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn require_api_url(api_url: Option<String>) -> Result<String, ApiError> {
    match api_url.map(|u| u.trim().to_string()) {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(ApiError::BadRequest("apiUrl is required".to_string())),
    }
}

/// Profiling is CPU-bound; keep it off the async workers.
async fn profile_records(records: Vec<Value>) -> Result<DataProfile, ApiError> {
    tokio::task::spawn_blocking(move || profile::profile(&records))
        .await
        .map_err(|e| ApiError::Internal(format!("Profiling task failed: {}", e)))
}

/// Describes the source a dashboard was generated from.
fn source_metadata(api_url: &str, profile: &DataProfile) -> Metadata {
    Metadata {
        title: "Generated Dashboard".to_string(),
        description: None,
        api_endpoint: api_url.to_string(),
        created_at: Some(Utc::now()),
        data_schema: Some(profile.data_types.clone()),
        refresh_interval: None,
    }
}

/// First 12 hex chars of SHA-256 over the URL and the current time.
fn dashboard_id(api_url: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", api_url, nanos).as_bytes());
    let mut id = format!("{:x}", hasher.finalize());
    id.truncate(12);
    id
}
