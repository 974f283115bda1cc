//! REST boundary (§6, §4.11). Handlers are thin: they translate HTTP
//! concerns into calls against the composition root's handles and
//! back. No business logic lives here.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use rvc_codec::ControlCommand;
use rvc_mapping::DeviceType;
use rvc_store::{BulkOptions, OperationStatus};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::state::AppState;
use super::ws;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/entities", get(list_entities))
        .route("/entities/{id}", get(get_entity))
        .route("/entities/{id}/history", get(entity_history))
        .route("/entities/{id}/control", post(control_entity))
        .route("/entities/bulk-control", post(bulk_control))
        .route("/entities/unmapped", get(unmapped_entities))
        .route("/entities/unknown-pgns", get(unknown_pgns))
        .route("/can/interfaces", get(can_interfaces))
        .route("/can/statistics", get(can_statistics))
        .route("/health", get(health))
        .route("/features", get(features))
        .route("/ws", get(ws::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct EntitiesQuery {
    device_type: Option<DeviceType>,
    area: Option<String>,
    protocol: Option<String>,
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    50
}

#[derive(Serialize)]
struct EntitiesResponse {
    entities: Vec<rvc_store::EntitySnapshot>,
    total_count: usize,
    page: usize,
    page_size: usize,
    has_next: bool,
    filters_applied: EntitiesQuery,
}

impl Serialize for EntitiesQuery {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("EntitiesQuery", 5)?;
        s.serialize_field("device_type", &self.device_type)?;
        s.serialize_field("area", &self.area)?;
        s.serialize_field("protocol", &self.protocol)?;
        s.serialize_field("page", &self.page)?;
        s.serialize_field("page_size", &self.page_size)?;
        s.end()
    }
}

async fn list_entities(State(state): State<AppState>, Query(query): Query<EntitiesQuery>) -> impl IntoResponse {
    let mut entities = state.entity_store.snapshot_all(query.device_type, query.area.clone()).await;
    if let Some(protocol) = &query.protocol {
        entities.retain(|e| &e.protocol == protocol);
    }
    entities.sort_by(|a, b| a.id.cmp(&b.id));

    let total_count = entities.len();
    let page = query.page.max(1);
    let page_size = query.page_size.max(1);
    let start = (page - 1) * page_size;
    let page_entities = entities.into_iter().skip(start).take(page_size).collect::<Vec<_>>();
    let has_next = start + page_entities.len() < total_count;

    Json(EntitiesResponse { entities: page_entities, total_count, page, page_size, has_next, filters_applied: query }).into_response()
}

async fn get_entity(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.entity_store.snapshot(&id).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => not_found(&id),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
    since: Option<u64>,
}

async fn entity_history(State(state): State<AppState>, Path(id): Path<String>, Query(query): Query<HistoryQuery>) -> impl IntoResponse {
    match state.entity_store.history(&id, query.limit, query.since).await {
        Some(history) => Json(history).into_response(),
        None => not_found(&id),
    }
}

async fn control_entity(State(state): State<AppState>, Path(id): Path<String>, Json(command): Json<ControlCommand>) -> impl IntoResponse {
    let started = std::time::Instant::now();
    match state.entity_store.control(&id, &command).await {
        Ok(()) => {
            let result = rvc_store::OperationResult::success(id, started.elapsed().as_millis() as u64);
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => {
            tracing::warn!(entity_id = %id, error = %err, error_code = ?rvc_store::ErrorCode::from(&err), "control command failed");
            let result = rvc_store::OperationResult::failed(id, rvc_store::ErrorCode::from(&err), err.to_string(), started.elapsed().as_millis() as u64);
            (StatusCode::OK, Json(result)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkControlRequest {
    entity_ids: Vec<String>,
    command: ControlCommand,
    #[serde(default)]
    ignore_errors: bool,
    timeout_seconds: Option<u64>,
}

async fn bulk_control(State(state): State<AppState>, Json(request): Json<BulkControlRequest>) -> impl IntoResponse {
    if request.entity_ids.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "entity_ids must not be empty"}))).into_response();
    }

    let options = BulkOptions {
        ignore_errors: request.ignore_errors,
        timeout_seconds: request.timeout_seconds.unwrap_or(state.default_bulk_timeout_secs),
        concurrency: state.default_bulk_concurrency,
        ..BulkOptions::default()
    };

    let result = state.entity_store.apply_bulk(&request.entity_ids, &request.command, &options).await;
    let status = if result.results.iter().all(|r| r.status == OperationStatus::Success) {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    (status, Json(result)).into_response()
}

#[derive(Serialize)]
struct ObservedUnmappedEntry {
    pgn: u32,
    instance: u8,
    occurrence_count: u64,
    seconds_since_first_seen: f64,
    seconds_since_last_seen: f64,
    sample_payload: Vec<u8>,
}

async fn unmapped_entities(State(state): State<AppState>) -> impl IntoResponse {
    let now = std::time::Instant::now();
    let entries: Vec<ObservedUnmappedEntry> = state
        .unmapped
        .snapshot()
        .into_iter()
        .map(|((pgn, instance), entry)| ObservedUnmappedEntry {
            pgn,
            instance,
            occurrence_count: entry.occurrence_count,
            seconds_since_first_seen: now.duration_since(entry.first_seen).as_secs_f64(),
            seconds_since_last_seen: now.duration_since(entry.last_seen).as_secs_f64(),
            sample_payload: entry.sample_payload,
        })
        .collect();
    Json(entries)
}

#[derive(Serialize)]
struct ObservedUnknownEntry {
    pgn: u32,
    occurrence_count: u64,
    seconds_since_first_seen: f64,
    seconds_since_last_seen: f64,
    sample_payload: Vec<u8>,
}

async fn unknown_pgns(State(state): State<AppState>) -> impl IntoResponse {
    let now = std::time::Instant::now();
    let entries: Vec<ObservedUnknownEntry> = state
        .unknown_pgns
        .snapshot()
        .into_iter()
        .map(|(pgn, entry)| ObservedUnknownEntry {
            pgn,
            occurrence_count: entry.occurrence_count,
            seconds_since_first_seen: now.duration_since(entry.first_seen).as_secs_f64(),
            seconds_since_last_seen: now.duration_since(entry.last_seen).as_secs_f64(),
            sample_payload: entry.sample_payload,
        })
        .collect();
    Json(entries)
}

async fn can_interfaces(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.transport.interface_names().collect::<Vec<_>>())
}

async fn can_statistics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.transport.statistics())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    features: Vec<rvc_features::FeatureReport>,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut manager = state.feature_manager.lock().await;
    manager.refresh_health().await;
    let reports = manager.reports();
    let status = if reports.iter().any(|r| matches!(r.state, rvc_features::FeatureState::Failed { .. })) {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResponse { status, features: reports })
}

async fn features(State(state): State<AppState>) -> impl IntoResponse {
    let manager = state.feature_manager.lock().await;
    Json(manager.reports())
}

fn not_found(entity_id: &str) -> axum::response::Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "unknown entity", "entity_id": entity_id}))).into_response()
}
