//! REST API over the scheduler.
//!
//! Responses use a `{ "success": true, "data": ... }` envelope; failures
//! come back as `{ "success": false, "error": ... }` with 404 for missing
//! records, 400 for rejected requests, and 500 for everything else. Errors
//! are always returned to the caller, never allowed to take the process down.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use opentelemetry::KeyValue;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Notify;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::event::EventBus;
use crate::model::{NewRegistration, Status, WorkshopId};
use crate::scheduler::{Scheduler, SharedScheduler, WorkshopFilter};
use crate::telemetry::metrics;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: SharedScheduler,
    pub bus: EventBus,
}

impl AppState {
    pub fn new(scheduler: SharedScheduler, bus: EventBus) -> Self {
        Self { scheduler, bus }
    }

    fn lock(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/workshops", get(list_workshops))
        .route("/api/workshops/stats", get(workshop_stats))
        .route("/api/workshops/tags", get(workshop_tags))
        .route("/api/workshops/:id", get(get_workshop))
        .route(
            "/api/workshops/:id/register",
            axum::routing::post(register).delete(cancel),
        )
        .route("/api/users/:user_id/workshops", get(user_workshops))
        .route("/api/users/:user_id/notifications", get(user_notifications))
        .route("/api/notifications/:id/read", patch(mark_notification_read))
        .route("/api/events", get(list_events))
        .route("/api/events/stream", get(event_stream))
        .fallback(not_found)
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// Bind and serve until the shutdown notification fires.
pub async fn serve(addr: SocketAddr, state: AppState, shutdown: Arc<Notify>) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Other(format!("failed to bind {addr}: {e}")))?;

    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await
        .map_err(|e| Error::Other(format!("server error: {e}")))
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        _ = terminate => {},
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidState { .. }
            | Error::Full(_)
            | Error::Duplicate { .. }
            | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("request failed: {self}");
        }

        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Workshops
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListQuery {
    status: Option<String>,
    search: Option<String>,
    tag: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

async fn list_workshops(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>> {
    metrics::workshop_views().add(1, &[KeyValue::new("endpoint", "list")]);

    let status = match query.status.as_deref() {
        None | Some("all") | Some("") => None,
        Some(s) => Some(
            s.parse::<Status>()
                .map_err(|_| Error::InvalidRequest(format!("unknown status filter: {s}")))?,
        ),
    };

    let filter = WorkshopFilter {
        status,
        search: query.search,
        tag: query.tag,
    };
    let workshops = state.lock().list_workshops(&filter)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).max(1);
    let total = workshops.len();
    let pages = total.div_ceil(limit);
    let start = (page - 1) * limit;
    let items: Vec<_> = workshops.into_iter().skip(start).take(limit).collect();

    Ok(Json(json!({
        "success": true,
        "data": items,
        "pagination": { "page": page, "limit": limit, "total": total, "pages": pages },
    })))
}

async fn get_workshop(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    metrics::workshop_views().add(1, &[KeyValue::new("endpoint", "get")]);

    let workshop = state.lock().get_workshop(WorkshopId(id))?;
    Ok(Json(json!({ "success": true, "data": workshop })))
}

async fn workshop_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let stats = state.lock().stats()?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

async fn workshop_tags(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let tags = state.lock().tags()?;
    Ok(Json(json!({ "success": true, "data": tags })))
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterPayload {
    user_id: Option<String>,
    user_email: Option<String>,
    user_name: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<serde_json::Value>> {
    let required = "user_id and user_email are required";
    let user_id = payload
        .user_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidRequest(required.into()))?;
    let user_email = payload
        .user_email
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidRequest(required.into()))?;

    let mut new = NewRegistration::new(user_id).email(user_email);
    if let Some(name) = payload.user_name.filter(|s| !s.is_empty()) {
        new = new.name(name);
    }

    let (workshop, registration) = state.lock().register(WorkshopId(id), new)?;

    Ok(Json(json!({
        "success": true,
        "message": "Successfully registered for workshop",
        "data": { "registration": registration, "workshop": workshop },
    })))
}

#[derive(Deserialize)]
struct CancelPayload {
    user_id: String,
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CancelPayload>,
) -> Result<Json<serde_json::Value>> {
    state.lock().cancel(WorkshopId(id), &payload.user_id)?;

    Ok(Json(json!({
        "success": true,
        "message": "Registration cancelled successfully",
    })))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

async fn user_workshops(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let entries = state.lock().workshops_for_user(&user_id)?;
    let data: Vec<_> = entries
        .into_iter()
        .map(|(workshop, registration)| {
            json!({ "workshop": workshop, "registration": registration })
        })
        .collect();

    Ok(Json(json!({ "success": true, "data": data })))
}

async fn user_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let notifications = state.lock().notifications_for_user(&user_id)?;
    Ok(Json(json!({ "success": true, "data": notifications })))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    state.lock().mark_notification_read(id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Notification marked as read",
    })))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EventsQuery {
    since: Option<u64>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<serde_json::Value>> {
    let events = state.lock().events_since(query.since.unwrap_or(0))?;
    Ok(Json(json!({ "success": true, "data": events })))
}

/// Server-sent event stream of live catalog changes.
///
/// Subscribers joining mid-stream only see events from that point on;
/// `/api/events?since=` covers catch-up.
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let rx = state.bus.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => SseEvent::default().json_data(&event).ok().map(Ok),
        Err(_) => None, // lagged subscriber: missed events are gone
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "API endpoint not found" })),
    )
        .into_response()
}
