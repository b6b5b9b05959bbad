//! HTTP route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::{Local, NaiveDateTime};
use futures::Stream;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::offline::{self, CacheStorage, ControlMessage, CoordinatorEvent, Fetcher};

use super::dto::*;
use super::state::AppState;

/// Response header naming where a proxied response came from.
pub const SOURCE_HEADER: &str = "x-ferry-source";

/// Create the application router.
///
/// Anything not matched by an API route is proxied through the coordinator.
pub fn create_router<F, S>(state: AppState<F, S>) -> Router
where
    F: Fetcher + 'static,
    S: CacheStorage + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/board", get(board::<F, S>))
        .route("/api/resolve", get(resolve::<F, S>))
        .route("/api/coordinator", post(coordinator_message::<F, S>))
        .route("/api/events", get(events::<F, S>))
        .route("/api/reset", post(reset::<F, S>))
        .fallback(proxy::<F, S>)
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Boards for the requested lines.
async fn board<F: Fetcher + 'static, S: CacheStorage + 'static>(
    State(state): State<AppState<F, S>>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BoardResponse>, AppError> {
    board_at(&state, &query, Local::now().naive_local())
        .await
        .map(Json)
}

async fn board_at<F: Fetcher, S: CacheStorage>(
    state: &AppState<F, S>,
    query: &BoardQuery,
    now: NaiveDateTime,
) -> Result<BoardResponse, AppError> {
    let lines = query
        .lines()
        .map_err(|message| AppError::BadRequest { message })?;

    state.controller.check_rollover(now).await;
    let boards = state
        .controller
        .boards(lines.as_deref(), query.highlight(), query.max(), now)
        .await;

    Ok(BoardResponse {
        date: now.date(),
        generated_at: now,
        version: state.coordinator.version().to_string(),
        lines: boards,
    })
}

/// Resolution of every line for a date.
async fn resolve<F: Fetcher + 'static, S: CacheStorage + 'static>(
    State(state): State<AppState<F, S>>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, AppError> {
    let date = query
        .date()
        .map_err(|message| AppError::BadRequest { message })?
        .unwrap_or_else(|| Local::now().date_naive());

    let lines = state
        .controller
        .resolve(date)
        .await
        .into_iter()
        .map(|(line, result)| match result {
            Ok(resolution) => LineResolution {
                line,
                resolution: Some(resolution),
                error: None,
            },
            Err(e) => LineResolution {
                line,
                resolution: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(ResolveResponse { date, lines }))
}

/// Control message for the coordinator.
async fn coordinator_message<F: Fetcher + 'static, S: CacheStorage + 'static>(
    State(state): State<AppState<F, S>>,
    Json(message): Json<ControlMessage>,
) -> Response {
    debug!(?message, "control message");
    match state.coordinator.handle_message(message).await {
        Some(ack) => Json(ack).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Server-sent coordinator events.
async fn events<F: Fetcher + 'static, S: CacheStorage + 'static>(
    State(state): State<AppState<F, S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(state.coordinator.subscribe())).keep_alive(KeepAlive::default())
}

fn event_stream(
    rx: broadcast::Receiver<CoordinatorEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    let sse = Event::default().event(event.name()).data(data);
                    return Some((Ok(sse), rx));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// Re-read configuration, reload all lines and restart the timers.
async fn reset<F: Fetcher + 'static, S: CacheStorage + 'static>(
    State(state): State<AppState<F, S>>,
) -> Result<Json<ResetResponse>, AppError> {
    let config = (state.config_source)()?;

    state
        .controller
        .reset(config.lines.clone(), Local::now().naive_local())
        .await;

    let mut timers = state.timers.lock().await;
    timers.restart(Arc::clone(&state.controller), config.intervals);

    Ok(Json(ResetResponse {
        lines: config.lines,
        timers: timers.len(),
    }))
}

/// Everything else goes to the upstream site through the coordinator.
async fn proxy<F: Fetcher + 'static, S: CacheStorage + 'static>(
    State(state): State<AppState<F, S>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!(
        "{}{}",
        state.coordinator.config().origin.trim_end_matches('/'),
        path
    );

    let mut request = offline::Request::get(url);
    if let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        request = request.with_accept(accept);
    }

    to_http(state.coordinator.handle(&request).await)
}

fn to_http(response: offline::Response) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = axum::http::Response::builder()
        .status(status)
        .header(SOURCE_HEADER, response.source.as_str());
    if let Some(content_type) = &response.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Internal { message: String },
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
