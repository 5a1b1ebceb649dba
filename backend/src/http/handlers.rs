//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the session, catalog or
//! action controller.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use super::dto::{
    ActionEntry, ActionListResponse, ActionQuery, CatalogView, ExtractQuery, HealthResponse,
    LoadResponse, LocateResponse, ManualSiteRequest, ToggleOutcome, ToggleResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::services::{
    render_catalog, ActionKey, ActionKind, DocumentUpload, Generation, Toggle,
};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

const DEFAULT_DOCUMENT_NAME: &str = "document.pdf";

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let catalog = state.session.catalog();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        instance_id: state.instance_id.to_string(),
        generation: catalog.generation(),
        sites: catalog.len(),
    }))
}

// =============================================================================
// Catalog
// =============================================================================

/// GET /v1/sites
///
/// Rendered cards for the current catalog generation.
pub async fn list_sites(State(state): State<AppState>) -> HandlerResult<CatalogView> {
    let session = &state.session;
    Ok(Json(render_catalog(session.catalog(), session.controller())))
}

/// POST /v1/sites/manual
///
/// Validate the manual entry form and replace the catalog with the single site.
pub async fn submit_manual_site(
    State(state): State<AppState>,
    Json(request): Json<ManualSiteRequest>,
) -> HandlerResult<LoadResponse> {
    let generation = state
        .session
        .submit_manual(&request.site_name, &request.input)?;
    Ok(Json(load_response(&state, generation)))
}

/// POST /v1/sites/extract?filename=report.pdf
///
/// Forward the raw document body to the extraction backend and load the result. The
/// current catalog is kept when extraction fails.
pub async fn extract_sites(
    State(state): State<AppState>,
    Query(query): Query<ExtractQuery>,
    body: Bytes,
) -> HandlerResult<LoadResponse> {
    let document = DocumentUpload {
        filename: query
            .filename
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string()),
        bytes: body.to_vec(),
    };
    let generation = state.session.extract_document(document).await?;
    Ok(Json(load_response(&state, generation)))
}

/// GET /v1/sites/export
///
/// JSON snapshot of the loaded catalog as an attachment.
pub async fn export_sites(State(state): State<AppState>) -> Result<Response, AppError> {
    let export = state.session.export()?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.body,
    )
        .into_response())
}

fn load_response(state: &AppState, generation: Generation) -> LoadResponse {
    let catalog = state.session.catalog();
    LoadResponse {
        generation,
        sites_loaded: catalog.len(),
        summary: catalog.summary(),
    }
}

// =============================================================================
// Per-site actions
// =============================================================================

/// Reject indices read from a replaced catalog generation.
fn check_generation(state: &AppState, index: usize, query: &ActionQuery) -> Result<(), AppError> {
    if let Some(requested) = query.generation {
        state
            .session
            .catalog()
            .get_in(Generation::new(requested), index)?;
    }
    Ok(())
}

/// POST /v1/sites/{index}/analysis
pub async fn toggle_analysis(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<ActionQuery>,
) -> Result<(StatusCode, Json<ToggleResponse>), AppError> {
    toggle_panel(&state, index, &query, ActionKind::Analysis)
}

/// POST /v1/sites/{index}/preview
pub async fn toggle_preview(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<ActionQuery>,
) -> Result<(StatusCode, Json<ToggleResponse>), AppError> {
    toggle_panel(&state, index, &query, ActionKind::Preview)
}

/// Open or collapse a panel. An opened panel's call runs in the background; progress is
/// published on `/v1/events` and visible in `/v1/actions`.
fn toggle_panel(
    state: &AppState,
    index: usize,
    query: &ActionQuery,
    kind: ActionKind,
) -> Result<(StatusCode, Json<ToggleResponse>), AppError> {
    check_generation(state, index, query)?;
    let key = ActionKey::new(index, kind);

    match state.session.controller().begin_toggle(index, kind)? {
        Toggle::Collapsed(action_state) => Ok((
            StatusCode::OK,
            Json(ToggleResponse {
                key,
                outcome: ToggleOutcome::Collapsed,
                state: action_state,
            }),
        )),
        Toggle::Started(pending) => {
            let started = pending.started_state().clone();
            tokio::spawn(async move {
                if let Err(e) = pending.run().await {
                    tracing::debug!(%key, error = %e, "panel result not applied");
                }
            });
            Ok((
                StatusCode::ACCEPTED,
                Json(ToggleResponse {
                    key,
                    outcome: ToggleOutcome::Started,
                    state: started,
                }),
            ))
        }
    }
}

/// POST /v1/sites/{index}/download
///
/// Await the data archive and return it as an attachment.
pub async fn download_site(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<ActionQuery>,
) -> Result<Response, AppError> {
    check_generation(&state, index, &query)?;
    let file = state.session.controller().download(index).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response())
}

/// POST /v1/sites/{index}/locate
pub async fn locate_site(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<ActionQuery>,
) -> HandlerResult<LocateResponse> {
    check_generation(&state, index, &query)?;
    let url = state.session.controller().locate(index)?;
    Ok(Json(LocateResponse {
        key: ActionKey::new(index, ActionKind::Locate),
        url,
    }))
}

/// GET /v1/actions
pub async fn list_actions(State(state): State<AppState>) -> HandlerResult<ActionListResponse> {
    let generation = state.session.catalog().generation();
    let actions: Vec<ActionEntry> = state
        .session
        .controller()
        .snapshot_for(generation)
        .into_iter()
        .map(|(key, state)| ActionEntry { key, state })
        .collect();
    let total = actions.len();

    Ok(Json(ActionListResponse {
        generation,
        actions,
        total,
    }))
}

// =============================================================================
// Events
// =============================================================================

/// GET /v1/events
///
/// Server-Sent Events stream of controller events. Each event is named after its type
/// and carries the JSON-encoded event as data.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.session.controller().subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event(event.name()).data(data));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber fell behind");
                    yield Ok(Event::default().event("lagged").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
