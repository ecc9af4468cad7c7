use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use skyward_core::fare_rules::FareRulesView;
use skyward_core::passenger::BookingDraft;
use skyward_core::search::SearchQuery;
use skyward_core::validation::ValidationReport;
use skyward_core::SelectedFare;
use skyward_flow::{CheckoutRedirect, FlowSnapshot, SearchOutcome, SelectionRequest};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flows/search", post(search))
        .route("/v1/flows/{flow_id}", get(snapshot).delete(reset))
        .route("/v1/flows/{flow_id}/select", post(select))
        .route("/v1/flows/{flow_id}/passengers/validate", post(validate_passengers))
        .route("/v1/flows/{flow_id}/book", post(submit_booking))
        .route("/v1/flows/{flow_id}/fare-rules", get(fare_rules))
        .route("/v1/flows/{flow_id}/fare-rules/accept", post(accept_fare_rules))
        .route("/v1/flows/{flow_id}/fare-rules/dismiss", post(dismiss_fare_rules))
}

/// POST /v1/flows/search
/// Runs the search and opens a flow for its results
async fn search(
    State(state): State<AppState>,
    Json(query): Json<SearchQuery>,
) -> Result<Json<SearchOutcome>, AppError> {
    Ok(Json(state.flow.search(query).await?))
}

/// GET /v1/flows/:id
async fn snapshot(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<Json<FlowSnapshot>, AppError> {
    Ok(Json(state.flow.snapshot(flow_id).await?))
}

/// DELETE /v1/flows/:id
async fn reset(State(state): State<AppState>, Path(flow_id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.flow.reset(flow_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/flows/:id/select
async fn select(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<SelectedFare>, AppError> {
    Ok(Json(state.flow.select(flow_id, req).await?))
}

/// POST /v1/flows/:id/passengers/validate
/// Field-level feedback only; nothing is stored
async fn validate_passengers(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(draft): Json<BookingDraft>,
) -> Result<Json<ValidationReport>, AppError> {
    Ok(Json(state.flow.validate_passengers(flow_id, &draft).await?))
}

/// POST /v1/flows/:id/book
/// Validates, revalidates the fare and returns the rules to accept
async fn submit_booking(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(draft): Json<BookingDraft>,
) -> Result<Json<FareRulesView>, AppError> {
    Ok(Json(state.flow.submit_booking(flow_id, draft).await?))
}

/// GET /v1/flows/:id/fare-rules
async fn fare_rules(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<Json<FareRulesView>, AppError> {
    Ok(Json(state.flow.fare_rules(flow_id).await?))
}

/// POST /v1/flows/:id/fare-rules/accept
async fn accept_fare_rules(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<Json<CheckoutRedirect>, AppError> {
    Ok(Json(state.flow.accept_fare_rules(flow_id).await?))
}

/// POST /v1/flows/:id/fare-rules/dismiss
async fn dismiss_fare_rules(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<Json<FlowSnapshot>, AppError> {
    Ok(Json(state.flow.dismiss_fare_rules(flow_id).await?))
}
