use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use skyward_core::ticket::{ActionReceipt, BookingAction, BookingActionKind};
use skyward_flow::TicketOutcome;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    /// Keep polling until the ticket is issued or the schedule runs out.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionRequest {
    pub remarks: Option<String>,
    pub preferred_date: Option<NaiveDate>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{booking_id}/ticket", get(ticket))
        .route("/v1/bookings/{booking_id}/cancel", post(cancel))
        .route("/v1/bookings/{booking_id}/refund", post(refund))
        .route("/v1/bookings/{booking_id}/reissue", post(reissue))
}

/// GET /v1/bookings/:booking_id/ticket
async fn ticket(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Query(query): Query<TicketQuery>,
) -> Result<Response, AppError> {
    if !query.wait {
        return Ok(Json(state.flow.ticket(&booking_id).await?).into_response());
    }

    let outcome = state.flow.await_ticket(&booking_id).await?;
    let status = match outcome {
        TicketOutcome::Issued { .. } => StatusCode::OK,
        TicketOutcome::Delayed { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)).into_response())
}

async fn run_action(
    state: &AppState,
    kind: BookingActionKind,
    unique_id: String,
    req: ActionRequest,
) -> Result<Json<ActionReceipt>, AppError> {
    let action = BookingAction {
        unique_id,
        remarks: req.remarks,
        preferred_date: req.preferred_date,
    };
    Ok(Json(state.flow.booking_action(kind, action).await?))
}

/// POST /v1/bookings/:unique_id/cancel
async fn cancel(
    State(state): State<AppState>,
    Path(unique_id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionReceipt>, AppError> {
    run_action(&state, BookingActionKind::Cancel, unique_id, req).await
}

/// POST /v1/bookings/:unique_id/refund
async fn refund(
    State(state): State<AppState>,
    Path(unique_id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionReceipt>, AppError> {
    run_action(&state, BookingActionKind::Refund, unique_id, req).await
}

/// POST /v1/bookings/:unique_id/reissue
async fn reissue(
    State(state): State<AppState>,
    Path(unique_id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionReceipt>, AppError> {
    run_action(&state, BookingActionKind::Reissue, unique_id, req).await
}
