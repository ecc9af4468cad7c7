use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use skyward_flow::Confirmation;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReturn {
    /// Processor checkout session id from the return URL.
    #[serde(alias = "session_id")]
    pub session_id: String,
    #[serde(default)]
    pub flow_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/payments/return", post(payment_return))
}

/// POST /v1/payments/return
/// Resolves the checkout session to a booking and waits for the ticket.
/// 200 once issued, 202 while ticketing is still running.
async fn payment_return(
    State(state): State<AppState>,
    Json(req): Json<PaymentReturn>,
) -> Result<(StatusCode, Json<Confirmation>), AppError> {
    let session_id = req.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::BadRequest("Missing checkout session id".to_string()));
    }

    let confirmation = state.flow.complete_payment(req.flow_id, session_id).await?;
    let status = if confirmation.outcome.is_issued() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(confirmation)))
}
