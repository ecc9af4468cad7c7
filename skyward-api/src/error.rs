use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use skyward_core::session::ResumeAt;
use skyward_core::{BackendError, CoreError, StoreError};
use skyward_flow::FlowError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Anyhow(err) => match err.downcast::<FlowError>() {
                Ok(flow) => flow_error_response(flow),
                Err(err) => {
                    tracing::error!("Internal Server Error: {:#}", err);
                    internal()
                }
            },
        };

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}

fn internal() -> (StatusCode, Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "Internal Server Error" }),
    )
}

fn redirect(message: String, to: ResumeAt) -> Value {
    json!({ "error": message, "redirect": to.path() })
}

fn flow_error_response(err: FlowError) -> (StatusCode, Value) {
    let message = err.to_string();
    match err {
        FlowError::Validation(report) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": report.summary.clone().unwrap_or(message),
                "fieldErrors": report.field_errors,
            }),
        ),
        FlowError::InvalidQuery(CoreError::ValidationError(msg)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": msg }))
        }
        FlowError::InvalidQuery(CoreError::InternalError(msg)) => {
            tracing::error!("Internal Server Error: {}", msg);
            internal()
        }
        FlowError::FareExpired => (StatusCode::GONE, redirect(message, ResumeAt::Search)),
        FlowError::OutOfOrder { missing, resume_at } => (
            StatusCode::CONFLICT,
            json!({ "error": message, "missing": missing.as_str(), "redirect": resume_at.path() }),
        ),
        FlowError::InvalidTransition { from, to } => (
            StatusCode::CONFLICT,
            json!({ "error": message, "from": from, "to": to }),
        ),
        FlowError::UnknownFare(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
        FlowError::PaymentUnverified => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": message, "retryable": true }),
        ),
        FlowError::BookingFailed { booking_id, status } => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": message,
                "code": "BOOKING_FAILED",
                "bookingId": booking_id,
                "status": status,
                "redirect": ResumeAt::Bookings.path(),
            }),
        ),
        FlowError::Rejected(rejection) => (
            StatusCode::BAD_REQUEST,
            json!({ "error": rejection.message, "code": rejection.kind }),
        ),
        FlowError::Backend(backend) => backend_error_response(backend),
        FlowError::Store(StoreError::Unavailable(reason)) => {
            tracing::error!("Session store unavailable: {}", reason);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Session store unavailable", "retryable": true }),
            )
        }
        FlowError::Store(corrupt) => {
            tracing::error!("Internal Server Error: {}", corrupt);
            internal()
        }
    }
}

fn backend_error_response(err: BackendError) -> (StatusCode, Value) {
    let status = match &err {
        BackendError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        BackendError::Rejected(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    tracing::warn!("Booking backend error: {}", err);
    (
        status,
        json!({ "error": err.to_string(), "retryable": err.is_transient() }),
    )
}
