use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use skyward_store::app_config::ResiliencyConfig;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> CircuitState {
        *self.state.read().await
    }

    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        if state == CircuitState::Closed {
            return true;
        }

        if state == CircuitState::Open {
            let last_fail = *self.last_failure.read().await;
            if let Some(instant) = last_fail {
                if instant.elapsed() >= self.reset_timeout {
                    *self.state.write().await = CircuitState::HalfOpen;
                    tracing::info!("Circuit breaker [{}] moving to half-open", self.name);
                    return true;
                }
            }
            return false;
        }

        // Half-open lets a probe through
        true
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            tracing::info!("Circuit breaker [{}] recovered", self.name);
        }
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!("Circuit breaker [{}] opened after {} failures", self.name, count);
        }
    }
}

/// One breaker per group of routes that talk to the booking backend's
/// money-moving endpoints.
pub struct Resiliency {
    pub payment_cb: CircuitBreaker,
    pub booking_cb: CircuitBreaker,
}

impl Resiliency {
    pub fn new(config: &ResiliencyConfig) -> Self {
        let threshold = config.failure_threshold as usize;
        let timeout = Duration::from_secs(config.reset_timeout_secs);
        Self {
            payment_cb: CircuitBreaker::new("payment", threshold, timeout),
            booking_cb: CircuitBreaker::new("booking-management", threshold, timeout),
        }
    }

    fn breaker_for(&self, path: &str) -> Option<&CircuitBreaker> {
        if path.starts_with("/v1/payments") || path.ends_with("/fare-rules/accept") {
            Some(&self.payment_cb)
        } else if path.starts_with("/v1/bookings") {
            Some(&self.booking_cb)
        } else {
            None
        }
    }
}

/// Upstream failures trip the breaker. 503 is excluded: it is this service's
/// own "not yet, retry" answer for unresolved payments.
fn is_upstream_failure(status: StatusCode) -> bool {
    status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE
}

pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> impl IntoResponse {
    let path = req.uri().path().to_string();
    let Some(cb) = state.resiliency.breaker_for(&path) else {
        return next.run(req).await.into_response();
    };

    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": format!("Circuit breaker [{}] is open", cb.name),
                "retryable": true,
            })),
        )
            .into_response();
    }

    let response = next.run(req).await;

    if is_upstream_failure(response.status()) {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }

    response.into_response()
}
