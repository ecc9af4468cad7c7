use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use skyward_core::error::BackendResult;
use skyward_core::fare_rules::FareRulesView;
use skyward_core::itinerary::{Money, Revalidation, RevalidationResponse};
use skyward_core::passenger::BookingRequest;
use skyward_core::payment::{CheckoutForBooking, CheckoutForPayload, CheckoutSession, VerifySessionResponse};
use skyward_core::search::{SearchQuery, SearchResponse};
use skyward_core::ticket::{ActionReceipt, BookingAction, BookingActionKind, TicketStatus};
use skyward_core::{BackendError, BookingBackend};

use crate::app_config::BackendConfig;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookResponse {
    #[serde(alias = "booking_id", alias = "BookingId")]
    booking_id: String,
}

/// `BookingBackend` over the booking REST API.
#[derive(Clone)]
pub struct HttpBookingBackend {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    mutation_timeout: Duration,
}

impl HttpBookingBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            mutation_timeout: Duration::from_secs(config.mutation_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).timeout(self.request_timeout)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> BackendResult<(StatusCode, String)> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!("{} -> {}", path, status);
        Ok((status, body))
    }

    /// Sends and decodes a 2xx body as `T`; any other status becomes a
    /// `BackendError` built from the body.
    async fn call<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> BackendResult<T> {
        let (status, body) = self.send(path, request).await?;
        if !status.is_success() {
            warn!("{} failed with {}", path, status);
            return Err(BackendError::from_response(status.as_u16(), &body));
        }
        decode(path, &body)
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> BackendResult<T> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode(format!("{}: {}", path, e)))
}

#[async_trait]
impl BookingBackend for HttpBookingBackend {
    async fn search(&self, query: &SearchQuery) -> BackendResult<SearchResponse> {
        let path = "/flights/search";
        self.call(path, self.post(path).json(&query.to_wire())).await
    }

    async fn revalidate(&self, session_id: &str, fare_source_code: &str) -> BackendResult<Revalidation> {
        let path = "/flights/revalidate";
        let body = json!({ "flight_session_id": session_id, "fare_source_code": fare_source_code });
        let response: RevalidationResponse = self.call(path, self.post(path).json(&body)).await?;
        Ok(response.into())
    }

    async fn fare_rules(&self, session_id: &str, fare_source_code: &str) -> BackendResult<FareRulesView> {
        let path = "/flights/fare-rules";
        let body = json!({ "session_id": session_id, "fare_source_code": fare_source_code });
        let raw: Value = self.call(path, self.post(path).json(&body)).await?;
        Ok(FareRulesView::from_backend(&raw))
    }

    async fn book(&self, request: &BookingRequest) -> BackendResult<String> {
        let path = "/flights/book";
        let response: BookResponse = self.call(path, self.post(path).json(request)).await?;
        Ok(response.booking_id)
    }

    async fn create_checkout_session(&self, booking_id: &str, total: &Money) -> BackendResult<CheckoutSession> {
        let path = "/payment/create-checkout-session";
        let body = CheckoutForBooking::new(booking_id, total);
        self.call(path, self.post(path).json(&body)).await
    }

    async fn create_lcc_checkout_session(
        &self,
        payload: &BookingRequest,
        total: &Money,
    ) -> BackendResult<CheckoutSession> {
        let path = "/payment/create-checkout-session-lcc";
        let body = CheckoutForPayload::new(payload, total);
        self.call(path, self.post(path).json(&body)).await
    }

    async fn verify_session(&self, processor_session_id: &str) -> BackendResult<Option<String>> {
        let path = "/payment/verify-session";
        let request = self.post(path).json(&json!({ "sessionId": processor_session_id }));
        let (status, body) = self.send(path, request).await?;

        // Not resolvable yet: the payment webhook has not created the booking.
        if status == StatusCode::NOT_FOUND || status == StatusCode::ACCEPTED {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BackendError::from_response(status.as_u16(), &body));
        }
        let response: VerifySessionResponse = decode(path, &body)?;
        Ok(response.booking_id.filter(|id| !id.is_empty()))
    }

    async fn ticket(&self, booking_id: &str) -> BackendResult<TicketStatus> {
        let path = format!("/ticket/{}", booking_id);
        let request = self.client.get(self.url(&path)).timeout(self.mutation_timeout);
        let mut status: TicketStatus = self.call(&path, request).await?;
        if status.booking_id.is_empty() {
            status.booking_id = booking_id.to_string();
        }
        Ok(status)
    }

    async fn booking_action(
        &self,
        kind: BookingActionKind,
        action: &BookingAction,
    ) -> BackendResult<ActionReceipt> {
        let path = kind.path();
        let request = self.client.post(self.url(path)).timeout(self.mutation_timeout).json(action);
        self.call(path, request).await
    }
}
