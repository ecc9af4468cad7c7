use async_trait::async_trait;

use crate::error::BackendResult;
use crate::fare_rules::FareRulesView;
use crate::itinerary::{Money, Revalidation};
use crate::passenger::BookingRequest;
use crate::payment::CheckoutSession;
use crate::search::{SearchQuery, SearchResponse};
use crate::ticket::{ActionReceipt, BookingAction, BookingActionKind, TicketStatus};

/// The remote booking API (GDS integration and payment processor behind
/// one REST surface).
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> BackendResult<SearchResponse>;

    /// Re-confirm price and availability of one fare.
    async fn revalidate(&self, session_id: &str, fare_source_code: &str) -> BackendResult<Revalidation>;

    async fn fare_rules(&self, session_id: &str, fare_source_code: &str) -> BackendResult<FareRulesView>;

    /// Create a reserved booking; returns its id.
    async fn book(&self, request: &BookingRequest) -> BackendResult<String>;

    /// Checkout session paying for an existing booking.
    async fn create_checkout_session(&self, booking_id: &str, total: &Money) -> BackendResult<CheckoutSession>;

    /// Checkout session carrying the booking payload; no booking exists yet.
    async fn create_lcc_checkout_session(
        &self,
        payload: &BookingRequest,
        total: &Money,
    ) -> BackendResult<CheckoutSession>;

    /// Resolve a processor session to a booking id. `None` while the
    /// payment webhook has not landed yet.
    async fn verify_session(&self, processor_session_id: &str) -> BackendResult<Option<String>>;

    async fn ticket(&self, booking_id: &str) -> BackendResult<TicketStatus>;

    async fn booking_action(
        &self,
        kind: BookingActionKind,
        action: &BookingAction,
    ) -> BackendResult<ActionReceipt>;
}
