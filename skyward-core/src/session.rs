use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a customer is sent when a flow is entered out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeAt {
    Search,
    Bookings,
}

impl ResumeAt {
    pub fn path(&self) -> &'static str {
        match self {
            ResumeAt::Search => "/search",
            ResumeAt::Bookings => "/bookings",
        }
    }
}

/// Named values handed from one stage of the booking flow to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKey {
    SearchSessionId,
    SearchQuery,
    SearchResults,
    SelectedFare,
    FareSourceCode,
    ReturnFareSourceCode,
    BookingDraft,
    PassportRequired,
    FareRulesAccepted,
    CheckoutSessionId,
    BookingId,
    FlowState,
}

impl SessionKey {
    pub const ALL: [SessionKey; 12] = [
        SessionKey::SearchSessionId,
        SessionKey::SearchQuery,
        SessionKey::SearchResults,
        SessionKey::SelectedFare,
        SessionKey::FareSourceCode,
        SessionKey::ReturnFareSourceCode,
        SessionKey::BookingDraft,
        SessionKey::PassportRequired,
        SessionKey::FareRulesAccepted,
        SessionKey::CheckoutSessionId,
        SessionKey::BookingId,
        SessionKey::FlowState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::SearchSessionId => "search_session_id",
            SessionKey::SearchQuery => "search_query",
            SessionKey::SearchResults => "search_results",
            SessionKey::SelectedFare => "selected_fare",
            SessionKey::FareSourceCode => "fare_source_code",
            SessionKey::ReturnFareSourceCode => "return_fare_source_code",
            SessionKey::BookingDraft => "booking_draft",
            SessionKey::PassportRequired => "passport_required",
            SessionKey::FareRulesAccepted => "fare_rules_accepted",
            SessionKey::CheckoutSessionId => "checkout_session_id",
            SessionKey::BookingId => "booking_id",
            SessionKey::FlowState => "flow_state",
        }
    }

    /// The step that writes this key.
    pub fn produced_at(&self) -> ResumeAt {
        match self {
            SessionKey::BookingId => ResumeAt::Bookings,
            _ => ResumeAt::Search,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt session value for {key}: {reason}")]
    Corrupt { key: &'static str, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-flow key/value state with an idle expiry.
///
/// A flow whose session expired reads exactly like one that never wrote
/// the key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, flow_id: Uuid, key: SessionKey) -> StoreResult<Option<String>>;

    /// Writes the value and restarts the idle timer.
    async fn set(&self, flow_id: Uuid, key: SessionKey, value: &str) -> StoreResult<()>;

    async fn remove(&self, flow_id: Uuid, key: SessionKey) -> StoreResult<()>;

    /// Drops every key of the flow.
    async fn clear(&self, flow_id: Uuid) -> StoreResult<()>;
}
