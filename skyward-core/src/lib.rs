pub mod backend;
pub mod error;
pub mod fare_rules;
pub mod itinerary;
pub mod passenger;
pub mod payment;
pub mod pii;
pub mod search;
pub mod session;
pub mod ticket;
pub mod validation;

pub use backend::BookingBackend;
pub use error::{BackendError, BackendResult, Rejection, RejectionKind};
pub use itinerary::{FareItinerary, FareType, SelectedFare};
pub use session::{SessionKey, SessionStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
