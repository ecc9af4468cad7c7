use skyward_core::session::ResumeAt;
use skyward_core::validation::ValidationReport;
use skyward_core::{BackendError, CoreError, Rejection, SessionKey, StoreError};

use crate::retry::Transient;
use crate::state::FlowState;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Booking details need attention")]
    Validation(ValidationReport),

    #[error(transparent)]
    InvalidQuery(#[from] CoreError),

    /// The fare or search session is gone; start again from search.
    #[error("This fare has expired, please search again")]
    FareExpired,

    #[error("Missing {} for this step", .missing.as_str())]
    OutOfOrder { missing: SessionKey, resume_at: ResumeAt },

    #[error("Invalid flow transition from {from} to {to}")]
    InvalidTransition { from: FlowState, to: FlowState },

    #[error("Fare {0} is not part of the search results")]
    UnknownFare(String),

    /// Verification never resolved a booking. The payment may still land.
    #[error("Payment confirmation is still pending")]
    PaymentUnverified,

    #[error("Booking {booking_id} was not completed ({status})")]
    BookingFailed { booking_id: String, status: String },

    #[error("{}", .0.message)]
    Rejected(Rejection),

    #[error(transparent)]
    Backend(BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BackendError> for FlowError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected(rejection) => FlowError::Rejected(rejection),
            other => FlowError::Backend(other),
        }
    }
}

impl FlowError {
    pub fn out_of_order(missing: SessionKey) -> Self {
        FlowError::OutOfOrder {
            missing,
            resume_at: missing.produced_at(),
        }
    }
}

impl Transient for FlowError {
    fn is_transient(&self) -> bool {
        match self {
            FlowError::Backend(err) => err.is_transient(),
            FlowError::PaymentUnverified => true,
            _ => false,
        }
    }
}

impl Transient for BackendError {
    fn is_transient(&self) -> bool {
        BackendError::is_transient(self)
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
