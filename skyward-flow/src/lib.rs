pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod polling;
pub mod retry;
pub mod revalidate;
pub mod session;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use dispatch::CheckoutRedirect;
pub use error::{FlowError, FlowResult};
pub use orchestrator::{BookingFlow, Confirmation, FlowSettings, FlowSnapshot, SearchOutcome, SelectionRequest};
pub use polling::TicketOutcome;
pub use retry::BackoffPolicy;
pub use state::{FailureReason, FlowState};
