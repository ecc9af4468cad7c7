use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use skyward_core::ticket::TicketStatus;
use skyward_core::BookingBackend;

use crate::error::{FlowError, FlowResult};
use crate::retry::{retry_with_backoff, BackoffPolicy, RetryError};

/// How ticket polling ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TicketOutcome {
    Issued { ticket: TicketStatus },
    /// Taking longer than expected; the booking may still complete.
    Delayed { booking_id: String, attempts: u32 },
}

impl TicketOutcome {
    pub fn is_issued(&self) -> bool {
        matches!(self, TicketOutcome::Issued { .. })
    }
}

/// Resolves a processor checkout session to the booking it paid for.
///
/// The booking id may not exist yet for pay-first fares (the webhook
/// creates it), so "not found" answers are retried on `policy`.
pub async fn verify_payment(
    backend: &dyn BookingBackend,
    policy: &BackoffPolicy,
    processor_session_id: &str,
) -> FlowResult<String> {
    let result = retry_with_backoff(policy, "verify-session", |_| async move {
        backend.verify_session(processor_session_id).await
    })
    .await;

    match result {
        Ok(booking_id) => {
            info!("Checkout {} resolved to booking {}", processor_session_id, booking_id);
            Ok(booking_id)
        }
        Err(RetryError::Exhausted { attempts }) => {
            warn!("Checkout {} unresolved after {} attempts", processor_session_id, attempts);
            Err(FlowError::PaymentUnverified)
        }
        Err(RetryError::Fatal(e)) => Err(e.into()),
    }
}

/// Polls the ticket resource until ticket numbers appear or `policy` runs out.
///
/// Running out is reported as [`TicketOutcome::Delayed`], never as an error.
pub async fn poll_ticket(
    backend: &dyn BookingBackend,
    policy: &BackoffPolicy,
    booking_id: &str,
) -> FlowResult<TicketOutcome> {
    let result = retry_with_backoff(policy, "ticket-poll", |_| async move {
        let status = backend.ticket(booking_id).await.map_err(FlowError::from)?;
        if status.is_issued() {
            return Ok(Some(status));
        }
        if status.is_failed() {
            return Err(FlowError::BookingFailed {
                booking_id: booking_id.to_string(),
                status: status.status.unwrap_or_default(),
            });
        }
        Ok(None)
    })
    .await;

    match result {
        Ok(ticket) => {
            info!("Booking {} ticketed: {:?}", booking_id, ticket.ticket_numbers);
            Ok(TicketOutcome::Issued { ticket })
        }
        Err(RetryError::Exhausted { attempts }) => {
            warn!("Booking {} still unticketed after {} polls", booking_id, attempts);
            Ok(TicketOutcome::Delayed {
                booking_id: booking_id.to_string(),
                attempts,
            })
        }
        Err(RetryError::Fatal(e)) => Err(e),
    }
}
