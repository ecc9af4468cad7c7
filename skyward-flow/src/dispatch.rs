use serde::{Deserialize, Serialize};
use tracing::info;

use skyward_core::itinerary::Money;
use skyward_core::passenger::BookingRequest;
use skyward_core::payment::PaymentBranch;
use skyward_core::{BookingBackend, SessionKey};

use crate::error::FlowResult;
use crate::session::FlowSession;

/// Where to send the customer to pay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRedirect {
    pub url: String,
    pub branch: PaymentBranch,
    /// Only known up front for book-then-pay fares.
    pub booking_id: Option<String>,
    pub checkout_session_id: Option<String>,
}

/// GDS fares: create (or reuse) the booking, then a checkout session
/// referencing it.
pub(crate) async fn book_then_pay(
    backend: &dyn BookingBackend,
    session: &FlowSession<'_>,
    request: &BookingRequest,
    total: &Money,
) -> FlowResult<CheckoutRedirect> {
    // A previous attempt may have booked and then failed at checkout.
    let booking_id = match session.get(SessionKey::BookingId).await? {
        Some(existing) => {
            info!("Flow {} reusing booking {}", session.flow_id(), existing);
            existing
        }
        None => {
            let booking_id = backend.book(request).await?;
            session.set(SessionKey::BookingId, &booking_id).await?;
            info!("Flow {} created booking {}", session.flow_id(), booking_id);
            booking_id
        }
    };

    let checkout = backend.create_checkout_session(&booking_id, total).await?;
    Ok(CheckoutRedirect {
        url: checkout.url,
        branch: PaymentBranch::BookThenPay,
        booking_id: Some(booking_id),
        checkout_session_id: checkout.session_id,
    })
}

/// Low-cost fares: no inventory is committed until the processor confirms
/// payment; the payload travels with the checkout session.
pub(crate) async fn pay_then_book(
    backend: &dyn BookingBackend,
    request: &BookingRequest,
    total: &Money,
) -> FlowResult<CheckoutRedirect> {
    let checkout = backend.create_lcc_checkout_session(request, total).await?;
    Ok(CheckoutRedirect {
        url: checkout.url,
        branch: PaymentBranch::PayThenBook,
        booking_id: None,
        checkout_session_id: checkout.session_id,
    })
}
