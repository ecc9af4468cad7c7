use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Revalidation said no; only a new search can continue.
    FareExpired,
    /// The backend cancelled or refused the booking.
    BookingRejected,
}

/// Where a booking flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    Idle,
    RevalidatingFare,
    AwaitingFareRuleAcceptance,
    Dispatching,
    GdsBookThenPay,
    WebFarePayThenBook,
    AwaitingPaymentResult,
    PollingForTicket,
    Issued,
    /// Payment went through but no ticket yet. Not a failure.
    TicketDelayed,
    Failed(FailureReason),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Issued | FlowState::Failed(_))
    }

    /// Money may be moving; the selection must not change underneath it.
    pub fn is_payment_in_flight(&self) -> bool {
        matches!(
            self,
            FlowState::Dispatching
                | FlowState::GdsBookThenPay
                | FlowState::WebFarePayThenBook
                | FlowState::AwaitingPaymentResult
                | FlowState::PollingForTicket
                | FlowState::TicketDelayed
        )
    }

    pub fn can_advance_to(&self, next: FlowState) -> bool {
        use FlowState::*;
        match (*self, next) {
            (Idle, RevalidatingFare) => true,
            (RevalidatingFare, AwaitingFareRuleAcceptance | Idle | Failed(_)) => true,
            (AwaitingFareRuleAcceptance, Dispatching | Idle | RevalidatingFare) => true,
            (Dispatching, GdsBookThenPay | WebFarePayThenBook) => true,
            (GdsBookThenPay | WebFarePayThenBook, AwaitingPaymentResult | AwaitingFareRuleAcceptance) => true,
            (GdsBookThenPay | WebFarePayThenBook, Failed(_)) => true,
            (AwaitingPaymentResult, PollingForTicket | AwaitingFareRuleAcceptance | Failed(_)) => true,
            (PollingForTicket, Issued | TicketDelayed | Failed(_)) => true,
            (TicketDelayed, PollingForTicket) => true,
            _ => false,
        }
    }

    /// Moves to `next` if the guard table allows it.
    pub fn advance(self, next: FlowState) -> Result<FlowState, FlowError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(FlowError::InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::Failed(reason) => write!(f, "Failed({:?})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FlowState::*;

    #[test]
    fn test_book_then_pay_path() {
        let path = [
            Idle,
            RevalidatingFare,
            AwaitingFareRuleAcceptance,
            Dispatching,
            GdsBookThenPay,
            AwaitingPaymentResult,
            PollingForTicket,
            Issued,
        ];
        let mut state = path[0];
        for next in &path[1..] {
            state = state.advance(*next).unwrap();
        }
        assert_eq!(state, Issued);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_pay_then_book_path_through_delay() {
        let mut state = Dispatching;
        for next in [WebFarePayThenBook, AwaitingPaymentResult, PollingForTicket, TicketDelayed, PollingForTicket, Issued] {
            state = state.advance(next).unwrap();
        }
        assert_eq!(state, Issued);
    }

    #[test]
    fn test_dispatch_requires_fare_rule_acceptance() {
        assert!(matches!(
            Idle.advance(Dispatching),
            Err(FlowError::InvalidTransition { from: Idle, to: Dispatching })
        ));
        assert!(!RevalidatingFare.can_advance_to(Dispatching));
    }

    #[test]
    fn test_terminal_states_go_nowhere() {
        for next in [Idle, RevalidatingFare, PollingForTicket] {
            assert!(!Issued.can_advance_to(next));
            assert!(!Failed(FailureReason::FareExpired).can_advance_to(next));
        }
    }

    #[test]
    fn test_delay_is_not_terminal() {
        assert!(!TicketDelayed.is_terminal());
        assert!(TicketDelayed.is_payment_in_flight());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_value(Idle).unwrap(), serde_json::json!({ "state": "IDLE" }));
        assert_eq!(
            serde_json::to_value(Failed(FailureReason::FareExpired)).unwrap(),
            serde_json::json!({ "state": "FAILED", "reason": "FARE_EXPIRED" })
        );
    }
}
