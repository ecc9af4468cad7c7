use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use skyward_core::fare_rules::FareRulesView;
use skyward_core::passenger::{BookingDraft, BookingRequest};
use skyward_core::payment::PaymentBranch;
use skyward_core::search::SearchQuery;
use skyward_core::ticket::{ActionReceipt, BookingAction, BookingActionKind, TicketStatus};
use skyward_core::validation::{validate_booking, ValidationReport};
use skyward_core::{
    BookingBackend, CoreError, FareItinerary, RejectionKind, SelectedFare, SessionKey, SessionStore,
};

use crate::dispatch::{book_then_pay, pay_then_book, CheckoutRedirect};
use crate::error::{FlowError, FlowResult};
use crate::polling::{poll_ticket, verify_payment, TicketOutcome};
use crate::retry::BackoffPolicy;
use crate::revalidate::revalidate_selection;
use crate::session::FlowSession;
use crate::state::{FailureReason, FlowState};

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSettings {
    pub verification: BackoffPolicy,
    pub ticketing: BackoffPolicy,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            verification: BackoffPolicy::verification(),
            ticketing: BackoffPolicy::ticketing(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub flow_id: Uuid,
    pub session_id: String,
    pub itineraries: Vec<FareItinerary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub fare_source_code: String,
    #[serde(default)]
    pub return_fare_source_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub flow_id: Uuid,
    pub state: FlowState,
    pub selected: Option<SelectedFare>,
    pub draft: Option<BookingDraft>,
    pub passport_required: bool,
    pub fare_rules_accepted: bool,
    pub booking_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub booking_id: String,
    #[serde(flatten)]
    pub outcome: TicketOutcome,
}

/// Drives a customer from a chosen fare to an issued ticket.
///
/// Stages hand data to each other only through the session store, so any
/// stage can be re-entered after a failure without redoing earlier ones.
pub struct BookingFlow {
    backend: Arc<dyn BookingBackend>,
    store: Arc<dyn SessionStore>,
    settings: FlowSettings,
}

impl BookingFlow {
    pub fn new(backend: Arc<dyn BookingBackend>, store: Arc<dyn SessionStore>, settings: FlowSettings) -> Self {
        Self { backend, store, settings }
    }

    fn session(&self, flow_id: Uuid) -> FlowSession<'_> {
        FlowSession::new(self.store.as_ref(), flow_id)
    }

    /// Runs the search and opens a new flow holding its results.
    pub async fn search(&self, query: SearchQuery) -> FlowResult<SearchOutcome> {
        query.validate()?;
        let response = self.backend.search(&query).await?;

        let flow_id = Uuid::new_v4();
        let session = self.session(flow_id);
        session.set(SessionKey::SearchSessionId, &response.session_id).await?;
        session.set_json(SessionKey::SearchQuery, &query).await?;
        session.set_json(SessionKey::SearchResults, &response.itineraries).await?;
        session.reset_state(FlowState::Idle).await?;

        info!(
            "Flow {} opened with {} itineraries for session {}",
            flow_id,
            response.itineraries.len(),
            response.session_id
        );
        Ok(SearchOutcome {
            flow_id,
            session_id: response.session_id,
            itineraries: response.itineraries,
        })
    }

    /// Picks an itinerary (or an outbound/inbound pair) from the results.
    pub async fn select(&self, flow_id: Uuid, request: SelectionRequest) -> FlowResult<SelectedFare> {
        let session = self.session(flow_id);
        let state = session.state().await?;
        match state {
            FlowState::Failed(FailureReason::FareExpired) => return Err(FlowError::FareExpired),
            s if s.is_payment_in_flight() || s.is_terminal() => {
                return Err(FlowError::InvalidTransition { from: s, to: FlowState::Idle });
            }
            _ => {}
        }

        let results: Vec<FareItinerary> = session.require_json(SessionKey::SearchResults).await?;
        let find = |code: &str| {
            results
                .iter()
                .find(|it| it.fare_source_code() == code)
                .cloned()
                .ok_or_else(|| FlowError::UnknownFare(code.to_string()))
        };

        let outbound = find(&request.fare_source_code)?;
        let selected = match request.return_fare_source_code.as_deref() {
            None => SelectedFare::OneWay { itinerary: outbound },
            Some(code) => SelectedFare::RoundTrip { outbound, inbound: find(code)? },
        };

        store_selection(&session, &selected).await?;
        for stale in [SessionKey::FareRulesAccepted, SessionKey::BookingId, SessionKey::CheckoutSessionId] {
            session.remove(stale).await?;
        }
        session.reset_state(FlowState::Idle).await?;

        info!("Flow {} selected {}", flow_id, request.fare_source_code);
        Ok(selected)
    }

    /// Checks the form without submitting it.
    pub async fn validate_passengers(&self, flow_id: Uuid, draft: &BookingDraft) -> FlowResult<ValidationReport> {
        let session = self.session(flow_id);
        let selected: SelectedFare = session.require_json(SessionKey::SelectedFare).await?;
        self.validate_against(&session, &selected, draft, false).await
    }

    async fn validate_against(
        &self,
        session: &FlowSession<'_>,
        selected: &SelectedFare,
        draft: &BookingDraft,
        force_passport: bool,
    ) -> FlowResult<ValidationReport> {
        let departure = selected
            .departure_date()
            .ok_or_else(|| FlowError::out_of_order(SessionKey::SelectedFare))?;
        let passport_required = force_passport
            || selected.passport_mandatory()
            || session.flag(SessionKey::PassportRequired).await?;
        let expected = session
            .get_json::<SearchQuery>(SessionKey::SearchQuery)
            .await?
            .map(|q| q.passenger_counts());
        Ok(validate_booking(draft, departure, passport_required, expected))
    }

    /// Validates the form, revalidates the fare and fetches its rules.
    ///
    /// The draft is stored before any network call so a failed attempt can
    /// be retried without re-entering passenger data.
    pub async fn submit_booking(&self, flow_id: Uuid, draft: BookingDraft) -> FlowResult<FareRulesView> {
        let session = self.session(flow_id);
        let current = session.state().await?;
        if current == FlowState::Failed(FailureReason::FareExpired) {
            return Err(FlowError::FareExpired);
        }
        if !current.can_advance_to(FlowState::RevalidatingFare) {
            return Err(FlowError::InvalidTransition { from: current, to: FlowState::RevalidatingFare });
        }

        let session_id = session.require(SessionKey::SearchSessionId).await?;
        let selected: SelectedFare = session.require_json(SessionKey::SelectedFare).await?;

        let report = self.validate_against(&session, &selected, &draft, false).await?;
        if !report.is_valid() {
            return Err(FlowError::Validation(report));
        }
        let previous: Option<BookingDraft> = session.get_json(SessionKey::BookingDraft).await?;
        if previous.as_ref() != Some(&draft) {
            drop_stale_booking(&session, "passenger details changed").await?;
        }
        session.set_json(SessionKey::BookingDraft, &draft).await?;
        session.remove(SessionKey::FareRulesAccepted).await?;

        session.advance(FlowState::RevalidatingFare).await?;
        let fresh = match revalidate_selection(self.backend.as_ref(), &session_id, &selected).await {
            Ok(fresh) => fresh,
            Err(e) => return Err(self.revalidation_failed(&session, e).await),
        };
        if fresh != selected {
            drop_stale_booking(&session, "fare changed on revalidation").await?;
        }
        store_selection(&session, &fresh).await?;

        // The fresh fare may demand passports the search copy did not.
        if fresh.passport_mandatory() && !selected.passport_mandatory() {
            let report = self.validate_against(&session, &fresh, &draft, true).await?;
            if !report.is_valid() {
                session.set_flag(SessionKey::PassportRequired, true).await?;
                session.advance(FlowState::Idle).await?;
                return Err(FlowError::Validation(report));
            }
        }

        let rules = match self
            .backend
            .fare_rules(&session_id, fresh.outbound().fare_source_code())
            .await
        {
            Ok(rules) => rules,
            Err(e) => {
                session.advance(FlowState::Idle).await?;
                return Err(e.into());
            }
        };

        session.advance(FlowState::AwaitingFareRuleAcceptance).await?;
        Ok(rules)
    }

    async fn revalidation_failed(&self, session: &FlowSession<'_>, err: FlowError) -> FlowError {
        let next = match &err {
            FlowError::FareExpired => FlowState::Failed(FailureReason::FareExpired),
            FlowError::Rejected(r) if r.kind == RejectionKind::PassportRequired => {
                if let Err(e) = session.set_flag(SessionKey::PassportRequired, true).await {
                    return e;
                }
                FlowState::Idle
            }
            _ => FlowState::Idle,
        };
        match session.advance(next).await {
            Ok(_) => err,
            Err(e) => e,
        }
    }

    /// Re-reads the fare rules for the current selection.
    pub async fn fare_rules(&self, flow_id: Uuid) -> FlowResult<FareRulesView> {
        let session = self.session(flow_id);
        let session_id = session.require(SessionKey::SearchSessionId).await?;
        let code = session.require(SessionKey::FareSourceCode).await?;
        Ok(self.backend.fare_rules(&session_id, &code).await?)
    }

    /// Closing the modal keeps the draft and the revalidated fare.
    pub async fn dismiss_fare_rules(&self, flow_id: Uuid) -> FlowResult<FlowSnapshot> {
        let session = self.session(flow_id);
        session.advance(FlowState::Idle).await?;
        session.remove(SessionKey::FareRulesAccepted).await?;
        self.snapshot(flow_id).await
    }

    /// The customer accepted the fare rules: book and/or open checkout,
    /// depending on how the fare is ticketed.
    pub async fn accept_fare_rules(&self, flow_id: Uuid) -> FlowResult<CheckoutRedirect> {
        let session = self.session(flow_id);
        let session_id = session.require(SessionKey::SearchSessionId).await?;
        let selected: SelectedFare = session.require_json(SessionKey::SelectedFare).await?;
        let draft: BookingDraft = session.require_json(SessionKey::BookingDraft).await?;

        session.advance(FlowState::Dispatching).await?;
        session.set_flag(SessionKey::FareRulesAccepted, true).await?;

        let request = BookingRequest::assemble(&session_id, &selected, &draft);
        let total = selected.total();
        let branch = PaymentBranch::for_fare(selected.fare_type());
        info!(
            "Flow {} dispatching {:?} for {} {}",
            flow_id, branch, total.amount, total.currency
        );

        let dispatched = match branch {
            PaymentBranch::BookThenPay => {
                session.advance(FlowState::GdsBookThenPay).await?;
                book_then_pay(self.backend.as_ref(), &session, &request, &total).await
            }
            PaymentBranch::PayThenBook => {
                session.advance(FlowState::WebFarePayThenBook).await?;
                pay_then_book(self.backend.as_ref(), &request, &total).await
            }
        };

        match dispatched {
            Ok(redirect) => {
                if let Some(id) = &redirect.checkout_session_id {
                    session.set(SessionKey::CheckoutSessionId, id).await?;
                }
                session.advance(FlowState::AwaitingPaymentResult).await?;
                Ok(redirect)
            }
            Err(err) => {
                warn!("Flow {} dispatch failed: {}", flow_id, err);
                let next = match &err {
                    FlowError::Rejected(r) if r.kind == RejectionKind::FareExpired => {
                        FlowState::Failed(FailureReason::FareExpired)
                    }
                    FlowError::Rejected(r) if r.kind == RejectionKind::PassportRequired => {
                        session.set_flag(SessionKey::PassportRequired, true).await?;
                        FlowState::AwaitingFareRuleAcceptance
                    }
                    _ => FlowState::AwaitingFareRuleAcceptance,
                };
                session.advance(next).await?;
                Err(match next {
                    FlowState::Failed(FailureReason::FareExpired) => FlowError::FareExpired,
                    _ => err,
                })
            }
        }
    }

    /// Called when the customer comes back from the payment processor.
    ///
    /// Never trusts the redirect alone: the processor session is resolved
    /// to a booking id through the backend, then the ticket is polled.
    pub async fn complete_payment(
        &self,
        flow_id: Option<Uuid>,
        processor_session_id: &str,
    ) -> FlowResult<Confirmation> {
        let session = match flow_id {
            Some(id) => {
                let session = self.session(id);
                match session.get(SessionKey::FlowState).await? {
                    Some(_) => Some(session),
                    None => {
                        warn!("Flow {} expired before the payment return; verifying without it", id);
                        None
                    }
                }
            }
            None => None,
        };
        if let Some(session) = &session {
            let current = session.state().await?;
            if !current.can_advance_to(FlowState::PollingForTicket) {
                return Err(FlowError::InvalidTransition { from: current, to: FlowState::PollingForTicket });
            }
            if let Some(expected) = session.get(SessionKey::CheckoutSessionId).await? {
                if expected != processor_session_id {
                    warn!(
                        "Flow {} returned with checkout {} but started {}",
                        session.flow_id(),
                        processor_session_id,
                        expected
                    );
                }
            }
        }

        let booking_id = verify_payment(self.backend.as_ref(), &self.settings.verification, processor_session_id).await?;

        if let Some(session) = &session {
            session.set(SessionKey::BookingId, &booking_id).await?;
            session.advance(FlowState::PollingForTicket).await?;
        }

        let polled = poll_ticket(self.backend.as_ref(), &self.settings.ticketing, &booking_id).await;

        if let Some(session) = &session {
            match &polled {
                Ok(TicketOutcome::Issued { .. }) => {
                    session.advance(FlowState::Issued).await?;
                    session.clear().await?;
                }
                Ok(TicketOutcome::Delayed { .. }) => {
                    session.advance(FlowState::TicketDelayed).await?;
                }
                Err(FlowError::BookingFailed { .. }) => {
                    session.advance(FlowState::Failed(FailureReason::BookingRejected)).await?;
                }
                Err(_) => {
                    session.advance(FlowState::TicketDelayed).await?;
                }
            }
        }

        Ok(Confirmation {
            booking_id,
            outcome: polled?,
        })
    }

    /// Polls a known booking for its ticket, e.g. from the bookings list.
    pub async fn await_ticket(&self, booking_id: &str) -> FlowResult<TicketOutcome> {
        poll_ticket(self.backend.as_ref(), &self.settings.ticketing, booking_id).await
    }

    pub async fn ticket(&self, booking_id: &str) -> FlowResult<TicketStatus> {
        Ok(self.backend.ticket(booking_id).await?)
    }

    /// Cancel, refund or reissue an existing booking.
    pub async fn booking_action(&self, kind: BookingActionKind, action: BookingAction) -> FlowResult<ActionReceipt> {
        if action.unique_id.trim().is_empty() {
            return Err(CoreError::ValidationError("A booking reference is required".into()).into());
        }
        info!("Requesting {:?} for booking {}", kind, action.unique_id);
        Ok(self.backend.booking_action(kind, &action).await?)
    }

    pub async fn snapshot(&self, flow_id: Uuid) -> FlowResult<FlowSnapshot> {
        let session = self.session(flow_id);
        Ok(FlowSnapshot {
            flow_id,
            state: session.state().await?,
            selected: session.get_json(SessionKey::SelectedFare).await?,
            draft: session.get_json(SessionKey::BookingDraft).await?,
            passport_required: session.flag(SessionKey::PassportRequired).await?,
            fare_rules_accepted: session.flag(SessionKey::FareRulesAccepted).await?,
            booking_id: session.get(SessionKey::BookingId).await?,
        })
    }

    pub async fn reset(&self, flow_id: Uuid) -> FlowResult<()> {
        info!("Flow {} reset", flow_id);
        self.session(flow_id).clear().await
    }
}

/// Writes the selection together with the fare codes later stages read.
async fn store_selection(session: &FlowSession<'_>, selected: &SelectedFare) -> FlowResult<()> {
    session.set_json(SessionKey::SelectedFare, selected).await?;
    session
        .set(SessionKey::FareSourceCode, selected.outbound().fare_source_code())
        .await?;
    match selected.inbound() {
        Some(inbound) => session.set(SessionKey::ReturnFareSourceCode, inbound.fare_source_code()).await,
        None => session.remove(SessionKey::ReturnFareSourceCode).await,
    }
}

/// A booking made for other passengers or another fare must not be paid for.
async fn drop_stale_booking(session: &FlowSession<'_>, why: &str) -> FlowResult<()> {
    if let Some(old) = session.get(SessionKey::BookingId).await? {
        warn!("Flow {} abandoning booking {}: {}", session.flow_id(), old, why);
        session.remove(SessionKey::BookingId).await?;
        session.remove(SessionKey::CheckoutSessionId).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sample_itinerary, ScriptedBackend};
    use chrono::NaiveDate;
    use skyward_core::passenger::{ContactDetails, PassengerDraft, PassportDetails};
    use skyward_core::pii::Masked;
    use skyward_core::search::SearchResponse;
    use skyward_core::{BackendError, Rejection};
    use skyward_store::MemorySessionStore;
    use std::time::Duration;

    const DEPARTS: &str = "2025-06-01T08:30:00";

    fn query() -> SearchQuery {
        SearchQuery::one_way("DXB", "LHR", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 1)
    }

    fn draft() -> BookingDraft {
        BookingDraft {
            adults: vec![PassengerDraft {
                title: Some("Ms".into()),
                first_name: "Layla".into(),
                last_name: "Karim".into(),
                date_of_birth: NaiveDate::from_ymd_opt(1988, 2, 14),
                ..Default::default()
            }],
            contact: ContactDetails {
                email: Masked::from("layla@example.com"),
                phone: Masked::from("501234567"),
                phone_country_code: Some("971".into()),
            },
            ..Default::default()
        }
    }

    fn flow_with(backend: Arc<ScriptedBackend>) -> BookingFlow {
        let settings = FlowSettings {
            verification: BackoffPolicy::immediate(5),
            ticketing: BackoffPolicy::immediate(5),
        };
        BookingFlow::new(backend, Arc::new(MemorySessionStore::new(Duration::from_secs(900))), settings)
    }

    fn backend_for(fare_type: &str) -> ScriptedBackend {
        let itinerary = sample_itinerary("FSC-1", fare_type, DEPARTS, 412.5);
        ScriptedBackend::new()
            .with_search(SearchResponse { session_id: "S-1".into(), itineraries: vec![itinerary.clone()] })
            .with_valid_fare("FSC-1", itinerary)
    }

    fn issued(booking_id: &str) -> TicketStatus {
        TicketStatus {
            booking_id: booking_id.into(),
            pnr: Some("PNR9".into()),
            status: Some("Ticketed".into()),
            ticket_numbers: vec!["TKT001".into()],
        }
    }

    async fn to_fare_rules(flow: &BookingFlow) -> Uuid {
        let outcome = flow.search(query()).await.unwrap();
        flow.select(
            outcome.flow_id,
            SelectionRequest { fare_source_code: "FSC-1".into(), return_fare_source_code: None },
        )
        .await
        .unwrap();
        flow.submit_booking(outcome.flow_id, draft()).await.unwrap();
        outcome.flow_id
    }

    #[tokio::test]
    async fn test_gds_fare_books_then_pays_then_tickets() {
        let backend = Arc::new(
            backend_for("Public")
                .with_booking_id("B123")
                .with_verifications(vec![None, Some("B123")])
                .with_tickets(vec![TicketStatus { booking_id: "B123".into(), ..Default::default() }, issued("B123")]),
        );
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;

        let redirect = flow.accept_fare_rules(flow_id).await.unwrap();
        assert_eq!(redirect.branch, PaymentBranch::BookThenPay);
        assert_eq!(redirect.booking_id.as_deref(), Some("B123"));
        assert_eq!(flow.snapshot(flow_id).await.unwrap().state, FlowState::AwaitingPaymentResult);

        let confirmation = flow.complete_payment(Some(flow_id), "cs_B123").await.unwrap();
        assert_eq!(confirmation.booking_id, "B123");
        assert!(confirmation.outcome.is_issued());

        let booked = backend.booked();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].flight_session_id, "S-1");
        assert_eq!(booked[0].fare_source_code, "FSC-1");

        assert_eq!(
            backend.calls(),
            vec![
                "search",
                "revalidate:FSC-1",
                "fare_rules:FSC-1",
                "book",
                "checkout:B123",
                "verify:cs_B123",
                "verify:cs_B123",
                "ticket:B123",
                "ticket:B123",
            ]
        );
        // completed flows are cleared
        assert!(matches!(flow.snapshot(flow_id).await, Err(FlowError::OutOfOrder { .. })));
    }

    #[tokio::test]
    async fn test_web_fare_pays_before_any_booking() {
        let backend = Arc::new(
            backend_for("WebFare")
                .with_verifications(vec![Some("B777")])
                .with_tickets(vec![issued("B777")]),
        );
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;

        let redirect = flow.accept_fare_rules(flow_id).await.unwrap();
        assert_eq!(redirect.branch, PaymentBranch::PayThenBook);
        assert!(redirect.booking_id.is_none());

        let payloads = backend.lcc_payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].fare_source_code, "FSC-1");
        assert_eq!(payloads[0].adults[0].first_name, "Layla");
        assert!(!backend.calls().contains(&"book".to_string()));

        let confirmation = flow.complete_payment(Some(flow_id), "cs_lcc_FSC-1").await.unwrap();
        assert_eq!(confirmation.booking_id, "B777");
        assert!(confirmation.outcome.is_issued());
    }

    #[tokio::test]
    async fn test_expired_fare_never_reaches_booking_or_payment() {
        let itinerary = sample_itinerary("FSC-1", "Public", DEPARTS, 412.5);
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_search(SearchResponse { session_id: "S-1".into(), itineraries: vec![itinerary] })
                .with_invalid_fare("FSC-1"),
        );
        let flow = flow_with(backend.clone());
        let outcome = flow.search(query()).await.unwrap();
        flow.select(
            outcome.flow_id,
            SelectionRequest { fare_source_code: "FSC-1".into(), return_fare_source_code: None },
        )
        .await
        .unwrap();

        let result = flow.submit_booking(outcome.flow_id, draft()).await;
        assert!(matches!(result, Err(FlowError::FareExpired)));
        assert_eq!(
            flow.snapshot(outcome.flow_id).await.unwrap().state,
            FlowState::Failed(FailureReason::FareExpired)
        );
        assert!(matches!(flow.accept_fare_rules(outcome.flow_id).await, Err(FlowError::InvalidTransition { .. })));
        assert_eq!(backend.calls(), vec!["search", "revalidate:FSC-1"]);
    }

    #[tokio::test]
    async fn test_round_trip_with_invalid_inbound_creates_nothing() {
        let out = sample_itinerary("FSC-OUT", "Public", DEPARTS, 300.0);
        let back = sample_itinerary("FSC-IN", "Public", "2025-06-10T20:00:00", 280.0);
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_search(SearchResponse { session_id: "S-1".into(), itineraries: vec![out.clone(), back] })
                .with_valid_fare("FSC-OUT", out)
                .with_invalid_fare("FSC-IN"),
        );
        let flow = flow_with(backend.clone());
        let outcome = flow.search(query()).await.unwrap();
        let selected = flow
            .select(
                outcome.flow_id,
                SelectionRequest {
                    fare_source_code: "FSC-OUT".into(),
                    return_fare_source_code: Some("FSC-IN".into()),
                },
            )
            .await
            .unwrap();
        assert!(selected.inbound().is_some());

        assert!(matches!(flow.submit_booking(outcome.flow_id, draft()).await, Err(FlowError::FareExpired)));
        let calls = backend.calls();
        assert!(!calls.iter().any(|c| c == "book" || c.starts_with("checkout")));
    }

    #[tokio::test]
    async fn test_invalid_draft_never_hits_network() {
        let backend = Arc::new(backend_for("Public"));
        let flow = flow_with(backend.clone());
        let outcome = flow.search(query()).await.unwrap();
        flow.select(
            outcome.flow_id,
            SelectionRequest { fare_source_code: "FSC-1".into(), return_fare_source_code: None },
        )
        .await
        .unwrap();

        let mut bad = draft();
        bad.adults[0].date_of_birth = NaiveDate::from_ymd_opt(2020, 1, 1);
        match flow.submit_booking(outcome.flow_id, bad).await {
            Err(FlowError::Validation(report)) => {
                assert!(report.field_errors.contains_key("adults[0].dateOfBirth"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(backend.calls(), vec!["search"]);
        assert_eq!(flow.snapshot(outcome.flow_id).await.unwrap().state, FlowState::Idle);
    }

    #[tokio::test]
    async fn test_passport_rejection_switches_mode_and_keeps_draft() {
        let itinerary = sample_itinerary("FSC-1", "Public", DEPARTS, 412.5);
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_search(SearchResponse { session_id: "S-1".into(), itineraries: vec![itinerary] })
                .with_revalidation_error(
                    "FSC-1",
                    BackendError::Rejected(Rejection::classify(None, "Passport details are required")),
                ),
        );
        let flow = flow_with(backend);
        let outcome = flow.search(query()).await.unwrap();
        flow.select(
            outcome.flow_id,
            SelectionRequest { fare_source_code: "FSC-1".into(), return_fare_source_code: None },
        )
        .await
        .unwrap();

        let result = flow.submit_booking(outcome.flow_id, draft()).await;
        assert!(matches!(result, Err(FlowError::Rejected(ref r)) if r.kind == RejectionKind::PassportRequired));

        let snapshot = flow.snapshot(outcome.flow_id).await.unwrap();
        assert!(snapshot.passport_required);
        assert_eq!(snapshot.state, FlowState::Idle);
        assert_eq!(snapshot.draft, Some(draft()));

        // the next attempt must carry passport details
        match flow.submit_booking(outcome.flow_id, draft()).await {
            Err(FlowError::Validation(report)) => {
                assert!(report.field_errors.contains_key("adults[0].passport.number"))
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut with_passport = draft();
        with_passport.adults[0].passport = Some(PassportDetails {
            number: Some(Masked::from("P998877")),
            issuing_country: Some("AE".into()),
            issue_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1),
        });
        let report = flow.validate_passengers(outcome.flow_id, &with_passport).await.unwrap();
        assert!(report.is_valid());
    }

    #[tokio::test]
    async fn test_submission_returns_backend_fare_rules() {
        use skyward_core::fare_rules::{BaggageAllowance, FareRule};

        let rules = FareRulesView {
            rules: vec![FareRule {
                airline: Some("EK".into()),
                city_pair: Some("DXB-LHR".into()),
                category: "PENALTIES".into(),
                text: "Changes permitted for a fee".into(),
            }],
            baggage: vec![BaggageAllowance {
                departure: Some("DXB".into()),
                arrival: Some("LHR".into()),
                flight_number: Some("1".into()),
                checked: Some("30K".into()),
                cabin: Some("7K".into()),
            }],
        };
        let backend = Arc::new(backend_for("Public").with_fare_rules(rules.clone()));
        let flow = flow_with(backend);
        let outcome = flow.search(query()).await.unwrap();
        flow.select(
            outcome.flow_id,
            SelectionRequest { fare_source_code: "FSC-1".into(), return_fare_source_code: None },
        )
        .await
        .unwrap();

        assert_eq!(flow.submit_booking(outcome.flow_id, draft()).await.unwrap(), rules);
        assert_eq!(flow.fare_rules(outcome.flow_id).await.unwrap(), rules);
        assert_eq!(
            flow.snapshot(outcome.flow_id).await.unwrap().state,
            FlowState::AwaitingFareRuleAcceptance
        );
    }

    #[tokio::test]
    async fn test_booking_refused_as_expired_ends_flow() {
        let backend = Arc::new(backend_for("Public").with_booking_error(BackendError::from_response(
            400,
            r#"{"message":"Fare no longer available","code":"FARE_NOT_AVAILABLE"}"#,
        )));
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;

        assert!(matches!(flow.accept_fare_rules(flow_id).await, Err(FlowError::FareExpired)));
        assert_eq!(
            flow.snapshot(flow_id).await.unwrap().state,
            FlowState::Failed(FailureReason::FareExpired)
        );
        assert!(!backend.calls().iter().any(|c| c.starts_with("checkout")));
        assert!(matches!(flow.submit_booking(flow_id, draft()).await, Err(FlowError::FareExpired)));
    }

    #[tokio::test]
    async fn test_dismissing_fare_rules_keeps_draft() {
        let backend = Arc::new(backend_for("Public"));
        let flow = flow_with(backend);
        let flow_id = to_fare_rules(&flow).await;

        let snapshot = flow.dismiss_fare_rules(flow_id).await.unwrap();
        assert_eq!(snapshot.state, FlowState::Idle);
        assert_eq!(snapshot.draft, Some(draft()));
        assert!(!snapshot.fare_rules_accepted);

        assert!(matches!(
            flow.accept_fare_rules(flow_id).await,
            Err(FlowError::InvalidTransition { from: FlowState::Idle, to: FlowState::Dispatching })
        ));
    }

    #[tokio::test]
    async fn test_failed_checkout_retries_without_rebooking() {
        let backend = Arc::new(
            backend_for("Public")
                .with_booking_id("B123")
                .with_checkout_error(BackendError::Status { status: 502, message: "bad gateway".into() }),
        );
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;

        assert!(matches!(flow.accept_fare_rules(flow_id).await, Err(FlowError::Backend(_))));
        let snapshot = flow.snapshot(flow_id).await.unwrap();
        assert_eq!(snapshot.state, FlowState::AwaitingFareRuleAcceptance);
        assert_eq!(snapshot.booking_id.as_deref(), Some("B123"));

        backend.clear_checkout_error();
        let redirect = flow.accept_fare_rules(flow_id).await.unwrap();
        assert_eq!(redirect.booking_id.as_deref(), Some("B123"));
        assert_eq!(backend.calls().iter().filter(|c| *c == "book").count(), 1);
    }

    #[tokio::test]
    async fn test_edited_passengers_are_booked_afresh() {
        let backend = Arc::new(
            backend_for("Public")
                .with_booking_id("B123")
                .with_checkout_error(BackendError::Status { status: 502, message: "bad gateway".into() }),
        );
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;
        assert!(flow.accept_fare_rules(flow_id).await.is_err());

        // same passengers: the held booking is still theirs
        flow.submit_booking(flow_id, draft()).await.unwrap();
        assert_eq!(flow.snapshot(flow_id).await.unwrap().booking_id.as_deref(), Some("B123"));

        let mut edited = draft();
        edited.adults[0].first_name = "Leila".into();
        flow.submit_booking(flow_id, edited.clone()).await.unwrap();
        assert_eq!(flow.snapshot(flow_id).await.unwrap().booking_id, None);

        backend.clear_checkout_error();
        flow.accept_fare_rules(flow_id).await.unwrap();
        let booked = backend.booked();
        assert_eq!(booked.len(), 2);
        assert_eq!(booked[1].adults[0], edited.adults[0]);
    }

    #[tokio::test]
    async fn test_revalidated_fare_code_drives_later_calls() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_search(SearchResponse {
                    session_id: "S-1".into(),
                    itineraries: vec![sample_itinerary("FSC-1", "Public", DEPARTS, 412.5)],
                })
                .with_valid_fare("FSC-1", sample_itinerary("FSC-1-NEW", "Public", DEPARTS, 430.0)),
        );
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;

        flow.fare_rules(flow_id).await.unwrap();
        assert_eq!(
            backend.calls(),
            vec!["search", "revalidate:FSC-1", "fare_rules:FSC-1-NEW", "fare_rules:FSC-1-NEW"]
        );

        flow.accept_fare_rules(flow_id).await.unwrap();
        assert_eq!(backend.booked()[0].fare_source_code, "FSC-1-NEW");
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_return_after_session_expiry_still_verifies() {
        let backend = Arc::new(
            backend_for("Public")
                .with_booking_id("B123")
                .with_verifications(vec![Some("B123")])
                .with_tickets(vec![issued("B123")]),
        );
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;
        flow.accept_fare_rules(flow_id).await.unwrap();

        // the customer lingers on the processor page past the idle timeout
        tokio::time::advance(Duration::from_secs(16 * 60)).await;

        let confirmation = flow.complete_payment(Some(flow_id), "cs_B123").await.unwrap();
        assert_eq!(confirmation.booking_id, "B123");
        assert!(confirmation.outcome.is_issued());

        let calls = backend.calls();
        assert!(calls.contains(&"verify:cs_B123".to_string()));
        assert!(calls.contains(&"ticket:B123".to_string()));
        assert!(matches!(
            flow.snapshot(flow_id).await,
            Err(FlowError::OutOfOrder { missing: SessionKey::FlowState, .. })
        ));
    }

    #[tokio::test]
    async fn test_slow_ticketing_is_delayed_not_failed() {
        let backend = Arc::new(
            backend_for("Public")
                .with_booking_id("B123")
                .with_verifications(vec![Some("B123")]),
        );
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;
        flow.accept_fare_rules(flow_id).await.unwrap();

        let confirmation = flow.complete_payment(Some(flow_id), "cs_B123").await.unwrap();
        assert_eq!(
            confirmation.outcome,
            TicketOutcome::Delayed { booking_id: "B123".into(), attempts: 5 }
        );
        let snapshot = flow.snapshot(flow_id).await.unwrap();
        assert_eq!(snapshot.state, FlowState::TicketDelayed);
        assert_eq!(snapshot.booking_id.as_deref(), Some("B123"));
    }

    #[tokio::test]
    async fn test_unverified_payment_leaves_flow_awaiting_result() {
        let backend = Arc::new(backend_for("WebFare").with_verifications(vec![None]));
        let flow = flow_with(backend.clone());
        let flow_id = to_fare_rules(&flow).await;
        flow.accept_fare_rules(flow_id).await.unwrap();

        assert!(matches!(
            flow.complete_payment(Some(flow_id), "cs_lcc_FSC-1").await,
            Err(FlowError::PaymentUnverified)
        ));
        assert_eq!(flow.snapshot(flow_id).await.unwrap().state, FlowState::AwaitingPaymentResult);
        assert!(!backend.calls().iter().any(|c| c.starts_with("ticket")));
    }

    #[tokio::test]
    async fn test_payment_return_without_flow_still_resolves() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_verifications(vec![Some("B55")])
                .with_tickets(vec![issued("B55")]),
        );
        let flow = flow_with(backend);
        let confirmation = flow.complete_payment(None, "cs_orphan").await.unwrap();
        assert_eq!(confirmation.booking_id, "B55");
    }

    #[tokio::test]
    async fn test_selecting_unknown_fare() {
        let backend = Arc::new(backend_for("Public"));
        let flow = flow_with(backend);
        let outcome = flow.search(query()).await.unwrap();

        let result = flow
            .select(
                outcome.flow_id,
                SelectionRequest { fare_source_code: "NOPE".into(), return_fare_source_code: None },
            )
            .await;
        assert!(matches!(result, Err(FlowError::UnknownFare(code)) if code == "NOPE"));
    }

    #[tokio::test]
    async fn test_unknown_flow_routes_to_search() {
        let flow = flow_with(Arc::new(ScriptedBackend::new()));
        match flow.accept_fare_rules(Uuid::new_v4()).await {
            Err(FlowError::OutOfOrder { resume_at, .. }) => {
                assert_eq!(resume_at, skyward_core::session::ResumeAt::Search)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_booking_action_requires_reference() {
        let flow = flow_with(Arc::new(ScriptedBackend::new()));
        let result = flow.booking_action(BookingActionKind::Cancel, BookingAction::new("  ")).await;
        assert!(matches!(result, Err(FlowError::InvalidQuery(_))));

        let receipt = flow
            .booking_action(BookingActionKind::Refund, BookingAction::new("PNR9"))
            .await
            .unwrap();
        assert!(receipt.success);
    }
}
