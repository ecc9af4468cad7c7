//! Scripted stand-in for the booking backend.
//!
//! Records every call so tests can assert which endpoint sequence a flow
//! produced.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Map;

use skyward_core::error::BackendResult;
use skyward_core::fare_rules::FareRulesView;
use skyward_core::itinerary::{
    FareAmount, FareInfo, FlightSegment, ItinTotalFares, Money, OriginDestinationOption, Revalidation,
    SegmentOption,
};
use skyward_core::passenger::BookingRequest;
use skyward_core::payment::CheckoutSession;
use skyward_core::search::{SearchQuery, SearchResponse};
use skyward_core::ticket::{ActionReceipt, BookingAction, BookingActionKind, TicketStatus};
use skyward_core::{BackendError, BookingBackend, FareItinerary, FareType};

/// Builds a single-segment DXB→LHR itinerary departing at `departure`
/// (`YYYY-MM-DDTHH:MM:SS`).
pub fn sample_itinerary(fare_source_code: &str, fare_type: &str, departure: &str, amount: f64) -> FareItinerary {
    let departs = NaiveDateTime::parse_from_str(departure, "%Y-%m-%dT%H:%M:%S")
        .expect("sample departure must be YYYY-MM-DDTHH:MM:SS");
    FareItinerary {
        air_itinerary_fare_info: FareInfo {
            fare_source_code: fare_source_code.to_string(),
            fare_type: FareType::from(fare_type.to_string()),
            itin_total_fares: ItinTotalFares {
                total_fare: FareAmount {
                    amount,
                    currency_code: "USD".to_string(),
                },
                extra: Map::new(),
            },
            is_passport_mandatory: None,
            extra: Map::new(),
        },
        origin_destination_options: vec![OriginDestinationOption {
            segments: vec![SegmentOption {
                flight_segment: FlightSegment {
                    departure_airport_location_code: "DXB".to_string(),
                    arrival_airport_location_code: "LHR".to_string(),
                    departure_date_time: departs,
                    arrival_date_time: departs + chrono::Duration::hours(7),
                    flight_number: Some("1".to_string()),
                    marketing_airline_code: Some("EK".to_string()),
                    extra: Map::new(),
                },
                extra: Map::new(),
            }],
        }],
        validating_airline_code: Some("EK".to_string()),
        direction_ind: None,
        extra: Map::new(),
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<String>>,
    search: Mutex<Option<SearchResponse>>,
    revalidations: Mutex<HashMap<String, BackendResult<Revalidation>>>,
    fare_rules: Mutex<FareRulesView>,
    booking: Mutex<Option<BackendResult<String>>>,
    checkout: Mutex<Option<BackendError>>,
    verifications: Mutex<VecDeque<Option<String>>>,
    tickets: Mutex<VecDeque<TicketStatus>>,
    booked: Mutex<Vec<BookingRequest>>,
    lcc_payloads: Mutex<Vec<BookingRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(self, response: SearchResponse) -> Self {
        *self.search.lock().unwrap() = Some(response);
        self
    }

    pub fn with_valid_fare(self, fare_source_code: &str, itinerary: FareItinerary) -> Self {
        self.revalidations.lock().unwrap().insert(
            fare_source_code.to_string(),
            Ok(Revalidation { is_valid: true, itinerary: Some(itinerary) }),
        );
        self
    }

    pub fn with_invalid_fare(self, fare_source_code: &str) -> Self {
        self.revalidations.lock().unwrap().insert(
            fare_source_code.to_string(),
            Ok(Revalidation { is_valid: false, itinerary: None }),
        );
        self
    }

    pub fn with_revalidation_error(self, fare_source_code: &str, err: BackendError) -> Self {
        self.revalidations
            .lock()
            .unwrap()
            .insert(fare_source_code.to_string(), Err(err));
        self
    }

    pub fn with_fare_rules(self, view: FareRulesView) -> Self {
        *self.fare_rules.lock().unwrap() = view;
        self
    }

    pub fn with_booking_id(self, booking_id: &str) -> Self {
        *self.booking.lock().unwrap() = Some(Ok(booking_id.to_string()));
        self
    }

    pub fn with_booking_error(self, err: BackendError) -> Self {
        *self.booking.lock().unwrap() = Some(Err(err));
        self
    }

    pub fn with_checkout_error(self, err: BackendError) -> Self {
        *self.checkout.lock().unwrap() = Some(err);
        self
    }

    pub fn clear_checkout_error(&self) {
        *self.checkout.lock().unwrap() = None;
    }

    /// Answers for successive `verify_session` calls; the last one repeats.
    pub fn with_verifications(self, answers: Vec<Option<&str>>) -> Self {
        *self.verifications.lock().unwrap() = answers.into_iter().map(|a| a.map(str::to_string)).collect();
        self
    }

    /// Answers for successive `ticket` calls; the last one repeats.
    pub fn with_tickets(self, answers: Vec<TicketStatus>) -> Self {
        *self.tickets.lock().unwrap() = answers.into_iter().collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn booked(&self) -> Vec<BookingRequest> {
        self.booked.lock().unwrap().clone()
    }

    pub fn lcc_payloads(&self) -> Vec<BookingRequest> {
        self.lcc_payloads.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_or_last<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl BookingBackend for ScriptedBackend {
    async fn search(&self, _query: &SearchQuery) -> BackendResult<SearchResponse> {
        self.record("search".to_string());
        self.search
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BackendError::Status { status: 500, message: "no search scripted".into() })
    }

    async fn revalidate(&self, _session_id: &str, fare_source_code: &str) -> BackendResult<Revalidation> {
        self.record(format!("revalidate:{}", fare_source_code));
        self.revalidations
            .lock()
            .unwrap()
            .get(fare_source_code)
            .cloned()
            .unwrap_or(Ok(Revalidation { is_valid: false, itinerary: None }))
    }

    async fn fare_rules(&self, _session_id: &str, fare_source_code: &str) -> BackendResult<FareRulesView> {
        self.record(format!("fare_rules:{}", fare_source_code));
        Ok(self.fare_rules.lock().unwrap().clone())
    }

    async fn book(&self, request: &BookingRequest) -> BackendResult<String> {
        self.record("book".to_string());
        self.booked.lock().unwrap().push(request.clone());
        self.booking
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok("B-SCRIPTED".to_string()))
    }

    async fn create_checkout_session(&self, booking_id: &str, _total: &Money) -> BackendResult<CheckoutSession> {
        self.record(format!("checkout:{}", booking_id));
        if let Some(err) = self.checkout.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{}", booking_id),
            session_id: Some(format!("cs_{}", booking_id)),
        })
    }

    async fn create_lcc_checkout_session(
        &self,
        payload: &BookingRequest,
        _total: &Money,
    ) -> BackendResult<CheckoutSession> {
        self.record("checkout_lcc".to_string());
        if let Some(err) = self.checkout.lock().unwrap().clone() {
            return Err(err);
        }
        self.lcc_payloads.lock().unwrap().push(payload.clone());
        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/lcc/{}", payload.fare_source_code),
            session_id: Some(format!("cs_lcc_{}", payload.fare_source_code)),
        })
    }

    async fn verify_session(&self, processor_session_id: &str) -> BackendResult<Option<String>> {
        self.record(format!("verify:{}", processor_session_id));
        Ok(Self::next_or_last(&self.verifications).flatten())
    }

    async fn ticket(&self, booking_id: &str) -> BackendResult<TicketStatus> {
        self.record(format!("ticket:{}", booking_id));
        Ok(Self::next_or_last(&self.tickets).unwrap_or_else(|| TicketStatus {
            booking_id: booking_id.to_string(),
            ..Default::default()
        }))
    }

    async fn booking_action(&self, kind: BookingActionKind, action: &BookingAction) -> BackendResult<ActionReceipt> {
        let verb = match kind {
            BookingActionKind::Cancel => "cancel",
            BookingActionKind::Refund => "refund",
            BookingActionKind::Reissue => "reissue",
        };
        self.record(format!("{}:{}", verb, action.unique_id));
        Ok(ActionReceipt {
            success: true,
            message: Some(format!("{} accepted", verb)),
            details: Map::new(),
        })
    }
}
