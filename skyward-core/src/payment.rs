use serde::{Deserialize, Serialize};

use crate::itinerary::{FareType, Money};
use crate::passenger::BookingRequest;

/// Order of inventory commitment versus payment capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentBranch {
    /// GDS fares: reserve the booking, then collect payment against it.
    BookThenPay,
    /// Low-cost fares: collect payment first; the booking is created by the
    /// payment webhook once funds are confirmed.
    PayThenBook,
}

impl PaymentBranch {
    pub fn for_fare(fare_type: &FareType) -> Self {
        match fare_type {
            FareType::WebFare => PaymentBranch::PayThenBook,
            FareType::Gds(_) => PaymentBranch::BookThenPay,
        }
    }
}

/// Body for `POST /payment/create-checkout-session`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForBooking<'a> {
    pub booking_id: &'a str,
    pub total_price: f64,
    pub currency: &'a str,
}

/// Body for `POST /payment/create-checkout-session-lcc`; the full booking
/// payload rides along as opaque metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForPayload<'a> {
    pub booking_payload: &'a BookingRequest,
    pub total_price: f64,
    pub currency: &'a str,
}

impl<'a> CheckoutForBooking<'a> {
    pub fn new(booking_id: &'a str, total: &'a Money) -> Self {
        Self {
            booking_id,
            total_price: total.amount,
            currency: &total.currency,
        }
    }
}

impl<'a> CheckoutForPayload<'a> {
    pub fn new(booking_payload: &'a BookingRequest, total: &'a Money) -> Self {
        Self {
            booking_payload,
            total_price: total.amount,
            currency: &total.currency,
        }
    }
}

/// Hosted checkout page created by the payment processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub url: String,
    #[serde(default, alias = "id")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionResponse {
    #[serde(default, alias = "booking_id")]
    pub booking_id: Option<String>,
}
