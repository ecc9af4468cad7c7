use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Marker the backend uses for low-cost-carrier fares.
pub const WEB_FARE_MARKER: &str = "WebFare";

/// How a fare gets ticketed.
///
/// Low-cost carriers (`WebFare`) cannot hold a seat before payment; every
/// other fare type is a GDS fare supporting reserve-then-pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FareType {
    WebFare,
    Gds(String),
}

impl FareType {
    pub fn is_web_fare(&self) -> bool {
        matches!(self, FareType::WebFare)
    }
}

impl From<String> for FareType {
    fn from(raw: String) -> Self {
        if raw.trim().eq_ignore_ascii_case(WEB_FARE_MARKER) {
            FareType::WebFare
        } else {
            FareType::Gds(raw)
        }
    }
}

impl From<FareType> for String {
    fn from(fare_type: FareType) -> Self {
        match fare_type {
            FareType::WebFare => WEB_FARE_MARKER.to_string(),
            FareType::Gds(raw) => raw,
        }
    }
}

/// Amount plus ISO currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FareAmount {
    #[serde(deserialize_with = "amount_from_number_or_string")]
    pub amount: f64,
    pub currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItinTotalFares {
    pub total_fare: FareAmount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FareInfo {
    pub fare_source_code: String,
    pub fare_type: FareType,
    pub itin_total_fares: ItinTotalFares,
    #[serde(default)]
    pub is_passport_mandatory: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlightSegment {
    pub departure_airport_location_code: String,
    pub arrival_airport_location_code: String,
    pub departure_date_time: NaiveDateTime,
    pub arrival_date_time: NaiveDateTime,
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default)]
    pub marketing_airline_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegmentOption {
    pub flight_segment: FlightSegment,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One direction of travel, made of one or more segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginDestinationOption {
    #[serde(rename = "OriginDestinationOption", default)]
    pub segments: Vec<SegmentOption>,
}

/// A priced, bookable flight offer.
///
/// Unknown backend fields are kept in `extra` so the itinerary can be sent
/// back for booking exactly as it was returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FareItinerary {
    pub air_itinerary_fare_info: FareInfo,
    #[serde(default)]
    pub origin_destination_options: Vec<OriginDestinationOption>,
    #[serde(default)]
    pub validating_airline_code: Option<String>,
    #[serde(default)]
    pub direction_ind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FareItinerary {
    pub fn fare_source_code(&self) -> &str {
        &self.air_itinerary_fare_info.fare_source_code
    }

    pub fn fare_type(&self) -> &FareType {
        &self.air_itinerary_fare_info.fare_type
    }

    pub fn total(&self) -> Money {
        let fare = &self.air_itinerary_fare_info.itin_total_fares.total_fare;
        Money {
            amount: fare.amount,
            currency: fare.currency_code.clone(),
        }
    }

    /// Date of the first departing segment.
    pub fn first_departure(&self) -> Option<NaiveDate> {
        self.origin_destination_options
            .iter()
            .flat_map(|option| option.segments.iter())
            .map(|segment| segment.flight_segment.departure_date_time)
            .min()
            .map(|dt| dt.date())
    }

    pub fn passport_mandatory(&self) -> bool {
        self.air_itinerary_fare_info.is_passport_mandatory.unwrap_or(false)
    }
}

/// The offer the customer chose, possibly assembled from two one-way legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trip", rename_all = "snake_case")]
pub enum SelectedFare {
    OneWay { itinerary: FareItinerary },
    RoundTrip { outbound: FareItinerary, inbound: FareItinerary },
}

impl SelectedFare {
    pub fn outbound(&self) -> &FareItinerary {
        match self {
            SelectedFare::OneWay { itinerary } => itinerary,
            SelectedFare::RoundTrip { outbound, .. } => outbound,
        }
    }

    pub fn inbound(&self) -> Option<&FareItinerary> {
        match self {
            SelectedFare::OneWay { .. } => None,
            SelectedFare::RoundTrip { inbound, .. } => Some(inbound),
        }
    }

    pub fn legs(&self) -> Vec<&FareItinerary> {
        match self {
            SelectedFare::OneWay { itinerary } => vec![itinerary],
            SelectedFare::RoundTrip { outbound, inbound } => vec![outbound, inbound],
        }
    }

    /// Branch selection follows the outbound fare.
    pub fn fare_type(&self) -> &FareType {
        self.outbound().fare_type()
    }

    pub fn departure_date(&self) -> Option<NaiveDate> {
        self.outbound().first_departure()
    }

    pub fn passport_mandatory(&self) -> bool {
        self.legs().iter().any(|leg| leg.passport_mandatory())
    }

    /// Sum of all legs, in the outbound currency.
    pub fn total(&self) -> Money {
        let mut total = self.outbound().total();
        if let Some(inbound) = self.inbound() {
            total.amount += inbound.total().amount;
        }
        total
    }
}

/// Result of re-confirming a fare immediately before booking.
#[derive(Debug, Clone, PartialEq)]
pub struct Revalidation {
    pub is_valid: bool,
    pub itinerary: Option<FareItinerary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RevalidationResponse {
    #[serde(rename = "IsValid", alias = "Success", alias = "isValid", default)]
    pub is_valid: bool,
    #[serde(default)]
    pub fare_itineraries: Option<FareItineraryEnvelope>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FareItineraryEnvelope {
    pub fare_itinerary: FareItinerary,
}

impl From<RevalidationResponse> for Revalidation {
    fn from(response: RevalidationResponse) -> Self {
        Self {
            is_valid: response.is_valid,
            itinerary: response.fare_itineraries.map(|e| e.fare_itinerary),
        }
    }
}

fn amount_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("amount out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid amount '{}'", s))),
        other => Err(serde::de::Error::custom(format!("invalid amount {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn itinerary_json(fare_type: &str) -> Value {
        json!({
            "AirItineraryFareInfo": {
                "FareSourceCode": "FSC-OUT",
                "FareType": fare_type,
                "ItinTotalFares": { "TotalFare": { "Amount": "412.50", "CurrencyCode": "USD" } },
                "DivideInPartiesIndicator": false
            },
            "OriginDestinationOptions": [{
                "OriginDestinationOption": [{
                    "FlightSegment": {
                        "DepartureAirportLocationCode": "DXB",
                        "ArrivalAirportLocationCode": "LHR",
                        "DepartureDateTime": "2025-06-01T08:30:00",
                        "ArrivalDateTime": "2025-06-01T12:45:00",
                        "FlightNumber": "1",
                        "MarketingAirlineCode": "EK"
                    },
                    "ResBookDesigCode": "Y"
                }]
            }],
            "ValidatingAirlineCode": "EK",
            "SequenceNumber": 7
        })
    }

    #[test]
    fn test_fare_type_marker() {
        assert_eq!(FareType::from("WebFare".to_string()), FareType::WebFare);
        assert_eq!(FareType::from("webfare".to_string()), FareType::WebFare);
        assert_eq!(
            FareType::from("Public".to_string()),
            FareType::Gds("Public".to_string())
        );
    }

    #[test]
    fn test_itinerary_deserialization() {
        let itinerary: FareItinerary =
            serde_json::from_value(itinerary_json("Public")).expect("Failed to deserialize");

        assert_eq!(itinerary.fare_source_code(), "FSC-OUT");
        assert_eq!(itinerary.fare_type(), &FareType::Gds("Public".into()));
        assert_eq!(itinerary.total().amount, 412.5);
        assert_eq!(
            itinerary.first_departure(),
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
    }

    #[test]
    fn test_unknown_fields_survive_reserialization() {
        let itinerary: FareItinerary = serde_json::from_value(itinerary_json("WebFare")).unwrap();
        let back = serde_json::to_value(&itinerary).unwrap();

        assert_eq!(back["SequenceNumber"], 7);
        assert_eq!(back["AirItineraryFareInfo"]["FareType"], "WebFare");
        assert_eq!(back["AirItineraryFareInfo"]["DivideInPartiesIndicator"], false);
        assert_eq!(
            back["OriginDestinationOptions"][0]["OriginDestinationOption"][0]["ResBookDesigCode"],
            "Y"
        );
    }

    #[test]
    fn test_round_trip_total_adds_legs() {
        let outbound: FareItinerary = serde_json::from_value(itinerary_json("Public")).unwrap();
        let inbound = outbound.clone();
        let selected = SelectedFare::RoundTrip { outbound, inbound };

        assert_eq!(selected.total().amount, 825.0);
        assert_eq!(selected.total().currency, "USD");
        assert_eq!(selected.legs().len(), 2);
    }

    #[test]
    fn test_revalidation_accepts_success_alias() {
        let response: RevalidationResponse = serde_json::from_value(json!({
            "Success": true,
            "FareItineraries": { "FareItinerary": itinerary_json("Public") }
        }))
        .unwrap();
        let revalidation = Revalidation::from(response);

        assert!(revalidation.is_valid);
        assert!(revalidation.itinerary.is_some());
    }

    #[test]
    fn test_revalidation_missing_flag_is_invalid() {
        let response: RevalidationResponse = serde_json::from_value(json!({})).unwrap();
        assert!(!Revalidation::from(response).is_valid);
    }
}
